use super::{write_variant_records, SampleGenotype, VariantRecord, VariantSet, VcfHeader};
use crate::cli::FULL_VERSION;
use crate::fingerprint::{FingerprintCall, Gender};
use crate::genotype::{DiploidGenotype, DiploidHaplotype, Snp};
use crate::hapmap::HaplotypeMap;
use crate::utils::{format_number_with_commas, Error, ReferenceSequence, Result};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::path::Path;

/// A genotype call resolved against a haplotype map.
#[derive(Debug, Clone)]
pub struct SnpGenotype {
    pub snp: Snp,
    pub genotype: DiploidGenotype,
}

impl SnpGenotype {
    pub fn new(snp: Snp, genotype: DiploidGenotype) -> Self {
        SnpGenotype { snp, genotype }
    }
}

impl PartialEq for SnpGenotype {
    fn eq(&self, other: &Self) -> bool {
        self.snp.name() == other.snp.name() && self.snp == other.snp && self.genotype == other.genotype
    }
}

impl fmt::Display for SnpGenotype {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}={}", self.snp.name(), self.genotype)
    }
}

/// Resolves fingerprint calls against `map`. Calls on SNPs the map does not
/// know and calls with undecodable genotypes are logged and skipped.
pub fn to_genotype_list(calls: &[FingerprintCall], map: &HaplotypeMap) -> Vec<SnpGenotype> {
    let mut genotypes = Vec::with_capacity(calls.len());
    for call in calls {
        let Some(snp) = map.snp_by_name(&call.rsid) else {
            log::warn!("Genotype returned for unknown SNP: {}", call.rsid);
            continue;
        };
        match call.genotype.parse::<DiploidGenotype>() {
            Ok(genotype) => genotypes.push(SnpGenotype::new(snp.clone(), genotype)),
            Err(e) => log::warn!("Excluding genotype {}={}: {}", call.rsid, call.genotype, e),
        }
    }
    log::debug!(
        "Resolved {} of {} calls against the haplotype map",
        genotypes.len(),
        calls.len()
    );
    genotypes
}

/// Keeps the calls of every haplotype block whose calls agree on a single
/// diploid haplotype. Blocks with conflicting calls are dropped as a whole;
/// a call that matches none of its SNP's genotypes is dropped on its own.
pub fn cleanup_genotypes(genotypes: Vec<SnpGenotype>, map: &HaplotypeMap) -> Vec<SnpGenotype> {
    let mut haplotypes: HashMap<usize, HashSet<DiploidHaplotype>> = HashMap::new();
    let mut resolved = Vec::with_capacity(genotypes.len());

    for gt in genotypes {
        let Some(index) = map.block_index_by_name(gt.snp.name()) else {
            log::warn!("No haplotype block for SNP {}", gt.snp.name());
            continue;
        };
        let block = &map.blocks()[index];
        match block.diploid_haplotype_for(&gt.snp, gt.genotype) {
            Ok(haplotype) => {
                haplotypes.entry(index).or_default().insert(haplotype);
                resolved.push((index, gt));
            }
            Err(e) => log::warn!("Excluding genotype {}: {}", gt, e),
        }
    }

    let conflicting: HashSet<usize> = haplotypes
        .iter()
        .filter(|(_, hs)| hs.len() > 1)
        .map(|(&index, _)| index)
        .collect();
    for &index in &conflicting {
        let calls: Vec<String> = resolved
            .iter()
            .filter(|(i, _)| *i == index)
            .map(|(_, gt)| gt.to_string())
            .collect();
        log::warn!(
            "Conflicting genotypes for haplotype {}: {}",
            map.blocks()[index],
            calls.join(", ")
        );
    }

    resolved
        .into_iter()
        .filter(|(index, _)| !conflicting.contains(index))
        .map(|(_, gt)| gt)
        .collect()
}

/// Builds one single-sample record per genotype, ordered by the map's
/// sequence dictionary. REF is whichever SNP allele agrees with `reference`.
pub fn build_variant_records(
    genotypes: &[SnpGenotype],
    map: &HaplotypeMap,
    reference: &dyn ReferenceSequence,
    sample_id: &str,
) -> Result<VariantSet> {
    let mut variants = VariantSet::new(map.dictionary().clone());
    for gt in genotypes {
        let snp = &gt.snp;
        let base = reference.base_at(snp.chrom(), snp.pos())?;
        let (ref_allele, alt_allele) = if snp.allele1() == base {
            (snp.allele1(), snp.allele2())
        } else if snp.allele2() == base {
            (snp.allele2(), snp.allele1())
        } else {
            return Err(Error::Reference {
                contig: snp.chrom().to_string(),
                position: snp.pos(),
                message: format!(
                    "neither allele of {} ({}) agrees with reference base {}",
                    snp.name(),
                    snp.allele_string(),
                    base as char
                ),
            });
        };
        let index_of = |allele: u8| Some(usize::from(allele != ref_allele));

        let alleles = if gt.genotype.is_heterozygous() {
            vec![index_of(snp.allele1()), index_of(snp.allele2())]
        } else if gt.genotype.allele1() == snp.allele1() {
            vec![index_of(snp.allele1()); 2]
        } else {
            vec![index_of(snp.allele2()); 2]
        };

        let mut record = VariantRecord::new(snp.chrom(), snp.pos(), &[ref_allele]);
        record.id = Some(snp.name().to_string());
        record.alternates = vec![vec![alt_allele]];
        record.filters = Some(BTreeSet::new());
        record.genotypes = vec![SampleGenotype::unphased(sample_id, alleles)];
        if let Some(previous) = variants.insert(record)? {
            log::debug!(
                "Replacing record {} at {} with {}",
                previous.id.as_deref().unwrap_or("."),
                previous.locus(),
                snp.name()
            );
        }
    }
    log::info!(
        "Built {} variant records for {}",
        format_number_with_commas(variants.len()),
        sample_id
    );
    Ok(variants)
}

/// Header of a single-sample fingerprint VCF.
pub fn fingerprint_header(
    variants: &VariantSet,
    sample_id: &str,
    gender: Gender,
    reference_path: &Path,
) -> VcfHeader {
    VcfHeader::new(variants.dictionary().clone(), vec![sample_id.to_string()])
        .with_meta("fileDate", chrono::Local::now().format("%Y%m%d").to_string())
        .with_meta(
            "source",
            format!("{}-{}", env!("CARGO_PKG_NAME"), *FULL_VERSION),
        )
        .with_meta("reference", reference_path.display().to_string())
        .with_meta("gender", gender.abbreviation())
        .describe(variants.iter())
}

/// Writes the records of one fingerprint; stdout when `output` is `None`.
pub fn write_fingerprint_vcf(
    variants: &VariantSet,
    sample_id: &str,
    gender: Gender,
    reference_path: &Path,
    output: Option<&Path>,
) -> Result<()> {
    log::info!(
        "Writing out {} final genotypes",
        format_number_with_commas(variants.len())
    );
    let header = fingerprint_header(variants, sample_id, gender, reference_path);
    write_variant_records(&header, variants.iter(), output)?;
    Ok(())
}
