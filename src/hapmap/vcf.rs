//! Reference-style (VCF) haplotype map encoding.
//!
//! Every SNP is one record carrying its allele frequency in `AF`. Blocks are
//! tied together through the `PS` phase set of the single sample; records
//! without one form a block of their own.

use super::map::MapContents;
use super::{HaplotypeBlockBuilder, HaplotypeMap};
use crate::cli::FULL_VERSION;
use crate::genotype::Snp;
use crate::utils::{Error, ReferenceSequence, Result};
use crate::variant::{
    read_variant_records, write_variant_records, InfoValue, SampleGenotype, VariantRecord,
    VariantSet, VcfHeader,
};
use itertools::Itertools;
use std::collections::HashMap;
use std::path::Path;

pub const HET_GENOTYPE_FOR_PHASING: &str = "HetGenotypeForPhasing";
const SYNTHETIC_PHASESET_PREFIX: &str = "Synthetic";
const PHASESET_PREFIX: &str = "PhaseSet";

pub(crate) fn parse_path(path: &Path) -> Result<MapContents> {
    let file = read_variant_records(path)?;
    let source = path.display().to_string();

    if file.dictionary.is_empty() {
        return Err(Error::malformed(
            &source,
            "haplotype map VCF file must contain contig header lines",
        ));
    }
    if file.samples.len() > 1 {
        return Err(Error::malformed(
            &source,
            "haplotype map VCF file must contain at most one sample",
        ));
    }

    let mut builders: Vec<HaplotypeBlockBuilder> = Vec::new();
    let mut anchors: HashMap<String, usize> = HashMap::new();
    for record in &file.records {
        let location = format!("{} {}", source, record.locus());
        let (anchor, snp) =
            snp_from_record(record).map_err(|message| Error::malformed(&location, message))?;
        let index = match anchors.get(&anchor) {
            Some(&index) => index,
            None => {
                anchors.insert(anchor, builders.len());
                builders.push(HaplotypeBlockBuilder::new(snp.maf()));
                builders.len() - 1
            }
        };
        builders[index]
            .add_snp(snp)
            .map_err(|e| Error::malformed(&location, e.to_string()))?;
    }

    let blocks = builders
        .into_iter()
        .map(|builder| builder.build())
        .collect::<Result<Vec<_>>>()?;
    Ok(MapContents {
        dictionary: file.dictionary,
        blocks,
    })
}

/// Validates one record and returns its block anchor key and SNP.
fn snp_from_record(record: &VariantRecord) -> std::result::Result<(String, Snp), String> {
    if record.alternates.len() != 1 {
        return Err("haplotype map VCF file must contain exactly one alternate allele per site".into());
    }
    if !record.is_snp() {
        return Err("haplotype map VCF file must contain only SNPs".into());
    }
    let frequency = allele_frequency(record)
        .ok_or("haplotype map variants must have an 'AF' INFO field")?;
    let name = record
        .id
        .clone()
        .ok_or("haplotype map variants must have an ID")?;

    let sample = record.genotypes.first();
    if let Some(gt) = sample.filter(|gt| gt.phased) {
        if gt.phase_set.is_none() {
            return Err("phased genotypes must have a phase set (PS)".into());
        }
        if !gt.is_heterozygous() {
            return Err("phased genotypes must be heterozygous".into());
        }
    }

    // The stored genotype lists the major allele first.
    let swapped = sample
        .filter(|gt| gt.is_called())
        .is_some_and(|gt| gt.alleles.first() != Some(&Some(0)));
    let reference = record.reference[0];
    let alternate = record.alternates[0][0];
    let (major, minor, maf) = if swapped {
        (alternate, reference, 1.0 - frequency)
    } else {
        (reference, alternate, frequency)
    };

    let anchor = match sample.and_then(|gt| gt.phase_set) {
        Some(phase_set) => format!("{}_{}_{}", PHASESET_PREFIX, record.contig, phase_set),
        None => format!(
            "{}_{}_{}",
            SYNTHETIC_PHASESET_PREFIX, record.contig, record.position
        ),
    };

    let snp = Snp::new(name, &record.contig, record.position, major, minor, maf, Vec::new())
        .map_err(|e| e.to_string())?;
    Ok((anchor, snp))
}

/// First AF value; floats go through their shortest decimal form so that
/// `0.2` stored as a 32-bit float reads back as `0.2`.
fn allele_frequency(record: &VariantRecord) -> Option<f64> {
    match record.info.get("AF")? {
        InfoValue::Float(values) => values
            .first()
            .filter(|v| !v.is_nan())
            .and_then(|v| v.to_string().parse::<f64>().ok()),
        InfoValue::Integer(values) => values.first().map(|&v| f64::from(v)),
        InfoValue::String(values) => values.first().and_then(|v| v.parse::<f64>().ok()),
        InfoValue::Flag => None,
    }
}

/// One record per SNP in dictionary order. REF is whichever map allele
/// agrees with `reference`; the genotype lists the major allele first and
/// SNPs of multi-SNP blocks carry the anchor position as phase set.
pub(crate) fn as_variants(
    map: &HaplotypeMap,
    reference: &dyn ReferenceSequence,
) -> Result<Vec<VariantRecord>> {
    let mut variants = VariantSet::new(map.dictionary().clone());
    for block in map.blocks() {
        let snps: Vec<&Snp> = block.snps().sorted().collect();
        let anchor_pos = snps[0].pos();
        let phase_set = if snps.len() > 1 {
            Some(i32::try_from(anchor_pos).map_err(|_| {
                format!("Phase set position {} out of range", anchor_pos)
            })?)
        } else {
            None
        };

        for snp in snps {
            let base = reference.base_at(snp.chrom(), snp.pos())?;
            let (ref_allele, alt_allele, frequency, alleles) = if snp.allele1() == base {
                (snp.allele1(), snp.allele2(), snp.maf(), vec![Some(0), Some(1)])
            } else if snp.allele2() == base {
                (snp.allele2(), snp.allele1(), 1.0 - snp.maf(), vec![Some(1), Some(0)])
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

            let mut record = VariantRecord::new(snp.chrom(), snp.pos(), &[ref_allele]);
            record.id = Some(snp.name().to_string());
            record.alternates = vec![vec![alt_allele]];
            record
                .info
                .insert("AF".to_string(), InfoValue::Float(vec![frequency as f32]));
            record.genotypes = vec![SampleGenotype {
                sample: HET_GENOTYPE_FOR_PHASING.to_string(),
                alleles,
                phased: false,
                phase_set,
            }];
            variants.insert(record)?;
        }
    }
    Ok(variants.into_iter().collect())
}

pub(crate) fn write_path(
    map: &HaplotypeMap,
    path: &Path,
    reference: &dyn ReferenceSequence,
    reference_path: Option<&Path>,
) -> Result<()> {
    let records = as_variants(map, reference)?;
    let reference_name = reference_path
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let header = VcfHeader::new(
        map.dictionary().clone(),
        vec![HET_GENOTYPE_FOR_PHASING.to_string()],
    )
    .with_meta("fileDate", chrono::Local::now().format("%Y%m%d").to_string())
    .with_meta(
        "source",
        format!("{}-{}", env!("CARGO_PKG_NAME"), *FULL_VERSION),
    )
    .with_meta("reference", reference_name)
    .with_info(
        "AF",
        "A",
        "Float",
        "Allele Frequency, for each ALT allele, in the same order as listed",
    )
    .describe(&records);
    let n = write_variant_records(&header, &records, Some(path))?;
    log::info!("Wrote {} haplotype map records to {}", n, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hapmap::{HaplotypeBlock, SequenceDictionary, SequenceRecord};
    use crate::utils::MemoryReference;
    use approx::assert_relative_eq;
    use std::io::Write;
    use tempfile::Builder;

    fn snp(name: &str, pos: u32, major: u8, minor: u8, maf: f64) -> Snp {
        Snp::new(name, "1", pos, major, minor, maf, vec![]).unwrap()
    }

    fn reference() -> MemoryReference {
        // position:   1234567890
        MemoryReference::new().with_contig("1", b"ACGTACGTAC")
    }

    fn map() -> HaplotypeMap {
        let dictionary =
            SequenceDictionary::from_sequences(vec![SequenceRecord::new("1", Some(10))]).unwrap();
        HaplotypeMap::from_blocks(
            dictionary,
            [
                // rs2 is stored with the non-reference allele as major
                HaplotypeBlock::new(
                    0.2,
                    [snp("rs1", 1, b'A', b'G', 0.2), snp("rs2", 3, b'T', b'G', 0.3)],
                )
                .unwrap(),
                HaplotypeBlock::new(0.4, [snp("rs3", 6, b'C', b'T', 0.4)]).unwrap(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_as_variants_orientation() {
        let variants = map().as_variants(&reference()).unwrap();
        assert_eq!(variants.len(), 3);

        let rs2 = &variants[1];
        assert_eq!(rs2.id.as_deref(), Some("rs2"));
        assert_eq!(rs2.reference, b"G".to_vec());
        assert_eq!(rs2.alternates, vec![b"T".to_vec()]);
        assert_eq!(rs2.genotypes[0].alleles, vec![Some(1), Some(0)]);
        assert_eq!(rs2.genotypes[0].phase_set, Some(1));
        match &rs2.info["AF"] {
            InfoValue::Float(af) => assert_relative_eq!(af[0], 0.7, epsilon = 1e-6),
            other => panic!("unexpected AF {:?}", other),
        }

        let rs3 = &variants[2];
        assert_eq!(rs3.genotypes[0].alleles, vec![Some(0), Some(1)]);
        assert_eq!(rs3.genotypes[0].phase_set, None);
    }

    #[test]
    fn test_unmatched_reference_is_fatal() {
        let reference = MemoryReference::new().with_contig("1", b"TTTTTTTTTT");
        assert!(matches!(
            map().as_variants(&reference),
            Err(Error::Reference { .. })
        ));
    }

    #[test]
    fn test_vcf_round_trip_preserves_orientation() {
        let original = map();
        let file = Builder::new().suffix(".vcf").tempfile().unwrap();
        original
            .write_vcf(file.path(), &reference(), Some(Path::new("ref.fa")))
            .unwrap();
        let reloaded = HaplotypeMap::from_path(file.path()).unwrap();

        assert_eq!(reloaded.blocks().len(), 2);
        for snp in original.all_snps() {
            let other = reloaded.snp_by_name(snp.name()).unwrap();
            assert_eq!(other.allele1(), snp.allele1(), "{}", snp.name());
            assert_eq!(other.allele2(), snp.allele2(), "{}", snp.name());
            assert_relative_eq!(other.maf(), snp.maf(), epsilon = 1e-6);
        }
        let block = reloaded.haplotype_by_name("rs1").unwrap();
        assert!(block.snp("rs2").is_some());
        assert_eq!(block.first_snp().name(), "rs1");
    }

    fn write_vcf(body: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(".vcf").tempfile().unwrap();
        write!(
            file,
            "##fileformat=VCFv4.2\n\
             ##contig=<ID=1,length=10>\n\
             ##INFO=<ID=AF,Number=A,Type=Float,Description=\"Allele Frequency\">\n\
             ##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">\n\
             ##FORMAT=<ID=PS,Number=1,Type=Integer,Description=\"Phase set\">\n\
             #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\n\
             {}",
            body
        )
        .unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_phase_sets_group_snps() {
        let file = write_vcf(
            "1\t1\trs1\tA\tG\t.\t.\tAF=0.2\tGT:PS\t0|1:1\n\
             1\t3\trs2\tG\tT\t.\t.\tAF=0.7\tGT:PS\t1|0:1\n\
             1\t8\trs3\tC\tT\t.\t.\tAF=0.4\tGT\t0/1\n",
        );
        let map = HaplotypeMap::from_path(file.path()).unwrap();
        assert_eq!(map.blocks().len(), 2);
        let block = map.haplotype_by_name("rs2").unwrap();
        assert_eq!(block.size(), 2);
        assert_relative_eq!(block.maf(), 0.2, epsilon = 1e-9);
        let rs2 = map.snp_by_name("rs2").unwrap();
        assert_eq!((rs2.allele1(), rs2.allele2()), (b'T', b'G'));
        assert_relative_eq!(rs2.maf(), 0.3, epsilon = 1e-6);
    }

    #[test]
    fn test_record_validation() {
        let cases = [
            "1\t1\trs1\tA\tG,C\t.\t.\tAF=0.2\tGT\t0/1\n",
            "1\t1\trs1\tAC\tG\t.\t.\tAF=0.2\tGT\t0/1\n",
            "1\t1\trs1\tA\tG\t.\t.\t.\tGT\t0/1\n",
            "1\t1\trs1\tA\tG\t.\t.\tAF=0.2\tGT\t0|1\n",
            "1\t1\trs1\tA\tG\t.\t.\tAF=0.2\tGT:PS\t1|1:1\n",
        ];
        for body in cases {
            let file = write_vcf(body);
            assert!(
                matches!(
                    HaplotypeMap::from_path(file.path()),
                    Err(Error::MalformedHaplotypeMap { .. })
                ),
                "{}",
                body
            );
        }
    }
}
