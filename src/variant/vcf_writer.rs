use super::{InfoValue, VariantRecord};
use crate::hapmap::SequenceDictionary;
use crate::utils::Result;
use once_cell::sync::Lazy;
use rust_htslib::bcf::{self, record::GenotypeAllele};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

const MISSING_INTEGER: i32 = i32::MIN;
const VECTOR_END_INTEGER: i32 = i32::MIN + 1;
static MISSING_FLOAT: Lazy<f32> = Lazy::new(|| f32::from_bits(0x7F80_0001));

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputType {
    Vcf { is_uncompressed: bool },
    Bcf { is_uncompressed: bool },
}

impl OutputType {
    pub fn infer_from_extension(path: &Path) -> OutputType {
        let path_lower = path.to_string_lossy().to_lowercase();
        match path_lower.as_str() {
            s if s.ends_with(".bcf.gz") => OutputType::Bcf {
                is_uncompressed: false,
            },
            s if s.ends_with(".vcf.gz") || s.ends_with(".vcf.bgz") => OutputType::Vcf {
                is_uncompressed: false,
            },
            s if s.ends_with(".bcf") => OutputType::Bcf {
                is_uncompressed: true,
            },
            _ => OutputType::Vcf {
                is_uncompressed: true,
            },
        }
    }

    fn parts(self) -> (bool, bcf::Format) {
        match self {
            OutputType::Vcf { is_uncompressed } => (is_uncompressed, bcf::Format::Vcf),
            OutputType::Bcf { is_uncompressed } => (is_uncompressed, bcf::Format::Bcf),
        }
    }
}

/// Header of an output variant file: meta lines, contigs, samples and the
/// INFO/FILTER/FORMAT definitions needed by the records to be written.
#[derive(Debug, Clone)]
pub struct VcfHeader {
    meta: Vec<(String, String)>,
    dictionary: SequenceDictionary,
    samples: Vec<String>,
    info: BTreeMap<String, String>,
    filters: BTreeSet<String>,
    phase_set: bool,
}

impl VcfHeader {
    pub fn new(dictionary: SequenceDictionary, samples: Vec<String>) -> Self {
        VcfHeader {
            meta: Vec::new(),
            dictionary,
            samples,
            info: BTreeMap::new(),
            filters: BTreeSet::new(),
            phase_set: false,
        }
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<String>) -> Self {
        self.meta.push((key.to_string(), value.into()));
        self
    }

    /// Overrides the generated definition of an INFO tag.
    pub fn with_info(mut self, id: &str, number: &str, kind: &str, description: &str) -> Self {
        self.info.insert(
            id.to_string(),
            format!(
                "##INFO=<ID={},Number={},Type={},Description=\"{}\">",
                id, number, kind, description
            ),
        );
        self
    }

    /// Registers every INFO tag, FILTER and PS value used by `records`.
    pub fn describe<'a>(mut self, records: impl IntoIterator<Item = &'a VariantRecord>) -> Self {
        for record in records {
            for (key, value) in &record.info {
                if !self.info.contains_key(key) {
                    let line = info_definition(key, value);
                    self.info.insert(key.clone(), line);
                }
            }
            if let Some(filters) = &record.filters {
                self.filters.extend(filters.iter().cloned());
            }
            if record.genotypes.iter().any(|gt| gt.phase_set.is_some()) {
                self.phase_set = true;
            }
        }
        self
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    fn to_bcf_header(&self) -> bcf::Header {
        let mut header = bcf::Header::new();
        for (key, value) in &self.meta {
            header.push_record(format!("##{}={}", key, value).as_bytes());
        }
        for line in self.dictionary.vcf_contig_lines() {
            header.push_record(line.as_bytes());
        }
        for line in self.info.values() {
            header.push_record(line.as_bytes());
        }
        for filter in &self.filters {
            let line = format!("##FILTER=<ID={},Description=\"{}\">", filter, filter);
            header.push_record(line.as_bytes());
        }
        header.push_record(b"##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">");
        if self.phase_set {
            header.push_record(
                b"##FORMAT=<ID=PS,Number=1,Type=Integer,Description=\"Phasing set (typically the position of the first variant in the set)\">",
            );
        }
        for sample in &self.samples {
            header.push_sample(sample.as_bytes());
        }
        header
    }
}

fn info_definition(key: &str, value: &InfoValue) -> String {
    let (number, kind, description) = match key {
        "AC" => ("A", "Integer", "Allele count in genotypes, for each ALT allele"),
        "AF" => ("A", "Float", "Allele Frequency, for each ALT allele"),
        "AN" => ("1", "Integer", "Total number of alleles in called genotypes"),
        "DP" => ("1", "Integer", "Approximate read depth"),
        _ => match value {
            InfoValue::Flag => ("0", "Flag", key),
            InfoValue::Integer(_) => (".", "Integer", key),
            InfoValue::Float(_) => (".", "Float", key),
            InfoValue::String(_) => (".", "String", key),
        },
    };
    format!(
        "##INFO=<ID={},Number={},Type={},Description=\"{}\">",
        key, number, kind, description
    )
}

pub struct VcfWriter {
    writer: bcf::Writer,
    samples: Vec<String>,
    phase_set: bool,
}

impl VcfWriter {
    /// Writes to `output`, or to stdout as uncompressed VCF when no path is given.
    pub fn new(header: &VcfHeader, output: Option<&Path>) -> Result<Self> {
        let bcf_header = header.to_bcf_header();
        let writer = match output {
            Some(path) => {
                let (is_uncompressed, format) = OutputType::infer_from_extension(path).parts();
                log::debug!("Writing {:?} to {}", format, path.display());
                bcf::Writer::from_path(path, &bcf_header, is_uncompressed, format)
            }
            None => bcf::Writer::from_stdout(&bcf_header, true, bcf::Format::Vcf),
        }
        .map_err(|e| format!("Failed to create writer: {}", e))?;
        Ok(VcfWriter {
            writer,
            samples: header.samples.clone(),
            phase_set: header.phase_set,
        })
    }

    pub fn write(&mut self, variant: &VariantRecord) -> Result<()> {
        let mut record = self.writer.empty_record();
        let rid = self.writer.header().name2rid(variant.contig.as_bytes())?;
        record.set_rid(Some(rid));
        record.set_pos(i64::from(variant.position) - 1);
        if let Some(id) = &variant.id {
            record.set_id(id.as_bytes())?;
        }
        let alleles: Vec<&[u8]> = variant.alleles().collect();
        record.set_alleles(&alleles)?;
        record.set_qual(variant.qual.unwrap_or(*MISSING_FLOAT));

        if let Some(filters) = &variant.filters {
            if filters.is_empty() {
                record.push_filter("PASS".as_bytes())?;
            } else {
                for filter in filters {
                    record.push_filter(filter.as_bytes())?;
                }
            }
        }

        for (key, value) in &variant.info {
            let tag = key.as_bytes();
            match value {
                InfoValue::Flag => record.push_info_flag(tag)?,
                InfoValue::Integer(values) => record.push_info_integer(tag, values)?,
                InfoValue::Float(values) => record.push_info_float(tag, values)?,
                InfoValue::String(values) => {
                    let values: Vec<&[u8]> = values.iter().map(|v| v.as_bytes()).collect();
                    record.push_info_string(tag, &values)?
                }
            }
        }

        if !self.samples.is_empty() {
            record.push_format_integer(b"GT", &self.flatten_genotypes(variant))?;
            if self.phase_set && variant.genotypes.iter().any(|gt| gt.phase_set.is_some()) {
                let phase_sets: Vec<i32> = self
                    .samples
                    .iter()
                    .map(|sample| {
                        variant
                            .genotypes
                            .iter()
                            .find(|gt| &gt.sample == sample)
                            .and_then(|gt| gt.phase_set)
                            .unwrap_or(MISSING_INTEGER)
                    })
                    .collect();
                record.push_format_integer(b"PS", &phase_sets)?;
            }
        }

        self.writer
            .write(&record)
            .map_err(|e| format!("Failed to write {}: {}", variant.locus(), e))?;
        Ok(())
    }

    /// Encodes GT for every header sample, padding to the record's ploidy.
    /// Samples without a genotype at this record are written as no-calls.
    fn flatten_genotypes(&self, variant: &VariantRecord) -> Vec<i32> {
        let ploidy = variant
            .genotypes
            .iter()
            .map(|gt| gt.alleles.len())
            .max()
            .unwrap_or(2)
            .max(1);
        let mut values = Vec::with_capacity(ploidy * self.samples.len());
        for sample in &self.samples {
            let mut encoded: Vec<i32> = match variant.genotypes.iter().find(|gt| &gt.sample == sample) {
                Some(gt) => gt
                    .alleles
                    .iter()
                    .enumerate()
                    .map(|(j, allele)| {
                        let allele = match (allele, j > 0 && gt.phased) {
                            (Some(i), false) => GenotypeAllele::Unphased(*i as i32),
                            (Some(i), true) => GenotypeAllele::Phased(*i as i32),
                            (None, false) => GenotypeAllele::UnphasedMissing,
                            (None, true) => GenotypeAllele::PhasedMissing,
                        };
                        i32::from(allele)
                    })
                    .collect(),
                None => vec![i32::from(GenotypeAllele::UnphasedMissing); ploidy],
            };
            if encoded.is_empty() {
                encoded.push(i32::from(GenotypeAllele::UnphasedMissing));
            }
            encoded.resize(ploidy, VECTOR_END_INTEGER);
            values.extend(encoded);
        }
        values
    }
}

/// Writes `records` to `output` (stdout when `None`) under `header`.
pub fn write_variant_records<'a>(
    header: &VcfHeader,
    records: impl IntoIterator<Item = &'a VariantRecord>,
    output: Option<&Path>,
) -> Result<usize> {
    let mut writer = VcfWriter::new(header, output)?;
    let mut n = 0;
    for record in records {
        writer.write(record)?;
        n += 1;
    }
    Ok(n)
}
