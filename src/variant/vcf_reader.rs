use super::{InfoValue, SampleGenotype, VariantRecord};
use crate::hapmap::{SequenceDictionary, SequenceRecord};
use crate::utils::Result;
use rust_htslib::bcf::{
    self,
    header::{HeaderView, TagType},
    record::GenotypeAllele,
    HeaderRecord, Read,
};
use std::path::Path;

const MISSING_INTEGER: i32 = i32::MIN;
const VECTOR_END_INTEGER: i32 = i32::MIN + 1;

/// Contents of a variant file loaded fully into memory.
#[derive(Debug, Clone)]
pub struct VariantFile {
    pub dictionary: SequenceDictionary,
    pub samples: Vec<String>,
    /// `##key=value` header lines other than the structured ones.
    pub meta: Vec<(String, String)>,
    pub records: Vec<VariantRecord>,
}

struct RecordLayout {
    info: Vec<(String, TagType)>,
    has_genotypes: bool,
    phase_set: Option<TagType>,
}

pub fn read_variant_records(path: &Path) -> Result<VariantFile> {
    log::debug!("Start loading VCF {}", path.display());
    let mut reader = bcf::Reader::from_path(path)
        .map_err(|e| format!("Failed to open VCF file {}: {}", path.display(), e))?;
    let header = reader.header().clone();

    let dictionary = contig_dictionary(&header)?;
    let samples: Vec<String> = header
        .samples()
        .iter()
        .map(|s| String::from_utf8_lossy(s).into_owned())
        .collect();
    let meta = header
        .header_records()
        .into_iter()
        .filter_map(|record| match record {
            HeaderRecord::Generic { key, value } => Some((key, value)),
            _ => None,
        })
        .collect();
    let layout = record_layout(&header)?;

    let mut records = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = result.map_err(|e| {
            format!("Failed to read record {} of {}: {}", i + 1, path.display(), e)
        })?;
        records.push(convert_record(&header, &record, &samples, &layout)?);
    }
    log::debug!(
        "Finished loading VCF {} ({} records)",
        path.display(),
        records.len()
    );

    Ok(VariantFile {
        dictionary,
        samples,
        meta,
        records,
    })
}

fn contig_dictionary(header: &HeaderView) -> Result<SequenceDictionary> {
    let mut sequences = Vec::new();
    for record in header.header_records() {
        if let HeaderRecord::Contig { values, .. } = record {
            let name = values
                .get("ID")
                .ok_or("Contig header line without ID")?
                .to_string();
            let length = match values.get("length") {
                Some(length) => Some(
                    length
                        .parse::<u64>()
                        .map_err(|_| format!("Invalid length for contig {}: {}", name, length))?,
                ),
                None => None,
            };
            sequences.push(SequenceRecord::new(name, length));
        }
    }
    SequenceDictionary::from_sequences(sequences)
}

fn record_layout(header: &HeaderView) -> Result<RecordLayout> {
    let mut info = Vec::new();
    let mut has_genotypes = false;
    let mut phase_set = None;
    for record in header.header_records() {
        match record {
            HeaderRecord::Info { values, .. } => {
                if let Some(id) = values.get("ID") {
                    let (tag_type, _) = header.info_type(id.as_bytes())?;
                    info.push((id.to_string(), tag_type));
                }
            }
            HeaderRecord::Format { values, .. } => match values.get("ID").map(|s| s.as_str()) {
                Some("GT") => has_genotypes = true,
                Some("PS") => phase_set = Some(header.format_type(b"PS")?.0),
                _ => {}
            },
            _ => {}
        }
    }
    Ok(RecordLayout {
        info,
        has_genotypes,
        phase_set,
    })
}

fn convert_record(
    header: &HeaderView,
    record: &bcf::Record,
    samples: &[String],
    layout: &RecordLayout,
) -> Result<VariantRecord> {
    let rid = record.rid().ok_or("Record without contig")?;
    let contig = String::from_utf8_lossy(header.rid2name(rid)?).into_owned();
    let position = u32::try_from(record.pos() + 1)
        .map_err(|_| format!("Invalid position {} on {}", record.pos() + 1, contig))?;

    let alleles = record.alleles();
    let (reference, alternates) = alleles
        .split_first()
        .ok_or_else(|| format!("Record without alleles at {}:{}", contig, position))?;

    let id = match record.id() {
        id if id == b"." || id.is_empty() => None,
        id => Some(String::from_utf8_lossy(&id).into_owned()),
    };

    let qual = Some(record.qual()).filter(|q| !q.is_nan());

    let filter_ids: Vec<_> = record.filters().collect();
    let filters = if filter_ids.is_empty() {
        None
    } else {
        Some(
            filter_ids
                .into_iter()
                .map(|id| String::from_utf8_lossy(&header.id_to_name(id)).into_owned())
                .filter(|name| name != "PASS")
                .collect(),
        )
    };

    let mut converted = VariantRecord::new(contig, position, reference);
    converted.id = id;
    converted.alternates = alternates.iter().map(|a| a.to_vec()).collect();
    converted.qual = qual;
    converted.filters = filters;

    for (tag, tag_type) in &layout.info {
        let mut info = record.info(tag.as_bytes());
        let value = match tag_type {
            TagType::Flag => info.flag()?.then_some(InfoValue::Flag),
            TagType::Integer => info.integer()?.map(|v| InfoValue::Integer(v.to_vec())),
            TagType::Float => info.float()?.map(|v| InfoValue::Float(v.to_vec())),
            TagType::String => info.string()?.map(|v| {
                InfoValue::String(
                    v.iter()
                        .map(|s| String::from_utf8_lossy(s).into_owned())
                        .collect(),
                )
            }),
        };
        if let Some(value) = value {
            converted.info.insert(tag.clone(), value);
        }
    }

    if layout.has_genotypes && !samples.is_empty() {
        let phase_sets = read_phase_sets(record, samples.len(), layout.phase_set.as_ref());
        let genotypes = record.genotypes()?;
        for (i, sample) in samples.iter().enumerate() {
            let genotype = genotypes.get(i);
            let mut phased = false;
            let mut sample_alleles = Vec::with_capacity(genotype.len());
            for (j, allele) in genotype.iter().enumerate() {
                if j > 0
                    && matches!(
                        allele,
                        GenotypeAllele::Phased(_) | GenotypeAllele::PhasedMissing
                    )
                {
                    phased = true;
                }
                sample_alleles.push(allele.index().map(|index| index as usize));
            }
            converted.genotypes.push(SampleGenotype {
                sample: sample.clone(),
                alleles: sample_alleles,
                phased,
                phase_set: phase_sets.get(i).copied().flatten(),
            });
        }
    }

    Ok(converted)
}

/// Phase set per sample. Records without a PS value yield `None` for every
/// sample; string-typed PS values are parsed as integers.
fn read_phase_sets(
    record: &bcf::Record,
    n_samples: usize,
    tag_type: Option<&TagType>,
) -> Vec<Option<i32>> {
    let values = match tag_type {
        Some(TagType::Integer) => record.format(b"PS").integer().ok().map(|values| {
            values
                .iter()
                .map(|v| {
                    v.first()
                        .copied()
                        .filter(|ps| *ps != MISSING_INTEGER && *ps != VECTOR_END_INTEGER)
                })
                .collect::<Vec<_>>()
        }),
        Some(TagType::String) => record.format(b"PS").string().ok().map(|values| {
            values
                .iter()
                .map(|v| String::from_utf8_lossy(v).trim().parse::<i32>().ok())
                .collect::<Vec<_>>()
        }),
        _ => None,
    };
    values.unwrap_or_else(|| vec![None; n_samples])
}
