use super::{read_variant_records, write_variant_records, InfoValue, VariantRecord, VcfHeader};
use crate::hapmap::SequenceDictionary;
use crate::utils::{format_number_with_commas, Error, Result};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::env;
use std::path::{Path, PathBuf};

/// INFO keys recomputed from the merged genotypes.
const ALLELE_COUNT_KEYS: [&str; 3] = ["AC", "AF", "AN"];

/// INFO keys that may differ between inputs: the allele counts, depth and
/// the per-sample allele balances.
const UNCHECKED_INFO_KEYS: [&str; 6] = ["AC", "AF", "AN", "DP", "devX_AB", "devY_AB"];

/// Merges records describing the same locus into one multi-sample record.
///
/// Contig, position, ID, REF and every ALT must agree with the first record.
/// Every other INFO attribute must be present with the same value in all
/// records, except for the allele counts, DP and the allele balances, which
/// are taken from the first record. Genotypes are concatenated, AC/AF/AN are
/// recomputed and DP is replaced by the summed depth when that is positive.
/// Returns `None` for an empty input.
pub fn merge_variant_sets(records: &[VariantRecord]) -> Result<Option<VariantRecord>> {
    let Some(first) = records.first() else {
        return Ok(None);
    };
    let inconsistent = |field: &str| Error::inconsistent(field, &first.contig, first.position);

    let mut merged = VariantRecord::new(first.contig.clone(), first.position, &first.reference);
    merged.id = first.id.clone();
    merged.alternates = first.alternates.clone();

    let mut depth = 0;
    let mut filters: Option<BTreeSet<String>> = None;
    for record in records {
        if record.contig != first.contig || record.position != first.position {
            return Err(inconsistent("loci"));
        }
        if record.id != first.id {
            return Err(inconsistent("ID"));
        }
        if record.reference != first.reference {
            return Err(inconsistent("REF"));
        }
        if record.alternates.len() != first.alternates.len() {
            return Err(inconsistent("ALT count"));
        }
        if record.alternates != first.alternates {
            return Err(inconsistent("ALT"));
        }
        for key in record.info.keys().chain(first.info.keys()) {
            if UNCHECKED_INFO_KEYS.contains(&key.as_str()) {
                continue;
            }
            if record.info.get(key) != first.info.get(key) {
                return Err(inconsistent(key.as_str()));
            }
        }

        if merged.qual.is_none() {
            merged.qual = record.qual;
        }
        if let Some(record_filters) = &record.filters {
            filters
                .get_or_insert_with(BTreeSet::new)
                .extend(record_filters.iter().cloned());
        }
        if let Some(InfoValue::Integer(values)) = record.info.get("DP") {
            depth += values.first().copied().filter(|&dp| dp > 0).unwrap_or(0);
        }
        merged.genotypes.extend(record.genotypes.iter().cloned());
    }

    merged.filters = filters;
    merged.info = first
        .info
        .iter()
        .filter(|(key, _)| !ALLELE_COUNT_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    if depth > 0 {
        merged
            .info
            .insert("DP".to_string(), InfoValue::Integer(vec![depth]));
    }
    merged.recalculate_allele_counts();
    Ok(Some(merged))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub merged: usize,
    pub failed: usize,
}

/// Merges single- or multi-sample fingerprint VCFs locus by locus and writes
/// one multi-sample VCF to `output` (stdout when `None`).
///
/// Loci are ordered by `dictionary`, or by the contigs of the first input
/// when none is given. An inconsistent locus aborts the merge when
/// `quit_on_error` is set and is logged and skipped otherwise.
pub fn merge_variant_files(
    paths: &[PathBuf],
    output: Option<&Path>,
    dictionary: Option<SequenceDictionary>,
    quit_on_error: bool,
) -> Result<MergeSummary> {
    if paths.is_empty() {
        return Err("No VCF files to merge".into());
    }
    let files = paths
        .iter()
        .map(|path| read_variant_records(path))
        .collect::<Result<Vec<_>>>()?;

    let mut samples = Vec::new();
    let mut seen = HashSet::new();
    for (path, file) in paths.iter().zip(&files) {
        for sample in &file.samples {
            if !seen.insert(sample.clone()) {
                return Err(format!(
                    "Duplicate sample {} in {}, sample names must be unique across inputs",
                    sample,
                    path.display()
                )
                .into());
            }
            samples.push(sample.clone());
        }
    }

    let dictionary = match dictionary {
        Some(dictionary) => dictionary,
        None => files[0].dictionary.clone(),
    };
    let reference = files[0]
        .meta
        .iter()
        .find(|(key, _)| key == "reference")
        .map(|(_, value)| value.clone());

    let mut loci: BTreeMap<(usize, u32), Vec<VariantRecord>> = BTreeMap::new();
    for file in files {
        for record in file.records {
            let contig_index = dictionary
                .index_of(&record.contig)
                .ok_or_else(|| Error::UnknownContig(record.contig.clone()))?;
            loci.entry((contig_index, record.position))
                .or_default()
                .push(record);
        }
    }

    let mut summary = MergeSummary::default();
    let mut merged = Vec::with_capacity(loci.len());
    for records in loci.into_values() {
        log::trace!("Processing: {}", records[0].locus());
        match merge_variant_sets(&records) {
            Ok(Some(record)) => {
                merged.push(record);
                summary.merged += 1;
            }
            Ok(None) => {}
            Err(e) => {
                if quit_on_error {
                    return Err(e);
                }
                summary.failed += 1;
                log::warn!("{} Skipping...", e);
            }
        }
    }

    let mut header = VcfHeader::new(dictionary, samples)
        .with_meta("fileDate", chrono::Local::now().format("%Y%m%d").to_string());
    if let Some(reference) = reference {
        header = header.with_meta("reference", reference);
    }
    let header = add_version_info(header).describe(&merged);
    write_variant_records(&header, &merged, output)?;

    let mut log_message = format!(
        "Successfully merged {} loci.",
        format_number_with_commas(summary.merged)
    );
    if summary.failed > 0 {
        log_message.push_str(&format!(
            " Failed to merge {} loci!",
            format_number_with_commas(summary.failed)
        ));
    }
    log::info!("{}", log_message);
    Ok(summary)
}

fn add_version_info(header: VcfHeader) -> VcfHeader {
    header
        .with_meta(
            &format!("{}Version", env!("CARGO_PKG_NAME")),
            crate::cli::FULL_VERSION.as_str(),
        )
        .with_meta(
            &format!("{}Command", env!("CARGO_PKG_NAME")),
            env::args().collect::<Vec<String>>().join(" "),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::SampleGenotype;
    use approx::assert_relative_eq;

    fn record(sample: &str, alleles: [usize; 2]) -> VariantRecord {
        let mut record = VariantRecord::new("1", 100, b"A");
        record.id = Some("rs1".to_string());
        record.alternates = vec![b"G".to_vec()];
        record.filters = Some(BTreeSet::new());
        record.genotypes = vec![SampleGenotype::unphased(
            sample,
            alleles.iter().map(|&a| Some(a)).collect(),
        )];
        record.recalculate_allele_counts();
        record
    }

    #[test]
    fn test_merge_recomputes_allele_counts() {
        let first = record("S1", [0, 1]);
        let mut second = record("S2", [1, 1]);
        second
            .info
            .insert("AC".to_string(), InfoValue::Integer(vec![7]));
        let merged = merge_variant_sets(&[first, second]).unwrap().unwrap();

        assert_eq!(merged.genotypes.len(), 2);
        assert_eq!(merged.info["AC"], InfoValue::Integer(vec![3]));
        assert_eq!(merged.info["AN"], InfoValue::Integer(vec![4]));
        match &merged.info["AF"] {
            InfoValue::Float(af) => assert_relative_eq!(af[0], 0.75),
            other => panic!("unexpected AF {}", other),
        }
        assert_eq!(merged.filters, Some(BTreeSet::new()));
    }

    #[test]
    fn test_merge_rejects_differing_reference() {
        let first = record("S1", [0, 1]);
        let mut second = record("S2", [0, 1]);
        second.reference = b"C".to_vec();
        match merge_variant_sets(&[first, second]).unwrap_err() {
            Error::InconsistentMerge { field, locus } => {
                assert_eq!(field, "REF");
                assert_eq!(locus, "1:100");
            }
            e => panic!("unexpected error {}", e),
        }
    }

    #[test]
    fn test_merge_checks_in_order() {
        let first = record("S1", [0, 1]);

        let mut moved = record("S2", [0, 1]);
        moved.position = 101;
        moved.id = None;
        assert!(matches!(
            merge_variant_sets(&[first.clone(), moved]),
            Err(Error::InconsistentMerge { field, .. }) if field == "loci"
        ));

        let mut renamed = record("S2", [0, 1]);
        renamed.id = Some("rs2".to_string());
        assert!(matches!(
            merge_variant_sets(&[first.clone(), renamed]),
            Err(Error::InconsistentMerge { field, .. }) if field == "ID"
        ));

        let mut multi = record("S2", [0, 1]);
        multi.alternates.push(b"T".to_vec());
        assert!(matches!(
            merge_variant_sets(&[first.clone(), multi]),
            Err(Error::InconsistentMerge { field, .. }) if field == "ALT count"
        ));

        let mut other_alt = record("S2", [0, 1]);
        other_alt.alternates = vec![b"T".to_vec()];
        assert!(matches!(
            merge_variant_sets(&[first, other_alt]),
            Err(Error::InconsistentMerge { field, .. }) if field == "ALT"
        ));
    }

    #[test]
    fn test_merge_attributes() {
        let mut first = record("S1", [0, 0]);
        first
            .info
            .insert("DP".to_string(), InfoValue::Integer(vec![10]));
        first
            .info
            .insert("SRC".to_string(), InfoValue::String(vec!["chip".to_string()]));
        let mut second = first.clone();
        second.genotypes[0].sample = "S2".to_string();
        second
            .info
            .insert("DP".to_string(), InfoValue::Integer(vec![5]));
        second.qual = Some(30.0);

        let merged = merge_variant_sets(&[first.clone(), second.clone()])
            .unwrap()
            .unwrap();
        assert_eq!(merged.info["DP"], InfoValue::Integer(vec![15]));
        assert_eq!(merged.info["SRC"], first.info["SRC"]);
        assert_eq!(merged.qual, Some(30.0));

        second
            .info
            .insert("SRC".to_string(), InfoValue::String(vec!["seq".to_string()]));
        assert!(matches!(
            merge_variant_sets(&[first, second]),
            Err(Error::InconsistentMerge { field, .. }) if field == "SRC"
        ));
    }

    #[test]
    fn test_merge_keeps_first_allele_balance_and_depth() {
        let mut first = record("S1", [0, 1]);
        first
            .info
            .insert("devX_AB".to_string(), InfoValue::Float(vec![0.1]));
        first
            .info
            .insert("DP".to_string(), InfoValue::Integer(vec![0]));
        let mut second = record("S2", [0, 1]);
        second
            .info
            .insert("devX_AB".to_string(), InfoValue::Float(vec![0.3]));

        let merged = merge_variant_sets(&[first, second]).unwrap().unwrap();
        assert_eq!(merged.info["devX_AB"], InfoValue::Float(vec![0.1]));
        assert_eq!(merged.info["DP"], InfoValue::Integer(vec![0]));
        assert_eq!(
            merged.info.keys().map(|k| k.as_str()).collect::<Vec<_>>(),
            vec!["AC", "AF", "AN", "DP", "devX_AB"]
        );
    }

    #[test]
    fn test_merge_rejects_missing_attribute() {
        let mut first = record("S1", [0, 1]);
        first
            .info
            .insert("SRC".to_string(), InfoValue::String(vec!["chip".to_string()]));
        let second = record("S2", [0, 1]);

        for records in [[first.clone(), second.clone()], [second, first]] {
            assert!(matches!(
                merge_variant_sets(&records),
                Err(Error::InconsistentMerge { field, .. }) if field == "SRC"
            ));
        }
    }

    #[test]
    fn test_merge_filters() {
        let mut first = record("S1", [0, 1]);
        first.filters = None;
        let mut second = record("S2", [0, 1]);
        second.filters = None;
        let merged = merge_variant_sets(&[first.clone(), second.clone()])
            .unwrap()
            .unwrap();
        assert_eq!(merged.filters, None);

        second.filters = Some(BTreeSet::from(["LowQual".to_string()]));
        let merged = merge_variant_sets(&[first, second]).unwrap().unwrap();
        assert_eq!(merged.filters, Some(BTreeSet::from(["LowQual".to_string()])));
    }

    #[test]
    fn test_merge_empty() {
        assert!(merge_variant_sets(&[]).unwrap().is_none());
    }
}
