use super::protocol::LodScore;
use itertools::Itertools;
use std::collections::HashMap;
use std::io::{self, Write};

/// One `observed<TAB>expected<TAB>lod` row per score.
pub fn write_lod_table<W: Write>(scores: &[LodScore], out: &mut W) -> io::Result<()> {
    writeln!(out, "observed\texpected\tlod")?;
    for score in scores {
        writeln!(
            out,
            "{}\t{}\t{:.4}",
            score.observed_sample, score.expected_sample, score.lod_score
        )?;
    }
    out.flush()
}

/// Pairwise LOD matrix: observed samples as rows, expected samples as
/// columns, both in first-seen order. Pairs without a score are left empty.
pub fn write_lod_matrix<W: Write>(scores: &[LodScore], out: &mut W) -> io::Result<()> {
    let observed: Vec<&str> = scores
        .iter()
        .map(|s| s.observed_sample.as_str())
        .unique()
        .collect();
    let expected: Vec<&str> = scores
        .iter()
        .map(|s| s.expected_sample.as_str())
        .unique()
        .collect();
    let lookup: HashMap<(&str, &str), f64> = scores
        .iter()
        .map(|s| ((s.observed_sample.as_str(), s.expected_sample.as_str()), s.lod_score))
        .collect();

    writeln!(out, "\t{}", expected.iter().join("\t"))?;
    for o in &observed {
        let row = expected
            .iter()
            .map(|e| {
                lookup
                    .get(&(*o, *e))
                    .map(|lod| format!("{:.4}", lod))
                    .unwrap_or_default()
            })
            .join("\t");
        writeln!(out, "{}\t{}", o, row)?;
    }
    out.flush()
}
