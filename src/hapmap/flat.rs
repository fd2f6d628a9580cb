//! Tab-delimited haplotype map encoding.
//!
//! A block of `@` header lines (sequence dictionary) is followed by one row
//! per SNP: `chrom, pos, name, major, minor, maf[, anchor[, panels]]`. Rows
//! without an anchor, or anchored on themselves, start a block.

use super::map::MapContents;
use super::{HaplotypeBlockBuilder, HaplotypeMap, SequenceDictionary};
use crate::genotype::Snp;
use crate::utils::{is_gzipped, open_text_reader, Error, Result};
use flate2::{write::GzEncoder, Compression};
use itertools::Itertools;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::Path;

pub const COLUMN_HEADER: &str =
    "#CHROMOSOME\tPOSITION\tNAME\tMAJOR_ALLELE\tMINOR_ALLELE\tMAF\tANCHOR_SNP\tPANELS";

pub(crate) fn parse_path(path: &Path) -> Result<MapContents> {
    let reader = open_text_reader(path)?;
    parse(reader, &path.display().to_string())
}

pub(crate) fn parse<R: BufRead>(reader: R, source: &str) -> Result<MapContents> {
    let mut lines = reader.lines().enumerate().peekable();

    let mut header = Vec::new();
    while let Some((_, line)) = lines.next_if(|(_, line)| {
        line.as_ref().map_or(false, |l| l.starts_with('@'))
    }) {
        header.push(line.map_err(|e| Error::io(source, e))?);
    }
    if header.is_empty() {
        return Err(Error::malformed(
            source,
            "haplotype map file must contain a header",
        ));
    }
    let dictionary = SequenceDictionary::decode(&header)?;

    let mut builders: Vec<HaplotypeBlockBuilder> = Vec::new();
    let mut anchors: HashMap<String, usize> = HashMap::new();
    let mut pending: Vec<(usize, String, Snp)> = Vec::new();

    for (i, line) in lines {
        let line_number = i + 1;
        let line = line.map_err(|e| Error::io(source, e))?;
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let location = format!("{} line {}", source, line_number);
        let row = parse_row(&line).map_err(|message| Error::malformed(&location, message))?;
        log::trace!("{}: {} at {}", location, row.snp.name(), row.snp);

        match row.anchor {
            Some(anchor) if anchor != row.snp.name() => {
                pending.push((line_number, anchor, row.snp));
            }
            _ => {
                let name = row.snp.name().to_string();
                if anchors.contains_key(&name) {
                    return Err(Error::DuplicateSnp(name));
                }
                let mut builder = HaplotypeBlockBuilder::new(row.snp.maf());
                builder.add_snp(row.snp)?;
                anchors.insert(name, builders.len());
                builders.push(builder);
            }
        }
    }

    for (line_number, anchor, snp) in pending {
        let index = *anchors
            .get(&anchor)
            .ok_or_else(|| Error::MissingAnchor(anchor.clone()))?;
        builders[index].add_snp(snp).map_err(|e| {
            Error::malformed(format!("{} line {}", source, line_number), e.to_string())
        })?;
    }

    let blocks = builders
        .into_iter()
        .map(|builder| builder.build())
        .collect::<Result<Vec<_>>>()?;
    Ok(MapContents { dictionary, blocks })
}

struct Row {
    snp: Snp,
    anchor: Option<String>,
}

fn parse_row(line: &str) -> std::result::Result<Row, String> {
    let mut fields: Vec<&str> = line.split('\t').collect();
    while fields.len() > 1 && fields.last().is_some_and(|f| f.is_empty()) {
        fields.pop();
    }
    if fields.len() < 6 || fields.len() > 8 {
        return Err(format!(
            "Invalid haplotype map record contains {} fields: {}",
            fields.len(),
            line
        ));
    }

    let chrom = fields[0];
    let pos = fields[1]
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("Invalid position '{}'", fields[1]))?;
    let name = fields[2];
    let allele = |field: &str| {
        field
            .trim()
            .bytes()
            .next()
            .ok_or_else(|| format!("Missing allele for snp {}", name))
    };
    let major = allele(fields[3])?;
    let minor = allele(fields[4])?;
    let maf = fields[5]
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("Invalid minor allele frequency '{}'", fields[5]))?;
    let anchor = fields
        .get(6)
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .map(|a| a.to_string());
    let panels = fields
        .get(7)
        .map(|p| {
            p.split(',')
                .filter(|panel| !panel.is_empty())
                .map(|panel| panel.to_string())
                .collect()
        })
        .unwrap_or_default();

    let snp = Snp::new(name, chrom, pos, major, minor, maf, panels).map_err(|e| e.to_string())?;
    Ok(Row { snp, anchor })
}

struct FlatEntry<'a> {
    snp: &'a Snp,
    anchor: Option<&'a str>,
    panels: String,
}

/// Rows of every block; the SNP that carries the block MAF has no anchor,
/// the others are anchored on it.
fn entries(map: &HaplotypeMap) -> Vec<FlatEntry<'_>> {
    let mut entries = Vec::with_capacity(map.snp_count());
    for block in map.blocks() {
        let anchor = block.haplotype_snp().name();
        for snp in block.snps() {
            entries.push(FlatEntry {
                snp,
                anchor: (snp.name() != anchor).then_some(anchor),
                panels: snp.panels().iter().sorted().join(","),
            });
        }
    }

    let dictionary = map.dictionary();
    entries.sort_by(|a, b| {
        dictionary
            .compare_loci((a.snp.chrom(), a.snp.pos()), (b.snp.chrom(), b.snp.pos()))
            .then_with(|| a.snp.name().cmp(b.snp.name()))
            .then_with(|| a.snp.allele1().cmp(&b.snp.allele1()))
            .then_with(|| a.snp.allele2().cmp(&b.snp.allele2()))
            .then_with(|| a.snp.maf().total_cmp(&b.snp.maf()))
            .then_with(|| a.anchor.cmp(&b.anchor))
            .then_with(|| a.panels.cmp(&b.panels))
    });
    entries
}

pub(crate) fn write<W: Write>(map: &HaplotypeMap, out: &mut W) -> std::io::Result<()> {
    for line in map.dictionary().encode() {
        writeln!(out, "{}", line)?;
    }
    writeln!(out, "{}", COLUMN_HEADER)?;
    for entry in entries(map) {
        let snp = entry.snp;
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            snp.chrom(),
            snp.pos(),
            snp.name(),
            snp.allele1() as char,
            snp.allele2() as char,
            snp.maf(),
            entry.anchor.unwrap_or(""),
            entry.panels
        )?;
    }
    out.flush()
}

pub(crate) fn write_path(map: &HaplotypeMap, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut out: Box<dyn Write> = if is_gzipped(path) {
        Box::new(GzEncoder::new(BufWriter::new(file), Compression::default()))
    } else {
        Box::new(BufWriter::new(file))
    };
    write(map, &mut out).map_err(|e| Error::io(path, e))?;
    log::info!(
        "Wrote {} snps in {} haplotype blocks to {}",
        map.snp_count(),
        map.blocks().len(),
        path.display()
    );
    Ok(())
}
