use crate::utils::{Error, Result};
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct SequenceRecord {
    pub name: String,
    pub length: Option<u64>,
    /// Any further `TAG:value` pairs of the `@SQ` line, in input order.
    pub tags: Vec<(String, String)>,
}

impl SequenceRecord {
    pub fn new(name: impl Into<String>, length: Option<u64>) -> Self {
        SequenceRecord {
            name: name.into(),
            length,
            tags: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum HeaderLine {
    Sequence(usize),
    Other(String),
}

/// Ordered contigs of a genome build, as carried by a SAM-style `@` header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SequenceDictionary {
    lines: Vec<HeaderLine>,
    sequences: Vec<SequenceRecord>,
    index: HashMap<String, usize>,
}

impl SequenceDictionary {
    pub fn from_sequences(sequences: Vec<SequenceRecord>) -> Result<Self> {
        let mut dictionary = SequenceDictionary::default();
        dictionary
            .lines
            .push(HeaderLine::Other("@HD\tVN:1.6".to_string()));
        for sequence in sequences {
            dictionary.push_sequence(sequence)?;
        }
        Ok(dictionary)
    }

    /// Decodes the `@`-prefixed header lines of a flat haplotype map.
    pub fn decode<S: AsRef<str>>(lines: &[S]) -> Result<Self> {
        let mut dictionary = SequenceDictionary::default();
        for (i, line) in lines.iter().enumerate() {
            let line = line.as_ref();
            let location = format!("header line {}", i + 1);
            if !line.starts_with('@') {
                return Err(Error::malformed(location, "header lines must start with '@'"));
            }
            match line.strip_prefix("@SQ\t") {
                Some(fields) => {
                    let sequence = parse_sequence_line(fields).map_err(|message| {
                        Error::malformed(&location, format!("{}: {}", message, line))
                    })?;
                    dictionary.push_sequence(sequence).map_err(|e| {
                        Error::malformed(&location, e.to_string())
                    })?;
                }
                None => dictionary.lines.push(HeaderLine::Other(line.to_string())),
            }
        }
        Ok(dictionary)
    }

    pub fn encode(&self) -> Vec<String> {
        self.lines
            .iter()
            .map(|line| match line {
                HeaderLine::Other(text) => text.clone(),
                HeaderLine::Sequence(i) => encode_sequence_line(&self.sequences[*i]),
            })
            .collect()
    }

    pub fn vcf_contig_lines(&self) -> Vec<String> {
        self.sequences
            .iter()
            .map(|sequence| match sequence.length {
                Some(length) => format!("##contig=<ID={},length={}>", sequence.name, length),
                None => format!("##contig=<ID={}>", sequence.name),
            })
            .collect()
    }

    fn push_sequence(&mut self, sequence: SequenceRecord) -> Result<()> {
        if self.index.contains_key(&sequence.name) {
            return Err(format!("Duplicate sequence name: {}", sequence.name).into());
        }
        let i = self.sequences.len();
        self.index.insert(sequence.name.clone(), i);
        self.sequences.push(sequence);
        self.lines.push(HeaderLine::Sequence(i));
        Ok(())
    }

    pub fn index_of(&self, contig: &str) -> Option<usize> {
        self.index.get(contig).copied()
    }

    pub fn sequences(&self) -> &[SequenceRecord] {
        &self.sequences
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// Orders loci by contig index, then position. Contigs missing from the
    /// dictionary sort before all known contigs.
    pub fn compare_loci(&self, lhs: (&str, u32), rhs: (&str, u32)) -> Ordering {
        self.index_of(lhs.0)
            .cmp(&self.index_of(rhs.0))
            .then_with(|| lhs.1.cmp(&rhs.1))
    }
}

fn parse_sequence_line(fields: &str) -> std::result::Result<SequenceRecord, String> {
    let mut name = None;
    let mut length = None;
    let mut tags = Vec::new();
    for field in fields.split('\t') {
        let (tag, value) = field
            .split_once(':')
            .ok_or_else(|| format!("Malformed tag '{}'", field))?;
        match tag {
            "SN" => name = Some(value.to_string()),
            "LN" => {
                length = Some(
                    value
                        .parse::<u64>()
                        .map_err(|_| format!("Invalid sequence length '{}'", value))?,
                )
            }
            _ => tags.push((tag.to_string(), value.to_string())),
        }
    }
    let name = name.ok_or("Missing SN tag")?;
    Ok(SequenceRecord { name, length, tags })
}

fn encode_sequence_line(sequence: &SequenceRecord) -> String {
    let mut line = format!("@SQ\tSN:{}", sequence.name);
    if let Some(length) = sequence.length {
        line.push_str(&format!("\tLN:{}", length));
    }
    for (tag, value) in &sequence.tags {
        line.push_str(&format!("\t{}:{}", tag, value));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_encode() {
        let lines = [
            "@HD\tVN:1.6\tSO:coordinate",
            "@SQ\tSN:chr1\tLN:1000\tAS:GRCh37",
            "@SQ\tSN:chr10\tLN:500",
            "@SQ\tSN:chr2\tLN:800",
        ];
        let dictionary = SequenceDictionary::decode(&lines).unwrap();
        assert_eq!(dictionary.len(), 3);
        assert_eq!(dictionary.index_of("chr1"), Some(0));
        assert_eq!(dictionary.index_of("chr10"), Some(1));
        assert_eq!(dictionary.index_of("chr2"), Some(2));
        assert_eq!(dictionary.index_of("chrX"), None);
        assert_eq!(dictionary.encode(), lines.to_vec());
    }

    #[test]
    fn test_compare_loci_uses_dictionary_order() {
        let dictionary = SequenceDictionary::decode(&["@SQ\tSN:2\tLN:10", "@SQ\tSN:10\tLN:10"])
            .unwrap();
        assert_eq!(dictionary.compare_loci(("2", 9), ("10", 1)), Ordering::Less);
        assert_eq!(dictionary.compare_loci(("10", 1), ("10", 2)), Ordering::Less);
        assert_eq!(dictionary.compare_loci(("X", 100), ("2", 1)), Ordering::Less);
    }

    #[test]
    fn test_decode_errors() {
        assert!(SequenceDictionary::decode(&["@SQ\tLN:10"]).is_err());
        assert!(SequenceDictionary::decode(&["@SQ\tSN:1\tLN:ten"]).is_err());
        assert!(SequenceDictionary::decode(&["SQ\tSN:1"]).is_err());
        assert!(SequenceDictionary::decode(&["@SQ\tSN:1", "@SQ\tSN:1"]).is_err());
    }

    #[test]
    fn test_vcf_contig_lines() {
        let dictionary = SequenceDictionary::from_sequences(vec![
            SequenceRecord::new("1", Some(100)),
            SequenceRecord::new("2", None),
        ])
        .unwrap();
        assert_eq!(
            dictionary.vcf_contig_lines(),
            vec!["##contig=<ID=1,length=100>", "##contig=<ID=2>"]
        );
        assert_eq!(dictionary.encode()[0], "@HD\tVN:1.6");
    }
}
