use crate::hapmap::SequenceDictionary;
use crate::utils::{Error, Result};
use std::collections::{btree_map, BTreeMap, BTreeSet};
use std::fmt;

/// Typed value of one INFO attribute.
#[derive(Debug, Clone)]
pub enum InfoValue {
    Flag,
    Integer(Vec<i32>),
    Float(Vec<f32>),
    String(Vec<String>),
}

impl PartialEq for InfoValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (InfoValue::Flag, InfoValue::Flag) => true,
            (InfoValue::Integer(a), InfoValue::Integer(b)) => a == b,
            // Bitwise so that missing (NaN-encoded) values compare equal.
            (InfoValue::Float(a), InfoValue::Float(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            (InfoValue::String(a), InfoValue::String(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for InfoValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fn join<T: ToString>(values: &[T]) -> String {
            values
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(",")
        }
        match self {
            InfoValue::Flag => Ok(()),
            InfoValue::Integer(values) => write!(f, "{}", join(values)),
            InfoValue::Float(values) => write!(f, "{}", join(values)),
            InfoValue::String(values) => write!(f, "{}", values.join(",")),
        }
    }
}

/// Genotype of one sample at one record. Allele indices follow VCF: 0 is
/// the reference, `None` is a no-call.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleGenotype {
    pub sample: String,
    pub alleles: Vec<Option<usize>>,
    pub phased: bool,
    pub phase_set: Option<i32>,
}

impl SampleGenotype {
    pub fn unphased(sample: impl Into<String>, alleles: Vec<Option<usize>>) -> Self {
        SampleGenotype {
            sample: sample.into(),
            alleles,
            phased: false,
            phase_set: None,
        }
    }

    pub fn is_called(&self) -> bool {
        !self.alleles.is_empty() && self.alleles.iter().all(|a| a.is_some())
    }

    pub fn is_heterozygous(&self) -> bool {
        self.is_called() && self.alleles.windows(2).any(|w| w[0] != w[1])
    }
}

impl fmt::Display for SampleGenotype {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let separator = if self.phased { "|" } else { "/" };
        let alleles = self
            .alleles
            .iter()
            .map(|a| a.map_or_else(|| ".".to_string(), |i| i.to_string()))
            .collect::<Vec<_>>()
            .join(separator);
        write!(f, "{}={}", self.sample, alleles)
    }
}

/// One locus of a variant file held in memory. Positions are 1-based.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantRecord {
    pub contig: String,
    pub position: u32,
    pub id: Option<String>,
    pub reference: Vec<u8>,
    pub alternates: Vec<Vec<u8>>,
    pub qual: Option<f32>,
    /// `None` when no filters were applied, an empty set for PASS.
    pub filters: Option<BTreeSet<String>>,
    pub info: BTreeMap<String, InfoValue>,
    pub genotypes: Vec<SampleGenotype>,
}

impl VariantRecord {
    pub fn new(contig: impl Into<String>, position: u32, reference: &[u8]) -> Self {
        VariantRecord {
            contig: contig.into(),
            position,
            id: None,
            reference: reference.to_vec(),
            alternates: Vec::new(),
            qual: None,
            filters: None,
            info: BTreeMap::new(),
            genotypes: Vec::new(),
        }
    }

    pub fn locus(&self) -> String {
        format!("{}:{}", self.contig, self.position)
    }

    /// All alleles, reference first.
    pub fn alleles(&self) -> impl Iterator<Item = &[u8]> {
        std::iter::once(self.reference.as_slice()).chain(self.alternates.iter().map(|a| a.as_slice()))
    }

    pub fn allele(&self, index: usize) -> Option<&[u8]> {
        self.alleles().nth(index)
    }

    pub fn is_snp(&self) -> bool {
        self.reference.len() == 1 && self.alternates.iter().all(|alt| alt.len() == 1)
    }

    /// Recomputes the AC/AF/AN chromosome counts from the sample genotypes.
    /// AF is 0 for every alternate when no allele was called.
    pub fn recalculate_allele_counts(&mut self) {
        let mut counts = vec![0i32; self.alternates.len()];
        let mut total = 0i32;
        for allele in self.genotypes.iter().flat_map(|gt| gt.alleles.iter()).flatten() {
            total += 1;
            if *allele > 0 {
                if let Some(count) = counts.get_mut(*allele - 1) {
                    *count += 1;
                }
            }
        }
        let frequencies = counts
            .iter()
            .map(|&count| {
                if total == 0 {
                    0.0
                } else {
                    count as f32 / total as f32
                }
            })
            .collect();
        self.info.insert("AC".to_string(), InfoValue::Integer(counts));
        self.info
            .insert("AF".to_string(), InfoValue::Float(frequencies));
        self.info
            .insert("AN".to_string(), InfoValue::Integer(vec![total]));
    }
}

/// Records ordered by `(dictionary index of contig, position)`. Inserting a
/// record at an occupied locus replaces the previous record.
#[derive(Debug, Clone)]
pub struct VariantSet {
    dictionary: SequenceDictionary,
    records: BTreeMap<(usize, u32), VariantRecord>,
}

impl VariantSet {
    pub fn new(dictionary: SequenceDictionary) -> Self {
        VariantSet {
            dictionary,
            records: BTreeMap::new(),
        }
    }

    pub fn dictionary(&self) -> &SequenceDictionary {
        &self.dictionary
    }

    /// Returns the record previously stored at the same locus, if any.
    pub fn insert(&mut self, record: VariantRecord) -> Result<Option<VariantRecord>> {
        let contig_index = self
            .dictionary
            .index_of(&record.contig)
            .ok_or_else(|| Error::UnknownContig(record.contig.clone()))?;
        Ok(self.records.insert((contig_index, record.position), record))
    }

    pub fn get(&self, contig: &str, position: u32) -> Option<&VariantRecord> {
        let contig_index = self.dictionary.index_of(contig)?;
        self.records.get(&(contig_index, position))
    }

    pub fn iter(&self) -> impl Iterator<Item = &VariantRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sample names in first-seen order across all records.
    pub fn samples(&self) -> Vec<String> {
        let mut samples: Vec<String> = Vec::new();
        for gt in self.iter().flat_map(|record| record.genotypes.iter()) {
            if !samples.contains(&gt.sample) {
                samples.push(gt.sample.clone());
            }
        }
        samples
    }
}

impl IntoIterator for VariantSet {
    type Item = VariantRecord;
    type IntoIter = btree_map::IntoValues<(usize, u32), VariantRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_values()
    }
}
