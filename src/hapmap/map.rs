use super::{flat, vcf, HaplotypeBlock, SequenceDictionary};
use crate::genotype::Snp;
use crate::utils::{Error, ReferenceSequence, Result};
use crate::variant::VariantRecord;
use once_cell::sync::OnceCell;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// On-disk encodings of a haplotype map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    FlatFile,
    VariantFile,
}

impl SourceFormat {
    pub fn detect(path: &Path) -> SourceFormat {
        let name = path.to_string_lossy().to_lowercase();
        if [".vcf", ".vcf.gz", ".vcf.bgz", ".bcf"]
            .iter()
            .any(|ext| name.ends_with(ext))
        {
            SourceFormat::VariantFile
        } else {
            SourceFormat::FlatFile
        }
    }
}

/// What either parser produces before the indices are built.
#[derive(Debug)]
pub(crate) struct MapContents {
    pub dictionary: SequenceDictionary,
    pub blocks: Vec<HaplotypeBlock>,
}

/// One 1-based, single-base interval per SNP of the map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interval {
    pub contig: String,
    pub start: u32,
    pub end: u32,
    pub name: String,
}

/// Haplotype blocks of a genome build together with lookup indices by SNP
/// name, by locus and a sorted interval list.
#[derive(Debug, Clone)]
pub struct HaplotypeMap {
    dictionary: SequenceDictionary,
    blocks: Vec<HaplotypeBlock>,
    by_name: HashMap<String, usize>,
    by_locus: HashMap<(String, u32), usize>,
    intervals: Vec<Interval>,
    sorted_intervals: OnceCell<Vec<Interval>>,
}

impl HaplotypeMap {
    pub fn new(dictionary: SequenceDictionary) -> Self {
        HaplotypeMap {
            dictionary,
            blocks: Vec::new(),
            by_name: HashMap::new(),
            by_locus: HashMap::new(),
            intervals: Vec::new(),
            sorted_intervals: OnceCell::new(),
        }
    }

    pub fn from_blocks(
        dictionary: SequenceDictionary,
        blocks: impl IntoIterator<Item = HaplotypeBlock>,
    ) -> Result<Self> {
        let mut map = HaplotypeMap::new(dictionary);
        for block in blocks {
            map.add_block(block)?;
        }
        Ok(map)
    }

    /// Loads a map from either encoding, chosen by file name.
    pub fn from_path(path: &Path) -> Result<Self> {
        let format = SourceFormat::detect(path);
        log::debug!("Loading haplotype map {} as {:?}", path.display(), format);
        let contents = match format {
            SourceFormat::FlatFile => flat::parse_path(path)?,
            SourceFormat::VariantFile => vcf::parse_path(path)?,
        };
        let map = HaplotypeMap::from_blocks(contents.dictionary, contents.blocks)?;
        log::info!(
            "Loaded {} haplotype blocks with {} snps from {}",
            map.blocks.len(),
            map.by_name.len(),
            path.display()
        );
        Ok(map)
    }

    /// Registers a block. Fails without modifying the map if any of its SNP
    /// names or loci is already registered.
    pub fn add_block(&mut self, block: HaplotypeBlock) -> Result<()> {
        let mut loci = HashSet::new();
        for snp in block.snps() {
            if self.by_name.contains_key(snp.name()) {
                return Err(Error::DuplicateSnp(snp.name().to_string()));
            }
            if self.by_locus.contains_key(&locus_key(snp)) || !loci.insert(locus_key(snp)) {
                return Err(Error::DuplicateSnp(format!("{} at {}", snp.name(), snp)));
            }
        }

        let index = self.blocks.len();
        for snp in block.snps() {
            self.by_name.insert(snp.name().to_string(), index);
            self.by_locus.insert(locus_key(snp), index);
            self.intervals.push(Interval {
                contig: snp.chrom().to_string(),
                start: snp.pos(),
                end: snp.pos(),
                name: snp.name().to_string(),
            });
        }
        self.blocks.push(block);
        self.sorted_intervals = OnceCell::new();
        Ok(())
    }

    pub fn dictionary(&self) -> &SequenceDictionary {
        &self.dictionary
    }

    pub fn blocks(&self) -> &[HaplotypeBlock] {
        &self.blocks
    }

    /// Block containing a SNP at the same locus as `snp`.
    pub fn haplotype_for_snp(&self, snp: &Snp) -> Option<&HaplotypeBlock> {
        self.haplotype_at(snp.chrom(), snp.pos())
    }

    pub fn haplotype_by_name(&self, name: &str) -> Option<&HaplotypeBlock> {
        self.by_name.get(name).map(|&i| &self.blocks[i])
    }

    pub(crate) fn block_index_by_name(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn haplotype_at(&self, chrom: &str, pos: u32) -> Option<&HaplotypeBlock> {
        self.by_locus
            .get(&(chrom.to_string(), pos))
            .map(|&i| &self.blocks[i])
    }

    pub fn snp_at(&self, chrom: &str, pos: u32) -> Option<&Snp> {
        self.haplotype_at(chrom, pos)?
            .snps()
            .find(|snp| snp.chrom() == chrom && snp.pos() == pos)
    }

    pub fn snp_by_name(&self, name: &str) -> Option<&Snp> {
        self.haplotype_by_name(name)?.snp(name)
    }

    pub fn all_snps(&self) -> impl Iterator<Item = &Snp> {
        self.blocks.iter().flat_map(|block| block.snps())
    }

    pub fn snp_count(&self) -> usize {
        self.by_name.len()
    }

    /// Intervals sorted by dictionary index, start and end.
    pub fn intervals(&self) -> &[Interval] {
        self.sorted_intervals.get_or_init(|| {
            let mut sorted = self.intervals.clone();
            sorted.sort_by(|a, b| {
                self.dictionary
                    .compare_loci((a.contig.as_str(), a.start), (b.contig.as_str(), b.start))
                    .then_with(|| a.end.cmp(&b.end))
            });
            sorted
        })
    }

    /// Copy of this map without the blocks whose anchor SNP lies on one of
    /// `chroms`.
    pub fn without_chromosomes(&self, chroms: &HashSet<String>) -> Result<HaplotypeMap> {
        HaplotypeMap::from_blocks(
            self.dictionary.clone(),
            self.blocks
                .iter()
                .filter(|block| !chroms.contains(block.first_snp().chrom()))
                .cloned(),
        )
    }

    pub fn write_flat(&self, path: &Path) -> Result<()> {
        flat::write_path(self, path)
    }

    /// Reference-style records of every SNP, oriented against `reference`.
    pub fn as_variants(&self, reference: &dyn ReferenceSequence) -> Result<Vec<VariantRecord>> {
        vcf::as_variants(self, reference)
    }

    pub fn write_vcf(
        &self,
        path: &Path,
        reference: &dyn ReferenceSequence,
        reference_path: Option<&Path>,
    ) -> Result<()> {
        vcf::write_path(self, path, reference, reference_path)
    }
}

fn locus_key(snp: &Snp) -> (String, u32) {
    (snp.chrom().to_string(), snp.pos())
}
