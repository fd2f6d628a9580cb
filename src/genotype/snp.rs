use super::{is_valid_base, DiploidGenotype, DiploidHaplotype};
use crate::utils::{Error, Result};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A biallelic SNP as described by a haplotype map.
///
/// Equality, hashing and ordering only consider the locus: two SNPs with
/// different names at the same chromosome and position compare equal.
#[derive(Debug, Clone)]
pub struct Snp {
    name: String,
    chrom: String,
    pos: u32,
    allele1: u8,
    allele2: u8,
    /// Frequency of `allele2`.
    maf: f64,
    panels: Vec<String>,
    genotypes: [DiploidGenotype; 3],
}

impl Snp {
    pub fn new(
        name: impl Into<String>,
        chrom: impl Into<String>,
        pos: u32,
        allele1: u8,
        allele2: u8,
        maf: f64,
        panels: Vec<String>,
    ) -> Result<Self> {
        let name = name.into();
        let allele1 = allele1.to_ascii_uppercase();
        let allele2 = allele2.to_ascii_uppercase();
        if !is_valid_base(allele1) || !is_valid_base(allele2) {
            return Err(Error::InvalidGenotype(format!(
                "{}{} for snp {}",
                allele1 as char, allele2 as char, name
            )));
        }
        let genotypes = [
            DiploidGenotype::from_bases(allele1, allele1)?,
            DiploidGenotype::from_bases(allele1, allele2)?,
            DiploidGenotype::from_bases(allele2, allele2)?,
        ];
        Ok(Snp {
            name,
            chrom: chrom.into(),
            pos,
            allele1,
            allele2,
            maf,
            panels,
            genotypes,
        })
    }

    /// Returns the same SNP with alleles swapped and the frequency corrected.
    pub fn flip(&self) -> Snp {
        Snp {
            name: self.name.clone(),
            chrom: self.chrom.clone(),
            pos: self.pos,
            allele1: self.allele2,
            allele2: self.allele1,
            maf: 1.0 - self.maf,
            panels: self.panels.clone(),
            genotypes: [self.genotypes[2], self.genotypes[1], self.genotypes[0]],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn chrom(&self) -> &str {
        &self.chrom
    }

    pub fn pos(&self) -> u32 {
        self.pos
    }

    pub fn allele1(&self) -> u8 {
        self.allele1
    }

    pub fn allele2(&self) -> u8 {
        self.allele2
    }

    pub fn maf(&self) -> f64 {
        self.maf
    }

    pub fn panels(&self) -> &[String] {
        &self.panels
    }

    pub fn homozygous_allele1_genotype(&self) -> DiploidGenotype {
        self.genotypes[0]
    }

    pub fn heterozygous_genotype(&self) -> DiploidGenotype {
        self.genotypes[1]
    }

    pub fn homozygous_allele2_genotype(&self) -> DiploidGenotype {
        self.genotypes[2]
    }

    pub fn genotype_for(&self, haplotype_index: usize) -> Result<DiploidGenotype> {
        self.genotypes
            .get(haplotype_index)
            .copied()
            .ok_or(Error::HaplotypeIndex(haplotype_index))
    }

    pub fn genotype(&self, haplotype: DiploidHaplotype) -> DiploidGenotype {
        self.genotypes[haplotype.index()]
    }

    /// Diploid state implied by `genotype`, `None` if it is not one of this SNP's genotypes.
    pub fn haplotype_of(&self, genotype: DiploidGenotype) -> Option<DiploidHaplotype> {
        self.genotypes
            .iter()
            .position(|gt| *gt == genotype)
            .and_then(|i| DiploidHaplotype::from_index(i).ok())
    }

    pub fn allele_string(&self) -> String {
        format!(
            "{}{}",
            self.allele1 as char,
            self.allele2.to_ascii_lowercase() as char
        )
    }
}

impl PartialEq for Snp {
    fn eq(&self, other: &Self) -> bool {
        self.chrom == other.chrom && self.pos == other.pos
    }
}

impl Eq for Snp {}

impl Hash for Snp {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.chrom.hash(state);
        self.pos.hash(state);
    }
}

impl PartialOrd for Snp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Orders by chromosome name, then position. This is only the genome order
/// within one chromosome; orderings across chromosomes go through
/// [`SequenceDictionary::compare_loci`](crate::hapmap::SequenceDictionary::compare_loci).
impl Ord for Snp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.chrom
            .cmp(&other.chrom)
            .then_with(|| self.pos.cmp(&other.pos))
    }
}

impl fmt::Display for Snp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.chrom, self.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snp(name: &str, chrom: &str, pos: u32) -> Snp {
        Snp::new(name, chrom, pos, b'a', b'g', 0.25, vec![]).unwrap()
    }

    #[test]
    fn test_alleles_are_upper_cased() {
        let s = snp("rs1", "1", 10);
        assert_eq!(s.allele1(), b'A');
        assert_eq!(s.allele2(), b'G');
        assert_eq!(s.allele_string(), "Ag");
    }

    #[test]
    fn test_precomputed_genotypes() {
        let s = snp("rs1", "1", 10);
        assert_eq!(s.homozygous_allele1_genotype(), DiploidGenotype::AA);
        assert_eq!(s.heterozygous_genotype(), DiploidGenotype::AG);
        assert_eq!(s.homozygous_allele2_genotype(), DiploidGenotype::GG);
        assert_eq!(s.genotype_for(2).unwrap(), DiploidGenotype::GG);
        assert!(matches!(s.genotype_for(3), Err(Error::HaplotypeIndex(3))));
        assert_eq!(
            s.haplotype_of(DiploidGenotype::AG),
            Some(DiploidHaplotype::Heterozygous)
        );
        assert_eq!(s.haplotype_of(DiploidGenotype::CT), None);
    }

    #[test]
    fn test_invalid_alleles_rejected() {
        assert!(Snp::new("rs1", "1", 1, b'N', b'A', 0.1, vec![]).is_err());
    }

    #[test]
    fn test_equality_is_by_locus_only() {
        assert_eq!(snp("rs1", "1", 10), snp("rs2", "1", 10));
        assert_ne!(snp("rs1", "1", 10), snp("rs1", "1", 11));
        assert_ne!(snp("rs1", "1", 10), snp("rs1", "2", 10));
        assert!(snp("a", "1", 5) < snp("a", "1", 10));
        assert!(snp("a", "1", 50) < snp("a", "2", 10));
    }

    #[test]
    fn test_dictionary_order_across_chromosomes() {
        use crate::hapmap::{SequenceDictionary, SequenceRecord};

        let dictionary = SequenceDictionary::from_sequences(vec![
            SequenceRecord::new("2", None),
            SequenceRecord::new("10", None),
        ])
        .unwrap();
        let mut snps = vec![snp("a", "10", 5), snp("b", "2", 50), snp("c", "2", 7)];
        snps.sort();
        assert_eq!(snps.iter().map(|s| s.name()).collect::<Vec<_>>(), ["a", "c", "b"]);

        snps.sort_by(|x, y| dictionary.compare_loci((x.chrom(), x.pos()), (y.chrom(), y.pos())));
        assert_eq!(snps.iter().map(|s| s.name()).collect::<Vec<_>>(), ["c", "b", "a"]);
    }

    #[test]
    fn test_flip() {
        let flipped = snp("rs1", "1", 10).flip();
        assert_eq!(flipped.allele1(), b'G');
        assert_eq!(flipped.allele2(), b'A');
        assert!((flipped.maf() - 0.75).abs() < 1e-12);
        assert_eq!(flipped.homozygous_allele1_genotype(), DiploidGenotype::GG);
        assert_eq!(flipped.heterozygous_genotype(), DiploidGenotype::AG);
    }
}
