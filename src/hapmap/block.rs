use crate::genotype::{DiploidGenotype, DiploidHaplotype, Snp};
use crate::utils::{Error, Result};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Accumulates the SNPs of one phase set before the block is frozen.
#[derive(Debug, Clone)]
pub struct HaplotypeBlockBuilder {
    maf: f64,
    snps: Vec<Snp>,
}

impl HaplotypeBlockBuilder {
    pub fn new(maf: f64) -> Self {
        HaplotypeBlockBuilder {
            maf,
            snps: Vec::new(),
        }
    }

    pub fn add_snp(&mut self, snp: Snp) -> Result<()> {
        if let Some(first) = self.snps.first() {
            if first.chrom() != snp.chrom() {
                return Err(Error::ChromosomeMismatch {
                    expected: first.chrom().to_string(),
                    found: snp.chrom().to_string(),
                });
            }
        }
        if self.snps.iter().any(|member| member.name() == snp.name()) {
            return Err(Error::DuplicateSnp(snp.name().to_string()));
        }
        self.snps.push(snp);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.snps.is_empty()
    }

    /// Freezes the block. The anchor is the lowest-position SNP; among SNPs
    /// sharing that position the first one added wins.
    pub fn build(self) -> Result<HaplotypeBlock> {
        let mut iter = self.snps.iter();
        let first = iter
            .next()
            .ok_or("A haplotype block must contain at least one snp")?;
        let mut anchor = first;
        let mut end = first.pos();
        for snp in iter {
            if snp.pos() < anchor.pos() {
                anchor = snp;
            }
            end = end.max(snp.pos());
        }
        let chrom = anchor.chrom().to_string();
        let start = anchor.pos();
        let first_snp = anchor.clone();
        let haplotype_snp = first.name().to_string();

        let q = self.maf;
        let p = 1.0 - q;
        let snps = self
            .snps
            .into_iter()
            .map(|snp| (snp.name().to_string(), snp))
            .collect();

        Ok(HaplotypeBlock {
            maf: q,
            frequencies: [p * p, 2.0 * p * q, q * q],
            snps,
            first_snp,
            haplotype_snp,
            chrom,
            start,
            end,
        })
    }
}

/// A set of co-inherited SNPs modelled as one correlated unit.
///
/// Equality, hashing and ordering only consider `(chrom, start, end)`, so
/// blocks with identical bounds but different members compare equal.
#[derive(Debug, Clone)]
pub struct HaplotypeBlock {
    maf: f64,
    /// Hardy-Weinberg frequencies of the three diploid haplotypes.
    frequencies: [f64; 3],
    snps: BTreeMap<String, Snp>,
    first_snp: Snp,
    /// Name of the first SNP added, the one the block MAF describes.
    haplotype_snp: String,
    chrom: String,
    start: u32,
    end: u32,
}

impl HaplotypeBlock {
    pub fn new(maf: f64, snps: impl IntoIterator<Item = Snp>) -> Result<Self> {
        let mut builder = HaplotypeBlockBuilder::new(maf);
        for snp in snps {
            builder.add_snp(snp)?;
        }
        builder.build()
    }

    pub fn maf(&self) -> f64 {
        self.maf
    }

    pub fn haplotype_frequencies(&self) -> &[f64; 3] {
        &self.frequencies
    }

    pub fn haplotype_frequency(&self, index: usize) -> Result<f64> {
        self.frequencies
            .get(index)
            .copied()
            .ok_or(Error::HaplotypeIndex(index))
    }

    pub fn chrom(&self) -> &str {
        &self.chrom
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    /// Lowest-position SNP of the block.
    pub fn first_snp(&self) -> &Snp {
        &self.first_snp
    }

    /// SNP whose frequency the block MAF was taken from. Not necessarily
    /// the lowest-position one.
    pub fn haplotype_snp(&self) -> &Snp {
        self.snps.get(&self.haplotype_snp).unwrap_or(&self.first_snp)
    }

    pub fn snp(&self, name: &str) -> Option<&Snp> {
        self.snps.get(name)
    }

    pub fn snps(&self) -> impl Iterator<Item = &Snp> {
        self.snps.values()
    }

    pub fn size(&self) -> usize {
        self.snps.len()
    }

    /// Membership is checked on name and locus since some SNP names map to
    /// several places in the genome.
    pub fn contains(&self, snp: &Snp) -> bool {
        self.snps
            .get(snp.name())
            .is_some_and(|member| member.chrom() == snp.chrom() && member.pos() == snp.pos())
    }

    fn check_member(&self, snp: &Snp) -> Result<()> {
        if self.contains(snp) {
            Ok(())
        } else {
            Err(Error::NotInHaplotype {
                snp: format!("{} ({})", snp.name(), snp),
                block: self.to_string(),
            })
        }
    }

    /// Expected genotype of `snp` given the diploid haplotype of this block.
    pub fn snp_genotype(&self, snp: &Snp, haplotype: DiploidHaplotype) -> Result<DiploidGenotype> {
        self.check_member(snp)?;
        Ok(snp.genotype(haplotype))
    }

    /// Diploid haplotype of this block implied by a genotype call on `snp`.
    pub fn diploid_haplotype_for(
        &self,
        snp: &Snp,
        genotype: DiploidGenotype,
    ) -> Result<DiploidHaplotype> {
        self.check_member(snp)?;
        snp.haplotype_of(genotype).ok_or_else(|| {
            Error::InvalidGenotype(format!("{} is not valid for snp {}", genotype, snp.name()))
        })
    }
}

impl PartialEq for HaplotypeBlock {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HaplotypeBlock {}

impl Hash for HaplotypeBlock {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.start.hash(state);
    }
}

impl PartialOrd for HaplotypeBlock {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HaplotypeBlock {
    fn cmp(&self, other: &Self) -> Ordering {
        self.chrom
            .cmp(&other.chrom)
            .then_with(|| self.start.cmp(&other.start))
            .then_with(|| self.end.cmp(&other.end))
    }
}

impl fmt::Display for HaplotypeBlock {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}[{}-{}]", self.chrom, self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn snp(name: &str, chrom: &str, pos: u32) -> Snp {
        Snp::new(name, chrom, pos, b'A', b'G', 0.3, vec![]).unwrap()
    }

    #[test]
    fn test_hardy_weinberg_frequencies() {
        let block = HaplotypeBlock::new(0.3, [snp("rs1", "1", 100)]).unwrap();
        let freqs = block.haplotype_frequencies();
        assert_relative_eq!(freqs[0], 0.49, epsilon = 1e-12);
        assert_relative_eq!(freqs[1], 0.42, epsilon = 1e-12);
        assert_relative_eq!(freqs[2], 0.09, epsilon = 1e-12);
        assert_relative_eq!(freqs.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert!(matches!(
            block.haplotype_frequency(3),
            Err(Error::HaplotypeIndex(3))
        ));
    }

    #[test]
    fn test_chromosome_mismatch() {
        let mut builder = HaplotypeBlockBuilder::new(0.1);
        builder.add_snp(snp("rs1", "1", 100)).unwrap();
        builder.add_snp(snp("rs2", "1", 200)).unwrap();
        let err = builder.add_snp(snp("rs3", "2", 150)).unwrap_err();
        assert!(matches!(err, Error::ChromosomeMismatch { .. }));
    }

    #[test]
    fn test_bounds_and_anchor() {
        let block = HaplotypeBlock::new(
            0.1,
            [
                snp("rs2", "1", 200),
                snp("rs1", "1", 100),
                snp("rs3", "1", 300),
                snp("rs4", "1", 100),
            ],
        )
        .unwrap();
        assert_eq!(block.start(), 100);
        assert_eq!(block.end(), 300);
        assert_eq!(block.chrom(), "1");
        // first-seen lowest position wins the tie with rs4
        assert_eq!(block.first_snp().name(), "rs1");
        assert_eq!(block.size(), 4);
        assert_eq!(block.to_string(), "1[100-300]");
    }

    #[test]
    fn test_empty_block_rejected() {
        assert!(HaplotypeBlockBuilder::new(0.1).build().is_err());
    }

    #[test]
    fn test_contains_checks_name_and_locus() {
        let block = HaplotypeBlock::new(0.1, [snp("rs1", "1", 100)]).unwrap();
        assert!(block.contains(&snp("rs1", "1", 100)));
        assert!(!block.contains(&snp("rs1", "1", 101)));
        assert!(!block.contains(&snp("rs9", "1", 100)));
    }

    #[test]
    fn test_diploid_haplotype_for() {
        let member = snp("rs1", "1", 100);
        let block = HaplotypeBlock::new(0.1, [member.clone()]).unwrap();
        assert_eq!(
            block
                .diploid_haplotype_for(&member, DiploidGenotype::GG)
                .unwrap(),
            DiploidHaplotype::HomozygousMinor
        );
        assert_eq!(
            block
                .snp_genotype(&member, DiploidHaplotype::Heterozygous)
                .unwrap(),
            DiploidGenotype::AG
        );
        assert!(matches!(
            block.diploid_haplotype_for(&snp("rs2", "1", 100), DiploidGenotype::AA),
            Err(Error::NotInHaplotype { .. })
        ));
        assert!(block
            .diploid_haplotype_for(&member, DiploidGenotype::CT)
            .is_err());
    }

    #[test]
    fn test_equality_ignores_membership() {
        let a = HaplotypeBlock::new(0.1, [snp("rs1", "1", 100), snp("rs2", "1", 200)]).unwrap();
        let b = HaplotypeBlock::new(0.4, [snp("rsA", "1", 100), snp("rsB", "1", 200)]).unwrap();
        let c = HaplotypeBlock::new(0.1, [snp("rs1", "1", 100)]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(c < a);
    }
}
