use crate::utils::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// An unordered pair of bases drawn from {A, C, G, T}.
///
/// The numeric code of each genotype is part of a legacy on-disk format and
/// lives in [`GENOTYPE_CODES`]; it is never derived from declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiploidGenotype {
    AA,
    AC,
    AG,
    AT,
    CC,
    CG,
    CT,
    GG,
    GT,
    TT,
}

/// Legacy on-disk code of every genotype. DO NOT renumber or reuse codes.
pub const GENOTYPE_CODES: [(u8, DiploidGenotype); 10] = [
    (0, DiploidGenotype::AA),
    (1, DiploidGenotype::AC),
    (2, DiploidGenotype::AG),
    (3, DiploidGenotype::AT),
    (4, DiploidGenotype::CC),
    (5, DiploidGenotype::CG),
    (6, DiploidGenotype::CT),
    (7, DiploidGenotype::GG),
    (8, DiploidGenotype::GT),
    (9, DiploidGenotype::TT),
];

// Lookup by base pair relies on the byte sum of the two alleles being unique.
const _: () = assert!(allele_sums_are_unique());
const _: () = assert!(codes_are_unique());

const fn codes_are_unique() -> bool {
    let mut i = 0;
    while i < GENOTYPE_CODES.len() {
        let mut j = i + 1;
        while j < GENOTYPE_CODES.len() {
            if GENOTYPE_CODES[i].0 == GENOTYPE_CODES[j].0 {
                return false;
            }
            j += 1;
        }
        i += 1;
    }
    true
}

const fn allele_sums_are_unique() -> bool {
    let mut i = 0;
    while i < GENOTYPE_CODES.len() {
        let mut j = i + 1;
        while j < GENOTYPE_CODES.len() {
            if GENOTYPE_CODES[i].1.allele_sum() == GENOTYPE_CODES[j].1.allele_sum() {
                return false;
            }
            j += 1;
        }
        i += 1;
    }
    true
}

pub fn is_valid_base(base: u8) -> bool {
    matches!(base.to_ascii_uppercase(), b'A' | b'C' | b'G' | b'T')
}

impl DiploidGenotype {
    pub const fn alleles(self) -> (u8, u8) {
        match self {
            DiploidGenotype::AA => (b'A', b'A'),
            DiploidGenotype::AC => (b'A', b'C'),
            DiploidGenotype::AG => (b'A', b'G'),
            DiploidGenotype::AT => (b'A', b'T'),
            DiploidGenotype::CC => (b'C', b'C'),
            DiploidGenotype::CG => (b'C', b'G'),
            DiploidGenotype::CT => (b'C', b'T'),
            DiploidGenotype::GG => (b'G', b'G'),
            DiploidGenotype::GT => (b'G', b'T'),
            DiploidGenotype::TT => (b'T', b'T'),
        }
    }

    const fn allele_sum(self) -> u16 {
        let (a, b) = self.alleles();
        a as u16 + b as u16
    }

    /// Converts a pair of bases into a genotype regardless of base order or case.
    pub fn from_bases(base1: u8, base2: u8) -> Result<Self> {
        let invalid = || {
            Error::InvalidGenotype(String::from_utf8_lossy(&[base1, base2]).into_owned())
        };
        if !is_valid_base(base1) || !is_valid_base(base2) {
            return Err(invalid());
        }
        let sum = base1.to_ascii_uppercase() as u16 + base2.to_ascii_uppercase() as u16;
        GENOTYPE_CODES
            .iter()
            .map(|&(_, genotype)| genotype)
            .find(|genotype| genotype.allele_sum() == sum)
            .ok_or_else(invalid)
    }

    /// Legacy code of this genotype, read from [`GENOTYPE_CODES`].
    pub const fn code(self) -> u8 {
        let sum = self.allele_sum();
        let mut i = 0;
        while i < GENOTYPE_CODES.len() {
            if GENOTYPE_CODES[i].1.allele_sum() == sum {
                return GENOTYPE_CODES[i].0;
            }
            i += 1;
        }
        // The table holds ten entries with distinct allele sums, so every
        // genotype is listed.
        unreachable!()
    }

    pub fn from_code(code: u8) -> Option<Self> {
        GENOTYPE_CODES
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, genotype)| *genotype)
    }

    pub fn allele1(self) -> u8 {
        self.alleles().0
    }

    pub fn allele2(self) -> u8 {
        self.alleles().1
    }

    pub fn is_heterozygous(self) -> bool {
        self.allele1() != self.allele2()
    }

    pub fn is_homozygous(self) -> bool {
        self.allele1() == self.allele2()
    }
}

impl FromStr for DiploidGenotype {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.as_bytes() {
            [base1, base2] => Self::from_bases(*base1, *base2),
            _ => Err(Error::InvalidGenotype(s.to_string())),
        }
    }
}

impl fmt::Display for DiploidGenotype {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (a, b) = self.alleles();
        write!(f, "{}{}", a as char, b as char)
    }
}

/// The three diploid states of a haplotype block: homozygous for the major
/// haplotype, heterozygous, homozygous for the minor haplotype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiploidHaplotype {
    HomozygousMajor,
    Heterozygous,
    HomozygousMinor,
}

impl DiploidHaplotype {
    pub const ALL: [DiploidHaplotype; 3] = [
        DiploidHaplotype::HomozygousMajor,
        DiploidHaplotype::Heterozygous,
        DiploidHaplotype::HomozygousMinor,
    ];

    pub fn index(self) -> usize {
        match self {
            DiploidHaplotype::HomozygousMajor => 0,
            DiploidHaplotype::Heterozygous => 1,
            DiploidHaplotype::HomozygousMinor => 2,
        }
    }

    pub fn from_index(index: usize) -> Result<Self> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or(Error::HaplotypeIndex(index))
    }
}
