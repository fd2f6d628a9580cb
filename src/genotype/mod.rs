mod diploid;
mod snp;

pub use diploid::{is_valid_base, DiploidGenotype, DiploidHaplotype, GENOTYPE_CODES};
pub use snp::Snp;
