pub mod convert;
pub mod merge;
pub mod score;
pub mod vcf;
