pub mod cli;
pub mod commands;
pub mod concordance;
pub mod fingerprint;
pub mod genotype;
pub mod hapmap;
pub mod utils;
pub mod variant;
