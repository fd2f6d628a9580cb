use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced by the library.
///
/// Recoverable conditions (unknown SNPs, undecodable sample genotypes,
/// conflicting block calls) never reach this type; they are logged and the
/// offending call is dropped.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown genotype string [{0}], any pair of ACGT case insensitive is acceptable")]
    InvalidGenotype(String),

    #[error("Illegal haplotype index {0}, expected 0, 1 or 2")]
    HaplotypeIndex(usize),

    #[error("Snp chromosome {found} does not agree with chromosome of existing snp(s): {expected}")]
    ChromosomeMismatch { expected: String, found: String },

    #[error("Snp is not part of haplotype {block}: {snp}")]
    NotInHaplotype { snp: String, block: String },

    #[error("Malformed haplotype map at {location}: {message}")]
    MalformedHaplotypeMap { location: String, message: String },

    #[error("No haplotype found for anchor snp {0}")]
    MissingAnchor(String),

    #[error("Same snp cannot be registered twice: {0}")]
    DuplicateSnp(String),

    #[error("Mismatch in {field} among input variant sets at {locus}")]
    InconsistentMerge { field: String, locus: String },

    #[error("Contig {0} is not present in the sequence dictionary")]
    UnknownContig(String),

    #[error("Reference lookup failed at {contig}:{position}: {message}")]
    Reference {
        contig: String,
        position: u32,
        message: String,
    },

    #[error("Control {0} has no reference fingerprint configured")]
    NoControlConfigured(String),

    #[error("Concordance engine did not respond within {0:?}")]
    ConcordanceTimeout(std::time::Duration),

    #[error("Concordance engine protocol error: {0}")]
    Protocol(String),

    #[error("Concordance engine process error: {0}")]
    Process(String),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("htslib: {0}")]
    Htslib(#[from] rust_htslib::errors::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub fn malformed(location: impl ToString, message: impl Into<String>) -> Self {
        Error::MalformedHaplotypeMap {
            location: location.to_string(),
            message: message.into(),
        }
    }

    pub fn inconsistent(field: &str, contig: &str, position: u32) -> Self {
        Error::InconsistentMerge {
            field: field.to_string(),
            locus: format!("{}:{}", contig, position),
        }
    }
}

impl From<String> for Error {
    fn from(message: String) -> Self {
        Error::Other(message)
    }
}

impl From<&str> for Error {
    fn from(message: &str) -> Self {
        Error::Other(message.to_string())
    }
}
