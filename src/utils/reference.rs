//! Random access to reference bases.

use super::{Error, Result};
use rust_htslib::faidx;
use std::collections::HashMap;

/// A source of reference bases addressed by contig and 1-based position.
pub trait ReferenceSequence {
    /// Returns the upper-cased reference base at `position`.
    fn base_at(&self, contig: &str, position: u32) -> Result<u8>;
}

fn reference_error(contig: &str, position: u32, message: impl Into<String>) -> Error {
    Error::Reference {
        contig: contig.to_string(),
        position,
        message: message.into(),
    }
}

impl ReferenceSequence for faidx::Reader {
    fn base_at(&self, contig: &str, position: u32) -> Result<u8> {
        if position == 0 {
            return Err(reference_error(contig, position, "positions are 1-based"));
        }
        let offset = (position - 1) as usize;
        let seq = self
            .fetch_seq(contig, offset, offset)
            .map_err(|e| reference_error(contig, position, e.to_string()))?;
        seq.first()
            .map(|base| base.to_ascii_uppercase())
            .ok_or_else(|| reference_error(contig, position, "empty sequence returned"))
    }
}

/// Reference held entirely in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryReference {
    contigs: HashMap<String, Vec<u8>>,
}

impl MemoryReference {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contig(mut self, name: &str, sequence: &[u8]) -> Self {
        self.contigs.insert(name.to_string(), sequence.to_vec());
        self
    }
}

impl ReferenceSequence for MemoryReference {
    fn base_at(&self, contig: &str, position: u32) -> Result<u8> {
        let seq = self
            .contigs
            .get(contig)
            .ok_or_else(|| reference_error(contig, position, "unknown contig"))?;
        position
            .checked_sub(1)
            .and_then(|offset| seq.get(offset as usize))
            .map(|base| base.to_ascii_uppercase())
            .ok_or_else(|| reference_error(contig, position, "position out of range"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_reference_is_one_based() {
        let reference = MemoryReference::new().with_contig("1", b"acgt");
        assert_eq!(reference.base_at("1", 1).unwrap(), b'A');
        assert_eq!(reference.base_at("1", 4).unwrap(), b'T');
        assert!(reference.base_at("1", 0).is_err());
        assert!(reference.base_at("1", 5).is_err());
        assert!(reference.base_at("2", 1).is_err());
    }
}
