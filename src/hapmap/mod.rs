mod block;
mod dictionary;
pub mod flat;
mod map;
pub mod vcf;

pub use block::{HaplotypeBlock, HaplotypeBlockBuilder};
pub use dictionary::{SequenceDictionary, SequenceRecord};
pub use map::{HaplotypeMap, Interval, SourceFormat};
