mod error;
mod readers;
mod reference;
mod util;

pub use error::Error;
pub use readers::{is_gzipped, open_genome_reader, open_text_reader};
pub use reference::{MemoryReference, ReferenceSequence};
pub use util::{format_number_with_commas, handle_error_and_exit, Result};
