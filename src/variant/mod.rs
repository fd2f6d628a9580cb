mod codec;
mod merge;
mod record;
mod vcf_reader;
mod vcf_writer;

pub use codec::{
    build_variant_records, cleanup_genotypes, fingerprint_header, to_genotype_list,
    write_fingerprint_vcf, SnpGenotype,
};
pub use merge::{merge_variant_files, merge_variant_sets, MergeSummary};
pub use record::{InfoValue, SampleGenotype, VariantRecord, VariantSet};
pub use vcf_reader::{read_variant_records, VariantFile};
pub use vcf_writer::{write_variant_records, OutputType, VcfHeader, VcfWriter};
