use crate::cli::VcfArgs;
use crate::fingerprint::Fingerprint;
use crate::hapmap::HaplotypeMap;
use crate::utils::{open_genome_reader, Result};
use crate::variant::{
    build_variant_records, cleanup_genotypes, to_genotype_list, write_fingerprint_vcf,
};
use std::time;

pub fn vcf(args: VcfArgs) -> Result<()> {
    let start_timer = time::Instant::now();

    let fingerprint = Fingerprint::from_path(&args.fingerprint_path)?;
    let map = HaplotypeMap::from_path(&args.haplotype_map_path)?;
    let genome_reader = open_genome_reader(&args.genome_path)?;
    let sample_name = args.sample_name.unwrap_or(fingerprint.sample_id.clone());

    let genotypes = to_genotype_list(&fingerprint.calls, &map);
    let genotypes = cleanup_genotypes(genotypes, &map);
    let variants = build_variant_records(&genotypes, &map, &genome_reader, &sample_name)?;
    write_fingerprint_vcf(
        &variants,
        &sample_name,
        fingerprint.gender,
        &args.genome_path,
        args.output_path.as_deref(),
    )?;

    log::info!("Total execution time: {:.2?}", start_timer.elapsed());
    Ok(())
}
