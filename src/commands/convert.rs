use crate::cli::ConvertArgs;
use crate::hapmap::{HaplotypeMap, SourceFormat};
use crate::utils::{open_genome_reader, Result};
use std::collections::HashSet;
use std::time;

pub fn convert(args: ConvertArgs) -> Result<()> {
    let start_timer = time::Instant::now();

    let mut map = HaplotypeMap::from_path(&args.input_path)?;
    if !args.exclude_chroms.is_empty() {
        let excluded: HashSet<String> = args.exclude_chroms.iter().cloned().collect();
        map = map.without_chromosomes(&excluded)?;
        log::info!(
            "Kept {} haplotype blocks after excluding chromosomes {}",
            map.blocks().len(),
            args.exclude_chroms.join(",")
        );
    }

    match SourceFormat::detect(&args.output_path) {
        SourceFormat::FlatFile => map.write_flat(&args.output_path)?,
        SourceFormat::VariantFile => {
            let genome_path = args
                .genome_path
                .as_deref()
                .ok_or("A reference genome (--genome) is required for VCF output")?;
            let genome_reader = open_genome_reader(genome_path)?;
            map.write_vcf(&args.output_path, &genome_reader, Some(genome_path))?;
        }
    }

    log::info!("Total execution time: {:.2?}", start_timer.elapsed());
    Ok(())
}
