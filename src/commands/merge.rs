use crate::cli::MergeArgs;
use crate::hapmap::HaplotypeMap;
use crate::utils::Result;
use crate::variant::merge_variant_files;
use std::time;

pub fn merge(args: MergeArgs) -> Result<()> {
    let start_timer = time::Instant::now();

    let dictionary = match &args.haplotype_map_path {
        Some(path) => Some(HaplotypeMap::from_path(path)?.dictionary().clone()),
        None => None,
    };
    merge_variant_files(
        &args.vcfs,
        args.output_path.as_deref(),
        dictionary,
        args.quit_on_error,
    )?;

    log::info!("Total execution time: {:.2?}", start_timer.elapsed());
    Ok(())
}
