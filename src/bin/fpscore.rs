use clap::Parser;
use fpcheck::{
    cli::FULL_VERSION,
    concordance::{ConcordanceRequest, LodScorer, DEFAULT_ERROR_RATE},
    hapmap::HaplotypeMap,
    utils::{handle_error_and_exit, Error, Result},
};
use log::LevelFilter;
use std::io::{self, Read, Write};
use std::path::PathBuf;

/// Reference concordance engine: reads a scoring request on stdin and writes
/// the LOD scores to stdout.
#[derive(Parser)]
#[command(name = "fpscore", version = &**FULL_VERSION, long_about = None)]
struct EngineCli {
    #[clap(short = 'm')]
    #[clap(long = "haplotype-map")]
    #[clap(help = "Haplotype map providing per-SNP minor allele frequencies")]
    #[clap(value_name = "MAP")]
    haplotype_map_path: Option<PathBuf>,

    #[clap(long = "error-rate")]
    #[clap(value_name = "RATE")]
    #[clap(help = "Genotyping error rate")]
    #[clap(default_value_t = DEFAULT_ERROR_RATE)]
    #[arg(value_parser = error_rate_in_range)]
    error_rate: f64,

    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = clap::ArgAction::Count)]
    verbosity: u8,
}

fn error_rate_in_range(s: &str) -> std::result::Result<f64, String> {
    let value = s
        .parse::<f64>()
        .map_err(|e| format!("Could not parse float: {}", e))?;
    if value > 0.0 && value < 1.0 {
        Ok(value)
    } else {
        Err(format!("The error rate must be in (0, 1), got: {}", value))
    }
}

fn runner() -> Result<()> {
    let cli = EngineCli::parse();
    env_logger::Builder::from_default_env()
        .filter_level(match cli.verbosity {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            _ => LevelFilter::Debug,
        })
        .init();

    let map = cli
        .haplotype_map_path
        .as_deref()
        .map(HaplotypeMap::from_path)
        .transpose()?;

    let mut input = Vec::new();
    io::stdin()
        .read_to_end(&mut input)
        .map_err(|e| Error::Process(format!("reading request: {}", e)))?;
    let request = ConcordanceRequest::decode(&input)?;

    let response = LodScorer::new(map.as_ref())
        .with_error_rate(cli.error_rate)
        .respond(&request)?;

    let mut stdout = io::stdout().lock();
    stdout
        .write_all(&response.encode()?)
        .and_then(|_| stdout.flush())
        .map_err(|e| Error::Process(format!("writing response: {}", e)))?;
    Ok(())
}

fn main() {
    if let Err(e) = runner() {
        handle_error_and_exit(e);
    }
}
