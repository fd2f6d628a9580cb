use clap::{ArgAction, ArgGroup, Parser, Subcommand};
use env_logger::fmt::Color;
use log::{Level, LevelFilter};
use once_cell::sync::Lazy;
use std::{
    io::Write,
    path::{Path, PathBuf},
    time::Duration,
};

pub static FULL_VERSION: Lazy<String> = Lazy::new(|| {
    format!(
        "{}-{}",
        env!("CARGO_PKG_VERSION"),
        env!("VERGEN_GIT_DESCRIBE")
    )
});

type ArgResult<T> = std::result::Result<T, String>;

#[derive(Parser)]
#[command(name="fpcheck",
          version=&**FULL_VERSION,
          about="Genotype fingerprint concordance and haplotype map toolkit",
          long_about = None,
          disable_help_subcommand = true,
          help_template = "{name} {version}\n{about-section}\n{usage-heading}\n    {usage}\n\n{all-args}{after-help}",
          )]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = ArgAction::Count, help = "Specify multiple times to increase verbosity level (e.g., -vv for more verbosity)")]
    pub verbosity: u8,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "Convert a haplotype map between the flat and VCF encodings")]
    Convert(ConvertArgs),
    #[clap(about = "Write the genotype calls of a fingerprint as a VCF")]
    Vcf(VcfArgs),
    #[clap(about = "Merge fingerprint VCFs locus by locus")]
    Merge(MergeArgs),
    #[clap(about = "Score fingerprint concordance with an external engine")]
    Score(ScoreArgs),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Convert(_) => "convert",
            Command::Vcf(_) => "vcf",
            Command::Merge(_) => "merge",
            Command::Score(_) => "score",
        }
    }
}

#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("convert")))]
#[command(arg_required_else_help(true))]
pub struct ConvertArgs {
    #[clap(required = true)]
    #[clap(short = 'i')]
    #[clap(long = "input")]
    #[clap(help = "Haplotype map to read (flat text or VCF)")]
    #[clap(value_name = "MAP")]
    #[arg(value_parser = check_file_exists)]
    pub input_path: PathBuf,

    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output")]
    #[clap(help = "Haplotype map to write, encoding chosen by extension")]
    #[clap(value_name = "MAP")]
    #[arg(value_parser = check_prefix_path)]
    pub output_path: PathBuf,

    #[clap(short = 'g')]
    #[clap(long = "genome")]
    #[clap(help = "Path to indexed reference genome FASTA, required for VCF output")]
    #[clap(value_name = "FASTA")]
    #[arg(value_parser = check_file_exists)]
    pub genome_path: Option<PathBuf>,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "exclude-chroms")]
    #[clap(value_name = "CHROMS")]
    #[clap(help = "Comma-separated chromosomes whose haplotype blocks are dropped")]
    #[clap(value_delimiter = ',')]
    pub exclude_chroms: Vec<String>,
}

#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("vcf")))]
#[command(arg_required_else_help(true))]
pub struct VcfArgs {
    #[clap(required = true)]
    #[clap(short = 'f')]
    #[clap(long = "fingerprint")]
    #[clap(help = "Fingerprint JSON document")]
    #[clap(value_name = "FINGERPRINT")]
    #[arg(value_parser = check_file_exists)]
    pub fingerprint_path: PathBuf,

    #[clap(required = true)]
    #[clap(short = 'm')]
    #[clap(long = "haplotype-map")]
    #[clap(help = "Haplotype map (flat text or VCF)")]
    #[clap(value_name = "MAP")]
    #[arg(value_parser = check_file_exists)]
    pub haplotype_map_path: PathBuf,

    #[clap(required = true)]
    #[clap(short = 'g')]
    #[clap(long = "genome")]
    #[clap(help = "Path to indexed reference genome FASTA")]
    #[clap(value_name = "FASTA")]
    #[arg(value_parser = check_file_exists)]
    pub genome_path: PathBuf,

    #[clap(short = 'o')]
    #[clap(long = "output")]
    #[clap(help = "Output VCF (stdout if omitted)")]
    #[clap(value_name = "VCF")]
    #[arg(value_parser = check_prefix_path)]
    pub output_path: Option<PathBuf>,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "sample-name")]
    #[clap(value_name = "SAMPLE_NAME")]
    #[clap(help = "Sample name written to the VCF instead of the fingerprint sample id")]
    #[arg(value_parser = check_sample_name_nonempty)]
    pub sample_name: Option<String>,
}

#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("merge")))]
#[command(arg_required_else_help(true))]
pub struct MergeArgs {
    #[clap(required = true)]
    #[clap(long = "vcf")]
    #[clap(help = "VCF files to merge")]
    #[clap(value_name = "VCF")]
    #[clap(num_args = 1..)]
    #[arg(value_parser = check_file_exists)]
    pub vcfs: Vec<PathBuf>,

    #[clap(short = 'o')]
    #[clap(long = "output")]
    #[clap(help = "Output VCF (stdout if omitted)")]
    #[clap(value_name = "VCF")]
    #[arg(value_parser = check_prefix_path)]
    pub output_path: Option<PathBuf>,

    #[clap(short = 'm')]
    #[clap(long = "haplotype-map")]
    #[clap(help = "Haplotype map whose sequence dictionary orders the output")]
    #[clap(value_name = "MAP")]
    #[arg(value_parser = check_file_exists)]
    pub haplotype_map_path: Option<PathBuf>,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "quit-on-error")]
    #[clap(help = "Abort on the first locus that cannot be merged")]
    pub quit_on_error: bool,
}

#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("score")))]
#[command(arg_required_else_help(true))]
pub struct ScoreArgs {
    #[clap(required = true)]
    #[clap(long = "observed")]
    #[clap(help = "Observed fingerprint JSON documents")]
    #[clap(value_name = "FINGERPRINT")]
    #[clap(num_args = 1..)]
    #[arg(value_parser = check_file_exists)]
    pub observed: Vec<PathBuf>,

    #[clap(long = "expected")]
    #[clap(help = "Expected fingerprint JSON documents")]
    #[clap(value_name = "FINGERPRINT")]
    #[clap(num_args = 1..)]
    #[clap(required_unless_present = "control")]
    #[arg(value_parser = check_file_exists)]
    pub expected: Vec<PathBuf>,

    #[clap(long = "control")]
    #[clap(help = "Control JSON document whose reference fingerprint is the expected one")]
    #[clap(value_name = "CONTROL")]
    #[clap(conflicts_with_all = ["expected", "matrix"])]
    #[arg(value_parser = check_file_exists)]
    pub control: Option<PathBuf>,

    #[clap(long = "matrix")]
    #[clap(help = "Score every observed fingerprint against every expected one")]
    pub matrix: bool,

    #[clap(required = true)]
    #[clap(short = 'e')]
    #[clap(long = "engine")]
    #[clap(help = "Scoring engine executable")]
    #[clap(value_name = "PROGRAM")]
    pub engine: PathBuf,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "engine-arg")]
    #[clap(value_name = "ARG")]
    #[clap(help = "Argument passed to the scoring engine, may be repeated")]
    #[clap(allow_hyphen_values = true)]
    pub engine_args: Vec<String>,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "timeout")]
    #[clap(value_name = "SECS")]
    #[clap(help = "Seconds to wait for the engine before terminating it")]
    #[arg(value_parser = positive_seconds)]
    pub timeout: Option<Duration>,

    #[clap(short = 'o')]
    #[clap(long = "output")]
    #[clap(help = "Output TSV (stdout if omitted)")]
    #[clap(value_name = "TSV")]
    #[arg(value_parser = check_prefix_path)]
    pub output_path: Option<PathBuf>,
}

pub fn init_verbose(args: &Cli) {
    let filter_level: LevelFilter = match args.verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };

    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            let level = record.level();
            let mut style = buf.style();
            match record.level() {
                Level::Error => style.set_color(Color::Red),
                Level::Warn => style.set_color(Color::Yellow),
                Level::Info => style.set_color(Color::Green),
                Level::Debug => style.set_color(Color::Blue),
                Level::Trace => style.set_color(Color::Cyan),
            };

            writeln!(
                buf,
                "{} [{}] - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                style.value(level),
                record.args()
            )
        })
        .filter_level(filter_level)
        .init();
}

fn check_prefix_path(s: &str) -> ArgResult<PathBuf> {
    let path = Path::new(s);
    if let Some(parent_dir) = path.parent() {
        if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
            return Err(format!("Path does not exist: {}", parent_dir.display()));
        }
    }
    Ok(path.to_path_buf())
}

fn check_file_exists(s: &str) -> ArgResult<PathBuf> {
    let path = Path::new(s);
    if !path.exists() {
        Err(format!("File does not exist: {}", path.display()))
    } else {
        Ok(path.to_path_buf())
    }
}

fn check_sample_name_nonempty(s: &str) -> ArgResult<String> {
    if s.trim().is_empty() {
        Err("Sample name cannot be an empty string".to_string())
    } else {
        Ok(s.to_string())
    }
}

fn positive_seconds(s: &str) -> ArgResult<Duration> {
    let seconds = s
        .parse::<f64>()
        .map_err(|e| format!("Could not parse seconds: {}", e))?;
    if seconds.is_finite() && seconds > 0.0 {
        Ok(Duration::from_secs_f64(seconds))
    } else {
        Err(format!("Timeout must be a positive number of seconds, got: {}", s))
    }
}
