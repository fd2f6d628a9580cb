use clap::Parser;
use fpcheck::{
    cli::{init_verbose, Cli, Command, FULL_VERSION},
    commands::{convert, merge, score, vcf},
    utils::{handle_error_and_exit, Result},
};

fn runner() -> Result<()> {
    let cli = Cli::parse();
    init_verbose(&cli);

    log::info!(
        "Running {}-{} [{}]",
        env!("CARGO_PKG_NAME"),
        *FULL_VERSION,
        cli.command.name()
    );
    match cli.command {
        Command::Convert(args) => convert::convert(args)?,
        Command::Vcf(args) => vcf::vcf(args)?,
        Command::Merge(args) => merge::merge(args)?,
        Command::Score(args) => score::score(args)?,
    }
    log::info!("{} end", env!("CARGO_PKG_NAME"));
    Ok(())
}

fn main() {
    if let Err(e) = runner() {
        handle_error_and_exit(e);
    }
}
