//! BREACH CLI
//!
//! Reconstructs secrets from WebAssembly decision oracles.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod commands;
mod render;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use commands::{BruteArgs, Context, GreedyArgs, Output, PinArgs, ProbeArgs, VerifyArgs};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "breach")]
#[command(about = "BREACH - oracle-driven secret reconstruction", long_about = None)]
struct Cli {
    /// Print run reports as JSON
    #[arg(long, global = true)]
    json: bool,
    /// More logging; repeat for trace output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Hide progress bars
    #[arg(long, global = true)]
    no_progress: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Enumerate fixed-width numeric PINs
    Pin(PinArgs),
    /// Enumerate every body between a prefix and a suffix
    Brute(BruteArgs),
    /// Grow a known prefix by the probe-call side channel
    Greedy(GreedyArgs),
    /// Check an assembled candidate against known plaintext
    Verify(VerifyArgs),
    /// Evaluate one input and dump the input region
    Probe(ProbeArgs),
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "breach_oracle=info,breach_search=info",
        1 => "breach_oracle=debug,breach_search=debug",
        _ => "breach_oracle=trace,breach_search=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn execute(cli: &Cli) -> Result<Output> {
    let ctx = Context {
        progress: !cli.no_progress && !cli.json,
    };
    match &cli.command {
        Commands::Pin(args) => commands::pin(ctx, args),
        Commands::Brute(args) => commands::brute(ctx, args),
        Commands::Greedy(args) => commands::greedy(ctx, args),
        Commands::Verify(args) => commands::verify(args),
        Commands::Probe(args) => commands::probe(args),
    }
}

fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let output = execute(&cli)?;
    render::render(&output, cli.json, cli.verbose)?;
    Ok(if output.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}
