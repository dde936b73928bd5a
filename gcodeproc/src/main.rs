//! Command-line entry point.

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use gcodeproc::config::{PreheatConfig, PreheatOptions, SubstitutionConfig};
use gcodeproc::{logging, scheduler, substitute};

#[derive(Parser, Debug)]
#[command(name = "gcodeproc", about = "postprocess gcode", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Insert extruder preheat and deactivate directives ahead of
    /// toolchanges.
    Preheat(PreheatArgs),
    /// Substitute strings in a gcode file.
    #[command(alias = "sub")]
    Substitute(SubstituteArgs),
}

#[derive(Args, Debug)]
struct PreheatArgs {
    /// Config file.
    #[arg(long)]
    config: PathBuf,
    /// Log file; enables debug logging.
    #[arg(long)]
    log: Option<PathBuf>,
    /// Ratio of time in the speed change phase of each move.
    #[arg(long, default_value_t = 0.4)]
    speed_change_ratio: f64,
    #[arg(long, hide = true)]
    no_rename: bool,
    #[arg(long, hide = true)]
    debug: bool,
    /// Gcode file to process in place.
    gcode: PathBuf,
}

#[derive(Args, Debug)]
struct SubstituteArgs {
    /// Config file.
    #[arg(long)]
    config: PathBuf,
    /// Log file; enables debug logging.
    #[arg(long)]
    log: Option<PathBuf>,
    /// Gcode file to process in place.
    gcode: PathBuf,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Preheat(args) => {
            let config = PreheatConfig::load(&args.config)
                .with_context(|| format!("config file {}", args.config.display()))?;
            logging::init(args.log.as_deref()).context("failed to set up logging")?;
            let options = PreheatOptions {
                speed_change_ratio: args.speed_change_ratio,
                no_rename: args.no_rename,
                debug: args.debug,
            };
            scheduler::run(&args.gcode, &config, options)
                .with_context(|| format!("failed to preheat {}", args.gcode.display()))?;
        }
        Command::Substitute(args) => {
            let config = SubstitutionConfig::load(&args.config)
                .with_context(|| format!("config file {}", args.config.display()))?;
            logging::init(args.log.as_deref()).context("failed to set up logging")?;
            substitute::run(&args.gcode, &config)
                .with_context(|| format!("failed to substitute {}", args.gcode.display()))?;
        }
    }
    Ok(())
}
