//! Strata CLI — builds and maintains the overlay-merge artifact cache.
//!
//! Provides `strata build` to merge every configured resource (reusing cached
//! artifacts whose inputs are unchanged), `strata check` to report which
//! resources are stale, `strata migrate` to upgrade an index that stores
//! absolute keys, and `strata clean` to drop every cached artifact.

#![warn(missing_docs)]

mod build;
mod check;
mod clean;
mod migrate;
mod pipeline;

use std::process;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Strata — incremental base-plus-overlay merge cache.
#[derive(Parser, Debug)]
#[command(name = "strata", version, about = "Strata overlay merge cache")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Path to a custom `strata.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Merge every configured resource and collect stale artifacts.
    Build,
    /// Report which resources would be rebuilt, without writing anything.
    Check,
    /// Rewrite absolute keys in the cache index to project-relative form.
    Migrate,
    /// Remove every cached artifact.
    Clean,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Optional path to a custom config file.
    pub config: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    let global = GlobalArgs {
        quiet: cli.quiet,
        config: cli.config,
    };

    let result = match cli.command {
        Command::Build => build::run(&global),
        Command::Check => check::run(&global),
        Command::Migrate => migrate::run(&global),
        Command::Clean => clean::run(&global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

/// Installs the log subscriber. `RUST_LOG` overrides the flag-derived level.
fn init_logging(quiet: bool, verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(quiet, verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

fn default_filter(quiet: bool, verbose: u8) -> &'static str {
    match (quiet, verbose) {
        (true, _) => "strata=error",
        (false, 0) => "strata=warn",
        (false, 1) => "strata=info",
        _ => "strata=debug",
    }
}
