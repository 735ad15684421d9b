//! Cairn CLI: stores and reloads the configuration cache of a build tree.
//!
//! Provides `cairn store` to write the tree described by `cairn.toml` into
//! the cache, `cairn load` to read it back and report the restored work
//! graph, and `cairn discard` to drop the cache entry.

#![warn(missing_docs)]

mod discard;
mod load;
mod report;
mod store;
mod tree;
mod workspace;

use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Cairn, a configuration cache for multi-build trees.
#[derive(Parser, Debug)]
#[command(name = "cairn", version, about = "Cairn configuration cache")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a custom `cairn.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Store the configured build tree into the cache.
    Store,
    /// Load the build tree back from the cache.
    Load(LoadArgs),
    /// Delete the cache entry.
    Discard,
}

/// Arguments for the `cairn load` subcommand.
#[derive(Parser, Debug)]
pub struct LoadArgs {
    /// Report identification events instead of replaying configuration.
    #[arg(long)]
    pub identify: bool,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Optional path to a custom config file.
    pub config: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        config: cli.config,
    };

    let result = match cli.command {
        Command::Store => store::run(&global),
        Command::Load(ref args) => load::run(args, &global),
        Command::Discard => discard::run(&global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

/// Installs the `tracing` subscriber. `RUST_LOG` overrides the flag-derived level.
fn init_logging(quiet: bool, verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(quiet, verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn default_level(quiet: bool, verbose: bool) -> &'static str {
    if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    }
}
