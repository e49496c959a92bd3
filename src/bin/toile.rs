// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # Toile CLI
//!
//! Command-line tool for exporting imaging recordings to dataset shards.
//!
//! ## Usage
//!
//! ```sh
//! # Export every frame of two recordings
//! toile export frames data/TSeries-001 data/TSeries-002 -o shards/session1
//!
//! # Export all recordings under a parent directory, gzip the shards
//! toile export frames data/ --each -o shards/session1 --compress gzip
//!
//! # List the samples of a shard
//! toile inspect shards/session1/session1-000000.tar
//! ```

mod cmd;
mod common;

use std::process;

use clap::{Parser, Subcommand};
use cmd::{ExportCmd, InspectCmd};
use common::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Toile - imaging recordings to dataset shards
///
/// Decodes OME-TIFF recordings, collates their acquisition metadata and
/// writes per-frame samples into size-bounded tar shards.
#[derive(Parser, Clone)]
#[command(name = "toile")]
#[command(about = "Export imaging recordings to sharded datasets", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "ArcheBase")]
struct Cli {
    /// Show per-field metadata diagnostics and decoder output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Clone)]
enum Commands {
    /// Export recordings (frames, clips, movies)
    #[command(subcommand)]
    Export(ExportCmd),

    /// Inspect a written shard
    Inspect(InspectCmd),
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Export(cmd) => cmd.run(cli.verbose),
        Commands::Inspect(cmd) => cmd.run(),
    }
}

fn main() {
    let result = run();

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
