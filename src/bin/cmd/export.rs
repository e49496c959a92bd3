// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Export command - write recordings into dataset shards.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Args, Subcommand};
use tracing::info;

use crate::common::{format_bytes, format_duration, ProgressBar, Result};
use toile::io::discover_inputs;
use toile::{BatchDriver, Compression, ExportConfig, ExportKind, FrameFormat, TiffStackDecoder};

/// Export recordings.
#[derive(Subcommand, Clone, Debug)]
pub enum ExportCmd {
    /// One sample per frame
    Frames(ExportArgs),

    /// Fixed-length frame windows (not implemented)
    Clips(ExportArgs),

    /// One sample per recording (not implemented)
    Movies(ExportArgs),
}

/// Options shared by every export kind.
#[derive(Args, Clone, Debug)]
pub struct ExportArgs {
    /// Recording directories or stack files
    #[arg(value_name = "INPUT", required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory for shards
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// TOML file with export settings (flags override it)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Treat each INPUT as a parent directory of recordings
    #[arg(long)]
    each: bool,

    /// Shard filename stem (default: output directory name)
    #[arg(long)]
    stem: Option<String>,

    /// Maximum payload bytes per shard
    #[arg(long, value_name = "BYTES")]
    max_shard_size: Option<u64>,

    /// Maximum samples per shard
    #[arg(long, value_name = "COUNT")]
    max_shard_count: Option<usize>,

    /// Shard file extension
    #[arg(long)]
    extension: Option<String>,

    /// Rescale each recording to 8 bits
    #[arg(long)]
    to_uint8: bool,

    /// Compress shards after writing (none, gzip, zstd)
    #[arg(long, value_name = "CODEC")]
    compress: Option<Compression>,

    /// Sample key template, e.g. "{index:06}"
    #[arg(long, value_name = "TEMPLATE")]
    key_template: Option<String>,

    /// Sample shape per frame (full, image, experiment)
    #[arg(long, value_name = "FORMAT")]
    format: Option<FrameFormat>,

    /// Glob locating the stack inside each recording directory
    #[arg(long, value_name = "GLOB")]
    stack_pattern: Option<String>,

    /// Regex with named captures parsed from stack file names
    #[arg(long, value_name = "REGEX")]
    filename_pattern: Option<String>,
}

impl ExportCmd {
    pub fn run(self, verbose: bool) -> Result<()> {
        let (kind, args) = match self {
            ExportCmd::Frames(args) => (ExportKind::Frames, args),
            ExportCmd::Clips(args) => (ExportKind::Clips, args),
            ExportCmd::Movies(args) => (ExportKind::Movies, args),
        };
        cmd_export(kind, args, verbose)
    }
}

impl ExportArgs {
    /// Merge flags over the config file (or defaults).
    fn to_config(&self, kind: ExportKind, verbose: bool) -> Result<ExportConfig> {
        let mut config = match &self.config {
            Some(path) => ExportConfig::from_toml_file(path)?,
            None => ExportConfig::default(),
        };
        config.kind = kind;
        config.verbose |= verbose;
        config.to_uint8 |= self.to_uint8;
        if let Some(output) = &self.output {
            config.output_dir = output.clone();
        }
        if config.output_dir.as_os_str().is_empty() {
            anyhow::bail!("no output directory: pass -o/--output or set output_dir in the config");
        }
        if let Some(stem) = &self.stem {
            config.stem = Some(stem.clone());
        }
        if let Some(size) = self.max_shard_size {
            config.max_shard_size = size;
        }
        if let Some(count) = self.max_shard_count {
            config.max_shard_count = Some(count);
        }
        if let Some(extension) = &self.extension {
            config.extension = extension.clone();
        }
        if let Some(compression) = self.compress {
            config.compression = compression;
        }
        if let Some(template) = &self.key_template {
            config.key_template = template.clone();
        }
        if let Some(format) = self.format {
            config.frame_format = format;
        }
        if let Some(pattern) = &self.stack_pattern {
            config.stack_pattern = pattern.clone();
        }
        if let Some(pattern) = &self.filename_pattern {
            config.filename_pattern = Some(pattern.clone());
        }
        Ok(config)
    }

    fn resolve_inputs(&self) -> Result<Vec<PathBuf>> {
        if !self.each {
            return Ok(self.inputs.clone());
        }
        let mut inputs = Vec::new();
        for parent in &self.inputs {
            inputs.extend(discover_inputs(parent)?);
        }
        Ok(inputs)
    }
}

/// Cmd: Export recordings
fn cmd_export(kind: ExportKind, args: ExportArgs, verbose: bool) -> Result<()> {
    let config = args.to_config(kind, verbose)?;
    let inputs = args.resolve_inputs()?;
    let output_dir = config.output_dir.clone();

    let driver = BatchDriver::new(config, TiffStackDecoder::new())?;
    info!(
        inputs = inputs.len(),
        output = %output_dir.display(),
        "exporting {}",
        kind.as_str()
    );

    let start = Instant::now();
    let progress = ProgressBar::new(inputs.len() as u64, "export");
    let stats = driver.run_with_progress(&inputs, |input: &Path, _| {
        progress.inc(1);
        progress.set_message(display_name(input));
    })?;
    let elapsed = start.elapsed();
    progress.finish_with_message(format!("{} inputs", inputs.len()));

    println!("=== Export ===");
    println!("Succeeded: {}", stats.succeeded);
    println!("Failed: {}", stats.failed);
    println!("Samples: {}", stats.samples_written);
    println!("Shards: {}", stats.shards.len());
    let payload: u64 = stats.shards.iter().map(|s| s.payload_size).sum();
    println!("Payload: {}", format_bytes(payload));
    if stats.metadata_diagnostics > 0 {
        println!("Dropped metadata fields: {}", stats.metadata_diagnostics);
    }
    if !stats.compressed.is_empty() || !stats.compression_failures.is_empty() {
        println!(
            "Compressed: {} ({} left uncompressed)",
            stats.compressed.len(),
            stats.compression_failures.len()
        );
    }
    println!("Duration: {}", format_duration(elapsed.as_nanos() as u64));

    if !stats.failures.is_empty() {
        println!();
        println!("Failed inputs:");
        for failure in &stats.failures {
            println!("  {}: {}", failure.input.display(), failure.error);
        }
    }

    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
