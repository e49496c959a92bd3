// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Inspect command - list the samples of a shard.

use std::path::PathBuf;

use clap::Args;

use crate::common::{format_bytes, Result};
use toile::io::read_shard;
use toile::sample::{npy, ARRAY_EXTENSION, METADATA_EXTENSION};

/// Inspect a shard.
#[derive(Args, Clone, Debug)]
pub struct InspectCmd {
    /// Shard file (.tar, .tar.gz or .tar.zst)
    #[arg(value_name = "SHARD")]
    input: PathBuf,

    /// Print each sample's metadata entry
    #[arg(long)]
    metadata: bool,

    /// Show at most this many samples
    #[arg(short = 'n', long)]
    limit: Option<usize>,
}

impl InspectCmd {
    pub fn run(self) -> Result<()> {
        let samples = read_shard(&self.input)?;
        let total: u64 = samples.iter().map(|s| s.payload_size()).sum();

        println!("=== {} ===", self.input.display());
        println!("Samples: {}", samples.len());
        println!("Payload: {}", format_bytes(total));
        if let (Some(first), Some(last)) = (samples.first(), samples.last()) {
            println!("Keys: {} .. {}", first.key, last.key);
        }
        println!();

        let shown = self.limit.unwrap_or(samples.len());
        for sample in samples.iter().take(shown) {
            let entries: Vec<String> = sample
                .entries
                .iter()
                .map(|e| format!("{} ({})", e.extension, format_bytes(e.data.len() as u64)))
                .collect();
            println!("{}: {}", sample.key, entries.join(", "));

            if let Some(array) = sample.entry(ARRAY_EXTENSION) {
                match npy::decode(&array.data) {
                    Ok(plane) => {
                        let (h, w) = plane.dim();
                        println!("  array: {} {}x{}", plane.dtype(), h, w);
                    }
                    Err(e) => println!("  array: unreadable ({e})"),
                }
            }
            if self.metadata {
                if let Some(meta) = sample.entry(METADATA_EXTENSION) {
                    println!("  metadata: {}", String::from_utf8_lossy(&meta.data));
                }
            }
        }
        if shown < samples.len() {
            println!("... {} more", samples.len() - shown);
        }

        Ok(())
    }
}
