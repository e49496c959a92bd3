// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Best-effort compression of sealed shards.
//!
//! Each shard `<name>` is compressed to a sibling `<name>.gz` or
//! `<name>.zst`, then the original is removed. A failure leaves the
//! uncompressed shard in place (possibly next to a partial sibling) and is
//! reported, never raised.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// gzip level used for shards.
pub const GZIP_LEVEL: u32 = 4;

/// zstd level used for shards.
pub const ZSTD_LEVEL: i32 = 3;

/// Shard compression codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// Leave shards uncompressed
    #[default]
    None,
    /// gzip (`.gz`)
    Gzip,
    /// Zstandard (`.zst`)
    Zstd,
}

/// Error returned when parsing a `Compression` from string fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseCompressionError {
    _private: (),
}

impl std::fmt::Display for ParseCompressionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid compression, expected 'none', 'gzip', or 'zstd'")
    }
}

impl std::error::Error for ParseCompressionError {}

impl std::str::FromStr for Compression {
    type Err = ParseCompressionError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Compression::None),
            "gzip" | "gz" => Ok(Compression::Gzip),
            "zstd" | "zst" => Ok(Compression::Zstd),
            _ => Err(ParseCompressionError { _private: () }),
        }
    }
}

impl Compression {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Gzip => "gzip",
            Compression::Zstd => "zstd",
        }
    }

    /// File suffix appended to compressed shards.
    pub fn suffix(&self) -> Option<&'static str> {
        match self {
            Compression::None => None,
            Compression::Gzip => Some("gz"),
            Compression::Zstd => Some("zst"),
        }
    }

    /// Path of the compressed sibling of `path`.
    pub fn sibling(&self, path: &Path) -> Option<PathBuf> {
        let suffix = self.suffix()?;
        let mut name = OsString::from(path.as_os_str());
        name.push(".");
        name.push(suffix);
        Some(PathBuf::from(name))
    }
}

/// Outcome of a compression pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompressionReport {
    /// Compressed siblings that replaced their shard
    pub compressed: Vec<PathBuf>,
    /// Shards left uncompressed, with the reason
    pub failed: Vec<(PathBuf, String)>,
}

/// Compress every shard, replacing each on success.
pub fn compress_shards(shards: &[PathBuf], compression: Compression) -> CompressionReport {
    let mut report = CompressionReport::default();
    if compression == Compression::None {
        return report;
    }

    for shard in shards {
        match compress_file(shard, compression) {
            Ok(target) => {
                debug!(shard = %shard.display(), target = %target.display(), "compressed shard");
                report.compressed.push(target);
            }
            Err(e) => {
                warn!(shard = %shard.display(), codec = compression.as_str(), "compression failed: {e}");
                report.failed.push((shard.clone(), e.to_string()));
            }
        }
    }
    report
}

fn compress_file(source: &Path, compression: Compression) -> io::Result<PathBuf> {
    let Some(target) = compression.sibling(source) else {
        return Ok(source.to_path_buf());
    };

    let mut input = BufReader::new(File::open(source)?);
    let output = BufWriter::new(File::create(&target)?);
    match compression {
        Compression::Gzip => {
            let mut encoder = GzEncoder::new(output, flate2::Compression::new(GZIP_LEVEL));
            io::copy(&mut input, &mut encoder)?;
            encoder.finish()?.flush()?;
        }
        Compression::Zstd => {
            let mut encoder = zstd::stream::write::Encoder::new(output, ZSTD_LEVEL)?;
            io::copy(&mut input, &mut encoder)?;
            encoder.finish()?.flush()?;
        }
        Compression::None => {}
    }

    fs::remove_file(source)?;
    Ok(target)
}
