// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Size-bounded shard writer.
//!
//! Samples are appended, in caller order, to a numbered sequence of tar
//! archives named `<stem>-NNNNNN.<ext>`. Before each sample the writer checks
//! the open shard:
//!
//! - if the shard is non-empty and adding the sample would push its payload
//!   past `max_size` (or its sample count reaches `max_count`), the shard is
//!   sealed and the next one is opened
//! - an empty shard always accepts the sample, so one oversized sample gets a
//!   shard of its own instead of being split
//!
//! Shards are opened lazily: a writer that never receives a sample leaves no
//! file behind. Payload size counts entry bytes only, not tar framing.

pub mod builder;
pub mod reader;

pub use builder::{ShardConfig, ShardWriterBuilder};
pub use reader::read_shard;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::sample::EncodedSample;
use crate::{Result, ToileError};

/// Width of the zero-padded shard sequence number.
pub const SHARD_INDEX_WIDTH: usize = 6;

/// Naming scheme for the shards of one export run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardPattern {
    /// Output directory
    pub dir: PathBuf,
    /// Filename prefix shared by all shards
    pub stem: String,
    /// Archive extension without the leading dot
    pub extension: String,
}

impl ShardPattern {
    /// Path of shard `index`.
    pub fn path(&self, index: usize) -> PathBuf {
        self.dir.join(format!(
            "{}-{:0width$}.{}",
            self.stem,
            index,
            self.extension,
            width = SHARD_INDEX_WIDTH
        ))
    }
}

/// Summary of one shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardInfo {
    /// Sequence number
    pub index: usize,
    /// File path
    pub path: PathBuf,
    /// Samples written
    pub sample_count: usize,
    /// Accumulated payload bytes
    pub payload_size: u64,
}

struct OpenShard {
    info: ShardInfo,
    archive: tar::Builder<BufWriter<File>>,
}

impl OpenShard {
    fn create(path: PathBuf, index: usize) -> Result<Self> {
        let file = File::create(&path)
            .map_err(|e| ToileError::shard_io(&path, format!("failed to create shard: {e}")))?;
        debug!(shard = %path.display(), "opened shard");
        let archive = tar::Builder::new(BufWriter::new(file));
        Ok(Self {
            info: ShardInfo {
                index,
                path,
                sample_count: 0,
                payload_size: 0,
            },
            archive,
        })
    }

    fn append(&mut self, sample: &EncodedSample) -> Result<()> {
        for entry in &sample.entries {
            let name = format!("{}.{}", sample.key, entry.extension);
            let mut header = tar::Header::new_gnu();
            header.set_size(entry.data.len() as u64);
            header.set_mode(0o644);
            header.set_mtime(0);
            self.archive
                .append_data(&mut header, &name, entry.data.as_slice())
                .map_err(|e| {
                    ToileError::shard_io(&self.info.path, format!("failed to write '{name}': {e}"))
                })?;
        }
        self.info.sample_count += 1;
        self.info.payload_size += sample.payload_size();
        Ok(())
    }

    fn seal(self) -> Result<ShardInfo> {
        let path = self.info.path.clone();
        let io_err = |e: std::io::Error| ToileError::shard_io(&path, format!("failed to seal shard: {e}"));
        let writer = self.archive.into_inner().map_err(io_err)?;
        let mut file = writer.into_inner().map_err(|e| io_err(e.into_error()))?;
        file.flush().map_err(io_err)?;
        debug!(
            shard = %path.display(),
            samples = self.info.sample_count,
            bytes = self.info.payload_size,
            "sealed shard"
        );
        Ok(self.info)
    }
}

/// Writes samples into size-bounded shards.
///
/// Create one with [`ShardWriterBuilder`]. Call [`ShardWriter::finish`] to
/// seal the last shard and collect the shard list; dropping an unfinished
/// writer seals on a best-effort basis and only logs failures.
pub struct ShardWriter {
    pattern: ShardPattern,
    max_size: u64,
    max_count: Option<usize>,
    current: Option<OpenShard>,
    sealed: Vec<ShardInfo>,
    samples_written: usize,
}

impl ShardWriter {
    pub(crate) fn from_config(config: ShardConfig) -> Self {
        Self {
            pattern: config.pattern,
            max_size: config.max_size,
            max_count: config.max_count,
            current: None,
            sealed: Vec::new(),
            samples_written: 0,
        }
    }

    /// Append one sample, rolling over to a new shard when needed.
    ///
    /// An invalid sample key is rejected before anything is written and is
    /// not fatal. I/O failures are fatal.
    pub fn write(&mut self, sample: &EncodedSample) -> Result<()> {
        validate_key(&sample.key)?;

        let size = sample.payload_size();
        let rollover = self.current.as_ref().is_some_and(|shard| {
            let info = &shard.info;
            let over_size = info.payload_size.saturating_add(size) > self.max_size;
            let over_count = self.max_count.is_some_and(|max| info.sample_count >= max);
            info.sample_count > 0 && (over_size || over_count)
        });
        if rollover {
            self.seal_current()?;
        }

        if self.current.is_none() {
            let index = self.sealed.len();
            self.current = Some(OpenShard::create(self.pattern.path(index), index)?);
        }
        if let Some(shard) = self.current.as_mut() {
            if shard.info.sample_count == 0 && size > self.max_size {
                debug!(key = %sample.key, size, max = self.max_size, "sample exceeds shard size");
            }
            shard.append(sample)?;
        }
        self.samples_written += 1;
        Ok(())
    }

    fn seal_current(&mut self) -> Result<()> {
        if let Some(shard) = self.current.take() {
            self.sealed.push(shard.seal()?);
        }
        Ok(())
    }

    /// Seal the open shard and return every shard written, in order.
    pub fn finish(mut self) -> Result<Vec<ShardInfo>> {
        self.seal_current()?;
        Ok(std::mem::take(&mut self.sealed))
    }

    /// Shards sealed so far.
    pub fn sealed(&self) -> &[ShardInfo] {
        &self.sealed
    }

    /// The shard currently open for writing.
    pub fn current(&self) -> Option<&ShardInfo> {
        self.current.as_ref().map(|s| &s.info)
    }

    /// Total samples accepted.
    pub fn samples_written(&self) -> usize {
        self.samples_written
    }

    /// Naming scheme in use.
    pub fn pattern(&self) -> &ShardPattern {
        &self.pattern
    }
}

impl std::fmt::Debug for ShardWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardWriter")
            .field("pattern", &self.pattern)
            .field("max_size", &self.max_size)
            .field("max_count", &self.max_count)
            .field("current", &self.current())
            .field("sealed", &self.sealed.len())
            .finish()
    }
}

impl Drop for ShardWriter {
    fn drop(&mut self) {
        if let Some(shard) = self.current.take() {
            warn!(shard = %shard.info.path.display(), "shard writer dropped without finish");
            if let Err(e) = shard.seal() {
                warn!("{e}");
            }
        }
    }
}

/// Sample keys become archive entry prefixes: no dots, no path separators.
fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(ToileError::encode("key", "sample key is empty"));
    }
    if key.contains(['.', '/', '\\']) {
        return Err(ToileError::encode(
            "key",
            format!("sample key '{key}' contains '.' or a path separator"),
        ));
    }
    Ok(())
}

/// Whether a path looks like a shard of this pattern.
pub fn is_shard_path(pattern: &ShardPattern, path: &Path) -> bool {
    if path.parent() != Some(pattern.dir.as_path()) {
        return false;
    }
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.strip_prefix(pattern.stem.as_str())
        .and_then(|rest| rest.strip_prefix('-'))
        .and_then(|rest| rest.strip_suffix(pattern.extension.as_str()))
        .and_then(|rest| rest.strip_suffix('.'))
        .is_some_and(|digits| {
            digits.len() == SHARD_INDEX_WIDTH && digits.bytes().all(|b| b.is_ascii_digit())
        })
}
