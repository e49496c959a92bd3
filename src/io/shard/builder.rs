// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Builder pattern for creating shard writers.

use std::path::PathBuf;

use crate::{Result, ToileError};

use super::{ShardPattern, ShardWriter};

/// Default shard payload ceiling (3 GB).
pub const DEFAULT_MAX_SHARD_SIZE: u64 = 3_000_000_000;

/// Default archive extension.
pub const DEFAULT_EXTENSION: &str = "tar";

/// Configuration for creating a shard writer.
#[derive(Debug, Clone)]
pub struct ShardConfig {
    /// Output directory, stem and extension
    pub pattern: ShardPattern,
    /// Maximum payload bytes per shard
    pub max_size: u64,
    /// Maximum samples per shard
    pub max_count: Option<usize>,
}

impl Default for ShardConfig {
    fn default() -> Self {
        Self {
            pattern: ShardPattern {
                dir: PathBuf::new(),
                stem: String::new(),
                extension: DEFAULT_EXTENSION.to_string(),
            },
            max_size: DEFAULT_MAX_SHARD_SIZE,
            max_count: None,
        }
    }
}

/// Builder for creating shard writers.
#[derive(Debug, Clone, Default)]
pub struct ShardWriterBuilder {
    config: ShardConfig,
}

impl ShardWriterBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the output directory. It must already exist.
    pub fn dir<P: AsRef<std::path::Path>>(mut self, dir: P) -> Self {
        self.config.pattern.dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the filename stem.
    pub fn stem(mut self, stem: impl Into<String>) -> Self {
        self.config.pattern.stem = stem.into();
        self
    }

    /// Set the archive extension (without the dot).
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.config.pattern.extension = extension.into();
        self
    }

    /// Set the payload ceiling in bytes.
    pub fn max_size(mut self, bytes: u64) -> Self {
        self.config.max_size = bytes;
        self
    }

    /// Set the samples-per-shard ceiling.
    pub fn max_count(mut self, count: usize) -> Self {
        self.config.max_count = Some(count);
        self
    }

    /// Build the writer. No file is created until the first sample arrives.
    pub fn build(self) -> Result<ShardWriter> {
        let ShardConfig {
            pattern,
            max_size,
            max_count,
        } = &self.config;

        if pattern.dir.as_os_str().is_empty() {
            return Err(ToileError::config("shard output directory is not set"));
        }
        if pattern.stem.is_empty() || pattern.stem.contains(['/', '\\']) {
            return Err(ToileError::config(format!(
                "invalid shard stem '{}'",
                pattern.stem
            )));
        }
        if pattern.extension.is_empty()
            || pattern.extension.starts_with('.')
            || pattern.extension.contains(['/', '\\'])
        {
            return Err(ToileError::config(format!(
                "invalid shard extension '{}'",
                pattern.extension
            )));
        }
        if *max_size == 0 {
            return Err(ToileError::config("max shard size must be positive"));
        }
        if *max_count == Some(0) {
            return Err(ToileError::config("max shard count must be positive"));
        }

        Ok(ShardWriter::from_config(self.config))
    }
}
