// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Recording loader: input discovery, decoding and metadata collation.
//!
//! An input location is either a stack file or a directory holding one.
//! Inside a directory the stack is found by a glob pattern (by default
//! `*_*0001.ome.tif*`, the first file of a multi-file OME series):
//! - exactly one match is used directly
//! - several matches are accepted only when every name follows the
//!   multi-channel convention (`..._Ch<n>_<seq>.ome.tif`); the first in
//!   sorted order is used
//! - anything else is an input-load error

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::traits::StackDecoder;
use crate::metadata::{xml, Diagnostic, MetadataCollator};
use crate::recording::Recording;
use crate::{Result, ToileError};

/// Default glob for locating a stack inside an input directory.
pub const DEFAULT_STACK_PATTERN: &str = "*_*0001.ome.tif*";

/// Run `f` with logging silenced for its duration when `quiet` is set.
///
/// Only the current thread's dispatcher is replaced, and only for the call.
pub fn with_quiet_logs<T>(quiet: bool, f: impl FnOnce() -> T) -> T {
    if quiet {
        tracing::subscriber::with_default(tracing::subscriber::NoSubscriber::default(), f)
    } else {
        f()
    }
}

/// File-name glob supporting `*` and `?`.
#[derive(Debug, Clone)]
pub struct StackPattern {
    glob: String,
    regex: Regex,
}

impl StackPattern {
    /// Compile a glob pattern.
    pub fn new(glob: &str) -> Result<Self> {
        if glob.is_empty() || glob.contains('/') {
            return Err(ToileError::config(format!(
                "stack pattern must be a non-empty file name glob, got '{glob}'"
            )));
        }
        let mut source = String::from("^");
        for c in glob.chars() {
            match c {
                '*' => source.push_str(".*"),
                '?' => source.push('.'),
                other => source.push_str(&regex::escape(&other.to_string())),
            }
        }
        source.push('$');
        let regex = Regex::new(&source)
            .map_err(|e| ToileError::config(format!("invalid stack pattern '{glob}': {e}")))?;
        Ok(Self {
            glob: glob.to_string(),
            regex,
        })
    }

    /// Whether a file name matches.
    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    /// The original glob text.
    pub fn as_str(&self) -> &str {
        &self.glob
    }
}

impl Default for StackPattern {
    fn default() -> Self {
        Self::new(DEFAULT_STACK_PATTERN).expect("default stack pattern is valid")
    }
}

/// Locate the stack file for an input location.
pub fn find_stack(input: &Path, pattern: &StackPattern) -> Result<PathBuf> {
    if input.is_file() {
        return Ok(input.to_path_buf());
    }

    let entries = fs::read_dir(input)
        .map_err(|e| ToileError::load(input, format!("cannot read directory: {e}")))?;
    let mut matches: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| pattern.matches(name))
        .collect();
    matches.sort();

    match matches.len() {
        0 => Err(ToileError::load(
            input,
            format!("no matching image stack for '{}'", pattern.as_str()),
        )),
        1 => Ok(input.join(&matches[0])),
        _ if matches.iter().all(|name| is_channel_file(name)) => {
            debug!(
                input = %input.display(),
                candidates = matches.len(),
                "multi-channel stack; using {}",
                matches[0]
            );
            Ok(input.join(&matches[0]))
        }
        n => Err(ToileError::load(
            input,
            format!("unsupported multi-channel format ({n} candidate stacks)"),
        )),
    }
}

/// Whether the second-to-last `_` segment of a file name names a channel.
fn is_channel_file(name: &str) -> bool {
    let segments: Vec<&str> = name.split('_').collect();
    segments.len() >= 2 && segments[segments.len() - 2].contains("Ch")
}

/// List the recording directories under a parent directory, sorted by name.
pub fn discover_inputs(root: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        fs::read_dir(root).map_err(|e| ToileError::load(root, format!("cannot read directory: {e}")))?;
    let mut inputs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    inputs.sort();
    Ok(inputs)
}

/// Extracts movie-level fields from a stack file name.
///
/// Every named capture group of the pattern becomes a field. Captured text
/// that parses as an integer is stored as a number.
#[derive(Debug, Clone)]
pub struct FilenameParser {
    regex: Regex,
}

impl FilenameParser {
    /// Compile a pattern with named capture groups.
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| ToileError::config(format!("invalid filename pattern: {e}")))?;
        if regex.capture_names().flatten().next().is_none() {
            return Err(ToileError::config(format!(
                "filename pattern '{pattern}' has no named capture groups"
            )));
        }
        Ok(Self { regex })
    }

    /// Whether the pattern captures a field of this name.
    pub fn captures_field(&self, name: &str) -> bool {
        self.regex.capture_names().flatten().any(|n| n == name)
    }

    /// Parse a file name. A name that does not match yields no fields.
    pub fn parse(&self, file_name: &str) -> Map<String, Value> {
        let mut fields = Map::new();
        let Some(captures) = self.regex.captures(file_name) else {
            return fields;
        };
        for name in self.regex.capture_names().flatten() {
            if let Some(m) = captures.name(name) {
                let value = match m.as_str().parse::<i64>() {
                    Ok(n) => Value::from(n),
                    Err(_) => Value::String(m.as_str().to_string()),
                };
                fields.insert(name.to_string(), value);
            }
        }
        fields
    }
}

/// Loads recordings through a [`StackDecoder`].
#[derive(Debug)]
pub struct RecordingLoader<D> {
    decoder: D,
    pattern: StackPattern,
    filename_parser: Option<FilenameParser>,
    collator: MetadataCollator,
    quiet_decode: bool,
}

impl<D: StackDecoder> RecordingLoader<D> {
    /// Create a loader with the default stack pattern.
    pub fn new(decoder: D) -> Self {
        Self {
            decoder,
            pattern: StackPattern::default(),
            filename_parser: None,
            collator: MetadataCollator::new(),
            quiet_decode: true,
        }
    }

    /// Set the stack file pattern.
    pub fn with_pattern(mut self, pattern: StackPattern) -> Self {
        self.pattern = pattern;
        self
    }

    /// Parse movie-level fields from stack file names.
    pub fn with_filename_parser(mut self, parser: FilenameParser) -> Self {
        self.filename_parser = Some(parser);
        self
    }

    /// Set the metadata collator.
    pub fn with_collator(mut self, collator: MetadataCollator) -> Self {
        self.collator = collator;
        self
    }

    /// Silence log output from the decoder call (default: on).
    pub fn quiet_decode(mut self, quiet: bool) -> Self {
        self.quiet_decode = quiet;
        self
    }

    /// Load and collate one input.
    pub fn load(&self, input: &Path) -> Result<Recording> {
        let stack_path = find_stack(input, &self.pattern)?;
        let decoded = with_quiet_logs(self.quiet_decode, || self.decoder.decode(&stack_path))?;

        let mut diagnostics = Vec::new();
        let raw = match decoded.raw_metadata.as_deref() {
            Some(text) => match xml::parse_document(text) {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(input = %input.display(), "ignoring unreadable metadata document: {e}");
                    diagnostics.push(Diagnostic {
                        field: "<document>".to_string(),
                        value: String::new(),
                        reason: e.to_string(),
                    });
                    Map::new()
                }
            },
            None => Map::new(),
        };

        let collation = self.collator.collate(&raw);
        diagnostics.extend(collation.diagnostics);

        let filename_fields = match (&self.filename_parser, stack_path.file_name()) {
            (Some(parser), Some(name)) => parser.parse(&name.to_string_lossy()),
            _ => Map::new(),
        };

        let frames_described = collation.metadata.frame_count();
        let frame_count = decoded.pixels.frame_count();
        if frames_described.is_some_and(|n| n != frame_count) {
            debug!(
                input = %input.display(),
                frames = frame_count,
                described = ?frames_described,
                "frame metadata count differs from stack depth"
            );
        }

        Ok(Recording {
            source: input.to_path_buf(),
            pixels: decoded.pixels,
            metadata: collation.metadata,
            filename_fields,
            diagnostics,
        })
    }

    /// The underlying decoder.
    pub fn decoder(&self) -> &D {
        &self.decoder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_pattern_glob() {
        let pattern = StackPattern::default();
        assert!(pattern.matches("TSeries-001_Cycle00001_Ch2_000001.ome.tif"));
        assert!(pattern.matches("rec_00001.ome.tiff"));
        assert!(!pattern.matches("rec_00002.ome.tif"));
        assert!(!pattern.matches("notes.txt"));
    }

    #[test]
    fn test_stack_pattern_escapes_regex() {
        let pattern = StackPattern::new("a+b?.tif").unwrap();
        assert!(pattern.matches("a+bX.tif"));
        assert!(!pattern.matches("aabX.tif"));
        assert!(StackPattern::new("dir/*.tif").is_err());
    }

    #[test]
    fn test_channel_file_naming() {
        assert!(is_channel_file("TSeries_Cycle00001_Ch1_000001.ome.tif"));
        assert!(!is_channel_file("TSeries_Cycle00001_000001.ome.tif"));
        assert!(!is_channel_file("single.ome.tif"));
    }

    #[test]
    fn test_filename_parser() {
        let parser = FilenameParser::new(r"^m(?P<subject>\d+)_(?P<preparation>[a-z]+)_").unwrap();
        let fields = parser.parse("m12_slicea_00001.ome.tif");
        assert_eq!(fields["subject"], Value::from(12));
        assert_eq!(fields["preparation"], Value::from("slicea"));
        assert!(parser.captures_field("subject"));
        assert!(parser.parse("other.tif").is_empty());
    }

    #[test]
    fn test_filename_parser_requires_named_groups() {
        assert!(FilenameParser::new(r"(\d+)").is_err());
        assert!(FilenameParser::new(r"(?P<x>").is_err());
    }

    #[test]
    fn test_quiet_logs_returns_value() {
        assert_eq!(with_quiet_logs(true, || 7), 7);
        assert_eq!(with_quiet_logs(false, || 8), 8);
    }
}
