// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Batch export driver.
//!
//! Inputs are processed one at a time through load, assemble and write. A
//! failing input is counted, logged and skipped; samples it wrote before
//! failing stay in the output. Fatal errors (writer I/O, configuration) end
//! the run.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::assemble::{FrameAssembler, KeyTemplate, DEFAULT_KEY_TEMPLATE};
use crate::core::Identifier;
use crate::io::compress::{compress_shards, Compression};
use crate::io::loader::{FilenameParser, RecordingLoader, StackPattern, DEFAULT_STACK_PATTERN};
use crate::io::shard::builder::{DEFAULT_EXTENSION, DEFAULT_MAX_SHARD_SIZE};
use crate::io::shard::{ShardInfo, ShardWriter, ShardWriterBuilder};
use crate::io::traits::StackDecoder;
use crate::recording::Recording;
use crate::sample::{EncodedSample, ExperimentFrameSample, FrameSample, ImageSample, View};
use crate::{Result, ToileError};

/// Filename capture naming the experimental subject.
pub const SUBJECT_FIELD: &str = "subject";

/// Filename capture naming the preparation.
pub const PREPARATION_FIELD: &str = "preparation";

/// What an export run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    /// One sample per frame
    #[default]
    Frames,
    /// Fixed-length frame windows
    Clips,
    /// One sample per recording
    Movies,
}

/// Error returned when parsing an `ExportKind` from string fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseExportKindError {
    _private: (),
}

impl std::fmt::Display for ParseExportKindError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid export kind, expected 'frames', 'clips', or 'movies'")
    }
}

impl std::error::Error for ParseExportKindError {}

impl FromStr for ExportKind {
    type Err = ParseExportKindError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "frames" => Ok(ExportKind::Frames),
            "clips" => Ok(ExportKind::Clips),
            "movies" => Ok(ExportKind::Movies),
            _ => Err(ParseExportKindError { _private: () }),
        }
    }
}

impl ExportKind {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportKind::Frames => "frames",
            ExportKind::Clips => "clips",
            ExportKind::Movies => "movies",
        }
    }

    /// Whether this kind can be exported.
    pub fn is_implemented(&self) -> bool {
        matches!(self, ExportKind::Frames)
    }
}

/// Sample shape written for each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameFormat {
    /// Pixels plus merged movie/frame metadata
    #[default]
    Full,
    /// Pixels only
    Image,
    /// Pixels plus subject and preparation ids
    Experiment,
}

/// Error returned when parsing a `FrameFormat` from string fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseFrameFormatError {
    _private: (),
}

impl std::fmt::Display for ParseFrameFormatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid frame format, expected 'full', 'image', or 'experiment'")
    }
}

impl std::error::Error for ParseFrameFormatError {}

impl FromStr for FrameFormat {
    type Err = ParseFrameFormatError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" => Ok(FrameFormat::Full),
            "image" => Ok(FrameFormat::Image),
            "experiment" => Ok(FrameFormat::Experiment),
            _ => Err(ParseFrameFormatError { _private: () }),
        }
    }
}

/// Export configuration.
///
/// Every field has a default, so a TOML file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    /// Directory shards are written to (created if missing)
    pub output_dir: PathBuf,
    /// Shard filename stem; defaults to the output directory's name
    pub stem: Option<String>,
    /// Export kind
    pub kind: ExportKind,
    /// Maximum payload bytes per shard
    pub max_shard_size: u64,
    /// Maximum samples per shard
    pub max_shard_count: Option<usize>,
    /// Shard archive extension
    pub extension: String,
    /// Rescale each recording to 8 bits
    pub to_uint8: bool,
    /// Compression applied after all shards are sealed
    pub compression: Compression,
    /// Per-field diagnostics and decoder output
    pub verbose: bool,
    /// Sample key template
    pub key_template: String,
    /// Sample shape per frame
    pub frame_format: FrameFormat,
    /// Glob locating the stack inside an input directory
    pub stack_pattern: String,
    /// Regex with named captures applied to stack file names
    pub filename_pattern: Option<String>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::new(),
            stem: None,
            kind: ExportKind::default(),
            max_shard_size: DEFAULT_MAX_SHARD_SIZE,
            max_shard_count: None,
            extension: DEFAULT_EXTENSION.to_string(),
            to_uint8: false,
            compression: Compression::default(),
            verbose: false,
            key_template: DEFAULT_KEY_TEMPLATE.to_string(),
            frame_format: FrameFormat::default(),
            stack_pattern: DEFAULT_STACK_PATTERN.to_string(),
            filename_pattern: None,
        }
    }
}

impl ExportConfig {
    /// Default configuration writing to `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..Default::default()
        }
    }

    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| ToileError::config(format!("invalid config: {e}")))
    }

    /// Load a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ToileError::config(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Shard stem: the configured one, else the output directory's name.
    pub fn resolved_stem(&self) -> Result<String> {
        if let Some(stem) = &self.stem {
            return Ok(stem.clone());
        }
        self.output_dir
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                ToileError::config(format!(
                    "cannot derive a stem from output directory '{}'; set one explicitly",
                    self.output_dir.display()
                ))
            })
    }
}

/// An input that could not be exported.
#[derive(Debug, Clone)]
pub struct InputFailure {
    /// Input location
    pub input: PathBuf,
    /// What went wrong
    pub error: ToileError,
}

/// Outcome of a batch export.
#[derive(Debug, Clone, Default)]
pub struct ExportStats {
    /// Inputs exported completely
    pub succeeded: usize,
    /// Inputs skipped because of an error
    pub failed: usize,
    /// Samples written across all inputs
    pub samples_written: usize,
    /// Metadata fields dropped during collation
    pub metadata_diagnostics: usize,
    /// Shards written, in order
    pub shards: Vec<ShardInfo>,
    /// Failed inputs with their errors
    pub failures: Vec<InputFailure>,
    /// Compressed shard files
    pub compressed: Vec<PathBuf>,
    /// Shards left uncompressed, with the reason
    pub compression_failures: Vec<(PathBuf, String)>,
}

impl ExportStats {
    /// Whether any input failed.
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Paths of the final output files (compressed where compression succeeded).
    pub fn output_files(&self) -> Vec<PathBuf> {
        if self.compressed.is_empty() {
            return self.shards.iter().map(|s| s.path.clone()).collect();
        }
        let mut files = self.compressed.clone();
        files.extend(self.compression_failures.iter().map(|(p, _)| p.clone()));
        files.sort();
        files
    }
}

struct InputOutcome {
    diagnostics: usize,
}

/// Drives an export over many inputs.
#[derive(Debug)]
pub struct BatchDriver<D> {
    config: ExportConfig,
    stem: String,
    loader: RecordingLoader<D>,
    assembler: FrameAssembler,
}

impl<D: StackDecoder> BatchDriver<D> {
    /// Validate the configuration and create a driver.
    ///
    /// An unimplemented export kind, an invalid key template and any other
    /// configuration error are fatal and reported here, before any input is
    /// touched.
    pub fn new(config: ExportConfig, decoder: D) -> Result<Self> {
        if !config.kind.is_implemented() {
            return Err(ToileError::unsupported(format!(
                "export kind '{}'",
                config.kind.as_str()
            )));
        }
        if config.output_dir.as_os_str().is_empty() {
            return Err(ToileError::config("output directory is not set"));
        }
        let stem = config.resolved_stem()?;
        let template = KeyTemplate::parse(&config.key_template)?;

        let mut loader = RecordingLoader::new(decoder)
            .with_pattern(StackPattern::new(&config.stack_pattern)?)
            .quiet_decode(!config.verbose);
        let parser = config
            .filename_pattern
            .as_deref()
            .map(FilenameParser::new)
            .transpose()?;
        if config.frame_format == FrameFormat::Experiment {
            let captures_ids = parser.as_ref().is_some_and(|p| {
                p.captures_field(SUBJECT_FIELD) && p.captures_field(PREPARATION_FIELD)
            });
            if !captures_ids {
                return Err(ToileError::config(format!(
                    "experiment format needs a filename pattern capturing '{SUBJECT_FIELD}' and '{PREPARATION_FIELD}'"
                )));
            }
        }
        if let Some(parser) = parser {
            loader = loader.with_filename_parser(parser);
        }

        let assembler = FrameAssembler::new(template).with_rescale(config.to_uint8);
        Ok(Self {
            config,
            stem,
            loader,
            assembler,
        })
    }

    /// The configuration in use.
    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Export all inputs.
    pub fn run(&self, inputs: &[PathBuf]) -> Result<ExportStats> {
        self.run_with_progress(inputs, |_, _| {})
    }

    /// Export all inputs, calling `on_input` after each one with its error
    /// (if it failed).
    pub fn run_with_progress(
        &self,
        inputs: &[PathBuf],
        mut on_input: impl FnMut(&Path, Option<&ToileError>),
    ) -> Result<ExportStats> {
        let out = &self.config.output_dir;
        std::fs::create_dir_all(out)
            .map_err(|e| ToileError::shard_io(out, format!("cannot create output directory: {e}")))?;

        let mut builder = ShardWriterBuilder::new()
            .dir(out)
            .stem(self.stem.clone())
            .extension(self.config.extension.clone())
            .max_size(self.config.max_shard_size);
        if let Some(count) = self.config.max_shard_count {
            builder = builder.max_count(count);
        }
        let mut writer = builder.build()?;

        if inputs.len() > 1 && !self.assembler.template().uses_index() {
            warn!(
                template = self.assembler.template().as_str(),
                "key template has no {{index}} slot; keys may repeat across inputs"
            );
        }

        let mut stats = ExportStats::default();
        let mut next_index = 0usize;
        for input in inputs {
            match self.export_input(input, &mut writer, &mut next_index) {
                Ok(outcome) => {
                    stats.succeeded += 1;
                    stats.metadata_diagnostics += outcome.diagnostics;
                    on_input(input, None);
                }
                Err(e) if e.is_fatal() => {
                    warn!(input = %input.display(), "aborting export: {e}");
                    return Err(e);
                }
                Err(e) => {
                    warn!(input = %input.display(), "skipping input: {e}");
                    if self.config.verbose {
                        for (field, value) in e.log_fields() {
                            debug!(input = %input.display(), field, value = %value, "failure detail");
                        }
                    }
                    stats.failed += 1;
                    on_input(input, Some(&e));
                    stats.failures.push(InputFailure {
                        input: input.clone(),
                        error: e,
                    });
                }
            }
        }
        // includes samples flushed by inputs that failed part-way
        stats.samples_written = writer.samples_written();

        stats.shards = writer.finish()?;
        let paths: Vec<PathBuf> = stats.shards.iter().map(|s| s.path.clone()).collect();
        let report = compress_shards(&paths, self.config.compression);
        stats.compressed = report.compressed;
        stats.compression_failures = report.failed;

        info!(
            succeeded = stats.succeeded,
            failed = stats.failed,
            samples = stats.samples_written,
            shards = stats.shards.len(),
            "export finished"
        );
        Ok(stats)
    }

    fn export_input(
        &self,
        input: &Path,
        writer: &mut ShardWriter,
        next_index: &mut usize,
    ) -> Result<InputOutcome> {
        let recording = self.loader.load(input)?;
        let diagnostics = recording.diagnostics.len();
        self.report_diagnostics(&recording);

        let ids = match self.config.frame_format {
            FrameFormat::Experiment => Some(experiment_ids(&recording)?),
            _ => None,
        };

        let frames = self.assembler.assemble(recording, *next_index)?;
        let mut samples = 0;
        for keyed in frames {
            let keyed = keyed?;
            let encoded = self.encode_frame(&keyed.key, keyed.sample, ids.as_ref())?;
            writer.write(&encoded)?;
            *next_index += 1;
            samples += 1;
        }
        debug!(input = %input.display(), samples, "exported input");
        Ok(InputOutcome { diagnostics })
    }

    fn encode_frame(
        &self,
        key: &str,
        sample: FrameSample,
        ids: Option<&(Identifier, Identifier)>,
    ) -> Result<EncodedSample> {
        match (self.config.frame_format, ids) {
            (FrameFormat::Image, _) => {
                EncodedSample::encode(key, &<ImageSample as View<FrameSample>>::project(&sample))
            }
            (FrameFormat::Experiment, Some((subject, preparation))) => EncodedSample::encode(
                key,
                &ExperimentFrameSample::new(sample.data, subject.clone(), preparation.clone()),
            ),
            _ => EncodedSample::encode(key, &sample),
        }
    }

    fn report_diagnostics(&self, recording: &Recording) {
        if recording.diagnostics.is_empty() {
            return;
        }
        if self.config.verbose {
            for d in &recording.diagnostics {
                warn!(
                    input = %recording.source.display(),
                    field = %d.field,
                    value = %d.value,
                    "dropped metadata field: {}",
                    d.reason
                );
            }
        } else {
            info!(
                input = %recording.source.display(),
                count = recording.diagnostics.len(),
                "dropped metadata fields (use --verbose for details)"
            );
        }
    }
}

/// Subject and preparation ids parsed from the stack file name.
fn experiment_ids(recording: &Recording) -> Result<(Identifier, Identifier)> {
    let id = |field: &str| {
        recording
            .filename_fields
            .get(field)
            .and_then(Identifier::from_json)
            .ok_or_else(|| {
                ToileError::load(
                    &recording.source,
                    format!("file name does not provide '{field}'"),
                )
            })
    };
    Ok((id(SUBJECT_FIELD)?, id(PREPARATION_FIELD)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::traits::DecodedStack;

    #[derive(Debug)]
    struct NoDecoder;

    impl StackDecoder for NoDecoder {
        fn decode(&self, path: &Path) -> Result<DecodedStack> {
            Err(ToileError::decode(path, "no decoder"))
        }
    }

    #[test]
    fn test_parse_kinds() {
        assert_eq!("frames".parse::<ExportKind>().unwrap(), ExportKind::Frames);
        assert_eq!("Movies".parse::<ExportKind>().unwrap(), ExportKind::Movies);
        assert!("images".parse::<ExportKind>().is_err());
        assert!(ExportKind::Frames.is_implemented());
        assert!(!ExportKind::Clips.is_implemented());
        assert_eq!("experiment".parse::<FrameFormat>().unwrap(), FrameFormat::Experiment);
    }

    #[test]
    fn test_unimplemented_kind_is_fatal() {
        let config = ExportConfig {
            kind: ExportKind::Clips,
            ..ExportConfig::new("/tmp/out")
        };
        let err = BatchDriver::new(config, NoDecoder).unwrap_err();
        assert!(matches!(err, ToileError::Unsupported { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_experiment_format_needs_id_captures() {
        let config = ExportConfig {
            frame_format: FrameFormat::Experiment,
            filename_pattern: Some(r"(?P<subject>\d+)".into()),
            ..ExportConfig::new("/tmp/out")
        };
        assert!(matches!(
            BatchDriver::new(config, NoDecoder),
            Err(ToileError::Config { .. })
        ));
    }

    #[test]
    fn test_resolved_stem() {
        assert_eq!(ExportConfig::new("/data/run7").resolved_stem().unwrap(), "run7");
        let config = ExportConfig {
            stem: Some("custom".into()),
            ..ExportConfig::new("/data/run7")
        };
        assert_eq!(config.resolved_stem().unwrap(), "custom");
        assert!(ExportConfig::new("/").resolved_stem().is_err());
    }

    #[test]
    fn test_config_from_toml() {
        let config = ExportConfig::from_toml_str(
            r#"
            output_dir = "/data/out"
            max_shard_size = 1000
            compression = "gzip"
            frame_format = "image"
            "#,
        )
        .unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/data/out"));
        assert_eq!(config.max_shard_size, 1000);
        assert_eq!(config.compression, Compression::Gzip);
        assert_eq!(config.frame_format, FrameFormat::Image);
        assert_eq!(config.key_template, DEFAULT_KEY_TEMPLATE);
        assert_eq!(config.extension, "tar");

        assert!(ExportConfig::from_toml_str("unknown_key = 1").is_err());
        assert!(ExportConfig::from_toml_str("kind = \"images\"").is_err());
    }
}
