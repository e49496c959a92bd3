// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core error types for toile.
//!
//! Errors fall into two groups:
//! - Per-input errors (load, decode, metadata, encode) that the batch driver
//!   records and skips
//! - Fatal errors (shard I/O, configuration, unsupported export kinds) that
//!   end the whole run

use thiserror::Error;

/// Errors that can occur while loading recordings and writing shards.
#[derive(Debug, Clone, Error)]
pub enum ToileError {
    /// An input could not be located or is in an unsupported layout
    #[error("Failed to load '{path}': {message}")]
    Load {
        /// Input location
        path: String,
        /// Error message
        message: String,
    },

    /// The image-stack decoder rejected an input file
    #[error("Failed to decode '{path}': {message}")]
    Decode {
        /// Decoded file
        path: String,
        /// Error message
        message: String,
    },

    /// The acquisition metadata document could not be read at all
    #[error("Unreadable metadata document: {message}")]
    Metadata {
        /// Error message
        message: String,
    },

    /// A sample payload could not be serialized
    #[error("{codec} encode error: {message}")]
    Encode {
        /// Payload kind (e.g., "npy", "json")
        codec: String,
        /// Error message
        message: String,
    },

    /// Writing, sealing or reading a shard failed
    #[error("Shard I/O error on '{path}': {message}")]
    ShardIo {
        /// Shard file
        path: String,
        /// Error message
        message: String,
    },

    /// Invalid export configuration
    #[error("Invalid configuration: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Unsupported export kind or pixel format
    #[error("Unsupported feature: '{feature}'")]
    Unsupported {
        /// What is not supported
        feature: String,
    },

    /// Malformed sample key template
    #[error("Invalid key template '{template}': {reason}")]
    Template {
        /// The template text
        template: String,
        /// Why it was rejected
        reason: String,
    },
}

impl ToileError {
    /// Create an input-load error.
    pub fn load(path: impl AsRef<std::path::Path>, message: impl Into<String>) -> Self {
        ToileError::Load {
            path: path.as_ref().display().to_string(),
            message: message.into(),
        }
    }

    /// Create a decode error.
    pub fn decode(path: impl AsRef<std::path::Path>, message: impl Into<String>) -> Self {
        ToileError::Decode {
            path: path.as_ref().display().to_string(),
            message: message.into(),
        }
    }

    /// Create a metadata document error.
    pub fn metadata(message: impl Into<String>) -> Self {
        ToileError::Metadata {
            message: message.into(),
        }
    }

    /// Create an encode error.
    pub fn encode(codec: impl Into<String>, message: impl Into<String>) -> Self {
        ToileError::Encode {
            codec: codec.into(),
            message: message.into(),
        }
    }

    /// Create a shard I/O error.
    pub fn shard_io(path: impl AsRef<std::path::Path>, message: impl Into<String>) -> Self {
        ToileError::ShardIo {
            path: path.as_ref().display().to_string(),
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        ToileError::Config {
            message: message.into(),
        }
    }

    /// Create an unsupported feature error.
    pub fn unsupported(feature: impl Into<String>) -> Self {
        ToileError::Unsupported {
            feature: feature.into(),
        }
    }

    /// Create a key template error.
    pub fn template(template: impl Into<String>, reason: impl Into<String>) -> Self {
        ToileError::Template {
            template: template.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error must end the run instead of failing one input.
    ///
    /// Shard state cannot be resumed after an I/O failure, and configuration
    /// errors mean the requested export cannot be performed at all.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ToileError::ShardIo { .. }
                | ToileError::Config { .. }
                | ToileError::Unsupported { .. }
                | ToileError::Template { .. }
        )
    }

    /// Get structured fields for logging.
    pub fn log_fields(&self) -> Vec<(&'static str, String)> {
        match self {
            ToileError::Load { path, message } | ToileError::Decode { path, message } => {
                vec![("path", path.clone()), ("message", message.clone())]
            }
            ToileError::Metadata { message } | ToileError::Config { message } => {
                vec![("message", message.clone())]
            }
            ToileError::Encode { codec, message } => {
                vec![("codec", codec.clone()), ("message", message.clone())]
            }
            ToileError::ShardIo { path, message } => {
                vec![("shard", path.clone()), ("message", message.clone())]
            }
            ToileError::Unsupported { feature } => vec![("feature", feature.clone())],
            ToileError::Template { template, reason } => {
                vec![("template", template.clone()), ("reason", reason.clone())]
            }
        }
    }
}

impl From<serde_json::Error> for ToileError {
    fn from(err: serde_json::Error) -> Self {
        ToileError::encode("json", err.to_string())
    }
}

/// Result type for toile operations.
pub type Result<T> = std::result::Result<T, ToileError>;
