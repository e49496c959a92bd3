// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # Toile
//!
//! Turns time-series microscopy recordings into sharded training datasets.
//!
//! A recording (an OME-TIFF stack plus its OME-XML acquisition metadata) is
//! decoded, its metadata collated into typed records, split into per-frame
//! samples, and streamed into size-bounded WebDataset-style tar shards.
//!
//! ## Architecture
//!
//! - `metadata/` - typed acquisition records, XML parsing and defensive collation
//! - `sample/` - pixel containers, sample types, `.npy` payloads and views
//! - `io/` - stack decoding, recording loading, shard writing and compression
//! - `pipeline/` - frame assembly and the batch driver
//!
//! ## Example: Exporting a batch
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::path::PathBuf;
//! use toile::{BatchDriver, ExportConfig, TiffStackDecoder};
//!
//! let config = ExportConfig::new("/data/shards/session1");
//! let driver = BatchDriver::new(config, TiffStackDecoder::new())?;
//! let stats = driver.run(&[PathBuf::from("/data/raw/TSeries-001")])?;
//! println!("{} ok, {} failed", stats.succeeded, stats.failed);
//! # Ok(())
//! # }
//! ```
//!
//! ## Example: Collating metadata
//!
//! ```rust
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use toile::metadata::{xml, MetadataCollator};
//!
//! let raw = xml::parse_document(r#"<OME><Image><Pixels SizeX="4" SizeY="4" SizeT="2"/></Image></OME>"#)?;
//! let collation = MetadataCollator::new().collate(&raw);
//! assert_eq!(collation.metadata.size_t, Some(2));
//! # Ok(())
//! # }
//! ```

// Core types
pub mod core;

// Re-export core types for convenience
pub use core::{Identifier, Result, ToileError};

// Acquisition metadata
pub mod metadata;

pub use metadata::{AcquisitionMetadata, ChannelMetadata, FrameMetadata, MetadataCollator};

// Samples and views
pub mod sample;

pub use sample::{
    EncodedSample, ExperimentFrameSample, FrameSample, ImageSample, PixelStack, Plane, View,
    WdsSample,
};

// Decoded recordings
pub mod recording;

pub use recording::Recording;

// I/O (decoders, loader, shards)
pub mod io;

pub use io::{
    Compression, RecordingLoader, ShardWriter, ShardWriterBuilder, StackDecoder,
    TiffStackDecoder,
};

// Export pipeline
pub mod pipeline;

pub use pipeline::{BatchDriver, ExportConfig, ExportKind, ExportStats, FrameAssembler, FrameFormat};
