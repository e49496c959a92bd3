// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Dataset sample types.
//!
//! Samples are immutable values written to a shard at most once:
//! - [`ImageSample`] - pixel plane only
//! - [`FrameSample`] - pixel plane plus merged movie/frame metadata
//! - [`ExperimentFrameSample`] - pixel plane plus subject and preparation ids
//!
//! Each type knows how to turn itself into archive entries through
//! [`WdsSample`]; the resulting [`EncodedSample`] is what the shard writer
//! consumes.

pub mod npy;
pub mod pixels;
pub mod view;

pub use pixels::{PixelStack, Plane};
pub use view::View;

use serde_json::{Map, Value};

use crate::core::{Identifier, Result};

/// Reserved metadata key holding the per-frame record.
pub const FRAME_KEY: &str = "frame";

/// Archive extension of the pixel payload entry.
pub const ARRAY_EXTENSION: &str = "npy";

/// Archive extension of the metadata entry.
pub const METADATA_EXTENSION: &str = "json";

/// One named entry of an encoded sample (`<key>.<extension>` in the archive).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleEntry {
    /// Entry extension (e.g., "npy", "json")
    pub extension: String,
    /// Entry bytes
    pub data: Vec<u8>,
}

impl SampleEntry {
    /// Create an entry.
    pub fn new(extension: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            extension: extension.into(),
            data,
        }
    }
}

/// A sample serialized into keyed archive entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedSample {
    /// Sample key shared by all entries
    pub key: String,
    /// Entries in write order
    pub entries: Vec<SampleEntry>,
}

impl EncodedSample {
    /// Create an encoded sample from raw entries.
    pub fn new(key: impl Into<String>, entries: Vec<SampleEntry>) -> Self {
        Self {
            key: key.into(),
            entries,
        }
    }

    /// Encode a sample under `key`.
    pub fn encode<S: WdsSample + ?Sized>(key: impl Into<String>, sample: &S) -> Result<Self> {
        Ok(Self::new(key, sample.entries()?))
    }

    /// Payload size in bytes: the sum of entry sizes, excluding archive framing.
    pub fn payload_size(&self) -> u64 {
        self.entries.iter().map(|e| e.data.len() as u64).sum()
    }

    /// Look up an entry by extension.
    pub fn entry(&self, extension: &str) -> Option<&SampleEntry> {
        self.entries.iter().find(|e| e.extension == extension)
    }
}

/// A sample that can be written as WebDataset archive entries.
pub trait WdsSample {
    /// Serialize into entries. The pixel payload comes first.
    fn entries(&self) -> Result<Vec<SampleEntry>>;
}

/// Pixel plane without metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSample {
    /// Pixel plane
    pub data: Plane,
}

/// One frame of a recording with its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSample {
    /// Pixel plane
    pub data: Plane,
    /// Movie-level fields plus the per-frame record under [`FRAME_KEY`]
    pub metadata: Map<String, Value>,
}

/// One frame tagged with the experiment it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentFrameSample {
    /// Pixel plane
    pub data: Plane,
    /// Experimental subject
    pub subject_id: Identifier,
    /// Preparation (slice, culture, ...) within the subject
    pub preparation_id: Identifier,
}

impl ImageSample {
    /// Create an image sample.
    pub fn new(data: Plane) -> Self {
        Self { data }
    }
}

impl FrameSample {
    /// Create a frame sample.
    pub fn new(data: Plane, metadata: Map<String, Value>) -> Self {
        Self { data, metadata }
    }

    /// Per-frame record, if the recording had one for this frame.
    pub fn frame(&self) -> Option<&Value> {
        self.metadata.get(FRAME_KEY)
    }
}

impl ExperimentFrameSample {
    /// Create an experiment-tagged frame sample.
    pub fn new(
        data: Plane,
        subject_id: impl Into<Identifier>,
        preparation_id: impl Into<Identifier>,
    ) -> Self {
        Self {
            data,
            subject_id: subject_id.into(),
            preparation_id: preparation_id.into(),
        }
    }
}

impl WdsSample for ImageSample {
    fn entries(&self) -> Result<Vec<SampleEntry>> {
        Ok(vec![SampleEntry::new(ARRAY_EXTENSION, npy::encode(&self.data))])
    }
}

impl WdsSample for FrameSample {
    fn entries(&self) -> Result<Vec<SampleEntry>> {
        Ok(vec![
            SampleEntry::new(ARRAY_EXTENSION, npy::encode(&self.data)),
            SampleEntry::new(METADATA_EXTENSION, serde_json::to_vec(&self.metadata)?),
        ])
    }
}

impl WdsSample for ExperimentFrameSample {
    fn entries(&self) -> Result<Vec<SampleEntry>> {
        let metadata = serde_json::json!({
            "subject_id": self.subject_id,
            "preparation_id": self.preparation_id,
        });
        Ok(vec![
            SampleEntry::new(ARRAY_EXTENSION, npy::encode(&self.data)),
            SampleEntry::new(METADATA_EXTENSION, serde_json::to_vec(&metadata)?),
        ])
    }
}
