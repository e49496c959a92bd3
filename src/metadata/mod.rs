// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Acquisition metadata records.
//!
//! Raw OME acquisition metadata arrives as an XML document whose fields may
//! or may not be present. This module provides:
//! - [`xml`] - XML document to nested key/value mapping
//! - [`collate`] - Defensive conversion of that mapping into typed records
//! - [`AcquisitionMetadata`] / [`FrameMetadata`] - The typed records
//!
//! Every field except [`FrameMetadata::t_index`] is optional. Absent fields
//! are skipped during serialization, so a record collated from an empty
//! mapping serializes to `{}`.

pub mod collate;
pub mod xml;

pub use collate::{Collation, Diagnostic, MetadataCollator, DATE_FORMAT};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::Result;

/// Unit for physical lengths (pixel scale, stage position).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthUnit {
    /// Micrometers
    Um,
    /// Millimeters
    Mm,
    /// Meters
    M,
}

/// Unit for frame timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    /// Milliseconds
    Ms,
    /// Seconds
    S,
    /// Minutes
    Min,
    /// Hours
    H,
}

/// One acquisition channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelMetadata {
    /// Channel name, if the acquisition software recorded one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Per-frame acquisition facts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameMetadata {
    /// Sequential index of this frame
    pub t_index: u32,

    /// x-position of stage offset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_x: Option<f64>,
    /// y-position of stage offset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_y: Option<f64>,
    /// z-position of stage offset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_z: Option<f64>,
    /// Unit of the `position_*` values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_unit: Option<LengthUnit>,

    /// Acquisition offset time of this frame
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<f64>,

    /// UUID given to the frame at acquisition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Uuid>,
}

impl FrameMetadata {
    /// Create frame metadata with only the required index set.
    pub fn new(t_index: u32) -> Self {
        Self {
            t_index,
            ..Default::default()
        }
    }

    /// Whether any stage position component is known.
    pub fn has_position(&self) -> bool {
        self.position_x.is_some() || self.position_y.is_some() || self.position_z.is_some()
    }
}

/// Session-level acquisition facts for one recording.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionMetadata {
    /// Acquisition UUID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Uuid>,

    /// Acquisition timestamp, serialized with [`DATE_FORMAT`]
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "date_format"
    )]
    pub date_acquired: Option<NaiveDateTime>,

    /// Physical pixel size along x
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_x: Option<f64>,
    /// Physical pixel size along y
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_y: Option<f64>,
    /// Physical pixel size along z
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_z: Option<f64>,
    /// Unit of the `scale_*` values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_unit: Option<LengthUnit>,
    /// Unit of frame timing, emitted as `t_unit`
    #[serde(default, rename = "t_unit", skip_serializing_if = "Option::is_none")]
    pub time_unit: Option<TimeUnit>,

    /// Size along x in pixels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_x: Option<u64>,
    /// Size along y in pixels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_y: Option<u64>,
    /// Size along z in planes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_z: Option<u64>,
    /// Number of time points
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_t: Option<u64>,

    /// Channels in acquisition order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<Vec<ChannelMetadata>>,

    /// Per-frame metadata in acquisition order.
    ///
    /// `None` means the document carried no frame descriptors at all, which
    /// is different from a recording with zero frames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frames: Option<Vec<FrameMetadata>>,
}

impl AcquisitionMetadata {
    /// Movie-level fields as a JSON object, excluding the per-frame list.
    pub fn movie_fields(&self) -> Result<serde_json::Map<String, serde_json::Value>> {
        let mut fields = match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        fields.remove("frames");
        Ok(fields)
    }

    /// Number of per-frame entries, if frame descriptors were present.
    pub fn frame_count(&self) -> Option<usize> {
        self.frames.as_ref().map(Vec::len)
    }
}

mod date_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::DATE_FORMAT;

    pub fn serialize<S>(value: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => serializer.serialize_str(&dt.format(DATE_FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text: Option<String> = Option::deserialize(deserializer)?;
        text.map(|s| NaiveDateTime::parse_from_str(&s, DATE_FORMAT))
            .transpose()
            .map_err(serde::de::Error::custom)
    }
}
