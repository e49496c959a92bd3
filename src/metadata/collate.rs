// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Defensive collation of raw acquisition metadata.
//!
//! Every field is converted on its own. A conversion that fails (wrong type,
//! malformed UUID, unparseable timestamp) produces a [`Diagnostic`] and the
//! field is left out; it never stops the rest of the record from being
//! collated.
//!
//! # Recognized paths
//!
//! The root may be the whole document (`OME` at the top), the `OME` element,
//! or an image element carrying `Pixels` directly.
//!
//! | Path                                  | Field                     |
//! |---------------------------------------|---------------------------|
//! | `OME/@UUID`                           | `uuid`                    |
//! | `OME/Image/AcquisitionDate`           | `date_acquired`           |
//! | `OME/Image/Pixels/@PhysicalSize{X,Y,Z}` | `scale_{x,y,z}`         |
//! | `OME/Image/Pixels/@Size{X,Y,Z,T}`     | `size_{x,y,z,t}`          |
//! | `OME/Image/Pixels/Channel`            | `channels`                |
//! | `OME/Image/Pixels/TiffData`, `Plane`  | `frames`                  |

use std::borrow::Cow;
use std::fmt;

use chrono::NaiveDateTime;
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use super::{AcquisitionMetadata, ChannelMetadata, FrameMetadata, LengthUnit, TimeUnit};

/// Timestamp format for acquisition dates, both accepted and emitted.
pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A metadata field that could not be converted and was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Path of the offending field (e.g., `Image/Pixels/@SizeX`)
    pub field: String,
    /// Raw value as found in the mapping
    pub value: String,
    /// Why the conversion failed
    pub reason: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} (value: {})", self.field, self.reason, self.value)
    }
}

/// Result of collating one metadata mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collation {
    /// Best-effort typed record
    pub metadata: AcquisitionMetadata,
    /// Fields that were present but dropped
    pub diagnostics: Vec<Diagnostic>,
}

impl Collation {
    /// Whether every present field was converted.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Converts nested key/value metadata into [`AcquisitionMetadata`].
///
/// Timestamps are accepted only in [`DATE_FORMAT`], the same format they are
/// serialized with.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataCollator;

impl MetadataCollator {
    /// Create a collator using [`DATE_FORMAT`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Collate a raw metadata mapping.
    pub fn collate(&self, raw: &Map<String, Value>) -> Collation {
        let mut log = DiagnosticLog::default();
        let mut meta = AcquisitionMetadata::default();

        let ome = match raw.get("OME") {
            Some(Value::Object(ome)) => ome,
            Some(other) => {
                log.record("OME", other, "expected a mapping");
                return log.finish(meta);
            }
            None => raw,
        };

        meta.uuid = field(&mut log, ome, "@UUID", "OME/@UUID", parse_uuid);

        let image = if ome.contains_key("Image") {
            single_block(&mut log, ome, "Image", "Image")
        } else if ome.contains_key("Pixels") {
            Some(ome)
        } else {
            None
        };

        if let Some(image) = image {
            self.collate_image(&mut log, image, &mut meta);
        }

        log.finish(meta)
    }

    fn collate_image(
        &self,
        log: &mut DiagnosticLog,
        image: &Map<String, Value>,
        meta: &mut AcquisitionMetadata,
    ) {
        meta.date_acquired = field(
            log,
            image,
            "AcquisitionDate",
            "Image/AcquisitionDate",
            parse_date,
        );

        let Some(pixels) = single_block(log, image, "Pixels", "Image/Pixels") else {
            return;
        };

        meta.scale_x = field(log, pixels, "@PhysicalSizeX", "Pixels/@PhysicalSizeX", parse_f64);
        meta.scale_y = field(log, pixels, "@PhysicalSizeY", "Pixels/@PhysicalSizeY", parse_f64);
        meta.scale_z = field(log, pixels, "@PhysicalSizeZ", "Pixels/@PhysicalSizeZ", parse_f64);
        if meta.scale_x.is_some() || meta.scale_y.is_some() || meta.scale_z.is_some() {
            meta.scale_unit = Some(LengthUnit::Um);
        }
        meta.time_unit = Some(TimeUnit::S);

        meta.size_x = field(log, pixels, "@SizeX", "Pixels/@SizeX", parse_u64);
        meta.size_y = field(log, pixels, "@SizeY", "Pixels/@SizeY", parse_u64);
        meta.size_z = field(log, pixels, "@SizeZ", "Pixels/@SizeZ", parse_u64);
        meta.size_t = field(log, pixels, "@SizeT", "Pixels/@SizeT", parse_u64);

        meta.channels = pixels
            .get("Channel")
            .map(|channel| collate_channels(log, channel));

        meta.frames = self.collate_frames(log, pixels);
    }

    fn collate_frames(
        &self,
        log: &mut DiagnosticLog,
        pixels: &Map<String, Value>,
    ) -> Option<Vec<FrameMetadata>> {
        let tiff_data = descriptor_list(log, pixels, "TiffData");
        let planes = descriptor_list(log, pixels, "Plane");

        let descriptors: Vec<Cow<'_, Map<String, Value>>> = match (tiff_data, planes) {
            (None, None) => return None,
            (Some(only), None) | (None, Some(only)) => only.into_iter().map(Cow::Borrowed).collect(),
            (Some(tiff_data), Some(planes)) => {
                if tiff_data.len() != planes.len() {
                    log.record_text(
                        "Pixels/TiffData+Plane",
                        format!("{} TiffData, {} Plane", tiff_data.len(), planes.len()),
                        "descriptor lists differ in length; unmatched entries dropped",
                    );
                }
                tiff_data
                    .iter()
                    .zip(&planes)
                    .map(|(a, b)| {
                        let mut merged: Map<String, Value> = (*a).clone();
                        merged.extend(b.iter().map(|(k, v)| (k.clone(), v.clone())));
                        Cow::Owned(merged)
                    })
                    .collect()
            }
        };

        Some(
            descriptors
                .iter()
                .enumerate()
                .map(|(position, raw)| collate_frame(log, raw, position))
                .collect(),
        )
    }
}

/// Collate one merged frame descriptor.
fn collate_frame(log: &mut DiagnosticLog, raw: &Map<String, Value>, position: usize) -> FrameMetadata {
    let path = |key: &str| format!("Pixels/Plane[{position}]/{key}");

    let t_index = field(log, raw, "@TheT", &path("@TheT"), parse_u32)
        .or_else(|| field(log, raw, "@FirstT", &path("@FirstT"), parse_u32));
    let t_index = t_index.unwrap_or_else(|| {
        log.record_text(
            path("@TheT"),
            "<missing>".to_string(),
            "no frame index; using descriptor position",
        );
        position as u32
    });

    let mut frame = FrameMetadata::new(t_index);
    frame.position_x = field(log, raw, "@PositionX", &path("@PositionX"), parse_f64);
    frame.position_y = field(log, raw, "@PositionY", &path("@PositionY"), parse_f64);
    frame.position_z = field(log, raw, "@PositionZ", &path("@PositionZ"), parse_f64);
    if frame.has_position() {
        frame.position_unit = Some(LengthUnit::Um);
    }
    frame.t = field(log, raw, "@DeltaT", &path("@DeltaT"), parse_f64);

    frame.uuid = match raw.get("UUID") {
        Some(Value::Object(uuid)) => field(log, uuid, "#text", &path("UUID"), parse_uuid),
        Some(text @ Value::String(_)) => match parse_uuid(text) {
            Ok(uuid) => Some(uuid),
            Err(reason) => {
                log.record(&path("UUID"), text, reason);
                None
            }
        },
        Some(Value::Null) | None => None,
        Some(other) => {
            log.record(&path("UUID"), other, "expected text");
            None
        }
    };

    frame
}

fn collate_channels(log: &mut DiagnosticLog, raw: &Value) -> Vec<ChannelMetadata> {
    let blocks: Vec<&Value> = match raw {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };

    blocks
        .into_iter()
        .enumerate()
        .map(|(i, block)| {
            let name = match block {
                Value::Object(channel) => match channel.get("@Name") {
                    Some(Value::String(name)) => Some(name.clone()),
                    Some(other) => {
                        log.record(&format!("Pixels/Channel[{i}]/@Name"), other, "expected text");
                        None
                    }
                    None => None,
                },
                _ => None,
            };
            ChannelMetadata { name }
        })
        .collect()
}

/// Look up a block that should be a single mapping.
///
/// A list is accepted by taking its first mapping, with a diagnostic.
fn single_block<'a>(
    log: &mut DiagnosticLog,
    parent: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Option<&'a Map<String, Value>> {
    match parent.get(key)? {
        Value::Object(block) => Some(block),
        Value::Array(items) => {
            let first = items.iter().find_map(Value::as_object);
            if first.is_some() {
                log.record_text(path, format!("{} blocks", items.len()), "multiple blocks; using the first");
            } else {
                log.record_text(path, format!("{} blocks", items.len()), "no mapping in list");
            }
            first
        }
        other => {
            log.record(path, other, "expected a mapping");
            None
        }
    }
}

/// Look up a descriptor list (`TiffData`, `Plane`).
///
/// A single mapping counts as a one-element list. Non-mapping elements keep
/// their position as an empty descriptor so later indices stay aligned.
fn descriptor_list<'a>(
    log: &mut DiagnosticLog,
    parent: &'a Map<String, Value>,
    key: &str,
) -> Option<Vec<&'a Map<String, Value>>> {
    static EMPTY: std::sync::OnceLock<Map<String, Value>> = std::sync::OnceLock::new();
    let empty = EMPTY.get_or_init(Map::new);

    match parent.get(key)? {
        Value::Object(single) => Some(vec![single]),
        Value::Array(items) => Some(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| match item {
                    Value::Object(descriptor) => descriptor,
                    other => {
                        log.record(&format!("Pixels/{key}[{i}]"), other, "expected a mapping");
                        empty
                    }
                })
                .collect(),
        ),
        other => {
            log.record(&format!("Pixels/{key}"), other, "expected a mapping or list");
            None
        }
    }
}

/// Convert one optional field, recording a diagnostic if it is present but invalid.
fn field<T>(
    log: &mut DiagnosticLog,
    map: &Map<String, Value>,
    key: &str,
    path: &str,
    parse: impl FnOnce(&Value) -> Result<T, String>,
) -> Option<T> {
    let raw = map.get(key)?;
    match parse(raw) {
        Ok(value) => Some(value),
        Err(reason) => {
            log.record(path, raw, reason);
            None
        }
    }
}

fn scalar_text(value: &Value) -> Result<Cow<'_, str>, String> {
    match value {
        Value::String(s) => Ok(Cow::Borrowed(s.trim())),
        Value::Number(n) => Ok(Cow::Owned(n.to_string())),
        Value::Null => Err("empty value".to_string()),
        _ => Err("expected a scalar".to_string()),
    }
}

fn parse_f64(value: &Value) -> Result<f64, String> {
    if let Value::Number(n) = value {
        return n.as_f64().ok_or_else(|| "not representable as float".to_string());
    }
    scalar_text(value)?
        .parse::<f64>()
        .map_err(|e| format!("invalid float: {e}"))
}

fn parse_u64(value: &Value) -> Result<u64, String> {
    if let Value::Number(n) = value {
        return n.as_u64().ok_or_else(|| "not a non-negative integer".to_string());
    }
    scalar_text(value)?
        .parse::<u64>()
        .map_err(|e| format!("invalid integer: {e}"))
}

fn parse_u32(value: &Value) -> Result<u32, String> {
    let n = parse_u64(value)?;
    u32::try_from(n).map_err(|_| format!("index {n} out of range"))
}

fn parse_uuid(value: &Value) -> Result<Uuid, String> {
    match value {
        Value::String(s) => Uuid::parse_str(s.trim()).map_err(|e| format!("invalid UUID: {e}")),
        _ => Err("expected UUID text".to_string()),
    }
}

fn parse_date(value: &Value) -> Result<NaiveDateTime, String> {
    match value {
        Value::String(s) => NaiveDateTime::parse_from_str(s.trim(), DATE_FORMAT)
            .map_err(|e| format!("invalid timestamp (expected {DATE_FORMAT}): {e}")),
        _ => Err("expected timestamp text".to_string()),
    }
}

#[derive(Default)]
struct DiagnosticLog {
    entries: Vec<Diagnostic>,
}

impl DiagnosticLog {
    fn record(&mut self, field: &str, value: &Value, reason: impl Into<String>) {
        let value = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        self.record_text(field, value, reason);
    }

    fn record_text(&mut self, field: impl Into<String>, value: String, reason: impl Into<String>) {
        let diagnostic = Diagnostic {
            field: field.into(),
            value,
            reason: reason.into(),
        };
        debug!(
            field = %diagnostic.field,
            value = %diagnostic.value,
            "dropping metadata field: {}",
            diagnostic.reason
        );
        self.entries.push(diagnostic);
    }

    fn finish(self, metadata: AcquisitionMetadata) -> Collation {
        Collation {
            metadata,
            diagnostics: self.entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn collate(value: Value) -> Collation {
        MetadataCollator::new().collate(&as_map(value))
    }

    #[test]
    fn test_sizes_coerced_to_integers() {
        let c = collate(json!({ "Pixels": { "@SizeX": "4", "@SizeY": "4", "@SizeT": "2" } }));
        assert!(c.is_clean());
        assert_eq!(c.metadata.size_x, Some(4));
        assert_eq!(c.metadata.size_y, Some(4));
        assert_eq!(c.metadata.size_t, Some(2));
        assert_eq!(c.metadata.size_z, None);
        assert_eq!(c.metadata.frames, None);
    }

    #[test]
    fn test_empty_mapping() {
        let c = collate(json!({}));
        assert!(c.is_clean());
        assert_eq!(c.metadata, AcquisitionMetadata::default());
    }

    #[test]
    fn test_urn_uuid_accepted() {
        let c = collate(json!({ "OME": { "@UUID": "urn:uuid:6f1c4a52-8f25-4c1e-9d43-0e9b2a6d7f10" } }));
        assert_eq!(
            c.metadata.uuid.unwrap().to_string(),
            "6f1c4a52-8f25-4c1e-9d43-0e9b2a6d7f10"
        );
    }

    #[test]
    fn test_invalid_date_dropped() {
        let c = collate(json!({ "OME": { "Image": { "AcquisitionDate": "yesterday" } } }));
        assert_eq!(c.metadata.date_acquired, None);
        assert_eq!(c.diagnostics.len(), 1);
        assert_eq!(c.diagnostics[0].field, "Image/AcquisitionDate");
    }

    #[test]
    fn test_date_normalized() {
        let c = collate(json!({ "OME": { "Image": { "AcquisitionDate": " 2022-11-03T14:05:09 " } } }));
        let json = serde_json::to_value(&c.metadata).unwrap();
        assert_eq!(json["date_acquired"], json!("2022-11-03T14:05:09"));
    }

    #[test]
    fn test_physical_scale_sets_unit() {
        let c = collate(json!({ "Pixels": { "@PhysicalSizeX": "0.65", "@PhysicalSizeY": "bad" } }));
        assert_eq!(c.metadata.scale_x, Some(0.65));
        assert_eq!(c.metadata.scale_y, None);
        assert_eq!(c.metadata.scale_unit, Some(LengthUnit::Um));
        assert_eq!(c.metadata.time_unit, Some(TimeUnit::S));
        assert_eq!(c.diagnostics.len(), 1);
    }

    #[test]
    fn test_no_scale_no_unit() {
        let c = collate(json!({ "Pixels": { "@SizeX": "8" } }));
        assert_eq!(c.metadata.scale_unit, None);
    }

    #[test]
    fn test_channels_single_and_list() {
        let c = collate(json!({ "Pixels": { "Channel": { "@Name": "GCaMP" } } }));
        assert_eq!(
            c.metadata.channels,
            Some(vec![ChannelMetadata { name: Some("GCaMP".into()) }])
        );

        let c = collate(json!({ "Pixels": { "Channel": [ { "@Name": "GFP" }, { "@ID": "Channel:0:1" } ] } }));
        let channels = c.metadata.channels.unwrap();
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[1].name, None);
    }

    #[test]
    fn test_frames_from_planes_only() {
        let c = collate(json!({ "Pixels": { "Plane": [
            { "@TheT": "0", "@DeltaT": "0.0", "@PositionX": "10.5" },
            { "@TheT": "1", "@DeltaT": "0.5" }
        ] } }));
        let frames = c.metadata.frames.unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].position_x, Some(10.5));
        assert_eq!(frames[0].position_unit, Some(LengthUnit::Um));
        assert_eq!(frames[1].position_unit, None);
        assert_eq!(frames[1].t, Some(0.5));
    }

    #[test]
    fn test_frames_merged_pairwise() {
        let c = collate(json!({ "Pixels": {
            "TiffData": [
                { "@FirstT": "0", "UUID": { "@FileName": "a.tif", "#text": "urn:uuid:11111111-2222-3333-4444-555555555555" } },
                { "@FirstT": "1" }
            ],
            "Plane": [ { "@TheT": "0", "@DeltaT": "0.1" }, { "@TheT": "1", "@DeltaT": "0.2" } ]
        } }));
        assert!(c.is_clean());
        let frames = c.metadata.frames.unwrap();
        assert_eq!(frames.len(), 2);
        assert!(frames[0].uuid.is_some());
        assert_eq!(frames[1].t, Some(0.2));
        assert_eq!(frames[1].t_index, 1);
    }

    #[test]
    fn test_unequal_descriptor_lists_stop_at_shorter() {
        let c = collate(json!({ "Pixels": {
            "TiffData": [ { "@FirstT": "0" } ],
            "Plane": [ { "@TheT": "0", "@DeltaT": "0.5" }, { "@TheT": "1" }, { "@TheT": "2" } ]
        } }));
        assert_eq!(c.metadata.frame_count(), Some(1));
        let frames = c.metadata.frames.as_ref().unwrap();
        assert_eq!(frames[0].t, Some(0.5));
        assert_eq!(c.diagnostics.len(), 1);
        assert_eq!(c.diagnostics[0].field, "Pixels/TiffData+Plane");

        let c = collate(json!({ "Pixels": {
            "TiffData": [ { "@FirstT": "0" }, { "@FirstT": "1" } ],
            "Plane": [ { "@TheT": "0" } ]
        } }));
        assert_eq!(c.metadata.frame_count(), Some(1));
    }

    #[test]
    fn test_missing_frame_index_uses_position() {
        let c = collate(json!({ "Pixels": { "Plane": [ { "@DeltaT": "0" }, { "@TheT": "x" } ] } }));
        let frames = c.metadata.frames.unwrap();
        assert_eq!(frames[0].t_index, 0);
        assert_eq!(frames[1].t_index, 1);
        // Missing index on the first, invalid + fallback on the second
        assert_eq!(c.diagnostics.len(), 3);
    }

    #[test]
    fn test_empty_plane_list_is_zero_frames() {
        let c = collate(json!({ "Pixels": { "Plane": [] } }));
        assert_eq!(c.metadata.frames, Some(vec![]));
    }

    #[test]
    fn test_invalid_frame_uuid_dropped() {
        let c = collate(json!({ "Pixels": { "Plane": { "@TheT": "0", "UUID": "not-a-uuid" } } }));
        let frames = c.metadata.frames.unwrap();
        assert_eq!(frames[0].uuid, None);
        assert_eq!(c.diagnostics[0].field, "Pixels/Plane[0]/UUID");
    }

    #[test]
    fn test_multiple_images_uses_first() {
        let c = collate(json!({ "OME": { "Image": [
            { "Pixels": { "@SizeX": "16" } },
            { "Pixels": { "@SizeX": "32" } }
        ] } }));
        assert_eq!(c.metadata.size_x, Some(16));
        assert_eq!(c.diagnostics.len(), 1);
    }

    #[test]
    fn test_numeric_values_accepted() {
        let c = collate(json!({ "Pixels": { "@SizeX": 12, "@PhysicalSizeZ": 2.5 } }));
        assert_eq!(c.metadata.size_x, Some(12));
        assert_eq!(c.metadata.scale_z, Some(2.5));
    }

    #[test]
    fn test_date_in_other_format_rejected() {
        let c = collate(json!({ "Image": { "AcquisitionDate": "03/11/2022 14:05", "Pixels": {} } }));
        assert!(c.metadata.date_acquired.is_none());
        assert_eq!(c.diagnostics[0].field, "Image/AcquisitionDate");

        // Accepted dates survive a serialize/deserialize cycle unchanged
        let c = collate(json!({ "Image": { "AcquisitionDate": "2022-11-03T14:05:00", "Pixels": {} } }));
        let text = serde_json::to_string(&c.metadata).unwrap();
        let back: AcquisitionMetadata = serde_json::from_str(&text).unwrap();
        assert_eq!(back.date_acquired, c.metadata.date_acquired);
    }
}
