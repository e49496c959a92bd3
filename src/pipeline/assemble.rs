// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Frame assembly: splitting a recording into keyed per-frame samples.
//!
//! The assembler consumes a [`Recording`] and yields one [`FrameSample`] per
//! frame, lazily and in ascending frame order. Each sample's metadata is the
//! movie-level map with that frame's record inserted last under
//! [`FRAME_KEY`], so the frame record replaces any movie-level field of the
//! same name.
//!
//! Keys come from a [`KeyTemplate`] with two slots:
//! - `{index}` - running index across the whole dataset
//! - `{frame}` - index of the frame within its recording
//!
//! Both accept a zero-pad width, e.g. `{index:06}` (the default template).

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use ndarray::Array3;
use regex::Regex;
use serde_json::{Map, Value};

use crate::metadata::FrameMetadata;
use crate::recording::Recording;
use crate::sample::{FrameSample, PixelStack, FRAME_KEY};
use crate::{Result, ToileError};

/// Default sample key template.
pub const DEFAULT_KEY_TEMPLATE: &str = "{index:06}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Index,
    Frame,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Slot { slot: Slot, width: usize },
}

/// Parsed sample key template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyTemplate {
    source: String,
    parts: Vec<Part>,
}

fn slot_regex() -> &'static Regex {
    static SLOT: OnceLock<Regex> = OnceLock::new();
    SLOT.get_or_init(|| Regex::new(r"\{([^{}]*)\}").expect("slot regex is valid"))
}

impl KeyTemplate {
    /// Parse a template string.
    pub fn parse(template: &str) -> Result<Self> {
        let err = |reason: String| ToileError::template(template, reason);

        let mut parts = Vec::new();
        let mut has_slot = false;
        let mut last = 0;
        for caps in slot_regex().captures_iter(template) {
            let whole = caps.get(0).ok_or_else(|| err("empty match".into()))?;
            push_literal(&mut parts, &template[last..whole.start()]).map_err(err)?;
            last = whole.end();

            let inner = &caps[1];
            let (name, width) = match inner.split_once(':') {
                Some((name, format)) => {
                    let digits = format.strip_prefix('0').unwrap_or(format);
                    let width = digits
                        .parse::<usize>()
                        .map_err(|_| err(format!("invalid width '{format}' in slot '{name}'")))?;
                    (name, width)
                }
                None => (inner, 0),
            };
            let slot = match name {
                "index" => Slot::Index,
                "frame" => Slot::Frame,
                other => return Err(err(format!("unknown slot '{other}'"))),
            };
            has_slot = true;
            parts.push(Part::Slot { slot, width });
        }
        push_literal(&mut parts, &template[last..]).map_err(err)?;

        if !has_slot {
            return Err(err("template has no {index} or {frame} slot".into()));
        }
        Ok(Self {
            source: template.to_string(),
            parts,
        })
    }

    /// Render a key.
    pub fn render(&self, index: usize, frame: usize) -> String {
        let mut key = String::new();
        for part in &self.parts {
            match part {
                Part::Literal(text) => key.push_str(text),
                Part::Slot { slot, width } => {
                    let value = match slot {
                        Slot::Index => index,
                        Slot::Frame => frame,
                    };
                    key.push_str(&format!("{value:0width$}", width = *width));
                }
            }
        }
        key
    }

    /// The template text.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the template renders distinct keys for distinct dataset indices.
    pub fn uses_index(&self) -> bool {
        self.parts.iter().any(|p| matches!(p, Part::Slot { slot: Slot::Index, .. }))
    }
}

fn push_literal(parts: &mut Vec<Part>, text: &str) -> std::result::Result<(), String> {
    if text.is_empty() {
        return Ok(());
    }
    if text.contains(['{', '}']) {
        return Err(format!("unbalanced brace in '{text}'"));
    }
    if text.contains(['.', '/', '\\']) {
        return Err(format!("literal '{text}' contains '.' or a path separator"));
    }
    parts.push(Part::Literal(text.to_string()));
    Ok(())
}

impl Default for KeyTemplate {
    fn default() -> Self {
        Self::parse(DEFAULT_KEY_TEMPLATE).expect("default key template is valid")
    }
}

impl FromStr for KeyTemplate {
    type Err = ToileError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for KeyTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Rescale a whole stack to 8 bits.
///
/// Every value becomes `floor(v * 255 / max)` where `max` is the stack's
/// global maximum. A stack whose maximum is zero (or negative, or NaN) is
/// returned unchanged. Negative values saturate at 0.
pub fn rescale_to_u8(stack: PixelStack) -> PixelStack {
    let max = match &stack {
        PixelStack::U8(a) => a.iter().copied().max().map(f64::from),
        PixelStack::U16(a) => a.iter().copied().max().map(f64::from),
        PixelStack::F32(a) => a.iter().map(|&v| f64::from(v)).reduce(f64::max),
    };
    let max = match max {
        Some(m) if m > 0.0 => m,
        _ => return stack,
    };

    let scale = 255.0 / max;
    let to_u8 = |v: f64| (v * scale).floor() as u8;
    let rescaled: Array3<u8> = match &stack {
        PixelStack::U8(a) => a.mapv(|v| to_u8(f64::from(v))),
        PixelStack::U16(a) => a.mapv(|v| to_u8(f64::from(v))),
        PixelStack::F32(a) => a.mapv(|v| to_u8(f64::from(v))),
    };
    PixelStack::U8(rescaled)
}

/// Movie-level fields with the frame record inserted last under [`FRAME_KEY`].
pub fn merge_frame_metadata(
    movie: &Map<String, Value>,
    frame: Option<&FrameMetadata>,
) -> Result<Map<String, Value>> {
    let mut merged = movie.clone();
    if let Some(frame) = frame {
        merged.insert(FRAME_KEY.to_string(), serde_json::to_value(frame)?);
    }
    Ok(merged)
}

/// A sample with the key it will be written under.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedSample<S> {
    /// Rendered sample key
    pub key: String,
    /// Dataset-wide index
    pub index: usize,
    /// Frame index within the recording
    pub frame: usize,
    /// The sample
    pub sample: S,
}

impl<S> KeyedSample<S> {
    /// Replace the sample, keeping key and indices.
    pub fn map<T>(self, f: impl FnOnce(S) -> T) -> KeyedSample<T> {
        KeyedSample {
            key: self.key,
            index: self.index,
            frame: self.frame,
            sample: f(self.sample),
        }
    }
}

/// Turns recordings into keyed frame samples.
#[derive(Debug, Clone, Default)]
pub struct FrameAssembler {
    template: KeyTemplate,
    to_uint8: bool,
}

impl FrameAssembler {
    /// Create an assembler with the given key template.
    pub fn new(template: KeyTemplate) -> Self {
        Self {
            template,
            to_uint8: false,
        }
    }

    /// Rescale each recording to 8 bits before slicing.
    pub fn with_rescale(mut self, to_uint8: bool) -> Self {
        self.to_uint8 = to_uint8;
        self
    }

    /// Key template in use.
    pub fn template(&self) -> &KeyTemplate {
        &self.template
    }

    /// Start assembling a recording. Sample `i` gets dataset index
    /// `first_index + i`.
    ///
    /// Movie-level metadata and the optional rescale are computed here, once;
    /// frames are sliced as the iterator advances.
    pub fn assemble(&self, recording: Recording, first_index: usize) -> Result<FrameIter> {
        let movie = recording.movie_fields()?;
        let pixels = if self.to_uint8 {
            rescale_to_u8(recording.pixels)
        } else {
            recording.pixels
        };
        Ok(FrameIter {
            pixels,
            movie,
            frames: recording.metadata.frames,
            template: self.template.clone(),
            first_index,
            position: 0,
        })
    }
}

/// One-pass iterator over the frames of a recording.
#[derive(Debug)]
pub struct FrameIter {
    pixels: PixelStack,
    movie: Map<String, Value>,
    frames: Option<Vec<FrameMetadata>>,
    template: KeyTemplate,
    first_index: usize,
    position: usize,
}

impl Iterator for FrameIter {
    type Item = Result<KeyedSample<FrameSample>>;

    fn next(&mut self) -> Option<Self::Item> {
        let frame = self.position;
        let plane = self.pixels.plane(frame)?;
        self.position += 1;

        let record = self.frames.as_ref().and_then(|frames| frames.get(frame));
        let index = self.first_index + frame;
        Some(
            merge_frame_metadata(&self.movie, record).map(|metadata| KeyedSample {
                key: self.template.render(index, frame),
                index,
                frame,
                sample: FrameSample::new(plane, metadata),
            }),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.pixels.frame_count().saturating_sub(self.position);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for FrameIter {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::AcquisitionMetadata;
    use crate::sample::Plane;
    use ndarray::Array2;
    use serde_json::json;

    fn stack_u16(values: &[u16], frames: usize) -> PixelStack {
        let per = values.len() / frames;
        PixelStack::U16(Array3::from_shape_vec((frames, 1, per), values.to_vec()).unwrap())
    }

    #[test]
    fn test_default_template() {
        let t = KeyTemplate::default();
        assert_eq!(t.render(7, 0), "000007");
        assert_eq!(t.render(1_234_567, 0), "1234567");
        assert!(t.uses_index());
    }

    #[test]
    fn test_template_slots_and_literals() {
        let t: KeyTemplate = "m{index:04}_f{frame:03}".parse().unwrap();
        assert_eq!(t.render(12, 5), "m0012_f005");

        let t = KeyTemplate::parse("{frame}").unwrap();
        assert_eq!(t.render(99, 3), "3");
        assert!(!t.uses_index());
    }

    #[test]
    fn test_template_rejects_bad_input() {
        for bad in ["", "plain", "{name}", "{index:x}", "{index}.npy", "a/{index}", "{index}}"] {
            let err = KeyTemplate::parse(bad).unwrap_err();
            assert!(matches!(err, ToileError::Template { .. }), "{bad}");
        }
    }

    #[test]
    fn test_rescale() {
        let stack = stack_u16(&[0, 100, 200, 400], 2);
        let PixelStack::U8(out) = rescale_to_u8(stack) else {
            panic!("expected u8 stack");
        };
        assert_eq!(out.iter().copied().collect::<Vec<_>>(), vec![0, 63, 127, 255]);
    }

    #[test]
    fn test_rescale_zero_max_is_noop() {
        let stack = stack_u16(&[0, 0, 0, 0], 2);
        assert_eq!(rescale_to_u8(stack.clone()), stack);

        let floats = PixelStack::F32(Array3::from_elem((1, 2, 2), -1.0));
        assert_eq!(rescale_to_u8(floats.clone()), floats);
    }

    #[test]
    fn test_frame_record_wins_on_collision() {
        let mut movie = Map::new();
        movie.insert("size_t".into(), json!(2));
        movie.insert(FRAME_KEY.into(), json!("movie-level"));

        let frame = FrameMetadata {
            t: Some(0.5),
            ..FrameMetadata::new(1)
        };
        let merged = merge_frame_metadata(&movie, Some(&frame)).unwrap();
        assert_eq!(merged["size_t"], json!(2));
        assert_eq!(merged[FRAME_KEY]["t_index"], json!(1));
        assert_eq!(merged[FRAME_KEY]["t"], json!(0.5));

        let unchanged = merge_frame_metadata(&movie, None).unwrap();
        assert_eq!(unchanged, movie);
    }

    #[test]
    fn test_assemble_orders_and_keys_frames() {
        let metadata = AcquisitionMetadata {
            size_t: Some(3),
            frames: Some(vec![FrameMetadata::new(0), FrameMetadata::new(1)]),
            ..Default::default()
        };
        let recording = Recording::new("rec", stack_u16(&[1, 2, 3, 4, 5, 6], 3), metadata);

        let iter = FrameAssembler::default().assemble(recording, 10).unwrap();
        assert_eq!(iter.len(), 3);
        let samples: Vec<_> = iter.collect::<Result<_>>().unwrap();

        let keys: Vec<_> = samples.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["000010", "000011", "000012"]);
        assert_eq!(samples[1].sample.data, Plane::U16(Array2::from_shape_vec((1, 2), vec![3, 4]).unwrap()));
        assert_eq!(samples[1].sample.frame().unwrap()["t_index"], json!(1));
        // fewer frame records than frames
        assert!(samples[2].sample.frame().is_none());
        assert_eq!(samples[2].sample.metadata["size_t"], json!(3));
    }

    #[test]
    fn test_assemble_with_rescale() {
        let recording = Recording::new(
            "rec",
            stack_u16(&[0, 510], 2),
            AcquisitionMetadata::default(),
        );
        let samples: Vec<_> = FrameAssembler::default()
            .with_rescale(true)
            .assemble(recording, 0)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(samples[1].sample.data, Plane::U8(Array2::from_elem((1, 1), 255)));
    }
}
