// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Decoded recordings ("movies").

use std::path::PathBuf;

use serde_json::{Map, Value};

use crate::metadata::{AcquisitionMetadata, Diagnostic, FrameMetadata};
use crate::sample::PixelStack;
use crate::Result;

/// One decoded multi-frame acquisition with its collated metadata.
///
/// Produced by the recording loader and consumed by the frame assembler.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    /// Input location the recording was loaded from
    pub source: PathBuf,
    /// Pixel stack, `(t, y, x)`
    pub pixels: PixelStack,
    /// Collated acquisition metadata
    pub metadata: AcquisitionMetadata,
    /// Fields parsed from the file name
    pub filename_fields: Map<String, Value>,
    /// Metadata fields that were dropped during collation
    pub diagnostics: Vec<Diagnostic>,
}

impl Recording {
    /// Create a recording with no filename fields or diagnostics.
    pub fn new(
        source: impl Into<PathBuf>,
        pixels: PixelStack,
        metadata: AcquisitionMetadata,
    ) -> Self {
        Self {
            source: source.into(),
            pixels,
            metadata,
            filename_fields: Map::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Number of frames in the pixel stack.
    pub fn frame_count(&self) -> usize {
        self.pixels.frame_count()
    }

    /// Per-frame metadata, if the acquisition document described frames.
    pub fn frames(&self) -> Option<&[FrameMetadata]> {
        self.metadata.frames.as_deref()
    }

    /// Movie-level metadata map.
    ///
    /// Filename fields come first; acquisition fields with the same name
    /// replace them.
    pub fn movie_fields(&self) -> Result<Map<String, Value>> {
        let mut fields = self.filename_fields.clone();
        fields.extend(self.metadata.movie_fields()?);
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::Plane;
    use ndarray::Array2;
    use serde_json::json;

    #[test]
    fn test_acquisition_fields_win_over_filename_fields() {
        let mut rec = Recording::new(
            "rec",
            PixelStack::from(Plane::U8(Array2::zeros((2, 2)))),
            AcquisitionMetadata {
                size_x: Some(2),
                ..Default::default()
            },
        );
        rec.filename_fields.insert("size_x".into(), json!(99));
        rec.filename_fields.insert("subject".into(), json!(3));

        let fields = rec.movie_fields().unwrap();
        assert_eq!(fields["size_x"], json!(2));
        assert_eq!(fields["subject"], json!(3));
        assert_eq!(rec.frame_count(), 1);
        assert!(rec.frames().is_none());
    }
}
