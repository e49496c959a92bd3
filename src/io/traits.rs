// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core traits for the I/O layer.
//!
//! Decoding an image stack is delegated to a [`StackDecoder`]. The loader
//! and batch driver only depend on this contract, so tests and alternative
//! formats can plug in their own decoders.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use toile::io::traits::StackDecoder;
//!
//! fn frame_count(decoder: &dyn StackDecoder, path: &Path) -> toile::Result<usize> {
//!     Ok(decoder.decode(path)?.pixels.frame_count())
//! }
//! ```

use std::path::Path;

use crate::sample::PixelStack;
use crate::Result;

/// Output of a stack decoder.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedStack {
    /// Pixel data with a leading frame dimension
    pub pixels: PixelStack,
    /// Raw acquisition metadata document (OME-XML), if the file carried one
    pub raw_metadata: Option<String>,
}

impl DecodedStack {
    /// Create a decoded stack without metadata.
    pub fn new(pixels: PixelStack) -> Self {
        Self {
            pixels,
            raw_metadata: None,
        }
    }

    /// Attach a raw metadata document.
    pub fn with_metadata(mut self, raw: impl Into<String>) -> Self {
        self.raw_metadata = Some(raw.into());
        self
    }
}

/// Decodes an image-stack file into pixels and raw metadata.
///
/// Errors returned here are per-input: the batch driver counts the input as
/// failed and moves on.
pub trait StackDecoder: Send + Sync {
    /// Decode the file at `path`.
    fn decode(&self, path: &Path) -> Result<DecodedStack>;

    /// Short name used in log messages.
    fn name(&self) -> &'static str {
        "decoder"
    }
}

impl<D: StackDecoder + ?Sized> StackDecoder for &D {
    fn decode(&self, path: &Path) -> Result<DecodedStack> {
        (**self).decode(path)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

impl<D: StackDecoder + ?Sized> StackDecoder for Box<D> {
    fn decode(&self, path: &Path) -> Result<DecodedStack> {
        (**self).decode(path)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
