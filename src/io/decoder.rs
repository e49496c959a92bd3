// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! TIFF image-stack decoder.
//!
//! Reads every page of a grayscale (OME-)TIFF file into a `(t, y, x)` stack.
//! Pages must share one size and sample type. When the first page's
//! `ImageDescription` holds an OME-XML document, it is returned as the raw
//! metadata.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tiff::ColorType;
use tracing::debug;

use super::traits::{DecodedStack, StackDecoder};
use crate::sample::PixelStack;
use crate::{Result, ToileError};

/// Decoder for multi-page grayscale TIFF stacks.
#[derive(Debug, Clone, Copy, Default)]
pub struct TiffStackDecoder;

impl TiffStackDecoder {
    /// Create a TIFF decoder.
    pub fn new() -> Self {
        Self
    }
}

impl StackDecoder for TiffStackDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedStack> {
        let err = |e: tiff::TiffError| ToileError::decode(path, e.to_string());

        let file =
            File::open(path).map_err(|e| ToileError::decode(path, format!("failed to open: {e}")))?;
        let mut decoder = Decoder::new(BufReader::new(file))
            .map_err(err)?
            .with_limits(Limits::unlimited());

        let raw_metadata = decoder
            .get_tag_ascii_string(Tag::ImageDescription)
            .ok()
            .filter(|description| description.contains("<OME"));

        let (width, height) = decoder.dimensions().map_err(err)?;
        let mut pages = PageBuffer::Empty;
        let mut count = 0usize;

        loop {
            match decoder.colortype().map_err(err)? {
                ColorType::Gray(_) => {}
                other => {
                    return Err(ToileError::decode(
                        path,
                        format!("page {count}: unsupported color type {other:?}"),
                    ))
                }
            }
            let dims = decoder.dimensions().map_err(err)?;
            if dims != (width, height) {
                return Err(ToileError::decode(
                    path,
                    format!(
                        "page {count} is {}x{}, expected {width}x{height}",
                        dims.0, dims.1
                    ),
                ));
            }

            let image = decoder.read_image().map_err(err)?;
            pages.push(image).map_err(|m| ToileError::decode(path, format!("page {count}: {m}")))?;
            count += 1;

            if !decoder.more_images() {
                break;
            }
            decoder.next_image().map_err(err)?;
        }

        debug!(
            path = %path.display(),
            pages = count,
            width,
            height,
            has_metadata = raw_metadata.is_some(),
            "decoded TIFF stack"
        );

        let pixels = pages
            .into_stack((count, height as usize, width as usize))
            .map_err(|m| ToileError::decode(path, m))?;
        Ok(DecodedStack {
            pixels,
            raw_metadata,
        })
    }

    fn name(&self) -> &'static str {
        "tiff"
    }
}

/// Concatenated page data of one sample type.
enum PageBuffer {
    Empty,
    U8(Vec<u8>),
    U16(Vec<u16>),
    F32(Vec<f32>),
}

impl PageBuffer {
    fn push(&mut self, page: DecodingResult) -> std::result::Result<(), String> {
        if let PageBuffer::Empty = self {
            *self = match page {
                DecodingResult::U8(v) => PageBuffer::U8(v),
                DecodingResult::U16(v) => PageBuffer::U16(v),
                DecodingResult::F32(v) => PageBuffer::F32(v),
                _ => return Err("unsupported sample type".to_string()),
            };
            return Ok(());
        }
        match (self, page) {
            (PageBuffer::U8(acc), DecodingResult::U8(v)) => acc.extend(v),
            (PageBuffer::U16(acc), DecodingResult::U16(v)) => acc.extend(v),
            (PageBuffer::F32(acc), DecodingResult::F32(v)) => acc.extend(v),
            _ => return Err("sample type differs from earlier pages".to_string()),
        }
        Ok(())
    }

    fn into_stack(self, shape: (usize, usize, usize)) -> std::result::Result<PixelStack, String> {
        use ndarray::Array3;

        let shape_err = |e: ndarray::ShapeError| format!("page data does not match {shape:?}: {e}");
        match self {
            PageBuffer::Empty => Err("no pages".to_string()),
            PageBuffer::U8(v) => Ok(PixelStack::U8(Array3::from_shape_vec(shape, v).map_err(shape_err)?)),
            PageBuffer::U16(v) => Ok(PixelStack::U16(Array3::from_shape_vec(shape, v).map_err(shape_err)?)),
            PageBuffer::F32(v) => Ok(PixelStack::F32(Array3::from_shape_vec(shape, v).map_err(shape_err)?)),
        }
    }
}
