// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Common utilities for integration tests.

#![allow(dead_code)]

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use ndarray::Array3;
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

use toile::io::DecodedStack;
use toile::sample::{EncodedSample, SampleEntry};
use toile::{PixelStack, Result, StackDecoder, ToileError};

// ============================================================================
// Temporary Directories
// ============================================================================

/// Unique temporary directory for one test.
pub fn temp_dir(name: &str) -> (PathBuf, CleanupGuard) {
    // Process id plus a clock component keeps parallel tests apart
    let random = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .subsec_nanos();
    let dir = std::env::temp_dir().join(format!(
        "toile_{}_{}_{}",
        name,
        std::process::id(),
        random
    ));
    fs::create_dir_all(&dir).unwrap();
    (dir.clone(), CleanupGuard(dir))
}

/// Cleanup guard for test temporary files.
#[derive(Debug)]
pub struct CleanupGuard(pub PathBuf);

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.0);
    }
}

/// Sorted file names in a directory.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// ============================================================================
// Samples
// ============================================================================

/// A sample whose payload is exactly `size` bytes in one `bin` entry.
pub fn sized_sample(key: &str, size: usize) -> EncodedSample {
    EncodedSample::new(key, vec![SampleEntry::new("bin", vec![0xAB; size])])
}

// ============================================================================
// Fake Decoder
// ============================================================================

/// In-memory decoder: every stack has `frames` frames of `height x width`
/// u16 pixels, valued by position. Paths whose file name contains
/// `corrupt` fail to decode.
#[derive(Debug, Clone)]
pub struct FakeDecoder {
    pub frames: usize,
    pub height: usize,
    pub width: usize,
    pub metadata: Option<String>,
}

impl FakeDecoder {
    pub fn new(frames: usize) -> Self {
        Self {
            frames,
            height: 2,
            width: 3,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, xml: impl Into<String>) -> Self {
        self.metadata = Some(xml.into());
        self
    }
}

impl StackDecoder for FakeDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedStack> {
        let name = path.file_name().unwrap_or_default().to_string_lossy();
        if name.contains("corrupt") {
            return Err(ToileError::decode(path, "corrupt stack"));
        }
        let stack = Array3::from_shape_fn((self.frames, self.height, self.width), |(t, y, x)| {
            (t * 100 + y * 10 + x) as u16
        });
        Ok(DecodedStack {
            pixels: PixelStack::U16(stack),
            raw_metadata: self.metadata.clone(),
        })
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

// ============================================================================
// Recording Fixtures
// ============================================================================

/// Create `<root>/<name>/` holding an (empty) stack file called `stack_file`.
pub fn recording_dir(root: &Path, name: &str, stack_file: &str) -> PathBuf {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    File::create(dir.join(stack_file)).unwrap();
    dir
}

/// Minimal OME-XML document for a `t`-frame stack of `x` by `y` pixels.
pub fn ome_xml(x: usize, y: usize, t: usize) -> String {
    let planes: String = (0..t)
        .map(|i| format!(r#"<Plane TheT="{i}" DeltaT="{}" PositionX="1.5" PositionY="2.5" PositionZ="0"/>"#, i as f64 * 0.5))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<OME xmlns="http://www.openmicroscopy.org/Schemas/OME/2016-06" UUID="urn:uuid:0b0e3a4c-5e4f-4f6a-9a57-2f7c8d1e0f11">
  <Image ID="Image:0">
    <AcquisitionDate>2021-03-04T05:06:07</AcquisitionDate>
    <Pixels ID="Pixels:0" DimensionOrder="XYZCT" Type="uint16" SizeX="{x}" SizeY="{y}" SizeZ="1" SizeC="1" SizeT="{t}" PhysicalSizeX="0.8" PhysicalSizeY="0.8">
      <Channel ID="Channel:0:0" Name="Ch2"/>
      {planes}
    </Pixels>
  </Image>
</OME>"#
    )
}

/// Write a multi-page 16-bit grayscale TIFF, with `description` on the
/// first page.
pub fn write_tiff(path: &Path, stack: &Array3<u16>, description: Option<&str>) {
    let (frames, height, width) = stack.dim();
    let file = File::create(path).unwrap();
    let mut encoder = TiffEncoder::new(file).unwrap();
    for t in 0..frames {
        let data: Vec<u16> = stack.index_axis(ndarray::Axis(0), t).iter().copied().collect();
        let mut image = encoder
            .new_image::<colortype::Gray16>(width as u32, height as u32)
            .unwrap();
        if let (0, Some(text)) = (t, description) {
            image.encoder().write_tag(Tag::ImageDescription, text).unwrap();
        }
        image.write_data(&data).unwrap();
    }
}

/// A `(frames, height, width)` u16 stack valued by position.
pub fn ramp_stack(frames: usize, height: usize, width: usize) -> Array3<u16> {
    Array3::from_shape_fn((frames, height, width), |(t, y, x)| (t * 100 + y * 10 + x) as u16)
}
