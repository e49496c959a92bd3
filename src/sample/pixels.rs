// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Pixel containers.
//!
//! A [`PixelStack`] is a `(t, y, x)` array for a whole recording; a [`Plane`]
//! is one `(y, x)` frame sliced out of it. Both are closed over the sample
//! types microscopy stacks actually use.

use ndarray::{Array2, Array3, Axis};

/// Pixel stack with a leading frame dimension.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelStack {
    /// 8-bit unsigned samples
    U8(Array3<u8>),
    /// 16-bit unsigned samples
    U16(Array3<u16>),
    /// 32-bit float samples
    F32(Array3<f32>),
}

/// Single 2-D pixel plane.
///
/// Equality is exact: float planes compare by bit pattern, so a plane holding
/// NaN equals its own copy.
#[derive(Debug, Clone)]
pub enum Plane {
    /// 8-bit unsigned samples
    U8(Array2<u8>),
    /// 16-bit unsigned samples
    U16(Array2<u16>),
    /// 32-bit float samples
    F32(Array2<f32>),
}

impl PartialEq for Plane {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Plane::U8(a), Plane::U8(b)) => a == b,
            (Plane::U16(a), Plane::U16(b)) => a == b,
            (Plane::F32(a), Plane::F32(b)) => {
                a.dim() == b.dim() && a.iter().zip(b.iter()).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            _ => false,
        }
    }
}

impl PixelStack {
    /// Number of frames (size of the leading dimension).
    pub fn frame_count(&self) -> usize {
        self.dim().0
    }

    /// Full `(t, y, x)` shape.
    pub fn dim(&self) -> (usize, usize, usize) {
        match self {
            PixelStack::U8(a) => a.dim(),
            PixelStack::U16(a) => a.dim(),
            PixelStack::F32(a) => a.dim(),
        }
    }

    /// Total number of pixel values.
    pub fn len(&self) -> usize {
        let (t, y, x) = self.dim();
        t * y * x
    }

    /// Whether the stack holds no pixel values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// NumPy dtype string of the samples.
    pub fn dtype(&self) -> &'static str {
        match self {
            PixelStack::U8(_) => "|u1",
            PixelStack::U16(_) => "<u2",
            PixelStack::F32(_) => "<f4",
        }
    }

    /// Copy out the frame at `index`.
    pub fn plane(&self, index: usize) -> Option<Plane> {
        if index >= self.frame_count() {
            return None;
        }
        Some(match self {
            PixelStack::U8(a) => Plane::U8(a.index_axis(Axis(0), index).to_owned()),
            PixelStack::U16(a) => Plane::U16(a.index_axis(Axis(0), index).to_owned()),
            PixelStack::F32(a) => Plane::F32(a.index_axis(Axis(0), index).to_owned()),
        })
    }
}

impl From<Plane> for PixelStack {
    /// A single 2-D image is a one-frame stack.
    fn from(plane: Plane) -> Self {
        match plane {
            Plane::U8(a) => PixelStack::U8(a.insert_axis(Axis(0))),
            Plane::U16(a) => PixelStack::U16(a.insert_axis(Axis(0))),
            Plane::F32(a) => PixelStack::F32(a.insert_axis(Axis(0))),
        }
    }
}

impl Plane {
    /// `(y, x)` shape.
    pub fn dim(&self) -> (usize, usize) {
        match self {
            Plane::U8(a) => a.dim(),
            Plane::U16(a) => a.dim(),
            Plane::F32(a) => a.dim(),
        }
    }

    /// NumPy dtype string of the samples.
    pub fn dtype(&self) -> &'static str {
        match self {
            Plane::U8(_) => "|u1",
            Plane::U16(_) => "<u2",
            Plane::F32(_) => "<f4",
        }
    }

    /// Size of the raw pixel data in bytes.
    pub fn byte_len(&self) -> usize {
        let (y, x) = self.dim();
        let width = match self {
            Plane::U8(_) => 1,
            Plane::U16(_) => 2,
            Plane::F32(_) => 4,
        };
        y * x * width
    }
}
