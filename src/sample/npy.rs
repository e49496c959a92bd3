// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! NumPy `.npy` (format version 1.0) payloads for pixel planes.
//!
//! Layout: `\x93NUMPY`, version `1.0`, little-endian `u16` header length,
//! an ASCII dict header padded with spaces to a 64-byte boundary and ending
//! in `\n`, then C-order little-endian data.

use std::borrow::Cow;
use std::sync::OnceLock;

use byteorder::{ByteOrder, LittleEndian};
use ndarray::Array2;
use regex::Regex;

use super::Plane;
use crate::core::{Result, ToileError};

const MAGIC: &[u8] = b"\x93NUMPY";
const PRELUDE_LEN: usize = MAGIC.len() + 2 + 2;
const ALIGNMENT: usize = 64;

/// Encode a plane as an `.npy` byte buffer.
pub fn encode(plane: &Plane) -> Vec<u8> {
    let (rows, cols) = plane.dim();
    let mut header = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': ({rows}, {cols}), }}",
        plane.dtype()
    );
    let unpadded = PRELUDE_LEN + header.len() + 1;
    let padding = (ALIGNMENT - unpadded % ALIGNMENT) % ALIGNMENT;
    header.extend(std::iter::repeat(' ').take(padding));
    header.push('\n');

    let data_start = PRELUDE_LEN + header.len();
    let mut out = vec![0u8; data_start + plane.byte_len()];
    out[..MAGIC.len()].copy_from_slice(MAGIC);
    out[MAGIC.len()] = 1;
    out[MAGIC.len() + 1] = 0;
    LittleEndian::write_u16(&mut out[MAGIC.len() + 2..PRELUDE_LEN], header.len() as u16);
    out[PRELUDE_LEN..data_start].copy_from_slice(header.as_bytes());

    let data = &mut out[data_start..];
    match plane {
        Plane::U8(a) => data.copy_from_slice(&c_order(a)),
        Plane::U16(a) => LittleEndian::write_u16_into(&c_order(a), data),
        Plane::F32(a) => LittleEndian::write_f32_into(&c_order(a), data),
    }
    out
}

/// Decode an `.npy` buffer written by [`encode`].
pub fn decode(bytes: &[u8]) -> Result<Plane> {
    if bytes.len() < PRELUDE_LEN || &bytes[..MAGIC.len()] != MAGIC {
        return Err(ToileError::encode("npy", "missing NumPy magic"));
    }
    if bytes[MAGIC.len()] != 1 {
        return Err(ToileError::encode(
            "npy",
            format!("unsupported format version {}", bytes[MAGIC.len()]),
        ));
    }
    let header_len = LittleEndian::read_u16(&bytes[MAGIC.len() + 2..PRELUDE_LEN]) as usize;
    let data_start = PRELUDE_LEN + header_len;
    if bytes.len() < data_start {
        return Err(ToileError::encode("npy", "truncated header"));
    }
    let header = std::str::from_utf8(&bytes[PRELUDE_LEN..data_start])
        .map_err(|e| ToileError::encode("npy", format!("header is not UTF-8: {e}")))?;

    let captures = header_regex()
        .captures(header)
        .ok_or_else(|| ToileError::encode("npy", format!("unrecognized header: {header}")))?;
    if &captures["order"] != "False" {
        return Err(ToileError::encode("npy", "Fortran-ordered arrays are not supported"));
    }
    let rows: usize = captures["rows"]
        .parse()
        .map_err(|_| ToileError::encode("npy", "invalid row count"))?;
    let cols: usize = captures["cols"]
        .parse()
        .map_err(|_| ToileError::encode("npy", "invalid column count"))?;

    let data = &bytes[data_start..];
    let count = rows
        .checked_mul(cols)
        .ok_or_else(|| ToileError::encode("npy", format!("shape ({rows}, {cols}) overflows")))?;
    let descr = &captures["descr"];
    let width = match descr {
        "|u1" => 1,
        "<u2" => 2,
        "<f4" => 4,
        other => return Err(ToileError::unsupported(format!("npy dtype {other}"))),
    };
    let expected = count
        .checked_mul(width)
        .ok_or_else(|| ToileError::encode("npy", format!("shape ({rows}, {cols}) overflows")))?;
    if data.len() != expected {
        return Err(ToileError::encode(
            "npy",
            format!("expected {expected} data bytes, found {}", data.len()),
        ));
    }

    let shape_err = |e: ndarray::ShapeError| ToileError::encode("npy", e.to_string());
    Ok(match descr {
        "|u1" => Plane::U8(Array2::from_shape_vec((rows, cols), data.to_vec()).map_err(shape_err)?),
        "<u2" => {
            let mut values = vec![0u16; count];
            LittleEndian::read_u16_into(data, &mut values);
            Plane::U16(Array2::from_shape_vec((rows, cols), values).map_err(shape_err)?)
        }
        _ => {
            let mut values = vec![0f32; count];
            LittleEndian::read_f32_into(data, &mut values);
            Plane::F32(Array2::from_shape_vec((rows, cols), values).map_err(shape_err)?)
        }
    })
}

fn c_order<T: Copy>(a: &Array2<T>) -> Cow<'_, [T]> {
    match a.as_slice() {
        Some(slice) => Cow::Borrowed(slice),
        None => Cow::Owned(a.iter().copied().collect()),
    }
}

fn header_regex() -> &'static Regex {
    static HEADER: OnceLock<Regex> = OnceLock::new();
    HEADER.get_or_init(|| {
        Regex::new(
            r"'descr':\s*'(?P<descr>[^']+)',\s*'fortran_order':\s*(?P<order>True|False),\s*'shape':\s*\((?P<rows>\d+),\s*(?P<cols>\d+)\)",
        )
        .expect("static npy header pattern")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_alignment() {
        let bytes = encode(&Plane::U16(Array2::zeros((3, 7))));
        let header_len = LittleEndian::read_u16(&bytes[8..10]) as usize;
        assert_eq!((PRELUDE_LEN + header_len) % ALIGNMENT, 0);
        assert_eq!(bytes[PRELUDE_LEN + header_len - 1], b'\n');
        assert_eq!(bytes.len(), PRELUDE_LEN + header_len + 3 * 7 * 2);
    }

    #[test]
    fn test_u16_values_little_endian() {
        let plane = Plane::U16(Array2::from_shape_vec((1, 2), vec![0x0102, 0xA0B0]).unwrap());
        let bytes = encode(&plane);
        let data = &bytes[bytes.len() - 4..];
        assert_eq!(data, &[0x02, 0x01, 0xB0, 0xA0]);
        assert_eq!(decode(&bytes).unwrap(), plane);
    }

    #[test]
    fn test_transposed_view_written_in_c_order() {
        let a = Array2::from_shape_vec((2, 3), vec![1u8, 2, 3, 4, 5, 6]).unwrap();
        let t = a.t().to_owned();
        let bytes = encode(&Plane::U8(t.clone()));
        assert_eq!(decode(&bytes).unwrap(), Plane::U8(t));
    }

    #[test]
    fn test_reject_garbage() {
        assert!(decode(b"not an array").is_err());
        let mut bytes = encode(&Plane::F32(Array2::zeros((2, 2))));
        bytes.truncate(bytes.len() - 1);
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn test_reject_overflowing_shape() {
        let header = format!(
            "{{'descr': '<u2', 'fortran_order': False, 'shape': ({}, 3), }}\n",
            usize::MAX
        );
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&[1, 0]);
        bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
        bytes.extend_from_slice(header.as_bytes());

        let err = decode(&bytes).unwrap_err();
        assert!(err.to_string().contains("overflows"), "{err}");
    }
}
