// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Reading shards back into samples.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;

use crate::sample::{EncodedSample, SampleEntry};
use crate::{Result, ToileError};

/// Read every sample of a shard, in archive order.
///
/// Consecutive entries sharing a key (the entry name up to its first `.`)
/// form one sample. Compressed shards (`.gz`, `.zst`) are decompressed on
/// the fly.
pub fn read_shard(path: &Path) -> Result<Vec<EncodedSample>> {
    let file = File::open(path).map_err(|e| ToileError::shard_io(path, e.to_string()))?;
    let reader = BufReader::new(file);

    match path.extension().and_then(|e| e.to_str()) {
        Some("gz") => read_archive(path, GzDecoder::new(reader)),
        Some("zst") => {
            let decoder = zstd::stream::read::Decoder::new(reader)
                .map_err(|e| ToileError::shard_io(path, e.to_string()))?;
            read_archive(path, decoder)
        }
        _ => read_archive(path, reader),
    }
}

fn read_archive<R: Read>(path: &Path, reader: R) -> Result<Vec<EncodedSample>> {
    let io_err = |e: std::io::Error| ToileError::shard_io(path, e.to_string());
    let mut archive = tar::Archive::new(reader);
    let mut samples: Vec<EncodedSample> = Vec::new();

    for entry in archive.entries().map_err(io_err)? {
        let mut entry = entry.map_err(io_err)?;
        let name = entry.path().map_err(io_err)?.to_string_lossy().into_owned();
        let (key, extension) = name.split_once('.').ok_or_else(|| {
            ToileError::shard_io(path, format!("entry '{name}' has no extension"))
        })?;
        let (key, extension) = (key.to_string(), extension.to_string());

        let mut data = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut data).map_err(io_err)?;

        match samples.last_mut() {
            Some(last) if last.key == key => last.entries.push(SampleEntry::new(extension, data)),
            _ => samples.push(EncodedSample::new(key, vec![SampleEntry::new(extension, data)])),
        }
    }
    Ok(samples)
}
