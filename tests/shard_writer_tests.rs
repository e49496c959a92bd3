// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Shard writer tests.
//!
//! Tests cover:
//! - Size-based rollover (threshold 150, three 60-byte samples)
//! - No files for zero samples
//! - Oversized samples alone in a shard
//! - Payload ceiling over an irregular size sequence
//! - Order preservation across shards
//! - Count-based rollover
//! - Shard naming and key validation

mod common;

use std::path::Path;

use common::{file_names, sized_sample, temp_dir};
use toile::io::{read_shard, ShardWriter, ShardWriterBuilder};
use toile::sample::EncodedSample;
use toile::ToileError;

fn writer(dir: &Path, max_size: u64) -> ShardWriter {
    ShardWriterBuilder::new()
        .dir(dir)
        .stem("ds")
        .max_size(max_size)
        .build()
        .unwrap()
}

fn keys(samples: &[EncodedSample]) -> Vec<String> {
    samples.iter().map(|s| s.key.clone()).collect()
}

// ============================================================================
// Rollover
// ============================================================================

#[test]
fn test_three_60_byte_samples_threshold_150() {
    let (dir, _guard) = temp_dir("shard_rollover");
    let mut w = writer(&dir, 150);
    for key in ["a", "b", "c"] {
        w.write(&sized_sample(key, 60)).unwrap();
    }
    let shards = w.finish().unwrap();

    assert_eq!(shards.len(), 2);
    assert_eq!(shards[0].sample_count, 2);
    assert_eq!(shards[0].payload_size, 120);
    assert_eq!(shards[1].sample_count, 1);
    assert_eq!(shards[1].payload_size, 60);

    assert_eq!(keys(&read_shard(&shards[0].path).unwrap()), vec!["a", "b"]);
    assert_eq!(keys(&read_shard(&shards[1].path).unwrap()), vec!["c"]);
}

#[test]
fn test_exact_fit_does_not_roll_over() {
    let (dir, _guard) = temp_dir("shard_exact");
    let mut w = writer(&dir, 120);
    w.write(&sized_sample("a", 60)).unwrap();
    w.write(&sized_sample("b", 60)).unwrap();
    let shards = w.finish().unwrap();
    assert_eq!(shards.len(), 1);
    assert_eq!(shards[0].payload_size, 120);
}

#[test]
fn test_zero_samples_zero_files() {
    let (dir, _guard) = temp_dir("shard_empty");
    let shards = writer(&dir, 150).finish().unwrap();
    assert!(shards.is_empty());
    assert!(file_names(&dir).is_empty());
}

#[test]
fn test_dropped_writer_without_samples_leaves_nothing() {
    let (dir, _guard) = temp_dir("shard_drop_empty");
    drop(writer(&dir, 150));
    assert!(file_names(&dir).is_empty());
}

#[test]
fn test_oversized_sample_gets_its_own_shard() {
    let (dir, _guard) = temp_dir("shard_oversized");
    let mut w = writer(&dir, 100);
    w.write(&sized_sample("small1", 40)).unwrap();
    w.write(&sized_sample("huge", 500)).unwrap();
    w.write(&sized_sample("small2", 40)).unwrap();
    let shards = w.finish().unwrap();

    let counts: Vec<usize> = shards.iter().map(|s| s.sample_count).collect();
    assert_eq!(counts, vec![1, 1, 1]);
    assert_eq!(shards[1].payload_size, 500);
}

#[test]
fn test_oversized_first_sample() {
    let (dir, _guard) = temp_dir("shard_oversized_first");
    let mut w = writer(&dir, 10);
    w.write(&sized_sample("huge", 11)).unwrap();
    let shards = w.finish().unwrap();
    assert_eq!(shards.len(), 1);
    assert_eq!(read_shard(&shards[0].path).unwrap()[0].payload_size(), 11);
}

#[test]
fn test_size_ceiling_over_irregular_sizes() {
    let (dir, _guard) = temp_dir("shard_ceiling");
    let max = 1_000u64;
    let mut w = writer(&dir, max);

    // deterministic pseudo-random sizes, some above the ceiling
    let mut state = 0x2545_f491u32;
    let mut written = Vec::new();
    for i in 0..200 {
        state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        let size = (state >> 16) as usize % 1_300;
        let key = format!("{i:06}");
        w.write(&sized_sample(&key, size)).unwrap();
        written.push(key);
    }
    let shards = w.finish().unwrap();

    for shard in &shards {
        assert!(
            shard.payload_size <= max || shard.sample_count == 1,
            "shard {} holds {} samples, {} bytes",
            shard.index,
            shard.sample_count,
            shard.payload_size
        );
    }

    // order preserved across the whole sequence
    let mut read_back = Vec::new();
    for shard in &shards {
        read_back.extend(keys(&read_shard(&shard.path).unwrap()));
    }
    assert_eq!(read_back, written);
}

#[test]
fn test_max_count_rollover() {
    let (dir, _guard) = temp_dir("shard_count");
    let mut w = ShardWriterBuilder::new()
        .dir(&dir)
        .stem("ds")
        .max_count(2)
        .build()
        .unwrap();
    for i in 0..5 {
        w.write(&sized_sample(&format!("k{i}"), 1)).unwrap();
    }
    let counts: Vec<usize> = w.finish().unwrap().iter().map(|s| s.sample_count).collect();
    assert_eq!(counts, vec![2, 2, 1]);
}

// ============================================================================
// Naming and Validation
// ============================================================================

#[test]
fn test_shard_names_are_sequential() {
    let (dir, _guard) = temp_dir("shard_names");
    let mut w = ShardWriterBuilder::new()
        .dir(&dir)
        .stem("session1")
        .extension("tar")
        .max_size(10)
        .build()
        .unwrap();
    for i in 0..3 {
        w.write(&sized_sample(&format!("k{i}"), 10)).unwrap();
    }
    let shards = w.finish().unwrap();

    let indices: Vec<usize> = shards.iter().map(|s| s.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert_eq!(
        file_names(&dir),
        vec!["session1-000000.tar", "session1-000001.tar", "session1-000002.tar"]
    );
}

#[test]
fn test_entries_are_key_prefixed() {
    let (dir, _guard) = temp_dir("shard_entries");
    let mut w = writer(&dir, 1_000);
    let sample = EncodedSample::new(
        "000007",
        vec![
            toile::sample::SampleEntry::new("npy", vec![1, 2, 3]),
            toile::sample::SampleEntry::new("json", b"{}".to_vec()),
        ],
    );
    w.write(&sample).unwrap();
    let shards = w.finish().unwrap();

    let samples = read_shard(&shards[0].path).unwrap();
    assert_eq!(samples, vec![sample]);
}

#[test]
fn test_invalid_key_is_rejected_and_not_fatal() {
    let (dir, _guard) = temp_dir("shard_bad_key");
    let mut w = writer(&dir, 1_000);
    let err = w.write(&sized_sample("a.b", 5)).unwrap_err();
    assert!(matches!(err, ToileError::Encode { .. }));
    assert!(!err.is_fatal());

    // the writer is still usable and nothing was written for the bad key
    w.write(&sized_sample("ok", 5)).unwrap();
    let shards = w.finish().unwrap();
    assert_eq!(shards.len(), 1);
    assert_eq!(keys(&read_shard(&shards[0].path).unwrap()), vec!["ok"]);
}

#[test]
fn test_missing_output_dir_is_fatal() {
    let (dir, _guard) = temp_dir("shard_missing_dir");
    let mut w = writer(&dir.join("does/not/exist"), 1_000);
    let err = w.write(&sized_sample("a", 5)).unwrap_err();
    assert!(matches!(err, ToileError::ShardIo { .. }));
    assert!(err.is_fatal());
}
