// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! I/O layer for imaging recordings and dataset shards.
//!
//! Input side: a [`StackDecoder`] turns a stack file into pixels plus an
//! optional OME-XML document, and the [`RecordingLoader`] locates stacks and
//! collates their metadata. Output side: the [`ShardWriter`] streams samples
//! into size-bounded tar shards, optionally compressed afterwards.

pub mod compress;
pub mod decoder;
pub mod loader;
pub mod shard;
pub mod traits;

// Re-exports
pub use compress::{compress_shards, Compression, CompressionReport};
pub use decoder::TiffStackDecoder;
pub use loader::{discover_inputs, find_stack, FilenameParser, RecordingLoader, StackPattern};
pub use shard::{read_shard, ShardInfo, ShardPattern, ShardWriter, ShardWriterBuilder};
pub use traits::{DecodedStack, StackDecoder};
