// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Export pipeline: frame assembly and the batch driver.

pub mod assemble;
pub mod driver;

pub use assemble::{rescale_to_u8, FrameAssembler, FrameIter, KeyTemplate, KeyedSample};
pub use driver::{
    BatchDriver, ExportConfig, ExportKind, ExportStats, FrameFormat, InputFailure,
};
