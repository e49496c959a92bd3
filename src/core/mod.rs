// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core types used throughout toile.
//!
//! This module provides the foundational types for the library:
//! - [`ToileError`] - Error handling with fatal/per-input classification
//! - [`Identifier`] - Integer-or-string identifiers for subjects and preparations

pub mod error;
pub mod identifier;

pub use error::{Result, ToileError};
pub use identifier::Identifier;
