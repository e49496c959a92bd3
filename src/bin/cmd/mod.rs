// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! CLI subcommands.

mod export;
mod inspect;

pub use export::ExportCmd;
pub use inspect::InspectCmd;
