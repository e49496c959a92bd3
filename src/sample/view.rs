// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Views: reduced sample shapes derived from, and written back into, fuller ones.
//!
//! A view type `V` of a full type `F` provides a pair of pure functions:
//! - [`View::project`] copies the fields `V` declares out of an `F`
//! - [`View::reconstruct`] builds a new `F` from a (possibly edited) `V`,
//!   taking every field `V` does not declare from an original `F`
//!
//! Projecting and then reconstructing against the same original yields a
//! value equal to that original.

use super::{ExperimentFrameSample, FrameSample, ImageSample};

/// A reduced shape of the full sample type `F`.
pub trait View<F>: Sized {
    /// Copy the view's fields out of a full sample.
    fn project(full: &F) -> Self;

    /// Rebuild a full sample, filling undeclared fields from `source`.
    fn reconstruct(self, source: &F) -> F;

    /// Edit a full sample through this view.
    fn modify(full: &F, edit: impl FnOnce(Self) -> Self) -> F {
        edit(Self::project(full)).reconstruct(full)
    }
}

impl View<FrameSample> for ImageSample {
    fn project(full: &FrameSample) -> Self {
        ImageSample::new(full.data.clone())
    }

    fn reconstruct(self, source: &FrameSample) -> FrameSample {
        FrameSample::new(self.data, source.metadata.clone())
    }
}

impl View<ExperimentFrameSample> for ImageSample {
    fn project(full: &ExperimentFrameSample) -> Self {
        ImageSample::new(full.data.clone())
    }

    fn reconstruct(self, source: &ExperimentFrameSample) -> ExperimentFrameSample {
        ExperimentFrameSample {
            data: self.data,
            subject_id: source.subject_id.clone(),
            preparation_id: source.preparation_id.clone(),
        }
    }
}

/// Check the project-then-reconstruct identity for one value.
pub fn round_trips<F, V>(full: &F) -> bool
where
    F: PartialEq,
    V: View<F>,
{
    V::project(full).reconstruct(full) == *full
}
