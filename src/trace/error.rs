// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with antenna pathologies.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PathologyError {
    /// Misalignments are rotations; anything else would shear or scale the
    /// optics.
    #[error("The {which} rotation matrix of the pathology isn't orthonormal")]
    NonOrthonormal { which: &'static str },

    #[error("The pathology has a non-finite {which}")]
    NonFinite { which: &'static str },
}
