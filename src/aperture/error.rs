// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with aperture illumination.

use thiserror::Error;

use crate::trace::PathologyError;

#[derive(Error, Debug)]
pub enum ApertureError {
    #[error("Invalid aperture grid: {0}")]
    InvalidGrid(String),

    #[error("Can't calculate an aperture at {0} Hz; the frequency must be positive")]
    InvalidFrequency(f64),

    /// Every phase is measured against the ray near the optical axis.
    #[error("The reference ray near the optical axis of antenna '{antenna}' couldn't be traced")]
    CentralRay { antenna: String },

    #[error(transparent)]
    Pathology(#[from] PathologyError),
}
