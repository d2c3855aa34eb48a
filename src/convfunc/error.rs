// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with convolution functions.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvFuncError {
    #[error("No beam model has been set; call set_sky_jones first")]
    NoBeamModel,

    #[error("No visibility channel frequencies were given, or some weren't positive")]
    NoFrequencies,

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("The sampling factor must be at least 1, but got {0}")]
    InvalidSampling(usize),

    /// Usually the image coordinates don't match the data.
    #[error("Couldn't find the support of the convolution function of MS {ms_id}, spw {spw_id} at {freq_hz} Hz; the beam is flat across the FFT grid. Check that the image's pixel scale suits the beam")]
    SupportDetection {
        ms_id: usize,
        spw_id: usize,
        freq_hz: f64,
    },

    #[error("The convolution function of MS {ms_id}, spw {spw_id} at {freq_hz} Hz sums to {sum} over its support; it must be positive")]
    Normalization {
        ms_id: usize,
        spw_id: usize,
        freq_hz: f64,
        sum: f64,
    },
}
