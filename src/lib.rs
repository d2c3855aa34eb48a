// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Primary beams of Cassegrain dish antennas from ray-traced aperture
illumination, and the cached convolution functions that apply primary beams
while gridding mosaics.
 */

pub mod aperture;
mod constants;
pub mod convfunc;
pub mod errors;
mod fft;
pub mod geometry;
#[cfg(test)]
mod test_antenna;
pub mod trace;
pub mod types;

pub use aperture::{
    calculate_aperture, calculate_aperture_plane, far_field_pattern, ApertureCalcParams,
    ApertureError, PolBasis,
};
pub use constants::{DATA_ROOT_ENV_VAR, MAX_GEOM, VEL_C, VLBA_LEG_AZIMUTHS};
pub use convfunc::{
    ConvFuncCache, ConvFuncError, ConvFunction, GaussianBeam, ImageParams, ScreenGrid, SkyJones,
    VisMeta,
};
pub use errors::*;
pub use geometry::{
    AntennaGeometry, BandGeometry, BandTable, GeometryError, LegLayout, SurfaceProfile,
};
pub use trace::{Pathology, PathologyError, Ray, RayTracer};
pub use types::{ConvFuncKey, Pol, Vec3};

// Re-exports.
pub use marlu::RADec;
pub use ndarray;
pub use num_complex::Complex64 as c64;
