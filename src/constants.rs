// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Useful constants.
 */

pub(crate) use std::f64::consts::{FRAC_PI_2, PI, SQRT_2, TAU};

pub use marlu::constants::VEL_C;

/// The environment variable naming the root directory of antenna surface
/// files.
pub const DATA_ROOT_ENV_VAR: &str = "DISH_BEAM_DATA";

/// The maximum number of (radius, sag, slope) rows read from a surface file.
pub const MAX_GEOM: usize = 1000;

/// Newton refinements of the paraboloid seed when intersecting the dish.
pub(crate) const DISH_INTERSECT_ITERATIONS: usize = 7;
/// Fixed-point corrections that walk a traced ray onto its target aperture
/// point.
pub(crate) const APERTURE_CORRECTION_ITERATIONS: usize = 6;
/// Give up on `dish_from_sub` after this many steps.
pub(crate) const DISH_FROM_SUB_MAX_ITERATIONS: usize = 500;
/// Finite-difference step (and convergence scale) for `dish_from_sub` [metres].
pub(crate) const DISH_FROM_SUB_EPS: f64 = 0.001;

/// A leg is only considered for blocking when the cosine of the azimuth
/// between the leg foot and the ray exceeds this.
pub(crate) const LEG_AZIMUTH_COS_MIN: f64 = 0.7;
/// Leg azimuths [radians] for "+"-shaped legs (positive leg width).
pub(crate) const PLUS_LEG_AZIMUTHS: [f64; 4] = [0.0, FRAC_PI_2, PI, 3.0 * FRAC_PI_2];
/// Leg azimuths [radians] for "x"-shaped legs (negative leg width).
pub(crate) const CROSS_LEG_AZIMUTHS: [f64; 4] = [0.25 * PI, 0.75 * PI, 1.25 * PI, 1.75 * PI];
/// Leg azimuths [radians] of the VLBA antennas, whose legs are not evenly
/// spaced.
pub const VLBA_LEG_AZIMUTHS: [f64; 4] = [0.816817, 2.3247756, 3.9584096, 5.466368];

/// Scales the square root of the feed taper [dB] into the feed pattern
/// constant.
pub(crate) const FEED_TAPER_SCALE: f64 = 0.1874;
/// Exponent coefficient of the Gaussian feed power pattern.
pub(crate) const FEED_GAIN_COEFF: f64 = -0.083;

/// Kernel pixels must exceed this fraction of the peak to count as inside
/// the support.
pub(crate) const SUPPORT_THRESHOLD: f64 = 1.0e-2;
/// Voltage screen values at or below this are zeroed before the FFT.
pub(crate) const VOLTAGE_SCREEN_CUTOFF: f64 = 5.0e-2;
/// Power screen values at or below this are zeroed before the FFT.
pub(crate) const POWER_SCREEN_CUTOFF: f64 = 25.0e-4;
/// Fractional bandwidth over which one primary beam serves all channels.
pub(crate) const BEAM_FRACTIONAL_BANDWIDTH: f64 = 0.5e-2;
