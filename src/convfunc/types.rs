// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Helper types for convolution functions.

use std::{collections::HashMap, sync::Arc};

use marlu::RADec;
use ndarray::prelude::*;
use num_complex::Complex64 as c64;
use parking_lot::{Mutex, RwLock};

use crate::{constants::VEL_C, types::ConvFuncKey};

/// A primary-beam model. Implementors multiply an image by the beam of the
/// antennas that measured some visibilities.
pub trait SkyJones: Send + Sync {
    /// Multiply `screen` by the voltage pattern at `freq_hz`.
    fn apply_coherent_gain(
        &self,
        screen: ArrayViewMut2<c64>,
        grid: &ScreenGrid,
        vis: &VisMeta,
        freq_hz: f64,
    );

    /// Multiply `screen` by the power pattern (the squared voltage pattern) at
    /// `freq_hz`.
    fn apply_squared_power_gain(
        &self,
        screen: ArrayViewMut2<c64>,
        grid: &ScreenGrid,
        vis: &VisMeta,
        freq_hz: f64,
    );
}

/// The sky coordinates of the pixels of a screen handed to a [`SkyJones`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenGrid {
    /// (ny, nx)
    pub shape: (usize, usize),
    /// Signed pixel increments along x and y [radians].
    pub increment: [f64; 2],
    /// The (x, y) pixel position of the beam centre. Needn't be an integer.
    pub beam_centre_pixel: [f64; 2],
}

impl ScreenGrid {
    /// The (x, y) offset of pixel (iy, ix) from the beam centre [radians].
    pub fn offset(&self, iy: usize, ix: usize) -> (f64, f64) {
        (
            (ix as f64 - self.beam_centre_pixel[0]) * self.increment[0],
            (iy as f64 - self.beam_centre_pixel[1]) * self.increment[1],
        )
    }
}

/// A circular Gaussian primary beam.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianBeam {
    /// [metres]
    dish_diameter: f64,
    /// The power FWHM is this many wavelengths per dish diameter.
    fwhm_factor: f64,
}

impl GaussianBeam {
    pub fn new(dish_diameter: f64) -> Self {
        Self {
            dish_diameter,
            fwhm_factor: 1.13,
        }
    }

    pub fn with_fwhm_factor(mut self, fwhm_factor: f64) -> Self {
        self.fwhm_factor = fwhm_factor;
        self
    }

    /// The full width at half maximum of the power pattern [radians].
    pub fn power_fwhm(&self, freq_hz: f64) -> f64 {
        self.fwhm_factor * VEL_C / freq_hz / self.dish_diameter
    }

    /// The voltage response `theta` radians from the beam centre.
    pub fn voltage(&self, theta: f64, freq_hz: f64) -> f64 {
        let fwhm = self.power_fwhm(freq_hz);
        (-2.0 * std::f64::consts::LN_2 * theta * theta / (fwhm * fwhm)).exp()
    }

    fn apply(&self, mut screen: ArrayViewMut2<c64>, grid: &ScreenGrid, freq_hz: f64, power: i32) {
        screen.indexed_iter_mut().for_each(|((iy, ix), v)| {
            let (x, y) = grid.offset(iy, ix);
            *v *= self.voltage(x.hypot(y), freq_hz).powi(power);
        });
    }
}

impl SkyJones for GaussianBeam {
    fn apply_coherent_gain(
        &self,
        screen: ArrayViewMut2<c64>,
        grid: &ScreenGrid,
        _vis: &VisMeta,
        freq_hz: f64,
    ) {
        self.apply(screen, grid, freq_hz, 1);
    }

    fn apply_squared_power_gain(
        &self,
        screen: ArrayViewMut2<c64>,
        grid: &ScreenGrid,
        _vis: &VisMeta,
        freq_hz: f64,
    ) {
        self.apply(screen, grid, freq_hz, 2);
    }
}

/// The image being made.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageParams {
    pub nx: usize,
    pub ny: usize,
    pub npol: usize,
    /// Signed pixel increments along x and y [radians]. The x increment is
    /// usually negative (RA increases to the left).
    pub increment: [f64; 2],
    pub phase_centre: RADec,
    /// The frequency of each image channel [Hz].
    pub freqs: Vec<f64>,
}

impl ImageParams {
    pub fn nchan(&self) -> usize {
        self.freqs.len()
    }

    /// The (x, y) pixel position of a sky direction. The phase centre is at
    /// (nx/2, ny/2).
    pub fn pixel_of(&self, direction: RADec) -> (f64, f64) {
        let lmn = direction.to_lmn(self.phase_centre);
        (
            (self.nx / 2) as f64 + lmn.l / self.increment[0],
            (self.ny / 2) as f64 + lmn.m / self.increment[1],
        )
    }
}

/// What the convolution functions are needed for: a chunk of visibilities of
/// one spectral window of one measurement set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisMeta {
    pub ms_id: usize,
    pub spw_id: usize,
    /// The antennas' pointing centre.
    pub pointing: RADec,
    /// Number of correlations per visibility.
    pub n_corr: usize,
    /// Number of visibility rows.
    pub n_row: usize,
}

impl VisMeta {
    pub fn key(&self) -> ConvFuncKey {
        ConvFuncKey {
            ms_id: self.ms_id,
            spw_id: self.spw_id,
        }
    }
}

/// The convolution functions of one chunk of visibilities, ready for
/// gridding.
#[derive(Debug, Clone)]
pub struct ConvFunction {
    /// Shape (beam channel, 1, size, size). Pixel (size/2, size/2) is the
    /// origin.
    pub kernel: Array4<c64>,
    /// As `kernel`, but for the power beam.
    pub weight_kernel: Array4<c64>,
    /// The kernel size of each beam channel.
    pub sizes: Vec<usize>,
    /// The support radius of each beam channel, in units of
    /// oversampled pixels divided by the sampling factor.
    pub supports: Vec<usize>,
    /// The kernel polarisation plane for each correlation.
    pub pol_map: Vec<usize>,
    /// The beam channel for each visibility channel.
    pub chan_map: Vec<usize>,
    /// The kernel for each visibility row.
    pub row_map: Vec<usize>,
    /// The frequency of each beam channel [Hz].
    pub beam_freqs: Vec<f64>,
    pub sampling: usize,
}

/// The un-shifted convolution functions of one (MS, spw) and what they were
/// made for.
#[derive(Debug)]
pub(super) struct ConvFuncEntry {
    pub(super) kernel: Array4<c64>,
    pub(super) weight_kernel: Array4<c64>,
    pub(super) sizes: Vec<usize>,
    pub(super) supports: Vec<usize>,
    pub(super) beam_freqs: Vec<f64>,
    pub(super) sampling: usize,
    /// (nx, ny) of the image.
    pub(super) image_shape: (usize, usize),
    pub(super) image_increment: [f64; 2],
}

impl ConvFuncEntry {
    /// Was this made for the same sampling, image and beam channels?
    pub(super) fn matches(&self, image: &ImageParams, sampling: usize, beam_freqs: &[f64]) -> bool {
        self.sampling == sampling
            && self.image_shape == (image.nx, image.ny)
            && self.image_increment == image.increment
            && self.beam_freqs == beam_freqs
    }
}

/// A cache slot. Its index is assigned when the key is first seen; the
/// [`Mutex`] makes sure the entry is computed once, even when many threads
/// want it at the same time.
#[derive(Clone, Default)]
pub(super) struct Slot {
    pub(super) index: usize,
    pub(super) entry: Arc<Mutex<Option<Arc<ConvFuncEntry>>>>,
}

/// Slots by key. Lookups share the read lock; only the first sighting of a
/// key takes the write lock.
#[derive(Default)]
pub(super) struct KernelCache(RwLock<HashMap<ConvFuncKey, Slot>>);

impl std::ops::Deref for KernelCache {
    type Target = RwLock<HashMap<ConvFuncKey, Slot>>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// The accumulated power beams of all pointings seen so far.
#[derive(Debug)]
pub(super) struct FluxScale {
    /// Shape (chan, pol, y, x).
    pub(super) image: Array4<f64>,
    /// Has the pointing at this (y, x) pixel been added yet?
    pub(super) seen: Array2<bool>,
    pub(super) normalized: bool,
}

impl FluxScale {
    pub(super) fn new(image: &ImageParams) -> Self {
        Self {
            image: Array4::zeros((image.nchan(), image.npol, image.ny, image.nx)),
            seen: Array2::from_elem((image.ny, image.nx), false),
            normalized: false,
        }
    }

    pub(super) fn fits(&self, image: &ImageParams) -> bool {
        self.image.dim() == (image.nchan(), image.npol, image.ny, image.nx)
    }
}

impl Default for FluxScale {
    fn default() -> Self {
        Self {
            image: Array4::zeros((0, 0, 0, 0)),
            seen: Array2::from_elem((0, 0), false),
            normalized: false,
        }
    }
}
