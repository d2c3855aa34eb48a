// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Primary-beam convolution functions for mosaic gridding.
//!
//! A beam model ([`SkyJones`]) is evaluated on an oversampled image-plane
//! screen and Fourier transformed into the uv-plane kernel that applies the
//! beam while gridding. Kernels depend only on the measurement set and
//! spectral window, so they're computed once per [`ConvFuncKey`] and cached;
//! each request then only shifts them to its pointing with a phase gradient.

mod error;
mod types;

pub use error::ConvFuncError;
pub use types::{ConvFunction, GaussianBeam, ImageParams, ScreenGrid, SkyJones, VisMeta};
use types::*;

use std::sync::Arc;

use log::{debug, warn};
use ndarray::prelude::*;
use num_complex::Complex64 as c64;
use parking_lot::Mutex;
use rayon::prelude::*;

use crate::{
    constants::*,
    fft::{fft2_centred, next_composite},
    types::ConvFuncKey,
};

/// Makes, caches and hands out primary-beam convolution functions. Apart from
/// [`ConvFuncCache::set_sky_jones`], methods take `&self`, so one cache can
/// serve many gridding threads.
#[derive(Default)]
pub struct ConvFuncCache {
    sky_jones: Option<Arc<dyn SkyJones>>,
    kernels: KernelCache,
    flux_scale: Mutex<FluxScale>,
}

impl ConvFuncCache {
    pub fn new(sky_jones: Arc<dyn SkyJones>) -> Self {
        Self {
            sky_jones: Some(sky_jones),
            ..Default::default()
        }
    }

    /// Use a different beam model. Kernels made with the old one are
    /// dropped.
    pub fn set_sky_jones(&mut self, sky_jones: Arc<dyn SkyJones>) {
        self.sky_jones = Some(sky_jones);
        self.reset();
    }

    /// Forget all cached kernels. The flux-scale image is kept.
    pub fn reset(&self) {
        let mut kernels = self.kernels.write();
        debug!("Dropping {} cached convolution functions", kernels.len());
        kernels.clear();
    }

    /// Get the convolution functions for some visibilities, shifted to their
    /// pointing centre. `freqs` are the visibility channel frequencies [Hz]
    /// and `sampling` is the kernel oversampling factor.
    ///
    /// Returns `Ok(None)` if the pointing centre lies outside the image; those
    /// visibilities can't be gridded.
    pub fn find_conv_function(
        &self,
        image: &ImageParams,
        vis: &VisMeta,
        sampling: usize,
        freqs: &[f64],
    ) -> Result<Option<ConvFunction>, ConvFuncError> {
        let sky_jones = self.sky_jones.as_deref().ok_or(ConvFuncError::NoBeamModel)?;
        validate_image(image)?;
        if sampling == 0 {
            return Err(ConvFuncError::InvalidSampling(sampling));
        }
        if freqs.is_empty() || freqs.iter().any(|f| !(f.is_finite() && *f > 0.0)) {
            return Err(ConvFuncError::NoFrequencies);
        }

        let (px, py) = image.pixel_of(vis.pointing);
        let pointing_pixel = match nearest_pixel(image, px, py) {
            Some(p) => p,
            None => {
                warn!(
                    "Pointing ({:.6}, {:.6}) of MS {}, spw {} is off the image (pixel ({px:.1}, {py:.1})); skipping",
                    vis.pointing.ra, vis.pointing.dec, vis.ms_id, vis.spw_id
                );
                return Ok(None);
            }
        };

        let (beam_freqs, chan_map) = useful_channels(freqs);
        let entry = self.entry(sky_jones, image, vis, sampling, &beam_freqs)?;
        self.add_to_flux_scale(sky_jones, image, vis, pointing_pixel, [px, py]);

        let grad = [
            -(px - (image.nx / 2) as f64) * TAU / image.nx as f64 / sampling as f64,
            -(py - (image.ny / 2) as f64) * TAU / image.ny as f64 / sampling as f64,
        ];
        let mut kernel = entry.kernel.clone();
        let mut weight_kernel = entry.weight_kernel.clone();
        apply_phase_gradient(kernel.view_mut(), grad);
        apply_phase_gradient(weight_kernel.view_mut(), grad);

        Ok(Some(ConvFunction {
            kernel,
            weight_kernel,
            sizes: entry.sizes.clone(),
            supports: entry.supports.clone(),
            pol_map: vec![0; vis.n_corr],
            chan_map,
            row_map: vec![0; vis.n_row],
            beam_freqs,
            sampling,
        }))
    }

    /// The sum of the power beams of every distinct pointing seen so far,
    /// with shape (chan, pol, y, x). The first call normalises each plane to
    /// a peak of 1, so call this once all pointings have been gridded.
    pub fn flux_scale_image(&self) -> Array4<f64> {
        let mut flux = self.flux_scale.lock();
        if !flux.normalized {
            for mut chan in flux.image.outer_iter_mut() {
                for mut plane in chan.outer_iter_mut() {
                    let max = plane.fold(0.0, |m: f64, &v| m.max(v));
                    if max > 0.0 {
                        plane.mapv_inplace(|v| v / max);
                    }
                }
            }
            flux.normalized = true;
        }
        flux.image.clone()
    }

    /// The position of `key` in the cache. Keys are numbered in the order
    /// they're first seen.
    pub fn cache_index(&self, key: ConvFuncKey) -> Option<usize> {
        self.kernels.read().get(&key).map(|slot| slot.index)
    }

    /// The cached kernel of `key` before it was shifted to any pointing.
    pub fn unshifted_kernel(&self, key: ConvFuncKey) -> Option<Array4<c64>> {
        let slot = self.kernels.read().get(&key)?.clone();
        let entry = slot.entry.lock();
        entry.as_ref().map(|e| e.kernel.clone())
    }

    fn slot(&self, key: ConvFuncKey) -> Slot {
        if let Some(slot) = self.kernels.read().get(&key) {
            return slot.clone();
        }
        let mut kernels = self.kernels.write();
        let index = kernels.len();
        kernels
            .entry(key)
            .or_insert_with(|| Slot {
                index,
                entry: Default::default(),
            })
            .clone()
    }

    /// Get the cached kernels of these visibilities, making them if they
    /// don't exist or were made for different parameters.
    fn entry(
        &self,
        sky_jones: &dyn SkyJones,
        image: &ImageParams,
        vis: &VisMeta,
        sampling: usize,
        beam_freqs: &[f64],
    ) -> Result<Arc<ConvFuncEntry>, ConvFuncError> {
        let slot = self.slot(vis.key());
        // Holding the slot's lock while computing means other threads wanting
        // this key wait for the result rather than repeat the work.
        let mut cached = slot.entry.lock();
        match cached.as_ref() {
            Some(e) if e.matches(image, sampling, beam_freqs) => return Ok(Arc::clone(e)),
            Some(_) => debug!(
                "Sampling, image or beam channels changed for MS {}, spw {}; remaking its convolution functions",
                vis.ms_id, vis.spw_id
            ),
            None => (),
        }

        let entry = Arc::new(make_entry(sky_jones, image, vis, sampling, beam_freqs)?);
        *cached = Some(Arc::clone(&entry));
        Ok(entry)
    }

    fn add_to_flux_scale(
        &self,
        sky_jones: &dyn SkyJones,
        image: &ImageParams,
        vis: &VisMeta,
        [ix, iy]: [usize; 2],
        beam_centre_pixel: [f64; 2],
    ) {
        let mut flux = self.flux_scale.lock();
        if !flux.fits(image) {
            if !flux.image.is_empty() {
                debug!("Image shape changed; restarting the flux-scale image");
            }
            *flux = FluxScale::new(image);
        }
        if flux.seen[(iy, ix)] {
            return;
        }
        flux.seen[(iy, ix)] = true;

        let grid = ScreenGrid {
            shape: (image.ny, image.nx),
            increment: image.increment,
            beam_centre_pixel,
        };
        for (i_chan, &freq) in image.freqs.iter().enumerate() {
            let mut screen = Array2::from_elem(grid.shape, c64::new(1.0, 0.0));
            sky_jones.apply_squared_power_gain(screen.view_mut(), &grid, vis, freq);
            for mut plane in flux.image.index_axis_mut(Axis(0), i_chan).outer_iter_mut() {
                plane.zip_mut_with(&screen, |f, s| *f += s.re);
            }
        }
    }
}

fn validate_image(image: &ImageParams) -> Result<(), ConvFuncError> {
    if image.nx == 0 || image.ny == 0 || image.npol == 0 || image.nchan() == 0 {
        return Err(ConvFuncError::InvalidImage(format!(
            "shape ({} chan, {} pol, {} x {})",
            image.nchan(),
            image.npol,
            image.ny,
            image.nx
        )));
    }
    if image
        .increment
        .iter()
        .any(|inc| !inc.is_finite() || *inc == 0.0)
    {
        return Err(ConvFuncError::InvalidImage(format!(
            "pixel increments {:?}",
            image.increment
        )));
    }
    Ok(())
}

/// The (x, y) image pixel nearest to a pixel position, if it's on the image.
fn nearest_pixel(image: &ImageParams, px: f64, py: f64) -> Option<[usize; 2]> {
    let (x, y) = (px.round(), py.round());
    if x >= 0.0 && y >= 0.0 && x < image.nx as f64 && y < image.ny as f64 {
        Some([x as usize, y as usize])
    } else {
        None
    }
}

/// Group visibility channels into beam channels. A beam channel spans at
/// least a fixed fraction of the highest frequency (the beam barely changes
/// within it) and at least one visibility channel. Returns the beam channel
/// frequencies and the beam channel of each visibility channel.
pub(crate) fn useful_channels(freqs: &[f64]) -> (Vec<f64>, Vec<usize>) {
    let min = freqs.iter().copied().fold(f64::INFINITY, f64::min);
    let max = freqs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;
    if freqs.len() < 2 || span <= 0.0 {
        return (vec![min], vec![0; freqs.len()]);
    }

    let width = (BEAM_FRACTIONAL_BANDWIDTH * max).max(span / (freqs.len() - 1) as f64);
    let num_beams = ((span / width).round() as usize).clamp(1, freqs.len());
    let bin = span / num_beams as f64;
    let beam_freqs = (0..num_beams)
        .map(|i| min + (i as f64 + 0.5) * bin)
        .collect();
    let chan_map = freqs
        .iter()
        .map(|f| (((f - min) / bin).floor() as usize).min(num_beams - 1))
        .collect();
    (beam_freqs, chan_map)
}

/// One beam channel's kernels at the full FFT size.
struct BeamPlane {
    kernel: Array2<c64>,
    weight: Array2<c64>,
    support: usize,
}

fn make_entry(
    sky_jones: &dyn SkyJones,
    image: &ImageParams,
    vis: &VisMeta,
    sampling: usize,
    beam_freqs: &[f64],
) -> Result<ConvFuncEntry, ConvFuncError> {
    let size = next_composite(2 * image.nx.max(image.ny) * sampling);
    let grid = ScreenGrid {
        shape: (size, size),
        // The kernel's uv cell must be the gridder's divided by the sampling.
        increment: [
            image.increment[0] * (sampling * image.nx) as f64 / size as f64,
            image.increment[1] * (sampling * image.ny) as f64 / size as f64,
        ],
        beam_centre_pixel: [(size / 2) as f64; 2],
    };

    let planes = beam_freqs
        .par_iter()
        .map(|&freq| beam_plane(sky_jones, &grid, vis, freq, sampling))
        .collect::<Result<Vec<_>, _>>()?;

    // Keep just enough of every plane for the widest support.
    let max_support = planes.iter().map(|p| p.support).max().unwrap_or(0);
    let trimmed = (2 * (max_support + 2) * sampling).min(size);
    let start = size / 2 - trimmed / 2;
    let end = start + trimmed;
    let mut kernel = Array4::zeros((planes.len(), 1, trimmed, trimmed));
    let mut weight_kernel = Array4::zeros((planes.len(), 1, trimmed, trimmed));
    for (i, plane) in planes.iter().enumerate() {
        kernel
            .slice_mut(s![i, 0, .., ..])
            .assign(&plane.kernel.slice(s![start..end, start..end]));
        weight_kernel
            .slice_mut(s![i, 0, .., ..])
            .assign(&plane.weight.slice(s![start..end, start..end]));
    }

    let supports: Vec<usize> = planes.iter().map(|p| p.support).collect();
    debug!(
        "Made convolution functions for MS {}, spw {}: FFT size {size}, kernel size {trimmed}, supports {supports:?}",
        vis.ms_id, vis.spw_id
    );
    Ok(ConvFuncEntry {
        kernel,
        weight_kernel,
        sizes: vec![trimmed; planes.len()],
        supports,
        beam_freqs: beam_freqs.to_vec(),
        sampling,
        image_shape: (image.nx, image.ny),
        image_increment: image.increment,
    })
}

fn beam_plane(
    sky_jones: &dyn SkyJones,
    grid: &ScreenGrid,
    vis: &VisMeta,
    freq_hz: f64,
    sampling: usize,
) -> Result<BeamPlane, ConvFuncError> {
    let mut kernel = Array2::from_elem(grid.shape, c64::new(1.0, 0.0));
    sky_jones.apply_coherent_gain(kernel.view_mut(), grid, vis, freq_hz);
    zero_below(kernel.view_mut(), VOLTAGE_SCREEN_CUTOFF);
    fft2_centred(kernel.view_mut());

    let mut weight = Array2::from_elem(grid.shape, c64::new(1.0, 0.0));
    sky_jones.apply_squared_power_gain(weight.view_mut(), grid, vis, freq_hz);
    zero_below(weight.view_mut(), POWER_SCREEN_CUTOFF);
    fft2_centred(weight.view_mut());

    let support =
        find_support(kernel.view(), sampling).ok_or(ConvFuncError::SupportDetection {
            ms_id: vis.ms_id,
            spw_id: vis.spw_id,
            freq_hz,
        })?;

    // Gridding samples the kernel every `sampling` pixels, so that's what
    // must sum to 1.
    let c = grid.shape.0 / 2;
    let taps: Vec<usize> = (0..=2 * support)
        .map(|k| c - support * sampling + k * sampling)
        .collect();
    let sum: f64 = taps
        .iter()
        .flat_map(|&iy| taps.iter().map(move |&ix| (iy, ix)))
        .map(|(iy, ix)| kernel[(iy, ix)].re)
        .sum();
    if !(sum > 0.0) {
        return Err(ConvFuncError::Normalization {
            ms_id: vis.ms_id,
            spw_id: vis.spw_id,
            freq_hz,
            sum,
        });
    }
    kernel.mapv_inplace(|v| v / sum);
    weight.mapv_inplace(|v| v / sum);

    Ok(BeamPlane {
        kernel,
        weight,
        support,
    })
}

fn zero_below(mut screen: ArrayViewMut2<c64>, cutoff: f64) {
    screen.mapv_inplace(|v| if v.norm() > cutoff { v } else { c64::default() });
}

/// The support radius of a centred kernel, in units of `sampling` pixels.
///
/// Walk inwards along the diagonal to the first pixel above a fraction of the
/// peak. A kernel with no such pixel gets a default radius, unless it's flat,
/// in which case there's no support to find.
pub(crate) fn find_support(kernel: ArrayView2<c64>, sampling: usize) -> Option<usize> {
    let size = kernel.nrows();
    let c = size / 2;
    let (min, max) = kernel
        .iter()
        .map(|v| v.norm())
        .fold((f64::INFINITY, 0.0_f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let threshold = SUPPORT_THRESHOLD * max;
    let default = if 10 * sampling < size {
        5 * sampling
    } else {
        (size / 2).saturating_sub(4 * sampling)
    };

    let crossing = (1..c.saturating_sub(1))
        .rev()
        .find(|&t| kernel[(c - t, c - t)].norm() > threshold);
    let trial = match crossing {
        Some(t) => ((2 * t * t) as f64).sqrt().floor() as usize,
        None if max - min > SUPPORT_THRESHOLD * max => {
            warn!("No kernel pixel along the diagonal exceeds {SUPPORT_THRESHOLD} of the peak; using a support of {default} pixels");
            default
        }
        None => return None,
    };
    let trial = if trial < 5 * sampling { default } else { trial };

    let support = (0.5 + trial as f64 / sampling as f64).floor() as usize + 1;
    Some(support.min((size / 2 / sampling).saturating_sub(1)))
}

/// Multiply a (chan, pol, y, x) kernel by a phase ramp, which moves the
/// image-plane beam it represents. `grad` is the (x, y) phase change per
/// pixel; the centre pixel is unchanged.
fn apply_phase_gradient(mut kernel: ArrayViewMut4<c64>, grad: [f64; 2]) {
    if grad == [0.0, 0.0] {
        return;
    }
    let (_, _, ny, nx) = kernel.dim();
    let ramp = |n: usize, g: f64| -> Vec<c64> {
        (0..n)
            .map(|i| c64::cis((i as f64 - (n / 2) as f64) * g))
            .collect()
    };
    let ramp_x = ramp(nx, grad[0]);
    let ramp_y = ramp(ny, grad[1]);
    kernel
        .indexed_iter_mut()
        .for_each(|((_, _, iy, ix), v)| *v *= ramp_y[iy] * ramp_x[ix]);
}
