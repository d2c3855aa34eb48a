// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Aperture illumination. Rays are traced through the antenna for a grid of
//! aperture-plane points; each contributes its amplitude (from the feed power
//! falling on the patch of aperture around it), its phase (from its optical
//! path length) and its polarisation (after the two reflections) to the pixel
//! it lands in.

mod error;
#[cfg(test)]
mod tests;

pub use error::ApertureError;

use log::debug;
use ndarray::prelude::*;
use num_complex::Complex64 as c64;
use rayon::prelude::*;

use crate::{
    constants::*,
    fft::fft2_centred,
    geometry::AntennaGeometry,
    trace::{trace_pol, Pathology, RayTracer},
    types::Pol,
};

/// The polarisation basis of the feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolBasis {
    /// Right- and left-hand circular feeds; planes are RR, RL, LR, LL.
    #[default]
    Circular,

    /// X and Y dipoles; planes are XX, XY, YX, YY. The cross-hands are
    /// always zero.
    Linear,
}

/// The aperture-plane grid and observing parameters of an aperture
/// calculation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApertureCalcParams {
    pub nx: usize,
    pub ny: usize,
    /// Pixel size [metres].
    pub dx: f64,
    pub dy: f64,
    /// Position of the centre of pixel (0, 0) [metres].
    pub x0: f64,
    pub y0: f64,
    /// Each pixel is sampled by `oversampling` x `oversampling` rays.
    pub oversampling: usize,
    pub freq_hz: f64,
    /// Parallactic angle [radians].
    pub pa: f64,
}

impl ApertureCalcParams {
    /// A grid with the optical axis at the centre of pixel (ny/2, nx/2), one
    /// ray per pixel and no parallactic angle.
    pub fn centred(nx: usize, ny: usize, dx: f64, dy: f64, freq_hz: f64) -> Self {
        Self {
            nx,
            ny,
            dx,
            dy,
            x0: -((nx / 2) as f64) * dx,
            y0: -((ny / 2) as f64) * dy,
            oversampling: 1,
            freq_hz,
            pa: 0.0,
        }
    }

    fn validate(&self) -> Result<(), ApertureError> {
        if self.nx == 0 || self.ny == 0 {
            return Err(ApertureError::InvalidGrid(format!(
                "{}x{} pixels",
                self.nx, self.ny
            )));
        }
        if self.oversampling == 0 {
            return Err(ApertureError::InvalidGrid(
                "oversampling must be at least 1".to_string(),
            ));
        }
        for (name, v) in [("dx", self.dx), ("dy", self.dy)] {
            if !(v.is_finite() && v > 0.0) {
                return Err(ApertureError::InvalidGrid(format!(
                    "pixel size {name} = {v} isn't positive"
                )));
            }
        }
        if !(self.x0.is_finite() && self.y0.is_finite() && self.pa.is_finite()) {
            return Err(ApertureError::InvalidGrid(
                "non-finite origin or parallactic angle".to_string(),
            ));
        }
        if !(self.freq_hz.is_finite() && self.freq_hz > 0.0) {
            return Err(ApertureError::InvalidFrequency(self.freq_hz));
        }
        Ok(())
    }
}

/// Calculate all four correlation planes of the aperture illumination. The
/// result has shape (4, ny, nx); the planes are ordered as [`Pol::index`].
pub fn calculate_aperture(
    antenna: &AntennaGeometry,
    pathology: Pathology,
    params: &ApertureCalcParams,
    basis: PolBasis,
) -> Result<Array3<c64>, ApertureError> {
    rasterise(
        antenna,
        pathology,
        params,
        basis,
        &[Pol::RR, Pol::RL, Pol::LR, Pol::LL],
    )
}

/// Calculate only one correlation plane of the aperture illumination, with
/// shape (ny, nx).
pub fn calculate_aperture_plane(
    antenna: &AntennaGeometry,
    pathology: Pathology,
    params: &ApertureCalcParams,
    basis: PolBasis,
    pol: Pol,
) -> Result<Array2<c64>, ApertureError> {
    let planes = rasterise(antenna, pathology, params, basis, &[pol])?;
    Ok(planes.index_axis_move(Axis(0), 0))
}

/// Fourier transform each plane of an aperture into a far-field voltage
/// pattern. The aperture centre and the pattern's boresight are both at pixel
/// (ny/2, nx/2).
pub fn far_field_pattern(aperture: ArrayView3<c64>) -> Array3<c64> {
    let mut pattern = aperture.to_owned();
    pattern
        .outer_iter_mut()
        .into_par_iter()
        .for_each(fft2_centred);
    pattern
}

fn rasterise(
    antenna: &AntennaGeometry,
    pathology: Pathology,
    params: &ApertureCalcParams,
    basis: PolBasis,
    planes: &[Pol],
) -> Result<Array3<c64>, ApertureError> {
    params.validate()?;
    let illum = Illumination::new(antenna, pathology, params.freq_hz, basis)?;

    let os = params.oversampling;
    let nx = params.nx * os;
    let dx = params.dx / os as f64;
    let dy = params.dy / os as f64;
    let x0 = params.x0 - params.dx / 2.0 + dx / 2.0;
    let y0 = params.y0 - params.dy / 2.0 + dy / 2.0;
    let radius = antenna.radius();
    let hole = antenna.hole_radius();
    let eps = dx / 4.0;
    let (pas, pac) = (params.pa + FRAC_PI_2).sin_cos();

    let mut aperture = Array3::zeros((planes.len(), params.ny, params.nx));
    // Each output row belongs to exactly one task.
    let num_rays: usize = aperture
        .axis_iter_mut(Axis(1))
        .into_par_iter()
        .enumerate()
        .map(|(out_j, mut row)| {
            let mut num_rays = 0;
            for j in out_j * os..(out_j + 1) * os {
                let gy = y0 + j as f64 * dy;
                for i in 0..nx {
                    let gx = x0 + i as f64 * dx;
                    let x = -(pac * gx - pas * gy);
                    let y = pas * gx + pac * gy;
                    if x.abs() > radius || y.abs() > radius {
                        continue;
                    }
                    let r2 = x * x + y * y;
                    if r2 > radius * radius || r2 < hole * hole {
                        continue;
                    }

                    if let Some(values) = illum.sample(x, y, eps, dx) {
                        for (p, pol) in planes.iter().enumerate() {
                            row[(p, i / os)] += values[pol.index()];
                        }
                        num_rays += 1;
                    }
                }
            }
            num_rays
        })
        .sum();

    debug!(
        "Aperture of '{}' at {} Hz: {} of {} rays contributed",
        antenna.name(),
        params.freq_hz,
        num_rays,
        nx * params.ny * os
    );
    Ok(aperture)
}

/// Everything shared by the rays of one aperture calculation.
struct Illumination<'a> {
    tracer: RayTracer<'a>,
    /// The feed E-fields of the two feed polarisations (R and L, or X and Y).
    e_fields: [[c64; 3]; 2],
    basis: PolBasis,
    /// Optical path length of the central ray [metres].
    l0: f64,
    wavelength: f64,
}

impl<'a> Illumination<'a> {
    fn new(
        antenna: &'a AntennaGeometry,
        pathology: Pathology,
        freq_hz: f64,
        basis: PolBasis,
    ) -> Result<Self, ApertureError> {
        let tracer = RayTracer::new(antenna, pathology)?;
        let l0 = tracer
            .trace(0.0, 1e-5)
            .ok_or_else(|| ApertureError::CentralRay {
                antenna: antenna.name().to_string(),
            })?
            .length();

        let [p0, p1] = feed_polarisations(&tracer, basis);
        let e_fields = [tracer.e_field(p0), tracer.e_field(p1)];
        Ok(Self {
            tracer,
            e_fields,
            basis,
            l0,
            wavelength: VEL_C / freq_hz,
        })
    }

    /// The four correlation products of the ray landing on the aperture plane
    /// at (x, y). `None` if there is no such ray or it is blocked.
    fn sample(&self, x: f64, y: f64, eps: f64, d: f64) -> Option<[c64; 4]> {
        let tracer = &self.tracer;
        let (x1, y1) = tracer.aim(x, y)?;
        let ray = tracer.trace(x1, y1)?;
        if tracer.is_blocked(&ray) {
            return None;
        }
        // Neighbouring rays, offset towards the optical axis.
        let ray_y = tracer.trace(x1, if y < 0.0 { y1 + eps } else { y1 - eps })?;
        let ray_x = tracer.trace(if x < 0.0 { x1 + eps } else { x1 - eps }, y1)?;

        let dx1 = ray_x.aper.pos.x - ray.aper.pos.x;
        let dy1 = ray_x.aper.pos.y - ray.aper.pos.y;
        let dx2 = ray_y.aper.pos.x - ray.aper.pos.x;
        let dy2 = ray_y.aper.pos.y - ray.aper.pos.y;
        let d_a = 0.5 * (dx1 * dy2 - dx2 * dy1).abs();
        if d_a == 0.0 {
            return None;
        }
        let d_omega = tracer.d_omega(&ray_x, &ray_y, &ray) / d_a * d * d;
        let amp = (d_omega * tracer.feed_gain(&ray)).sqrt();
        let phase = TAU * (ray.length() - self.l0) / self.wavelength;
        if !(amp.is_finite() && phase.is_finite()) {
            return None;
        }
        let fp = c64::from_polar(amp, phase);

        let [e0, e1] = self.e_fields.map(|e| {
            let e = trace_pol(e, &ray);
            [fp * e[0], fp * e[1]]
        });
        if !e0.iter().chain(e1.iter()).all(|e| e.is_finite()) {
            return None;
        }
        let i = c64::i();
        Some(match self.basis {
            PolBasis::Circular => [
                e0[0] - i * e0[1],
                e0[0] + i * e0[1],
                e1[0] - i * e1[1],
                e1[0] + i * e1[1],
            ],
            PolBasis::Linear => [e0[0], c64::default(), c64::default(), e1[1]],
        })
    }
}

/// The two feed polarisation states in the feed's (hhat, vhat) basis.
/// Circular states are rotated to compensate for the feed orientation.
fn feed_polarisations(tracer: &RayTracer, basis: PolBasis) -> [[c64; 2]; 2] {
    match basis {
        PolBasis::Circular => {
            let r = [c64::new(1.0 / SQRT_2, 0.0), c64::new(0.0, 1.0 / SQRT_2)];
            let l = [c64::new(1.0 / SQRT_2, 0.0), c64::new(0.0, -1.0 / SQRT_2)];

            let [hhat, _, _] = tracer.feed_basis();
            let (s, c) = hhat.y.atan2(hhat.x).sin_cos();
            [r, l].map(|q| [c * q[0] + s * q[1], -s * q[0] + c * q[1]])
        }

        PolBasis::Linear => [
            [c64::new(0.0, 0.0), c64::new(1.0, 0.0)],
            [c64::new(1.0, 0.0), c64::new(0.0, 0.0)],
        ],
    }
}
