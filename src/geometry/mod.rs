// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The optical geometry of a Cassegrain reflector antenna: a tabulated main
//! dish profile, the feed and subreflector placement, the feed-taper model and
//! the feed-support legs that shadow the aperture.

mod band;
mod error;

pub use band::{data_root_from_env, BandGeometry, BandTable};
pub use error::GeometryError;

use std::path::Path;

use log::debug;

use crate::{constants::*, types::Vec3};

/// A rotationally-symmetric dish profile, tabulated at equally spaced radii
/// from the centre to the edge of the dish.
#[derive(Debug, Clone)]
pub struct SurfaceProfile {
    /// Sag [metres] at each tabulated radius.
    z: Vec<f64>,
    /// Slope dz/dr at each tabulated radius.
    m: Vec<f64>,
    /// The radius of the last tabulated row [metres].
    radius: f64,
    /// The spacing of the tabulated radii [metres].
    deltar: f64,
    /// The sag of the last tabulated row; the aperture plane sits here.
    zedge: f64,
    /// The coefficient of the paraboloid z = c r^2 through the dish edge.
    best_parabola: f64,
}

impl SurfaceProfile {
    /// Read a surface file of whitespace-separated `radius sag slope` rows.
    /// Reading stops at the end of the file, at the first token that isn't a
    /// number, or after [`MAX_GEOM`] rows.
    pub fn from_file<T: AsRef<Path>>(file: T) -> Result<Self, GeometryError> {
        let file = file.as_ref();
        let path = file.display().to_string();
        if !file.exists() {
            return Err(GeometryError::FileNotFound(path));
        }
        let contents = std::fs::read_to_string(file).map_err(|source| GeometryError::Io {
            path: path.clone(),
            source,
        })?;
        let rows = parse_rows(&contents);
        debug!("Read {} rows from surface file '{path}'", rows.len());
        Self::from_rows(&rows, &path)
    }

    /// Make a profile from (radius, sag, slope) rows already in memory.
    pub fn from_samples(samples: &[[f64; 3]]) -> Result<Self, GeometryError> {
        let n = samples.len().min(MAX_GEOM);
        Self::from_rows(&samples[..n], "<memory>")
    }

    fn from_rows(rows: &[[f64; 3]], path: &str) -> Result<Self, GeometryError> {
        if rows.len() < 3 {
            return Err(GeometryError::TooFewSamples {
                path: path.to_string(),
                got: rows.len(),
            });
        }
        if let Some(i) = rows.windows(2).position(|w| w[1][0] <= w[0][0]) {
            return Err(GeometryError::NonMonotonicRadius {
                path: path.to_string(),
                row: i + 1,
            });
        }

        let [radius, zedge, _] = rows[rows.len() - 1];
        Ok(Self {
            z: rows.iter().map(|r| r[1]).collect(),
            m: rows.iter().map(|r| r[2]).collect(),
            radius,
            deltar: radius / (rows.len() - 1) as f64,
            zedge,
            best_parabola: zedge / (radius * radius),
        })
    }

    /// Get the sag and slope of the dish at (signed) radius `r`. The dish is a
    /// surface of revolution, so a negative radius has the same sag and the
    /// opposite slope.
    ///
    /// Around the nearest tabulated radius `n * deltar`, a cubic is fit whose
    /// derivative matches the three neighbouring slopes and whose integral
    /// over the three neighbouring cells matches their summed sag. At the
    /// centre, the table is mirrored (z[-1] = z[1], m[-1] = -m[1]).
    pub fn sag_and_slope(&self, r: f64) -> (f64, f64) {
        if r == 0.0 {
            return (self.z[0], 0.0);
        }
        let (s, r) = if r < 0.0 { (-1.0, -r) } else { (1.0, r) };

        let d = self.deltar;
        let dd = d * d;
        let n = ((r / d + 0.5).floor() as usize).min(self.z.len() - 2);
        let x = r - n as f64 * d;

        let (ma, mb, mc, zav) = if n == 0 {
            let mc = self.m[1];
            (-mc, 0.0, mc, 2.0 * self.z[1] + self.z[0])
        } else {
            (
                self.m[n - 1],
                self.m[n],
                self.m[n + 1],
                self.z[n - 1] + self.z[n] + self.z[n + 1],
            )
        };

        let a = mb;
        let b = 0.5 * (mc - ma) / d;
        let c = 0.5 * (mc - 2.0 * mb + ma) / dd;
        let z0 = (zav - b * dd) / 3.0;

        let z = z0 + a * x + b * x * x / 2.0 + c * x * x * x / 3.0;
        let m = s * (a + b * x + c * x * x);
        (z, m)
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn deltar(&self) -> f64 {
        self.deltar
    }

    pub fn zedge(&self) -> f64 {
        self.zedge
    }

    pub fn best_parabola(&self) -> f64 {
        self.best_parabola
    }

    pub fn num_samples(&self) -> usize {
        self.z.len()
    }

    /// The tabulated (radius, sag, slope) rows, with the radii reconstructed
    /// from the uniform spacing.
    pub fn samples(&self) -> impl Iterator<Item = [f64; 3]> + '_ {
        self.z
            .iter()
            .zip(self.m.iter())
            .enumerate()
            .map(|(i, (&z, &m))| [i as f64 * self.deltar, z, m])
    }
}

fn parse_rows(contents: &str) -> Vec<[f64; 3]> {
    let mut values = contents.split_whitespace().map(|t| t.parse::<f64>());
    let mut rows = Vec::with_capacity(128);
    while rows.len() < MAX_GEOM {
        match (values.next(), values.next(), values.next()) {
            (Some(Ok(r)), Some(Ok(z)), Some(Ok(m))) => rows.push([r, z, m]),
            _ => break,
        }
    }
    rows
}

/// How the four feed-support legs are arranged around the optical axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LegLayout {
    /// No legs; nothing is blocked.
    None,
    /// Legs at 0, 90, 180 and 270 degrees.
    Plus { width: f64 },
    /// Legs at 45, 135, 225 and 315 degrees.
    Cross { width: f64 },
    /// Legs at arbitrary azimuths [radians].
    Table { azimuths: [f64; 4], width: f64 },
}

impl LegLayout {
    /// Interpret a signed leg width: positive for "+"-shaped legs, negative for
    /// "x"-shaped legs and zero for no legs at all.
    pub fn from_signed_width(width: f64) -> LegLayout {
        if width > 0.0 {
            LegLayout::Plus { width }
        } else if width < 0.0 {
            LegLayout::Cross { width: -width }
        } else {
            LegLayout::None
        }
    }

    /// The leg azimuths [radians] and the (positive) leg width [metres], if
    /// there are any legs.
    pub fn azimuths_and_width(&self) -> Option<([f64; 4], f64)> {
        let (azimuths, width) = match *self {
            LegLayout::None => return None,
            LegLayout::Plus { width } => (PLUS_LEG_AZIMUTHS, width),
            LegLayout::Cross { width } => (CROSS_LEG_AZIMUTHS, width),
            LegLayout::Table { azimuths, width } => (azimuths, width),
        };
        if width == 0.0 {
            None
        } else {
            Some((azimuths, width.abs()))
        }
    }
}

/// Everything needed to trace rays through one antenna at one frequency.
/// Read-only once built; share it by reference.
#[derive(Debug, Clone)]
pub struct AntennaGeometry {
    name: String,
    profile: SurfaceProfile,
    /// Height of the subreflector vertex above the dish vertex [metres].
    sub_h: f64,
    /// Feed phase centre [metres].
    feed: Vec3,
    /// Unit vector from the feed to the subreflector vertex.
    feed_dir: Vec3,
    /// Constant optical path length that defines the subreflector.
    k: f64,
    /// Feed taper [dB] at `max_angle_deg`.
    taper_db: f64,
    max_angle_deg: f64,
    fa2pi: f64,
    legs: LegLayout,
    /// Radius of the leg feet on the dish [metres].
    leg_foot: f64,
    /// Height where the legs meet the optical axis [metres].
    leg_apex: f64,
    leg_foot_z: f64,
    /// Radius of the central hole [metres].
    hole_radius: f64,
    astigm_0: f64,
    astigm_45: f64,
}

impl AntennaGeometry {
    /// Load a surface file and place the feed and subreflector. The antenna is
    /// named after the file stem; legs, the central hole and astigmatism
    /// default to nothing and can be set with the `with_` methods.
    pub fn load<T: AsRef<Path>>(
        surface_file: T,
        feed: Vec3,
        sub_h: f64,
        taper_db: f64,
        max_angle_deg: f64,
    ) -> Result<Self, GeometryError> {
        let surface_file = surface_file.as_ref();
        let profile = SurfaceProfile::from_file(surface_file)?;
        let name = surface_file
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "unnamed".to_string());
        Self::new(name, profile, feed, sub_h, taper_db, max_angle_deg)
    }

    pub fn new<S: Into<String>>(
        name: S,
        profile: SurfaceProfile,
        feed: Vec3,
        sub_h: f64,
        taper_db: f64,
        max_angle_deg: f64,
    ) -> Result<Self, GeometryError> {
        let name = name.into();
        let z = sub_h - feed.z;
        let d = (feed.x * feed.x + feed.y * feed.y + z * z).sqrt();
        if d == 0.0 {
            return Err(GeometryError::FeedAtSubreflector { band: name });
        }
        // A feed below the subreflector sees it as a secondary mirror;
        // otherwise the feed is at prime focus.
        let k = if z > 0.0 { sub_h + d } else { feed.norm() };
        let feed_dir = Vec3::new(-feed.x / d, -feed.y / d, z / d);

        let taper_db = taper_db.abs();
        let fa2pi = if taper_db == 0.0 {
            0.0
        } else {
            TAU * taper_db.sqrt() * FEED_TAPER_SCALE / max_angle_deg.to_radians().sin()
        };

        let leg_foot = profile.radius / 2.0;
        let leg_foot_z = profile.sag_and_slope(leg_foot).0;
        Ok(Self {
            name,
            sub_h,
            feed,
            feed_dir,
            k,
            taper_db,
            max_angle_deg,
            fa2pi,
            legs: LegLayout::None,
            leg_foot,
            leg_apex: 1.2 * sub_h,
            leg_foot_z,
            hole_radius: 0.0,
            astigm_0: 0.0,
            astigm_45: 0.0,
            profile,
        })
    }

    /// Set the feed legs. The sag at the leg feet follows the new foot radius.
    pub fn with_legs(mut self, legs: LegLayout, leg_foot: f64, leg_apex: f64) -> Self {
        self.legs = legs;
        self.leg_foot = leg_foot;
        self.leg_apex = leg_apex;
        self.leg_foot_z = self.profile.sag_and_slope(leg_foot).0;
        self
    }

    pub fn with_hole_radius(mut self, hole_radius: f64) -> Self {
        self.hole_radius = hole_radius;
        self
    }

    /// Set the Zernike astigmatism coefficients (0 and 45 degree terms).
    pub fn with_astigmatism(mut self, astigm_0: f64, astigm_45: f64) -> Self {
        self.astigm_0 = astigm_0;
        self.astigm_45 = astigm_45;
        self
    }

    /// Get the sag and radial slope of the dish at (x, y), including any
    /// astigmatism. Without astigmatism this is just
    /// [`SurfaceProfile::sag_and_slope`].
    pub fn surface(&self, x: f64, y: f64) -> (f64, f64) {
        let r = x.hypot(y);
        if r == 0.0 || (self.astigm_0 == 0.0 && self.astigm_45 == 0.0) {
            return self.profile.sag_and_slope(r);
        }

        // The Zernike polynomials Z5 and Z6.
        let (sin2th, cos2th) = (2.0 * y.atan2(x)).sin_cos();
        let rho = r / self.profile.radius;
        let rho2 = rho * rho;
        let sqrt6 = 6.0_f64.sqrt();
        let z5 = sqrt6 * rho2 * sin2th;
        let z6 = sqrt6 * rho2 * cos2th;
        let astigm = 1.0 + self.astigm_45 * z5 + self.astigm_0 * z6;
        let dastigm =
            2.0 * rho2 / r * sqrt6 * (self.astigm_45 * sin2th + self.astigm_0 * cos2th);

        let (z, m) = self.profile.sag_and_slope(r);
        (z * astigm, m * astigm + dastigm * z)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn profile(&self) -> &SurfaceProfile {
        &self.profile
    }

    pub fn radius(&self) -> f64 {
        self.profile.radius
    }

    pub fn zedge(&self) -> f64 {
        self.profile.zedge
    }

    pub fn best_parabola(&self) -> f64 {
        self.profile.best_parabola
    }

    pub fn sub_h(&self) -> f64 {
        self.sub_h
    }

    pub fn feed(&self) -> Vec3 {
        self.feed
    }

    pub fn feed_direction(&self) -> Vec3 {
        self.feed_dir
    }

    pub fn k(&self) -> f64 {
        self.k
    }

    pub fn taper_db(&self) -> f64 {
        self.taper_db
    }

    pub fn max_angle_deg(&self) -> f64 {
        self.max_angle_deg
    }

    /// The feed pattern constant; the feed power pattern is
    /// exp(-0.166 fa2pi^2 sin^2(theta)).
    pub fn fa2pi(&self) -> f64 {
        self.fa2pi
    }

    pub fn legs(&self) -> LegLayout {
        self.legs
    }

    pub fn leg_foot(&self) -> f64 {
        self.leg_foot
    }

    pub fn leg_apex(&self) -> f64 {
        self.leg_apex
    }

    pub fn leg_foot_z(&self) -> f64 {
        self.leg_foot_z
    }

    pub fn hole_radius(&self) -> f64 {
        self.hole_radius
    }

    pub fn astigmatism(&self) -> (f64, f64) {
        (self.astigm_0, self.astigm_45)
    }
}
