// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Receiver-band geometry tables. Each band of each antenna type has its own
//! feed placement, taper and surface file; a TOML table lists them.
//!
//! ```toml
//! surface_dir = "nrao/VLA"
//!
//! [[band]]
//! name = "VLA_L"
//! min_freq_ghz = 1.0
//! max_freq_ghz = 2.0
//! sub_h = 8.1
//! feed_pos = [-0.5, 0.0, 1.2]
//! sub_angle_deg = 9.0
//! leg_width = 0.3
//! ref_freq_ghz = 1.5
//! taper_poly = [-10.0]
//! ```

use std::path::{Path, PathBuf};

use log::info;
use serde::Deserialize;

use super::{AntennaGeometry, GeometryError, LegLayout};
use crate::{constants::DATA_ROOT_ENV_VAR, types::Vec3};

/// At most this many feed-taper polynomial coefficients.
const MAX_TAPER_POLY: usize = 5;

/// The optics of one receiver band.
#[derive(Debug, Clone, Deserialize)]
pub struct BandGeometry {
    /// Also the stem of the surface file.
    pub name: String,
    pub min_freq_ghz: f64,
    pub max_freq_ghz: f64,
    /// Subreflector vertex height [metres].
    pub sub_h: f64,
    /// Feed position [metres]. The x offset is mirrored when the antenna is
    /// built.
    pub feed_pos: [f64; 3],
    /// Half-angle subtended by the subreflector at the feed [degrees].
    pub sub_angle_deg: f64,
    /// Signed leg width [metres]; see [`LegLayout::from_signed_width`].
    #[serde(default)]
    pub leg_width: f64,
    /// Leg foot radius [metres]. Defaults to half the dish radius.
    #[serde(default)]
    pub leg_foot: Option<f64>,
    /// Leg apex height [metres]. Defaults to 1.2 times `sub_h`.
    #[serde(default)]
    pub leg_apex: Option<f64>,
    #[serde(default)]
    pub hole_radius: f64,
    pub ref_freq_ghz: f64,
    /// Feed taper [dB] as a polynomial in (frequency - reference frequency)
    /// [GHz].
    #[serde(default)]
    pub taper_poly: Vec<f64>,
    #[serde(default)]
    pub astigm_0: f64,
    #[serde(default)]
    pub astigm_45: f64,
    /// Leg azimuths [radians] for antennas whose legs aren't evenly spaced.
    #[serde(default)]
    pub leg_azimuths: Option<[f64; 4]>,
}

impl BandGeometry {
    pub fn contains(&self, freq_hz: f64) -> bool {
        let freq_ghz = freq_hz / 1e9;
        self.min_freq_ghz <= freq_ghz && freq_ghz <= self.max_freq_ghz
    }

    /// The feed taper [dB] at a frequency. Non-positive frequencies use the
    /// reference frequency.
    pub fn taper_db(&self, freq_hz: f64) -> f64 {
        let freq_ghz = if freq_hz <= 0.0 {
            self.ref_freq_ghz
        } else {
            freq_hz / 1e9
        };
        let df = freq_ghz - self.ref_freq_ghz;
        self.taper_poly
            .iter()
            .rev()
            .fold(0.0, |acc, &coeff| acc * df + coeff)
    }

    pub fn surface_file_name(&self) -> String {
        format!("{}.surface", self.name)
    }

    pub fn leg_layout(&self) -> LegLayout {
        match self.leg_azimuths {
            Some(azimuths) => LegLayout::Table {
                azimuths,
                width: self.leg_width.abs(),
            },
            None => LegLayout::from_signed_width(self.leg_width),
        }
    }

    /// Build the antenna for this band at a frequency, reading the surface
    /// file from `surface_dir`.
    pub fn antenna<T: AsRef<Path>>(
        &self,
        surface_dir: T,
        freq_hz: f64,
    ) -> Result<AntennaGeometry, GeometryError> {
        if self.taper_poly.len() > MAX_TAPER_POLY {
            return Err(GeometryError::TaperPolynomial {
                band: self.name.clone(),
                got: self.taper_poly.len(),
                max: MAX_TAPER_POLY,
            });
        }
        let file = surface_dir.as_ref().join(self.surface_file_name());
        let feed = Vec3::new(-self.feed_pos[0], self.feed_pos[1], self.feed_pos[2]);
        let antenna = AntennaGeometry::load(
            &file,
            feed,
            self.sub_h,
            self.taper_db(freq_hz),
            self.sub_angle_deg,
        )
        .map_err(|e| GeometryError::Band {
            band: self.name.clone(),
            freq_hz,
            source: Box::new(e),
        })?;

        let leg_foot = self.leg_foot.unwrap_or(antenna.radius() / 2.0);
        let leg_apex = self.leg_apex.unwrap_or(1.2 * self.sub_h);
        Ok(antenna
            .with_legs(self.leg_layout(), leg_foot, leg_apex)
            .with_hole_radius(self.hole_radius)
            .with_astigmatism(self.astigm_0, self.astigm_45))
    }
}

/// All of the bands of one or more antenna types.
#[derive(Debug, Clone, Deserialize)]
pub struct BandTable {
    /// Surface files live here, relative to the data root.
    #[serde(default)]
    surface_dir: Option<PathBuf>,
    #[serde(rename = "band")]
    bands: Vec<BandGeometry>,
}

impl BandTable {
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
        let table: BandTable = toml::from_str(&contents)
            .map_err(|source| GeometryError::BandTable { path, source })?;
        Ok(table)
    }

    pub fn bands(&self) -> &[BandGeometry] {
        &self.bands
    }

    /// Get the first band covering a frequency.
    pub fn band_for_freq(&self, freq_hz: f64) -> Result<&BandGeometry, GeometryError> {
        self.bands
            .iter()
            .find(|b| b.contains(freq_hz))
            .ok_or(GeometryError::NoBandForFrequency { freq_hz })
    }

    /// Build the antenna for whichever band covers `freq_hz`, with surface
    /// files under `data_root`.
    pub fn antenna_for_freq<T: AsRef<Path>>(
        &self,
        data_root: T,
        freq_hz: f64,
    ) -> Result<AntennaGeometry, GeometryError> {
        let band = self.band_for_freq(freq_hz)?;
        let dir = match &self.surface_dir {
            Some(d) => data_root.as_ref().join(d),
            None => data_root.as_ref().to_path_buf(),
        };
        info!(
            "Using band '{}' ({}-{} GHz) for {freq_hz} Hz; surfaces from '{}'",
            band.name,
            band.min_freq_ghz,
            band.max_freq_ghz,
            dir.display()
        );
        band.antenna(dir, freq_hz)
    }
}

impl std::str::FromStr for BandTable {
    type Err = GeometryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        toml::from_str(s).map_err(|source| GeometryError::BandTable {
            path: "<string>".to_string(),
            source,
        })
    }
}

/// Get the root directory of the surface files from the `DISH_BEAM_DATA`
/// environment variable.
pub fn data_root_from_env() -> Result<PathBuf, GeometryError> {
    Ok(PathBuf::from(std::env::var(DATA_ROOT_ENV_VAR)?))
}
