// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Synthetic antennas for tests. The Cassegrain here has an exactly
//! parabolic dish (focal length 8.5 m, radius 12.5 m) and a feed on the optical
//! axis, 2 m above the dish vertex, looking up at a subreflector whose vertex
//! is 7.5 m up.

use std::path::{Path, PathBuf};

use crate::{
    geometry::{AntennaGeometry, SurfaceProfile},
    types::Vec3,
};

pub(crate) const FOCAL_LENGTH: f64 = 8.5;
pub(crate) const RADIUS: f64 = 12.5;
pub(crate) const SUB_H: f64 = 7.5;
pub(crate) const FEED_Z: f64 = 2.0;
pub(crate) const NUM_SAMPLES: usize = 100;

/// (radius, sag, slope) rows of z = r^2 / (4 f).
pub(crate) fn parabola_rows(focal_length: f64, radius: f64, n: usize) -> Vec<[f64; 3]> {
    (0..n)
        .map(|i| {
            let r = radius * i as f64 / (n - 1) as f64;
            [r, r * r / (4.0 * focal_length), r / (2.0 * focal_length)]
        })
        .collect()
}

pub(crate) fn write_surface_file(dir: &Path, name: &str, rows: &[[f64; 3]]) -> PathBuf {
    let path = dir.join(format!("{name}.surface"));
    let contents: String = rows
        .iter()
        .map(|[r, z, m]| format!("{r:.17e} {z:.17e} {m:.17e}\n"))
        .collect();
    std::fs::write(&path, contents).unwrap();
    path
}

pub(crate) fn cassegrain() -> AntennaGeometry {
    let profile =
        SurfaceProfile::from_samples(&parabola_rows(FOCAL_LENGTH, RADIUS, NUM_SAMPLES)).unwrap();
    AntennaGeometry::new(
        "cassegrain",
        profile,
        Vec3::new(0.0, 0.0, FEED_Z),
        SUB_H,
        0.0,
        10.0,
    )
    .unwrap()
}
