// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! This program reads dish surface files and checks how well the cubic
//! interpolation reproduces each file's tabulated sags and slopes. Large
//! residuals usually mean the radii aren't evenly spaced.

use dish_beam::{GeometryError, SurfaceProfile};

fn main() {
    env_logger::init();

    for surface_file in std::env::args().skip(1) {
        if let Err(e) = test_file(&surface_file) {
            println!("File '{}' isn't a usable surface file: {}", &surface_file, e);
        }
    }
}

fn test_file(surface_file: &str) -> Result<(), GeometryError> {
    println!("Testing file '{}'", surface_file);
    let profile = SurfaceProfile::from_file(surface_file)?;
    println!(
        "{} samples out to a radius of {} m (spacing {} m)",
        profile.num_samples(),
        profile.radius(),
        profile.deltar()
    );

    let mut max_sag = 0.0_f64;
    let mut max_slope = 0.0_f64;
    for [r, z, m] in profile.samples() {
        let (iz, im) = profile.sag_and_slope(r);
        max_sag = max_sag.max((iz - z).abs());
        max_slope = max_slope.max((im - m).abs());
    }
    println!("Largest interpolation residuals: sag {max_sag:e} m, slope {max_slope:e}");
    println!(
        "Edge sag {} m; best-fit paraboloid focal length {} m",
        profile.zedge(),
        0.25 / profile.best_parabola()
    );

    println!("File '{}' is all good!", surface_file);
    Ok(())
}
