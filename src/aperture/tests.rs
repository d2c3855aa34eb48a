// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Tests for aperture illumination.

use approx::*;

use super::*;
use crate::{geometry::LegLayout, test_antenna::*};

const N: usize = 64;
const D: f64 = 0.5;
/// No pixel centre lies exactly on the dish edge.
const X0: f64 = -15.75;

fn params() -> ApertureCalcParams {
    ApertureCalcParams {
        nx: N,
        ny: N,
        dx: D,
        dy: D,
        x0: X0,
        y0: X0,
        oversampling: 1,
        freq_hz: 1.5e9,
        pa: 0.0,
    }
}

/// The grid position of pixel (j, i) and its distance from the axis.
fn pixel(j: usize, i: usize) -> (f64, f64, f64) {
    let x = X0 + i as f64 * D;
    let y = X0 + j as f64 * D;
    (x, y, x.hypot(y))
}

#[test]
fn test_invalid_params() {
    let a = cassegrain();
    let bad = [
        ApertureCalcParams { nx: 0, ..params() },
        ApertureCalcParams {
            oversampling: 0,
            ..params()
        },
        ApertureCalcParams { dx: -0.5, ..params() },
        ApertureCalcParams {
            dy: f64::NAN,
            ..params()
        },
    ];
    for p in bad {
        let result = calculate_aperture(&a, Pathology::default(), &p, PolBasis::Circular);
        assert!(matches!(result, Err(ApertureError::InvalidGrid(_))), "{p:?}");
    }

    let p = ApertureCalcParams {
        freq_hz: 0.0,
        ..params()
    };
    let result = calculate_aperture(&a, Pathology::default(), &p, PolBasis::Circular);
    assert!(matches!(result, Err(ApertureError::InvalidFrequency(_))));
}

#[test]
fn test_bad_pathology() {
    let a = cassegrain();
    let pathology = Pathology {
        feed_rot: [[2.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        ..Default::default()
    };
    let result = calculate_aperture(&a, pathology, &params(), PolBasis::Circular);
    assert!(matches!(result, Err(ApertureError::Pathology(_))));
}

#[test]
fn test_untraceable_central_ray() {
    let a = cassegrain();
    let pathology = Pathology {
        sub_rot: [[1.0, 0.0, 0.0], [0.0, -1.0, 0.0], [0.0, 0.0, -1.0]],
        ..Default::default()
    };
    let result = calculate_aperture(&a, pathology, &params(), PolBasis::Circular);
    assert!(matches!(result, Err(ApertureError::CentralRay { .. })));
}

#[test]
fn test_ideal_cassegrain_illumination() {
    let a = cassegrain();
    let aperture =
        calculate_aperture(&a, Pathology::default(), &params(), PolBasis::Circular).unwrap();
    assert_eq!(aperture.dim(), (4, N, N));

    let tracer = RayTracer::new(&a, Pathology::default()).unwrap();
    let mut illum_over_law = vec![];
    for j in 0..N {
        for i in 0..N {
            let (x, y, r) = pixel(j, i);
            let rr = aperture[(Pol::RR.index(), j, i)];
            let rl = aperture[(Pol::RL.index(), j, i)];
            let lr = aperture[(Pol::LR.index(), j, i)];
            let ll = aperture[(Pol::LL.index(), j, i)];

            if r > RADIUS {
                for pol in 0..4 {
                    assert_eq!(aperture[(pol, j, i)], c64::default());
                }
                continue;
            }

            // The co-polar planes carry the illumination, and it's real
            // because every ray has the same path length.
            assert!(rl.norm() > 0.0, "({x}, {y})");
            assert_abs_diff_eq!(rl.im, 0.0, epsilon = 1e-8 * rl.norm());
            assert_abs_diff_eq!(lr, rl, epsilon = 1e-8 * rl.norm());
            // No instrumental polarisation difference between the hands.
            assert_abs_diff_eq!(rr.norm(), ll.norm(), epsilon = 1e-10 * rl.norm());
            if r < 1.0 {
                assert!(rr.norm() < 1e-3 * rl.norm());
            }

            // Uniform feed, so the only thing shaping the illumination is how
            // the optics spread the feed's power over the aperture: cos^4 of
            // half the angle off the feed axis.
            let ray = tracer.trace_to(x, y).unwrap();
            let cos_theta = (ray.sub.pos - ray.feed).normalise().z;
            let half_cos2 = 0.5 * (1.0 + cos_theta);
            illum_over_law.push(rl.norm() / (half_cos2 * half_cos2));
        }
    }

    let first = illum_over_law[0];
    for v in illum_over_law {
        assert_relative_eq!(v, first, max_relative = 2e-3);
    }
}

#[test]
fn test_single_plane_matches_full_calculation() {
    let a = cassegrain();
    let p = ApertureCalcParams {
        nx: 16,
        ny: 16,
        dx: 2.0,
        dy: 2.0,
        x0: -15.0,
        y0: -15.0,
        ..params()
    };
    let full = calculate_aperture(&a, Pathology::default(), &p, PolBasis::Circular).unwrap();
    for pol in [Pol::RR, Pol::LL] {
        let plane =
            calculate_aperture_plane(&a, Pathology::default(), &p, PolBasis::Circular, pol)
                .unwrap();
        assert_eq!(plane.dim(), (16, 16));
        assert_eq!(plane, full.index_axis(Axis(0), pol.index()));
    }
}

#[test]
fn test_oversampling_sums_sub_pixels() {
    // Each ray's amplitude scales with its sample spacing, so 2x2
    // oversampling doubles interior pixels.
    let a = cassegrain();
    let single =
        calculate_aperture(&a, Pathology::default(), &params(), PolBasis::Circular).unwrap();
    let p = ApertureCalcParams {
        oversampling: 2,
        ..params()
    };
    let over = calculate_aperture(&a, Pathology::default(), &p, PolBasis::Circular).unwrap();
    for j in 0..N {
        for i in 0..N {
            let (_, _, r) = pixel(j, i);
            if r < 11.0 {
                let s = single[(Pol::RL.index(), j, i)];
                let o = over[(Pol::RL.index(), j, i)];
                assert_relative_eq!(o.norm(), 2.0 * s.norm(), max_relative = 1e-2);
            } else if r > RADIUS + D {
                assert_eq!(over[(Pol::RL.index(), j, i)], c64::default());
            }
        }
    }
}

#[test]
fn test_parallactic_angle_doesnt_change_symmetric_illumination() {
    let a = cassegrain();
    let unrotated =
        calculate_aperture(&a, Pathology::default(), &params(), PolBasis::Circular).unwrap();
    let p = ApertureCalcParams {
        pa: 0.3,
        ..params()
    };
    let rotated = calculate_aperture(&a, Pathology::default(), &p, PolBasis::Circular).unwrap();
    for j in 0..N {
        for i in 0..N {
            let (_, _, r) = pixel(j, i);
            let u = unrotated[(Pol::RL.index(), j, i)];
            let v = rotated[(Pol::RL.index(), j, i)];
            if r < RADIUS {
                assert_relative_eq!(u.norm(), v.norm(), max_relative = 1e-3);
            } else {
                assert_eq!(v, c64::default());
            }
        }
    }
}

#[test]
fn test_linear_feeds() {
    let a = cassegrain();
    let aperture =
        calculate_aperture(&a, Pathology::default(), &params(), PolBasis::Linear).unwrap();
    for j in 0..N {
        for i in 0..N {
            let (_, _, r) = pixel(j, i);
            let xx = aperture[(0, j, i)];
            let yy = aperture[(3, j, i)];
            assert_eq!(aperture[(1, j, i)], c64::default());
            assert_eq!(aperture[(2, j, i)], c64::default());
            if r > RADIUS {
                assert_eq!(xx, c64::default());
                continue;
            }
            assert!(xx.re > 0.0);
            assert_abs_diff_eq!(xx.im, 0.0, epsilon = 1e-8 * xx.norm());
            // X and Y swap when the aperture is mirrored about the diagonal.
            assert_abs_diff_eq!(xx, aperture[(3, i, j)], epsilon = 1e-9 * xx.norm());
            if i == j {
                assert_abs_diff_eq!(xx, yy, epsilon = 1e-9 * xx.norm());
            }
        }
    }
}

#[test]
fn test_feed_legs_and_hole_shadow_the_aperture() {
    let a = cassegrain()
        .with_legs(LegLayout::Plus { width: 1.0 }, 5.0, 9.0)
        .with_hole_radius(2.0);
    let aperture =
        calculate_aperture(&a, Pathology::default(), &params(), PolBasis::Circular).unwrap();
    let rl = aperture.index_axis(Axis(0), Pol::RL.index());

    // Pixels 32 and 36 are at 0.25 and 2.25 m.
    assert_eq!(rl[(32, 36)], c64::default());
    assert_eq!(rl[(36, 32)], c64::default());
    assert!(rl[(36, 36)].norm() > 0.0);
    for j in 0..N {
        for i in 0..N {
            let (_, _, r) = pixel(j, i);
            if r < 2.0 {
                assert_eq!(rl[(j, i)], c64::default());
            }
        }
    }
}

#[test]
fn test_defocus_bends_the_phase() {
    let a = cassegrain();
    let p = ApertureCalcParams {
        freq_hz: 15e9,
        ..params()
    };
    let pathology = Pathology {
        focus: 0.05,
        ..Default::default()
    };
    let aperture = calculate_aperture(&a, pathology, &p, PolBasis::Circular).unwrap();
    let rl = aperture.index_axis(Axis(0), Pol::RL.index());
    // Near the centre and near the edge, on the same row.
    let centre = rl[(32, 32)];
    let edge = rl[(32, 55)];
    let (_, _, r) = pixel(32, 55);
    assert!(r < RADIUS);
    assert!((edge * centre.conj()).arg().abs() > 0.1);
}

#[test]
fn test_far_field_pattern() {
    let a = cassegrain();
    let p = ApertureCalcParams::centred(64, 64, 0.5, 0.5, 1.5e9);
    assert_abs_diff_eq!(p.x0, -16.0);
    let aperture = calculate_aperture(&a, Pathology::default(), &p, PolBasis::Circular).unwrap();
    let pattern = far_field_pattern(aperture.view());
    assert_eq!(pattern.dim(), aperture.dim());

    let rl = aperture.index_axis(Axis(0), Pol::RL.index());
    let far = pattern.index_axis(Axis(0), Pol::RL.index());
    let boresight = far[(32, 32)];
    assert_abs_diff_eq!(boresight, rl.sum(), epsilon = 1e-9 * boresight.norm());
    for v in far.iter() {
        assert!(v.norm() <= boresight.norm() * (1.0 + 1e-12));
    }
}

#[test]
fn test_pixels_on_the_rim_are_finite() {
    let a = cassegrain();
    // Pixel centres such as (-3.5, -12) and (10, 7.5) lie on the dish edge.
    let p = ApertureCalcParams::centred(64, 64, 0.5, 0.5, 1.5e9);
    for (j, i) in [(8, 25), (17, 12), (47, 52), (56, 39)] {
        let x = p.x0 + i as f64 * p.dx;
        let y = p.y0 + j as f64 * p.dy;
        assert_abs_diff_eq!(x.hypot(y), RADIUS, epsilon = 1e-12);
    }

    for basis in [PolBasis::Circular, PolBasis::Linear] {
        let aperture = calculate_aperture(&a, Pathology::default(), &p, basis).unwrap();
        assert!(aperture.iter().all(|v| v.is_finite()));
        let pattern = far_field_pattern(aperture.view());
        assert!(pattern.iter().all(|v| v.is_finite()));
    }
}
