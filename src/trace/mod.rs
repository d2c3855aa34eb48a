// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Geometric ray tracing through a Cassegrain antenna: feed, subreflector,
//! dish and finally the aperture plane at the height of the dish edge.
//!
//! Rays are traced "backwards"; a ray is identified by where it would hit the
//! ideal dish, the ideal subreflector point for that dish point is found in
//! closed form, then any [`Pathology`] is applied and the ray followed forwards
//! from the feed.

mod error;

pub use error::PathologyError;

use num_complex::Complex64 as c64;

use crate::{constants::*, geometry::AntennaGeometry, types::Vec3};

const IDENTITY: [[f64; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// Misalignment of an antenna's optics. The default is a perfectly aligned
/// antenna.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pathology {
    /// Rotation of the subreflector about `sub_rot_point`.
    pub sub_rot: [[f64; 3]; 3],
    pub sub_rot_point: Vec3,
    pub sub_shift: Vec3,
    /// Rotation of the feed pointing direction.
    pub feed_rot: [[f64; 3]; 3],
    pub feed_shift: Vec3,
    /// Feed displacement [metres] towards the subreflector vertex.
    pub focus: f64,
    /// Pointing offsets and an overall phase offset [radians]. These are
    /// checked but not applied; rays are always traced for the nominal
    /// pointing.
    pub az_offset: f64,
    pub el_offset: f64,
    pub phase_offset: f64,
}

impl Default for Pathology {
    fn default() -> Self {
        Self {
            sub_rot: IDENTITY,
            sub_rot_point: Vec3::default(),
            sub_shift: Vec3::default(),
            feed_rot: IDENTITY,
            feed_shift: Vec3::default(),
            focus: 0.0,
            az_offset: 0.0,
            el_offset: 0.0,
            phase_offset: 0.0,
        }
    }
}

impl Pathology {
    pub fn validate(&self) -> Result<(), PathologyError> {
        for (which, m) in [("subreflector", &self.sub_rot), ("feed", &self.feed_rot)] {
            if !is_orthonormal(m) {
                return Err(PathologyError::NonOrthonormal { which });
            }
        }
        for (which, v) in [
            ("subreflector rotation point", self.sub_rot_point),
            ("subreflector shift", self.sub_shift),
            ("feed shift", self.feed_shift),
        ] {
            if !v.is_finite() {
                return Err(PathologyError::NonFinite { which });
            }
        }
        for (which, v) in [
            ("focus", self.focus),
            ("azimuth offset", self.az_offset),
            ("elevation offset", self.el_offset),
            ("phase offset", self.phase_offset),
        ] {
            if !v.is_finite() {
                return Err(PathologyError::NonFinite { which });
            }
        }
        Ok(())
    }
}

fn is_orthonormal(m: &[[f64; 3]; 3]) -> bool {
    (0..3).all(|i| {
        (0..3).all(|j| {
            let dot: f64 = (0..3).map(|k| m[k][i] * m[k][j]).sum();
            let expected = if i == j { 1.0 } else { 0.0 };
            (dot - expected).abs() < 1e-9
        })
    })
}

/// A position on an optical surface and the surface's unit normal there.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SurfacePoint {
    pub pos: Vec3,
    pub normal: Vec3,
}

/// The path of one ray through the antenna.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub feed: Vec3,
    pub sub: SurfacePoint,
    pub dish: SurfacePoint,
    pub aper: SurfacePoint,
}

impl Ray {
    /// The optical path length from the feed to the aperture plane [metres].
    pub fn length(&self) -> f64 {
        (self.feed - self.sub.pos).norm()
            + (self.sub.pos - self.dish.pos).norm()
            + (self.dish.pos - self.aper.pos).norm()
    }
}

/// The result of [`RayTracer::dish_from_sub`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DishPoint {
    pub dish: Vec3,
    /// (mx, my, 1) / |(mx, my, 1)|, where mx and my are the derivatives of
    /// the subreflector x and y with respect to the dish x and y.
    pub mapping_normal: Vec3,
    pub sub: SurfacePoint,
}

/// Traces rays through one antenna with one pathology.
#[derive(Debug, Clone)]
pub struct RayTracer<'a> {
    antenna: &'a AntennaGeometry,
    /// Any focus offset has already been folded into the feed shift.
    pathology: Pathology,
    /// The shifted feed position.
    feed: Vec3,
    /// The rotated feed direction.
    pfeed_dir: Vec3,
}

impl<'a> RayTracer<'a> {
    pub fn new(antenna: &'a AntennaGeometry, pathology: Pathology) -> Result<Self, PathologyError> {
        pathology.validate()?;

        let mut pathology = pathology;
        if pathology.focus != 0.0 {
            let f = antenna.feed();
            let towards_sub = Vec3::new(-f.x, -f.y, antenna.sub_h() - f.z).normalise();
            pathology.feed_shift += towards_sub * pathology.focus;
            pathology.focus = 0.0;
        }

        Ok(Self {
            antenna,
            feed: antenna.feed() + pathology.feed_shift,
            pfeed_dir: antenna.feed_direction().rotate(&pathology.feed_rot),
            pathology,
        })
    }

    pub fn antenna(&self) -> &AntennaGeometry {
        self.antenna
    }

    pub fn pathology(&self) -> &Pathology {
        &self.pathology
    }

    pub fn feed(&self) -> Vec3 {
        self.feed
    }

    pub fn perturbed_feed_direction(&self) -> Vec3 {
        self.pfeed_dir
    }

    /// Re-point the feed at the displaced subreflector vertex.
    pub fn align_feed(&mut self) {
        let p = &self.pathology;
        let vertex = Vec3::new(0.0, 0.0, self.antenna.sub_h()) - p.sub_rot_point;
        let vertex = vertex.rotate(&p.sub_rot) + p.sub_rot_point + p.sub_shift;
        let feed_dir = (vertex - self.feed).normalise();
        self.pfeed_dir = feed_dir.rotate(&p.feed_rot);
    }

    /// Find the point and normal of the ideal subreflector that sends a ray to
    /// the ideal dish at (x, y). The subreflector is the surface of constant
    /// optical path `k` from the feed.
    pub fn ideal_sub_point(&self, x: f64, y: f64) -> SurfacePoint {
        let a = self.antenna;
        let feed = a.feed();
        let r = x.hypot(y);
        let (z, mut m) = a.surface(x, y);

        let pos = if r == 0.0 {
            Vec3::new(0.0, 0.0, a.sub_h())
        } else {
            // A plane wave coming straight down reflects off the dish in the
            // direction (u, v, w).
            m = (2.0 * m.atan()).tan();
            let w = 1.0 / (1.0 + m * m).sqrt();
            let u = -m * (x / r) * w;
            let v = -m * (y / r) * w;

            let d = feed - Vec3::new(x, y, z);
            let dl = a.k() + z;
            let t = 0.5 * (d.norm2() - dl * dl) / (-dl + u * d.x + v * d.y + w * d.z);
            Vec3::new(x + u * t, y + v * t, z + w * t)
        };

        let sf = (feed - pos).normalise();
        let sd = (Vec3::new(x, y, z) - pos).normalise();
        SurfacePoint {
            pos,
            normal: (sd + sf).normalise(),
        }
    }

    fn pathologize(&self, p: SurfacePoint) -> SurfacePoint {
        let path = &self.pathology;
        SurfacePoint {
            pos: (p.pos - path.sub_rot_point).rotate(&path.sub_rot)
                + path.sub_rot_point
                + path.sub_shift,
            normal: p.normal.rotate(&path.sub_rot),
        }
    }

    /// Trace the ray that would hit the ideal dish at (x, y). `None` if the
    /// (possibly misaligned) subreflector faces the wrong way there, or the
    /// geometry is degenerate.
    pub fn trace(&self, x: f64, y: f64) -> Option<Ray> {
        let sub = self.pathologize(self.ideal_sub_point(x, y));
        if !(-1.0..=0.0).contains(&sub.normal.z) {
            return None;
        }

        let fu = (self.feed - sub.pos).normalise();
        let du = sub.normal * (2.0 * sub.normal.dot(fu)) - fu;
        let dish = self.intersect_dish(sub.pos, du);

        let au = du - dish.normal * (2.0 * dish.normal.dot(du));
        let aper = self.intersect_aperture(dish.pos, au);

        if dish.pos.is_finite() && aper.pos.is_finite() {
            Some(Ray {
                feed: self.feed,
                sub,
                dish,
                aper,
            })
        } else {
            None
        }
    }

    /// Find the ideal-dish point (x1, y1) whose ray lands on the aperture plane
    /// at (x, y), by nudging the traced point until the aperture hit coincides
    /// with the target.
    pub fn aim(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let (mut x1, mut y1) = (x, y);
        for _ in 0..APERTURE_CORRECTION_ITERATIONS {
            let ray = self.trace(x1, y1)?;
            x1 += x - ray.aper.pos.x;
            y1 += y - ray.aper.pos.y;
        }
        Some((x1, y1))
    }

    /// Trace the ray that lands on the aperture plane at (x, y).
    pub fn trace_to(&self, x: f64, y: f64) -> Option<Ray> {
        let (x1, y1) = self.aim(x, y)?;
        self.trace(x1, y1)
    }

    fn intersect_dish(&self, sub: Vec3, unit_dir: Vec3) -> SurfacePoint {
        let a = self.antenna;
        let bp = a.best_parabola();

        // Seed with the paraboloid through the dish edge. This is the greater
        // root of the quadratic, written so rays along the axis (qa == 0)
        // still work.
        let qa = bp * (unit_dir.x * unit_dir.x + unit_dir.y * unit_dir.y);
        let qb = 2.0 * bp * (unit_dir.x * sub.x + unit_dir.y * sub.y) - unit_dir.z;
        let qc = bp * (sub.x * sub.x + sub.y * sub.y) - sub.z;
        let mut t = 2.0 * qc / (-qb - (qb * qb - 4.0 * qa * qc).sqrt());

        let mut iter = 0;
        loop {
            let x = sub.x + t * unit_dir.x;
            let y = sub.y + t * unit_dir.y;
            let r = x.hypot(y);
            let (z, m) = a.surface(x, y);
            let nz = 1.0 / (1.0 + m * m).sqrt();
            let normal = if r == 0.0 {
                Vec3::new(0.0, 0.0, 1.0)
            } else {
                Vec3::new(-m * (x / r) * nz, -m * (y / r) * nz, nz)
            };
            let pos = Vec3::new(x, y, z);

            if iter >= DISH_INTERSECT_ITERATIONS {
                return SurfacePoint { pos, normal };
            }
            // Intersect with the tangent plane.
            t = normal.dot(pos - sub) / normal.dot(unit_dir);
            iter += 1;
        }
    }

    fn intersect_aperture(&self, dish: Vec3, unit_dir: Vec3) -> SurfacePoint {
        let t = (self.antenna.zedge() - dish.z) / unit_dir.z;
        SurfacePoint {
            pos: dish + unit_dir * t,
            normal: Vec3::new(0.0, 0.0, 1.0),
        }
    }

    /// Find the ideal dish point whose subreflector point is at (x, y). `None`
    /// if the search doesn't converge or the point is off the dish.
    pub fn dish_from_sub(&self, x: f64, y: f64) -> Option<DishPoint> {
        let eps = DISH_FROM_SUB_EPS;
        let radius = self.antenna.radius();
        let max_step = radius / 7.0;
        let (mut x1, mut y1) = (x, y);

        for _ in 0..DISH_FROM_SUB_MAX_ITERATIONS {
            let sub = self.ideal_sub_point(x1, y1);
            let mx = 0.5
                * (self.ideal_sub_point(x1 + eps, y1).pos.x
                    - self.ideal_sub_point(x1 - eps, y1).pos.x)
                / eps;
            let my = 0.5
                * (self.ideal_sub_point(x1, y1 + eps).pos.y
                    - self.ideal_sub_point(x1, y1 - eps).pos.y)
                / eps;
            let dx = ((x - sub.pos.x) / mx).clamp(-max_step, max_step);
            let dy = ((y - sub.pos.y) / my).clamp(-max_step, max_step);

            // Don't wander off the edge.
            if x1.hypot(y1) >= radius && x1 * dx + y1 * dy > 0.0 {
                return None;
            }
            x1 += 0.5 * dx;
            y1 += 0.5 * dy;

            if dx.abs() < 0.005 * eps && dy.abs() < 0.005 * eps {
                if x1.hypot(y1) > radius {
                    return None;
                }
                let d = (1.0 + mx * mx + my * my).sqrt();
                return Some(DishPoint {
                    dish: Vec3::new(x1, y1, self.antenna.surface(x1, y1).0),
                    mapping_normal: Vec3::new(mx / d, my / d, 1.0 / d),
                    sub,
                });
            }
        }

        None
    }

    /// Is the plane wave between the dish and the aperture blocked by a leg?
    /// Only applies inside the leg feet.
    pub fn plane_wave_blocked(&self, ray: &Ray) -> bool {
        let r0 = ray.dish.pos;
        let foot = self.antenna.leg_foot();
        if r0.x * r0.x + r0.y * r0.y >= foot * foot {
            return false;
        }
        self.leg_blocks(r0, ray.aper.pos - r0)
    }

    /// Is the spherical wave between the subreflector and the dish blocked by
    /// a leg? Only applies outside the leg feet.
    pub fn spherical_wave_blocked(&self, ray: &Ray) -> bool {
        let r0 = ray.dish.pos;
        let foot = self.antenna.leg_foot();
        if r0.x * r0.x + r0.y * r0.y < foot * foot {
            return false;
        }
        self.leg_blocks(r0, ray.sub.pos - r0)
    }

    pub fn is_blocked(&self, ray: &Ray) -> bool {
        self.plane_wave_blocked(ray) || self.spherical_wave_blocked(ray)
    }

    /// Does the line through `r0` along `dr` pass within half a leg width of a
    /// leg? Only legs roughly in the same direction as `r0` are considered.
    fn leg_blocks(&self, r0: Vec3, dr: Vec3) -> bool {
        let a = self.antenna;
        let Some((azimuths, width)) = a.legs().azimuths_and_width() else {
            return false;
        };

        let rr = r0.x * r0.x + r0.y * r0.y;
        let apex = Vec3::new(0.0, 0.0, a.leg_apex());
        azimuths.iter().any(|&theta| {
            let (s, c) = theta.sin_cos();
            let foot = Vec3::new(a.leg_foot() * c, a.leg_foot() * s, a.leg_foot_z());
            let ll = foot.x * foot.x + foot.y * foot.y;
            if (foot.x * r0.x + foot.y * r0.y) / (ll * rr).sqrt() < LEG_AZIMUTH_COS_MIN {
                return false;
            }
            let n = dr.cross(apex - foot).normalise();
            (r0 - foot).dot(n).abs() <= 0.5 * width
        })
    }

    /// The feed power pattern at angle `theta` [radians] off the feed axis.
    pub fn feed_pattern(&self, theta: f64) -> f64 {
        let fa2pi = self.antenna.fa2pi();
        let s = theta.sin();
        (2.0 * FEED_GAIN_COEFF * fa2pi * fa2pi * s * s).exp()
    }

    /// The feed power gain along a ray.
    pub fn feed_gain(&self, ray: &Ray) -> f64 {
        let fa2pi = self.antenna.fa2pi();
        let v = (ray.sub.pos - ray.feed).normalise();
        let cos_theta = self.pfeed_dir.dot(v);
        (2.0 * FEED_GAIN_COEFF * fa2pi * fa2pi * (1.0 - cos_theta * cos_theta)).exp()
    }

    /// The solid angle subtended at the feed by the triangle of subreflector
    /// points of three rays.
    pub fn d_omega(&self, ray1: &Ray, ray2: &Ray, ray3: &Ray) -> f64 {
        let n3 = (ray3.sub.pos - self.feed).normalise();
        let n1 = (ray1.sub.pos - self.feed).normalise() - n3;
        let n2 = (ray2.sub.pos - self.feed).normalise() - n3;
        0.5 * n1.cross(n2).norm()
    }

    /// The aperture area per feed solid angle of the triangle of three rays.
    pub fn d_a_d_omega(&self, ray1: &Ray, ray2: &Ray, ray3: &Ray) -> f64 {
        let (a1, a2, a3) = (ray1.aper.pos, ray2.aper.pos, ray3.aper.pos);
        let area = 0.5 * ((a1.x - a2.x) * (a1.y - a3.y) - (a1.x - a3.x) * (a1.y - a2.y)).abs();
        area / self.d_omega(ray1, ray2, ray3)
    }

    /// The feed's (hhat, vhat, direction) basis.
    pub fn feed_basis(&self) -> [Vec3; 3] {
        let dir = self.pfeed_dir;
        if dir.x == 0.0 && dir.y == 0.0 {
            [Vec3::new(0.0, 1.0, 0.0), Vec3::new(1.0, 0.0, 0.0), dir]
        } else {
            let vhat = Vec3::new(dir.y, -dir.x, 0.0).normalise();
            [vhat.cross(dir), vhat, dir]
        }
    }

    /// The feed E-field for a polarisation state given in the feed's (hhat,
    /// vhat) basis.
    pub fn e_field(&self, pol: [c64; 2]) -> [c64; 3] {
        let [hhat, vhat, _] = self.feed_basis();
        [
            pol[0] * hhat.x + pol[1] * vhat.x,
            pol[0] * hhat.y + pol[1] * vhat.y,
            pol[0] * hhat.z + pol[1] * vhat.z,
        ]
    }
}

/// Carry an E-field through the two reflections (subreflector, then dish) of
/// a ray.
pub fn trace_pol(e0: [c64; 3], ray: &Ray) -> [c64; 3] {
    let v1 = (ray.sub.pos - ray.feed).normalise();
    let v2 = (ray.dish.pos - ray.sub.pos).normalise();
    // The dish point can sit on the aperture plane (at the rim), so the
    // outgoing direction comes from the dish normal rather than the aperture
    // hit.
    let n = ray.dish.normal;
    let v3 = (v2 - n * (2.0 * n.dot(v2))).normalise();

    let e1 = reflect(e0, (v1 - v2).normalise());
    reflect(e1, (v2 - v3).normalise())
}

/// E' = 2 (r.E) r - E
fn reflect(e: [c64; 3], r: Vec3) -> [c64; 3] {
    let fac = e[0] * r.x + e[1] * r.y + e[2] * r.z;
    [
        fac * (2.0 * r.x) - e[0],
        fac * (2.0 * r.y) - e[1],
        fac * (2.0 * r.z) - e[2],
    ]
}
