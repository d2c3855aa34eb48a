// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Generic types.

use std::ops::{Add, AddAssign, Mul, Neg, Sub};

/// A Cartesian 3-vector in the antenna frame [metres]. z is along the optical
/// axis, pointing out of the dish.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Self) -> Self {
        Self {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    pub fn norm2(self) -> f64 {
        self.dot(self)
    }

    pub fn norm(self) -> f64 {
        self.norm2().sqrt()
    }

    /// Get the unit vector in the direction of `self`. The zero vector comes
    /// back as NaNs.
    pub fn normalise(self) -> Self {
        self * (1.0 / self.norm())
    }

    /// Rotate this vector by the row-major 3x3 matrix `m`.
    pub fn rotate(self, m: &[[f64; 3]; 3]) -> Self {
        Self {
            x: m[0][0] * self.x + m[0][1] * self.y + m[0][2] * self.z,
            y: m[1][0] * self.x + m[1][1] * self.y + m[1][2] * self.z,
            z: m[2][0] * self.x + m[2][1] * self.y + m[2][2] * self.z,
        }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add for Vec3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Vec3 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Neg for Vec3 {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

/// The correlation planes of an aperture image. Circular feeds produce RR, RL,
/// LR and LL; linear feeds reuse the same slots for XX, XY, YX and YY.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pol {
    RR,
    RL,
    LR,
    LL,
}

impl Pol {
    /// The index of this plane along the polarisation axis of an aperture
    /// image.
    pub fn index(self) -> usize {
        match self {
            Pol::RR => 0,
            Pol::RL => 1,
            Pol::LR => 2,
            Pol::LL => 3,
        }
    }
}

impl std::fmt::Display for Pol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Pol::RR => "RR",
                Pol::RL => "RL",
                Pol::LR => "LR",
                Pol::LL => "LL",
            }
        )
    }
}

/// The key of the convolution-function cache. Beams only change between
/// measurement sets or spectral windows.
#[derive(Hash, Debug, Clone, Copy, Eq, PartialEq, Default)]
pub struct ConvFuncKey {
    pub ms_id: usize,
    pub spw_id: usize,
}
