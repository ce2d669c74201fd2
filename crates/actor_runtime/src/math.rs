use std::ops::{Add, AddAssign, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn length_squared(self) -> f32 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    pub fn distance(self, other: Vec3) -> f32 {
        (other - self).length()
    }

    /// Unit vector in the same direction, or `Vec3::ZERO` for degenerate input.
    pub fn normalize_or_zero(self) -> Vec3 {
        let length = self.length();
        if !length.is_finite() || length <= f32::EPSILON {
            return Vec3::ZERO;
        }
        self * (1.0 / length)
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Vec3) {
        *self = *self + rhs;
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Neg for Vec3 {
    type Output = Vec3;

    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

/// Column-major 4x4 affine transform. `cols[3]` holds the translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat4 {
    pub cols: [[f32; 4]; 4],
}

impl Default for Mat4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mat4 {
    pub const IDENTITY: Mat4 = Mat4 {
        cols: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    pub fn from_translation(translation: Vec3) -> Self {
        let mut out = Self::IDENTITY;
        out.cols[3] = [translation.x, translation.y, translation.z, 1.0];
        out
    }

    /// Rotation about +Z (the up axis of the ground plane).
    pub fn from_rotation_z(radians: f32) -> Self {
        let (sin, cos) = radians.sin_cos();
        let mut out = Self::IDENTITY;
        out.cols[0] = [cos, sin, 0.0, 0.0];
        out.cols[1] = [-sin, cos, 0.0, 0.0];
        out
    }

    pub fn translation(&self) -> Vec3 {
        Vec3::new(self.cols[3][0], self.cols[3][1], self.cols[3][2])
    }

    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        let c = &self.cols;
        Vec3::new(
            c[0][0] * point.x + c[1][0] * point.y + c[2][0] * point.z + c[3][0],
            c[0][1] * point.x + c[1][1] * point.y + c[2][1] * point.z + c[3][1],
            c[0][2] * point.x + c[1][2] * point.y + c[2][2] * point.z + c[3][2],
        )
    }
}

impl Mul for Mat4 {
    type Output = Mat4;

    fn mul(self, rhs: Mat4) -> Mat4 {
        let mut out = [[0.0f32; 4]; 4];
        for (col, out_col) in out.iter_mut().enumerate() {
            for (row, value) in out_col.iter_mut().enumerate() {
                *value = (0..4)
                    .map(|k| self.cols[k][row] * rhs.cols[col][k])
                    .sum();
            }
        }
        Mat4 { cols: out }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_vec3_close(actual: Vec3, expected: Vec3) {
        assert!(
            (actual - expected).length() <= 1e-5,
            "{actual:?} vs {expected:?}"
        );
    }

    #[test]
    fn normalize_degenerate_vector_is_zero() {
        assert_eq!(Vec3::ZERO.normalize_or_zero(), Vec3::ZERO);
        assert_vec3_close(
            Vec3::new(3.0, 0.0, 4.0).normalize_or_zero(),
            Vec3::new(0.6, 0.0, 0.8),
        );
    }

    #[test]
    fn translation_then_rotation_keeps_position() {
        let transform =
            Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)) * Mat4::from_rotation_z(1.2);
        assert_vec3_close(transform.translation(), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn transform_point_applies_parent_translation() {
        let parent = Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0));
        let local = Mat4::from_translation(Vec3::new(0.0, 1.0, 0.5));
        assert_vec3_close((parent * local).translation(), Vec3::new(10.0, 1.0, 0.5));
        assert_vec3_close(
            parent.transform_point(Vec3::new(0.0, 1.0, 0.5)),
            Vec3::new(10.0, 1.0, 0.5),
        );
    }

    #[test]
    fn quarter_turn_rotates_x_onto_y() {
        let rotated =
            Mat4::from_rotation_z(std::f32::consts::FRAC_PI_2).transform_point(Vec3::new(
                1.0, 0.0, 0.0,
            ));
        assert_vec3_close(rotated, Vec3::new(0.0, 1.0, 0.0));
    }
}
