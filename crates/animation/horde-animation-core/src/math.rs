//! Affine transform algebra for GPU-bound bone matrices.

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

const EPSILON_NORMAL: f32 = 1e-30;
const EPSILON_DETERMINANT: f32 = 1e-6;

/// 3x3 rotation-scale plus translation, 48 bytes, column-major.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct AffineTransform {
    pub rotation_scale: Mat3,
    pub translation: Vec3,
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl AffineTransform {
    pub const IDENTITY: Self = Self {
        rotation_scale: Mat3::IDENTITY,
        translation: Vec3::ZERO,
    };

    pub const ZERO: Self = Self {
        rotation_scale: Mat3::ZERO,
        translation: Vec3::ZERO,
    };

    pub fn new(rotation_scale: Mat3, translation: Vec3) -> Self {
        Self {
            rotation_scale,
            translation,
        }
    }

    /// Build from translation, rotation and non-uniform scale.
    pub fn from_trs(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        let r = Mat3::from_quat(rotation);
        Self {
            rotation_scale: Mat3::from_cols(r.x_axis * scale.x, r.y_axis * scale.y, r.z_axis * scale.z),
            translation,
        }
    }

    /// `self * rhs`: apply `rhs` first.
    pub fn mul(&self, rhs: &AffineTransform) -> AffineTransform {
        AffineTransform {
            rotation_scale: self.rotation_scale * rhs.rotation_scale,
            translation: self.rotation_scale * rhs.translation + self.translation,
        }
    }

    #[inline]
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        self.rotation_scale * p + self.translation
    }

    #[inline]
    pub fn transform_direction(&self, d: Vec3) -> Vec3 {
        self.rotation_scale * d
    }

    /// Inverse that tolerates degenerate scale. A transform whose average
    /// squared column length vanishes inverts to zero; a singular but
    /// non-vanishing one inverts its rotation-scale to identity.
    pub fn inverse(&self) -> AffineTransform {
        let rotation_scale = pseudo_inverse(self.rotation_scale);
        AffineTransform {
            rotation_scale,
            translation: rotation_scale * -self.translation,
        }
    }

    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_cols(
            self.rotation_scale.x_axis.extend(0.0),
            self.rotation_scale.y_axis.extend(0.0),
            self.rotation_scale.z_axis.extend(0.0),
            self.translation.extend(1.0),
        )
    }

    /// Drops the projective row of `m`.
    pub fn from_mat4(m: Mat4) -> Self {
        Self {
            rotation_scale: Mat3::from_mat4(m),
            translation: m.w_axis.truncate(),
        }
    }
}

impl std::ops::Mul for AffineTransform {
    type Output = AffineTransform;

    fn mul(self, rhs: AffineTransform) -> AffineTransform {
        AffineTransform::mul(&self, &rhs)
    }
}

fn pseudo_inverse(m: Mat3) -> Mat3 {
    let scale_sq =
        (m.x_axis.length_squared() + m.y_axis.length_squared() + m.z_axis.length_squared()) / 3.0;
    if scale_sq < EPSILON_NORMAL {
        return Mat3::ZERO;
    }
    let scale_inv = scale_sq.sqrt().recip();
    let normalized = m * scale_inv;
    let det = normalized.determinant();
    let inv = if det.abs() > EPSILON_DETERMINANT {
        normalized.inverse()
    } else {
        Mat3::IDENTITY
    };
    inv * scale_inv
}
