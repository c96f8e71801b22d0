//! Rigid 3-D poses.

use nalgebra::{
    Isometry3, Matrix3, Matrix4, Quaternion, Rotation3, Translation3, UnitQuaternion, Vector3,
};
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoseError {
    #[error("pose has non-finite components")]
    NonFinite,
    #[error("orientation quaternion has zero magnitude")]
    ZeroQuaternion,
}

/// Position plus unit-quaternion orientation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vector3<f64>,
    pub orientation: UnitQuaternion<f64>,
}

impl Pose {
    pub fn identity() -> Self {
        Self {
            position: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
        }
    }

    pub fn new(position: Vector3<f64>, orientation: UnitQuaternion<f64>) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// Build a pose from raw quaternion components, dividing them by their
    /// combined magnitude.
    pub fn from_raw_parts(position: Vector3<f64>, q: Quaternion<f64>) -> Result<Self, PoseError> {
        if !position.iter().all(|v| v.is_finite()) || !q.coords.iter().all(|v| v.is_finite()) {
            return Err(PoseError::NonFinite);
        }
        let magnitude = q.norm();
        if magnitude <= f64::EPSILON {
            return Err(PoseError::ZeroQuaternion);
        }
        Ok(Self {
            position,
            orientation: UnitQuaternion::new_unchecked(q / magnitude),
        })
    }

    /// Planar pose: translation in the xy-plane, rotation about +z.
    pub fn planar(x: f64, y: f64, yaw: f64) -> Self {
        Self {
            position: Vector3::new(x, y, 0.0),
            orientation: UnitQuaternion::from_axis_angle(&Vector3::z_axis(), yaw),
        }
    }

    /// Convert a homogeneous rigid transform; the rotation block is taken as-is.
    pub fn from_matrix(m: &Matrix4<f64>) -> Result<Self, PoseError> {
        if !m.iter().all(|v| v.is_finite()) {
            return Err(PoseError::NonFinite);
        }
        let r: Matrix3<f64> = m.fixed_view::<3, 3>(0, 0).into_owned();
        let t = Vector3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)]);
        let rot = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(r));
        Self::from_raw_parts(t, rot.into_inner())
    }

    pub fn from_isometry(iso: &Isometry3<f64>) -> Self {
        Self {
            position: iso.translation.vector,
            orientation: iso.rotation,
        }
    }

    pub fn to_isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(Translation3::from(self.position), self.orientation)
    }

    /// Re-normalise the orientation so repeated composition cannot drift
    /// away from unit length.
    pub fn renormalized(&self) -> Self {
        Self {
            position: self.position,
            orientation: UnitQuaternion::new_normalize(self.orientation.into_inner()),
        }
    }

    /// `self * other`: express `other` (given in this pose's frame) in the
    /// parent frame of `self`.
    pub fn compose(&self, other: &Pose) -> Pose {
        Pose::from_isometry(&(self.to_isometry() * other.to_isometry()))
    }

    pub fn inverse(&self) -> Pose {
        Pose::from_isometry(&self.to_isometry().inverse())
    }

    /// Rotation about the vertical axis, radians in `(-π, π]`.
    pub fn yaw(&self) -> f64 {
        let q = self.orientation.quaternion();
        let (x, y, z, w) = (q.i, q.j, q.k, q.w);
        let siny_cosp = 2.0 * (w * z + x * y);
        let cosy_cosp = 1.0 - 2.0 * (y * y + z * z);
        siny_cosp.atan2(cosy_cosp)
    }

    pub fn is_finite(&self) -> bool {
        self.position.iter().all(|v| v.is_finite())
            && self.orientation.coords.iter().all(|v| v.is_finite())
    }
}
