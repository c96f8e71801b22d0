//! Rigid-transform estimation between corresponding point sets.

use nalgebra::{Isometry3, Matrix3, Matrix4, Point3, Rotation3, Translation3, UnitQuaternion, Vector3};

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RigidTransformError {
    #[error("point sets differ in size ({source_len} vs {target_len})")]
    LengthMismatch {
        source_len: usize,
        target_len: usize,
    },
    #[error("at least 3 correspondences required, got {0}")]
    TooFewPoints(usize),
    #[error("point sets contain non-finite coordinates")]
    NonFinite,
    #[error("point set is degenerate (all points coincide)")]
    Degenerate,
    #[error("SVD did not converge")]
    SvdFailed,
}

/// Least-squares rigid alignment of two ordered point sets.
pub trait RigidTransformSolver {
    /// Return the homogeneous transform `T` minimising `Σ |T·source_i - target_i|²`.
    fn estimate(
        &self,
        source: &[Point3<f64>],
        target: &[Point3<f64>],
    ) -> Result<Matrix4<f64>, RigidTransformError>;
}

impl<S: RigidTransformSolver + ?Sized> RigidTransformSolver for Box<S> {
    fn estimate(
        &self,
        source: &[Point3<f64>],
        target: &[Point3<f64>],
    ) -> Result<Matrix4<f64>, RigidTransformError> {
        (**self).estimate(source, target)
    }
}

/// Kabsch/Umeyama alignment without scale.
#[derive(Clone, Copy, Debug, Default)]
pub struct SvdRigidSolver;

const DEGENERATE_SPREAD: f64 = 1e-12;

impl RigidTransformSolver for SvdRigidSolver {
    fn estimate(
        &self,
        source: &[Point3<f64>],
        target: &[Point3<f64>],
    ) -> Result<Matrix4<f64>, RigidTransformError> {
        if source.len() != target.len() {
            return Err(RigidTransformError::LengthMismatch {
                source_len: source.len(),
                target_len: target.len(),
            });
        }
        if source.len() < 3 {
            return Err(RigidTransformError::TooFewPoints(source.len()));
        }
        if source
            .iter()
            .chain(target.iter())
            .any(|p| !p.coords.iter().all(|v| v.is_finite()))
        {
            return Err(RigidTransformError::NonFinite);
        }

        let c_src = centroid(source);
        let c_dst = centroid(target);

        let mut h = Matrix3::<f64>::zeros();
        let mut spread_src = 0.0;
        let mut spread_dst = 0.0;
        for (ps, pt) in source.iter().zip(target.iter()) {
            let ds = ps.coords - c_src;
            let dt = pt.coords - c_dst;
            spread_src += ds.norm_squared();
            spread_dst += dt.norm_squared();
            h += dt * ds.transpose();
        }
        if spread_src < DEGENERATE_SPREAD || spread_dst < DEGENERATE_SPREAD {
            return Err(RigidTransformError::Degenerate);
        }

        let svd = h.svd(true, true);
        let u = svd.u.ok_or(RigidTransformError::SvdFailed)?;
        let v_t = svd.v_t.ok_or(RigidTransformError::SvdFailed)?;
        let mut r = u * v_t;
        if r.determinant() < 0.0 {
            let mut u_fix = u;
            u_fix.column_mut(2).neg_mut();
            r = u_fix * v_t;
        }

        let t = c_dst - r * c_src;
        let rot = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(r));
        Ok(Isometry3::from_parts(Translation3::from(t), rot).to_homogeneous())
    }
}

fn centroid(points: &[Point3<f64>]) -> Vector3<f64> {
    let sum = points
        .iter()
        .fold(Vector3::zeros(), |acc: Vector3<f64>, p| acc + p.coords);
    sum / points.len() as f64
}
