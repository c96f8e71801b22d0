//! Marker pose from the depth samples under its four corners.

use log::debug;
use marker_telemetry_core::{
    Detection, PointCloudFrame, Pose, PoseError, RigidTransformError, RigidTransformSolver,
    SvdRigidSolver,
};
use nalgebra::Point3;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::resolve::ResolvedMarker;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EstimationError {
    #[error("corner {corner} at pixel ({x}, {y}) lies outside the cloud")]
    CornerOutOfBounds { corner: usize, x: f32, y: f32 },
    #[error("no depth sample under corner {corner}")]
    InvalidSample { corner: usize },
    #[error(transparent)]
    Solver(#[from] RigidTransformError),
    #[error("fitted transform is not invertible")]
    Singular,
    #[error(transparent)]
    Pose(#[from] PoseError),
}

/// Corners of a square of side `side`, centred at the origin in the z = 0
/// plane, ordered upper-left, upper-right, lower-right, lower-left.
pub fn ideal_corners(side: f64) -> [Point3<f64>; 4] {
    let h = side / 2.0;
    [
        Point3::new(-h, h, 0.0),
        Point3::new(h, h, 0.0),
        Point3::new(h, -h, 0.0),
        Point3::new(-h, -h, 0.0),
    ]
}

/// Depth samples under the detection's corners, in canonical corner order.
///
/// Pixel coordinates are truncated to the containing cell.
pub fn observed_corners(
    frame: &PointCloudFrame,
    detection: &Detection,
) -> Result<[Point3<f64>; 4], EstimationError> {
    let mut out = [Point3::origin(); 4];
    for (corner, v) in detection.ordered_vertices().iter().enumerate() {
        // Also rejects NaN.
        if !(v.x >= 0.0 && v.y >= 0.0 && v.x.is_finite() && v.y.is_finite()) {
            return Err(EstimationError::CornerOutOfBounds {
                corner,
                x: v.x,
                y: v.y,
            });
        }
        let p = frame
            .point_at(v.x as usize, v.y as usize)
            .ok_or(EstimationError::CornerOutOfBounds {
                corner,
                x: v.x,
                y: v.y,
            })?;
        if !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()) {
            return Err(EstimationError::InvalidSample { corner });
        }
        out[corner] = p.cast::<f64>();
    }
    Ok(out)
}

/// Fits a marker's pose in the sensor frame.
#[derive(Clone, Debug, Default)]
pub struct PoseEstimator<S = SvdRigidSolver> {
    solver: S,
}

impl<S: RigidTransformSolver> PoseEstimator<S> {
    pub fn new(solver: S) -> Self {
        Self { solver }
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// Pose of `marker` in the frame's sensor coordinates.
    ///
    /// The solver fits observed -> ideal; the inverse of that fit places the
    /// ideal square onto the observed samples.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip_all, fields(pattern = marker.pattern.id))
    )]
    pub fn estimate(
        &self,
        frame: &PointCloudFrame,
        marker: &ResolvedMarker,
    ) -> Result<Pose, EstimationError> {
        let observed = observed_corners(frame, &marker.detection)?;
        let ideal = ideal_corners(marker.pattern.side_length);
        let observed_to_ideal = self.solver.estimate(&observed, &ideal)?;
        let pose_matrix = observed_to_ideal
            .try_inverse()
            .ok_or(EstimationError::Singular)?;
        let pose = Pose::from_matrix(&pose_matrix)?;
        debug!(
            "pattern {} at ({:.3}, {:.3}, {:.3})",
            marker.pattern.name, pose.position.x, pose.position.y, pose.position.z
        );
        Ok(pose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use marker_telemetry_core::PatternEntry;
    use nalgebra::{Matrix4, Point2};

    const PITCH: f32 = 0.1;

    /// 4x4 planar grid at depth 1 m, 10 cm between samples, centred on the axis.
    fn grid() -> PointCloudFrame {
        let mut points = Vec::new();
        for y in 0..4 {
            for x in 0..4 {
                points.push(Point3::new(
                    (x as f32 - 1.5) * PITCH,
                    (y as f32 - 1.5) * PITCH,
                    1.0,
                ));
            }
        }
        PointCloudFrame {
            width: 4,
            height: 4,
            points,
            bgr: Vec::new(),
            frame_id: "camera".to_string(),
            stamp: 0.0,
        }
    }

    fn marker(vertices: [Point2<f32>; 4], dir: u8) -> ResolvedMarker {
        ResolvedMarker {
            index: 0,
            pattern: PatternEntry {
                id: 0,
                name: "hiro".to_string(),
                pattern_file: "patt.hiro".into(),
                side_length: 0.3,
                visible: true,
            },
            detection: Detection {
                id: 0,
                vertices,
                dir,
                confidence: 1.0,
            },
        }
    }

    fn square() -> [Point2<f32>; 4] {
        [
            Point2::new(0.0, 0.0),
            Point2::new(3.0, 0.0),
            Point2::new(3.0, 3.0),
            Point2::new(0.0, 3.0),
        ]
    }

    #[test]
    fn pose_maps_ideal_square_onto_samples() {
        let frame = grid();
        let m = marker(square(), 0);
        let pose = <PoseEstimator>::default()
            .estimate(&frame, &m)
            .expect("estimate");

        assert_relative_eq!(pose.position.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(pose.position.y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(pose.position.z, 1.0, epsilon = 1e-6);
        assert_relative_eq!(pose.orientation.norm(), 1.0, epsilon = 1e-12);

        let observed = observed_corners(&frame, &m.detection).expect("samples");
        for (ideal, seen) in ideal_corners(0.3).iter().zip(observed.iter()) {
            let mapped = pose.orientation * ideal.coords + pose.position;
            assert_relative_eq!(mapped, seen.coords, epsilon = 1e-6);
        }
    }

    #[test]
    fn detector_rotation_is_undone() {
        let frame = grid();
        let base = <PoseEstimator>::default()
            .estimate(&frame, &marker(square(), 0))
            .expect("dir 0");
        let v = square();
        let rotated = marker([v[1], v[2], v[3], v[0]], 1);
        let pose = <PoseEstimator>::default()
            .estimate(&frame, &rotated)
            .expect("dir 1");
        assert_relative_eq!(pose.position, base.position, epsilon = 1e-9);
        assert!(pose.orientation.angle_to(&base.orientation) < 1e-6);
    }

    #[test]
    fn corners_off_the_grid_are_rejected() {
        let frame = grid();
        let mut v = square();
        v[2] = Point2::new(4.0, 3.0);
        let err = <PoseEstimator>::default()
            .estimate(&frame, &marker(v, 0))
            .expect_err("outside");
        assert!(matches!(err, EstimationError::CornerOutOfBounds { corner: 2, .. }));

        let mut v = square();
        v[0] = Point2::new(-0.5, 0.0);
        let err = <PoseEstimator>::default()
            .estimate(&frame, &marker(v, 0))
            .expect_err("negative");
        assert!(matches!(err, EstimationError::CornerOutOfBounds { corner: 0, .. }));
    }

    #[test]
    fn depth_dropout_skips_marker() {
        let mut frame = grid();
        frame.points[3 * 4 + 3] = Point3::new(f32::NAN, f32::NAN, f32::NAN);
        let err = <PoseEstimator>::default()
            .estimate(&frame, &marker(square(), 0))
            .expect_err("dropout");
        assert_eq!(err, EstimationError::InvalidSample { corner: 2 });
    }

    struct SingularSolver;

    impl RigidTransformSolver for SingularSolver {
        fn estimate(
            &self,
            _source: &[Point3<f64>],
            _target: &[Point3<f64>],
        ) -> Result<Matrix4<f64>, RigidTransformError> {
            Ok(Matrix4::zeros())
        }
    }

    #[test]
    fn singular_fit_is_reported() {
        let err = PoseEstimator::new(SingularSolver)
            .estimate(&grid(), &marker(square(), 0))
            .expect_err("singular");
        assert_eq!(err, EstimationError::Singular);
    }
}
