//! Organised point-cloud frames as delivered by a depth camera.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::ColorImageView;

/// Frame validation errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("deformed cloud (width={width}, height={height})")]
    Deformed { width: u32, height: u32 },
    #[error("point count mismatch (expected {expected} samples, got {got})")]
    PointCountMismatch { expected: usize, got: usize },
}

/// One perception frame: a dense, row-major grid of 3-D samples plus the
/// colour image registered to it.
///
/// Samples may be non-finite where the sensor had no return.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PointCloudFrame {
    pub width: u32,
    pub height: u32,
    /// One sample per pixel, `points[y * width + x]`.
    #[serde(with = "points_serde")]
    pub points: Vec<Point3<f32>>,
    /// Packed `bgr8` image, empty when the source carries no colour.
    #[serde(default)]
    pub bgr: Vec<u8>,
    /// Sensor frame the samples are expressed in.
    pub frame_id: String,
    /// Acquisition time in seconds.
    pub stamp: f64,
}

impl PointCloudFrame {
    /// Reject frames that cannot be processed.
    pub fn validate(&self) -> Result<(), FrameError> {
        if self.width == 0 || self.height == 0 {
            return Err(FrameError::Deformed {
                width: self.width,
                height: self.height,
            });
        }
        let expected = self.width as usize * self.height as usize;
        if self.points.len() != expected {
            return Err(FrameError::PointCountMismatch {
                expected,
                got: self.points.len(),
            });
        }
        Ok(())
    }

    /// Sample at pixel `(x, y)`; `None` outside the grid.
    #[inline]
    pub fn point_at(&self, x: usize, y: usize) -> Option<Point3<f32>> {
        if x >= self.width as usize || y >= self.height as usize {
            return None;
        }
        self.points.get(y * self.width as usize + x).copied()
    }

    pub fn image(&self) -> ColorImageView<'_> {
        ColorImageView {
            width: self.width as usize,
            height: self.height as usize,
            data: &self.bgr,
        }
    }
}

/// JSON has no NaN: dropouts travel as `null` coordinates.
mod points_serde {
    use nalgebra::Point3;
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    fn finite(v: f32) -> Option<f32> {
        v.is_finite().then_some(v)
    }

    pub fn serialize<S: Serializer>(points: &[Point3<f32>], s: S) -> Result<S::Ok, S::Error> {
        let mut seq = s.serialize_seq(Some(points.len()))?;
        for p in points {
            seq.serialize_element(&[finite(p.x), finite(p.y), finite(p.z)])?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Point3<f32>>, D::Error> {
        let raw: Vec<[Option<f32>; 3]> = Vec::deserialize(d)?;
        Ok(raw
            .into_iter()
            .map(|[x, y, z]| {
                Point3::new(
                    x.unwrap_or(f32::NAN),
                    y.unwrap_or(f32::NAN),
                    z.unwrap_or(f32::NAN),
                )
            })
            .collect())
    }
}
