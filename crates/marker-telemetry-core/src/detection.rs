//! Per-frame marker detections produced by an external detector.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// One square marker found in the image.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Pattern id assigned by the detector (`-1` when unmatched).
    pub id: i32,
    /// Marker corners in pixels, in the detector's own vertex order.
    pub vertices: [Point2<f32>; 4],
    /// Rotation offset: which detector vertex is the pattern's first corner.
    pub dir: u8,
    /// Match confidence in `[0, 1]`.
    pub confidence: f64,
}

impl Detection {
    /// Vertex indices in upper-left, upper-right, lower-right, lower-left order.
    ///
    /// Mapping is `(4 - dir) % 4, (5 - dir) % 4, (6 - dir) % 4, (7 - dir) % 4`.
    #[inline]
    pub fn corner_order(&self) -> [usize; 4] {
        let d = usize::from(self.dir % 4);
        [(4 - d) % 4, (5 - d) % 4, (6 - d) % 4, (7 - d) % 4]
    }

    /// Vertices reordered so that index 0 is the pattern's upper-left corner.
    pub fn ordered_vertices(&self) -> [Point2<f32>; 4] {
        self.corner_order().map(|i| self.vertices[i])
    }
}
