//! Visualization outputs: the per-frame marker list, stamped transforms and
//! debug cubes.

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use log::warn;
use marker_telemetry_core::{PatternEntry, Pose};
use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Namespace shared by all debug shapes.
pub const SHAPE_NAMESPACE: &str = "basic_shapes";

/// One marker in the per-frame list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkerPose {
    pub id: i32,
    pub name: String,
    /// Pose in the sensor frame.
    pub pose: Pose,
    pub confidence: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MarkerPoseList {
    pub frame_id: String,
    pub stamp: f64,
    pub markers: Vec<MarkerPose>,
}

/// Parent -> child transform at a point in time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StampedTransform {
    pub parent: String,
    pub child: String,
    pub stamp: f64,
    pub pose: Pose,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const fn opaque(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }
}

/// Colour by catalog position: blue, red, then green for the rest.
pub fn catalog_color(index: usize) -> Rgba {
    match index {
        0 => Rgba::opaque(0.0, 0.0, 1.0),
        1 => Rgba::opaque(1.0, 0.0, 0.0),
        _ => Rgba::opaque(0.0, 1.0, 0.0),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    Cube,
}

/// Debug shape drawn on top of a marker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DebugShape {
    pub namespace: String,
    pub id: i32,
    pub frame_id: String,
    pub stamp: f64,
    pub kind: ShapeKind,
    pub pose: Pose,
    pub scale: [f64; 3],
    pub color: Rgba,
}

impl DebugShape {
    /// Flat cube sitting on the marker: `w x w x w/2`, lifted by `w/4` along
    /// the marker normal.
    pub fn for_marker(
        index: usize,
        pattern: &PatternEntry,
        marker_pose: &Pose,
        frame_id: &str,
        stamp: f64,
    ) -> Self {
        let w = pattern.side_length;
        let lift = Pose::new(Vector3::new(0.0, 0.0, 0.25 * w), UnitQuaternion::identity());
        Self {
            namespace: SHAPE_NAMESPACE.to_string(),
            id: pattern.id,
            frame_id: frame_id.to_string(),
            stamp,
            kind: ShapeKind::Cube,
            pose: marker_pose.compose(&lift),
            scale: [w, w, 0.5 * w],
            color: catalog_color(index),
        }
    }
}

/// Receiver for visualization outputs. Every hook defaults to a no-op.
pub trait VisualizationSink {
    fn marker_list(&mut self, _list: &MarkerPoseList) {}
    fn transform(&mut self, _transform: &StampedTransform) {}
    fn debug_shape(&mut self, _shape: &DebugShape) {}
}

impl<T: VisualizationSink + ?Sized> VisualizationSink for Arc<Mutex<T>> {
    fn marker_list(&mut self, list: &MarkerPoseList) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .marker_list(list);
    }

    fn transform(&mut self, transform: &StampedTransform) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .transform(transform);
    }

    fn debug_shape(&mut self, shape: &DebugShape) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .debug_shape(shape);
    }
}

/// Keeps everything it receives.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    pub marker_lists: Vec<MarkerPoseList>,
    pub transforms: Vec<StampedTransform>,
    pub shapes: Vec<DebugShape>,
}

impl VisualizationSink for RecordingSink {
    fn marker_list(&mut self, list: &MarkerPoseList) {
        self.marker_lists.push(list.clone());
    }

    fn transform(&mut self, transform: &StampedTransform) {
        self.transforms.push(transform.clone());
    }

    fn debug_shape(&mut self, shape: &DebugShape) {
        self.shapes.push(shape.clone());
    }
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Record<'a> {
    MarkerList(&'a MarkerPoseList),
    Transform(&'a StampedTransform),
    DebugShape(&'a DebugShape),
}

/// Writes one JSON object per output, tagged with `"kind"`.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write(&mut self, record: &Record<'_>) {
        let result = serde_json::to_writer(&mut self.writer, record)
            .map_err(std::io::Error::from)
            .and_then(|()| self.writer.write_all(b"\n"));
        if let Err(err) = result {
            warn!("visualization output dropped: {err}");
        }
    }
}

impl<W: Write> VisualizationSink for JsonLinesSink<W> {
    fn marker_list(&mut self, list: &MarkerPoseList) {
        self.write(&Record::MarkerList(list));
    }

    fn transform(&mut self, transform: &StampedTransform) {
        self.write(&Record::Transform(transform));
    }

    fn debug_shape(&mut self, shape: &DebugShape) {
        self.write(&Record::DebugShape(shape));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pattern(id: i32) -> PatternEntry {
        PatternEntry {
            id,
            name: format!("p{id}"),
            pattern_file: "patt.sample1".into(),
            side_length: 0.2,
            visible: true,
        }
    }

    #[test]
    fn colours_follow_catalog_position() {
        assert_eq!(catalog_color(0), Rgba::opaque(0.0, 0.0, 1.0));
        assert_eq!(catalog_color(1), Rgba::opaque(1.0, 0.0, 0.0));
        assert_eq!(catalog_color(2), catalog_color(7));
    }

    #[test]
    fn cube_is_lifted_along_marker_normal() {
        // Marker facing the camera: its +z points along camera -z.
        let pose = Pose::new(
            Vector3::new(0.0, 0.0, 1.0),
            UnitQuaternion::from_euler_angles(std::f64::consts::PI, 0.0, 0.0),
        );
        let shape = DebugShape::for_marker(1, &pattern(4), &pose, "camera", 2.5);
        assert_eq!(shape.namespace, SHAPE_NAMESPACE);
        assert_eq!(shape.id, 4);
        assert_eq!(shape.scale, [0.2, 0.2, 0.1]);
        assert_eq!(shape.color, catalog_color(1));
        assert_relative_eq!(shape.pose.position.z, 0.95, epsilon = 1e-12);
    }

    #[test]
    fn json_lines_are_tagged() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.transform(&StampedTransform {
            parent: "camera".to_string(),
            child: "hiro".to_string(),
            stamp: 1.0,
            pose: Pose::identity(),
        });
        sink.marker_list(&MarkerPoseList::default());
        let text = String::from_utf8(sink.into_inner()).expect("utf8");
        let kinds: Vec<String> = text
            .lines()
            .map(|line| {
                let v: serde_json::Value = serde_json::from_str(line).expect("json");
                v["kind"].as_str().unwrap_or_default().to_string()
            })
            .collect();
        assert_eq!(kinds, ["transform", "marker_list"]);
    }
}
