//! Frame-synchronous processing: admit, detect, resolve, estimate, then
//! publish telemetry and visualization for every marker found.

use std::fmt;

use log::{debug, warn};
use marker_telemetry_core::{PatternCatalog, PointCloudFrame, RigidTransformSolver, SvdRigidSolver};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::config::PipelineConfig;
use crate::detector::MarkerDetector;
use crate::emit::{DebugShape, MarkerPose, MarkerPoseList, StampedTransform, VisualizationSink};
use crate::estimate::{EstimationError, PoseEstimator};
use crate::ingest::{FrameIngest, IngestError};
use crate::resolve::resolve;
use crate::telemetry::{TelemetryMessage, TelemetryPublisher, TelemetrySink};
use crate::world::{TransformUnavailable, WorldFrame, WorldTransform};

/// Why a visible marker produced no (or partial) output.
#[derive(Clone, Debug, PartialEq)]
pub enum SkipReason {
    Estimation(EstimationError),
    Transform(TransformUnavailable),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Estimation(err) => write!(f, "{err}"),
            Self::Transform(err) => write!(f, "{err}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SkippedMarker {
    pub id: i32,
    pub name: String,
    pub reason: SkipReason,
}

/// Outcome of one processed frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameReport {
    pub frame_id: String,
    pub stamp: f64,
    /// Raw detections returned by the detector.
    pub detections: usize,
    /// Sensor-frame poses, catalog order.
    pub markers: Vec<MarkerPose>,
    /// Telemetry handed to the publisher, catalog order.
    pub telemetry: Vec<TelemetryMessage>,
    /// Telemetry the sink refused.
    pub undelivered: usize,
    pub skipped: Vec<SkippedMarker>,
}

/// The marker telemetry pipeline.
///
/// Owns the catalog, the detector and every output. Frames are processed
/// one at a time and to completion.
pub struct MarkerPipeline {
    config: PipelineConfig,
    catalog: PatternCatalog,
    ingest: FrameIngest,
    detector: Box<dyn MarkerDetector + Send>,
    estimator: PoseEstimator<Box<dyn RigidTransformSolver + Send>>,
    world: WorldFrame,
    world_lookup: Option<Box<dyn WorldTransform + Send>>,
    telemetry: Option<TelemetryPublisher>,
    visualization: Option<Box<dyn VisualizationSink + Send>>,
}

impl MarkerPipeline {
    pub fn new(
        config: PipelineConfig,
        catalog: PatternCatalog,
        detector: impl MarkerDetector + Send + 'static,
    ) -> Self {
        let world = WorldFrame::new(config.world_frame.clone(), config.transform_timeout());
        let solver: Box<dyn RigidTransformSolver + Send> = Box::new(SvdRigidSolver);
        Self {
            config,
            catalog,
            ingest: FrameIngest::new(),
            detector: Box::new(detector),
            estimator: PoseEstimator::new(solver),
            world,
            world_lookup: None,
            telemetry: None,
            visualization: None,
        }
    }

    /// Replace the default SVD solver.
    pub fn with_solver(mut self, solver: impl RigidTransformSolver + Send + 'static) -> Self {
        let solver: Box<dyn RigidTransformSolver + Send> = Box::new(solver);
        self.estimator = PoseEstimator::new(solver);
        self
    }

    pub fn with_world(mut self, lookup: impl WorldTransform + Send + 'static) -> Self {
        self.world_lookup = Some(Box::new(lookup));
        self
    }

    /// Route telemetry to `sink` on the configured channel.
    pub fn with_telemetry(mut self, sink: impl TelemetrySink + Send + 'static) -> Self {
        self.telemetry = Some(TelemetryPublisher::new(self.config.telemetry_channel, sink));
        self
    }

    pub fn with_visualization(mut self, sink: impl VisualizationSink + Send + 'static) -> Self {
        self.visualization = Some(Box::new(sink));
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &PatternCatalog {
        &self.catalog
    }

    pub fn ingest(&self) -> &FrameIngest {
        &self.ingest
    }

    pub fn has_telemetry(&self) -> bool {
        self.telemetry.is_some()
    }

    /// Process one frame.
    ///
    /// Only a rejected frame is an error. Marker-level failures are logged,
    /// recorded in the report and never stop the remaining markers.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(frame = %frame.frame_id, stamp = frame.stamp))
    )]
    pub fn process(&mut self, frame: &PointCloudFrame) -> Result<FrameReport, IngestError> {
        self.ingest
            .admit(frame, &mut *self.detector, &self.catalog)?;

        let detections = match self.detector.detect(frame.image(), self.config.threshold) {
            Ok(detections) => detections,
            Err(err) => {
                debug!("no markers this frame: {err}");
                Vec::new()
            }
        };

        let mut report = FrameReport {
            frame_id: frame.frame_id.clone(),
            stamp: frame.stamp,
            detections: detections.len(),
            ..FrameReport::default()
        };

        let resolved = resolve(&mut self.catalog, &detections);
        let publisher = self
            .telemetry
            .as_ref()
            .filter(|_| self.config.publish_to_telemetry_link);

        for marker in &resolved {
            let name = &marker.pattern.name;
            let pose = match self.estimator.estimate(frame, marker) {
                Ok(pose) => pose,
                Err(err) => {
                    debug!("pattern {name} skipped: {err}");
                    report.skipped.push(SkippedMarker {
                        id: marker.pattern.id,
                        name: name.clone(),
                        reason: SkipReason::Estimation(err),
                    });
                    continue;
                }
            };

            report.markers.push(MarkerPose {
                id: marker.pattern.id,
                name: name.clone(),
                pose,
                confidence: marker.detection.confidence,
            });

            if let Some(publisher) = publisher {
                let world_pose = match self.world_lookup.as_deref() {
                    Some(lookup) => self.world.to_world(lookup, &pose, &frame.frame_id, frame.stamp),
                    None => Err(TransformUnavailable::UnknownFrame {
                        frame: frame.frame_id.clone(),
                    }),
                };
                match world_pose {
                    Ok(world_pose) => {
                        let message = TelemetryMessage::from_world_pose(name.clone(), &world_pose);
                        if !publisher.publish(&message) {
                            report.undelivered += 1;
                        }
                        report.telemetry.push(message);
                    }
                    Err(err) => {
                        warn!("could not express {name} in {}: {err}", self.world.name());
                        report.skipped.push(SkippedMarker {
                            id: marker.pattern.id,
                            name: name.clone(),
                            reason: SkipReason::Transform(err),
                        });
                    }
                }
            }

            if let Some(sink) = self.visualization.as_mut() {
                if self.config.publish_transforms {
                    sink.transform(&StampedTransform {
                        parent: frame.frame_id.clone(),
                        child: name.clone(),
                        stamp: frame.stamp,
                        pose,
                    });
                }
                if self.config.publish_visual_markers {
                    sink.debug_shape(&DebugShape::for_marker(
                        marker.index,
                        &marker.pattern,
                        &pose,
                        &frame.frame_id,
                        frame.stamp,
                    ));
                }
            }
        }

        if self.config.publish_marker_list {
            if let Some(sink) = self.visualization.as_mut() {
                sink.marker_list(&MarkerPoseList {
                    frame_id: frame.frame_id.clone(),
                    stamp: frame.stamp,
                    markers: report.markers.clone(),
                });
            }
        }

        Ok(report)
    }
}

impl fmt::Debug for MarkerPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarkerPipeline")
            .field("config", &self.config)
            .field("catalog", &self.catalog)
            .field("ingest", &self.ingest)
            .field("world", &self.world)
            .field("telemetry", &self.telemetry)
            .finish_non_exhaustive()
    }
}
