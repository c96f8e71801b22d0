//! Marker pose telemetry.
//!
//! Depth-camera frames go in; for every known marker pattern that is seen,
//! its pose is fitted from the depth samples under its corners, expressed in
//! the world frame and streamed to a robot as `name;x;y;theta` over a
//! Bluetooth serial link. Visualization outputs (marker list, stamped
//! transforms, debug cubes) are emitted alongside.
//!
//! ```no_run
//! use marker_telemetry::{MarkerPipeline, PipelineConfig, ReplayDetector, StaticWorldTransforms};
//! use marker_telemetry::core::PatternCatalog;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::load_json("node.json")?;
//! let catalog = PatternCatalog::load(&config.pattern_catalog_path, &config.pattern_data_dir)?;
//! let world = StaticWorldTransforms::load_json("world.json")?;
//! let mut pipeline = MarkerPipeline::new(config, catalog, ReplayDetector::new()).with_world(world);
//! # let _ = &mut pipeline;
//! # Ok(())
//! # }
//! ```

pub use marker_telemetry_bluetooth as bluetooth;
pub use marker_telemetry_core as core;

mod config;
mod detector;
mod emit;
mod estimate;
mod ingest;
mod pipeline;
mod resolve;
mod telemetry;
mod world;

pub use config::{install_dir, ConfigError, PipelineConfig, HOME_ENV};
pub use detector::{DetectorError, MarkerDetector, RecordedFrame, ReplayDetector, ReplayFeed};
pub use emit::{
    catalog_color, DebugShape, JsonLinesSink, MarkerPose, MarkerPoseList, RecordingSink, Rgba,
    ShapeKind, StampedTransform, VisualizationSink, SHAPE_NAMESPACE,
};
pub use estimate::{ideal_corners, observed_corners, EstimationError, PoseEstimator};
pub use ingest::{FrameIngest, IngestError};
pub use pipeline::{FrameReport, MarkerPipeline, SkipReason, SkippedMarker};
pub use resolve::{best_detection, resolve, ResolvedMarker};
pub use telemetry::{TelemetryMessage, TelemetryParseError, TelemetryPublisher, TelemetrySink};
pub use world::{
    MountSpec, StaticWorldTransforms, TransformBuffer, TransformUnavailable, WorldFrame,
    WorldTransform,
};

/// Install the stderr logger, or a `tracing` subscriber with the `tracing`
/// feature. Without an explicit `level`, `MARKER_TELEMETRY_LOG` decides,
/// falling back to info.
pub fn init_logging(level: Option<log::LevelFilter>) {
    // A logger or subscriber may already be installed; keep it.
    #[cfg(feature = "tracing")]
    {
        let _ = tracing_log::LogTracer::init();
        marker_telemetry_core::init_tracing(level, false);
    }
    #[cfg(not(feature = "tracing"))]
    {
        let level =
            level.unwrap_or_else(|| marker_telemetry_core::level_from_env(log::LevelFilter::Info));
        let _ = marker_telemetry_core::init_with_level(level);
    }
}
