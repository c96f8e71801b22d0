//! Core types for marker pose telemetry.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! depend on any concrete marker detector, point-cloud transport or radio
//! link. It provides:
//! - perception frames (organised point clouds with a packed colour image),
//! - lazily derived camera intrinsics,
//! - detections and the pattern catalog they are resolved against,
//! - poses and the rigid-transform solver used to fit them.

mod catalog;
mod detection;
mod frame;
mod image;
mod intrinsics;
mod logger;
mod pose;
mod rigid;

pub use catalog::{CatalogError, PatternCatalog, PatternEntry};
pub use detection::Detection;
pub use frame::{FrameError, PointCloudFrame};
pub use image::{ColorImage, ColorImageView};
pub use intrinsics::{CalibrationState, CameraIntrinsics};
pub use pose::{Pose, PoseError};
pub use rigid::{RigidTransformError, RigidTransformSolver, SvdRigidSolver};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, level_from_env, LOG_ENV};
