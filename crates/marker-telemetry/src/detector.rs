//! Seam to the external square-marker detector.
//!
//! Pattern recognition itself is not implemented here. A detector is
//! configured once with the camera model and the pattern catalog, and then
//! called per frame on the colour image.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use log::debug;
use marker_telemetry_core::{
    CameraIntrinsics, ColorImageView, Detection, PatternCatalog, PointCloudFrame,
};
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DetectorError {
    #[error("detector used before configuration")]
    NotConfigured,
    #[error("detector setup failed: {0}")]
    Setup(String),
    #[error("detection failed: {0}")]
    Failed(String),
}

/// Square-marker detector.
pub trait MarkerDetector {
    /// One-time setup with the camera model and the patterns to look for.
    fn configure(
        &mut self,
        intrinsics: &CameraIntrinsics,
        catalog: &PatternCatalog,
    ) -> Result<(), DetectorError>;

    /// Detect markers in one image. `threshold` is the binarisation level.
    fn detect(
        &mut self,
        image: ColorImageView<'_>,
        threshold: i32,
    ) -> Result<Vec<Detection>, DetectorError>;
}

impl<D: MarkerDetector + ?Sized> MarkerDetector for Box<D> {
    fn configure(
        &mut self,
        intrinsics: &CameraIntrinsics,
        catalog: &PatternCatalog,
    ) -> Result<(), DetectorError> {
        (**self).configure(intrinsics, catalog)
    }

    fn detect(
        &mut self,
        image: ColorImageView<'_>,
        threshold: i32,
    ) -> Result<Vec<Detection>, DetectorError> {
        (**self).detect(image, threshold)
    }
}

/// A frame together with the detections an offline detector produced for it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecordedFrame {
    pub frame: PointCloudFrame,
    #[serde(default)]
    pub detections: Vec<Detection>,
}

/// Producer side of a [`ReplayDetector`].
#[derive(Clone, Debug, Default)]
pub struct ReplayFeed {
    queue: Arc<Mutex<VecDeque<Result<Vec<Detection>, DetectorError>>>>,
}

impl ReplayFeed {
    /// Queue the detections for the next frame.
    pub fn push(&self, detections: Vec<Detection>) {
        self.lock().push_back(Ok(detections));
    }

    /// Make the next `detect` call fail.
    pub fn push_failure(&self, reason: impl Into<String>) {
        self.lock()
            .push_back(Err(DetectorError::Failed(reason.into())));
    }

    /// Drop every queued batch.
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    fn lock(
        &self,
    ) -> std::sync::MutexGuard<'_, VecDeque<Result<Vec<Detection>, DetectorError>>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Detector that replays pre-computed detections, one batch per frame.
///
/// An empty queue yields no detections.
#[derive(Debug, Default)]
pub struct ReplayDetector {
    feed: ReplayFeed,
    intrinsics: Option<CameraIntrinsics>,
    patterns: usize,
    configure_calls: usize,
    detect_calls: usize,
}

impl ReplayDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&self) -> ReplayFeed {
        self.feed.clone()
    }

    pub fn intrinsics(&self) -> Option<&CameraIntrinsics> {
        self.intrinsics.as_ref()
    }

    pub fn configure_calls(&self) -> usize {
        self.configure_calls
    }

    pub fn detect_calls(&self) -> usize {
        self.detect_calls
    }
}

impl MarkerDetector for ReplayDetector {
    fn configure(
        &mut self,
        intrinsics: &CameraIntrinsics,
        catalog: &PatternCatalog,
    ) -> Result<(), DetectorError> {
        self.configure_calls += 1;
        self.intrinsics = Some(*intrinsics);
        self.patterns = catalog.len();
        debug!(
            "replay detector configured for {}x{} with {} patterns",
            intrinsics.width, intrinsics.height, self.patterns
        );
        Ok(())
    }

    fn detect(
        &mut self,
        _image: ColorImageView<'_>,
        _threshold: i32,
    ) -> Result<Vec<Detection>, DetectorError> {
        if self.intrinsics.is_none() {
            return Err(DetectorError::NotConfigured);
        }
        self.detect_calls += 1;
        self.feed.lock().pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}
