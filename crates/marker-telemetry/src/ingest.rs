//! Frame admission: validation, one-time calibration and detector setup.

use log::{error, info};
use marker_telemetry_core::{
    CalibrationState, CameraIntrinsics, FrameError, PatternCatalog, PointCloudFrame,
};

use crate::detector::{DetectorError, MarkerDetector};

/// Why a frame was dropped before detection.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Detector(#[from] DetectorError),
}

/// Admits frames and owns the calibration derived from the first good one.
#[derive(Debug, Default)]
pub struct FrameIngest {
    calibration: CalibrationState,
    detector_ready: bool,
}

impl FrameIngest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calibration(&self) -> &CalibrationState {
        &self.calibration
    }

    pub fn detector_ready(&self) -> bool {
        self.detector_ready
    }

    /// Validate `frame`, calibrate on first use and configure `detector` once.
    ///
    /// Rejected frames leave the calibration untouched and never reach the
    /// detector. A failed detector setup is retried on the next frame.
    pub fn admit<D: MarkerDetector + ?Sized>(
        &mut self,
        frame: &PointCloudFrame,
        detector: &mut D,
        catalog: &PatternCatalog,
    ) -> Result<CameraIntrinsics, IngestError> {
        if let Err(err) = frame.validate() {
            error!("{err}");
            return Err(err.into());
        }

        let (intrinsics, fresh) = self.calibration.calibrate(frame.width, frame.height);
        let intrinsics = *intrinsics;
        if fresh {
            info!(
                "*** Camera Parameter *** {}x{} center ({}, {})",
                intrinsics.width, intrinsics.height, intrinsics.cx, intrinsics.cy
            );
        }

        if !self.detector_ready {
            if let Err(err) = detector.configure(&intrinsics, catalog) {
                error!("{err}");
                return Err(err.into());
            }
            info!("Objectfile num = {}", catalog.len());
            self.detector_ready = true;
        }
        Ok(intrinsics)
    }
}
