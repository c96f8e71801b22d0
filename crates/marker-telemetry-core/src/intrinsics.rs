//! Sensor intrinsics derived from the first usable frame.

use std::cell::OnceCell;

use serde::{Deserialize, Serialize};

/// Radial distortion term: no correction is applied to registered clouds.
pub const NO_DISTORTION: f64 = 0.0;
/// Pixel scale factor: unit scale.
pub const UNIT_SCALE: f64 = 1.0;

/// Pinhole-style intrinsics as consumed by the marker detector.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub width: u32,
    pub height: u32,
    /// Principal point, pixels.
    pub cx: f64,
    pub cy: f64,
    pub distortion: f64,
    pub scale: f64,
}

impl CameraIntrinsics {
    /// Principal point at the (integer) frame centre, no distortion, unit scale.
    pub fn from_frame_size(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cx: (width / 2) as f64,
            cy: (height / 2) as f64,
            distortion: NO_DISTORTION,
            scale: UNIT_SCALE,
        }
    }
}

/// Write-once holder for the intrinsics.
///
/// The first successful [`CalibrationState::calibrate`] fixes the model for
/// the lifetime of the state; later calls return the stored value even when
/// the frame size differs.
#[derive(Debug, Default)]
pub struct CalibrationState {
    intrinsics: OnceCell<CameraIntrinsics>,
}

impl CalibrationState {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self) -> Option<&CameraIntrinsics> {
        self.intrinsics.get()
    }

    #[inline]
    pub fn is_calibrated(&self) -> bool {
        self.intrinsics.get().is_some()
    }

    /// Return the intrinsics, deriving them from `width`/`height` if unset.
    ///
    /// The flag is `true` only on the call that performed the derivation.
    pub fn calibrate(&self, width: u32, height: u32) -> (&CameraIntrinsics, bool) {
        let mut fresh = false;
        let intrinsics = self.intrinsics.get_or_init(|| {
            fresh = true;
            CameraIntrinsics::from_frame_size(width, height)
        });
        (intrinsics, fresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn principal_point_is_integer_centre() {
        let k = CameraIntrinsics::from_frame_size(641, 480);
        assert_eq!(k.cx, 320.0);
        assert_eq!(k.cy, 240.0);
        assert_eq!(k.distortion, NO_DISTORTION);
        assert_eq!(k.scale, UNIT_SCALE);
    }

    #[test]
    fn calibration_is_write_once() {
        let state = CalibrationState::new();
        assert!(!state.is_calibrated());

        let (first, fresh) = state.calibrate(640, 480);
        let first = *first;
        assert!(fresh);

        let (second, fresh) = state.calibrate(320, 240);
        assert!(!fresh);
        assert_eq!(*second, first);
        assert_eq!(state.get().map(|k| k.width), Some(640));
    }
}
