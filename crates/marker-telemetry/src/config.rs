//! JSON configuration for the telemetry node.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::info;
use serde::{Deserialize, Serialize};

/// Environment variable overriding the install directory.
pub const HOME_ENV: &str = "MARKER_TELEMETRY_HOME";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Directory default data paths are derived from.
pub fn install_dir() -> PathBuf {
    std::env::var_os(HOME_ENV)
        .map(PathBuf::from)
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

fn default_catalog_path() -> PathBuf {
    install_dir().join("data").join("objects_kinect")
}

/// Node options. Every field is optional in JSON.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Send quantized world poses over the Bluetooth link.
    pub publish_to_telemetry_link: bool,
    /// Broadcast a stamped camera -> marker transform per marker.
    pub publish_transforms: bool,
    /// Emit a debug cube per marker.
    pub publish_visual_markers: bool,
    /// Emit the per-frame list of marker poses.
    pub publish_marker_list: bool,
    /// Detector binarisation threshold.
    pub threshold: i32,
    pub pattern_catalog_path: PathBuf,
    pub pattern_data_dir: PathBuf,
    pub world_frame: String,
    /// Longest wait for a world-frame lookup, seconds.
    pub transform_timeout_s: f64,
    /// NXT mailbox receiving telemetry.
    pub telemetry_channel: u8,
    /// Pair with this address without prompting.
    pub preferred_device: Option<String>,
    /// Discovery rounds before giving up on `preferred_device`.
    pub max_scans: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            publish_to_telemetry_link: true,
            publish_transforms: true,
            publish_visual_markers: true,
            publish_marker_list: true,
            threshold: 100,
            pattern_catalog_path: default_catalog_path(),
            pattern_data_dir: install_dir(),
            world_frame: "world".to_string(),
            transform_timeout_s: 1.0,
            telemetry_channel: 0,
            preferred_device: None,
            max_scans: 5,
        }
    }
}

impl PipelineConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// World lookup timeout; invalid values fall back to one second.
    pub fn transform_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.transform_timeout_s).unwrap_or(Duration::from_secs(1))
    }

    /// Echo the effective configuration at `info` level.
    pub fn log_summary(&self) {
        info!("\tPublish to bluetooth: {}", self.publish_to_telemetry_link);
        info!("\tPublish transforms: {}", self.publish_transforms);
        info!("\tPublish visual markers: {}", self.publish_visual_markers);
        info!("\tPublish marker list: {}", self.publish_marker_list);
        info!("\tThreshold: {}", self.threshold);
        info!(
            "Marker Pattern Filename: {}",
            self.pattern_catalog_path.display()
        );
        info!("Marker Data Directory: {}", self.pattern_data_dir.display());
        info!(
            "World frame: {} (timeout {:?})",
            self.world_frame,
            self.transform_timeout()
        );
        match &self.preferred_device {
            Some(address) => info!(
                "Preferred device: {address} (mailbox {}, up to {} scans)",
                self.telemetry_channel, self.max_scans
            ),
            None => info!(
                "Interactive device selection (mailbox {})",
                self.telemetry_channel
            ),
        }
    }
}
