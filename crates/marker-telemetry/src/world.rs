//! Sensor-frame to world-frame conversion.
//!
//! The world lookup is a collaborator: [`StaticWorldTransforms`] serves fixed
//! mounts loaded from JSON, [`TransformBuffer`] serves time-stamped samples
//! fed by another thread and blocks until a lookup can be answered.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use log::debug;
use marker_telemetry_core::Pose;
use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TransformUnavailable {
    #[error("no transform from {frame:?} to the world frame")]
    UnknownFrame { frame: String },
    #[error("transform from {frame:?} at t={stamp:.3} not available within {timeout:?}")]
    Timeout {
        frame: String,
        stamp: f64,
        timeout: Duration,
    },
}

/// World-frame lookup.
pub trait WorldTransform {
    /// Pose of `source_frame` in the world frame at `stamp`, waiting at most
    /// `timeout` for it to become available.
    fn lookup(
        &self,
        source_frame: &str,
        stamp: f64,
        timeout: Duration,
    ) -> Result<Pose, TransformUnavailable>;
}

impl<T: WorldTransform + ?Sized> WorldTransform for Box<T> {
    fn lookup(
        &self,
        source_frame: &str,
        stamp: f64,
        timeout: Duration,
    ) -> Result<Pose, TransformUnavailable> {
        (**self).lookup(source_frame, stamp, timeout)
    }
}

impl<T: WorldTransform + ?Sized> WorldTransform for Arc<T> {
    fn lookup(
        &self,
        source_frame: &str,
        stamp: f64,
        timeout: Duration,
    ) -> Result<Pose, TransformUnavailable> {
        (**self).lookup(source_frame, stamp, timeout)
    }
}

fn normalize_frame(frame: &str) -> &str {
    frame.trim_start_matches('/')
}

/// Mount of one sensor frame in the world, as written in JSON.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountSpec {
    /// Metres.
    pub translation: [f64; 3],
    /// Roll, pitch, yaw in radians.
    pub rpy: [f64; 3],
}

impl MountSpec {
    pub fn to_pose(&self) -> Pose {
        let [x, y, z] = self.translation;
        let [roll, pitch, yaw] = self.rpy;
        Pose::new(
            Vector3::new(x, y, z),
            UnitQuaternion::from_euler_angles(roll, pitch, yaw),
        )
    }
}

/// Fixed, time-independent sensor mounts.
#[derive(Clone, Debug, Default)]
pub struct StaticWorldTransforms {
    mounts: HashMap<String, Pose>,
}

impl StaticWorldTransforms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a `{ "frame": { "translation": [..], "rpy": [..] } }` map.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let specs: HashMap<String, MountSpec> = serde_json::from_str(&raw)?;
        let mut out = Self::new();
        for (frame, spec) in specs {
            out.insert(&frame, spec.to_pose());
        }
        Ok(out)
    }

    pub fn insert(&mut self, frame: &str, world_from_frame: Pose) {
        self.mounts
            .insert(normalize_frame(frame).to_string(), world_from_frame);
    }

    pub fn len(&self) -> usize {
        self.mounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }
}

impl WorldTransform for StaticWorldTransforms {
    fn lookup(
        &self,
        source_frame: &str,
        _stamp: f64,
        _timeout: Duration,
    ) -> Result<Pose, TransformUnavailable> {
        self.mounts
            .get(normalize_frame(source_frame))
            .copied()
            .ok_or_else(|| TransformUnavailable::UnknownFrame {
                frame: source_frame.to_string(),
            })
    }
}

#[derive(Debug, Default)]
struct BufferState {
    statics: HashMap<String, Pose>,
    samples: HashMap<String, VecDeque<(f64, Pose)>>,
}

impl BufferState {
    /// Sample closest to `stamp`, once the history reaches `stamp`.
    fn answer(&self, frame: &str, stamp: f64) -> Option<Pose> {
        if let Some(pose) = self.statics.get(frame) {
            return Some(*pose);
        }
        let history = self.samples.get(frame)?;
        let (latest, _) = history.back()?;
        if *latest < stamp {
            return None;
        }
        history
            .iter()
            .min_by(|a, b| (a.0 - stamp).abs().total_cmp(&(b.0 - stamp).abs()))
            .map(|(_, pose)| *pose)
    }

    fn knows(&self, frame: &str) -> bool {
        self.statics.contains_key(frame) || self.samples.contains_key(frame)
    }
}

/// Time-stamped world transforms shared between a producer and the pipeline.
#[derive(Debug)]
pub struct TransformBuffer {
    state: Mutex<BufferState>,
    updated: Condvar,
    capacity: usize,
}

impl Default for TransformBuffer {
    fn default() -> Self {
        Self::with_capacity(100)
    }
}

impl TransformBuffer {
    /// Keep at most `capacity` samples per frame.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(BufferState::default()),
            updated: Condvar::new(),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BufferState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record `world_from_frame` at `stamp` and wake waiting lookups.
    pub fn insert(&self, frame: &str, stamp: f64, world_from_frame: Pose) {
        let mut state = self.lock();
        let history = state
            .samples
            .entry(normalize_frame(frame).to_string())
            .or_default();
        let at = history.partition_point(|(t, _)| *t <= stamp);
        history.insert(at, (stamp, world_from_frame));
        while history.len() > self.capacity {
            history.pop_front();
        }
        drop(state);
        self.updated.notify_all();
    }

    /// Record a mount valid at every stamp.
    pub fn insert_static(&self, frame: &str, world_from_frame: Pose) {
        self.lock()
            .statics
            .insert(normalize_frame(frame).to_string(), world_from_frame);
        self.updated.notify_all();
    }
}

impl WorldTransform for TransformBuffer {
    fn lookup(
        &self,
        source_frame: &str,
        stamp: f64,
        timeout: Duration,
    ) -> Result<Pose, TransformUnavailable> {
        let frame = normalize_frame(source_frame);
        // A deadline past what `Instant` can represent means wait forever.
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.lock();
        loop {
            if let Some(pose) = state.answer(frame, stamp) {
                return Ok(pose);
            }
            let Some(deadline) = deadline else {
                state = self
                    .updated
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
                continue;
            };
            let now = Instant::now();
            if now >= deadline {
                return Err(if state.knows(frame) {
                    TransformUnavailable::Timeout {
                        frame: source_frame.to_string(),
                        stamp,
                        timeout,
                    }
                } else {
                    TransformUnavailable::UnknownFrame {
                        frame: source_frame.to_string(),
                    }
                });
            }
            state = self
                .updated
                .wait_timeout(state, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
    }
}

/// Expresses sensor-frame poses in the world frame.
#[derive(Clone, Debug)]
pub struct WorldFrame {
    name: String,
    timeout: Duration,
}

impl WorldFrame {
    pub fn new(name: impl Into<String>, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            timeout,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Normalise `pose`, then compose it with the world mount of
    /// `source_frame` at `stamp`.
    pub fn to_world(
        &self,
        lookup: &dyn WorldTransform,
        pose: &Pose,
        source_frame: &str,
        stamp: f64,
    ) -> Result<Pose, TransformUnavailable> {
        let pose = pose.renormalized();
        if normalize_frame(source_frame) == normalize_frame(&self.name) {
            return Ok(pose);
        }
        let world_from_source = lookup.lookup(source_frame, stamp, self.timeout)?;
        debug!("world lookup for {source_frame} at t={stamp:.3} succeeded");
        Ok(world_from_source.compose(&pose).renormalized())
    }
}
