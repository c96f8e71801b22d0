//! Robot-native telemetry messages and their delivery.
//!
//! A message is the world-frame position of a marker in centimetres plus its
//! heading in degrees, rendered as `name;x;y;theta`. All three numbers are
//! truncated toward zero. Headings within [`DEG_SNAP`] of a whole degree
//! count as that degree, so a quaternion round trip cannot drop one.

use std::fmt;
use std::str::FromStr;

use log::{debug, warn};
use marker_telemetry_bluetooth::{BluetoothLink, BluetoothSession, SessionError};
use marker_telemetry_core::Pose;
use serde::{Deserialize, Serialize};

const CM_PER_M: f64 = 100.0;
const DEG_PER_RAD: f64 = 180.0 / std::f64::consts::PI;

/// Distance to a whole degree treated as rounding noise.
pub const DEG_SNAP: f64 = 1e-9;

fn truncate_degrees(deg: f64) -> i32 {
    let whole = deg.round();
    if (deg - whole).abs() <= DEG_SNAP {
        whole as i32
    } else {
        deg as i32
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TelemetryParseError {
    #[error("expected 4 ';'-separated fields, got {0}")]
    FieldCount(usize),
    #[error("field {field} is not an integer: {value:?}")]
    Integer { field: &'static str, value: String },
    #[error("marker name is empty")]
    EmptyName,
}

/// Planar marker pose in robot units.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryMessage {
    pub name: String,
    pub x_cm: i32,
    pub y_cm: i32,
    pub theta_deg: i32,
}

impl TelemetryMessage {
    /// Quantize metres and radians.
    pub fn from_planar(name: impl Into<String>, x_m: f64, y_m: f64, yaw_rad: f64) -> Self {
        Self {
            name: name.into(),
            x_cm: (x_m * CM_PER_M) as i32,
            y_cm: (y_m * CM_PER_M) as i32,
            theta_deg: truncate_degrees(yaw_rad * DEG_PER_RAD),
        }
    }

    /// Quantize a world-frame pose: x, y and yaw about +z.
    pub fn from_world_pose(name: impl Into<String>, pose: &Pose) -> Self {
        Self::from_planar(name, pose.position.x, pose.position.y, pose.yaw())
    }
}

impl fmt::Display for TelemetryMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{};{};{};{}",
            self.name, self.x_cm, self.y_cm, self.theta_deg
        )
    }
}

impl FromStr for TelemetryMessage {
    type Err = TelemetryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split(';').collect();
        let [name, x, y, theta] = fields.as_slice() else {
            return Err(TelemetryParseError::FieldCount(fields.len()));
        };
        if name.is_empty() {
            return Err(TelemetryParseError::EmptyName);
        }
        let int = |field: &'static str, value: &str| {
            value
                .trim()
                .parse::<i32>()
                .map_err(|_| TelemetryParseError::Integer {
                    field,
                    value: value.to_string(),
                })
        };
        Ok(Self {
            name: name.to_string(),
            x_cm: int("x", x)?,
            y_cm: int("y", y)?,
            theta_deg: int("theta", theta)?,
        })
    }
}

/// Destination for rendered telemetry.
pub trait TelemetrySink {
    fn send(&self, channel: u8, payload: &str) -> Result<(), SessionError>;
}

impl<L: BluetoothLink> TelemetrySink for BluetoothSession<L> {
    fn send(&self, channel: u8, payload: &str) -> Result<(), SessionError> {
        BluetoothSession::send(self, channel, payload)
    }
}

impl<T: TelemetrySink + ?Sized> TelemetrySink for Box<T> {
    fn send(&self, channel: u8, payload: &str) -> Result<(), SessionError> {
        (**self).send(channel, payload)
    }
}

/// Renders messages and hands them to a sink on a fixed channel.
pub struct TelemetryPublisher {
    channel: u8,
    sink: Box<dyn TelemetrySink + Send>,
}

impl TelemetryPublisher {
    pub fn new(channel: u8, sink: impl TelemetrySink + Send + 'static) -> Self {
        Self {
            channel,
            sink: Box::new(sink),
        }
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// Send one message; failures are logged and reported as `false`.
    pub fn publish(&self, message: &TelemetryMessage) -> bool {
        let payload = message.to_string();
        debug!("Sending message: {payload}");
        match self.sink.send(self.channel, &payload) {
            Ok(()) => true,
            Err(err) => {
                warn!("telemetry for {} not delivered: {err}", message.name);
                false
            }
        }
    }
}

impl fmt::Debug for TelemetryPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelemetryPublisher")
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marker_telemetry_bluetooth::{DeviceInfo, LoopbackLink, Selection};
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn quantizes_by_truncation() {
        let msg = TelemetryMessage::from_planar("robot", 1.236, -0.501, FRAC_PI_2);
        assert_eq!(msg.x_cm, 123);
        assert_eq!(msg.y_cm, -50);
        assert_eq!(msg.theta_deg, 90);
        assert_eq!(msg.to_string(), "robot;123;-50;90");
    }

    #[test]
    fn world_pose_quarter_turn_is_ninety_degrees() {
        let pose = Pose::planar(1.236, -0.501, FRAC_PI_2);
        let msg = TelemetryMessage::from_world_pose("r", &pose);
        assert_eq!(msg.to_string(), "r;123;-50;90");
    }

    #[test]
    fn whole_degree_headings_survive_the_quaternion() {
        for deg in -179..=180 {
            let yaw = f64::from(deg).to_radians();
            let from_pose = TelemetryMessage::from_world_pose("r", &Pose::planar(0.0, 0.0, yaw));
            let direct = TelemetryMessage::from_planar("r", 0.0, 0.0, yaw);
            assert_eq!(from_pose.theta_deg, deg, "heading {deg} via pose");
            assert_eq!(direct.theta_deg, deg, "heading {deg} direct");
        }
    }

    #[test]
    fn fractional_headings_still_truncate() {
        assert_eq!(TelemetryMessage::from_planar("r", 0.0, 0.0, 0.5).theta_deg, 28);
        assert_eq!(TelemetryMessage::from_planar("r", 0.0, 0.0, -0.5).theta_deg, -28);
        let almost = (90.0 - 1e-6_f64).to_radians();
        assert_eq!(TelemetryMessage::from_planar("r", 0.0, 0.0, almost).theta_deg, 89);
    }

    #[test]
    fn world_pose_uses_heading_about_z() {
        let pose = Pose::planar(0.255, 1.999, 0.5);
        let msg = TelemetryMessage::from_world_pose("cup", &pose);
        assert_eq!(msg.to_string(), "cup;25;199;28");
    }

    #[test]
    fn parses_its_own_rendering() {
        let msg = TelemetryMessage::from_planar("robot", -0.42, 3.0, -1.0);
        let parsed: TelemetryMessage = msg.to_string().parse().expect("parse");
        assert_eq!(parsed, msg);
    }

    #[test]
    fn rejects_malformed_text() {
        assert_eq!(
            "robot;1;2".parse::<TelemetryMessage>(),
            Err(TelemetryParseError::FieldCount(3))
        );
        assert_eq!(
            ";1;2;3".parse::<TelemetryMessage>(),
            Err(TelemetryParseError::EmptyName)
        );
        assert!(matches!(
            "robot;1;two;3".parse::<TelemetryMessage>(),
            Err(TelemetryParseError::Integer { field: "y", .. })
        ));
    }

    #[test]
    fn publisher_reports_undelivered_messages() {
        let link = LoopbackLink::new(vec![DeviceInfo::new("00:16:53:00:00:01", "NXT")]);
        let outbox = link.outbox();
        let mut session = BluetoothSession::new(link);

        // Not connected yet: the send fails but is not fatal.
        let msg = TelemetryMessage::from_planar("robot", 0.1, 0.2, 0.0);
        let idle = TelemetryPublisher::new(0, BluetoothSession::new(LoopbackLink::new(Vec::new())));
        assert!(!idle.publish(&msg));

        session.scan().expect("scan");
        session.select(Selection::Device(0)).expect("connect");
        let publisher = TelemetryPublisher::new(0, session);
        assert!(publisher.publish(&msg));
        assert_eq!(outbox.payloads(), ["robot;10;20;0"]);
    }
}
