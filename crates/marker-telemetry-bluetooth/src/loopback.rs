//! In-memory link used for dry runs and tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use crate::nxt::encode_message_write;
use crate::{BluetoothLink, DeviceInfo, LinkError};

/// One message accepted by a [`LoopbackLink`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentMessage {
    pub address: String,
    pub channel: u8,
    pub payload: String,
    /// Bytes as they would have gone over the air.
    pub frame: Vec<u8>,
}

/// Shared view of everything a [`LoopbackLink`] sent.
#[derive(Clone, Debug, Default)]
pub struct Outbox {
    inner: Arc<Mutex<Vec<SentMessage>>>,
}

impl Outbox {
    pub fn messages(&self) -> Vec<SentMessage> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn payloads(&self) -> Vec<String> {
        self.messages().into_iter().map(|m| m.payload).collect()
    }

    fn push(&self, msg: SentMessage) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(msg);
    }
}

/// Link that "discovers" a fixed device list and records sends.
#[derive(Debug, Default)]
pub struct LoopbackLink {
    devices: Vec<DeviceInfo>,
    refused: HashSet<String>,
    failing_scans: usize,
    empty_scans: usize,
    connected: Option<String>,
    outbox: Outbox,
    disconnects: usize,
}

impl LoopbackLink {
    pub fn new(devices: Vec<DeviceInfo>) -> Self {
        Self {
            devices,
            ..Self::default()
        }
    }

    /// Refuse connections to `address`.
    pub fn refusing(mut self, address: impl Into<String>) -> Self {
        self.refused.insert(address.into());
        self
    }

    /// Make the first `n` scans fail with a device error.
    pub fn failing_scans(mut self, n: usize) -> Self {
        self.failing_scans = n;
        self
    }

    /// Make the first `n` successful scans return nothing.
    pub fn empty_scans(mut self, n: usize) -> Self {
        self.empty_scans = n;
        self
    }

    pub fn outbox(&self) -> Outbox {
        self.outbox.clone()
    }

    pub fn connected_address(&self) -> Option<&str> {
        self.connected.as_deref()
    }

    /// Number of times `disconnect` closed an open connection.
    pub fn disconnect_count(&self) -> usize {
        self.disconnects
    }
}

impl BluetoothLink for LoopbackLink {
    fn discover(&mut self) -> Result<Vec<DeviceInfo>, LinkError> {
        if self.failing_scans > 0 {
            self.failing_scans -= 1;
            return Err(LinkError::Device("inquiry failed".to_string()));
        }
        if self.empty_scans > 0 {
            self.empty_scans -= 1;
            return Ok(Vec::new());
        }
        Ok(self.devices.clone())
    }

    fn connect(&mut self, address: &str) -> Result<(), LinkError> {
        if self.refused.contains(address) || !self.devices.iter().any(|d| d.address == address) {
            return Err(LinkError::Device(format!("host {address} is down")));
        }
        self.connected = Some(address.to_string());
        Ok(())
    }

    fn send(&mut self, channel: u8, payload: &str) -> Result<(), LinkError> {
        let address = self.connected.clone().ok_or(LinkError::NotOpen)?;
        let frame = encode_message_write(channel, payload)?;
        self.outbox.push(SentMessage {
            address,
            channel,
            payload: payload.to_string(),
            frame,
        });
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.connected.take().is_some() {
            self.disconnects += 1;
        }
    }
}
