use serde::{Deserialize, Serialize};

use crate::LinkError;

/// A discovered peer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub address: String,
    pub name: String,
}

impl DeviceInfo {
    pub fn new(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
        }
    }
}

/// Radio-level operations the session drives.
///
/// Sends are message-oriented: one call is one message on the wire.
pub trait BluetoothLink {
    /// Scan for peers; an empty list is a valid outcome.
    fn discover(&mut self) -> Result<Vec<DeviceInfo>, LinkError>;

    fn connect(&mut self, address: &str) -> Result<(), LinkError>;

    /// Fire-and-forget write of `payload` to mailbox `channel`.
    fn send(&mut self, channel: u8, payload: &str) -> Result<(), LinkError>;

    /// Close the connection; must be safe to call when nothing is open.
    fn disconnect(&mut self);
}

impl<L: BluetoothLink + ?Sized> BluetoothLink for Box<L> {
    fn discover(&mut self) -> Result<Vec<DeviceInfo>, LinkError> {
        (**self).discover()
    }

    fn connect(&mut self, address: &str) -> Result<(), LinkError> {
        (**self).connect(address)
    }

    fn send(&mut self, channel: u8, payload: &str) -> Result<(), LinkError> {
        (**self).send(channel, payload)
    }

    fn disconnect(&mut self) {
        (**self).disconnect()
    }
}
