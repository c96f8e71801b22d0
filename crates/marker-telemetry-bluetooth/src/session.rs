//! Pairing/connection lifecycle for a single physical link.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use log::{error, info, warn};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{BluetoothLink, DeviceInfo, DeviceSelector, Selection, SessionError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Disconnected,
    Scanning,
    AwaitingSelection,
    Connecting,
    Connected,
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Scanning => "scanning",
            SessionState::AwaitingSelection => "awaiting selection",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Exclusive owner of one Bluetooth link.
///
/// The link is closed when the session is dropped, so every exit path
/// releases the device. Sends go through an internal lock and are therefore
/// serialised even when the session is shared between threads.
pub struct BluetoothSession<L: BluetoothLink> {
    link: Mutex<L>,
    state: SessionState,
    candidates: Vec<DeviceInfo>,
    device: Option<DeviceInfo>,
}

impl<L: BluetoothLink> BluetoothSession<L> {
    pub fn new(link: L) -> Self {
        Self {
            link: Mutex::new(link),
            state: SessionState::Disconnected,
            candidates: Vec::new(),
            device: None,
        }
    }

    #[inline]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Devices found by the most recent scan.
    #[inline]
    pub fn candidates(&self) -> &[DeviceInfo] {
        &self.candidates
    }

    /// The connected peer, if any.
    #[inline]
    pub fn device(&self) -> Option<&DeviceInfo> {
        self.device.as_ref()
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    fn link_mut(&mut self) -> &mut L {
        self.link.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run discovery and move to `AwaitingSelection`.
    ///
    /// A failing scan is logged and treated as an empty result.
    pub fn scan(&mut self) -> Result<&[DeviceInfo], SessionError> {
        let state = self.state;
        match state {
            SessionState::Connecting | SessionState::Connected => {
                return Err(SessionError::InvalidState {
                    operation: "scan",
                    state,
                })
            }
            SessionState::Failed => self.disconnect(),
            _ => {}
        }

        self.state = SessionState::Scanning;
        info!("pending for bluetooth devices ...");
        let found = match self.link_mut().discover() {
            Ok(found) => found,
            Err(err) => {
                warn!("device discovery failed: {err}");
                Vec::new()
            }
        };
        info!("discovery finished with {} device(s)", found.len());
        self.candidates = found;
        self.state = SessionState::AwaitingSelection;
        Ok(&self.candidates)
    }

    /// Apply a selection made against the current candidates.
    ///
    /// Returns the resulting state: `Scanning` after a rescan request (or an
    /// out-of-range index), `Connected` after a successful connect.
    pub fn select(&mut self, selection: Selection) -> Result<SessionState, SessionError> {
        if self.state != SessionState::AwaitingSelection {
            return Err(SessionError::InvalidState {
                operation: "select a device",
                state: self.state,
            });
        }

        match selection {
            Selection::Rescan => {
                self.state = SessionState::Scanning;
                Ok(self.state)
            }
            Selection::Cancel => {
                self.state = SessionState::Disconnected;
                Err(SessionError::SelectionCancelled)
            }
            Selection::Device(i) => {
                let Some(device) = self.candidates.get(i).cloned() else {
                    warn!(
                        "selection {} out of range (0 - {}), searching again",
                        i + 1,
                        self.candidates.len()
                    );
                    self.state = SessionState::Scanning;
                    return Ok(self.state);
                };
                self.connect(device)?;
                Ok(self.state)
            }
        }
    }

    fn connect(&mut self, device: DeviceInfo) -> Result<(), SessionError> {
        self.state = SessionState::Connecting;
        info!(
            "try to connect to bluetooth device: {} ({}) ...",
            device.address, device.name
        );
        match self.link_mut().connect(&device.address) {
            Ok(()) => {
                info!("connected to {}", device.address);
                self.device = Some(device);
                self.state = SessionState::Connected;
                Ok(())
            }
            Err(source) => {
                error!("could not connect to device {}: {source}", device.address);
                self.state = SessionState::Failed;
                Err(SessionError::ConnectFailed {
                    address: device.address,
                    source,
                })
            }
        }
    }

    /// Full discovery/selection/connect handshake.
    ///
    /// Scans, asks `selector`, and repeats until a device is connected, the
    /// selector cancels, or a connect attempt fails.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip_all))]
    pub fn pair(&mut self, selector: &mut dyn DeviceSelector) -> Result<(), SessionError> {
        loop {
            if self.state != SessionState::AwaitingSelection {
                self.scan()?;
            }
            let choice = selector.choose(&self.candidates);
            if self.select(choice)? == SessionState::Connected {
                return Ok(());
            }
        }
    }

    /// Fire-and-forget send on the connected link.
    pub fn send(&self, channel: u8, message: &str) -> Result<(), SessionError> {
        if self.state != SessionState::Connected {
            return Err(SessionError::NotConnected { state: self.state });
        }
        let mut link = self.link.lock().unwrap_or_else(PoisonError::into_inner);
        link.send(channel, message).map_err(SessionError::Send)
    }

    /// Close the link and return to `Disconnected`. Idempotent.
    pub fn disconnect(&mut self) {
        let was_open = matches!(
            self.state,
            SessionState::Connecting | SessionState::Connected | SessionState::Failed
        );
        if was_open {
            self.link_mut().disconnect();
            if let Some(device) = self.device.take() {
                info!("disconnected from {}", device.address);
            }
        }
        self.state = SessionState::Disconnected;
    }

    /// Borrow the underlying link, e.g. to inspect a test double.
    pub fn with_link<R>(&self, f: impl FnOnce(&L) -> R) -> R {
        let link = self.link.lock().unwrap_or_else(PoisonError::into_inner);
        f(&link)
    }
}

impl<L: BluetoothLink> Drop for BluetoothSession<L> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl<L: BluetoothLink> fmt::Debug for BluetoothSession<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BluetoothSession")
            .field("state", &self.state)
            .field("device", &self.device)
            .field("candidates", &self.candidates.len())
            .finish()
    }
}
