//! Link over bound rfcomm character devices (`rfcomm bind N <addr>`).

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use log::debug;

use crate::nxt::encode_message_write;
use crate::{BluetoothLink, DeviceInfo, LinkError};

/// Discovers `rfcomm*` nodes in a device directory and writes NXT
/// mailbox telegrams to the opened node.
#[derive(Debug)]
pub struct RfcommLink {
    device_dir: PathBuf,
    port: Option<File>,
}

impl Default for RfcommLink {
    fn default() -> Self {
        Self::new("/dev")
    }
}

impl RfcommLink {
    pub fn new(device_dir: impl Into<PathBuf>) -> Self {
        Self {
            device_dir: device_dir.into(),
            port: None,
        }
    }

    pub fn device_dir(&self) -> &Path {
        &self.device_dir
    }

    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }
}

impl BluetoothLink for RfcommLink {
    fn discover(&mut self) -> Result<Vec<DeviceInfo>, LinkError> {
        let mut found = Vec::new();
        for entry in fs::read_dir(&self.device_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with("rfcomm") {
                found.push(DeviceInfo::new(entry.path().display().to_string(), name));
            }
        }
        found.sort_by(|a, b| a.address.cmp(&b.address));
        debug!("found {} rfcomm node(s) in {}", found.len(), self.device_dir.display());
        Ok(found)
    }

    fn connect(&mut self, address: &str) -> Result<(), LinkError> {
        let port = OpenOptions::new().read(true).write(true).open(address)?;
        self.port = Some(port);
        Ok(())
    }

    fn send(&mut self, channel: u8, payload: &str) -> Result<(), LinkError> {
        let port = self.port.as_mut().ok_or(LinkError::NotOpen)?;
        let frame = encode_message_write(channel, payload)?;
        port.write_all(&frame)?;
        port.flush()?;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.port = None;
    }
}
