use crate::SessionState;

/// Errors reported by a [`crate::BluetoothLink`] implementation.
#[derive(thiserror::Error, Debug)]
pub enum LinkError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("device error: {0}")]
    Device(String),
    #[error("payload of {len} bytes exceeds the {max} byte mailbox limit")]
    PayloadTooLong { len: usize, max: usize },
    #[error("payload contains a NUL byte")]
    InvalidPayload,
    #[error("mailbox {0} out of range (0-9)")]
    InvalidMailbox(u8),
    #[error("link is not open")]
    NotOpen,
}

/// Errors reported by [`crate::BluetoothSession`].
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },
    #[error("no connected device (session is {state})")]
    NotConnected { state: SessionState },
    #[error("could not connect to device {address}")]
    ConnectFailed {
        address: String,
        #[source]
        source: LinkError,
    },
    #[error("device selection cancelled")]
    SelectionCancelled,
    #[error("send failed")]
    Send(#[source] LinkError),
}
