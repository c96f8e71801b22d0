//! Bluetooth link to the robot consuming marker telemetry.
//!
//! The session owns one physical link and walks it through
//! discovery -> selection -> connect -> send -> disconnect:
//!
//! ```text
//! Disconnected --scan--> Scanning --> AwaitingSelection --Device(i)--> Connecting --> Connected
//!                           ^                 |                            |
//!                           +-----Rescan------+                            +--> Failed
//! ```
//!
//! Device choice is delegated to a [`DeviceSelector`], so the interactive
//! console prompt and scripted selections share the same state machine.
//! Concrete links: [`RfcommLink`] (bound rfcomm character devices) and
//! [`LoopbackLink`] (in-memory, for dry runs and tests).

mod error;
mod link;
mod loopback;
pub mod nxt;
mod rfcomm;
mod selector;
mod session;

pub use error::{LinkError, SessionError};
pub use link::{BluetoothLink, DeviceInfo};
pub use loopback::{LoopbackLink, Outbox, SentMessage};
pub use rfcomm::RfcommLink;
pub use selector::{AddressSelector, ConsoleSelector, DeviceSelector, Selection};
pub use session::{BluetoothSession, SessionState};
