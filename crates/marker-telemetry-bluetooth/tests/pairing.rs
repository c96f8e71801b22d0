use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use marker_telemetry_bluetooth::{
    BluetoothLink, BluetoothSession, ConsoleSelector, DeviceInfo, LinkError, LoopbackLink,
    SessionError, SessionState,
};

/// Link that counts disconnects through a shared counter.
struct CountingLink {
    connected: bool,
    disconnects: Arc<AtomicUsize>,
}

impl BluetoothLink for CountingLink {
    fn discover(&mut self) -> Result<Vec<DeviceInfo>, LinkError> {
        Ok(vec![DeviceInfo::new("00:16:53:09:BD:4B", "NXT")])
    }

    fn connect(&mut self, _address: &str) -> Result<(), LinkError> {
        self.connected = true;
        Ok(())
    }

    fn send(&mut self, _channel: u8, _payload: &str) -> Result<(), LinkError> {
        if self.connected {
            Ok(())
        } else {
            Err(LinkError::NotOpen)
        }
    }

    fn disconnect(&mut self) {
        if std::mem::take(&mut self.connected) {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[test]
fn console_pairing_rescans_until_a_device_is_chosen() {
    let link = LoopbackLink::new(vec![
        DeviceInfo::new("00:16:53:09:BD:4B", "NXT"),
        DeviceInfo::new("00:16:53:0A:11:22", "NXT2"),
    ])
    .empty_scans(1);
    let outbox = link.outbox();
    let mut session = BluetoothSession::new(link);

    // empty scan -> "1" is out of range and rescans; "0" rescans; "2" connects.
    let mut selector = ConsoleSelector::new(Cursor::new("1\n0\n2\n"), Vec::new());
    session.pair(&mut selector).expect("pair");

    assert_eq!(session.state(), SessionState::Connected);
    assert_eq!(
        session.device().map(|d| d.address.as_str()),
        Some("00:16:53:0A:11:22")
    );

    session.send(0, "robot_a;12;-3;45").expect("send");
    let sent = outbox.messages();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].address, "00:16:53:0A:11:22");
    assert_eq!(sent[0].channel, 0);
}

#[test]
fn console_end_of_input_cancels() {
    let mut session = BluetoothSession::new(LoopbackLink::new(Vec::new()));
    let mut selector = ConsoleSelector::new(Cursor::new("0\n"), Vec::new());
    let err = session.pair(&mut selector).unwrap_err();
    assert!(matches!(err, SessionError::SelectionCancelled));
}

#[test]
fn dropping_the_session_releases_the_link_once() {
    let disconnects = Arc::new(AtomicUsize::new(0));
    {
        let mut session = BluetoothSession::new(CountingLink {
            connected: false,
            disconnects: Arc::clone(&disconnects),
        });
        session
            .pair(&mut |_: &[DeviceInfo]| marker_telemetry_bluetooth::Selection::Device(0))
            .expect("pair");
        session.send(0, "robot;0;0;0").expect("send");
    }
    assert_eq!(disconnects.load(Ordering::SeqCst), 1);
}

#[test]
fn sends_from_several_threads_are_serialised() {
    let link = LoopbackLink::new(vec![DeviceInfo::new("00:16:53:09:BD:4B", "NXT")]);
    let outbox = link.outbox();
    let mut session = BluetoothSession::new(link);
    session
        .pair(&mut |_: &[DeviceInfo]| marker_telemetry_bluetooth::Selection::Device(0))
        .expect("pair");

    std::thread::scope(|s| {
        for t in 0..4 {
            let session = &session;
            s.spawn(move || {
                for i in 0..10 {
                    session.send(0, &format!("r{t};{i};0;0")).expect("send");
                }
            });
        }
    });

    assert_eq!(outbox.messages().len(), 40);
}
