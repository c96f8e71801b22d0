//! Device selection strategies.

use std::io::{self, BufRead, Stdin, StdinLock, Stdout, Write};

use crate::DeviceInfo;

/// Outcome of presenting the discovered devices to a selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Selection {
    /// Scan again.
    Rescan,
    /// Connect to `candidates[i]`.
    Device(usize),
    /// Give up pairing.
    Cancel,
}

/// Chooses a device out of a discovery result.
pub trait DeviceSelector {
    fn choose(&mut self, candidates: &[DeviceInfo]) -> Selection;
}

impl<F> DeviceSelector for F
where
    F: FnMut(&[DeviceInfo]) -> Selection,
{
    fn choose(&mut self, candidates: &[DeviceInfo]) -> Selection {
        self(candidates)
    }
}

/// Interactive menu on a text console.
///
/// Option `0` rescans, `1..=n` pick a device. Anything else rescans as well;
/// end of input cancels.
pub struct ConsoleSelector<R, W> {
    input: R,
    output: W,
}

impl ConsoleSelector<StdinLock<'static>, Stdout> {
    pub fn stdio() -> Self {
        let stdin: Stdin = io::stdin();
        Self::new(stdin.lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsoleSelector<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn print_menu(&mut self, candidates: &[DeviceInfo]) -> io::Result<()> {
        writeln!(self.output, "Available bluetooth devices:")?;
        writeln!(self.output)?;
        writeln!(self.output, "   (0) search again for bluetooth devices")?;
        for (i, device) in candidates.iter().enumerate() {
            writeln!(
                self.output,
                "   ({}) {} --- {}",
                i + 1,
                device.address,
                device.name
            )?;
        }
        write!(
            self.output,
            "\nPlease select an option (0 - {}): ",
            candidates.len()
        )?;
        self.output.flush()
    }
}

impl<R: BufRead, W: Write> DeviceSelector for ConsoleSelector<R, W> {
    fn choose(&mut self, candidates: &[DeviceInfo]) -> Selection {
        if self.print_menu(candidates).is_err() {
            return Selection::Cancel;
        }
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => Selection::Cancel,
            Ok(_) => match line.trim().parse::<usize>() {
                Ok(k) if (1..=candidates.len()).contains(&k) => Selection::Device(k - 1),
                _ => Selection::Rescan,
            },
        }
    }
}

/// Non-interactive selection of a known address.
///
/// Rescans until the address shows up, cancelling after `max_scans`
/// discovery rounds without it.
#[derive(Clone, Debug)]
pub struct AddressSelector {
    address: String,
    max_scans: usize,
    scans: usize,
}

impl AddressSelector {
    pub fn new(address: impl Into<String>, max_scans: usize) -> Self {
        Self {
            address: address.into(),
            max_scans: max_scans.max(1),
            scans: 0,
        }
    }
}

impl DeviceSelector for AddressSelector {
    fn choose(&mut self, candidates: &[DeviceInfo]) -> Selection {
        self.scans += 1;
        if let Some(i) = candidates
            .iter()
            .position(|d| d.address.eq_ignore_ascii_case(&self.address))
        {
            return Selection::Device(i);
        }
        if self.scans >= self.max_scans {
            Selection::Cancel
        } else {
            Selection::Rescan
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn devices() -> Vec<DeviceInfo> {
        vec![
            DeviceInfo::new("00:16:53:09:BD:4B", "NXT"),
            DeviceInfo::new("00:16:53:0A:11:22", "NXT2"),
        ]
    }

    #[test]
    fn console_maps_menu_choices() {
        let mut sel = ConsoleSelector::new(Cursor::new("2\n0\n7\nabc\n"), Vec::new());
        assert_eq!(sel.choose(&devices()), Selection::Device(1));
        assert_eq!(sel.choose(&devices()), Selection::Rescan);
        assert_eq!(sel.choose(&devices()), Selection::Rescan);
        assert_eq!(sel.choose(&devices()), Selection::Rescan);
        assert_eq!(sel.choose(&devices()), Selection::Cancel);
    }

    #[test]
    fn console_prints_numbered_menu() {
        let mut sel = ConsoleSelector::new(Cursor::new("1\n"), Vec::new());
        sel.choose(&devices());
        let out = String::from_utf8(sel.into_output()).expect("utf8");
        assert!(out.contains("(0) search again for bluetooth devices"));
        assert!(out.contains("(1) 00:16:53:09:BD:4B --- NXT"));
        assert!(out.contains("(0 - 2)"));
    }

    #[test]
    fn address_selector_rescans_then_cancels() {
        let mut sel = AddressSelector::new("00:16:53:0a:11:22", 2);
        assert_eq!(sel.choose(&[]), Selection::Rescan);
        assert_eq!(sel.choose(&devices()), Selection::Device(1));

        let mut sel = AddressSelector::new("ff:ff:ff:ff:ff:ff", 2);
        assert_eq!(sel.choose(&devices()), Selection::Rescan);
        assert_eq!(sel.choose(&devices()), Selection::Cancel);
    }
}
