//! Device probing
//!
//! Identification runs in at most two passes:
//!
//! 1. `read_mac` - connects to the boot ROM and reports chip model and MAC
//! 2. `flash_id` - additionally talks to the SPI flash and reports its size
//!
//! The second pass only runs when the first left the chip model or the
//! flash capacity unresolved. Replies are merged field by field; a value from
//! the second pass replaces the first only when it is more specific.
//!
//! An unresolved capacity is reported as [`FlashCapacity::Unknown`] with
//! [`Confidence::Estimated`], which [`DeviceInfo::capacity_bucket`] maps to
//! the 4 MB bucket.

use std::time::Duration;

use crate::device::{Confidence, DeviceInfo, FlashCapacity, UNKNOWN};
use crate::error::{Error, Result};
use crate::tool::{port_args, ToolOutput, ToolRunner};

/// Upper bound for a single identification pass
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Tool output fragments meaning the port or the device is unreachable
const CONNECTION_FAILURES: &[&str] = &[
    "could not open port",
    "No such file or directory",
    "Permission denied",
    "Failed to connect",
    "No serial data received",
];

/// Sizes searched for when the tool printed no explicit flash size line
const SIZE_HINTS: &[(FlashCapacity, &[&str])] = &[
    (FlashCapacity::Mb4, &["4MB", "4 MB"]),
    (FlashCapacity::Mb2, &["2MB", "2 MB"]),
    (FlashCapacity::Mb8, &["8MB", "8 MB"]),
    (FlashCapacity::Mb16, &["16MB", "16 MB"]),
];

/// Fields extracted from one identification pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeReply {
    /// Chip model
    pub chip_model: Option<String>,
    /// Chip model was guessed from an `esp32` mention, not read from a `Chip is` line
    pub chip_guessed: bool,
    /// MAC address
    pub mac_address: Option<String>,
    /// Flash capacity and how it was found
    pub flash: Option<(FlashCapacity, Confidence)>,
}

impl ProbeReply {
    /// Parse the tool's output lines
    pub fn parse(lines: &[String]) -> Self {
        let mut reply = ProbeReply::default();

        for line in lines {
            if let Some(rest) = after(line, "Chip is") {
                let model = rest.split('(').next().unwrap_or("").trim();
                if !model.is_empty() {
                    reply.chip_model = Some(model.to_string());
                }
            } else if let Some(rest) = after(line, "MAC:") {
                if !rest.is_empty() {
                    reply.mac_address = Some(rest.to_string());
                }
            } else if let Some(rest) = after(line, "Detected flash size:") {
                let capacity = FlashCapacity::parse(rest);
                if capacity != FlashCapacity::Unknown {
                    reply.flash = Some((capacity, Confidence::Measured));
                }
            }
        }

        let text = lines.join("\n");

        if reply.chip_model.is_none() && text.to_ascii_lowercase().contains("esp32") {
            reply.chip_model = Some("ESP32".to_string());
            reply.chip_guessed = true;
        }

        if reply.flash.is_none() {
            reply.flash = SIZE_HINTS
                .iter()
                .find(|(_, hints)| hints.iter().any(|h| text.contains(h)))
                .map(|(capacity, _)| (*capacity, Confidence::Estimated));
        }

        reply
    }

    /// True when another pass could still add information
    pub fn is_unresolved(&self) -> bool {
        self.chip_model.is_none()
            || !matches!(self.flash, Some((_, Confidence::Measured)))
    }

    /// Merge a later pass into this one
    ///
    /// A guessed chip model never replaces one that was read. The MAC address
    /// of the first pass is kept.
    pub fn merge(self, later: ProbeReply) -> ProbeReply {
        let flash = match (self.flash, later.flash) {
            (Some(first), Some((_, Confidence::Estimated)))
                if first.1 == Confidence::Measured =>
            {
                Some(first)
            }
            (first, later) => later.or(first),
        };

        let (chip_model, chip_guessed) = match (self.chip_model, later.chip_model) {
            (Some(first), Some(_)) if !self.chip_guessed && later.chip_guessed => {
                (Some(first), false)
            }
            (Some(first), None) => (Some(first), self.chip_guessed),
            (_, Some(second)) => (Some(second), later.chip_guessed),
            (None, None) => (None, false),
        };

        ProbeReply {
            chip_model,
            chip_guessed,
            mac_address: self.mac_address.or(later.mac_address),
            flash,
        }
    }

    /// Turn the merged reply into a [`DeviceInfo`]
    pub fn into_device_info(self) -> DeviceInfo {
        let (flash_capacity, confidence) = self
            .flash
            .unwrap_or((FlashCapacity::Unknown, Confidence::Estimated));
        DeviceInfo {
            chip_model: self.chip_model.unwrap_or_else(|| UNKNOWN.to_string()),
            mac_address: self.mac_address.unwrap_or_else(|| UNKNOWN.to_string()),
            flash_capacity,
            confidence,
        }
    }
}

fn after<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    line.find(marker)
        .map(|idx| line[idx + marker.len()..].trim())
}

fn connection_failure(port: &str, output: &ToolOutput) -> Option<Error> {
    if output.success() {
        return None;
    }
    output
        .lines
        .iter()
        .find(|line| CONNECTION_FAILURES.iter().any(|m| line.contains(m)))
        .map(|line| Error::Connection {
            port: port.to_string(),
            reason: line.trim().to_string(),
        })
}

fn run_pass<R: ToolRunner + ?Sized>(
    runner: &mut R,
    port: &str,
    command: &str,
) -> Result<ToolOutput> {
    let mut args = port_args(port);
    args.push(command.to_string());

    log::debug!("Probe pass '{}' on {}", command, port);
    let output = runner.run(&args, Some(PROBE_TIMEOUT), &mut |line| {
        log::trace!("{}", line);
    })?;
    log::debug!("'{}' exited with status {}", command, output.exit_code);
    Ok(output)
}

/// Identify the device attached to `port`
///
/// Fails with [`Error::Connection`] when the port cannot be opened or the
/// device does not answer, and with [`Error::Timeout`] when the first pass
/// exceeds [`PROBE_TIMEOUT`]. A reply that identifies nothing is not an
/// error: the returned info is degraded (see [`DeviceInfo::is_degraded`]).
pub fn probe<R: ToolRunner + ?Sized>(runner: &mut R, port: &str) -> Result<DeviceInfo> {
    let first = run_pass(runner, port, "read_mac")?;
    if let Some(err) = connection_failure(port, &first) {
        return Err(err);
    }

    let mut reply = ProbeReply::parse(&first.lines);

    if reply.is_unresolved() {
        match run_pass(runner, port, "flash_id") {
            Ok(second) => {
                if let Some(err) = connection_failure(port, &second) {
                    log::warn!("Second probe pass failed: {}", err);
                } else {
                    reply = reply.merge(ProbeReply::parse(&second.lines));
                }
            }
            Err(e) => log::warn!("Second probe pass failed: {}", e),
        }
    }

    let info = reply.into_device_info();
    if info.is_degraded() {
        log::warn!("Could not identify chip on {}, continuing with defaults", port);
    }
    if info.confidence == Confidence::Estimated {
        log::warn!(
            "Flash size not measured ({}), using {} bucket",
            info.flash_capacity,
            info.capacity_bucket()
        );
    }
    log::info!(
        "Probed {}: chip {}, MAC {}, flash {} ({})",
        port,
        info.chip_model,
        info.mac_address,
        info.flash_capacity,
        info.confidence
    );

    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    const READ_MAC: &str = "\
esptool.py v4.7.0
Serial port /dev/ttyUSB0
Connecting....
Chip is ESP32-D0WD-V3 (revision v3.1)
Features: WiFi, BT, Dual Core, 240MHz
Crystal is 40MHz
MAC: 24:6f:28:aa:bb:cc
Uploading stub...
Hard resetting via RTS pin...";

    const FLASH_ID: &str = "\
Chip is ESP32-D0WD-V3 (revision v3.1)
MAC: 24:6f:28:aa:bb:cc
Manufacturer: 20
Device: 4017
Detected flash size: 8MB
Hard resetting via RTS pin...";

    #[test]
    fn parse_read_mac() {
        let reply = ProbeReply::parse(&lines(READ_MAC));
        assert_eq!(reply.chip_model.as_deref(), Some("ESP32-D0WD-V3"));
        assert_eq!(reply.mac_address.as_deref(), Some("24:6f:28:aa:bb:cc"));
        assert_eq!(reply.flash, None);
        assert!(reply.is_unresolved());
    }

    #[test]
    fn parse_flash_id() {
        let reply = ProbeReply::parse(&lines(FLASH_ID));
        assert_eq!(reply.flash, Some((FlashCapacity::Mb8, Confidence::Measured)));
        assert!(!reply.is_unresolved());
    }

    #[test]
    fn size_hint_is_estimated() {
        let reply = ProbeReply::parse(&lines("Auto-detected Flash size: 4MB"));
        assert_eq!(reply.flash, Some((FlashCapacity::Mb4, Confidence::Estimated)));
    }

    #[test]
    fn esp32_mention_names_chip() {
        let reply = ProbeReply::parse(&lines("Detecting chip type... ESP32"));
        assert_eq!(reply.chip_model.as_deref(), Some("ESP32"));
        assert!(reply.chip_guessed);
    }

    #[test]
    fn merge_prefers_specific_values() {
        let first = ProbeReply {
            chip_model: Some("ESP32".into()),
            chip_guessed: true,
            mac_address: None,
            flash: Some((FlashCapacity::Mb4, Confidence::Measured)),
        };
        let second = ProbeReply {
            chip_model: Some("ESP32-D0WD-V3".into()),
            chip_guessed: false,
            mac_address: Some("bb".into()),
            flash: Some((FlashCapacity::Mb8, Confidence::Estimated)),
        };
        let merged = first.merge(second);
        assert_eq!(merged.chip_model.as_deref(), Some("ESP32-D0WD-V3"));
        assert!(!merged.chip_guessed);
        assert_eq!(merged.mac_address.as_deref(), Some("bb"));
        assert_eq!(merged.flash, Some((FlashCapacity::Mb4, Confidence::Measured)));
    }

    #[test]
    fn guessed_chip_never_replaces_parsed_chip() {
        let first = ProbeReply::parse(&lines(READ_MAC));
        let second = ProbeReply::parse(&lines("Warning: esp32 flash id read failed"));
        assert!(second.chip_guessed);

        let merged = first.merge(second);
        assert_eq!(merged.chip_model.as_deref(), Some("ESP32-D0WD-V3"));
        assert!(!merged.chip_guessed);
    }

    #[test]
    fn first_pass_mac_is_kept() {
        let first = ProbeReply::parse(&lines(READ_MAC));
        let second =
            ProbeReply::parse(&lines("MAC: 00:00:00:00:00:00\nDetected flash size: 4MB"));
        let merged = first.merge(second);
        assert_eq!(merged.mac_address.as_deref(), Some("24:6f:28:aa:bb:cc"));
        assert_eq!(merged.flash, Some((FlashCapacity::Mb4, Confidence::Measured)));
    }

    #[test]
    fn empty_reply_is_unknown_estimated() {
        let info = ProbeReply::parse(&lines("garbage\n\u{0}\u{1}")).into_device_info();
        assert_eq!(info.chip_model, UNKNOWN);
        assert_eq!(info.mac_address, UNKNOWN);
        assert_eq!(info.flash_capacity, FlashCapacity::Unknown);
        assert_eq!(info.confidence, Confidence::Estimated);
    }

    #[test]
    fn connection_failure_needs_nonzero_exit() {
        let output = ToolOutput {
            exit_code: 2,
            lines: lines("A fatal error occurred: could not open port '/dev/ttyUSB9'"),
        };
        assert!(matches!(
            connection_failure("/dev/ttyUSB9", &output),
            Some(Error::Connection { .. })
        ));

        let ok = ToolOutput {
            exit_code: 0,
            ..output
        };
        assert!(connection_failure("/dev/ttyUSB9", &ok).is_none());
    }
}
