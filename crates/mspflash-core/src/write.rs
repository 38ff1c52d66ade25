//! Multi-region flash write
//!
//! All four package files are handed to the vendor tool in one invocation,
//! so connect, write, verify and reset happen in a single tool session. If
//! the tool fails halfway the device is left in whatever state the tool
//! reached; nothing is rolled back.

use std::path::Path;

use crate::device::CapacityBucket;
use crate::error::{Error, Result};
use crate::package::FirmwarePackage;
use crate::progress::{ProgressEvent, ProgressSink, WritePhase};
use crate::region::{FlashRegionMap, Region, Role};
use crate::tool::{port_args, ToolOutput, ToolRunner};

/// Default serial speed for writes
pub const DEFAULT_BAUD: u32 = 921_600;

/// Message of a successful package write
pub const PACKAGE_SUCCESS: &str =
    "Flash completed successfully: bootloader, partition table, boot selector and application written";

/// Message of a successful application-only write
pub const APPLICATION_SUCCESS: &str = "Flash completed successfully: application written";

/// Outcome of a tool invocation that ran to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResult {
    /// True when the tool exited with status 0
    pub succeeded: bool,
    /// Human readable summary
    pub message: String,
    /// Last lines of raw tool output, empty on success
    pub tail_diagnostics: Vec<String>,
    /// Tool exit code
    pub exit_code: i32,
}

/// Result of [`write_package`] and [`write_application`]
pub type WriteResult = OperationResult;

impl OperationResult {
    pub(crate) fn from_output(output: &ToolOutput, success: &str, failure: &str) -> Self {
        if output.success() {
            Self {
                succeeded: true,
                message: success.to_string(),
                tail_diagnostics: Vec::new(),
                exit_code: 0,
            }
        } else {
            Self {
                succeeded: false,
                message: format!("{} (exit status {})", failure, output.exit_code),
                tail_diagnostics: output.tail(),
                exit_code: output.exit_code,
            }
        }
    }

    /// Convert a failed run into [`Error::ToolInvocation`]
    pub fn into_result(self) -> Result<Self> {
        if self.succeeded {
            Ok(self)
        } else {
            Err(Error::ToolInvocation {
                exit_code: self.exit_code,
                tail: self.tail_diagnostics,
            })
        }
    }
}

/// Tool settings for a write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Flash size declared to the tool
    pub flash_size: CapacityBucket,
    /// Serial speed
    pub baud: u32,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            flash_size: CapacityBucket::Mb4,
            baud: DEFAULT_BAUD,
        }
    }
}

/// Translates raw tool output into coarse progress events
///
/// Phase events are only produced when the phase changes. Lines carrying a
/// percentage are additionally passed through as [`ProgressEvent::ToolTick`].
#[derive(Debug, Default)]
pub struct WriteProgressParser {
    current: Option<WritePhase>,
}

impl WriteProgressParser {
    /// Create a parser with no phase yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one output line
    pub fn feed(&mut self, line: &str) -> Vec<ProgressEvent> {
        let mut events = Vec::new();

        if let Some(phase) = Self::phase_of(line) {
            if self.current != Some(phase) {
                self.current = Some(phase);
                events.push(ProgressEvent::Phase(phase));
            }
        }
        if line.contains('%') {
            events.push(ProgressEvent::ToolTick(line.trim().to_string()));
        }
        events
    }

    fn phase_of(line: &str) -> Option<WritePhase> {
        if line.contains("Connecting") {
            Some(WritePhase::Connecting)
        } else if let Some(rest) = line.split("Writing at").nth(1) {
            match parse_address(rest).and_then(FlashRegionMap::region_at) {
                Some(region) => Some(writing_phase(region.role)),
                None if line.to_ascii_lowercase().contains("bootloader") => {
                    Some(WritePhase::WritingBootloader)
                }
                None => None,
            }
        } else if line.contains("Hash") {
            Some(WritePhase::Verifying)
        } else if line.contains("Leaving") || line.contains("Hard resetting") {
            Some(WritePhase::Resetting)
        } else {
            None
        }
    }
}

fn writing_phase(role: Role) -> WritePhase {
    match role {
        Role::Bootloader => WritePhase::WritingBootloader,
        Role::PartitionTable => WritePhase::WritingPartitionTable,
        Role::BootSelector => WritePhase::WritingBootSelector,
        Role::Application => WritePhase::WritingApplication,
    }
}

/// Parse the first `0x...` token of `s`
fn parse_address(s: &str) -> Option<u32> {
    let start = s.find("0x")? + 2;
    let hex: String = s[start..]
        .chars()
        .take_while(|c| c.is_ascii_hexdigit())
        .collect();
    u32::from_str_radix(&hex, 16).ok()
}

fn write_args(port: &str, options: &WriteOptions, flash_freq: &str) -> Vec<String> {
    let mut args = port_args(port);
    args.extend(
        [
            "--baud",
            &options.baud.to_string(),
            "--before",
            "default_reset",
            "--after",
            "hard_reset",
            "write_flash",
            "-z",
            "--flash_mode",
            "dio",
            "--flash_freq",
            flash_freq,
            "--flash_size",
            options.flash_size.as_str(),
        ]
        .map(str::to_string),
    );
    args
}

fn push_region(args: &mut Vec<String>, region: Region, path: &Path) {
    args.push(region.address_arg());
    args.push(path.display().to_string());
}

fn run_write<R: ToolRunner + ?Sized>(
    runner: &mut R,
    args: &[String],
    sink: &ProgressSink,
) -> Result<ToolOutput> {
    let mut parser = WriteProgressParser::new();
    runner.run(args, None, &mut |line| {
        log::debug!("{}", line);
        for event in parser.feed(line) {
            sink.emit(event);
        }
    })
}

/// Build the full-package argument list after checking every file exists
pub fn package_args(
    port: &str,
    package: &FirmwarePackage,
    options: &WriteOptions,
) -> Result<Vec<String>> {
    package.require_complete()?;

    let mut args = write_args(port, options, "80m");
    for region in FlashRegionMap::REGIONS {
        let path = package.path(region.role).ok_or(Error::IncompletePackage {
            missing: vec![region.role],
        })?;
        if !path.is_file() {
            return Err(Error::MissingFile {
                role: region.role,
                path: path.to_path_buf(),
            });
        }
        push_region(&mut args, region, path);
    }
    Ok(args)
}

/// Write all four regions of `package` in a single tool invocation
///
/// Returns `Err` without starting the tool when the package is incomplete
/// or one of its files no longer exists. A tool that ran and failed is
/// reported as `Ok` with `succeeded == false`.
pub fn write_package<R: ToolRunner + ?Sized>(
    runner: &mut R,
    port: &str,
    package: &FirmwarePackage,
    options: &WriteOptions,
    sink: &ProgressSink,
) -> Result<WriteResult> {
    let args = package_args(port, package, options)?;

    sink.message(format!("Flash size: {}", options.flash_size));
    sink.message("Writing bootloader, partition table, boot selector and application");
    log::info!("Writing package to {} at {} baud", port, options.baud);

    let output = run_write(runner, &args, sink)?;
    let result = WriteResult::from_output(&output, PACKAGE_SUCCESS, "Flash failed");
    sink.emit(ProgressEvent::Finished {
        succeeded: result.succeeded,
    });
    if result.succeeded {
        log::info!("{}", result.message);
    } else {
        log::error!("{}", result.message);
    }
    Ok(result)
}

/// Write only the application binary at its usual address
///
/// Only valid as an incremental update on a device that already holds a
/// bootloader and partition table. After a full erase the device will not
/// boot; use [`write_package`] instead.
#[deprecated(note = "writes the application only; use write_package for a bootable image")]
pub fn write_application<R: ToolRunner + ?Sized>(
    runner: &mut R,
    port: &str,
    application: &Path,
    options: &WriteOptions,
    sink: &ProgressSink,
) -> Result<WriteResult> {
    if !application.is_file() {
        return Err(Error::MissingFile {
            role: Role::Application,
            path: application.to_path_buf(),
        });
    }
    log::warn!("Writing application only; bootloader and partition table are left untouched");

    let mut args = write_args(port, options, "40m");
    push_region(
        &mut args,
        FlashRegionMap::region(Role::Application),
        application,
    );

    let output = run_write(runner, &args, sink)?;
    let result = WriteResult::from_output(&output, APPLICATION_SUCCESS, "Flash failed");
    sink.emit(ProgressEvent::Finished {
        succeeded: result.succeeded,
    });
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phases(lines: &[&str]) -> Vec<WritePhase> {
        let mut parser = WriteProgressParser::new();
        lines
            .iter()
            .flat_map(|l| parser.feed(l))
            .filter_map(|e| match e {
                ProgressEvent::Phase(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn phases_follow_regions() {
        let got = phases(&[
            "Connecting....",
            "Writing at 0x00001000... (50 %)",
            "Writing at 0x00005000... (100 %)",
            "Hash of data verified.",
            "Writing at 0x00008000... (100 %)",
            "Writing at 0x0000e000... (100 %)",
            "Writing at 0x00010000... (3 %)",
            "Writing at 0x00120000... (100 %)",
            "Hash of data verified.",
            "Leaving...",
            "Hard resetting via RTS pin...",
        ]);
        assert_eq!(
            got,
            vec![
                WritePhase::Connecting,
                WritePhase::WritingBootloader,
                WritePhase::Verifying,
                WritePhase::WritingPartitionTable,
                WritePhase::WritingBootSelector,
                WritePhase::WritingApplication,
                WritePhase::Verifying,
                WritePhase::Resetting,
            ]
        );
    }

    #[test]
    fn percent_lines_pass_through() {
        let mut parser = WriteProgressParser::new();
        let events = parser.feed("Writing at 0x00010000... (42 %)  ");
        assert_eq!(
            events,
            vec![
                ProgressEvent::Phase(WritePhase::WritingApplication),
                ProgressEvent::ToolTick("Writing at 0x00010000... (42 %)".into()),
            ]
        );
        assert!(parser.feed("Compressed 3072 bytes to 103...").is_empty());
    }

    #[test]
    fn parse_address_token() {
        assert_eq!(parse_address(" 0x0000e000... (100 %)"), Some(0xE000));
        assert_eq!(parse_address(" nowhere"), None);
    }

    #[test]
    fn args_list_regions_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut package = FirmwarePackage::new(dir.path().join("p.zip"), dir.path().into());
        for role in Role::ALL {
            let path = dir.path().join(format!("{}.bin", role));
            std::fs::write(&path, b"x").unwrap();
            package.set_path(role, path);
        }
        let options = WriteOptions {
            flash_size: CapacityBucket::Mb8,
            ..WriteOptions::default()
        };
        let args = package_args("COM3", &package, &options).unwrap();

        assert_eq!(&args[..4], &["--port", "COM3", "--baud", "921600"]);
        let size = args.iter().position(|a| a == "--flash_size").unwrap();
        assert_eq!(args[size + 1], "8MB");
        let addresses: Vec<&str> = args[size + 2..].iter().step_by(2).map(String::as_str).collect();
        assert_eq!(addresses, vec!["0x1000", "0x8000", "0xe000", "0x10000"]);
    }

    #[test]
    fn failed_run_keeps_tail() {
        let output = ToolOutput {
            exit_code: 2,
            lines: (0..15).map(|i| i.to_string()).collect(),
        };
        let result = WriteResult::from_output(&output, PACKAGE_SUCCESS, "Flash failed");
        assert!(!result.succeeded);
        assert_eq!(result.tail_diagnostics.len(), 10);
        assert_eq!(result.tail_diagnostics[0], "5");
        assert!(matches!(
            result.into_result(),
            Err(Error::ToolInvocation { exit_code: 2, .. })
        ));
    }
}
