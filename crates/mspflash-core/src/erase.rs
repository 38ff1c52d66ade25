//! Full-chip erase
//!
//! Erasing is unconditional and irreversible. Asking the operator for
//! confirmation is the caller's job.

use std::time::Duration;

use crate::error::Result;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::tool::{port_args, ToolRunner};
use crate::write::OperationResult;

/// Upper bound for a full-chip erase
pub const ERASE_TIMEOUT: Duration = Duration::from_secs(60);

/// Message of a successful erase
pub const ERASE_SUCCESS: &str = "Flash erased successfully";

/// Result of [`erase`]
pub type EraseResult = OperationResult;

/// Erase the whole flash of the device on `port`
///
/// Fails with [`crate::Error::Timeout`] after [`ERASE_TIMEOUT`].
pub fn erase<R: ToolRunner + ?Sized>(
    runner: &mut R,
    port: &str,
    sink: &ProgressSink,
) -> Result<EraseResult> {
    let mut args = port_args(port);
    args.push("erase_flash".to_string());

    sink.emit(ProgressEvent::Erasing);
    log::info!("Erasing flash on {}", port);

    let output = runner.run(&args, Some(ERASE_TIMEOUT), &mut |line| {
        log::debug!("{}", line);
        if line.contains('%') {
            sink.emit(ProgressEvent::ToolTick(line.trim().to_string()));
        }
    })?;

    let result = EraseResult::from_output(&output, ERASE_SUCCESS, "Erase failed");
    sink.emit(ProgressEvent::Finished {
        succeeded: result.succeeded,
    });
    if !result.succeeded {
        log::error!("{}", result.message);
    }
    Ok(result)
}
