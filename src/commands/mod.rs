//! CLI command implementations
//!
//! Each pipeline stage has its own command. Commands never advance to the
//! next stage on their own, except `flash`, which chains probe, resolve,
//! fetch and write the way an operator would.

pub mod erase;
pub mod fetch;
pub mod flash;
pub mod ports;
pub mod probe;
pub mod progress;
pub mod release;

use mspflash_core::WriteResult;

/// Print the outcome of a tool run, with its last output lines on failure
pub fn report(result: WriteResult) -> Result<(), Box<dyn std::error::Error>> {
    if result.succeeded {
        println!("{}", result.message);
        return Ok(());
    }

    eprintln!("{}", result.message);
    if !result.tail_diagnostics.is_empty() {
        eprintln!();
        eprintln!("Last tool output:");
        for line in &result.tail_diagnostics {
            eprintln!("  {}", line);
        }
    }
    result.into_result()?;
    Ok(())
}
