//! Erase command implementation

use super::progress::with_progress;
use super::report;
use mspflash_core::{erase, ToolRunner};
use std::io::{self, Write};

/// Ask a yes/no question on the terminal, defaulting to no
fn confirm(prompt: &str) -> io::Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Erase the whole flash with a progress spinner
pub fn erase_with_progress<R: ToolRunner + Send + ?Sized>(
    runner: &mut R,
    port: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = with_progress(|sink| erase::erase(runner, port, &sink))?;
    report(result)
}

/// Run the erase command
pub fn run_erase<R: ToolRunner + Send + ?Sized>(
    runner: &mut R,
    port: &str,
    yes: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if !yes {
        let prompt = format!(
            "Erase all flash on {}? The device will not boot until firmware is written again.",
            port
        );
        if !confirm(&prompt)? {
            println!("Aborted");
            return Ok(());
        }
    }
    erase_with_progress(runner, port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_explicit_yes_confirms() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes("\n"));
        assert!(!is_yes("no"));
        assert!(!is_yes("yep"));
    }
}
