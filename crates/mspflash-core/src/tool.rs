//! Vendor flashing tool abstraction
//!
//! Every device operation is a single invocation of an external command line
//! tool. [`ToolRunner`] hides how that tool is started so the pipeline can be
//! driven by a real subprocess or by a scripted fake.

use std::time::Duration;

use crate::error::Result;

/// Number of trailing output lines kept as failure diagnostics
pub const TAIL_LINES: usize = 10;

/// Exit status and interleaved stdout/stderr of one tool run
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ToolOutput {
    /// Process exit code (-1 when terminated by a signal)
    pub exit_code: i32,
    /// Output lines in arrival order, trailing whitespace trimmed
    pub lines: Vec<String>,
}

impl ToolOutput {
    /// True when the tool exited with status 0
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// The last [`TAIL_LINES`] lines of output
    pub fn tail(&self) -> Vec<String> {
        tail(&self.lines, TAIL_LINES)
    }
}

/// Runs the vendor tool
pub trait ToolRunner {
    /// Run the tool with `args`, calling `on_line` for every output line as
    /// it arrives
    ///
    /// Implementations return `Ok` whenever the tool started and exited,
    /// whatever its exit code. A run exceeding `timeout` is terminated and
    /// reported as [`crate::Error::Timeout`]; a tool that cannot be started
    /// is reported as [`crate::Error::Io`].
    fn run(
        &mut self,
        args: &[String],
        timeout: Option<Duration>,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<ToolOutput>;
}

impl<T: ToolRunner + ?Sized> ToolRunner for &mut T {
    fn run(
        &mut self,
        args: &[String],
        timeout: Option<Duration>,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<ToolOutput> {
        (**self).run(args, timeout, on_line)
    }
}

impl<T: ToolRunner + ?Sized> ToolRunner for Box<T> {
    fn run(
        &mut self,
        args: &[String],
        timeout: Option<Duration>,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<ToolOutput> {
        (**self).run(args, timeout, on_line)
    }
}

/// Copy the last `n` entries of `lines`
pub fn tail(lines: &[String], n: usize) -> Vec<String> {
    lines[lines.len().saturating_sub(n)..].to_vec()
}

/// Leading `--port <port>` arguments shared by every command
pub(crate) fn port_args(port: &str) -> Vec<String> {
    vec!["--port".to_string(), port.to_string()]
}
