//! Subprocess runner for esptool
//!
//! stdout and stderr are read on two helper threads and funnelled through a
//! channel, so lines reach the caller in (approximately) the order the tool
//! wrote them. esptool redraws progress with `\r` when attached to a
//! terminal; both `\r` and `\n` end a line here.

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use mspflash_core::tool::{ToolOutput, ToolRunner};

use crate::error::{EsptoolError, Result};

/// Interval between exit checks once the tool's output has ended
const WAIT_POLL: Duration = Duration::from_millis(20);

/// Runs esptool (or a compatible tool) as a child process
#[derive(Debug, Clone)]
pub struct EsptoolRunner {
    program: String,
    prefix: Vec<String>,
}

impl EsptoolRunner {
    /// Create a runner from a command prefix such as `["esptool.py"]` or
    /// `["python3", "-m", "esptool"]`
    pub fn new<S: AsRef<str>>(command: &[S]) -> Result<Self> {
        let (program, prefix) = command.split_first().ok_or(EsptoolError::EmptyCommand)?;
        if program.as_ref().is_empty() {
            return Err(EsptoolError::EmptyCommand);
        }
        Ok(Self {
            program: program.as_ref().to_string(),
            prefix: prefix.iter().map(|s| s.as_ref().to_string()).collect(),
        })
    }

    /// Run esptool as a Python module with the platform's interpreter
    pub fn python_module() -> Self {
        let python = if cfg!(windows) { "python" } else { "python3" };
        Self {
            program: python.to_string(),
            prefix: vec!["-m".to_string(), "esptool".to_string()],
        }
    }

    /// Full command line for `args`, for logging
    pub fn command_line(&self, args: &[String]) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.prefix.iter().cloned())
            .chain(args.iter().cloned())
            .collect()
    }

    fn spawn(&self, args: &[String]) -> Result<Child> {
        Command::new(&self.program)
            .args(&self.prefix)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| EsptoolError::Spawn {
                program: self.program.clone(),
                source,
            })
    }

    fn run_child(
        &self,
        args: &[String],
        timeout: Option<Duration>,
        on_line: &mut dyn FnMut(&str),
    ) -> mspflash_core::Result<ToolOutput> {
        log::debug!("Running: {}", self.command_line(args).join(" "));
        let mut child = self.spawn(args)?;

        let (tx, rx) = mpsc::channel();
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(forward_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(forward_lines(stderr, tx.clone()));
        }
        drop(tx);

        let deadline = timeout.map(|t| Instant::now() + t);
        let mut lines = Vec::new();

        loop {
            let next = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    rx.recv_timeout(remaining)
                }
                None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match next {
                Ok(line) => {
                    on_line(&line);
                    lines.push(line);
                }
                Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => return Err(self.kill(&mut child, timeout)),
            }
        }

        for reader in readers {
            let _ = reader.join();
        }

        // The tool may close its pipes and keep running
        let status = match deadline {
            Some(deadline) => loop {
                if let Some(status) = child.try_wait().map_err(EsptoolError::from)? {
                    break status;
                }
                if Instant::now() >= deadline {
                    return Err(self.kill(&mut child, timeout));
                }
                thread::sleep(WAIT_POLL);
            },
            None => child.wait().map_err(EsptoolError::from)?,
        };
        let exit_code = status.code().unwrap_or(-1);

        Ok(ToolOutput { exit_code, lines })
    }

    fn kill(&self, child: &mut Child, timeout: Option<Duration>) -> mspflash_core::Error {
        let secs = timeout.map(|t| t.as_secs()).unwrap_or_default();
        log::error!("{} did not finish within {} s, killing it", self.program, secs);
        let _ = child.kill();
        let _ = child.wait();
        mspflash_core::Error::Timeout(secs)
    }
}

impl Default for EsptoolRunner {
    fn default() -> Self {
        Self::python_module()
    }
}

impl ToolRunner for EsptoolRunner {
    fn run(
        &mut self,
        args: &[String],
        timeout: Option<Duration>,
        on_line: &mut dyn FnMut(&str),
    ) -> mspflash_core::Result<ToolOutput> {
        self.run_child(args, timeout, on_line)
    }
}

/// Read `src` on a helper thread, sending each non-empty line
fn forward_lines<R: Read + Send + 'static>(
    mut src: R,
    tx: Sender<String>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut splitter = LineSplitter::default();
        let mut buf = [0u8; 1024];
        loop {
            match src.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    for line in splitter.push(&buf[..n]) {
                        if tx.send(line).is_err() {
                            return;
                        }
                    }
                }
            }
        }
        if let Some(line) = splitter.finish() {
            let _ = tx.send(line);
        }
    })
}

/// Splits a byte stream on `\r` and `\n`, dropping empty lines
#[derive(Debug, Default)]
struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut out = Vec::new();
        for &b in bytes {
            if b == b'\n' || b == b'\r' {
                if let Some(line) = self.take() {
                    out.push(line);
                }
            } else {
                self.pending.push(b);
            }
        }
        out
    }

    fn finish(&mut self) -> Option<String> {
        self.take()
    }

    fn take(&mut self) -> Option<String> {
        let line = String::from_utf8_lossy(&self.pending).trim_end().to_string();
        self.pending.clear();
        (!line.is_empty()).then_some(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splitter_handles_cr_and_partial_lines() {
        let mut s = LineSplitter::default();
        assert_eq!(s.push(b"Writing at 0x1000 (10 %)\rWriting"), vec!["Writing at 0x1000 (10 %)"]);
        assert_eq!(s.push(b" at 0x1000 (20 %)\r\n\r\nDone"), vec!["Writing at 0x1000 (20 %)"]);
        assert_eq!(s.finish().as_deref(), Some("Done"));
        assert_eq!(s.finish(), None);
    }

    #[test]
    fn empty_command_is_rejected() {
        let empty: [&str; 0] = [];
        assert!(matches!(EsptoolRunner::new(&empty), Err(EsptoolError::EmptyCommand)));
        assert!(matches!(EsptoolRunner::new(&[""]), Err(EsptoolError::EmptyCommand)));
    }

    #[test]
    fn command_line_prepends_prefix() {
        let runner = EsptoolRunner::new(&["python3", "-m", "esptool"]).unwrap();
        let args = vec!["--port".to_string(), "COM1".to_string(), "read_mac".to_string()];
        assert_eq!(
            runner.command_line(&args),
            vec!["python3", "-m", "esptool", "--port", "COM1", "read_mac"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn runs_child_and_collects_both_streams() {
        let mut runner = EsptoolRunner::new(&["sh", "-c"]).unwrap();
        let script = "echo out; echo err 1>&2; exit 3".to_string();
        let mut seen = Vec::new();
        let output = runner
            .run(&[script], Some(Duration::from_secs(10)), &mut |l| seen.push(l.to_string()))
            .unwrap();
        assert_eq!(output.exit_code, 3);
        assert_eq!(output.lines.len(), 2);
        assert!(output.lines.contains(&"out".to_string()));
        assert!(output.lines.contains(&"err".to_string()));
        assert_eq!(seen, output.lines);
    }

    #[cfg(unix)]
    #[test]
    fn timeout_kills_child() {
        let mut runner = EsptoolRunner::new(&["sh", "-c"]).unwrap();
        let err = runner
            .run(
                &["sleep 5".to_string()],
                Some(Duration::from_millis(200)),
                &mut |_| {},
            )
            .unwrap_err();
        assert!(matches!(err, mspflash_core::Error::Timeout(_)));
    }

    #[cfg(unix)]
    #[test]
    fn timeout_covers_child_with_closed_pipes() {
        let mut runner = EsptoolRunner::new(&["sh", "-c"]).unwrap();
        let err = runner
            .run(
                &["exec >&- 2>&-; sleep 5".to_string()],
                Some(Duration::from_millis(200)),
                &mut |_| {},
            )
            .unwrap_err();
        assert!(matches!(err, mspflash_core::Error::Timeout(_)));
    }

    #[test]
    fn missing_program_is_io_error() {
        let mut runner = EsptoolRunner::new(&["mspflash-no-such-tool"]).unwrap();
        let err = runner.run(&[], None, &mut |_| {}).unwrap_err();
        assert!(matches!(err, mspflash_core::Error::Io(_)));
    }
}
