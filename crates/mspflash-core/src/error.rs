//! Error types for mspflash-core
//!
//! One variant per failure class a pipeline stage can report. Stages return
//! these instead of panicking; presenting them is up to the caller.

use std::path::PathBuf;

use thiserror::Error;

use crate::region::Role;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Serial port could not be opened or the device did not answer
    #[error("connection failed on {port}: {reason}")]
    Connection {
        /// Port identifier passed by the caller
        port: String,
        /// Tool or OS supplied reason
        reason: String,
    },

    /// No release asset fits the capacity bucket (and platform)
    #[error("no release asset matches {token}")]
    NoMatch {
        /// Capacity token that was searched for
        token: String,
    },

    /// Non-success HTTP status or broken download stream
    #[error("download failed: {0}")]
    Download(String),

    /// Archive could not be opened or unpacked
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// Classification left one or more roles without a file
    #[error("incomplete firmware package, missing: {}", format_roles(.missing))]
    IncompletePackage {
        /// Roles for which no file was found, in address order
        missing: Vec<Role>,
    },

    /// A package file disappeared before the tool was started
    #[error("{role} file not found: {}", .path.display())]
    MissingFile {
        /// Role of the missing file
        role: Role,
        /// Path that was expected to exist
        path: PathBuf,
    },

    /// External tool exited with a non-zero status
    #[error("tool exited with status {exit_code}")]
    ToolInvocation {
        /// Process exit code (-1 when killed by a signal)
        exit_code: i32,
        /// Last lines of the tool output
        tail: Vec<String>,
    },

    /// Tool did not finish within its bound
    #[error("operation timed out after {0} s")]
    Timeout(u64),

    /// Invalid configuration value
    #[error("configuration error: {0}")]
    Config(String),

    /// Local filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;

fn format_roles(roles: &[Role]) -> String {
    roles
        .iter()
        .map(|r| r.name())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_package_names_roles() {
        let err = Error::IncompletePackage {
            missing: vec![Role::BootSelector, Role::Application],
        };
        assert_eq!(
            err.to_string(),
            "incomplete firmware package, missing: boot_selector, application"
        );
    }
}
