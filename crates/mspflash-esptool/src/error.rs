//! Error types for the esptool backend

use thiserror::Error;

/// esptool backend errors
#[derive(Debug, Error)]
pub enum EsptoolError {
    /// No program was configured
    #[error("Empty tool command")]
    EmptyCommand,

    /// The tool could not be started
    #[error("Failed to start '{program}': {source}")]
    Spawn {
        /// Program that was started
        program: String,
        /// OS error
        source: std::io::Error,
    },

    /// I/O error while talking to the child process
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

/// Result type for esptool operations
pub type Result<T> = core::result::Result<T, EsptoolError>;

impl From<EsptoolError> for mspflash_core::Error {
    fn from(e: EsptoolError) -> Self {
        match e {
            EsptoolError::Spawn { source, .. } => mspflash_core::Error::Io(source),
            EsptoolError::Io(e) => mspflash_core::Error::Io(e),
            EsptoolError::EmptyCommand => {
                mspflash_core::Error::Config("empty tool command".to_string())
            }
            EsptoolError::Serial(e) => mspflash_core::Error::Connection {
                port: String::new(),
                reason: e.to_string(),
            },
        }
    }
}
