//! Configuration file
//!
//! Every key is optional:
//!
//! ```toml
//! repository = "A-A-Milano-Smart-Park/msp-firmware"
//! api_base = "https://api.github.com"
//! tool = ["esptool.py"]
//! baud = 921600
//! download_dir = "firmware"
//! ```

use mspflash_core::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Read when `--config` is not given and the file exists
pub const DEFAULT_CONFIG_FILE: &str = "mspflash.toml";

/// Release repository of the MSP firmware
pub const DEFAULT_REPOSITORY: &str = "A-A-Milano-Smart-Park/msp-firmware";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// `owner/repo` publishing the firmware releases
    pub repository: String,
    /// Releases API endpoint, GitHub when absent
    pub api_base: Option<String>,
    /// Vendor tool command line, `python -m esptool` when absent
    pub tool: Option<Vec<String>>,
    /// Serial baud rate for writes
    pub baud: u32,
    /// Where packages are downloaded and unpacked
    pub download_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repository: DEFAULT_REPOSITORY.to_string(),
            api_base: None,
            tool: None,
            baud: mspflash_core::write::DEFAULT_BAUD,
            download_dir: PathBuf::from("firmware"),
        }
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.message().to_string()))
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Load `path`, or the default file if present, or the defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            if !path.is_file() {
                return Err(Error::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            log::debug!("Loading config from {}", path.display());
            return Self::from_toml_file(path);
        }

        let default = Path::new(DEFAULT_CONFIG_FILE);
        if default.is_file() {
            log::debug!("Loading config from {}", default.display());
            Self::from_toml_file(default)
        } else {
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(Config::from_toml_str("").unwrap(), Config::default());
        assert_eq!(Config::default().baud, 921_600);
    }

    #[test]
    fn parse_all_keys() {
        let config = Config::from_toml_str(
            r#"
            repository = "me/fork"
            api_base = "http://localhost:8080"
            tool = ["esptool.py"]
            baud = 460800
            download_dir = "/tmp/fw"
            "#,
        )
        .unwrap();
        assert_eq!(config.repository, "me/fork");
        assert_eq!(config.api_base.as_deref(), Some("http://localhost:8080"));
        assert_eq!(config.tool, Some(vec!["esptool.py".to_string()]));
        assert_eq!(config.baud, 460_800);
        assert_eq!(config.download_dir, PathBuf::from("/tmp/fw"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Config::from_toml_str("baudrate = 115200").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn explicit_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("missing.toml"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let path = dir.path().join("mspflash.toml");
        std::fs::write(&path, "baud = 115200\n").unwrap();
        assert_eq!(Config::load(Some(&path)).unwrap().baud, 115_200);
    }
}
