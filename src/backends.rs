//! Backend registration and dispatch
//!
//! A backend pairs a vendor-tool runner with a release source. `esptool`
//! drives real hardware and reads GitHub releases; `dummy` (feature-gated)
//! answers from a script for demos and testing.

use crate::config::Config;
use mspflash_core::{ReleaseClient, ToolRunner};

/// Information about a backend
pub struct BackendInfo {
    /// Name used on the command line
    pub name: &'static str,
    /// Short description
    pub description: &'static str,
}

/// Get information about all available backends (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_backends() -> Vec<BackendInfo> {
    let mut backends = Vec::new();

    backends.push(BackendInfo {
        name: "esptool",
        description: "esptool child process and GitHub releases",
    });

    #[cfg(feature = "dummy")]
    backends.push(BackendInfo {
        name: "dummy",
        description: "Scripted 4MB ESP32 and in-memory release for testing",
    });

    backends
}

/// Help text listing all available backends
pub fn backend_help() -> String {
    let mut help = String::from("Available backends:\n");
    for b in available_backends() {
        help.push_str(&format!("  {:10} - {}\n", b.name, b.description));
    }
    help
}

/// An opened backend
pub struct Backend {
    pub name: &'static str,
    pub tool: Box<dyn ToolRunner + Send>,
    pub releases: Box<dyn ReleaseClient + Send + Sync>,
}

impl Backend {
    /// Open the backend called `name`
    pub fn open(name: &str, config: &Config) -> Result<Self, Box<dyn std::error::Error>> {
        match name {
            "esptool" => {
                let tool = match &config.tool {
                    Some(command) => mspflash_esptool::EsptoolRunner::new(command.as_slice())?,
                    None => mspflash_esptool::EsptoolRunner::python_module(),
                };
                let mut client = mspflash_github::GithubClient::new(&config.repository)?;
                if let Some(api_base) = &config.api_base {
                    client = client.with_api_base(api_base);
                }
                log::debug!("Release source: {}", client.repository());
                Ok(Self {
                    name: "esptool",
                    tool: Box::new(tool),
                    releases: Box::new(client),
                })
            }

            #[cfg(feature = "dummy")]
            "dummy" => Ok(Self {
                name: "dummy",
                tool: Box::new(mspflash_dummy::DummyTool::esp32(
                    mspflash_core::FlashCapacity::Mb4,
                )),
                releases: Box::new(mspflash_dummy::DummyReleaseClient::with_standard_packages(
                    "v0.0.0-dummy",
                )),
            }),

            _ => Err(format!("Unknown backend: {}\n{}", name, backend_help()).into()),
        }
    }

    /// Check that `port` can be opened before handing it to the tool
    pub fn check_port(&self, port: &str) -> mspflash_core::Result<()> {
        match self.name {
            "esptool" => mspflash_esptool::check_port(port),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn esptool_is_always_available() {
        assert!(backend_help().contains("  esptool    - "));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let err = Backend::open("ch341a", &Config::default()).err().unwrap();
        assert!(err.to_string().contains("Unknown backend: ch341a"));
    }

    #[test]
    fn bad_repository_fails_to_open() {
        let config = Config {
            repository: "not-a-repo".to_string(),
            ..Config::default()
        };
        assert!(Backend::open("esptool", &config).is_err());
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn dummy_backend_opens() {
        let backend = Backend::open("dummy", &Config::default()).unwrap();
        assert_eq!(backend.name, "dummy");
        assert!(backend.check_port("/dev/ttyDUMMY").is_ok());
        assert_eq!(backend.releases.latest_release().unwrap().assets.len(), 4);
    }
}
