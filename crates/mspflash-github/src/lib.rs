//! mspflash-github - GitHub releases backend for mspflash
//!
//! Implements [`ReleaseClient`] on top of the public REST API:
//!
//! - `GET {api}/repos/{owner}/{repo}/releases/latest` for the listing
//! - `GET {browser_download_url}` for asset bytes
//!
//! Requests are blocking; callers run them on a worker thread.

use std::io::Read;
use std::time::Duration;

use mspflash_core::{ReleaseAsset, ReleaseClient, ReleaseInfo};
use thiserror::Error;

/// Default API endpoint
pub const DEFAULT_API: &str = "https://api.github.com";

/// Timeout for the release listing request
const LISTING_TIMEOUT: Duration = Duration::from_secs(10);
/// Timeout for establishing a download connection
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// GitHub backend errors
#[derive(Debug, Error)]
pub enum GithubError {
    /// Repository is not `owner/repo`
    #[error("Invalid repository '{0}' (expected owner/repo)")]
    InvalidRepository(String),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("{url} returned HTTP {status}")]
    Status {
        /// Requested URL
        url: String,
        /// Response status
        status: u16,
    },

    /// Listing is not valid JSON
    #[error("Invalid release listing: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<GithubError> for mspflash_core::Error {
    fn from(e: GithubError) -> Self {
        match e {
            GithubError::InvalidRepository(_) => mspflash_core::Error::Config(e.to_string()),
            other => mspflash_core::Error::Download(other.to_string()),
        }
    }
}

/// Parse a release listing document
pub fn parse_release(json: &str) -> Result<ReleaseInfo, GithubError> {
    Ok(serde_json::from_str(json)?)
}

/// Release client for one GitHub repository
#[derive(Debug, Clone)]
pub struct GithubClient {
    http: reqwest::blocking::Client,
    repository: String,
    api_base: String,
}

impl GithubClient {
    /// Create a client for `owner/repo`
    pub fn new(repository: &str) -> Result<Self, GithubError> {
        let valid = matches!(
            repository.split_once('/'),
            Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/')
        );
        if !valid {
            return Err(GithubError::InvalidRepository(repository.to_string()));
        }

        let http = reqwest::blocking::Client::builder()
            .user_agent(concat!("mspflash/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(None)
            .build()?;

        Ok(Self {
            http,
            repository: repository.to_string(),
            api_base: DEFAULT_API.to_string(),
        })
    }

    /// Use a different API endpoint (GitHub Enterprise, mirrors)
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    /// Repository this client reads from
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// URL of the latest-release listing
    pub fn latest_release_url(&self) -> String {
        format!("{}/repos/{}/releases/latest", self.api_base, self.repository)
    }

    fn get(
        &self,
        url: &str,
        timeout: Option<Duration>,
    ) -> Result<reqwest::blocking::Response, GithubError> {
        log::debug!("GET {}", url);
        let mut request = self.http.get(url);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(GithubError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

impl ReleaseClient for GithubClient {
    fn latest_release(&self) -> mspflash_core::Result<ReleaseInfo> {
        let url = self.latest_release_url();
        let body = self.get(&url, Some(LISTING_TIMEOUT))?.text().map_err(GithubError::from)?;
        let info = parse_release(&body)?;
        log::info!(
            "Latest release of {}: {} ({} assets)",
            self.repository,
            info.version(),
            info.assets.len()
        );
        Ok(info)
    }

    fn download(&self, asset: &ReleaseAsset) -> mspflash_core::Result<Box<dyn Read + Send>> {
        let response = self.get(&asset.download_url, None)?;
        Ok(Box::new(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"{
        "tag_name": "v2.1.0",
        "name": "v2.1.0",
        "body": "Bug fixes",
        "assets": [
            {
                "name": "msp-firmware-FLASH4MB-v2.1.0-macos.zip",
                "browser_download_url": "https://github.com/o/r/releases/download/v2.1.0/a.zip",
                "size": 912345,
                "content_type": "application/zip"
            },
            {
                "name": "msp-firmware.ino.bin",
                "browser_download_url": "https://github.com/o/r/releases/download/v2.1.0/b.bin",
                "size": 0
            }
        ]
    }"#;

    #[test]
    fn parses_listing() {
        let info = parse_release(LISTING).unwrap();
        assert_eq!(info.version(), "v2.1.0");
        assert_eq!(info.notes(), "Bug fixes");
        assert_eq!(info.assets.len(), 2);
        assert_eq!(info.assets[0].filename, "msp-firmware-FLASH4MB-v2.1.0-macos.zip");
        assert_eq!(info.assets[0].byte_size, 912345);
        assert!(info.assets[1].download_url.ends_with("b.bin"));
    }

    #[test]
    fn missing_fields_default() {
        let info = parse_release("{}").unwrap();
        assert_eq!(info.version(), "Unknown");
        assert!(info.assets.is_empty());
    }

    #[test]
    fn invalid_json_is_download_error() {
        let err: mspflash_core::Error = parse_release("<html>").unwrap_err().into();
        assert!(matches!(err, mspflash_core::Error::Download(_)));
    }

    #[test]
    fn repository_is_validated() {
        assert!(GithubClient::new("owner/repo").is_ok());
        for bad in ["", "owner", "/repo", "owner/", "a/b/c"] {
            assert!(
                matches!(GithubClient::new(bad), Err(GithubError::InvalidRepository(_))),
                "{}",
                bad
            );
        }
    }

    #[test]
    fn listing_url() {
        let client = GithubClient::new("owner/repo")
            .unwrap()
            .with_api_base("http://localhost:8080/");
        assert_eq!(
            client.latest_release_url(),
            "http://localhost:8080/repos/owner/repo/releases/latest"
        );
    }
}
