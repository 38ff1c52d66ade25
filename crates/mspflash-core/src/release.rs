//! Release source abstraction
//!
//! Firmware packages are published as assets of a release. The listing
//! format follows the GitHub releases API; field names are mapped onto the
//! pipeline's own names.

use std::io::Read;

use serde::Deserialize;

use crate::error::Result;

/// Fallback text when a release carries no notes
pub const NO_NOTES: &str = "No description available";

/// One downloadable file of a release
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseAsset {
    /// File name
    #[serde(rename = "name")]
    pub filename: String,
    /// Direct download URL
    #[serde(rename = "browser_download_url")]
    pub download_url: String,
    /// Declared size in bytes (0 when unknown)
    #[serde(rename = "size", default)]
    pub byte_size: u64,
}

/// A release listing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseInfo {
    /// Version tag
    #[serde(default)]
    pub tag_name: Option<String>,
    /// Free-text release notes
    #[serde(default)]
    pub body: Option<String>,
    /// Published assets in listing order
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

impl ReleaseInfo {
    /// Version tag, `"Unknown"` when absent
    pub fn version(&self) -> &str {
        self.tag_name.as_deref().unwrap_or("Unknown")
    }

    /// Release notes, a fixed text when absent
    pub fn notes(&self) -> &str {
        self.body.as_deref().unwrap_or(NO_NOTES)
    }
}

/// Whether `latest` is newer than the installed version
///
/// Any differing tag counts as an update; without a current version an
/// update is always offered.
pub fn check_for_updates(latest: &ReleaseInfo, current: Option<&str>) -> bool {
    match current {
        Some(current) => latest.version() != current,
        None => true,
    }
}

/// Source of release listings and asset bytes
pub trait ReleaseClient {
    /// Fetch the latest release listing
    fn latest_release(&self) -> Result<ReleaseInfo>;

    /// Open a byte stream for `asset`
    ///
    /// Non-success responses are reported as [`crate::Error::Download`].
    fn download(&self, asset: &ReleaseAsset) -> Result<Box<dyn Read + Send>>;
}

impl<T: ReleaseClient + ?Sized> ReleaseClient for &T {
    fn latest_release(&self) -> Result<ReleaseInfo> {
        (**self).latest_release()
    }

    fn download(&self, asset: &ReleaseAsset) -> Result<Box<dyn Read + Send>> {
        (**self).download(asset)
    }
}

impl<T: ReleaseClient + ?Sized> ReleaseClient for Box<T> {
    fn latest_release(&self) -> Result<ReleaseInfo> {
        (**self).latest_release()
    }

    fn download(&self, asset: &ReleaseAsset) -> Result<Box<dyn Read + Send>> {
        (**self).download(asset)
    }
}
