//! Release asset selection
//!
//! Asset names follow `msp-firmware-FLASH<size>-v<version>-<platform>.zip`.
//! Two rules are tried in order and the first asset matching a rule wins:
//!
//! 1. name carries both the capacity token and the platform token
//! 2. name carries the capacity token only
//!
//! Only `.zip` archives are considered. Among several matches of the same
//! rule, listing order decides; no quality ranking is implied.

use crate::device::{CapacityBucket, HostPlatform};
use crate::error::{Error, Result};
use crate::release::ReleaseAsset;

/// Archive suffix of package assets
pub const ARCHIVE_SUFFIX: &str = ".zip";

fn is_candidate(asset: &ReleaseAsset, bucket: CapacityBucket) -> bool {
    asset.filename.ends_with(ARCHIVE_SUFFIX) && asset.filename.contains(bucket.asset_token())
}

/// Select the package asset for `bucket` on `platform`
pub fn resolve(
    candidates: &[ReleaseAsset],
    bucket: CapacityBucket,
    platform: HostPlatform,
) -> Result<ReleaseAsset> {
    let platform_token = platform.asset_token();

    let exact = candidates
        .iter()
        .find(|a| is_candidate(a, bucket) && a.filename.contains(platform_token));
    if let Some(asset) = exact {
        log::debug!("Selected {} for {} on {}", asset.filename, bucket, platform);
        return Ok(asset.clone());
    }

    let relaxed = candidates.iter().find(|a| is_candidate(a, bucket));
    if let Some(asset) = relaxed {
        log::warn!(
            "No {} package for {}, falling back to {}",
            bucket,
            platform,
            asset.filename
        );
        return Ok(asset.clone());
    }

    Err(Error::NoMatch {
        token: bucket.asset_token().to_string(),
    })
}

/// Same as [`resolve`], normalizing a free-text capacity first
pub fn resolve_str(
    candidates: &[ReleaseAsset],
    capacity: &str,
    platform: HostPlatform,
) -> Result<ReleaseAsset> {
    resolve(candidates, CapacityBucket::normalize(capacity), platform)
}
