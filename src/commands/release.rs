//! Release and resolve commands

use mspflash_core::release::check_for_updates;
use mspflash_core::{resolve, CapacityBucket, HostPlatform, ReleaseClient};

fn format_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1} MiB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{} KiB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}

/// Parse a platform argument, defaulting to the running host
pub fn parse_platform(
    platform: Option<&str>,
) -> Result<HostPlatform, Box<dyn std::error::Error>> {
    match platform {
        Some(p) => Ok(p.parse()?),
        None => Ok(HostPlatform::current()),
    }
}

/// Show the latest release, its assets and whether it is an update
pub fn run_release<C: ReleaseClient + ?Sized>(
    client: &C,
    current: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let release = client.latest_release()?;

    println!("Latest release:  {}", release.version());
    println!();
    println!("{}", release.notes());
    println!();
    println!("{:<56} {:>10}", "Asset", "Size");
    println!("{}", "-".repeat(67));
    for asset in &release.assets {
        println!("{:<56} {:>10}", asset.filename, format_size(asset.byte_size));
    }

    if let Some(current) = current {
        println!();
        if check_for_updates(&release, Some(current)) {
            println!("Update available: {} -> {}", current, release.version());
        } else {
            println!("{} is the latest release", current);
        }
    }
    Ok(())
}

/// Show which asset would be fetched for `flash_size` on `platform`
pub fn run_resolve<C: ReleaseClient + ?Sized>(
    client: &C,
    flash_size: &str,
    platform: HostPlatform,
) -> Result<(), Box<dyn std::error::Error>> {
    let release = client.latest_release()?;
    let bucket = CapacityBucket::normalize(flash_size);
    let asset = resolve::resolve_str(&release.assets, flash_size, platform)?;

    println!("Release:   {}", release.version());
    println!("Bucket:    {} ({})", bucket, platform);
    println!("Asset:     {}", asset.filename);
    println!("Size:      {}", format_size(asset.byte_size));
    println!("URL:       {}", asset.download_url);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_are_human_readable() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(4096), "4 KiB");
        assert_eq!(format_size(3 * 1024 * 1024 / 2), "1.5 MiB");
    }

    #[test]
    fn platform_defaults_to_host() {
        assert_eq!(parse_platform(None).unwrap(), HostPlatform::current());
        assert_eq!(parse_platform(Some("win64")).unwrap(), HostPlatform::Windows);
        assert!(parse_platform(Some("amiga")).is_err());
    }
}
