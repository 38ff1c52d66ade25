//! Fetch command implementation

use super::progress::with_progress;
use mspflash_core::fetch::Fetcher;
use mspflash_core::{resolve, CapacityBucket, FirmwarePackage, HostPlatform, ReleaseClient};
use std::path::Path;

/// Latest package for `bucket`, from the cache unless `force` is set
pub fn fetch_package<C: ReleaseClient + Sync + ?Sized>(
    client: &C,
    bucket: CapacityBucket,
    platform: HostPlatform,
    dir: &Path,
    force: bool,
) -> Result<FirmwarePackage, Box<dyn std::error::Error>> {
    let release = client.latest_release()?;
    let version = release.version();
    println!("Latest release: {}", version);

    let asset = resolve::resolve(&release.assets, bucket, platform)?;
    let fetcher = Fetcher::new(client);
    if !force {
        if let Some(package) = fetcher.cached(&asset, version, bucket, dir) {
            println!(
                "Using cached package in {}",
                package.extraction_root.display()
            );
            return Ok(package);
        }
    }

    println!("Fetching {}", asset.filename);
    let package =
        with_progress(|sink| fetcher.fetch(&asset, version, bucket, dir, &sink))?;
    Ok(package)
}

/// Print the classified files of a package
pub fn print_package(package: &FirmwarePackage) {
    println!("Package in {}:", package.extraction_root.display());
    for (region, path) in package.regions() {
        println!(
            "  {:16} {:>8}  {}",
            region.role.name(),
            region.address_arg(),
            path.display()
        );
    }
}

/// Run the fetch command
pub fn run_fetch<C: ReleaseClient + Sync + ?Sized>(
    client: &C,
    bucket: CapacityBucket,
    platform: HostPlatform,
    dir: &Path,
    force: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let package = fetch_package(client, bucket, platform, dir, force)?;
    print_package(&package);
    Ok(())
}
