//! Flash command implementation
//!
//! Chains the stages an operator would run by hand: probe (unless the flash
//! size is given), resolve and fetch (or open a local package), optional
//! erase, then a single write of all four regions.

use super::erase::erase_with_progress;
use super::fetch::{fetch_package, print_package};
use super::probe::{print_device_info, probe_with_spinner};
use super::progress::with_progress;
use super::report;
use mspflash_core::fetch::open_local;
use mspflash_core::package::Classifier;
use mspflash_core::{
    write, CapacityBucket, FirmwarePackage, HostPlatform, ReleaseClient, ToolRunner, WriteOptions,
};
use std::path::{Path, PathBuf};

/// Where the firmware comes from
pub enum FlashSource {
    /// Latest release, cached or downloaded
    Release { platform: HostPlatform, force: bool },
    /// A package archive on disk
    Local(PathBuf),
    /// A single application binary (incremental update)
    ApplicationOnly(PathBuf),
}

/// Everything the flash command needs besides the backends
pub struct FlashArgs<'a> {
    pub port: &'a str,
    /// Capacity bucket, probed from the device when `None`
    pub bucket: Option<CapacityBucket>,
    pub source: FlashSource,
    pub dir: &'a Path,
    pub baud: u32,
    pub erase: bool,
}

/// Run the flash command
pub fn run_flash<R, C>(
    runner: &mut R,
    client: &C,
    args: FlashArgs<'_>,
) -> Result<(), Box<dyn std::error::Error>>
where
    R: ToolRunner + Send + ?Sized,
    C: ReleaseClient + Sync + ?Sized,
{
    let flash_size = match args.bucket {
        Some(bucket) => bucket,
        None => {
            let info = probe_with_spinner(runner, args.port)?;
            print_device_info(&info);
            println!();
            info.capacity_bucket()
        }
    };
    let options = WriteOptions {
        flash_size,
        baud: args.baud,
    };

    let package = match &args.source {
        FlashSource::ApplicationOnly(application) => {
            return write_application_only(runner, args.port, application, &options);
        }
        FlashSource::Local(archive) => open_package(archive, args.dir)?,
        FlashSource::Release { platform, force } => {
            fetch_package(client, flash_size, *platform, args.dir, *force)?
        }
    };
    print_package(&package);
    println!();

    if args.erase {
        erase_with_progress(runner, args.port)?;
    }

    let result = with_progress(|sink| {
        write::write_package(runner, args.port, &package, &options, &sink)
    })?;
    report(result)
}

fn write_application_only<R: ToolRunner + Send + ?Sized>(
    runner: &mut R,
    port: &str,
    application: &Path,
    options: &WriteOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("Warning: writing the application only.");
    eprintln!("The bootloader and partition table are left as they are; a blank or");
    eprintln!("erased device will not boot. Use a full package for new devices.");

    #[allow(deprecated)]
    let result =
        with_progress(|sink| write::write_application(runner, port, application, options, &sink))?;
    report(result)
}

fn open_package(
    archive: &Path,
    dir: &Path,
) -> Result<FirmwarePackage, Box<dyn std::error::Error>> {
    println!("Opening local package {}", archive.display());
    std::fs::create_dir_all(dir)?;
    Ok(open_local(archive, dir, &Classifier::default())?)
}
