//! mspflash - Firmware provisioning for MSP sensor boards
//!
//! Identifies an ESP32 on a serial port, picks the firmware package matching
//! its flash size from the latest release, downloads and unpacks it, and
//! writes bootloader, partition table, boot selector and application in one
//! pass of the vendor flashing tool.
//!
//! # Architecture
//!
//! The pipeline lives in `mspflash-core` and talks to the outside world
//! through two traits:
//! - **ToolRunner** - runs the vendor tool (`mspflash-esptool`, or the
//!   scripted `mspflash-dummy` tool)
//! - **ReleaseClient** - lists releases and streams assets
//!   (`mspflash-github`, or an in-memory release)
//!
//! Each stage runs on a worker thread and reports progress over a bounded
//! channel that this binary renders with indicatif.

mod backends;
mod cli;
mod commands;
mod config;

use backends::Backend;
use clap::Parser;
use cli::{Cli, Commands, PackageArgs};
use commands::flash::{FlashArgs, FlashSource};
use commands::release::parse_platform;
use config::Config;
use mspflash_core::CapacityBucket;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Ports => commands::ports::run_ports(),
        command => run_with_backend(command, &cli.backend, &config),
    }
}

/// Dispatch a command that talks to the device or the release source
fn run_with_backend(
    command: Commands,
    backend_name: &str,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut backend = Backend::open(backend_name, config)?;
    log::debug!("Using {} backend", backend.name);

    match command {
        Commands::Ports => commands::ports::run_ports(),
        Commands::Probe { port } => {
            backend.check_port(&port)?;
            commands::probe::run_probe(backend.tool.as_mut(), &port)
        }
        Commands::Release { current } => {
            commands::release::run_release(backend.releases.as_ref(), current.as_deref())
        }
        Commands::Resolve {
            flash_size,
            platform,
        } => commands::release::run_resolve(
            backend.releases.as_ref(),
            &flash_size,
            parse_platform(platform.as_deref())?,
        ),
        Commands::Fetch { package } => {
            let bucket = CapacityBucket::normalize(package.flash_size.as_deref().unwrap_or(""));
            commands::fetch::run_fetch(
                backend.releases.as_ref(),
                bucket,
                parse_platform(package.platform.as_deref())?,
                &download_dir(&package, config),
                package.force,
            )
        }
        Commands::Flash {
            port,
            package,
            local,
            app_only,
            erase,
            baud,
        } => {
            backend.check_port(&port)?;
            let source = match (local, app_only) {
                (_, Some(application)) => FlashSource::ApplicationOnly(application),
                (Some(archive), None) => FlashSource::Local(archive),
                (None, None) => FlashSource::Release {
                    platform: parse_platform(package.platform.as_deref())?,
                    force: package.force,
                },
            };
            let dir = download_dir(&package, config);
            let args = FlashArgs {
                port: &port,
                bucket: package.flash_size.as_deref().map(CapacityBucket::normalize),
                source,
                dir: &dir,
                baud: baud.unwrap_or(config.baud),
                erase,
            };
            commands::flash::run_flash(backend.tool.as_mut(), backend.releases.as_ref(), args)
        }
        Commands::Erase { port, yes } => {
            backend.check_port(&port)?;
            commands::erase::run_erase(backend.tool.as_mut(), &port, yes)
        }
    }
}

/// `--dir` if given, else the configured download directory
fn download_dir(args: &PackageArgs, config: &Config) -> PathBuf {
    args.dir
        .clone()
        .unwrap_or_else(|| config.download_dir.clone())
}
