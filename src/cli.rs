//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mspflash")]
#[command(author, version, about = "Firmware provisioning for MSP sensor boards", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (TOML format)
    /// Defaults to ./mspflash.toml when present
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Device and release backend [available: esptool, dummy]
    #[arg(long, global = true, default_value = "esptool")]
    pub backend: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options for locating a firmware package
#[derive(clap::Args, Debug, Clone, Default)]
pub struct PackageArgs {
    /// Flash capacity (4MB or 8MB, free text accepted)
    #[arg(short = 's', long)]
    pub flash_size: Option<String>,

    /// Host platform of the package (windows, macos, linux)
    #[arg(long)]
    pub platform: Option<String>,

    /// Directory for downloaded and unpacked packages
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// Download again even if an unpacked package is cached
    #[arg(long)]
    pub force: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List serial ports
    Ports,

    /// Identify the device on a serial port
    Probe {
        /// Serial port the device is attached to
        #[arg(short, long)]
        port: String,
    },

    /// Show the latest firmware release
    Release {
        /// Installed firmware version, to check for updates
        #[arg(long)]
        current: Option<String>,
    },

    /// Show which release asset matches a flash size and platform
    Resolve {
        /// Flash capacity (4MB or 8MB, free text accepted)
        #[arg(short = 's', long)]
        flash_size: String,

        /// Host platform (windows, macos, linux)
        #[arg(long)]
        platform: Option<String>,
    },

    /// Download and unpack the firmware package
    Fetch {
        #[command(flatten)]
        package: PackageArgs,
    },

    /// Write the firmware package to the device
    Flash {
        /// Serial port the device is attached to
        #[arg(short, long)]
        port: String,

        #[command(flatten)]
        package: PackageArgs,

        /// Use a local package archive instead of the latest release
        #[arg(long, conflicts_with = "app_only")]
        local: Option<PathBuf>,

        /// Write only this application binary (incremental update)
        #[arg(long)]
        app_only: Option<PathBuf>,

        /// Erase the whole flash before writing
        #[arg(long, conflicts_with = "app_only")]
        erase: bool,

        /// Serial baud rate
        #[arg(short, long)]
        baud: Option<u32>,
    },

    /// Erase the whole flash
    Erase {
        /// Serial port the device is attached to
        #[arg(short, long)]
        port: String,

        /// Don't ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}
