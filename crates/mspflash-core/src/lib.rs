//! mspflash-core - Firmware provisioning pipeline
//!
//! This crate provisions a microcontroller with a prebuilt firmware package.
//! The pipeline is made of five independent stages:
//!
//! - **probe** - identify chip model, MAC and flash capacity through the
//!   vendor flashing tool
//! - **resolve** - pick the release asset matching a capacity bucket and
//!   the host platform
//! - **fetch** - download the asset, unpack it and classify its binaries
//!   into [`Role`]s
//! - **write** - write all four regions in a single tool invocation
//! - **erase** - full-chip erase
//!
//! Stages never auto-advance: each returns a result and the caller decides
//! whether to start the next one.
//!
//! The vendor tool and the release source are reached through the
//! [`tool::ToolRunner`] and [`release::ReleaseClient`] traits so that
//! backends (and test fakes) live in separate crates.
//!
//! # Example
//!
//! ```ignore
//! use mspflash_core::{probe, resolve, HostPlatform};
//!
//! let info = probe::probe(&mut runner, "/dev/ttyUSB0")?;
//! let release = client.latest_release()?;
//! let asset = resolve::resolve(&release.assets, info.capacity_bucket(), HostPlatform::current())?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod device;
pub mod erase;
pub mod error;
pub mod fetch;
pub mod package;
pub mod probe;
pub mod progress;
pub mod region;
pub mod release;
pub mod resolve;
pub mod tool;
pub mod write;

pub use device::{CapacityBucket, Confidence, DeviceInfo, FlashCapacity, HostPlatform};
pub use erase::EraseResult;
pub use error::{Error, Result};
pub use package::FirmwarePackage;
pub use progress::{progress_channel, ProgressEvent, ProgressReceiver, ProgressSink, WritePhase};
pub use region::{FlashRegionMap, Role};
pub use release::{ReleaseAsset, ReleaseClient, ReleaseInfo};
pub use tool::{ToolOutput, ToolRunner};
pub use write::{WriteOptions, WriteResult};
