//! mspflash-dummy - Scripted backends for testing
//!
//! [`DummyTool`] answers vendor-tool invocations from a script instead of a
//! real device, and [`DummyReleaseClient`] serves a release listing and
//! asset bytes from memory. Both record what they were asked to do so tests
//! can assert on it.

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::time::Duration;

use mspflash_core::error::{Error, Result};
use mspflash_core::package::APPLICATION_FILE;
use mspflash_core::tool::{ToolOutput, ToolRunner};
use mspflash_core::{FlashCapacity, FlashRegionMap, ReleaseAsset, ReleaseClient, ReleaseInfo};

/// Subcommands the vendor tool understands
const COMMANDS: &[&str] = &["read_mac", "flash_id", "write_flash", "erase_flash"];

/// Scripted reply for one subcommand
#[derive(Debug, Clone)]
enum Reply {
    Output(ToolOutput),
    Timeout,
}

/// Vendor tool emulator
#[derive(Debug, Clone, Default)]
pub struct DummyTool {
    replies: HashMap<String, Reply>,
    invocations: Vec<Vec<String>>,
}

impl DummyTool {
    /// A tool that answers every command with exit 0 and no output
    pub fn new() -> Self {
        Self::default()
    }

    /// A responsive ESP32 with the given flash size
    pub fn esp32(flash: FlashCapacity) -> Self {
        let ident = [
            "Serial port /dev/ttyDUMMY",
            "Connecting....",
            "Detecting chip type... ESP32",
            "Chip is ESP32-D0WD-V3 (revision v3.1)",
            "Features: WiFi, BT, Dual Core, 240MHz",
            "MAC: 24:6f:28:00:00:01",
        ];
        let mut flash_id: Vec<String> = ident.iter().map(|s| s.to_string()).collect();
        flash_id.push(format!("Detected flash size: {}", flash));
        flash_id.push("Hard resetting via RTS pin...".to_string());

        let mut write = vec!["Connecting....".to_string()];
        for region in FlashRegionMap::REGIONS {
            write.push(format!("Writing at 0x{:08x}... (50 %)", region.address));
            write.push(format!("Writing at 0x{:08x}... (100 %)", region.address + 0x400));
            write.push("Hash of data verified.".to_string());
        }
        write.push("Leaving...".to_string());
        write.push("Hard resetting via RTS pin...".to_string());

        Self::new()
            .reply("read_mac", 0, &ident)
            .reply("flash_id", 0, &flash_id)
            .reply("write_flash", 0, &write)
            .reply(
                "erase_flash",
                0,
                &["Erasing flash (this may take a while)...", "Chip erase completed successfully"],
            )
    }

    /// A device that answers but never says anything meaningful
    pub fn unresponsive() -> Self {
        let noise = ["\u{fffd}\u{fffd}", "ets Jun  8 2016 00:22:57", "rst:0x1"];
        Self::new()
            .reply("read_mac", 1, &noise)
            .reply("flash_id", 1, &noise)
    }

    /// Script the reply of `command`
    pub fn reply<S: AsRef<str>>(mut self, command: &str, exit_code: i32, lines: &[S]) -> Self {
        let output = ToolOutput {
            exit_code,
            lines: lines.iter().map(|l| l.as_ref().to_string()).collect(),
        };
        self.replies.insert(command.to_string(), Reply::Output(output));
        self
    }

    /// Make `command` exceed its timeout
    pub fn timeout(mut self, command: &str) -> Self {
        self.replies.insert(command.to_string(), Reply::Timeout);
        self
    }

    /// Argument lists of every invocation so far
    pub fn invocations(&self) -> &[Vec<String>] {
        &self.invocations
    }

    /// Number of invocations of `command`
    pub fn count(&self, command: &str) -> usize {
        self.invocations
            .iter()
            .filter(|args| args.iter().any(|a| a == command))
            .count()
    }
}

impl ToolRunner for DummyTool {
    fn run(
        &mut self,
        args: &[String],
        timeout: Option<Duration>,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<ToolOutput> {
        self.invocations.push(args.to_vec());
        let command = args
            .iter()
            .find(|a| COMMANDS.contains(&a.as_str()))
            .map(String::as_str)
            .unwrap_or("");
        log::debug!("dummy tool: {}", command);

        match self.replies.get(command) {
            Some(Reply::Output(output)) => {
                for line in &output.lines {
                    on_line(line);
                }
                Ok(output.clone())
            }
            Some(Reply::Timeout) => Err(Error::Timeout(
                timeout.map(|t| t.as_secs()).unwrap_or_default(),
            )),
            None => Ok(ToolOutput::default()),
        }
    }
}

/// In-memory release source
#[derive(Debug, Clone)]
pub struct DummyReleaseClient {
    info: ReleaseInfo,
    blobs: HashMap<String, Vec<u8>>,
    failing: bool,
}

impl DummyReleaseClient {
    /// An empty release with the given tag
    pub fn new(tag: &str) -> Self {
        Self {
            info: ReleaseInfo {
                tag_name: Some(tag.to_string()),
                body: Some(format!("Release {}", tag)),
                assets: Vec::new(),
            },
            blobs: HashMap::new(),
            failing: false,
        }
    }

    /// Release with complete 4 MB and 8 MB packages for both platforms
    pub fn with_standard_packages(tag: &str) -> Self {
        let archive = build_archive(&standard_files());
        let mut client = Self::new(tag);
        for size in ["4MB", "8MB"] {
            for platform in ["win64", "macos"] {
                let name = format!("msp-firmware-FLASH{}-{}-{}.zip", size, tag, platform);
                client = client.with_asset(&name, archive.clone());
            }
        }
        client
    }

    /// Publish an asset; its declared size is the blob length
    pub fn with_asset(self, name: &str, bytes: Vec<u8>) -> Self {
        let size = bytes.len() as u64;
        self.with_asset_declared(name, bytes, size)
    }

    /// Publish an asset with an explicit declared size
    pub fn with_asset_declared(mut self, name: &str, bytes: Vec<u8>, byte_size: u64) -> Self {
        let download_url = format!("dummy://{}/{}", self.info.version(), name);
        self.blobs.insert(download_url.clone(), bytes);
        self.info.assets.push(ReleaseAsset {
            filename: name.to_string(),
            download_url,
            byte_size,
        });
        self
    }

    /// Make every download fail as if the server returned an error
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }
}

impl ReleaseClient for DummyReleaseClient {
    fn latest_release(&self) -> Result<ReleaseInfo> {
        Ok(self.info.clone())
    }

    fn download(&self, asset: &ReleaseAsset) -> Result<Box<dyn Read + Send>> {
        if self.failing {
            return Err(Error::Download(format!(
                "{} returned HTTP 404",
                asset.download_url
            )));
        }
        let bytes = self
            .blobs
            .get(&asset.download_url)
            .cloned()
            .ok_or_else(|| Error::Download(format!("{} returned HTTP 404", asset.download_url)))?;
        Ok(Box::new(Cursor::new(bytes)))
    }
}

/// File names of a complete package
pub fn standard_files() -> Vec<&'static str> {
    vec![
        "msp-firmware/bootloader-dio.bin",
        "msp-firmware/partitions.bin",
        "msp-firmware/boot_app0.bin",
        APPLICATION_FILE,
    ]
}

/// Build a zip archive holding one small file per name
///
/// Panics if the in-memory writer fails, which only happens on allocation
/// failure.
pub fn build_archive(names: &[&str]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);
    for name in names {
        writer.start_file(*name, options).expect("zip entry");
        writer.write_all(name.as_bytes()).expect("zip data");
    }
    writer.finish().expect("zip finish").into_inner()
}
