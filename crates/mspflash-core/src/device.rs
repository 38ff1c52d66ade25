//! Device identification types and normalization rules
//!
//! Flash capacity reported by a device (or typed by a user) is free text.
//! Before it gates package selection it is normalized into one of two
//! [`CapacityBucket`]s. The fallback is always the smaller bucket: declaring
//! too much flash lets the tool address sectors that do not exist, while
//! declaring too little only leaves space unused.

use core::fmt;
use core::str::FromStr;

/// Value reported for fields the probe could not determine
pub const UNKNOWN: &str = "unknown";

/// Flash capacity as reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashCapacity {
    /// 1 MB
    Mb1,
    /// 2 MB
    Mb2,
    /// 4 MB
    Mb4,
    /// 8 MB
    Mb8,
    /// 16 MB
    Mb16,
    /// Not reported
    Unknown,
}

impl FlashCapacity {
    /// Parse a size such as `"4MB"`, `"4 MB"` or `"16mb"`
    ///
    /// Returns [`FlashCapacity::Unknown`] for anything that is not one of
    /// the five supported sizes.
    pub fn parse(s: &str) -> Self {
        let compact: String = s
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_uppercase();
        let digits = compact.strip_suffix("MB").unwrap_or(&compact);
        match digits {
            "1" => FlashCapacity::Mb1,
            "2" => FlashCapacity::Mb2,
            "4" => FlashCapacity::Mb4,
            "8" => FlashCapacity::Mb8,
            "16" => FlashCapacity::Mb16,
            _ => FlashCapacity::Unknown,
        }
    }

    /// Size in megabytes, if known
    pub fn megabytes(self) -> Option<u32> {
        match self {
            FlashCapacity::Mb1 => Some(1),
            FlashCapacity::Mb2 => Some(2),
            FlashCapacity::Mb4 => Some(4),
            FlashCapacity::Mb8 => Some(8),
            FlashCapacity::Mb16 => Some(16),
            FlashCapacity::Unknown => None,
        }
    }
}

impl fmt::Display for FlashCapacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.megabytes() {
            Some(mb) => write!(f, "{}MB", mb),
            None => f.write_str(UNKNOWN),
        }
    }
}

/// How a probed value was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    /// Read back from the device
    Measured,
    /// Inferred or defaulted
    Estimated,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::Measured => f.write_str("measured"),
            Confidence::Estimated => f.write_str("estimated"),
        }
    }
}

/// Supported flash size classes for package selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CapacityBucket {
    /// 4 MB packages
    #[default]
    Mb4,
    /// 8 MB packages
    Mb8,
}

impl CapacityBucket {
    /// Normalize free text into a bucket
    ///
    /// Any text containing `4` selects 4 MB, otherwise any text containing
    /// `8` selects 8 MB; everything else falls back to 4 MB.
    pub fn normalize(s: &str) -> Self {
        let s = s.to_ascii_uppercase().replace(' ', "");
        if s.contains('4') {
            CapacityBucket::Mb4
        } else if s.contains('8') {
            CapacityBucket::Mb8
        } else {
            CapacityBucket::Mb4
        }
    }

    /// Size string passed to the vendor tool (`--flash_size`)
    pub fn as_str(self) -> &'static str {
        match self {
            CapacityBucket::Mb4 => "4MB",
            CapacityBucket::Mb8 => "8MB",
        }
    }

    /// Token identifying the bucket in release asset names
    pub fn asset_token(self) -> &'static str {
        match self {
            CapacityBucket::Mb4 => "FLASH4MB",
            CapacityBucket::Mb8 => "FLASH8MB",
        }
    }
}

impl fmt::Display for CapacityBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operating system the pipeline runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPlatform {
    /// Windows
    Windows,
    /// macOS
    MacOs,
    /// Linux
    Linux,
}

impl HostPlatform {
    /// Platform this binary was built for
    ///
    /// Any other unix-like target is treated as Linux.
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            HostPlatform::Windows
        } else if cfg!(target_os = "macos") {
            HostPlatform::MacOs
        } else {
            HostPlatform::Linux
        }
    }

    /// Token identifying the platform in release asset names
    ///
    /// Linux hosts use the macOS package: the release process publishes no
    /// Linux archive and the binaries inside are platform independent.
    pub fn asset_token(self) -> &'static str {
        match self {
            HostPlatform::Windows => "win64",
            HostPlatform::MacOs | HostPlatform::Linux => "macos",
        }
    }
}

impl FromStr for HostPlatform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "windows" | "win" | "win64" => Ok(HostPlatform::Windows),
            "macos" | "darwin" | "mac" => Ok(HostPlatform::MacOs),
            "linux" => Ok(HostPlatform::Linux),
            other => Err(format!(
                "Unknown platform '{}' (expected windows, macos or linux)",
                other
            )),
        }
    }
}

impl fmt::Display for HostPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostPlatform::Windows => f.write_str("windows"),
            HostPlatform::MacOs => f.write_str("macos"),
            HostPlatform::Linux => f.write_str("linux"),
        }
    }
}

/// What the probe learned about the attached device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Chip model, or [`UNKNOWN`]
    pub chip_model: String,
    /// Hardware MAC address, or [`UNKNOWN`]
    pub mac_address: String,
    /// Flash capacity
    pub flash_capacity: FlashCapacity,
    /// Whether `flash_capacity` was read from the device
    pub confidence: Confidence,
}

impl DeviceInfo {
    /// Info for a device that gave no usable reply
    pub fn unknown() -> Self {
        Self {
            chip_model: UNKNOWN.to_string(),
            mac_address: UNKNOWN.to_string(),
            flash_capacity: FlashCapacity::Unknown,
            confidence: Confidence::Estimated,
        }
    }

    /// True when the chip model could not be determined
    ///
    /// The result is still usable; the fixed region map does not depend on
    /// the model.
    pub fn is_degraded(&self) -> bool {
        self.chip_model == UNKNOWN
    }

    /// Bucket to use for package selection and writing
    pub fn capacity_bucket(&self) -> CapacityBucket {
        match self.flash_capacity {
            FlashCapacity::Unknown => CapacityBucket::Mb4,
            known => CapacityBucket::normalize(&known.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_four_and_eight() {
        for s in ["4MB", "4mb", "4 MB", " 4", "FLASH4MB", "4"] {
            assert_eq!(CapacityBucket::normalize(s), CapacityBucket::Mb4, "{}", s);
        }
        for s in ["8MB", "8mb", "8 MB", "8", "flash 8 mb"] {
            assert_eq!(CapacityBucket::normalize(s), CapacityBucket::Mb8, "{}", s);
        }
    }

    #[test]
    fn normalize_defaults_to_four() {
        for s in ["", "2MB", "16MB", "unknown", "MB", "lots"] {
            assert_eq!(CapacityBucket::normalize(s), CapacityBucket::Mb4, "{}", s);
        }
    }

    #[test]
    fn parse_flash_capacity() {
        assert_eq!(FlashCapacity::parse("4MB"), FlashCapacity::Mb4);
        assert_eq!(FlashCapacity::parse("16 mb"), FlashCapacity::Mb16);
        assert_eq!(FlashCapacity::parse("2"), FlashCapacity::Mb2);
        assert_eq!(FlashCapacity::parse("32MB"), FlashCapacity::Unknown);
        assert_eq!(FlashCapacity::parse(""), FlashCapacity::Unknown);
    }

    #[test]
    fn unknown_device_uses_small_bucket() {
        let info = DeviceInfo::unknown();
        assert!(info.is_degraded());
        assert_eq!(info.capacity_bucket(), CapacityBucket::Mb4);

        let info = DeviceInfo {
            flash_capacity: FlashCapacity::Mb8,
            confidence: Confidence::Measured,
            ..DeviceInfo::unknown()
        };
        assert_eq!(info.capacity_bucket(), CapacityBucket::Mb8);
    }

    #[test]
    fn linux_uses_macos_assets() {
        assert_eq!(HostPlatform::Linux.asset_token(), "macos");
        assert_eq!(HostPlatform::MacOs.asset_token(), "macos");
        assert_eq!(HostPlatform::Windows.asset_token(), "win64");
    }

    #[test]
    fn platform_from_str() {
        assert_eq!("Darwin".parse::<HostPlatform>(), Ok(HostPlatform::MacOs));
        assert_eq!("linux".parse::<HostPlatform>(), Ok(HostPlatform::Linux));
        assert!("beos".parse::<HostPlatform>().is_err());
    }
}
