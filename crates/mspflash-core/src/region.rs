//! Binary roles and the fixed flash region map
//!
//! A complete device image is made of four binaries, each written at a fixed
//! address. The table below must match the boot ROM of the target family;
//! it is not configurable.
//!
//! | Role            | Address   |
//! |-----------------|-----------|
//! | bootloader      | `0x1000`  |
//! | partition table | `0x8000`  |
//! | boot selector   | `0xE000`  |
//! | application     | `0x10000` |

use core::fmt;

/// Functional category of a binary inside a firmware package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    /// Second stage bootloader
    Bootloader,
    /// Partition table
    PartitionTable,
    /// OTA boot selector (`boot_app0`)
    BootSelector,
    /// Main application image
    Application,
}

impl Role {
    /// All roles in ascending address order
    pub const ALL: [Role; 4] = [
        Role::Bootloader,
        Role::PartitionTable,
        Role::BootSelector,
        Role::Application,
    ];

    /// Stable lowercase name
    pub fn name(self) -> &'static str {
        match self {
            Role::Bootloader => "bootloader",
            Role::PartitionTable => "partition_table",
            Role::BootSelector => "boot_selector",
            Role::Application => "application",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A fixed (address, role) pair written to device storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// Role of the binary stored here
    pub role: Role,
    /// Absolute device address
    pub address: u32,
}

impl Region {
    /// Address formatted the way the vendor tool expects it
    pub fn address_arg(&self) -> String {
        format!("0x{:x}", self.address)
    }
}

/// Compile-time role to address table
pub struct FlashRegionMap;

impl FlashRegionMap {
    /// Regions in ascending address order
    pub const REGIONS: [Region; 4] = [
        Region {
            role: Role::Bootloader,
            address: 0x1000,
        },
        Region {
            role: Role::PartitionTable,
            address: 0x8000,
        },
        Region {
            role: Role::BootSelector,
            address: 0xE000,
        },
        Region {
            role: Role::Application,
            address: 0x10000,
        },
    ];

    /// Address of a role
    pub const fn address(role: Role) -> u32 {
        match role {
            Role::Bootloader => 0x1000,
            Role::PartitionTable => 0x8000,
            Role::BootSelector => 0xE000,
            Role::Application => 0x10000,
        }
    }

    /// Region for a role
    pub const fn region(role: Role) -> Region {
        Region {
            role,
            address: Self::address(role),
        }
    }

    /// Find the region a device address falls into
    ///
    /// Each region spans from its own address up to the next region's
    /// address; the application region is open-ended. Addresses below the
    /// bootloader belong to no region.
    pub fn region_at(address: u32) -> Option<Region> {
        Self::REGIONS
            .iter()
            .rev()
            .find(|r| address >= r.address)
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_matches_address_fn() {
        for region in FlashRegionMap::REGIONS {
            assert_eq!(FlashRegionMap::address(region.role), region.address);
        }
    }

    #[test]
    fn region_at_uses_half_open_ranges() {
        assert_eq!(FlashRegionMap::region_at(0x0), None);
        assert_eq!(
            FlashRegionMap::region_at(0x1000).map(|r| r.role),
            Some(Role::Bootloader)
        );
        assert_eq!(
            FlashRegionMap::region_at(0x5400).map(|r| r.role),
            Some(Role::Bootloader)
        );
        assert_eq!(
            FlashRegionMap::region_at(0x8000).map(|r| r.role),
            Some(Role::PartitionTable)
        );
        assert_eq!(
            FlashRegionMap::region_at(0xE000).map(|r| r.role),
            Some(Role::BootSelector)
        );
        assert_eq!(
            FlashRegionMap::region_at(0x1F4000).map(|r| r.role),
            Some(Role::Application)
        );
    }

    #[test]
    fn address_arg_is_lower_hex() {
        assert_eq!(FlashRegionMap::region(Role::BootSelector).address_arg(), "0xe000");
        assert_eq!(FlashRegionMap::region(Role::Application).address_arg(), "0x10000");
    }
}
