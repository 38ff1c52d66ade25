//! Firmware packages and file classification
//!
//! An unpacked release archive holds the four binaries at arbitrary depth.
//! Files are assigned to roles by an ordered list of [`ClassificationRule`]s;
//! the first rule matching a file name wins. The default rules are:
//!
//! | Rule                                   | Role            |
//! |----------------------------------------|-----------------|
//! | name contains `bootloader`, ends `.bin` | bootloader      |
//! | name contains `partitions`, ends `.bin` | partition table |
//! | name contains `boot_app0`, ends `.bin`  | boot selector   |
//! | name is exactly `msp-firmware.ino.bin`  | application     |
//!
//! The application rule is an exact match because its generic name would
//! otherwise also catch e.g. `msp-firmware.ino.bootloader.bin`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::region::{FlashRegionMap, Region, Role};

/// Exact file name of the application binary
pub const APPLICATION_FILE: &str = "msp-firmware.ino.bin";

/// How a rule tests a file name
#[derive(Debug, Clone, Copy)]
pub enum Matcher {
    /// Name contains `needle` and ends with `suffix`
    Contains {
        /// Substring to look for
        needle: &'static str,
        /// Required suffix (empty for none)
        suffix: &'static str,
    },
    /// Name equals the given string
    Exact(&'static str),
    /// Arbitrary predicate
    Custom(fn(&str) -> bool),
}

impl Matcher {
    /// Test a bare file name
    pub fn matches(&self, file_name: &str) -> bool {
        match self {
            Matcher::Contains { needle, suffix } => {
                file_name.contains(needle) && file_name.ends_with(suffix)
            }
            Matcher::Exact(name) => file_name == *name,
            Matcher::Custom(pred) => pred(file_name),
        }
    }
}

/// A (predicate, role) pair
#[derive(Debug, Clone, Copy)]
pub struct ClassificationRule {
    /// File name test
    pub matcher: Matcher,
    /// Role assigned on match
    pub role: Role,
}

/// Ordered classification strategy
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<ClassificationRule>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(vec![
            ClassificationRule {
                matcher: Matcher::Contains {
                    needle: "bootloader",
                    suffix: ".bin",
                },
                role: Role::Bootloader,
            },
            ClassificationRule {
                matcher: Matcher::Contains {
                    needle: "partitions",
                    suffix: ".bin",
                },
                role: Role::PartitionTable,
            },
            ClassificationRule {
                matcher: Matcher::Contains {
                    needle: "boot_app0",
                    suffix: ".bin",
                },
                role: Role::BootSelector,
            },
            ClassificationRule {
                matcher: Matcher::Exact(APPLICATION_FILE),
                role: Role::Application,
            },
        ])
    }
}

impl Classifier {
    /// Create a classifier from rules tried in order
    pub fn new(rules: Vec<ClassificationRule>) -> Self {
        Self { rules }
    }

    /// Role of a file name, if any rule matches
    pub fn classify(&self, file_name: &str) -> Option<Role> {
        self.rules
            .iter()
            .find(|rule| rule.matcher.matches(file_name))
            .map(|rule| rule.role)
    }

    /// Walk `root` recursively and classify every regular file
    ///
    /// Entries are visited in sorted order so that the result is stable.
    /// When two files claim the same role the first one visited is kept.
    pub fn classify_dir(&self, root: &Path) -> Result<BTreeMap<Role, PathBuf>> {
        let mut found = BTreeMap::new();
        self.walk(root, &mut found)?;
        Ok(found)
    }

    fn walk(&self, dir: &Path, found: &mut BTreeMap<Role, PathBuf>) -> Result<()> {
        let mut entries = fs::read_dir(dir)?
            .map(|e| e.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        entries.sort();

        for path in entries {
            if path.is_dir() {
                self.walk(&path, found)?;
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(role) = self.classify(name) else {
                continue;
            };
            if let Some(existing) = found.get(&role) {
                log::warn!(
                    "Ignoring {} for {}, already using {}",
                    path.display(),
                    role,
                    existing.display()
                );
                continue;
            }
            log::debug!("{} -> {}", path.display(), role);
            found.insert(role, path);
        }
        Ok(())
    }
}

/// A release archive plus its classified region files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwarePackage {
    /// Bootloader binary
    pub bootloader_path: Option<PathBuf>,
    /// Partition table binary
    pub partition_table_path: Option<PathBuf>,
    /// Boot selector binary
    pub boot_selector_path: Option<PathBuf>,
    /// Application binary
    pub application_path: Option<PathBuf>,
    /// Downloaded archive
    pub origin_archive_path: PathBuf,
    /// Directory the archive was unpacked into
    pub extraction_root: PathBuf,
}

impl FirmwarePackage {
    /// Create a package with no classified files
    pub fn new(origin_archive_path: PathBuf, extraction_root: PathBuf) -> Self {
        Self {
            bootloader_path: None,
            partition_table_path: None,
            boot_selector_path: None,
            application_path: None,
            origin_archive_path,
            extraction_root,
        }
    }

    /// Classify the contents of `extraction_root`
    ///
    /// The returned package may be incomplete; see [`Self::require_complete`].
    pub fn scan(
        origin_archive_path: PathBuf,
        extraction_root: PathBuf,
        classifier: &Classifier,
    ) -> Result<Self> {
        let mut package = Self::new(origin_archive_path, extraction_root);
        for (role, path) in classifier.classify_dir(&package.extraction_root)? {
            package.set_path(role, path);
        }
        Ok(package)
    }

    /// Path of a role
    pub fn path(&self, role: Role) -> Option<&Path> {
        match role {
            Role::Bootloader => self.bootloader_path.as_deref(),
            Role::PartitionTable => self.partition_table_path.as_deref(),
            Role::BootSelector => self.boot_selector_path.as_deref(),
            Role::Application => self.application_path.as_deref(),
        }
    }

    /// Set the path of a role
    pub fn set_path(&mut self, role: Role, path: PathBuf) {
        let slot = match role {
            Role::Bootloader => &mut self.bootloader_path,
            Role::PartitionTable => &mut self.partition_table_path,
            Role::BootSelector => &mut self.boot_selector_path,
            Role::Application => &mut self.application_path,
        };
        *slot = Some(path);
    }

    /// Roles without a path, in address order
    pub fn missing_roles(&self) -> Vec<Role> {
        Role::ALL
            .into_iter()
            .filter(|role| self.path(*role).is_none())
            .collect()
    }

    /// True when all four roles have a path
    pub fn is_complete(&self) -> bool {
        self.missing_roles().is_empty()
    }

    /// Fail with [`Error::IncompletePackage`] unless complete
    pub fn require_complete(&self) -> Result<()> {
        let missing = self.missing_roles();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::IncompletePackage { missing })
        }
    }

    /// (region, file) pairs in address order, skipping missing roles
    pub fn regions(&self) -> Vec<(Region, &Path)> {
        FlashRegionMap::REGIONS
            .iter()
            .filter_map(|region| self.path(region.role).map(|p| (*region, p)))
            .collect()
    }

    /// Delete the extraction directory
    pub fn discard(self) -> Result<()> {
        if self.extraction_root.exists() {
            fs::remove_dir_all(&self.extraction_root)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rules() {
        let c = Classifier::default();
        assert_eq!(c.classify("bootloader-dio.bin"), Some(Role::Bootloader));
        assert_eq!(c.classify("msp-firmware.ino.partitions.bin"), Some(Role::PartitionTable));
        assert_eq!(c.classify("boot_app0.bin"), Some(Role::BootSelector));
        assert_eq!(c.classify("msp-firmware.ino.bin"), Some(Role::Application));
    }

    #[test]
    fn application_is_exact_match() {
        let c = Classifier::default();
        assert_eq!(c.classify("msp-firmware.ino.bin.bak"), None);
        assert_eq!(c.classify("old-msp-firmware.ino.bin"), None);
        assert_eq!(
            c.classify("msp-firmware.ino.bootloader.bin"),
            Some(Role::Bootloader)
        );
    }

    #[test]
    fn substring_roles_need_bin_suffix() {
        let c = Classifier::default();
        assert_eq!(c.classify("partitions.csv"), None);
        assert_eq!(c.classify("bootloader.elf"), None);
    }

    #[test]
    fn custom_rules_replace_defaults() {
        let c = Classifier::new(vec![ClassificationRule {
            matcher: Matcher::Custom(|name| name.starts_with("app")),
            role: Role::Application,
        }]);
        assert_eq!(c.classify("app.bin"), Some(Role::Application));
        assert_eq!(c.classify("bootloader.bin"), None);
    }

    #[test]
    fn classify_nested_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("build").join("esp32");
        fs::create_dir_all(&nested).unwrap();
        for name in ["bootloader-dio.bin", "partitions.bin", "boot_app0.bin"] {
            fs::write(nested.join(name), b"x").unwrap();
        }
        fs::write(dir.path().join(APPLICATION_FILE), b"x").unwrap();
        fs::write(dir.path().join("README.txt"), b"x").unwrap();

        let package = FirmwarePackage::scan(
            dir.path().join("pkg.zip"),
            dir.path().to_path_buf(),
            &Classifier::default(),
        )
        .unwrap();
        assert!(package.is_complete());
        assert_eq!(
            package.path(Role::BootSelector),
            Some(nested.join("boot_app0.bin").as_path())
        );
        let addresses: Vec<u32> = package.regions().iter().map(|(r, _)| r.address).collect();
        assert_eq!(addresses, vec![0x1000, 0x8000, 0xE000, 0x10000]);
    }

    #[test]
    fn missing_roles_are_named() {
        let mut package = FirmwarePackage::new(PathBuf::from("a.zip"), PathBuf::from("a"));
        package.set_path(Role::Bootloader, PathBuf::from("a/bootloader.bin"));
        package.set_path(Role::Application, PathBuf::from("a/msp-firmware.ino.bin"));

        assert!(!package.is_complete());
        match package.require_complete() {
            Err(Error::IncompletePackage { missing }) => {
                assert_eq!(missing, vec![Role::PartitionTable, Role::BootSelector]);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
