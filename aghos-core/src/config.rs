//! Install configuration: an optional TOML file, overridden by CLI flags.

use crate::boot_config::BootSettings;
use crate::config_states::{HasRunMode, ValidateConfig};
use crate::disk_ops::DevicePoll;
use crate::partitioning::{normalize_mountpoint, TableKind};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_INSTALL_ROOT: &str = "/mnt";
pub const DEFAULT_JOURNAL_PATH: &str = "/var/log/aghos/install-state.json";

/// One row of the partition editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionEntry {
    /// Size literal, e.g. `512M`, `40G`, `15%`.
    pub size: String,
    #[serde(default)]
    pub mountpoint: String,
    pub fs: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl PartitionEntry {
    pub fn new(size: &str, fs: &str, mountpoint: &str, name: Option<&str>) -> Self {
        Self {
            size: size.to_string(),
            mountpoint: mountpoint.to_string(),
            fs: fs.to_string(),
            name: name.map(str::to_string),
        }
    }

    pub fn default_template() -> Vec<PartitionEntry> {
        vec![
            PartitionEntry::new("1G", "vfat", "/boot", Some("boot")),
            PartitionEntry::new("40G", "btrfs", "/", Some("root")),
            PartitionEntry::new("8G", "swap", "swap", Some("swap")),
            PartitionEntry::new("20G", "btrfs", "/home", Some("home")),
        ]
    }
}

/// An already existing partition mapped onto a mountpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingMount {
    pub device: PathBuf,
    pub mountpoint: String,
    pub fs: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallConfig {
    pub disk: Option<PathBuf>,
    pub table: TableKind,
    pub root: PathBuf,
    pub partitions: Vec<PartitionEntry>,
    pub existing: Vec<ExistingMount>,
    pub format_existing: bool,
    pub boot: BootSettings,
    pub device_poll_attempts: u32,
    pub device_poll_interval_ms: u64,
    pub activate_swap: bool,
    pub journal_path: PathBuf,
    pub dry_run: bool,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            disk: None,
            table: TableKind::Gpt,
            root: PathBuf::from(DEFAULT_INSTALL_ROOT),
            partitions: Vec::new(),
            existing: Vec::new(),
            format_existing: true,
            boot: BootSettings::default(),
            device_poll_attempts: 10,
            device_poll_interval_ms: 500,
            activate_swap: true,
            journal_path: PathBuf::from(DEFAULT_JOURNAL_PATH),
            dry_run: false,
        }
    }
}

impl InstallConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("failed to parse install config TOML")
    }

    /// Configured entries, or the default template when none are given.
    pub fn partition_entries(&self) -> Vec<PartitionEntry> {
        if self.partitions.is_empty() {
            PartitionEntry::default_template()
        } else {
            self.partitions.clone()
        }
    }

    pub fn device_poll(&self) -> DevicePoll {
        DevicePoll {
            attempts: self.device_poll_attempts,
            interval: Duration::from_millis(self.device_poll_interval_ms),
        }
    }

    pub fn require_disk(&self) -> Result<&Path> {
        self.disk
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("No target disk configured (use --disk)"))
    }
}

impl ValidateConfig for InstallConfig {
    fn validate_cfg(&self) -> Result<()> {
        if !self.root.is_absolute() {
            anyhow::bail!("Install root must be absolute: {}", self.root.display());
        }
        if self.root == Path::new("/") {
            anyhow::bail!("Install root cannot be the running system's /");
        }
        if self.device_poll_attempts == 0 {
            anyhow::bail!("device_poll_attempts must be at least 1");
        }
        if let Some(disk) = &self.disk {
            if !disk.starts_with("/dev/") {
                anyhow::bail!("Target disk must be a /dev node: {}", disk.display());
            }
        }
        for (idx, entry) in self.existing.iter().enumerate() {
            if !entry.device.starts_with("/dev/") {
                anyhow::bail!(
                    "Existing mount #{} device must be a /dev node: {}",
                    idx + 1,
                    entry.device.display()
                );
            }
        }
        let mut seen = HashSet::new();
        for entry in &self.existing {
            if entry.mountpoint == "swap" {
                continue;
            }
            let mountpoint = normalize_mountpoint(&entry.mountpoint);
            if seen.contains(&mountpoint) {
                anyhow::bail!(
                    "Mountpoint {} is mapped more than once (second: {})",
                    mountpoint,
                    entry.device.display()
                );
            }
            seen.insert(mountpoint);
        }
        Ok(())
    }
}

impl HasRunMode for InstallConfig {
    fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let cfg = InstallConfig::parse("").unwrap();
        assert_eq!(cfg, InstallConfig::default());
        assert_eq!(cfg.partition_entries().len(), 4);
        assert_eq!(cfg.boot.bootloader_id, "AGHOS");
        assert_eq!(cfg.device_poll().interval, Duration::from_millis(500));
        assert!(cfg.validate_cfg().is_ok());
    }

    #[test]
    fn parses_partitions_and_boot_settings() {
        let cfg = InstallConfig::parse(
            r#"
            disk = "/dev/vda"
            table = "mbr"
            activate_swap = false

            [[partitions]]
            size = "30G"
            mountpoint = "/"
            fs = "ext4"

            [[partitions]]
            size = "15%"
            mountpoint = "/home"
            fs = "xfs"
            name = "home"

            [boot]
            distributor = "AGHOS Edge"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.disk.as_deref(), Some(Path::new("/dev/vda")));
        assert_eq!(cfg.table, TableKind::Mbr);
        assert!(!cfg.activate_swap);
        assert_eq!(cfg.partition_entries().len(), 2);
        assert_eq!(cfg.partitions[1].name.as_deref(), Some("home"));
        assert_eq!(cfg.boot.distributor, "AGHOS Edge");
        assert_eq!(cfg.boot.bootloader_id, "AGHOS");
    }

    #[test]
    fn rejects_unsafe_roots_and_devices() {
        let cfg = InstallConfig {
            root: PathBuf::from("/"),
            ..InstallConfig::default()
        };
        assert!(cfg.validate_cfg().is_err());

        let cfg = InstallConfig {
            disk: Some(PathBuf::from("sda")),
            ..InstallConfig::default()
        };
        assert!(cfg.validate_cfg().is_err());
        assert!(InstallConfig::default().require_disk().is_err());
    }

    #[test]
    fn existing_mountpoints_must_be_unique() {
        let mapped = |pairs: &[(&str, &str)]| InstallConfig {
            existing: pairs
                .iter()
                .map(|(dev, mp)| ExistingMount {
                    device: PathBuf::from(dev),
                    mountpoint: mp.to_string(),
                    fs: if *mp == "swap" { "swap" } else { "ext4" }.to_string(),
                })
                .collect(),
            ..InstallConfig::default()
        };

        let err = mapped(&[("/dev/sda2", "/"), ("/dev/sda3", "/")])
            .validate_cfg()
            .unwrap_err();
        assert!(err.to_string().contains("mapped more than once"));
        assert!(err.to_string().contains("/dev/sda3"));

        assert!(mapped(&[("/dev/sda2", "/home"), ("/dev/sda3", "/home/")])
            .validate_cfg()
            .is_err());
        assert!(mapped(&[
            ("/dev/sda2", "/"),
            ("/dev/sda3", "swap"),
            ("/dev/sdb1", "swap"),
            ("/dev/sda4", "/home"),
        ])
        .validate_cfg()
        .is_ok());
    }

    #[test]
    fn unknown_table_kind_fails_to_parse() {
        assert!(InstallConfig::parse("table = \"zfs\"").is_err());
    }
}
