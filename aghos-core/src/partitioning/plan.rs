//! User-editable partition plan and its validation.

use super::size::{parse_size, GIB, MIB};
use crate::config::PartitionEntry;
use crate::disk_ops::mkfs::is_swap_label;
use crate::errors::ProvisionError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Mountpoint sentinel for swap partitions.
pub const SWAP_MOUNTPOINT: &str = "swap";

const MBR_PRIMARY_LIMIT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableKind {
    #[default]
    Gpt,
    Mbr,
}

impl TableKind {
    /// Label understood by `parted mklabel`.
    pub fn parted_label(self) -> &'static str {
        match self {
            TableKind::Gpt => "gpt",
            TableKind::Mbr => "msdos",
        }
    }

    pub fn is_gpt(self) -> bool {
        self == TableKind::Gpt
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableKind::Gpt => write!(f, "GPT"),
            TableKind::Mbr => write!(f, "MBR"),
        }
    }
}

impl FromStr for TableKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gpt" => Ok(TableKind::Gpt),
            "mbr" | "msdos" | "dos" => Ok(TableKind::Mbr),
            other => Err(format!("unknown partition table kind: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Disk {
    pub path: PathBuf,
    pub total_bytes: u64,
    pub table: TableKind,
}

impl Disk {
    pub fn new(path: impl Into<PathBuf>, total_bytes: u64, table: TableKind) -> Self {
        Self {
            path: path.into(),
            total_bytes,
            table,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PartitionFlags {
    pub esp: bool,
    pub swap: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionSpec {
    /// Literal as typed; kept so edits can re-evaluate it.
    pub size_literal: String,
    pub size_bytes: u64,
    /// Absolute path, the `swap` sentinel, or empty for an unmounted partition.
    pub mountpoint: String,
    pub fs_label: String,
    pub name: Option<String>,
    pub flags: PartitionFlags,
}

impl PartitionSpec {
    /// Build a spec, evaluating `size_literal` against `disk_total` now.
    pub fn new(
        size_literal: &str,
        disk_total: u64,
        mountpoint: &str,
        fs_label: &str,
        name: Option<&str>,
    ) -> Self {
        let mountpoint = mountpoint.trim().to_string();
        let fs_label = fs_label.trim().to_ascii_lowercase();
        let flags = PartitionFlags {
            esp: mountpoint == "/boot",
            swap: is_swap_label(&fs_label),
        };
        Self {
            size_literal: size_literal.trim().to_string(),
            size_bytes: parse_size(size_literal, disk_total),
            mountpoint,
            fs_label,
            name: name
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
            flags,
        }
    }

    pub fn from_entry(entry: &PartitionEntry, disk_total: u64) -> Self {
        Self::new(
            &entry.size,
            disk_total,
            &entry.mountpoint,
            &entry.fs,
            entry.name.as_deref(),
        )
    }

    pub fn is_root(&self) -> bool {
        self.mountpoint == "/"
    }

    /// Swap by filesystem label or by the `swap` mountpoint sentinel.
    pub fn is_swap(&self) -> bool {
        self.flags.swap || self.mountpoint.eq_ignore_ascii_case(SWAP_MOUNTPOINT)
    }

    /// An absolute mountpoint other than `/`.
    pub fn is_sub_mount(&self) -> bool {
        !self.is_swap() && self.mountpoint.starts_with('/') && !self.is_root()
    }
}

/// Space accounting for a plan, as shown while editing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UsageSummary {
    pub total: u64,
    pub used: u64,
    /// Negative when the plan asks for more than the disk holds.
    pub free: i128,
    pub free_gib: f64,
    pub free_percent: f64,
    /// Sizes plus the leading offset and inter-partition gaps exceed the disk.
    pub over_provisioned: bool,
}

impl fmt::Display for UsageSummary {
    /// A deficit is printed as negative free space.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Free space: {:.1} GB ({:.1}%)",
            self.free as f64 / GIB as f64,
            self.free_percent
        )?;
        if self.over_provisioned {
            write!(f, " - over-provisioned")?;
        }
        Ok(())
    }
}

/// Ordered, editable list of partition specs for one disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionPlan {
    disk: Disk,
    specs: Vec<PartitionSpec>,
}

impl PartitionPlan {
    pub fn new(disk: Disk) -> Self {
        Self {
            disk,
            specs: Vec::new(),
        }
    }

    pub fn from_entries(disk: Disk, entries: &[PartitionEntry]) -> Self {
        let mut plan = Self::new(disk);
        for entry in entries {
            plan.add_entry(entry);
        }
        plan
    }

    /// `/boot` 1G vfat, `/` 40G btrfs, 8G swap, `/home` 20G btrfs.
    pub fn default_template(disk: Disk) -> Self {
        Self::from_entries(disk, &PartitionEntry::default_template())
    }

    pub fn disk(&self) -> &Disk {
        &self.disk
    }

    pub fn specs(&self) -> &[PartitionSpec] {
        &self.specs
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn push(&mut self, spec: PartitionSpec) {
        self.specs.push(spec);
    }

    pub fn add_entry(&mut self, entry: &PartitionEntry) {
        let spec = PartitionSpec::from_entry(entry, self.disk.total_bytes);
        self.specs.push(spec);
    }

    pub fn remove(&mut self, index: usize) -> Option<PartitionSpec> {
        if index < self.specs.len() {
            Some(self.specs.remove(index))
        } else {
            None
        }
    }

    /// Replace the entry at `index`, re-evaluating its size literal.
    pub fn update(&mut self, index: usize, entry: &PartitionEntry) -> bool {
        let total = self.disk.total_bytes;
        match self.specs.get_mut(index) {
            Some(slot) => {
                *slot = PartitionSpec::from_entry(entry, total);
                true
            }
            None => false,
        }
    }

    pub fn used_bytes(&self) -> u64 {
        self.specs
            .iter()
            .fold(0u64, |acc, s| acc.saturating_add(s.size_bytes))
    }

    /// 1 MiB leading offset + sizes + 1 MiB gap between partitions.
    pub fn required_bytes(&self) -> u64 {
        let gaps = (self.specs.len() as u64).saturating_sub(1);
        MIB.saturating_add(self.used_bytes())
            .saturating_add(gaps.saturating_mul(MIB))
    }

    pub fn free_bytes(&self) -> i128 {
        self.disk.total_bytes as i128 - self.used_bytes() as i128
    }

    pub fn usage(&self) -> UsageSummary {
        let total = self.disk.total_bytes;
        let free = self.free_bytes();
        let free_percent = if total == 0 {
            0.0
        } else {
            (free as f64 / total as f64 * 100.0).max(0.0)
        };
        UsageSummary {
            total,
            used: self.used_bytes(),
            free,
            free_gib: (free as f64 / GIB as f64).max(0.0),
            free_percent,
            over_provisioned: self.required_bytes() > total,
        }
    }

    /// Check every commit precondition. Touches nothing outside the plan.
    pub fn validate(self) -> Result<ValidatedPlan, ProvisionError> {
        let roots = self.specs.iter().filter(|s| s.is_root()).count();
        if roots == 0 {
            return Err(ProvisionError::MissingRoot);
        }
        if roots > 1 {
            return Err(ProvisionError::DuplicateRoot);
        }

        let mut seen = HashSet::new();
        for (idx, spec) in self.specs.iter().enumerate() {
            if spec.fs_label.is_empty() {
                return Err(ProvisionError::InvalidEntry {
                    index: idx + 1,
                    reason: "filesystem type is empty".to_string(),
                });
            }
            if spec.is_swap() || spec.mountpoint.is_empty() {
                continue;
            }
            if !spec.mountpoint.starts_with('/') {
                return Err(ProvisionError::InvalidEntry {
                    index: idx + 1,
                    reason: format!("mountpoint {} is not absolute", spec.mountpoint),
                });
            }
            if !seen.insert(normalize_mountpoint(&spec.mountpoint)) {
                return Err(ProvisionError::DuplicateMountpoint(spec.mountpoint.clone()));
            }
        }

        if self.disk.table == TableKind::Mbr && self.specs.len() > MBR_PRIMARY_LIMIT {
            return Err(ProvisionError::TooManyPrimaryPartitions(self.specs.len()));
        }

        let required = self.required_bytes();
        if required > self.disk.total_bytes {
            return Err(ProvisionError::OverProvisioned {
                disk: self.disk.path.clone(),
                required,
                available: self.disk.total_bytes,
            });
        }

        Ok(ValidatedPlan {
            disk: self.disk,
            specs: self.specs,
        })
    }
}

/// Strip trailing slashes so `/home/` and `/home` compare equal.
pub fn normalize_mountpoint(mountpoint: &str) -> String {
    let trimmed = mountpoint.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// A plan that passed [`PartitionPlan::validate`]; only obtainable that way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatedPlan {
    disk: Disk,
    specs: Vec<PartitionSpec>,
}

impl ValidatedPlan {
    pub fn disk(&self) -> &Disk {
        &self.disk
    }

    pub fn disk_path(&self) -> &Path {
        &self.disk.path
    }

    pub fn specs(&self) -> &[PartitionSpec] {
        &self.specs
    }

    pub fn into_parts(self) -> (Disk, Vec<PartitionSpec>) {
        (self.disk, self.specs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(size: &str, mp: &str, fs: &str) -> PartitionEntry {
        PartitionEntry {
            size: size.to_string(),
            mountpoint: mp.to_string(),
            fs: fs.to_string(),
            name: None,
        }
    }

    fn disk(gib: u64) -> Disk {
        Disk::new("/dev/sda", gib * GIB, TableKind::Gpt)
    }

    #[test]
    fn default_template_fits_on_64_gib() {
        let plan = PartitionPlan::default_template(disk(64));
        assert_eq!(plan.len(), 4);
        assert_eq!(plan.used_bytes(), 69 * GIB);
        assert!(plan.usage().over_provisioned);

        let plan = PartitionPlan::default_template(disk(128));
        let validated = plan.validate().unwrap();
        assert_eq!(validated.specs()[0].mountpoint, "/boot");
        assert!(validated.specs()[0].flags.esp);
        assert!(validated.specs()[2].is_swap());
    }

    #[test]
    fn usage_reports_negative_free_without_blocking_edits() {
        let mut plan = PartitionPlan::new(disk(10));
        plan.add_entry(&entry("8G", "/", "ext4"));
        plan.add_entry(&entry("4G", "/home", "ext4"));

        let usage = plan.usage();
        assert_eq!(usage.free, -2 * GIB as i128);
        assert_eq!(usage.free_gib, 0.0);
        assert_eq!(usage.free_percent, 0.0);
        assert!(usage.over_provisioned);

        assert!(plan.update(1, &entry("1G", "/home", "ext4")));
        assert_eq!(plan.usage().free, GIB as i128);
        assert!(!plan.usage().over_provisioned);
    }

    #[test]
    fn removing_an_entry_frees_its_space() {
        let mut plan = PartitionPlan::new(disk(10));
        plan.add_entry(&entry("8G", "/", "ext4"));
        plan.add_entry(&entry("4G", "/home", "ext4"));
        assert!(plan.usage().over_provisioned);
        assert_eq!(
            plan.usage().to_string(),
            "Free space: -2.0 GB (0.0%) - over-provisioned"
        );

        let removed = plan.remove(1).unwrap();
        assert_eq!(removed.mountpoint, "/home");
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.usage().used, 8 * GIB);
        assert_eq!(plan.usage().free, 2 * GIB as i128);
        assert!(!plan.usage().over_provisioned);

        assert!(plan.remove(1).is_none());
        assert!(plan.remove(usize::MAX).is_none());
        assert_eq!(plan.len(), 1);
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn over_provisioned_plan_is_rejected() {
        let mut plan = PartitionPlan::new(disk(10));
        plan.add_entry(&entry("10G", "/", "ext4"));
        let err = plan.validate().unwrap_err();
        assert!(matches!(err, ProvisionError::OverProvisioned { .. }));
    }

    #[test]
    fn gaps_count_against_capacity() {
        let total = 10 * GIB;
        let mut plan = PartitionPlan::new(Disk::new("/dev/sda", total, TableKind::Gpt));
        // Exactly the disk minus offset: fits alone, not with a second partition.
        plan.push(PartitionSpec::new(
            &(total - 2 * MIB).to_string(),
            total,
            "/",
            "ext4",
            None,
        ));
        assert!(plan.clone().validate().is_ok());
        plan.push(PartitionSpec::new("1M", total, "/home", "ext4", None));
        assert!(matches!(
            plan.validate().unwrap_err(),
            ProvisionError::OverProvisioned { .. }
        ));
    }

    #[test]
    fn missing_and_duplicate_roots_are_rejected() {
        let mut plan = PartitionPlan::new(disk(64));
        plan.add_entry(&entry("1G", "/boot", "vfat"));
        assert!(matches!(
            plan.clone().validate().unwrap_err(),
            ProvisionError::MissingRoot
        ));

        plan.add_entry(&entry("10G", "/", "ext4"));
        plan.add_entry(&entry("10G", "/", "btrfs"));
        assert!(matches!(
            plan.validate().unwrap_err(),
            ProvisionError::DuplicateRoot
        ));
    }

    #[test]
    fn relative_and_duplicate_mountpoints_are_rejected() {
        let mut plan = PartitionPlan::new(disk(64));
        plan.add_entry(&entry("10G", "/", "ext4"));
        plan.add_entry(&entry("1G", "home", "ext4"));
        assert!(matches!(
            plan.clone().validate().unwrap_err(),
            ProvisionError::InvalidEntry { index: 2, .. }
        ));

        plan.update(1, &entry("1G", "/home", "ext4"));
        plan.add_entry(&entry("1G", "/home/", "ext4"));
        assert!(matches!(
            plan.validate().unwrap_err(),
            ProvisionError::DuplicateMountpoint(_)
        ));
    }

    #[test]
    fn mbr_is_limited_to_four_partitions() {
        let mut plan = PartitionPlan::new(Disk::new("/dev/sda", 64 * GIB, TableKind::Mbr));
        plan.add_entry(&entry("10G", "/", "ext4"));
        for mp in ["/home", "/var", "/srv", "/opt"] {
            plan.add_entry(&entry("1G", mp, "ext4"));
        }
        assert!(matches!(
            plan.validate().unwrap_err(),
            ProvisionError::TooManyPrimaryPartitions(5)
        ));
    }

    #[test]
    fn swap_sentinel_and_label_both_mean_swap() {
        let by_label = PartitionSpec::new("1G", GIB, "", "linux-swap", None);
        let by_mountpoint = PartitionSpec::new("1G", GIB, "SWAP", "ext4", None);
        assert!(by_label.is_swap());
        assert!(by_mountpoint.is_swap());
        assert!(!by_mountpoint.is_sub_mount());
    }

    #[test]
    fn table_kind_parses_and_labels() {
        assert_eq!("MBR".parse::<TableKind>().unwrap(), TableKind::Mbr);
        assert_eq!("msdos".parse::<TableKind>().unwrap().parted_label(), "msdos");
        assert_eq!(TableKind::Gpt.parted_label(), "gpt");
        assert!("zfs".parse::<TableKind>().is_err());
    }
}
