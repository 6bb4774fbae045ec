//! Device probing operations (lsblk/blkid/findmnt).

use crate::{DiskInfo, HalResult, MountRecord, PartitionInfo};
use std::path::Path;

/// blkid tags used for persistent device references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BlkidTag {
    Uuid,
    PartUuid,
}

impl BlkidTag {
    pub fn as_str(self) -> &'static str {
        match self {
            BlkidTag::Uuid => "UUID",
            BlkidTag::PartUuid => "PARTUUID",
        }
    }
}

/// Read-only probing trait.
pub trait ProbeOps {
    /// Whole disks visible to the system.
    fn list_disks(&self) -> HalResult<Vec<DiskInfo>>;

    /// Size of a disk in bytes.
    fn disk_size(&self, disk: &Path) -> HalResult<u64>;

    /// Partitions currently present on a disk.
    fn list_partitions(&self, disk: &Path) -> HalResult<Vec<PartitionInfo>>;

    /// Whether a device node exists.
    fn device_exists(&self, device: &Path) -> bool;

    /// Value of a blkid tag for a device; `Ok(None)` when the tag is absent.
    fn blkid_value(&self, device: &Path, tag: BlkidTag) -> HalResult<Option<String>>;

    /// Devices whose filesystem TYPE matches (`blkid -t TYPE=<fstype> -o device`).
    fn devices_with_fs_type(&self, fstype: &str) -> HalResult<Vec<String>>;

    /// Recursive live mount topology rooted at `root`.
    fn mount_tree(&self, root: &Path) -> HalResult<Vec<MountRecord>>;

    /// The mount whose target is exactly `target`, if any.
    fn mount_at(&self, target: &Path) -> HalResult<Option<MountRecord>>;
}
