//! Filesystem formatting operations trait.

use crate::HalResult;
use std::fmt;
use std::path::Path;

/// Filesystems the installer knows how to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filesystem {
    Swap,
    Btrfs,
    Vfat,
    Ext2,
    Ext3,
    Ext4,
    Xfs,
    F2fs,
}

impl Filesystem {
    pub fn mkfs_program(self) -> &'static str {
        match self {
            Filesystem::Swap => "mkswap",
            Filesystem::Btrfs => "mkfs.btrfs",
            Filesystem::Vfat => "mkfs.vfat",
            Filesystem::Ext2 => "mkfs.ext2",
            Filesystem::Ext3 => "mkfs.ext3",
            Filesystem::Ext4 => "mkfs.ext4",
            Filesystem::Xfs => "mkfs.xfs",
            Filesystem::F2fs => "mkfs.f2fs",
        }
    }

    /// Flags placed before the device argument.
    pub fn mkfs_flags(self) -> &'static [&'static str] {
        match self {
            Filesystem::Swap => &[],
            Filesystem::Vfat => &["-F", "32"],
            Filesystem::Ext2 | Filesystem::Ext3 | Filesystem::Ext4 => &["-F"],
            Filesystem::Btrfs | Filesystem::Xfs | Filesystem::F2fs => &["-f"],
        }
    }

    /// Full argument vector for the formatter.
    pub fn mkfs_args(self, device: &Path) -> Vec<String> {
        let mut args: Vec<String> = self.mkfs_flags().iter().map(|s| s.to_string()).collect();
        args.push(device.display().to_string());
        args
    }

    /// Type passed to mount(2); swap is never mounted.
    pub fn mount_type(self) -> Option<&'static str> {
        match self {
            Filesystem::Swap => None,
            other => Some(other.as_str()),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Filesystem::Swap => "swap",
            Filesystem::Btrfs => "btrfs",
            Filesystem::Vfat => "vfat",
            Filesystem::Ext2 => "ext2",
            Filesystem::Ext3 => "ext3",
            Filesystem::Ext4 => "ext4",
            Filesystem::Xfs => "xfs",
            Filesystem::F2fs => "f2fs",
        }
    }
}

impl fmt::Display for Filesystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for formatting block devices.
pub trait FormatOps {
    /// Create `fs` on `device`, destroying whatever it held.
    ///
    /// # Arguments
    /// * `device` - Block device path (e.g., `/dev/sda1`)
    /// * `fs` - Filesystem to create
    /// * `opts` - Formatting options including dry-run and confirmation
    fn format(&self, device: &Path, fs: Filesystem, opts: &FormatOptions) -> HalResult<()>;
}

/// Options for formatting operations.
#[derive(Debug, Clone)]
pub struct FormatOptions {
    /// If true, log the operation but don't execute it
    pub dry_run: bool,
    /// If true, the user has confirmed the destructive operation
    pub confirmed: bool,
}

impl FormatOptions {
    pub fn new(dry_run: bool, confirmed: bool) -> Self {
        Self { dry_run, confirmed }
    }
}
