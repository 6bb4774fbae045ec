//! Fake HAL implementation for testing.
//!
//! This implementation records all operations without executing them,
//! allowing for CI-safe testing without root privileges or real hardware.
//! Mounts are tracked as a live topology so that code reading it back
//! (`findmnt`-style probes) sees what earlier steps mounted.

use super::{
    BlkidTag, BootOps, Filesystem, FormatOps, FormatOptions, GrubTarget, MountOps, MountOptions,
    PartedOp, PartedOptions, PartitionOps, ProbeOps, SwapOps, SystemOps,
};
use crate::{DiskInfo, HalError, HalResult, MountRecord, PartitionInfo};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Operation records for testing and verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Parted {
        disk: PathBuf,
        args: Vec<String>,
    },
    Format {
        device: PathBuf,
        fs: Filesystem,
    },
    Mount {
        device: PathBuf,
        target: PathBuf,
        fstype: Option<String>,
    },
    UnmountRecursive {
        target: PathBuf,
    },
    UnmountLazy {
        target: PathBuf,
    },
    Swapon {
        device: PathBuf,
    },
    GrubInstall {
        root: PathBuf,
        args: Vec<String>,
    },
    GrubMkconfig {
        root: PathBuf,
        output: String,
    },
    Sync,
    UdevSettle,
    /// Read-only query of an external tool (blkid, findmnt, lsblk, swapon).
    Probe {
        command: String,
    },
}

impl Operation {
    /// Command-line-like rendering, used for failure injection and assertions.
    pub fn describe(&self) -> String {
        match self {
            Operation::Parted { disk, args } => {
                format!("parted -s {} {}", disk.display(), args.join(" "))
            }
            Operation::Format { device, fs } => format!(
                "{} {}",
                fs.mkfs_program(),
                fs.mkfs_args(device).join(" ")
            ),
            Operation::Mount { device, target, .. } => {
                format!("mount {} {}", device.display(), target.display())
            }
            Operation::UnmountRecursive { target } => format!("umount -R {}", target.display()),
            Operation::UnmountLazy { target } => format!("umount -l {}", target.display()),
            Operation::Swapon { device } => format!("swapon {}", device.display()),
            Operation::GrubInstall { root, args } => format!(
                "arch-chroot {} grub-install {}",
                root.display(),
                args.join(" ")
            ),
            Operation::GrubMkconfig { root, output } => {
                format!("arch-chroot {} grub-mkconfig -o {}", root.display(), output)
            }
            Operation::Sync => "sync".to_string(),
            Operation::UdevSettle => "udevadm settle".to_string(),
            Operation::Probe { command } => command.clone(),
        }
    }

    /// True for operations that change disks, mounts or swap.
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            Operation::Probe { .. } | Operation::Sync | Operation::UdevSettle
        )
    }
}

/// Shared state for FakeHal operations.
#[derive(Debug, Clone, Default)]
struct FakeHalState {
    /// All operations that were recorded
    operations: Vec<Operation>,
    /// Live mount topology, in mount order
    mounts: Vec<MountRecord>,
    /// Operations whose description contains one of these fail
    fail_on: Vec<String>,
    identifiers: HashMap<(PathBuf, BlkidTag), String>,
    absent_devices: HashSet<PathBuf>,
    /// Devices that only appear after being polled this many times
    late_devices: HashMap<PathBuf, u32>,
    active_swaps: Vec<String>,
    typed_devices: HashMap<String, Vec<String>>,
    disks: Vec<DiskInfo>,
    partitions: HashMap<PathBuf, Vec<PartitionInfo>>,
    meminfo: String,
    unprivileged: bool,
}

/// Fake HAL implementation that records operations without executing them.
///
/// This is designed for testing and CI environments where real system
/// operations would fail or be dangerous.
#[derive(Debug, Clone, Default)]
pub struct FakeHal {
    state: Arc<Mutex<FakeHalState>>,
}

impl FakeHal {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeHalState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeHalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail every operation whose [`Operation::describe`] contains `needle`.
    pub fn fail_on(self, needle: impl Into<String>) -> Self {
        self.state().fail_on.push(needle.into());
        self
    }

    pub fn with_identifier(
        self,
        device: impl Into<PathBuf>,
        tag: BlkidTag,
        value: impl Into<String>,
    ) -> Self {
        self.state()
            .identifiers
            .insert((device.into(), tag), value.into());
        self
    }

    /// Device nodes that never appear.
    pub fn with_absent_device(self, device: impl Into<PathBuf>) -> Self {
        self.state().absent_devices.insert(device.into());
        self
    }

    /// Device node that is reported missing for the first `polls` existence checks.
    pub fn with_late_device(self, device: impl Into<PathBuf>, polls: u32) -> Self {
        self.state().late_devices.insert(device.into(), polls);
        self
    }

    pub fn with_active_swap(self, source: impl Into<String>) -> Self {
        self.state().active_swaps.push(source.into());
        self
    }

    /// Devices returned by a `blkid -t TYPE=<fstype>` query.
    pub fn with_typed_device(self, fstype: impl Into<String>, device: impl Into<String>) -> Self {
        self.state()
            .typed_devices
            .entry(fstype.into())
            .or_default()
            .push(device.into());
        self
    }

    pub fn with_disk(self, disk: DiskInfo) -> Self {
        self.state().disks.push(disk);
        self
    }

    pub fn with_partition(self, disk: impl Into<PathBuf>, partition: PartitionInfo) -> Self {
        self.state()
            .partitions
            .entry(disk.into())
            .or_default()
            .push(partition);
        self
    }

    /// Pre-existing mount, as if mounted before the installer ran.
    pub fn with_mount(self, record: MountRecord) -> Self {
        self.state().mounts.push(record);
        self
    }

    pub fn with_meminfo(self, content: impl Into<String>) -> Self {
        self.state().meminfo = content.into();
        self
    }

    pub fn unprivileged(self) -> Self {
        self.state().unprivileged = true;
        self
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<Operation> {
        self.state().operations.clone()
    }

    /// Descriptions of all recorded operations, in order.
    pub fn descriptions(&self) -> Vec<String> {
        self.state()
            .operations
            .iter()
            .map(Operation::describe)
            .collect()
    }

    /// Get the number of operations recorded.
    pub fn operation_count(&self) -> usize {
        self.state().operations.len()
    }

    /// Check if a specific operation was recorded.
    pub fn has_operation(&self, check: impl Fn(&Operation) -> bool) -> bool {
        self.state().operations.iter().any(check)
    }

    /// Live mounts, in mount order.
    pub fn mounts(&self) -> Vec<MountRecord> {
        self.state().mounts.clone()
    }

    /// Clear all recorded operations and mounts.
    pub fn clear(&self) {
        let mut state = self.state();
        state.operations.clear();
        state.mounts.clear();
    }

    /// Record `op` and return the injected failure, if any.
    fn record_operation(&self, op: Operation) -> HalResult<()> {
        let description = op.describe();
        let mut state = self.state();
        state.operations.push(op);
        if state
            .fail_on
            .iter()
            .any(|needle| description.contains(needle.as_str()))
        {
            let program = description
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_string();
            log::info!("FAKE HAL: injected failure for `{}`", description);
            return Err(HalError::CommandFailed {
                program,
                code: Some(1),
                stderr: format!("injected failure: {}", description),
            });
        }
        Ok(())
    }

    fn probe(&self, command: String) -> HalResult<()> {
        self.record_operation(Operation::Probe { command })
    }
}

impl MountOps for FakeHal {
    fn mount_device(
        &self,
        device: &Path,
        target: &Path,
        fstype: Option<&str>,
        options: MountOptions,
        dry_run: bool,
    ) -> HalResult<()> {
        if dry_run {
            log::info!(
                "FAKE HAL DRY RUN: mount {} -> {}",
                device.display(),
                target.display()
            );
            return Ok(());
        }

        log::info!(
            "FAKE HAL: mount {} -> {} (type: {:?})",
            device.display(),
            target.display(),
            fstype
        );

        self.record_operation(Operation::Mount {
            device: device.to_path_buf(),
            target: target.to_path_buf(),
            fstype: fstype.map(String::from),
        })?;

        let options = match options.options {
            Some(extra) => format!("rw,relatime,{}", extra),
            None => "rw,relatime".to_string(),
        };
        self.state().mounts.push(MountRecord::new(
            device.display().to_string(),
            target,
            fstype.unwrap_or("auto"),
            options,
        ));

        Ok(())
    }

    fn unmount_recursive(&self, target: &Path, dry_run: bool) -> HalResult<()> {
        if dry_run {
            log::info!("FAKE HAL DRY RUN: umount -R {}", target.display());
            return Ok(());
        }

        self.record_operation(Operation::UnmountRecursive {
            target: target.to_path_buf(),
        })?;
        self.state().mounts.retain(|m| !m.target.starts_with(target));

        Ok(())
    }

    fn unmount_lazy(&self, target: &Path, dry_run: bool) -> HalResult<()> {
        if dry_run {
            log::info!("FAKE HAL DRY RUN: umount -l {}", target.display());
            return Ok(());
        }

        self.record_operation(Operation::UnmountLazy {
            target: target.to_path_buf(),
        })?;
        self.state().mounts.retain(|m| !m.target.starts_with(target));

        Ok(())
    }
}

impl FormatOps for FakeHal {
    fn format(&self, device: &Path, fs: Filesystem, opts: &FormatOptions) -> HalResult<()> {
        if !opts.dry_run && !opts.confirmed {
            return Err(HalError::SafetyLock);
        }

        if opts.dry_run {
            log::info!(
                "FAKE HAL DRY RUN: {} {}",
                fs.mkfs_program(),
                device.display()
            );
            return Ok(());
        }

        log::info!("FAKE HAL: {} {}", fs.mkfs_program(), device.display());

        self.record_operation(Operation::Format {
            device: device.to_path_buf(),
            fs,
        })
    }
}

impl SwapOps for FakeHal {
    fn swapon(&self, device: &Path, dry_run: bool) -> HalResult<()> {
        if dry_run {
            log::info!("FAKE HAL DRY RUN: swapon {}", device.display());
            return Ok(());
        }

        self.record_operation(Operation::Swapon {
            device: device.to_path_buf(),
        })?;
        let name = device.display().to_string();
        let mut state = self.state();
        if state.active_swaps.contains(&name) {
            return Err(HalError::CommandFailed {
                program: "swapon".to_string(),
                code: Some(255),
                stderr: format!("swapon: {}: swapon failed: Device or resource busy", name),
            });
        }
        state.active_swaps.push(name);
        Ok(())
    }

    fn active_swaps(&self) -> HalResult<Vec<String>> {
        self.probe("swapon --noheadings --show=NAME".to_string())?;
        Ok(self.state().active_swaps.clone())
    }
}

impl SystemOps for FakeHal {
    fn sync(&self) -> HalResult<()> {
        self.record_operation(Operation::Sync)
    }

    fn udev_settle(&self) -> HalResult<()> {
        self.record_operation(Operation::UdevSettle)
    }

    fn is_root(&self) -> bool {
        !self.state().unprivileged
    }

    fn proc_meminfo(&self) -> HalResult<String> {
        Ok(self.state().meminfo.clone())
    }
}

impl ProbeOps for FakeHal {
    fn list_disks(&self) -> HalResult<Vec<DiskInfo>> {
        self.probe("lsblk -nd -b -o NAME,SIZE,MODEL".to_string())?;
        Ok(self.state().disks.clone())
    }

    fn disk_size(&self, disk: &Path) -> HalResult<u64> {
        self.probe(format!("lsblk -b -n -l -o SIZE {}", disk.display()))?;
        self.state()
            .disks
            .iter()
            .find(|d| d.path == disk)
            .map(|d| d.size_bytes)
            .ok_or_else(|| HalError::Parse(format!("no such disk: {}", disk.display())))
    }

    fn list_partitions(&self, disk: &Path) -> HalResult<Vec<PartitionInfo>> {
        self.probe(format!("lsblk -b -n -l -o NAME,TYPE,SIZE {}", disk.display()))?;
        Ok(self
            .state()
            .partitions
            .get(disk)
            .cloned()
            .unwrap_or_default())
    }

    fn device_exists(&self, device: &Path) -> bool {
        let mut state = self.state();
        if state.absent_devices.contains(device) {
            return false;
        }
        match state.late_devices.get_mut(device) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                false
            }
            _ => true,
        }
    }

    fn blkid_value(&self, device: &Path, tag: BlkidTag) -> HalResult<Option<String>> {
        self.probe(format!(
            "blkid -s {} -o value {}",
            tag.as_str(),
            device.display()
        ))?;
        Ok(self
            .state()
            .identifiers
            .get(&(device.to_path_buf(), tag))
            .cloned())
    }

    fn devices_with_fs_type(&self, fstype: &str) -> HalResult<Vec<String>> {
        self.probe(format!("blkid -t TYPE={} -o device", fstype))?;
        Ok(self
            .state()
            .typed_devices
            .get(fstype)
            .cloned()
            .unwrap_or_default())
    }

    fn mount_tree(&self, root: &Path) -> HalResult<Vec<MountRecord>> {
        self.probe(format!(
            "findmnt -Rrno SOURCE,TARGET,FSTYPE,OPTIONS {}",
            root.display()
        ))?;
        Ok(self
            .state()
            .mounts
            .iter()
            .filter(|m| m.target.starts_with(root))
            .cloned()
            .collect())
    }

    fn mount_at(&self, target: &Path) -> HalResult<Option<MountRecord>> {
        self.probe(format!(
            "findmnt -rno SOURCE,TARGET,FSTYPE,OPTIONS --mountpoint {}",
            target.display()
        ))?;
        Ok(self
            .state()
            .mounts
            .iter()
            .rev()
            .find(|m| m.target == target)
            .cloned())
    }
}

impl PartitionOps for FakeHal {
    fn parted(&self, disk: &Path, op: PartedOp, opts: &PartedOptions) -> HalResult<String> {
        if !opts.dry_run && !opts.confirmed {
            return Err(HalError::SafetyLock);
        }
        if opts.dry_run {
            log::info!(
                "FAKE HAL DRY RUN: parted -s {} {}",
                disk.display(),
                op.args().join(" ")
            );
            return Ok(String::new());
        }
        self.record_operation(Operation::Parted {
            disk: disk.to_path_buf(),
            args: op.args(),
        })?;
        Ok(String::new())
    }
}

impl BootOps for FakeHal {
    fn grub_install(&self, root: &Path, target: &GrubTarget, dry_run: bool) -> HalResult<()> {
        if dry_run {
            log::info!("FAKE HAL DRY RUN: grub-install {:?}", target);
            return Ok(());
        }
        self.record_operation(Operation::GrubInstall {
            root: root.to_path_buf(),
            args: target.install_args(),
        })
    }

    fn grub_mkconfig(&self, root: &Path, output: &str, dry_run: bool) -> HalResult<()> {
        if dry_run {
            log::info!("FAKE HAL DRY RUN: grub-mkconfig -o {}", output);
            return Ok(());
        }
        self.record_operation(Operation::GrubMkconfig {
            root: root.to_path_buf(),
            output: output.to_string(),
        })
    }
}
