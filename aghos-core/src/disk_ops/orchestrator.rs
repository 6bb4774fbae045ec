//! Formats and mounts partitions in containment order.
//!
//! Root failures are fatal. Everything after the root mount degrades to a
//! warning that skips only the affected swap or mountpoint (and anything
//! nested beneath a mountpoint that failed).

use super::mkfs::select_filesystem;
use crate::config::ExistingMount;
use crate::config_states::RunMode;
use crate::errors::{ProvisionError, WarningKind, Warnings};
use crate::fs_util::under_root;
use crate::partitioning::plan::SWAP_MOUNTPOINT;
use crate::partitioning::DeviceMap;
use aghos_hal::{
    Filesystem, FormatOps, HalError, MountOps, MountOptions, ProbeOps, SwapOps, SystemOps,
};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ProvisionState {
    Planned,
    TableWritten,
    RootReady,
    AuxReady,
    SwapReady,
    Done,
}

/// One device to bring up under the install root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountTarget {
    pub device: PathBuf,
    /// Absolute path, the `swap` sentinel, or empty.
    pub mountpoint: String,
    pub fs_label: String,
    /// Run the formatter before mounting.
    pub format: bool,
}

impl MountTarget {
    pub fn new(
        device: impl Into<PathBuf>,
        mountpoint: impl Into<String>,
        fs_label: impl Into<String>,
        format: bool,
    ) -> Self {
        Self {
            device: device.into(),
            mountpoint: mountpoint.into(),
            fs_label: fs_label.into(),
            format,
        }
    }

    /// Every freshly created partition, formatted.
    pub fn from_device_map(map: &DeviceMap) -> Vec<MountTarget> {
        map.iter()
            .map(|p| {
                Self::new(
                    p.device.clone(),
                    p.spec.mountpoint.clone(),
                    p.spec.fs_label.clone(),
                    true,
                )
            })
            .collect()
    }

    pub fn from_existing(existing: &[ExistingMount], format: bool) -> Vec<MountTarget> {
        existing
            .iter()
            .map(|e| Self::new(e.device.clone(), e.mountpoint.trim(), e.fs.trim(), format))
            .collect()
    }

    pub fn is_root(&self) -> bool {
        self.mountpoint == "/"
    }

    pub fn is_swap(&self) -> bool {
        select_filesystem(&self.fs_label) == Filesystem::Swap
            || self.mountpoint.eq_ignore_ascii_case(SWAP_MOUNTPOINT)
    }

    fn depth(&self) -> usize {
        Path::new(&self.mountpoint).components().count()
    }
}

/// Bounded wait for a device node to appear after the table write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DevicePoll {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for DevicePoll {
    fn default() -> Self {
        Self {
            attempts: 10,
            interval: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountedPartition {
    pub device: PathBuf,
    pub target: PathBuf,
    pub fs: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountReport {
    pub state: ProvisionState,
    /// Root first, then children in mount order.
    pub mounted: Vec<MountedPartition>,
    pub swaps: Vec<PathBuf>,
    /// Mountpoints left unmounted because they or an ancestor failed.
    pub skipped: Vec<String>,
}

pub struct FormatMountOrchestrator<'a, H>
where
    H: FormatOps + MountOps + SwapOps + ProbeOps + SystemOps + ?Sized,
{
    hal: &'a H,
    root: PathBuf,
    poll: Option<DevicePoll>,
}

impl<'a, H> FormatMountOrchestrator<'a, H>
where
    H: FormatOps + MountOps + SwapOps + ProbeOps + SystemOps + ?Sized,
{
    pub fn new(hal: &'a H, root: impl Into<PathBuf>) -> Self {
        Self {
            hal,
            root: root.into(),
            poll: None,
        }
    }

    /// Wait for the root device node before formatting it.
    pub fn with_device_poll(mut self, poll: DevicePoll) -> Self {
        self.poll = Some(poll);
        self
    }

    pub fn run(
        &self,
        targets: &[MountTarget],
        mode: &RunMode,
        warnings: &mut Warnings,
    ) -> Result<MountReport, ProvisionError> {
        let root = targets
            .iter()
            .find(|t| t.is_root())
            .ok_or(ProvisionError::MissingRoot)?;
        let dry_run = mode.is_dry_run();
        let mut report = MountReport {
            state: ProvisionState::TableWritten,
            mounted: Vec::new(),
            swaps: Vec::new(),
            skipped: Vec::new(),
        };

        if let Some(poll) = self.poll.filter(|_| !dry_run) {
            self.wait_for_device(&root.device, poll)?;
        }

        self.bring_up_root(root, mode)?;
        report.mounted.push(MountedPartition {
            device: root.device.clone(),
            target: self.root.clone(),
            fs: select_filesystem(&root.fs_label).to_string(),
        });
        self.advance(&mut report, ProvisionState::RootReady);

        let mut children: Vec<&MountTarget> = targets
            .iter()
            .filter(|t| !t.is_root() && !t.is_swap() && t.mountpoint.starts_with('/'))
            .collect();
        children.sort_by_key(|t| t.depth());

        for child in &children {
            let dir = under_root(&self.root, &child.mountpoint);
            if let Err(err) = self.ensure_dir(&dir, dry_run) {
                warnings.push(
                    WarningKind::Mount,
                    &child.mountpoint,
                    format!("creating {} failed: {}", dir.display(), err),
                );
            }
        }
        self.advance(&mut report, ProvisionState::AuxReady);

        for swap in targets.iter().filter(|t| t.is_swap()) {
            if let Some(device) = self.bring_up_swap(swap, mode, warnings) {
                report.swaps.push(device);
            }
        }
        self.advance(&mut report, ProvisionState::SwapReady);

        let mut failed: Vec<PathBuf> = Vec::new();
        for child in children {
            let mountpoint = PathBuf::from(&child.mountpoint);
            if failed.iter().any(|f| mountpoint.starts_with(f)) {
                warnings.push(
                    WarningKind::Mount,
                    &child.mountpoint,
                    "skipped because a parent mountpoint failed",
                );
                report.skipped.push(child.mountpoint.clone());
                failed.push(mountpoint);
                continue;
            }
            match self.bring_up_child(child, mode) {
                Ok(mounted) => report.mounted.push(mounted),
                Err((kind, message)) => {
                    warnings.push(kind, &child.mountpoint, message);
                    report.skipped.push(child.mountpoint.clone());
                    failed.push(mountpoint);
                }
            }
        }

        // Created but unmounted partitions still get their filesystem.
        for target in targets
            .iter()
            .filter(|t| t.mountpoint.is_empty() && t.format)
        {
            let fs = select_filesystem(&target.fs_label);
            if let Err(err) = self.hal.format(&target.device, fs, &mode.format_options()) {
                warnings.push(
                    WarningKind::Format,
                    target.device.display().to_string(),
                    format!("{} failed: {}", fs.mkfs_program(), err),
                );
            }
        }

        self.advance(&mut report, ProvisionState::Done);
        Ok(report)
    }

    fn advance(&self, report: &mut MountReport, state: ProvisionState) {
        log::debug!("Provisioning state: {:?} -> {:?}", report.state, state);
        report.state = state;
    }

    fn wait_for_device(&self, device: &Path, poll: DevicePoll) -> Result<(), ProvisionError> {
        if let Err(err) = self.hal.udev_settle() {
            log::debug!("udevadm settle failed: {}", err);
        }
        for attempt in 1..=poll.attempts {
            if self.hal.device_exists(device) {
                log::debug!("{} present after {} attempt(s)", device.display(), attempt);
                return Ok(());
            }
            if attempt < poll.attempts {
                thread::sleep(poll.interval);
            }
        }
        Err(ProvisionError::DeviceTimeout {
            device: device.to_path_buf(),
            attempts: poll.attempts,
        })
    }

    fn bring_up_root(&self, root: &MountTarget, mode: &RunMode) -> Result<(), ProvisionError> {
        let fs = select_filesystem(&root.fs_label);
        if root.format {
            log::info!("✨ Formatting root {} ({})...", root.device.display(), fs);
            self.hal
                .format(&root.device, fs, &mode.format_options())
                .map_err(|source| ProvisionError::RootFormat {
                    device: root.device.clone(),
                    source,
                })?;
        }

        let mount_err = |source: HalError| ProvisionError::RootMount {
            device: root.device.clone(),
            target: self.root.clone(),
            source,
        };
        self.ensure_dir(&self.root, mode.is_dry_run())
            .map_err(|e| mount_err(HalError::Io(e)))?;
        log::info!(
            "Mounting root {} at {}",
            root.device.display(),
            self.root.display()
        );
        self.hal
            .mount_device(
                &root.device,
                &self.root,
                fs.mount_type(),
                MountOptions::new(),
                mode.is_dry_run(),
            )
            .map_err(mount_err)
    }

    fn bring_up_swap(
        &self,
        swap: &MountTarget,
        mode: &RunMode,
        warnings: &mut Warnings,
    ) -> Option<PathBuf> {
        let subject = swap.device.display().to_string();
        if swap.format {
            if let Err(err) = self
                .hal
                .format(&swap.device, Filesystem::Swap, &mode.format_options())
            {
                warnings.push(WarningKind::SwapFormat, subject, format!("mkswap failed: {}", err));
                return None;
            }
        }
        match self.hal.swapon(&swap.device, mode.is_dry_run()) {
            Ok(()) => {
                log::info!("Swap active on {}", swap.device.display());
                Some(swap.device.clone())
            }
            Err(err) => {
                warnings.push(
                    WarningKind::SwapActivation,
                    subject,
                    format!("swapon failed: {}", err),
                );
                None
            }
        }
    }

    fn bring_up_child(
        &self,
        child: &MountTarget,
        mode: &RunMode,
    ) -> Result<MountedPartition, (WarningKind, String)> {
        let fs = select_filesystem(&child.fs_label);
        let target = under_root(&self.root, &child.mountpoint);
        if child.format {
            log::info!("✨ Formatting {} ({})...", child.device.display(), fs);
            self.hal
                .format(&child.device, fs, &mode.format_options())
                .map_err(|e| {
                    (
                        WarningKind::Format,
                        format!("{} failed: {}", fs.mkfs_program(), e),
                    )
                })?;
        }
        self.ensure_dir(&target, mode.is_dry_run()).map_err(|e| {
            (
                WarningKind::Mount,
                format!("creating {} failed: {}", target.display(), e),
            )
        })?;
        log::info!("Mounting {} at {}", child.device.display(), target.display());
        self.hal
            .mount_device(
                &child.device,
                &target,
                fs.mount_type(),
                MountOptions::new(),
                mode.is_dry_run(),
            )
            .map_err(|e| (WarningKind::Mount, format!("mount failed: {}", e)))?;
        Ok(MountedPartition {
            device: child.device.clone(),
            target,
            fs: fs.to_string(),
        })
    }

    fn ensure_dir(&self, dir: &Path, dry_run: bool) -> std::io::Result<()> {
        if dry_run {
            log::info!("DRY RUN: mkdir -p {}", dir.display());
            return Ok(());
        }
        fs::create_dir_all(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_states::ExecuteArmToken;
    use aghos_hal::{FakeHal, Operation};
    use tempfile::tempdir;

    fn execute() -> RunMode {
        RunMode::Execute(ExecuteArmToken::try_new(true, true).unwrap())
    }

    fn targets() -> Vec<MountTarget> {
        vec![
            MountTarget::new("/dev/sda1", "/boot", "vfat", true),
            MountTarget::new("/dev/sda2", "/", "btrfs", true),
            MountTarget::new("/dev/sda3", "swap", "swap", true),
            MountTarget::new("/dev/sda4", "/home", "btrfs", true),
        ]
    }

    #[test]
    fn missing_root_is_rejected_before_any_call() {
        let hal = FakeHal::new();
        let root = tempdir().unwrap();
        let only_boot = vec![MountTarget::new("/dev/sda1", "/boot", "vfat", true)];
        let err = FormatMountOrchestrator::new(&hal, root.path())
            .with_device_poll(DevicePoll::default())
            .run(&only_boot, &execute(), &mut Warnings::new())
            .unwrap_err();
        assert!(matches!(err, ProvisionError::MissingRoot));
        assert_eq!(hal.operation_count(), 0);
    }

    #[test]
    fn root_then_swap_then_children() {
        let hal = FakeHal::new();
        let root = tempdir().unwrap();
        let mut warnings = Warnings::new();
        let report = FormatMountOrchestrator::new(&hal, root.path())
            .run(&targets(), &execute(), &mut warnings)
            .unwrap();

        let r = root.path().display();
        assert_eq!(
            hal.descriptions(),
            vec![
                "mkfs.btrfs -f /dev/sda2".to_string(),
                format!("mount /dev/sda2 {}", r),
                "mkswap /dev/sda3".to_string(),
                "swapon /dev/sda3".to_string(),
                "mkfs.vfat -F 32 /dev/sda1".to_string(),
                format!("mount /dev/sda1 {}/boot", r),
                "mkfs.btrfs -f /dev/sda4".to_string(),
                format!("mount /dev/sda4 {}/home", r),
            ]
        );
        assert!(warnings.is_empty());
        assert_eq!(report.state, ProvisionState::Done);
        assert_eq!(report.mounted.len(), 3);
        assert_eq!(report.swaps, vec![PathBuf::from("/dev/sda3")]);
        assert!(root.path().join("home").is_dir());
        assert_eq!(hal.mounts()[1].fstype, "vfat");
    }

    #[test]
    fn root_format_failure_is_fatal() {
        let hal = FakeHal::new().fail_on("mkfs.btrfs -f /dev/sda2");
        let root = tempdir().unwrap();
        let err = FormatMountOrchestrator::new(&hal, root.path())
            .run(&targets(), &execute(), &mut Warnings::new())
            .unwrap_err();
        assert!(matches!(err, ProvisionError::RootFormat { .. }));
        assert!(!hal.has_operation(|op| matches!(op, Operation::Mount { .. })));
    }

    #[test]
    fn root_mount_failure_is_fatal() {
        let hal = FakeHal::new().fail_on("mount /dev/sda2");
        let root = tempdir().unwrap();
        let err = FormatMountOrchestrator::new(&hal, root.path())
            .run(&targets(), &execute(), &mut Warnings::new())
            .unwrap_err();
        assert!(matches!(err, ProvisionError::RootMount { .. }));
    }

    #[test]
    fn absent_root_device_times_out() {
        let hal = FakeHal::new().with_absent_device("/dev/sda2");
        let root = tempdir().unwrap();
        let poll = DevicePoll {
            attempts: 3,
            interval: Duration::ZERO,
        };
        let err = FormatMountOrchestrator::new(&hal, root.path())
            .with_device_poll(poll)
            .run(&targets(), &execute(), &mut Warnings::new())
            .unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::DeviceTimeout { attempts: 3, .. }
        ));
        assert!(!hal.has_operation(|op| op.is_mutation()));
    }

    #[test]
    fn late_root_device_is_waited_for() {
        let hal = FakeHal::new().with_late_device("/dev/sda2", 2);
        let root = tempdir().unwrap();
        let poll = DevicePoll {
            attempts: 3,
            interval: Duration::ZERO,
        };
        FormatMountOrchestrator::new(&hal, root.path())
            .with_device_poll(poll)
            .run(&targets(), &execute(), &mut Warnings::new())
            .unwrap();
        assert!(hal.has_operation(|op| matches!(op, Operation::UdevSettle)));
    }

    #[test]
    fn swap_and_child_failures_are_warnings() {
        let hal = FakeHal::new()
            .fail_on("swapon /dev/sda3")
            .fail_on("mkfs.vfat");
        let root = tempdir().unwrap();
        let mut warnings = Warnings::new();
        let report = FormatMountOrchestrator::new(&hal, root.path())
            .run(&targets(), &execute(), &mut warnings)
            .unwrap();
        assert_eq!(warnings.count(WarningKind::SwapActivation), 1);
        assert_eq!(warnings.count(WarningKind::Format), 1);
        assert_eq!(report.skipped, vec!["/boot".to_string()]);
        assert!(report.swaps.is_empty());
        assert!(hal
            .descriptions()
            .iter()
            .any(|d| d.starts_with("mount /dev/sda4")));
    }

    #[test]
    fn nested_mount_waits_for_parent_and_is_skipped_with_it() {
        let hal = FakeHal::new().fail_on("mount /dev/sda1");
        let root = tempdir().unwrap();
        let targets = vec![
            MountTarget::new("/dev/sda5", "/boot/efi", "vfat", true),
            MountTarget::new("/dev/sda2", "/", "ext4", true),
            MountTarget::new("/dev/sda1", "/boot", "ext4", true),
        ];
        let mut warnings = Warnings::new();
        let report = FormatMountOrchestrator::new(&hal, root.path())
            .run(&targets, &execute(), &mut warnings)
            .unwrap();
        assert_eq!(report.skipped, vec!["/boot", "/boot/efi"]);
        assert_eq!(warnings.count(WarningKind::Mount), 2);
        assert!(!hal.has_operation(|op| matches!(
            op,
            Operation::Format { device, .. } if device == Path::new("/dev/sda5")
        )));
    }

    #[test]
    fn existing_partitions_can_skip_formatting() {
        let hal = FakeHal::new();
        let root = tempdir().unwrap();
        let existing = vec![
            ExistingMount {
                device: "/dev/sdb2".into(),
                mountpoint: "/".to_string(),
                fs: "ext4".to_string(),
            },
            ExistingMount {
                device: "/dev/sdb3".into(),
                mountpoint: "/home".to_string(),
                fs: "xfs".to_string(),
            },
        ];
        FormatMountOrchestrator::new(&hal, root.path())
            .run(
                &MountTarget::from_existing(&existing, false),
                &RunMode::DryRun,
                &mut Warnings::new(),
            )
            .unwrap();
        assert_eq!(hal.operation_count(), 0);
        assert!(!root.path().join("home").exists());
    }
}
