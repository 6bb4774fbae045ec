//! Linux HAL implementation using real system calls and tools.

use super::process::{
    output_failed, output_with_timeout, status_with_timeout, stdout_with_timeout,
};
use super::{
    BlkidTag, BootOps, Filesystem, FormatOps, FormatOptions, GrubTarget, MountOps, MountOptions,
    PartedOp, PartedOptions, PartitionOps, ProbeOps, SwapOps, SystemOps,
};
use crate::{findmnt, lsblk, DiskInfo, HalError, HalResult, MountRecord, PartitionInfo};
use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

/// Real HAL implementation for Linux systems.
#[derive(Debug, Clone, Default)]
pub struct LinuxHal;

impl LinuxHal {
    pub fn new() -> Self {
        Self
    }
}

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const SYNC_TIMEOUT: Duration = Duration::from_secs(60);
const FORMAT_TIMEOUT: Duration = Duration::from_secs(10 * 60);
const PARTED_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const SWAPON_TIMEOUT: Duration = Duration::from_secs(30);
const UMOUNT_TIMEOUT: Duration = Duration::from_secs(60);
const GRUB_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// blkid exits with 2 when the requested token or device is not found.
const BLKID_NOT_FOUND: i32 = 2;

fn map_nix_err(err: nix::errno::Errno) -> HalError {
    use nix::errno::Errno;
    match err {
        Errno::EBUSY => HalError::DiskBusy,
        Errno::EACCES | Errno::EPERM => HalError::PermissionDenied,
        other => HalError::Nix(other),
    }
}

fn non_empty_lines(stdout: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

impl MountOps for LinuxHal {
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
                "DRY RUN: mount {} -> {}",
                device.display(),
                target.display()
            );
            return Ok(());
        }

        let flags = nix::mount::MsFlags::empty();
        let data = options.options.as_deref();

        nix::mount::mount(Some(device), target, fstype, flags, data).map_err(map_nix_err)?;

        Ok(())
    }

    fn unmount_recursive(&self, target: &Path, dry_run: bool) -> HalResult<()> {
        if dry_run {
            log::info!("DRY RUN: umount -R {}", target.display());
            return Ok(());
        }

        let mut cmd = Command::new("umount");
        cmd.arg("-R").arg(target);
        status_with_timeout("umount", &mut cmd, UMOUNT_TIMEOUT)
    }

    fn unmount_lazy(&self, target: &Path, dry_run: bool) -> HalResult<()> {
        if dry_run {
            log::info!("DRY RUN: umount -l {}", target.display());
            return Ok(());
        }

        nix::mount::umount2(target, nix::mount::MntFlags::MNT_DETACH).map_err(map_nix_err)?;

        Ok(())
    }
}

impl FormatOps for LinuxHal {
    fn format(&self, device: &Path, fs: Filesystem, opts: &FormatOptions) -> HalResult<()> {
        let program = fs.mkfs_program();
        let args = fs.mkfs_args(device);

        if opts.dry_run {
            log::info!("DRY RUN: {} {}", program, args.join(" "));
            return Ok(());
        }

        if !opts.confirmed {
            return Err(HalError::SafetyLock);
        }

        let mut cmd = Command::new(program);
        cmd.args(&args);
        status_with_timeout(program, &mut cmd, FORMAT_TIMEOUT)
    }
}

impl SwapOps for LinuxHal {
    fn swapon(&self, device: &Path, dry_run: bool) -> HalResult<()> {
        if dry_run {
            log::info!("DRY RUN: swapon {}", device.display());
            return Ok(());
        }

        let mut cmd = Command::new("swapon");
        cmd.arg(device);
        status_with_timeout("swapon", &mut cmd, SWAPON_TIMEOUT)
    }

    fn active_swaps(&self) -> HalResult<Vec<String>> {
        let mut cmd = Command::new("swapon");
        cmd.args(["--noheadings", "--show=NAME"]);
        let output = output_with_timeout("swapon", &mut cmd, PROBE_TIMEOUT)?;
        if !output.status.success() {
            return Err(output_failed("swapon", &output));
        }
        Ok(non_empty_lines(&output.stdout))
    }
}

impl SystemOps for LinuxHal {
    fn sync(&self) -> HalResult<()> {
        let mut cmd = Command::new("sync");
        status_with_timeout("sync", &mut cmd, SYNC_TIMEOUT)
    }

    fn udev_settle(&self) -> HalResult<()> {
        let mut cmd = Command::new("udevadm");
        cmd.arg("settle");
        status_with_timeout("udevadm", &mut cmd, SYNC_TIMEOUT)
    }

    fn is_root(&self) -> bool {
        nix::unistd::geteuid().is_root()
    }

    fn proc_meminfo(&self) -> HalResult<String> {
        Ok(fs::read_to_string("/proc/meminfo")?)
    }
}

impl ProbeOps for LinuxHal {
    fn list_disks(&self) -> HalResult<Vec<DiskInfo>> {
        let mut cmd = Command::new("lsblk");
        cmd.args(["-nd", "-b", "-o", "NAME,SIZE,MODEL"]);
        let stdout = stdout_with_timeout("lsblk", &mut cmd, PROBE_TIMEOUT)?;
        Ok(lsblk::parse_disks(&stdout))
    }

    fn disk_size(&self, disk: &Path) -> HalResult<u64> {
        let mut cmd = Command::new("lsblk");
        cmd.args(["-b", "-n", "-l", "-o", "SIZE"]).arg(disk);
        let stdout = stdout_with_timeout("lsblk", &mut cmd, PROBE_TIMEOUT)?;
        lsblk::parse_disk_size(&stdout).ok_or_else(|| {
            HalError::Parse(format!("lsblk reported no size for {}", disk.display()))
        })
    }

    fn list_partitions(&self, disk: &Path) -> HalResult<Vec<PartitionInfo>> {
        let mut cmd = Command::new("lsblk");
        cmd.args(["-b", "-n", "-l", "-o", "NAME,TYPE,SIZE"]).arg(disk);
        let stdout = stdout_with_timeout("lsblk", &mut cmd, PROBE_TIMEOUT)?;
        Ok(lsblk::parse_partitions(&stdout))
    }

    fn device_exists(&self, device: &Path) -> bool {
        device.exists()
    }

    fn blkid_value(&self, device: &Path, tag: BlkidTag) -> HalResult<Option<String>> {
        let mut cmd = Command::new("blkid");
        cmd.args(["-s", tag.as_str(), "-o", "value"]).arg(device);
        let output = output_with_timeout("blkid", &mut cmd, PROBE_TIMEOUT)?;

        if output.status.code() == Some(BLKID_NOT_FOUND) {
            return Ok(None);
        }
        if !output.status.success() {
            return Err(output_failed("blkid", &output));
        }

        let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(Some(value).filter(|v| !v.is_empty()))
    }

    fn devices_with_fs_type(&self, fstype: &str) -> HalResult<Vec<String>> {
        let mut cmd = Command::new("blkid");
        cmd.args(["-t", &format!("TYPE={}", fstype), "-o", "device"]);
        let output = output_with_timeout("blkid", &mut cmd, PROBE_TIMEOUT)?;

        if output.status.code() == Some(BLKID_NOT_FOUND) {
            return Ok(Vec::new());
        }
        if !output.status.success() {
            return Err(output_failed("blkid", &output));
        }
        Ok(non_empty_lines(&output.stdout))
    }

    fn mount_tree(&self, root: &Path) -> HalResult<Vec<MountRecord>> {
        let mut cmd = Command::new("findmnt");
        cmd.args(["-Rrno", "SOURCE,TARGET,FSTYPE,OPTIONS"]).arg(root);
        let output = output_with_timeout("findmnt", &mut cmd, PROBE_TIMEOUT)?;

        // findmnt exits 1 when nothing matches.
        if output.status.code() == Some(1) {
            return Ok(Vec::new());
        }
        if !output.status.success() {
            return Err(output_failed("findmnt", &output));
        }
        Ok(findmnt::parse_findmnt_raw(&String::from_utf8_lossy(
            &output.stdout,
        )))
    }

    fn mount_at(&self, target: &Path) -> HalResult<Option<MountRecord>> {
        let mut cmd = Command::new("findmnt");
        cmd.args(["-rno", "SOURCE,TARGET,FSTYPE,OPTIONS", "--mountpoint"])
            .arg(target);
        let output = output_with_timeout("findmnt", &mut cmd, PROBE_TIMEOUT)?;

        if output.status.code() == Some(1) {
            return Ok(None);
        }
        if !output.status.success() {
            return Err(output_failed("findmnt", &output));
        }
        Ok(
            findmnt::parse_findmnt_raw(&String::from_utf8_lossy(&output.stdout))
                .into_iter()
                .next(),
        )
    }
}

impl PartitionOps for LinuxHal {
    fn parted(&self, disk: &Path, op: PartedOp, opts: &PartedOptions) -> HalResult<String> {
        let op_args = op.args();
        if opts.dry_run {
            log::info!("DRY RUN: parted -s {} {}", disk.display(), op_args.join(" "));
            return Ok(String::new());
        }
        if !opts.confirmed {
            return Err(HalError::SafetyLock);
        }

        let mut cmd = Command::new("parted");
        cmd.arg("-s").arg(disk).args(&op_args);
        let output = output_with_timeout("parted", &mut cmd, PARTED_TIMEOUT)?;
        if !output.status.success() {
            return Err(output_failed("parted", &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl BootOps for LinuxHal {
    fn grub_install(&self, root: &Path, target: &GrubTarget, dry_run: bool) -> HalResult<()> {
        let args = target.install_args();
        if dry_run {
            log::info!(
                "DRY RUN: arch-chroot {} grub-install {}",
                root.display(),
                args.join(" ")
            );
            return Ok(());
        }

        let mut cmd = Command::new("arch-chroot");
        cmd.arg(root).arg("grub-install").args(&args);
        status_with_timeout("grub-install", &mut cmd, GRUB_TIMEOUT)
    }

    fn grub_mkconfig(&self, root: &Path, output: &str, dry_run: bool) -> HalResult<()> {
        if dry_run {
            log::info!(
                "DRY RUN: arch-chroot {} grub-mkconfig -o {}",
                root.display(),
                output
            );
            return Ok(());
        }

        let mut cmd = Command::new("arch-chroot");
        cmd.arg(root).args(["grub-mkconfig", "-o", output]);
        status_with_timeout("grub-mkconfig", &mut cmd, GRUB_TIMEOUT)
    }
}
