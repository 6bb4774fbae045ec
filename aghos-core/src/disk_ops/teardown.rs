//! Flush and unmount everything under the install root.

use aghos_hal::procfs::meminfo::parse_writeback;
use aghos_hal::{MountOps, ProbeOps, SystemOps};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

/// Dirty/Writeback level treated as drained, in KiB.
pub const WRITEBACK_DRAINED_KB: u64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeardownOptions {
    pub drain_timeout: Duration,
    pub drain_interval: Duration,
    pub dry_run: bool,
}

impl Default for TeardownOptions {
    fn default() -> Self {
        Self {
            drain_timeout: Duration::from_secs(30),
            drain_interval: Duration::from_millis(500),
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub unmounted: Vec<PathBuf>,
    pub drained: bool,
    /// One line per step that failed; teardown never stops early.
    pub failures: Vec<String>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub fn teardown<H>(hal: &H, root: &Path, opts: &TeardownOptions) -> TeardownReport
where
    H: MountOps + ProbeOps + SystemOps + ?Sized,
{
    log::info!("🧹 Tearing down {}...", root.display());
    let mut report = TeardownReport::default();

    if let Err(err) = hal.sync() {
        report.failures.push(format!("sync: {}", err));
    }
    report.drained = wait_for_writeback(hal, opts);
    if !report.drained {
        report
            .failures
            .push(format!("writeback still pending after {:?}", opts.drain_timeout));
    }
    if let Err(err) = hal.udev_settle() {
        report.failures.push(format!("udevadm settle: {}", err));
    }

    let records = match hal.mount_tree(root) {
        Ok(records) => records,
        Err(err) => {
            report.failures.push(format!("findmnt {}: {}", root.display(), err));
            return report;
        }
    };

    let mut targets: Vec<PathBuf> = records.into_iter().map(|r| r.target).collect();
    targets.sort_by(|a, b| {
        b.components()
            .count()
            .cmp(&a.components().count())
            .then_with(|| a.cmp(b))
    });
    targets.dedup();

    for target in targets {
        match hal.unmount_recursive(&target, opts.dry_run) {
            Ok(()) => report.unmounted.push(target),
            Err(err) if target != root => {
                log::warn!("umount -R {} failed ({}), detaching lazily", target.display(), err);
                match hal.unmount_lazy(&target, opts.dry_run) {
                    Ok(()) => report.unmounted.push(target),
                    Err(err) => report
                        .failures
                        .push(format!("umount -l {}: {}", target.display(), err)),
                }
            }
            Err(err) => report
                .failures
                .push(format!("umount -R {}: {}", target.display(), err)),
        }
    }

    for failure in &report.failures {
        log::warn!("Teardown: {}", failure);
    }
    report
}

fn wait_for_writeback<H: SystemOps + ?Sized>(hal: &H, opts: &TeardownOptions) -> bool {
    let deadline = Instant::now() + opts.drain_timeout;
    loop {
        match hal.proc_meminfo() {
            Ok(content) => {
                let info = parse_writeback(&content);
                if info.is_drained(WRITEBACK_DRAINED_KB) {
                    return true;
                }
                log::debug!(
                    "Waiting for writeback: dirty={}kB writeback={}kB",
                    info.dirty_kb,
                    info.writeback_kb
                );
            }
            Err(err) => {
                log::debug!("Cannot read /proc/meminfo: {}", err);
                return false;
            }
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(opts.drain_interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aghos_hal::{FakeHal, MountRecord, Operation};

    fn quick() -> TeardownOptions {
        TeardownOptions {
            drain_timeout: Duration::ZERO,
            drain_interval: Duration::ZERO,
            dry_run: false,
        }
    }

    fn mounted_hal() -> FakeHal {
        [
            ("/dev/sda2", "/mnt"),
            ("/dev/sda1", "/mnt/boot"),
            ("/dev/sda5", "/mnt/boot/efi"),
            ("/dev/sda4", "/mnt/home"),
        ]
        .into_iter()
        .fold(FakeHal::new(), |hal, (dev, target)| {
            hal.with_mount(MountRecord::new(dev, target, "ext4", "rw,relatime"))
        })
    }

    #[test]
    fn unmounts_deepest_first() {
        let hal = mounted_hal();
        let report = teardown(&hal, Path::new("/mnt"), &quick());
        assert!(report.is_clean(), "{:?}", report.failures);
        assert_eq!(
            report.unmounted,
            vec![
                PathBuf::from("/mnt/boot/efi"),
                PathBuf::from("/mnt/boot"),
                PathBuf::from("/mnt/home"),
                PathBuf::from("/mnt"),
            ]
        );
        assert!(hal.mounts().is_empty());
        assert!(matches!(hal.operations()[0], Operation::Sync));
    }

    #[test]
    fn busy_child_falls_back_to_lazy_unmount() {
        let hal = mounted_hal().fail_on("umount -R /mnt/home");
        let report = teardown(&hal, Path::new("/mnt"), &quick());
        assert!(report.is_clean());
        assert!(hal
            .descriptions()
            .contains(&"umount -l /mnt/home".to_string()));
    }

    #[test]
    fn busy_root_is_reported_not_detached() {
        let hal = mounted_hal().fail_on("umount -R /mnt");
        let report = teardown(&hal, Path::new("/mnt"), &quick());
        assert!(report.failures.iter().any(|f| f.starts_with("umount -R /mnt:")));
        assert!(!hal.descriptions().contains(&"umount -l /mnt".to_string()));
    }

    #[test]
    fn pending_writeback_is_reported() {
        let hal = mounted_hal().with_meminfo("Dirty:  20480 kB\nWriteback:  0 kB\n");
        let report = teardown(&hal, Path::new("/mnt"), &quick());
        assert!(!report.drained);
        assert_eq!(report.unmounted.len(), 4);
    }
}
