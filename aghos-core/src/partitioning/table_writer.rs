//! Writes a validated plan to the real disk with `parted`.

use super::plan::{PartitionSpec, TableKind, ValidatedPlan};
use super::size::MIB;
use crate::config_states::RunMode;
use crate::disk_ops::mkfs::is_swap_label;
use crate::errors::{ProvisionError, WarningKind, Warnings};
use aghos_hal::path::partition_path;
use aghos_hal::{PartedOp, PartedOptions, PartitionOps};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Leading offset of the first partition, in MiB.
pub const FIRST_PARTITION_START_MIB: u64 = 1;
/// Fixed gap between consecutive partitions, in MiB.
pub const PARTITION_GAP_MIB: u64 = 1;

/// A partition that exists on disk: the spec plus its index and device node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConcretePartition {
    pub spec: PartitionSpec,
    /// 1-based creation index.
    pub index: u32,
    pub device: PathBuf,
    pub start_mib: u64,
    pub end_mib: u64,
}

/// Result of a table write: every created partition, in creation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceMap {
    pub disk: PathBuf,
    pub table: TableKind,
    pub partitions: Vec<ConcretePartition>,
}

impl DeviceMap {
    pub fn root(&self) -> Option<&ConcretePartition> {
        self.partitions.iter().find(|p| p.spec.is_root())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConcretePartition> {
        self.partitions.iter()
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }
}

/// `parted mkpart` filesystem-type hint for a filesystem label.
pub fn parted_fs_hint(fs_label: &str) -> String {
    let label = fs_label.trim().to_ascii_lowercase();
    if label.starts_with("vfat") {
        "fat32".to_string()
    } else if is_swap_label(&label) {
        "linux-swap".to_string()
    } else {
        label
    }
}

/// Compute `(start, end)` in MiB for every spec without touching the disk.
pub fn layout(specs: &[PartitionSpec]) -> Result<Vec<(u64, u64)>, ProvisionError> {
    let mut start = FIRST_PARTITION_START_MIB;
    let mut ranges = Vec::with_capacity(specs.len());
    for (idx, spec) in specs.iter().enumerate() {
        let index = idx as u32 + 1;
        let size_mib = (spec.size_bytes / MIB).max(1);
        let end = start.checked_add(size_mib).unwrap_or(start);
        if end <= start {
            return Err(ProvisionError::InvalidRange { index, start, end });
        }
        ranges.push((start, end));
        start = end.saturating_add(PARTITION_GAP_MIB);
    }
    Ok(ranges)
}

pub struct PartitionTableWriter<'a, H: PartitionOps + ?Sized> {
    hal: &'a H,
}

impl<'a, H: PartitionOps + ?Sized> PartitionTableWriter<'a, H> {
    pub fn new(hal: &'a H) -> Self {
        Self { hal }
    }

    /// Create the table, then every partition in plan order.
    ///
    /// Table and partition creation failures are fatal. Flag and name
    /// failures are recorded in `warnings` and the next partition proceeds.
    pub fn write(
        &self,
        plan: ValidatedPlan,
        mode: &RunMode,
        warnings: &mut Warnings,
    ) -> Result<DeviceMap, ProvisionError> {
        let ranges = layout(plan.specs())?;
        let (disk, specs) = plan.into_parts();
        let opts = mode.parted_options();
        let disk_str = disk.path.display().to_string();

        log::info!(
            "🔪 Creating {} partition table on {}...",
            disk.table,
            disk.path.display()
        );
        let label = disk.table.parted_label().to_string();
        self.hal
            .parted(
                &disk.path,
                PartedOp::MkLabel {
                    label: label.clone(),
                },
                &opts,
            )
            .map_err(|source| ProvisionError::TableCreation {
                disk: disk.path.clone(),
                label,
                source,
            })?;

        let mut partitions = Vec::with_capacity(specs.len());
        for (idx, (spec, (start, end))) in specs.into_iter().zip(ranges).enumerate() {
            let index = idx as u32 + 1;
            log::info!(
                "Creating partition {} ({}MiB-{}MiB, {}, {})",
                index,
                start,
                end,
                spec.fs_label,
                if spec.mountpoint.is_empty() {
                    "unmounted"
                } else {
                    spec.mountpoint.as_str()
                }
            );
            self.hal
                .parted(
                    &disk.path,
                    PartedOp::MkPart {
                        part_type: "primary".to_string(),
                        fs_type: parted_fs_hint(&spec.fs_label),
                        start: format!("{}MiB", start),
                        end: format!("{}MiB", end),
                    },
                    &opts,
                )
                .map_err(|source| ProvisionError::PartitionCreation {
                    disk: disk.path.clone(),
                    index,
                    source,
                })?;

            if disk.table.is_gpt() {
                self.decorate(&disk.path, index, &spec, &opts, warnings);
            }

            partitions.push(ConcretePartition {
                device: PathBuf::from(partition_path(&disk_str, index)),
                spec,
                index,
                start_mib: start,
                end_mib: end,
            });
        }

        log::info!(
            "📋 {} partition table created ({} partitions)",
            disk.table,
            partitions.len()
        );
        Ok(DeviceMap {
            disk: disk.path,
            table: disk.table,
            partitions,
        })
    }

    /// GPT-only flags and name. Each failure is independent.
    fn decorate(
        &self,
        disk: &Path,
        index: u32,
        spec: &PartitionSpec,
        opts: &PartedOptions,
        warnings: &mut Warnings,
    ) {
        let subject = format!("partition {}", index);
        let mut flags = Vec::new();
        if spec.flags.esp {
            flags.push("esp");
        }
        if spec.flags.swap {
            flags.push("swap");
        }
        for flag in flags {
            let op = PartedOp::SetFlag {
                part_num: index,
                flag: flag.to_string(),
                state: "on".to_string(),
            };
            if let Err(err) = self.hal.parted(disk, op, opts) {
                warnings.push(
                    WarningKind::PartitionFlag,
                    &subject,
                    format!("setting {} flag failed: {}", flag, err),
                );
            }
        }

        if let Some(name) = &spec.name {
            let op = PartedOp::Name {
                part_num: index,
                name: name.clone(),
            };
            if let Err(err) = self.hal.parted(disk, op, opts) {
                warnings.push(
                    WarningKind::PartitionName,
                    &subject,
                    format!("setting name {} failed: {}", name, err),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_states::ExecuteArmToken;
    use crate::partitioning::{Disk, PartitionPlan, GIB};
    use aghos_hal::{FakeHal, Operation};

    fn execute() -> RunMode {
        RunMode::Execute(ExecuteArmToken::try_new(true, true).unwrap())
    }

    fn plan(table: TableKind) -> ValidatedPlan {
        let disk = Disk::new("/dev/sda", 64 * GIB, table);
        let total = disk.total_bytes;
        let mut plan = PartitionPlan::new(disk);
        plan.push(PartitionSpec::new("1G", total, "/boot", "vfat", Some("boot")));
        plan.push(PartitionSpec::new("40G", total, "/", "btrfs", Some("root")));
        plan.push(PartitionSpec::new("8G", total, "swap", "swap", Some("swap")));
        plan.validate().unwrap()
    }

    #[test]
    fn fs_hint_mapping() {
        assert_eq!(parted_fs_hint("vfat"), "fat32");
        assert_eq!(parted_fs_hint("VFAT"), "fat32");
        assert_eq!(parted_fs_hint("swapspace"), "linux-swap");
        assert_eq!(parted_fs_hint("linux-swap"), "linux-swap");
        assert_eq!(parted_fs_hint("btrfs"), "btrfs");
        assert_eq!(parted_fs_hint("zfs"), "zfs");
    }

    #[test]
    fn layout_uses_offset_and_gaps() {
        let specs = plan(TableKind::Gpt).into_parts().1;
        let ranges = layout(&specs).unwrap();
        assert_eq!(ranges, vec![(1, 1025), (1026, 41_986), (41_987, 50_179)]);
    }

    #[test]
    fn zero_size_still_gets_one_mib() {
        let spec = PartitionSpec::new("garbage", GIB, "/", "ext4", None);
        assert_eq!(spec.size_bytes, 0);
        assert_eq!(layout(&[spec]).unwrap(), vec![(1, 2)]);
    }

    #[test]
    fn gpt_write_creates_partitions_flags_and_names() {
        let hal = FakeHal::new();
        let mut warnings = Warnings::default();
        let map = PartitionTableWriter::new(&hal)
            .write(plan(TableKind::Gpt), &execute(), &mut warnings)
            .unwrap();

        assert_eq!(
            hal.descriptions(),
            vec![
                "parted -s /dev/sda mklabel gpt",
                "parted -s /dev/sda mkpart primary fat32 1MiB 1025MiB",
                "parted -s /dev/sda set 1 esp on",
                "parted -s /dev/sda name 1 boot",
                "parted -s /dev/sda mkpart primary btrfs 1026MiB 41986MiB",
                "parted -s /dev/sda name 2 root",
                "parted -s /dev/sda mkpart primary linux-swap 41987MiB 50179MiB",
                "parted -s /dev/sda set 3 swap on",
                "parted -s /dev/sda name 3 swap",
            ]
        );
        assert!(warnings.is_empty());
        let indices: Vec<u32> = map.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert_eq!(map.root().unwrap().device, PathBuf::from("/dev/sda2"));
    }

    #[test]
    fn mbr_write_uses_msdos_and_skips_gpt_extras() {
        let hal = FakeHal::new();
        let mut warnings = Warnings::default();
        PartitionTableWriter::new(&hal)
            .write(plan(TableKind::Mbr), &execute(), &mut warnings)
            .unwrap();

        let descriptions = hal.descriptions();
        assert_eq!(descriptions[0], "parted -s /dev/sda mklabel msdos");
        assert_eq!(descriptions.len(), 4);
        assert!(!descriptions.iter().any(|d| d.contains(" set ") || d.contains(" name ")));
    }

    #[test]
    fn flag_failure_is_a_warning() {
        let hal = FakeHal::new().fail_on("set 1 esp");
        let mut warnings = Warnings::default();
        let map = PartitionTableWriter::new(&hal)
            .write(plan(TableKind::Gpt), &execute(), &mut warnings)
            .unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(warnings.count(WarningKind::PartitionFlag), 1);
        assert!(hal.descriptions().contains(&"parted -s /dev/sda name 1 boot".to_string()));
    }

    #[test]
    fn mklabel_failure_stops_everything() {
        let hal = FakeHal::new().fail_on("mklabel");
        let mut warnings = Warnings::default();
        let err = PartitionTableWriter::new(&hal)
            .write(plan(TableKind::Gpt), &execute(), &mut warnings)
            .unwrap_err();
        assert!(matches!(err, ProvisionError::TableCreation { .. }));
        assert_eq!(hal.operation_count(), 1);
    }

    #[test]
    fn mkpart_failure_is_fatal() {
        let hal = FakeHal::new().fail_on("mkpart primary btrfs");
        let mut warnings = Warnings::default();
        let err = PartitionTableWriter::new(&hal)
            .write(plan(TableKind::Gpt), &execute(), &mut warnings)
            .unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::PartitionCreation { index: 2, .. }
        ));
        assert!(!hal.has_operation(|op| matches!(
            op,
            Operation::Parted { args, .. } if args.contains(&"linux-swap".to_string())
        )));
    }

    #[test]
    fn dry_run_records_nothing() {
        let hal = FakeHal::new();
        let mut warnings = Warnings::default();
        let map = PartitionTableWriter::new(&hal)
            .write(plan(TableKind::Gpt), &RunMode::DryRun, &mut warnings)
            .unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(hal.operation_count(), 0);
    }

    #[test]
    fn nvme_devices_use_infix() {
        let disk = Disk::new("/dev/nvme0n1", 64 * GIB, TableKind::Gpt);
        let total = disk.total_bytes;
        let mut plan = PartitionPlan::new(disk);
        plan.push(PartitionSpec::new("10G", total, "/", "ext4", None));
        let hal = FakeHal::new();
        let map = PartitionTableWriter::new(&hal)
            .write(plan.validate().unwrap(), &execute(), &mut Warnings::default())
            .unwrap();
        assert_eq!(map.partitions[0].device, PathBuf::from("/dev/nvme0n1p1"));
    }
}
