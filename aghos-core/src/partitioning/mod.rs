//! Partition planning and partition-table writing.
//!
//! A [`plan::PartitionPlan`] is edited freely, then validated into a
//! [`plan::ValidatedPlan`] that the [`table_writer::PartitionTableWriter`]
//! consumes exactly once.

pub mod plan;
pub mod size;
pub mod table_writer;

pub use plan::{
    normalize_mountpoint, Disk, PartitionFlags, PartitionPlan, PartitionSpec, TableKind,
    UsageSummary, ValidatedPlan,
};
pub use size::{parse_size, GIB, MIB, TIB};
pub use table_writer::{ConcretePartition, DeviceMap, PartitionTableWriter};
