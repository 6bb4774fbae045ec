//! Formatting, mounting and unmounting of the target disk.

pub mod mkfs;
pub mod orchestrator;
pub mod teardown;

pub use mkfs::{is_swap_label, select_filesystem};
pub use orchestrator::{
    DevicePoll, FormatMountOrchestrator, MountReport, MountTarget, MountedPartition,
    ProvisionState,
};
pub use teardown::{teardown, TeardownOptions, TeardownReport};
