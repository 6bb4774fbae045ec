//! HAL trait definitions and implementations.
//!
//! This module defines the core traits for system operations and provides
//! both real (LinuxHal) and fake (FakeHal) implementations.

pub mod boot_ops;
pub mod fake_hal;
pub mod format_ops;
pub mod linux_hal;
pub mod mount_ops;
pub mod partition_ops;
pub mod probe_ops;
mod process;
pub mod swap_ops;
pub mod system_ops;

pub use boot_ops::{BootOps, GrubTarget};
pub use fake_hal::{FakeHal, Operation};
pub use format_ops::{Filesystem, FormatOps, FormatOptions};
pub use linux_hal::LinuxHal;
pub use mount_ops::{MountOps, MountOptions};
pub use partition_ops::{PartedOp, PartedOptions, PartitionOps};
pub use probe_ops::{BlkidTag, ProbeOps};
pub use swap_ops::SwapOps;
pub use system_ops::SystemOps;

/// Complete HAL combining every operation the installer needs.
pub trait InstallerHal:
    PartitionOps + FormatOps + MountOps + SwapOps + ProbeOps + BootOps + SystemOps + Send + Sync
{
}

/// Automatically implement InstallerHal for any type implementing all required traits.
impl<T> InstallerHal for T where
    T: PartitionOps + FormatOps + MountOps + SwapOps + ProbeOps + BootOps + SystemOps + Send + Sync
{
}
