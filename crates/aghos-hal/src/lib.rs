//! AGHOS hardware abstraction layer (HAL).
//!
//! Everything the installer does to the outside world (partition table
//! mutation, mkfs, mount, swap, blkid/findmnt/lsblk probes, grub) goes through
//! the traits in [`hal`]. [`LinuxHal`] drives the real tools; [`FakeHal`]
//! records operations so the provisioning engine can be tested without root.

pub mod error;
pub mod findmnt;
pub mod hal;
pub mod lsblk;
pub mod path;
pub mod procfs;

pub use error::{HalError, HalResult};
pub use findmnt::MountRecord;
pub use hal::*;
pub use lsblk::{DiskInfo, PartitionInfo};
