//! AGHOS core library.
//!
//! `aghos-core` holds the provisioning engine: partition planning and table
//! writing, format/mount orchestration, persistent identifiers, fstab
//! generation and bootloader setup. Everything that touches the system goes
//! through `aghos-hal`, so the whole engine runs against `FakeHal` in tests.

pub mod boot_config;
pub mod config;
pub mod config_states;
pub mod disk_ops;
pub mod errors;
pub mod fs_util;
pub mod fstab;
pub mod partitioning;
pub mod persistent_id;

pub use errors::{ProvisionError, Severity, Warning, WarningKind, Warnings};
