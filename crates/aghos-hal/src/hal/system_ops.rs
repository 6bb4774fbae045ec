//! System-level operations (sync, udev settle, privilege check).

use crate::HalResult;

/// System operations trait.
pub trait SystemOps {
    /// Best-effort filesystem sync.
    fn sync(&self) -> HalResult<()>;

    /// Best-effort udev settle (wait for block device events to quiesce).
    fn udev_settle(&self) -> HalResult<()>;

    /// Whether the process runs with effective uid 0.
    fn is_root(&self) -> bool;

    /// Raw `/proc/meminfo` contents.
    fn proc_meminfo(&self) -> HalResult<String>;
}
