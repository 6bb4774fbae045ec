//! Swap activation and discovery.

use crate::HalResult;
use std::path::Path;

pub trait SwapOps {
    /// Activate swap on a device or swap file (`swapon <path>`).
    fn swapon(&self, device: &Path, dry_run: bool) -> HalResult<()>;

    /// Currently active swap sources (`swapon --noheadings --show=NAME`).
    fn active_swaps(&self) -> HalResult<Vec<String>>;
}
