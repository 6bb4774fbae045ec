use thiserror::Error;

pub type HalResult<T> = std::result::Result<T, HalError>;

/// Failure of a single HAL call. Tool stderr is carried verbatim.
#[derive(Error, Debug)]
pub enum HalError {
    /// A partition-table or GRUB-target operation was called with its
    /// confirmation flag unset.
    #[error("Safety lock engaged: destructive operation was not confirmed")]
    SafetyLock,

    #[error("Device or mountpoint is busy")]
    DiskBusy,

    #[error("Permission denied (the installer must run as root)")]
    PermissionDenied,

    #[error("{0} is not installed or not on PATH")]
    CommandNotFound(String),

    #[error("{program} failed (exit={code:?}): {stderr}")]
    CommandFailed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{program} did not finish within {timeout_secs}s")]
    CommandTimeout { program: String, timeout_secs: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("nix errno: {0}")]
    Nix(#[from] nix::errno::Errno),

    /// Tool output that could not be understood, or a disk the probe does not know.
    #[error("Parse error: {0}")]
    Parse(String),
}
