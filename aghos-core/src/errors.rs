//! Failure taxonomy for provisioning.
//!
//! Fatal failures are [`ProvisionError`] values and stop the pipeline.
//! Recoverable failures are [`Warning`] values collected in [`Warnings`];
//! the step that produced one is skipped and the pipeline moves on.

use aghos_hal::HalError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for AGHOS application plumbing.
pub type Result<T> = anyhow::Result<T>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Fatal,
    Warning,
}

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Partition plan has no root (/) partition")]
    MissingRoot,

    #[error("Partition plan has more than one root (/) partition")]
    DuplicateRoot,

    #[error("Mountpoint {0} is assigned to more than one partition")]
    DuplicateMountpoint(String),

    #[error("Invalid partition entry #{index}: {reason}")]
    InvalidEntry { index: usize, reason: String },

    #[error("MBR tables hold at most 4 primary partitions, plan has {0}")]
    TooManyPrimaryPartitions(usize),

    #[error(
        "Partition plan needs {required} bytes but {disk} holds only {available} bytes"
    )]
    OverProvisioned {
        disk: PathBuf,
        required: u64,
        available: u64,
    },

    #[error("Failed to query disk {disk}: {source}")]
    DiskProbe {
        disk: PathBuf,
        #[source]
        source: HalError,
    },

    #[error("Failed to create {label} partition table on {disk}: {source}")]
    TableCreation {
        disk: PathBuf,
        label: String,
        #[source]
        source: HalError,
    },

    #[error("Failed to create partition {index} on {disk}: {source}")]
    PartitionCreation {
        disk: PathBuf,
        index: u32,
        #[source]
        source: HalError,
    },

    #[error("Invalid range for partition {index}: {start}MiB..{end}MiB")]
    InvalidRange { index: u32, start: u64, end: u64 },

    #[error("Device node {device} did not appear after {attempts} attempts")]
    DeviceTimeout { device: PathBuf, attempts: u32 },

    #[error("Failed to format root device {device}: {source}")]
    RootFormat {
        device: PathBuf,
        #[source]
        source: HalError,
    },

    #[error("Failed to mount root device {device} at {target}: {source}")]
    RootMount {
        device: PathBuf,
        target: PathBuf,
        #[source]
        source: HalError,
    },

    #[error("Failed to read mount topology under {root}: {source}")]
    TopologyProbe {
        root: PathBuf,
        #[source]
        source: HalError,
    },

    #[error("Failed to write {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Missing --yes-i-know flag. This operation is destructive!")]
    MissingYesIKnow,

    #[error("Operation aborted by user")]
    Aborted,
}

impl ProvisionError {
    /// Every `ProvisionError` stops the pipeline.
    pub fn severity(&self) -> Severity {
        Severity::Fatal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WarningKind {
    PartitionFlag,
    PartitionName,
    Format,
    Mount,
    SwapFormat,
    SwapActivation,
    MissingIdentifier,
    Probe,
    BootloaderInstall,
    Branding,
    WindowsFragment,
    BootConfigRegen,
}

/// A recoverable failure: logged, recorded, and skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub subject: String,
    pub message: String,
}

impl Warning {
    pub fn severity(&self) -> Severity {
        Severity::Warning
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}: {}", self.kind, self.subject, self.message)
    }
}

/// Ordered collection of warnings raised during a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warnings(Vec<Warning>);

impl Warnings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning and emit it on the operator log.
    pub fn push(
        &mut self,
        kind: WarningKind,
        subject: impl Into<String>,
        message: impl fmt::Display,
    ) {
        let warning = Warning {
            kind,
            subject: subject.into(),
            message: message.to_string(),
        };
        log::warn!("⚠️ {}: {}", warning.subject, warning.message);
        self.0.push(warning);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Warning> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn count(&self, kind: WarningKind) -> usize {
        self.0.iter().filter(|w| w.kind == kind).count()
    }

    pub fn has(&self, kind: WarningKind) -> bool {
        self.count(kind) > 0
    }

    pub fn extend(&mut self, other: Warnings) {
        self.0.extend(other.0);
    }

    pub fn as_slice(&self) -> &[Warning] {
        &self.0
    }
}
