//! Partitioning operations (parted).

use crate::HalResult;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct PartedOptions {
    pub dry_run: bool,
    pub confirmed: bool,
}

impl PartedOptions {
    pub fn new(dry_run: bool, confirmed: bool) -> Self {
        Self { dry_run, confirmed }
    }
}

/// A single partition operation executed via `parted -s <disk> ...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartedOp {
    MkLabel {
        label: String,
    },
    MkPart {
        part_type: String,
        fs_type: String,
        start: String,
        end: String,
    },
    SetFlag {
        part_num: u32,
        flag: String,
        state: String,
    },
    Name {
        part_num: u32,
        name: String,
    },
}

impl PartedOp {
    /// Arguments following `parted -s <disk>`.
    pub fn args(&self) -> Vec<String> {
        match self {
            PartedOp::MkLabel { label } => vec!["mklabel".to_string(), label.clone()],
            PartedOp::MkPart {
                part_type,
                fs_type,
                start,
                end,
            } => vec![
                "mkpart".to_string(),
                part_type.clone(),
                fs_type.clone(),
                start.clone(),
                end.clone(),
            ],
            PartedOp::SetFlag {
                part_num,
                flag,
                state,
            } => vec![
                "set".to_string(),
                part_num.to_string(),
                flag.clone(),
                state.clone(),
            ],
            PartedOp::Name { part_num, name } => {
                vec!["name".to_string(), part_num.to_string(), name.clone()]
            }
        }
    }
}

pub trait PartitionOps {
    /// Execute a single `parted` operation on the given disk, returning stdout.
    fn parted(&self, disk: &Path, op: PartedOp, opts: &PartedOptions) -> HalResult<String>;
}
