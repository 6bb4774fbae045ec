//! Parsing helpers for `lsblk` listings used by disk discovery.

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskInfo {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub model: String,
}

impl DiskInfo {
    pub fn new(path: impl Into<PathBuf>, size_bytes: u64, model: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            size_bytes,
            model: model.into(),
        }
    }

    pub fn size_gib(&self) -> f64 {
        self.size_bytes as f64 / (1u64 << 30) as f64
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionInfo {
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Parse `lsblk -nd -b -o NAME,SIZE,MODEL`.
///
/// The model column may contain spaces or be empty. A non-numeric size is
/// reported as 0 rather than dropping the disk.
pub fn parse_disks(content: &str) -> Vec<DiskInfo> {
    content
        .lines()
        .filter_map(|line| {
            let mut cols = line.split_whitespace();
            let name = cols.next()?;
            let size = cols.next()?.parse().unwrap_or(0);
            let model = cols.collect::<Vec<_>>().join(" ");
            Some(DiskInfo::new(format!("/dev/{}", name), size, model))
        })
        .collect()
}

/// Parse `lsblk -b -n -l -o NAME,TYPE,SIZE <disk>`, keeping only `part` rows.
pub fn parse_partitions(content: &str) -> Vec<PartitionInfo> {
    content
        .lines()
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 3 || cols[1] != "part" {
                return None;
            }
            Some(PartitionInfo {
                path: PathBuf::from(format!("/dev/{}", cols[0])),
                size_bytes: cols[2].parse().ok()?,
            })
        })
        .collect()
}

/// First numeric line of `lsblk -b -n -l -o SIZE <disk>` (the disk itself).
pub fn parse_disk_size(content: &str) -> Option<u64> {
    content.lines().next()?.trim().parse().ok()
}
