//! Parsing helpers for `/proc/meminfo`.

/// Dirty and Writeback page totals, in KiB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WritebackInfo {
    pub dirty_kb: u64,
    pub writeback_kb: u64,
}

impl WritebackInfo {
    /// True once both counters are at or below `threshold_kb`.
    pub fn is_drained(&self, threshold_kb: u64) -> bool {
        self.dirty_kb <= threshold_kb && self.writeback_kb <= threshold_kb
    }
}

/// Extracts the `Dirty:` and `Writeback:` counters. Missing counters read as 0.
pub fn parse_writeback(content: &str) -> WritebackInfo {
    let mut info = WritebackInfo {
        dirty_kb: 0,
        writeback_kb: 0,
    };
    for line in content.lines() {
        if let Some(value) = line.strip_prefix("Dirty:") {
            info.dirty_kb = first_number(value).unwrap_or(0);
        } else if let Some(value) = line.strip_prefix("Writeback:") {
            info.writeback_kb = first_number(value).unwrap_or(0);
        }
    }
    info
}

fn first_number(value: &str) -> Option<u64> {
    value.split_whitespace().next().and_then(|num| num.parse().ok())
}
