//! Parsing helpers for `findmnt --raw` output.
//!
//! The installer queries the live mount topology with
//! `findmnt -Rrno SOURCE,TARGET,FSTYPE,OPTIONS <root>`. In raw mode findmnt
//! separates columns with single spaces and hex-escapes whitespace inside
//! values (`\x20`).

use std::path::PathBuf;

/// One live mount as reported by findmnt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRecord {
    pub source: String,
    pub target: PathBuf,
    pub fstype: String,
    pub options: String,
}

impl MountRecord {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<PathBuf>,
        fstype: impl Into<String>,
        options: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            fstype: fstype.into(),
            options: options.into(),
        }
    }

    /// True when the source is a real block-device node.
    pub fn is_block_device(&self) -> bool {
        self.source.starts_with("/dev/")
    }
}

/// Parse `findmnt -rno SOURCE,TARGET,FSTYPE,OPTIONS` lines.
///
/// Lines with fewer than four columns are skipped. Btrfs subvolume suffixes on
/// the source (`/dev/sda2[/@home]`) are removed.
pub fn parse_findmnt_raw(content: &str) -> Vec<MountRecord> {
    content
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let source = fields.next()?;
            let target = fields.next()?;
            let fstype = fields.next()?;
            let options = fields.next()?;
            Some(MountRecord {
                source: clean_source(&unescape_raw(source)),
                target: PathBuf::from(unescape_raw(target)),
                fstype: unescape_raw(fstype),
                options: unescape_raw(options),
            })
        })
        .collect()
}

/// Strip a trailing `[...]` subvolume/bind annotation from a mount source.
pub fn clean_source(source: &str) -> String {
    match source.find('[') {
        Some(idx) if source.ends_with(']') => source[..idx].to_string(),
        _ => source.to_string(),
    }
}

fn unescape_raw(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() && bytes[i + 1] == b'x' {
            let hex = std::str::from_utf8(&bytes[i + 2..i + 4]).ok();
            if let Some(value) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(value);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
