//! Stable device identifiers (UUID, else PARTUUID) via blkid.

use aghos_hal::{BlkidTag, ProbeOps};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PersistentId {
    pub tag: BlkidTag,
    pub value: String,
}

impl PersistentId {
    pub fn new(tag: BlkidTag, value: impl Into<String>) -> Self {
        Self {
            tag,
            value: value.into(),
        }
    }
}

/// Renders as an fstab source field, e.g. `UUID=0a1b...`.
impl fmt::Display for PersistentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.tag.as_str(), self.value)
    }
}

pub struct PersistentIdResolver<'a, H: ProbeOps + ?Sized> {
    hal: &'a H,
}

impl<'a, H: ProbeOps + ?Sized> PersistentIdResolver<'a, H> {
    pub fn new(hal: &'a H) -> Self {
        Self { hal }
    }

    /// UUID if the device has one, else PARTUUID, else `None`.
    ///
    /// Probe failures count as "no identifier"; fresh devices often have none.
    pub fn resolve(&self, device: &Path) -> Option<PersistentId> {
        [BlkidTag::Uuid, BlkidTag::PartUuid]
            .into_iter()
            .find_map(|tag| self.query(device, tag))
    }

    fn query(&self, device: &Path, tag: BlkidTag) -> Option<PersistentId> {
        match self.hal.blkid_value(device, tag) {
            Ok(Some(value)) if !value.trim().is_empty() => {
                Some(PersistentId::new(tag, value.trim()))
            }
            Ok(_) => None,
            Err(err) => {
                log::debug!(
                    "blkid {} lookup for {} failed: {}",
                    tag.as_str(),
                    device.display(),
                    err
                );
                None
            }
        }
    }
}
