use crate::fs_util::under_root;
use aghos_hal::ProbeOps;
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// In-target mountpoints checked for an ESP, in priority order.
pub const ESP_CANDIDATES: &[&str] = &["/boot", "/efi", "/boot/efi", "/boot/EFI"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum BootMode {
    /// ESP mounted at this in-target path.
    Uefi { esp: String },
    Bios,
}

impl BootMode {
    pub fn esp(&self) -> Option<&str> {
        match self {
            BootMode::Uefi { esp } => Some(esp),
            BootMode::Bios => None,
        }
    }
}

impl fmt::Display for BootMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootMode::Uefi { esp } => write!(f, "UEFI (ESP at {})", esp),
            BootMode::Bios => write!(f, "BIOS"),
        }
    }
}

/// First candidate that is an actual mountpoint under `root` wins.
pub fn detect_esp<H: ProbeOps + ?Sized>(hal: &H, root: &Path) -> BootMode {
    for candidate in ESP_CANDIDATES {
        match hal.mount_at(&under_root(root, candidate)) {
            Ok(Some(_)) => {
                return BootMode::Uefi {
                    esp: candidate.to_string(),
                }
            }
            Ok(None) => {}
            Err(err) => log::debug!("findmnt {} failed: {}", candidate, err),
        }
    }
    BootMode::Bios
}

#[cfg(test)]
mod tests {
    use super::*;
    use aghos_hal::{FakeHal, MountRecord};

    #[test]
    fn first_mounted_candidate_wins() {
        let hal = FakeHal::new()
            .with_mount(MountRecord::new("/dev/sda2", "/mnt", "ext4", "rw"))
            .with_mount(MountRecord::new("/dev/sda1", "/mnt/boot/efi", "vfat", "rw"))
            .with_mount(MountRecord::new("/dev/sda3", "/mnt/efi", "vfat", "rw"));
        assert_eq!(
            detect_esp(&hal, Path::new("/mnt")),
            BootMode::Uefi {
                esp: "/efi".to_string()
            }
        );
    }

    #[test]
    fn no_candidate_means_bios() {
        let hal = FakeHal::new().with_mount(MountRecord::new("/dev/sda2", "/mnt", "ext4", "rw"));
        let mode = detect_esp(&hal, Path::new("/mnt"));
        assert_eq!(mode, BootMode::Bios);
        assert_eq!(mode.esp(), None);
    }
}
