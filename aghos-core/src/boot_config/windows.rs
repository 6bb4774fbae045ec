//! Windows detection and the `41_windows` chain-load fragment.

use crate::fs_util::{under_root, write_atomic};
use aghos_hal::ProbeOps;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Windows boot manager, relative to the ESP root.
pub const BOOTMGFW_RELATIVE: &str = "EFI/Microsoft/Boot/bootmgfw.efi";
/// Fragment location relative to the target root.
pub const FRAGMENT_PATH: &str = "etc/grub.d/41_windows";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WindowsDetection {
    pub uefi_present: bool,
    pub bios_present: bool,
}

impl WindowsDetection {
    pub fn any(&self) -> bool {
        self.uefi_present || self.bios_present
    }
}

/// UEFI: boot manager on the ESP. BIOS: any NTFS volume on the system,
/// checked only when no UEFI boot manager was found.
pub fn detect_windows<H: ProbeOps + ?Sized>(
    hal: &H,
    root: &Path,
    esp: Option<&str>,
) -> WindowsDetection {
    let uefi_present = esp
        .map(|esp| under_root(root, esp).join(BOOTMGFW_RELATIVE).exists())
        .unwrap_or(false);
    let bios_present = !uefi_present
        && match hal.devices_with_fs_type("ntfs") {
            Ok(devices) => devices.iter().any(|d| !d.trim().is_empty()),
            Err(err) => {
                log::warn!("⚠️ Windows detection failed: {}", err);
                false
            }
        };
    WindowsDetection {
        uefi_present,
        bios_present,
    }
}

/// Fragment text, or `None` when there is nothing to chain-load.
///
/// The `tail` header makes grub-mkconfig emit everything after line 2 verbatim.
pub fn render_fragment(detection: &WindowsDetection) -> Option<String> {
    if !detection.any() {
        return None;
    }
    let mut lines = vec![
        "#!/bin/sh",
        "exec tail -n +3 $0",
        "# ---- Windows entries added by AGHOS installer ----",
    ];
    if detection.uefi_present {
        lines.extend([
            "menuentry 'Windows Boot Manager (UEFI)' --class windows --class os {",
            "    insmod part_gpt",
            "    insmod fat",
            "    insmod chain",
            "    search --no-floppy --file --set=root /EFI/Microsoft/Boot/bootmgfw.efi",
            "    chainloader /EFI/Microsoft/Boot/bootmgfw.efi",
            "}",
        ]);
    }
    if detection.bios_present {
        lines.extend([
            "menuentry 'Windows (BIOS/MBR)' --class windows --class os {",
            "    insmod part_msdos",
            "    insmod ntfs",
            "    insmod chain",
            "    # Locate the partition holding the Windows boot sector (bootmgr)",
            "    search --no-floppy --file --set=root /bootmgr",
            "    chainloader +1",
            "}",
        ]);
    }
    let mut content = lines.join("\n");
    content.push('\n');
    Some(content)
}

/// Write the executable fragment; no file at all when Windows is absent.
pub fn write_fragment(
    root: &Path,
    detection: &WindowsDetection,
    dry_run: bool,
) -> Result<Option<PathBuf>> {
    let Some(content) = render_fragment(detection) else {
        log::info!("No Windows detected, skipping 41_windows");
        return Ok(None);
    };
    let path = root.join(FRAGMENT_PATH);
    if dry_run {
        log::info!("DRY RUN: write {} (0755)", path.display());
        return Ok(None);
    }
    log::info!("Windows detected, adding GRUB entry {}", path.display());
    write_atomic(&path, content.as_bytes(), Some(0o755))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(Some(path))
}
