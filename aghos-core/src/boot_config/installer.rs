//! GRUB installation for the freshly mounted target.
//!
//! Nothing in here is fatal: a missing bootloader is repairable from a live
//! system, so every failure becomes a warning and the remaining steps run.

use super::esp::{detect_esp, BootMode};
use super::grub_defaults::{apply_branding, copy_background};
use super::windows::{detect_windows, write_fragment, WindowsDetection};
use crate::errors::{WarningKind, Warnings};
use aghos_hal::findmnt::clean_source;
use aghos_hal::path::whole_disk_path;
use aghos_hal::{BootOps, GrubTarget, ProbeOps};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootSettings {
    pub bootloader_id: String,
    pub distributor: String,
    /// Background image path inside the target.
    pub background: String,
    /// Host file copied to `background`.
    pub background_source: PathBuf,
    /// BIOS install disk when the root's disk cannot be derived.
    pub bios_fallback_disk: String,
    pub grub_cfg: String,
    pub removable: bool,
}

impl Default for BootSettings {
    fn default() -> Self {
        Self {
            bootloader_id: "AGHOS".to_string(),
            distributor: "AGHOS".to_string(),
            background: "/boot/logo.png".to_string(),
            background_source: PathBuf::from("/boot/logo.png"),
            bios_fallback_disk: "/dev/sda".to_string(),
            grub_cfg: "/boot/grub/grub.cfg".to_string(),
            removable: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootReport {
    pub mode: BootMode,
    pub windows: WindowsDetection,
    /// `41_windows`, when one was written.
    pub fragment: Option<PathBuf>,
    pub installed: bool,
    pub config_generated: bool,
}

pub struct BootloaderInstaller<'a, H: ProbeOps + BootOps + ?Sized> {
    hal: &'a H,
    root: PathBuf,
    settings: BootSettings,
}

impl<'a, H: ProbeOps + BootOps + ?Sized> BootloaderInstaller<'a, H> {
    pub fn new(hal: &'a H, root: impl Into<PathBuf>, settings: BootSettings) -> Self {
        Self {
            hal,
            root: root.into(),
            settings,
        }
    }

    pub fn install(&self, dry_run: bool, warnings: &mut Warnings) -> BootReport {
        log::info!("Installing GRUB into {}", self.root.display());
        self.prepare_dirs(dry_run, warnings);

        let mode = detect_esp(self.hal, &self.root);
        let windows = detect_windows(self.hal, &self.root, mode.esp());
        log::info!("Boot mode: {}", mode);

        let target = match &mode {
            BootMode::Uefi { esp } => GrubTarget::Efi {
                efi_directory: esp.clone(),
                bootloader_id: self.settings.bootloader_id.clone(),
                removable: self.settings.removable,
            },
            BootMode::Bios => GrubTarget::Bios {
                disk: self.bios_disk(),
            },
        };
        let installed = match self.hal.grub_install(&self.root, &target, dry_run) {
            Ok(()) => true,
            Err(err) => {
                warnings.push(
                    WarningKind::BootloaderInstall,
                    "grub-install",
                    format!("{} install failed: {}", mode, err),
                );
                false
            }
        };

        if let Err(err) = copy_background(
            &self.settings.background_source,
            &self.root,
            &self.settings.background,
            dry_run,
        ) {
            warnings.push(WarningKind::Branding, &self.settings.background, format!("{:#}", err));
        }
        if let Err(err) = apply_branding(
            &self.root,
            &self.settings.background,
            &self.settings.distributor,
            dry_run,
        ) {
            warnings.push(WarningKind::Branding, "/etc/default/grub", format!("{:#}", err));
        }

        let fragment = match write_fragment(&self.root, &windows, dry_run) {
            Ok(path) => path,
            Err(err) => {
                warnings.push(WarningKind::WindowsFragment, "41_windows", format!("{:#}", err));
                None
            }
        };

        log::info!("Generating {}...", self.settings.grub_cfg);
        let config_generated = match self
            .hal
            .grub_mkconfig(&self.root, &self.settings.grub_cfg, dry_run)
        {
            Ok(()) => true,
            Err(err) => {
                warnings.push(
                    WarningKind::BootConfigRegen,
                    &self.settings.grub_cfg,
                    format!("grub-mkconfig failed: {}", err),
                );
                false
            }
        };

        BootReport {
            mode,
            windows,
            fragment,
            installed,
            config_generated,
        }
    }

    /// Whole disk behind the target root, e.g. `/dev/nvme0n1` for `/dev/nvme0n1p2`.
    fn bios_disk(&self) -> String {
        let derived = match self.hal.mount_at(&self.root) {
            Ok(Some(record)) => whole_disk_path(&clean_source(&record.source)),
            Ok(None) => None,
            Err(err) => {
                log::debug!("findmnt {} failed: {}", self.root.display(), err);
                None
            }
        };
        match derived {
            Some(disk) => {
                log::info!("BIOS mode: installing to {}", disk);
                disk
            }
            None => {
                log::warn!(
                    "Cannot find the disk behind {}, falling back to {}",
                    self.root.display(),
                    self.settings.bios_fallback_disk
                );
                self.settings.bios_fallback_disk.clone()
            }
        }
    }

    fn prepare_dirs(&self, dry_run: bool, warnings: &mut Warnings) {
        for dir in ["boot", "boot/EFI/BOOT"] {
            let path = self.root.join(dir);
            if dry_run {
                log::info!("DRY RUN: mkdir -p {}", path.display());
                continue;
            }
            if let Err(err) = fs::create_dir_all(&path) {
                warnings.push(
                    WarningKind::BootloaderInstall,
                    path.display().to_string(),
                    format!("mkdir failed: {}", err),
                );
            }
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
