//! Bootloader operations (grub-install / grub-mkconfig inside the target root).

use crate::HalResult;
use std::path::Path;

/// Where grub-install should put the bootloader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrubTarget {
    Efi {
        efi_directory: String,
        bootloader_id: String,
        removable: bool,
    },
    Bios {
        disk: String,
    },
}

impl GrubTarget {
    pub fn install_args(&self) -> Vec<String> {
        match self {
            GrubTarget::Efi {
                efi_directory,
                bootloader_id,
                removable,
            } => {
                let mut args = vec![
                    "--target=x86_64-efi".to_string(),
                    format!("--efi-directory={}", efi_directory),
                    format!("--bootloader-id={}", bootloader_id),
                ];
                if *removable {
                    args.push("--removable".to_string());
                }
                args
            }
            GrubTarget::Bios { disk } => {
                vec!["--boot-directory=/boot".to_string(), disk.clone()]
            }
        }
    }
}

pub trait BootOps {
    /// Run `grub-install` chrooted into `root`.
    fn grub_install(&self, root: &Path, target: &GrubTarget, dry_run: bool) -> HalResult<()>;

    /// Run `grub-mkconfig -o <output>` chrooted into `root`.
    fn grub_mkconfig(&self, root: &Path, output: &str, dry_run: bool) -> HalResult<()>;
}
