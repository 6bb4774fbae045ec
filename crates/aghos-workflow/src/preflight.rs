use aghos_core::config::InstallConfig;
use aghos_core::disk_ops::select_filesystem;
use aghos_hal::SystemOps;
use anyhow::{Context, Result};
use log::info;
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const PROBE_BINARIES: &[&str] = &["blkid", "findmnt", "lsblk", "udevadm"];
const BOOT_BINARIES: &[&str] = &["arch-chroot", "grub-install", "grub-mkconfig"];

#[derive(Clone, Debug, Default)]
pub struct PreflightConfig {
    pub require_root: bool,
    pub required_binaries: Vec<String>,
}

impl PreflightConfig {
    fn with_binaries<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let bins: BTreeSet<&str> = names.into_iter().collect();
        Self {
            require_root: true,
            required_binaries: bins.into_iter().map(str::to_string).collect(),
        }
    }

    /// Tools needed to partition, format, mount and boot a fresh disk.
    pub fn for_install(cfg: &InstallConfig) -> Self {
        let mkfs = cfg
            .partition_entries()
            .into_iter()
            .map(|entry| select_filesystem(&entry.fs).mkfs_program())
            .collect::<Vec<_>>();
        Self::with_binaries(
            ["parted", "mount", "swapon"]
                .into_iter()
                .chain(mkfs)
                .chain(PROBE_BINARIES.iter().copied())
                .chain(BOOT_BINARIES.iter().copied()),
        )
    }

    /// Tools needed to mount (and optionally format) existing partitions.
    pub fn for_existing(cfg: &InstallConfig) -> Self {
        let mkfs = cfg
            .existing
            .iter()
            .filter(|_| cfg.format_existing)
            .map(|entry| select_filesystem(&entry.fs).mkfs_program())
            .collect::<Vec<_>>();
        Self::with_binaries(
            ["mount", "swapon"]
                .into_iter()
                .chain(mkfs)
                .chain(PROBE_BINARIES.iter().copied())
                .chain(BOOT_BINARIES.iter().copied()),
        )
    }

    /// Tools needed for fstab and bootloader setup only.
    pub fn for_finalize() -> Self {
        Self::with_binaries(
            ["swapon"]
                .into_iter()
                .chain(PROBE_BINARIES.iter().copied())
                .chain(BOOT_BINARIES.iter().copied()),
        )
    }
}

pub fn run<H: SystemOps + ?Sized>(hal: &H, cfg: &PreflightConfig) -> Result<()> {
    info!("🧪 Preflight checks");
    if cfg.require_root && !hal.is_root() {
        anyhow::bail!("The installer must run as root (try sudo)");
    }
    check_binaries(&cfg.required_binaries)?;
    info!("✅ Preflight complete");
    Ok(())
}

fn check_binaries(bins: &[String]) -> Result<()> {
    let path = env::var_os("PATH").unwrap_or_default();
    let entries = env::split_paths(&path).collect::<Vec<_>>();
    for bin in bins {
        let Some(found) = find_in_paths(bin, &entries) else {
            anyhow::bail!("Required binary '{}' not found in PATH", bin);
        };
        ensure_executable(&found).with_context(|| {
            format!(
                "Required binary '{}' was found at {} but is not executable",
                bin,
                found.display()
            )
        })?;
    }
    Ok(())
}

fn ensure_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let md = fs::metadata(path).with_context(|| format!("failed to stat {}", path.display()))?;
    if !md.is_file() {
        anyhow::bail!("{} is not a regular file", path.display());
    }
    if md.permissions().mode() & 0o111 == 0 {
        anyhow::bail!("{} is not executable", path.display());
    }
    Ok(())
}

fn find_in_paths(binary: &str, paths: &[PathBuf]) -> Option<PathBuf> {
    paths
        .iter()
        .map(|dir| dir.join(binary))
        .find(|candidate| candidate.exists())
}
