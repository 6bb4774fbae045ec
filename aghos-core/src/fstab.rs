//! fstab generation from the live mount topology under the install root.

use crate::errors::{ProvisionError, WarningKind, Warnings};
use crate::fs_util::write_atomic;
use crate::persistent_id::{PersistentId, PersistentIdResolver};
use aghos_hal::findmnt::clean_source;
use aghos_hal::{MountRecord, ProbeOps, SwapOps};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// Root options when the root filesystem is ext4.
pub const ROOT_EXT4_OPTIONS: &str = "noatime,nodiratime,lazytime,commit=60,errors=remount-ro";
/// Options for the degraded root entry built from the root mount alone.
pub const FALLBACK_ROOT_OPTIONS: &str = "noatime";
pub const DEFAULT_OPTIONS: &str = "defaults";
/// Swap file path inside the target, as written to fstab.
pub const SWAPFILE: &str = "/swapfile";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FstabSource {
    Id(PersistentId),
    /// Literal path, used for swap files.
    Path(String),
}

impl fmt::Display for FstabSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FstabSource::Id(id) => id.fmt(f),
            FstabSource::Path(path) => f.write_str(path),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FstabEntry {
    pub source: FstabSource,
    pub mountpoint: String,
    pub fstype: String,
    pub options: String,
    pub dump: u8,
    pub pass: u8,
}

impl FstabEntry {
    pub fn swap(source: FstabSource) -> Self {
        Self {
            source,
            mountpoint: "none".to_string(),
            fstype: "swap".to_string(),
            options: DEFAULT_OPTIONS.to_string(),
            dump: 0,
            pass: 0,
        }
    }

    pub fn is_root(&self) -> bool {
        self.mountpoint == "/"
    }
}

impl fmt::Display for FstabEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{} {}",
            self.source, self.mountpoint, self.fstype, self.options, self.dump, self.pass
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fstab {
    pub entries: Vec<FstabEntry>,
}

impl Fstab {
    pub fn has_root(&self) -> bool {
        self.entries.iter().any(FstabEntry::is_root)
    }

    pub fn swap_count(&self) -> usize {
        self.entries.iter().filter(|e| e.fstype == "swap").count()
    }

    /// One line per entry; empty table renders as an empty file.
    pub fn render(&self) -> String {
        let mut out = self
            .entries
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }
}

/// Options for a live mount once it lands in fstab.
pub fn fstab_options(mountpoint: &str, fstype: &str, live_options: &str) -> String {
    if mountpoint == "/" && fstype == "ext4" {
        return ROOT_EXT4_OPTIONS.to_string();
    }
    let kept: Vec<&str> = live_options
        .split(',')
        .filter(|o| !o.is_empty() && *o != "rw")
        .collect();
    if kept.is_empty() {
        DEFAULT_OPTIONS.to_string()
    } else {
        kept.join(",")
    }
}

/// Post-install mountpoint for a target seen under `root`.
pub fn target_mountpoint(root: &Path, target: &Path) -> String {
    match target.strip_prefix(root) {
        Ok(rel) if rel.as_os_str().is_empty() => "/".to_string(),
        Ok(rel) => format!("/{}", rel.display()),
        Err(_) => target.display().to_string(),
    }
}

fn is_zram(source: &str) -> bool {
    Path::new(source)
        .file_name()
        .map(|n| n.to_string_lossy().starts_with("zram"))
        .unwrap_or(false)
}

pub struct FstabGenerator<'a, H: ProbeOps + SwapOps + ?Sized> {
    hal: &'a H,
    root: PathBuf,
}

impl<'a, H: ProbeOps + SwapOps + ?Sized> FstabGenerator<'a, H> {
    pub fn new(hal: &'a H, root: impl Into<PathBuf>) -> Self {
        Self {
            hal,
            root: root.into(),
        }
    }

    pub fn fstab_path(&self) -> PathBuf {
        self.root.join("etc/fstab")
    }

    /// Build the table from what is mounted now. Only a failed topology
    /// probe is fatal; everything else degrades to a warning.
    pub fn generate(
        &self,
        activate_swap: bool,
        dry_run: bool,
        warnings: &mut Warnings,
    ) -> Result<Fstab, ProvisionError> {
        log::info!("Generating {} (UUID/PARTUUID)", self.fstab_path().display());
        let resolver = PersistentIdResolver::new(self.hal);
        let records =
            self.hal
                .mount_tree(&self.root)
                .map_err(|source| ProvisionError::TopologyProbe {
                    root: self.root.clone(),
                    source,
                })?;

        let mut fstab = Fstab::default();
        for record in &records {
            if let Some(entry) = self.mount_entry(&resolver, record, warnings) {
                fstab.entries.push(entry);
            }
        }

        if !fstab.has_root() {
            if let Some(entry) = self.fallback_root(&resolver, warnings) {
                fstab.entries.insert(0, entry);
            }
        }

        let swaps = self.swap_entries(&resolver, activate_swap, dry_run, warnings);
        if swaps.is_empty() {
            log::info!("No swap detected for fstab (fine with zram or a later swap file)");
        } else {
            log::info!("Adding {} swap entries to fstab", swaps.len());
        }
        fstab.entries.extend(swaps);
        Ok(fstab)
    }

    /// Write atomically to `<root>/etc/fstab`.
    pub fn write(&self, fstab: &Fstab, dry_run: bool) -> Result<PathBuf, ProvisionError> {
        let path = self.fstab_path();
        if dry_run {
            log::info!("DRY RUN: write {}:\n{}", path.display(), fstab.render());
            return Ok(path);
        }
        write_atomic(&path, fstab.render().as_bytes(), Some(0o644)).map_err(|source| {
            ProvisionError::Persist {
                path: path.clone(),
                source,
            }
        })?;
        log::info!(
            "Wrote {} ({} entries)",
            path.display(),
            fstab.entries.len()
        );
        Ok(path)
    }

    fn mount_entry(
        &self,
        resolver: &PersistentIdResolver<'_, H>,
        record: &MountRecord,
        warnings: &mut Warnings,
    ) -> Option<FstabEntry> {
        if !record.is_block_device() {
            log::debug!(
                "Skipping non-device mount {} at {}",
                record.source,
                record.target.display()
            );
            return None;
        }
        let source = clean_source(&record.source);
        let Some(id) = resolver.resolve(Path::new(&source)) else {
            warnings.push(
                WarningKind::MissingIdentifier,
                &source,
                format!("no UUID/PARTUUID, {} left out of fstab", record.target.display()),
            );
            return None;
        };
        let mountpoint = target_mountpoint(&self.root, &record.target);
        let pass = if mountpoint == "/" { 1 } else { 2 };
        Some(FstabEntry {
            source: FstabSource::Id(id),
            options: fstab_options(&mountpoint, &record.fstype, &record.options),
            fstype: record.fstype.clone(),
            mountpoint,
            dump: 0,
            pass,
        })
    }

    fn fallback_root(
        &self,
        resolver: &PersistentIdResolver<'_, H>,
        warnings: &mut Warnings,
    ) -> Option<FstabEntry> {
        let record = match self.hal.mount_at(&self.root) {
            Ok(Some(record)) => record,
            Ok(None) => {
                warnings.push(
                    WarningKind::MissingIdentifier,
                    "/",
                    format!("{} is not mounted, fstab has no root entry", self.root.display()),
                );
                return None;
            }
            Err(err) => {
                warnings.push(WarningKind::Probe, "/", format!("root fallback: {}", err));
                return None;
            }
        };
        let source = clean_source(&record.source);
        match resolver.resolve(Path::new(&source)) {
            Some(id) if !record.fstype.is_empty() => Some(FstabEntry {
                source: FstabSource::Id(id),
                mountpoint: "/".to_string(),
                fstype: record.fstype,
                options: FALLBACK_ROOT_OPTIONS.to_string(),
                dump: 0,
                pass: 1,
            }),
            _ => {
                warnings.push(
                    WarningKind::MissingIdentifier,
                    &source,
                    "fstab has no root entry",
                );
                None
            }
        }
    }

    fn swap_entries(
        &self,
        resolver: &PersistentIdResolver<'_, H>,
        activate: bool,
        dry_run: bool,
        warnings: &mut Warnings,
    ) -> Vec<FstabEntry> {
        let mut active: Vec<String> = match self.hal.active_swaps() {
            Ok(active) => active,
            Err(err) => {
                log::debug!("swapon --show failed: {}", err);
                Vec::new()
            }
        };
        active.retain(|s| !s.is_empty() && !is_zram(s));

        // swapon refuses a device that is already active, so only the
        // blkid fallback sources are activated here.
        let (sources, inactive) = if active.is_empty() {
            let mut found = match self.hal.devices_with_fs_type("swap") {
                Ok(found) => found,
                Err(err) => {
                    log::debug!("blkid TYPE=swap scan failed: {}", err);
                    Vec::new()
                }
            };
            found.retain(|s| !s.is_empty() && !is_zram(s));
            (found, true)
        } else {
            (active.clone(), false)
        };

        let mut entries = Vec::new();
        let swapfile = self.root.join(SWAPFILE.trim_start_matches('/'));
        if swapfile.exists() {
            entries.push(FstabEntry::swap(FstabSource::Path(SWAPFILE.to_string())));
            let swapfile_active = active.iter().any(|s| Path::new(s) == swapfile);
            if activate && !swapfile_active {
                self.activate(&swapfile, dry_run, warnings);
            }
        }

        for source in &sources {
            if !source.starts_with("/dev/") {
                // Host swap files never belong in the target's fstab.
                continue;
            }
            let device = Path::new(source);
            match resolver.resolve(device) {
                Some(id) => entries.push(FstabEntry::swap(FstabSource::Id(id))),
                None => warnings.push(
                    WarningKind::MissingIdentifier,
                    source,
                    "swap has no UUID/PARTUUID, left out of fstab",
                ),
            }
            if activate && inactive {
                self.activate(device, dry_run, warnings);
            }
        }

        let mut seen = HashSet::new();
        entries.retain(|e| seen.insert(e.to_string()));
        entries
    }

    fn activate(&self, device: &Path, dry_run: bool, warnings: &mut Warnings) {
        if let Err(err) = self.hal.swapon(device, dry_run) {
            warnings.push(
                WarningKind::SwapActivation,
                device.display().to_string(),
                format!("swapon failed: {}", err),
            );
        }
    }
}
