//! Branding keys in `/etc/default/grub`.

use crate::fs_util::{under_root, write_atomic};
use anyhow::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

pub const GRUB_DEFAULTS: &str = "etc/default/grub";

/// Set `KEY="value"`: every `^\s*KEY=` line is replaced, else one is appended.
pub fn upsert_key(content: &str, key: &str, value: &str) -> String {
    let assignment = format!("{}=\"{}\"", key, value);
    let prefix = format!("{}=", key);
    let mut found = false;
    let mut lines: Vec<String> = content
        .lines()
        .map(|line| {
            if line.trim_start().starts_with(&prefix) {
                found = true;
                assignment.clone()
            } else {
                line.to_string()
            }
        })
        .collect();
    if !found {
        lines.push(assignment);
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Upsert `GRUB_BACKGROUND` and `GRUB_DISTRIBUTOR` in the target's defaults file.
pub fn apply_branding(root: &Path, background: &str, distributor: &str, dry_run: bool) -> Result<()> {
    let path = root.join(GRUB_DEFAULTS);
    if dry_run {
        log::info!(
            "DRY RUN: set GRUB_BACKGROUND=\"{}\" GRUB_DISTRIBUTOR=\"{}\" in {}",
            background,
            distributor,
            path.display()
        );
        return Ok(());
    }
    let current = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => String::new(),
        Err(err) => {
            return Err(err).with_context(|| format!("Failed to read {}", path.display()))
        }
    };
    let updated = upsert_key(&current, "GRUB_BACKGROUND", background);
    let updated = upsert_key(&updated, "GRUB_DISTRIBUTOR", distributor);
    if updated != current {
        write_atomic(&path, updated.as_bytes(), Some(0o644))
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}

/// Copy the host's background image to `background` inside the target.
pub fn copy_background(source: &Path, root: &Path, background: &str, dry_run: bool) -> Result<()> {
    let dest = under_root(root, background);
    if dry_run {
        log::info!("DRY RUN: cp {} {}", source.display(), dest.display());
        return Ok(());
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::copy(source, &dest).with_context(|| {
        format!("Failed to copy {} to {}", source.display(), dest.display())
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn replaces_existing_key_including_indented() {
        let content = "GRUB_TIMEOUT=5\n  GRUB_DISTRIBUTOR=\"Arch\"\nGRUB_CMDLINE_LINUX=\"\"\n";
        assert_eq!(
            upsert_key(content, "GRUB_DISTRIBUTOR", "AGHOS"),
            "GRUB_TIMEOUT=5\nGRUB_DISTRIBUTOR=\"AGHOS\"\nGRUB_CMDLINE_LINUX=\"\"\n"
        );
    }

    #[test]
    fn appends_missing_key_and_ignores_comments() {
        let content = "#GRUB_BACKGROUND=\"/old.png\"\nGRUB_TIMEOUT=5";
        assert_eq!(
            upsert_key(content, "GRUB_BACKGROUND", "/boot/logo.png"),
            "#GRUB_BACKGROUND=\"/old.png\"\nGRUB_TIMEOUT=5\nGRUB_BACKGROUND=\"/boot/logo.png\"\n"
        );
    }

    #[test]
    fn similar_prefixes_are_not_replaced() {
        let content = "GRUB_BACKGROUND_COLOR=black\n";
        let updated = upsert_key(content, "GRUB_BACKGROUND", "/boot/logo.png");
        assert!(updated.starts_with("GRUB_BACKGROUND_COLOR=black\n"));
        assert!(updated.ends_with("GRUB_BACKGROUND=\"/boot/logo.png\"\n"));
    }

    #[test]
    fn branding_creates_or_updates_defaults_file() {
        let dir = tempdir().unwrap();
        apply_branding(dir.path(), "/boot/logo.png", "AGHOS", false).unwrap();
        let first = fs::read_to_string(dir.path().join(GRUB_DEFAULTS)).unwrap();
        assert_eq!(
            first,
            "GRUB_BACKGROUND=\"/boot/logo.png\"\nGRUB_DISTRIBUTOR=\"AGHOS\"\n"
        );

        apply_branding(dir.path(), "/boot/logo.png", "AGHOS", false).unwrap();
        let second = fs::read_to_string(dir.path().join(GRUB_DEFAULTS)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn background_copy_reports_missing_source() {
        let dir = tempdir().unwrap();
        let err = copy_background(
            &dir.path().join("missing.png"),
            dir.path(),
            "/boot/logo.png",
            false,
        )
        .unwrap_err();
        assert!(err.to_string().contains("missing.png"));
    }
}
