//! Small filesystem helpers shared by the fstab and boot-config writers.

use std::fs::{self, File};
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Replace `path` with `contents` atomically (temp file, fsync, rename).
///
/// When `mode` is given the file is created with those permission bits
/// before it becomes visible under its final name.
pub fn write_atomic(path: &Path, contents: &[u8], mode: Option<u32>) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = temp_path(path);
    let mut file = File::create(&tmp_path)?;
    file.write_all(contents)?;
    if let Some(mode) = mode {
        file.set_permissions(fs::Permissions::from_mode(mode))?;
    }
    file.sync_all()?;

    fs::rename(&tmp_path, path)?;

    if let Some(parent) = path.parent() {
        if let Ok(dir) = File::open(parent) {
            dir.sync_all().ok();
        }
    }

    Ok(())
}

/// `<root>/<absolute>`; the leading `/` of `absolute` is ignored.
pub fn under_root(root: &Path, absolute: &str) -> PathBuf {
    let relative = absolute.trim_start_matches('/');
    if relative.is_empty() {
        root.to_path_buf()
    } else {
        root.join(relative)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("aghos");
    path.with_file_name(format!(".{}.tmp", file_name))
}
