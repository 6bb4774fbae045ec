use aghos_hal::Filesystem;

const SWAP_LABELS: &[&str] = &["swap", "linux-swap", "swapspace"];

/// True for every label that means "this partition is swap".
pub fn is_swap_label(label: &str) -> bool {
    let label = label.trim();
    SWAP_LABELS.iter().any(|s| label.eq_ignore_ascii_case(s))
}

/// Formatter for a filesystem label. Unknown labels fall back to ext4.
pub fn select_filesystem(label: &str) -> Filesystem {
    if is_swap_label(label) {
        return Filesystem::Swap;
    }
    match label.trim().to_ascii_lowercase().as_str() {
        "btrfs" => Filesystem::Btrfs,
        "vfat" => Filesystem::Vfat,
        "ext2" => Filesystem::Ext2,
        "ext3" => Filesystem::Ext3,
        "ext4" => Filesystem::Ext4,
        "xfs" => Filesystem::Xfs,
        "f2fs" => Filesystem::F2fs,
        other => {
            log::debug!("Unknown filesystem label {:?}, using ext4", other);
            Filesystem::Ext4
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn selection_is_case_insensitive() {
        assert_eq!(select_filesystem("BTRFS"), Filesystem::Btrfs);
        assert_eq!(select_filesystem("Vfat"), Filesystem::Vfat);
        assert_eq!(select_filesystem("linux-swap"), Filesystem::Swap);
        assert_eq!(select_filesystem("SwapSpace"), Filesystem::Swap);
        assert_eq!(select_filesystem("ext3"), Filesystem::Ext3);
        assert_eq!(select_filesystem("f2fs"), Filesystem::F2fs);
    }

    #[test]
    fn unknown_labels_fall_back_to_ext4() {
        for label in ["ntfs", "zfs", "", "ext5"] {
            assert_eq!(select_filesystem(label), Filesystem::Ext4);
        }
        let args = select_filesystem("reiserfs").mkfs_args(Path::new("/dev/sda4"));
        assert_eq!(args, vec!["-F", "/dev/sda4"]);
    }

    #[test]
    fn vfat_is_fat32_and_xfs_is_forced() {
        assert_eq!(
            Filesystem::Vfat.mkfs_args(Path::new("/dev/sda1")),
            vec!["-F", "32", "/dev/sda1"]
        );
        assert_eq!(
            select_filesystem("xfs").mkfs_args(Path::new("/dev/sda2")),
            vec!["-f", "/dev/sda2"]
        );
    }
}
