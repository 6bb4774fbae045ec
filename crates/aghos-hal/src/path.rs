/// Partition path helper for block devices. Handles nvme/mmcblk/loop postfixing.
pub fn partition_path(disk: &str, num: u32) -> String {
    if needs_partition_infix(disk) {
        format!("{}p{}", disk, num)
    } else {
        format!("{}{}", disk, num)
    }
}

/// Inverse of [`partition_path`]: strips the trailing partition number (and the
/// `p` infix when it follows a digit) from a partition device node.
///
/// Returns `None` for sources that are not `/dev/` nodes.
pub fn whole_disk_path(partition: &str) -> Option<String> {
    if !partition.starts_with("/dev/") {
        return None;
    }
    let without_num = partition.trim_end_matches(|c: char| c.is_ascii_digit());
    if without_num.len() == partition.len() {
        return Some(partition.to_string());
    }
    let disk = match without_num.strip_suffix('p') {
        Some(stem) if stem.ends_with(|c: char| c.is_ascii_digit()) => stem,
        _ => without_num,
    };
    Some(disk.to_string())
}

fn needs_partition_infix(disk: &str) -> bool {
    disk.contains("nvme")
        || disk.contains("mmcblk")
        || disk.contains("loop")
        || disk.ends_with(|c: char| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_path_plain_disk() {
        assert_eq!(partition_path("/dev/sda", 3), "/dev/sda3");
        assert_eq!(partition_path("/dev/vdb", 1), "/dev/vdb1");
    }

    #[test]
    fn partition_path_uses_infix_for_nvme_and_mmc() {
        assert_eq!(partition_path("/dev/nvme0n1", 2), "/dev/nvme0n1p2");
        assert_eq!(partition_path("/dev/mmcblk0", 1), "/dev/mmcblk0p1");
        assert_eq!(partition_path("/dev/loop7", 1), "/dev/loop7p1");
    }

    #[test]
    fn whole_disk_strips_partition_suffix() {
        assert_eq!(whole_disk_path("/dev/sda2").as_deref(), Some("/dev/sda"));
        assert_eq!(
            whole_disk_path("/dev/nvme0n1p3").as_deref(),
            Some("/dev/nvme0n1")
        );
        assert_eq!(
            whole_disk_path("/dev/mmcblk0p12").as_deref(),
            Some("/dev/mmcblk0")
        );
    }

    #[test]
    fn whole_disk_keeps_letter_p_disks() {
        // sdp is a real disk name; only a `p` following a digit is an infix.
        assert_eq!(whole_disk_path("/dev/sdp1").as_deref(), Some("/dev/sdp"));
    }

    #[test]
    fn whole_disk_rejects_non_device_sources() {
        assert_eq!(whole_disk_path("overlay"), None);
        assert_eq!(whole_disk_path("tmpfs"), None);
    }
}
