use aghos_core::boot_config::{BootSettings, BootloaderInstaller};
use aghos_core::Warnings;
use aghos_hal::{FakeHal, MountRecord};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use tempfile::tempdir;

fn settings(host_logo: &std::path::Path) -> BootSettings {
    BootSettings {
        background_source: host_logo.to_path_buf(),
        ..BootSettings::default()
    }
}

#[test]
fn windows_boot_manager_on_esp_yields_executable_fragment() {
    let host = tempdir().unwrap();
    let logo = host.path().join("logo.png");
    fs::write(&logo, b"PNG").unwrap();

    let root = tempdir().unwrap();
    let esp = root.path().join("efi");
    fs::create_dir_all(esp.join("EFI/Microsoft/Boot")).unwrap();
    fs::write(esp.join("EFI/Microsoft/Boot/bootmgfw.efi"), b"MZ").unwrap();

    let hal = FakeHal::new()
        .with_mount(MountRecord::new("/dev/sda2", root.path(), "ext4", "rw"))
        .with_mount(MountRecord::new("/dev/sda1", &esp, "vfat", "rw"));

    let report = BootloaderInstaller::new(&hal, root.path(), settings(&logo))
        .install(false, &mut Warnings::new());

    assert!(report.windows.uefi_present);
    let fragment = report.fragment.expect("fragment written");
    let mode = fs::metadata(&fragment).unwrap().permissions().mode();
    assert_eq!(mode & 0o111, 0o111);
    let text = fs::read_to_string(&fragment).unwrap();
    assert!(text.contains("chainloader /EFI/Microsoft/Boot/bootmgfw.efi"));
    assert!(!text.contains("Windows (BIOS/MBR)"));
}

#[test]
fn no_windows_anywhere_means_no_fragment_file() {
    let host = tempdir().unwrap();
    let logo = host.path().join("logo.png");
    fs::write(&logo, b"PNG").unwrap();

    let root = tempdir().unwrap();
    let hal = FakeHal::new()
        .with_mount(MountRecord::new("/dev/sda2", root.path(), "ext4", "rw"))
        .with_mount(MountRecord::new("/dev/sda1", root.path().join("boot"), "vfat", "rw"));

    let report = BootloaderInstaller::new(&hal, root.path(), settings(&logo))
        .install(false, &mut Warnings::new());

    assert!(!report.windows.any());
    assert!(report.fragment.is_none());
    assert!(!root.path().join("etc/grub.d/41_windows").exists());
    assert!(hal
        .descriptions()
        .contains(&"blkid -t TYPE=ntfs -o device".to_string()));
}
