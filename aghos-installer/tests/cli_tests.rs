use aghos_core::config::InstallConfig;
use aghos_hal::{DiskInfo, FakeHal, MountRecord};
use aghos_installer::cli::Cli;
use aghos_installer::errors::CliError;
use aghos_installer::{dispatch, parse_map, render_plan};
use aghos_workflow::journal::{Journal, ProgressRecord};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::tempdir;

fn cli(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("aghos").chain(args.iter().copied())).unwrap()
}

fn write_config(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("aghos.toml");
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn parse_map_accepts_device_mountpoint_fs() {
    let entry = parse_map("/dev/sda2:/:ext4").unwrap();
    assert_eq!(entry.device, PathBuf::from("/dev/sda2"));
    assert_eq!(entry.mountpoint, "/");
    assert_eq!(entry.fs, "ext4");

    let swap = parse_map(" /dev/sda3 : swap : swap ").unwrap();
    assert_eq!(swap.mountpoint, "swap");
}

#[test]
fn parse_map_rejects_malformed_specs() {
    for spec in ["/dev/sda2:/", "sda2:/:ext4", "/dev/sda2:home:ext4", "/dev/sda2:/:", "a:b:c:d"] {
        assert!(
            matches!(parse_map(spec), Err(CliError::InvalidMap(_))),
            "{spec} should be rejected"
        );
    }
}

#[test]
fn disks_lists_through_the_hal() {
    let hal = FakeHal::new().with_disk(DiskInfo::new("/dev/vda", 32 << 30, "Virtio"));
    dispatch(cli(&["disks", "--json"]), Arc::new(hal.clone())).unwrap();
    assert_eq!(hal.descriptions(), vec!["lsblk -nd -b -o NAME,SIZE,MODEL"]);
}

#[test]
fn plan_rejects_an_over_provisioned_disk() {
    let hal = FakeHal::new().with_disk(DiskInfo::new("/dev/vda", 16 << 30, "Virtio"));
    let err = dispatch(cli(&["plan", "--disk", "/dev/vda"]), Arc::new(hal.clone())).unwrap_err();
    assert!(err.to_string().contains("holds only"));
    assert!(!hal.has_operation(|op| op.is_mutation()));
}

#[test]
fn oversized_plan_is_printed_with_its_deficit() {
    let hal = FakeHal::new().with_disk(DiskInfo::new("/dev/vda", 16 << 30, "Virtio"));
    let cfg = InstallConfig {
        disk: Some(PathBuf::from("/dev/vda")),
        ..InstallConfig::default()
    };
    let mut out = Vec::new();

    let err = render_plan(&hal, &cfg, &mut out).unwrap_err();

    assert!(err.to_string().contains("holds only"));
    let printed = String::from_utf8(out).unwrap();
    assert!(printed.starts_with("Target: /dev/vda (16.0 GiB, GPT)"), "{printed}");
    assert!(printed.contains("/home"));
    assert!(printed.contains("Free space: -"), "{printed}");
    assert!(printed.contains("over-provisioned"));
}

#[test]
fn fitting_plan_lists_stages_and_free_space() {
    let hal = FakeHal::new().with_disk(DiskInfo::new("/dev/vda", 128 << 30, "Virtio"));
    let cfg = InstallConfig {
        disk: Some(PathBuf::from("/dev/vda")),
        ..InstallConfig::default()
    };
    let mut out = Vec::new();

    render_plan(&hal, &cfg, &mut out).unwrap();

    let printed = String::from_utf8(out).unwrap();
    assert!(printed.contains("Execution plan:"));
    assert!(printed.trim_end().lines().last().unwrap().starts_with("Free space: 5"));
    assert!(!printed.contains("over-provisioned"));
}

#[test]
fn dry_run_install_from_config_file_mutates_nothing() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("target");
    std::fs::create_dir_all(&root).unwrap();
    let journal = dir.path().join("state.json");
    let config = write_config(
        dir.path(),
        &format!(
            "disk = \"/dev/vda\"\nroot = \"{}\"\njournal_path = \"{}\"\n",
            root.display(),
            journal.display()
        ),
    );
    let hal = FakeHal::new().with_disk(DiskInfo::new("/dev/vda", 128 << 30, "Virtio"));

    dispatch(
        cli(&["install", "--config", config.to_str().unwrap(), "--dry-run"]),
        Arc::new(hal.clone()),
    )
    .unwrap();

    assert!(!hal.has_operation(|op| op.is_mutation()), "{:?}", hal.descriptions());
    assert!(!journal.exists());
}

#[test]
fn install_without_disk_fails_before_touching_anything() {
    let hal = FakeHal::new();
    let err = dispatch(cli(&["install", "--dry-run"]), Arc::new(hal.clone())).unwrap_err();
    assert!(err.to_string().contains("--disk"));
    assert_eq!(hal.operation_count(), 0);
}

#[test]
fn mount_existing_rejects_a_doubly_mapped_root() {
    let hal = FakeHal::new();
    let err = dispatch(
        cli(&[
            "mount-existing",
            "--map",
            "/dev/sda2:/:ext4",
            "--map",
            "/dev/sda3:/:ext4",
            "--dry-run",
        ]),
        Arc::new(hal.clone()),
    )
    .unwrap_err();
    assert!(err.to_string().contains("mapped more than once"), "{err}");
    assert_eq!(hal.operation_count(), 0);
}

#[test]
fn teardown_unmounts_under_root() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("mnt");
    let hal = FakeHal::new()
        .with_mount(MountRecord::new("/dev/sda2", &root, "btrfs", "rw"))
        .with_mount(MountRecord::new("/dev/sda1", root.join("boot"), "vfat", "rw"))
        .with_meminfo("Dirty: 0 kB\nWriteback: 0 kB\n");

    dispatch(
        cli(&["teardown", "--root", root.to_str().unwrap()]),
        Arc::new(hal.clone()),
    )
    .unwrap();
    assert!(hal.mounts().is_empty());
}

#[test]
fn status_reads_the_journal() {
    let dir = tempdir().unwrap();
    let journal_path = dir.path().join("state.json");
    let config = write_config(
        dir.path(),
        &format!("journal_path = \"{}\"\n", journal_path.display()),
    );
    let args = ["status", "--config", config.to_str().unwrap()];

    let err = dispatch(cli(&args), Arc::new(FakeHal::new())).unwrap_err();
    assert!(err.to_string().contains("No progress journal"));

    let mut record = ProgressRecord::new("install", false);
    record.mark_completed("Preflight");
    Journal::new(&journal_path).write(&record).unwrap();
    dispatch(cli(&args), Arc::new(FakeHal::new())).unwrap();
}
