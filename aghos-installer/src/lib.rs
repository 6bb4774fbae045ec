//! The `aghos` command line front end.

pub mod cli;
pub mod errors;
pub mod logging;
pub mod ui;

use crate::cli::{ArmArgs, Cli, Command, TableArg};
use crate::errors::CliError;
use aghos_core::config::{ExistingMount, InstallConfig};
use aghos_core::config_states::UnvalidatedConfig;
use aghos_core::disk_ops::{teardown, TeardownOptions};
use aghos_core::partitioning::{Disk, PartitionPlan, TableKind};
use aghos_core::ProvisionError;
use aghos_hal::{InstallerHal, LinuxHal};
use aghos_workflow::journal::Journal;
use aghos_workflow::plan::{draft_lines, install_plan};
use aghos_workflow::{run_finalize, run_install, run_mount_existing, AssumeYes, Confirm};
use aghos_workflow::InstallSession;
use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init_with(cli.log_file.clone());
    let hal: Arc<dyn InstallerHal> = Arc::new(LinuxHal::new());
    dispatch(cli, hal)
}

/// Run one parsed command against `hal`.
pub fn dispatch(cli: Cli, hal: Arc<dyn InstallerHal>) -> Result<()> {
    let mut cfg = match &cli.config {
        Some(path) => InstallConfig::load(path)?,
        None => InstallConfig::default(),
    };
    cfg.dry_run |= cli.dry_run;
    if let Some(root) = &cli.root {
        cfg.root = root.clone();
    }

    match cli.command {
        Command::Disks { json } => list_disks(hal.as_ref(), json),
        Command::Plan { disk, table } => {
            apply_target(&mut cfg, disk, table);
            render_plan(hal.as_ref(), &cfg, &mut io::stdout().lock())
        }
        Command::Install { disk, table, arm } => {
            apply_target(&mut cfg, disk, table);
            log::info!("💾 Installing onto {}", cfg.require_disk()?.display());
            let mut session = new_session(cfg, hal, "install", &arm)?;
            run_install(&mut session, confirmer(&arm).as_ref())
        }
        Command::MountExisting {
            maps,
            no_format,
            arm,
        } => {
            if !maps.is_empty() {
                cfg.existing = maps
                    .iter()
                    .map(|m| parse_map(m))
                    .collect::<Result<_, _>>()?;
            }
            if no_format {
                cfg.format_existing = false;
            }
            log::info!("📂 Mounting {} existing partitions", cfg.existing.len());
            let mut session = new_session(cfg, hal, "mount-existing", &arm)?;
            run_mount_existing(&mut session, confirmer(&arm).as_ref())
        }
        Command::Finalize => {
            log::info!("🥾 Finalizing {}", cfg.root.display());
            let mut session = new_session(cfg, hal, "finalize", &ArmArgs::default())?;
            run_finalize(&mut session)
        }
        Command::Teardown => run_teardown(hal.as_ref(), &cfg),
        Command::Status => show_status(&cfg),
    }
}

fn apply_target(cfg: &mut InstallConfig, disk: Option<PathBuf>, table: Option<TableArg>) {
    if disk.is_some() {
        cfg.disk = disk;
    }
    if let Some(table) = table {
        cfg.table = TableKind::from(table);
    }
}

fn new_session(
    cfg: InstallConfig,
    hal: Arc<dyn InstallerHal>,
    pipeline: &str,
    arm: &ArmArgs,
) -> Result<InstallSession> {
    let validated = UnvalidatedConfig::new(cfg).validate()?;
    Ok(InstallSession::new(validated, hal, pipeline).with_yes_i_know(arm.yes_i_know))
}

fn confirmer(arm: &ArmArgs) -> Box<dyn Confirm> {
    if arm.assume_yes {
        Box::new(AssumeYes)
    } else {
        Box::new(ui::confirm::TypedConfirm::interactive())
    }
}

/// `DEVICE:MOUNTPOINT:FS`, e.g. `/dev/sda2:/:ext4` or `/dev/sda3:swap:swap`.
pub fn parse_map(spec: &str) -> Result<ExistingMount, CliError> {
    let invalid = || CliError::InvalidMap(spec.to_string());
    let parts: Vec<&str> = spec.split(':').map(str::trim).collect();
    let [device, mountpoint, fs] = parts.as_slice() else {
        return Err(invalid());
    };
    if !device.starts_with("/dev/") || fs.is_empty() {
        return Err(invalid());
    }
    if !mountpoint.starts_with('/') && *mountpoint != "swap" {
        return Err(invalid());
    }
    Ok(ExistingMount {
        device: PathBuf::from(device),
        mountpoint: mountpoint.to_string(),
        fs: fs.to_string(),
    })
}

#[derive(Serialize)]
struct DiskRow {
    path: String,
    size_bytes: u64,
    size_gib: f64,
    model: String,
}

fn list_disks(hal: &dyn InstallerHal, json: bool) -> Result<()> {
    let rows: Vec<DiskRow> = hal
        .list_disks()?
        .into_iter()
        .map(|d| DiskRow {
            path: d.path.display().to_string(),
            size_bytes: d.size_bytes,
            size_gib: d.size_gib(),
            model: d.model,
        })
        .collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if rows.is_empty() {
        println!("No disks found");
    }
    for row in rows {
        println!("{:<16} {:>9.1} GiB  {}", row.path, row.size_gib, row.model);
    }
    Ok(())
}

/// Print the plan for the configured disk. A plan that does not fit is
/// still printed with its deficit before the validation error is returned.
pub fn render_plan(
    hal: &dyn InstallerHal,
    cfg: &InstallConfig,
    out: &mut dyn Write,
) -> Result<()> {
    let disk = cfg.require_disk()?.to_path_buf();
    let total = hal
        .disk_size(&disk)
        .map_err(|source| ProvisionError::DiskProbe {
            disk: disk.clone(),
            source,
        })?;
    let plan = PartitionPlan::from_entries(
        Disk::new(disk, total, cfg.table),
        &cfg.partition_entries(),
    );
    match plan.clone().validate() {
        Ok(validated) => {
            write!(out, "{}", install_plan(cfg, &validated))?;
            writeln!(out, "{}", plan.usage())?;
            Ok(())
        }
        Err(err) => {
            for line in draft_lines(&plan) {
                writeln!(out, "{}", line)?;
            }
            Err(err.into())
        }
    }
}

fn run_teardown(hal: &dyn InstallerHal, cfg: &InstallConfig) -> Result<()> {
    let opts = TeardownOptions {
        dry_run: cfg.dry_run,
        ..TeardownOptions::default()
    };
    let report = teardown(hal, &cfg.root, &opts);
    for target in &report.unmounted {
        println!("unmounted {}", target.display());
    }
    if report.is_clean() {
        log::info!("✅ {} is clean", cfg.root.display());
        return Ok(());
    }
    Err(CliError::TeardownIncomplete {
        root: cfg.root.clone(),
        count: report.failures.len(),
        details: report.failures.join("; "),
    }
    .into())
}

fn show_status(cfg: &InstallConfig) -> Result<()> {
    let journal = Journal::new(cfg.journal_path.clone());
    let record = journal
        .read()?
        .ok_or_else(|| CliError::NoJournal(cfg.journal_path.clone()))?;
    println!(
        "Pipeline: {}{}",
        record.pipeline,
        if record.dry_run { " (dry run)" } else { "" }
    );
    for stage in &record.completed {
        println!("  ✅ {}", stage);
    }
    if let Some(current) = &record.current {
        println!("  ▶️ {}", current);
    }
    if let Some(failed) = &record.failed {
        println!("  ❌ {}: {}", failed.stage, failed.error);
    }
    for warning in &record.warnings {
        println!("  ⚠️ {}", warning);
    }
    Ok(())
}
