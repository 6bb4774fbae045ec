//! The statically declared pipelines: install, mount-existing and finalize.
//!
//! Every pipeline is a fixed list of stages run by [`StageRunner`] against
//! one [`InstallSession`]. Device mutation only happens after the
//! confirmation stage has armed the session.

use crate::journal::Journal;
use crate::plan::{existing_plan, install_plan, InstallPlan};
use crate::preflight::{self, PreflightConfig};
use crate::session::InstallSession;
use crate::stage_runner::{Artifact, StageDefinition, StageRunner};
use aghos_core::boot_config::BootloaderInstaller;
use aghos_core::config_states::{ExecuteArmToken, ValidatedConfig};
use aghos_core::disk_ops::{FormatMountOrchestrator, MountReport, MountTarget};
use aghos_core::fstab::FstabGenerator;
use aghos_core::partitioning::{Disk, PartitionPlan, PartitionTableWriter};
use aghos_core::ProvisionError;
use aghos_hal::ProbeOps;
use anyhow::{Context, Result};

/// Operator confirmation of the destructive commit.
pub trait Confirm {
    /// Show `summary` and return whether the operator accepted it.
    fn confirm(&self, summary: &[String]) -> Result<bool>;
}

/// Non-interactive acceptance (`--assume-yes`).
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, _summary: &[String]) -> Result<bool> {
        log::warn!("--assume-yes: skipping the interactive confirmation");
        Ok(true)
    }
}

type Stage<'a> = StageDefinition<'a, InstallSession>;

fn preflight_stage(cfg: PreflightConfig) -> Stage<'static> {
    StageDefinition {
        name: "Preflight",
        consumes: &[],
        produces: &[],
        run: Box::new(move |session: &mut InstallSession, dry_run: bool| {
            match preflight::run(session.hal.as_ref(), &cfg) {
                Err(err) if dry_run => {
                    log::warn!("DRY RUN: preflight would fail: {:#}", err);
                    Ok(())
                }
                other => other,
            }
        }),
    }
}

fn confirm_stage<'a>(
    confirm: &'a dyn Confirm,
    consumes: &'a [Artifact],
    summarize: fn(&InstallSession) -> Result<InstallPlan>,
) -> Stage<'a> {
    StageDefinition {
        name: "Confirm",
        consumes,
        produces: &[Artifact::Confirmation],
        run: Box::new(move |session: &mut InstallSession, dry_run: bool| -> Result<()> {
            let lines = summarize(session)?.summary_lines();
            for line in &lines {
                log::info!("{}", line);
            }
            if dry_run {
                log::info!("DRY RUN: no device will be modified");
                return Ok(());
            }
            if !session.yes_i_know {
                return Err(ProvisionError::MissingYesIKnow.into());
            }
            let accepted = confirm.confirm(&lines)?;
            let token = ExecuteArmToken::try_new(session.yes_i_know, accepted)?;
            let armed = ValidatedConfig(session.config.clone()).arm_execute(token)?;
            session.mode = armed.run_mode();
            log::info!("🔓 Confirmed; destructive operations armed");
            Ok(())
        }),
    }
}

fn summarize_install(session: &InstallSession) -> Result<InstallPlan> {
    let plan = session.plan.as_ref().context("no validated partition plan")?;
    Ok(install_plan(&session.config, plan))
}

fn summarize_existing(session: &InstallSession) -> Result<InstallPlan> {
    Ok(existing_plan(&session.config))
}

fn validate_plan(session: &mut InstallSession, _dry_run: bool) -> Result<()> {
    let disk = session.config.require_disk()?.to_path_buf();
    let total = session
        .hal
        .disk_size(&disk)
        .map_err(|source| ProvisionError::DiskProbe {
            disk: disk.clone(),
            source,
        })?;
    let plan = PartitionPlan::from_entries(
        Disk::new(disk, total, session.config.table),
        &session.config.partition_entries(),
    );
    log::info!("📐 {}", plan.usage());
    session.plan = Some(plan.validate()?);
    Ok(())
}

fn write_table(session: &mut InstallSession, _dry_run: bool) -> Result<()> {
    let plan = session.plan.take().context("no validated partition plan")?;
    let map = PartitionTableWriter::new(session.hal.as_ref()).write(
        plan,
        &session.mode,
        &mut session.warnings,
    )?;
    session.device_map = Some(map);
    Ok(())
}

fn log_mounts(report: &MountReport) {
    for m in &report.mounted {
        log::info!("  {} -> {} ({})", m.device.display(), m.target.display(), m.fs);
    }
    for swap in &report.swaps {
        log::info!("  {} -> swap", swap.display());
    }
    for skipped in &report.skipped {
        log::warn!("  {} was not mounted", skipped);
    }
}

fn format_and_mount(session: &mut InstallSession, _dry_run: bool) -> Result<()> {
    let map = session.device_map.as_ref().context("no device map")?;
    let targets = MountTarget::from_device_map(map);
    let report = FormatMountOrchestrator::new(session.hal.as_ref(), session.config.root.clone())
        .with_device_poll(session.config.device_poll())
        .run(&targets, &session.mode, &mut session.warnings)?;
    log_mounts(&report);
    session.mounts = Some(report);
    Ok(())
}

fn mount_existing(session: &mut InstallSession, _dry_run: bool) -> Result<()> {
    if session.config.existing.is_empty() {
        anyhow::bail!("No existing partitions configured");
    }
    let targets =
        MountTarget::from_existing(&session.config.existing, session.config.format_existing);
    let report = FormatMountOrchestrator::new(session.hal.as_ref(), session.config.root.clone())
        .run(&targets, &session.mode, &mut session.warnings)?;
    log_mounts(&report);
    session.mounts = Some(report);
    Ok(())
}

fn inspect_root(session: &mut InstallSession, dry_run: bool) -> Result<()> {
    let root = session.config.root.clone();
    let record = session
        .hal
        .mount_at(&root)
        .map_err(|source| ProvisionError::TopologyProbe {
            root: root.clone(),
            source,
        })?;
    match record {
        Some(record) => log::info!(
            "Root {} is {} ({})",
            root.display(),
            record.source,
            record.fstype
        ),
        None if dry_run => log::warn!("DRY RUN: nothing is mounted at {}", root.display()),
        None => anyhow::bail!(
            "Nothing is mounted at {}; mount the target root first",
            root.display()
        ),
    }
    Ok(())
}

fn generate_fstab(session: &mut InstallSession, dry_run: bool) -> Result<()> {
    let generator = FstabGenerator::new(session.hal.as_ref(), session.config.root.clone());
    let fstab =
        generator.generate(session.config.activate_swap, dry_run, &mut session.warnings)?;
    let path = generator.write(&fstab, dry_run)?;
    log::info!("📝 {} ({} entries)", path.display(), fstab.entries.len());
    session.fstab = Some(fstab);
    Ok(())
}

fn install_bootloader(session: &mut InstallSession, dry_run: bool) -> Result<()> {
    let report = BootloaderInstaller::new(
        session.hal.as_ref(),
        session.config.root.clone(),
        session.config.boot.clone(),
    )
    .install(dry_run, &mut session.warnings);
    log::info!(
        "🥾 Boot mode {}, grub-install {}, grub-mkconfig {}",
        report.mode,
        if report.installed { "ok" } else { "failed" },
        if report.config_generated { "ok" } else { "failed" }
    );
    session.boot = Some(report);
    Ok(())
}

fn output_stages() -> Vec<Stage<'static>> {
    vec![
        StageDefinition {
            name: "Generate fstab",
            consumes: &[Artifact::MountTopology],
            produces: &[Artifact::Fstab],
            run: Box::new(generate_fstab),
        },
        StageDefinition {
            name: "Install bootloader",
            consumes: &[Artifact::MountTopology],
            produces: &[Artifact::Bootloader],
            run: Box::new(install_bootloader),
        },
    ]
}

fn run_stages(session: &mut InstallSession, stages: &[Stage<'_>]) -> Result<()> {
    let dry_run = session.is_dry_run();
    let journal = Journal::new(session.config.journal_path.clone());
    let result = StageRunner::new_with_persist(journal, dry_run, !dry_run).run(session, stages);

    if session.warnings.is_empty() {
        log::info!("No warnings");
    } else {
        log::warn!("{} warnings:", session.warnings.len());
        for warning in session.warnings.iter() {
            log::warn!("  {}", warning);
        }
    }
    result
}

/// Partition, format and mount a fresh disk, then write fstab and install GRUB.
pub fn run_install(session: &mut InstallSession, confirm: &dyn Confirm) -> Result<()> {
    let mut stages = vec![
        preflight_stage(PreflightConfig::for_install(&session.config)),
        StageDefinition {
            name: "Validate plan",
            consumes: &[],
            produces: &[Artifact::ValidatedPlan],
            run: Box::new(validate_plan),
        },
        confirm_stage(confirm, &[Artifact::ValidatedPlan], summarize_install),
        StageDefinition {
            name: "Write partition table",
            consumes: &[Artifact::ValidatedPlan, Artifact::Confirmation],
            produces: &[Artifact::DeviceMap],
            run: Box::new(write_table),
        },
        StageDefinition {
            name: "Format and mount",
            consumes: &[Artifact::DeviceMap],
            produces: &[Artifact::MountTopology],
            run: Box::new(format_and_mount),
        },
    ];
    stages.extend(output_stages());
    run_stages(session, &stages)
}

/// Mount partitions the operator picked, then write fstab and install GRUB.
pub fn run_mount_existing(session: &mut InstallSession, confirm: &dyn Confirm) -> Result<()> {
    let mut stages = vec![
        preflight_stage(PreflightConfig::for_existing(&session.config)),
        confirm_stage(confirm, &[], summarize_existing),
        StageDefinition {
            name: "Mount existing partitions",
            consumes: &[Artifact::Confirmation],
            produces: &[Artifact::MountTopology],
            run: Box::new(mount_existing),
        },
    ];
    stages.extend(output_stages());
    run_stages(session, &stages)
}

/// fstab and bootloader only, against a root that is already mounted.
pub fn run_finalize(session: &mut InstallSession) -> Result<()> {
    let mut stages = vec![
        preflight_stage(PreflightConfig::for_finalize()),
        StageDefinition {
            name: "Inspect mounts",
            consumes: &[],
            produces: &[Artifact::MountTopology],
            run: Box::new(inspect_root),
        },
    ];
    stages.extend(output_stages());
    run_stages(session, &stages)
}
