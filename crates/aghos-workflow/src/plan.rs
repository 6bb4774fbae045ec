//! Human-readable summaries shown before anything destructive runs.

use aghos_core::config::{ExistingMount, InstallConfig};
use aghos_core::disk_ops::select_filesystem;
use aghos_core::partitioning::{Disk, PartitionPlan, PartitionSpec, ValidatedPlan, GIB};
use std::fmt;

#[derive(Debug, Clone)]
pub struct StagePlan {
    pub name: &'static str,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct InstallPlan {
    pub target: String,
    pub partitions: Vec<String>,
    pub stages: Vec<StagePlan>,
}

impl InstallPlan {
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        lines.push(format!("Target: {}", self.target));
        lines.extend(self.partitions.iter().cloned());
        lines.push("Execution plan:".to_string());
        for (idx, stage) in self.stages.iter().enumerate() {
            lines.push(format!(
                "{:02}. {} - {}",
                idx + 1,
                stage.name,
                stage.description
            ));
        }
        lines
    }
}

impl fmt::Display for InstallPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.summary_lines() {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

fn gib(bytes: u64) -> String {
    format!("{:.1} GiB", bytes as f64 / GIB as f64)
}

fn spec_line(idx: usize, spec: &PartitionSpec) -> String {
    let mountpoint = if spec.mountpoint.is_empty() {
        "-"
    } else {
        spec.mountpoint.as_str()
    };
    let mut line = format!(
        "  #{} {:<10} {:>10} {} ({})",
        idx + 1,
        mountpoint,
        gib(spec.size_bytes),
        spec.fs_label,
        spec.size_literal
    );
    if let Some(name) = &spec.name {
        line.push_str(&format!(" name={}", name));
    }
    if spec.flags.esp {
        line.push_str(" [esp]");
    }
    line
}

fn target_line(disk: &Disk) -> String {
    format!(
        "{} ({}, {})",
        disk.path.display(),
        gib(disk.total_bytes),
        disk.table
    )
}

/// Layout and free space of a plan that may not validate, deficit included.
pub fn draft_lines(plan: &PartitionPlan) -> Vec<String> {
    let mut lines = vec![format!("Target: {}", target_line(plan.disk()))];
    lines.extend(
        plan.specs()
            .iter()
            .enumerate()
            .map(|(idx, spec)| spec_line(idx, spec)),
    );
    lines.push(plan.usage().to_string());
    lines
}

fn output_stages(cfg: &InstallConfig) -> Vec<StagePlan> {
    vec![
        StagePlan {
            name: "Generate fstab",
            description: format!(
                "{}/etc/fstab by UUID/PARTUUID{}",
                cfg.root.display(),
                if cfg.activate_swap {
                    ", activate swap"
                } else {
                    ""
                }
            ),
        },
        StagePlan {
            name: "Install bootloader",
            description: format!(
                "grub-install ({}) + grub-mkconfig -o {}",
                cfg.boot.bootloader_id, cfg.boot.grub_cfg
            ),
        },
    ]
}

/// Plan for a fresh install onto `plan`'s disk.
pub fn install_plan(cfg: &InstallConfig, plan: &ValidatedPlan) -> InstallPlan {
    let disk = plan.disk();
    let partitions = plan
        .specs()
        .iter()
        .enumerate()
        .map(|(idx, spec)| spec_line(idx, spec))
        .collect();

    let mut stages = vec![
        StagePlan {
            name: "Write partition table",
            description: format!(
                "ERASE {} and create {} {} partitions",
                disk.path.display(),
                plan.specs().len(),
                disk.table
            ),
        },
        StagePlan {
            name: "Format and mount",
            description: format!("format all partitions, mount under {}", cfg.root.display()),
        },
    ];
    stages.extend(output_stages(cfg));

    InstallPlan {
        target: target_line(disk),
        partitions,
        stages,
    }
}

fn existing_line(entry: &ExistingMount, format: bool) -> String {
    let fs = select_filesystem(&entry.fs);
    format!(
        "  {} -> {} {}{}",
        entry.device.display(),
        entry.mountpoint,
        fs,
        if format { " (format)" } else { "" }
    )
}

/// Plan for mounting partitions that already exist.
pub fn existing_plan(cfg: &InstallConfig) -> InstallPlan {
    let mut stages = vec![StagePlan {
        name: "Mount existing partitions",
        description: if cfg.format_existing {
            format!(
                "FORMAT {} partitions, mount under {}",
                cfg.existing.len(),
                cfg.root.display()
            )
        } else {
            format!("mount under {} without formatting", cfg.root.display())
        },
    }];
    stages.extend(output_stages(cfg));

    InstallPlan {
        target: format!("{} existing partitions", cfg.existing.len()),
        partitions: cfg
            .existing
            .iter()
            .map(|e| existing_line(e, cfg.format_existing))
            .collect(),
        stages,
    }
}
