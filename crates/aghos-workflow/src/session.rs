//! The context value threaded through every pipeline stage.

use crate::journal::{Journal, ProgressRecord, StageFailure};
use crate::stage_runner::{Artifact, StateStore, WorkflowState};
use aghos_core::boot_config::BootReport;
use aghos_core::config::InstallConfig;
use aghos_core::config_states::{RunMode, ValidatedConfig};
use aghos_core::disk_ops::MountReport;
use aghos_core::fstab::Fstab;
use aghos_core::partitioning::{DeviceMap, ValidatedPlan};
use aghos_core::Warnings;
use aghos_hal::InstallerHal;
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

/// Everything one run knows. Each stage reads what earlier stages left here
/// and adds its own output; nothing lives in globals.
pub struct InstallSession {
    pub config: InstallConfig,
    pub hal: Arc<dyn InstallerHal>,
    /// Starts as dry-run; only the confirmation stage can arm it.
    pub mode: RunMode,
    /// Operator passed `--yes-i-know`.
    pub yes_i_know: bool,
    pub plan: Option<ValidatedPlan>,
    pub device_map: Option<DeviceMap>,
    pub mounts: Option<MountReport>,
    pub fstab: Option<Fstab>,
    pub boot: Option<BootReport>,
    pub warnings: Warnings,
    pub progress: ProgressRecord,
}

impl InstallSession {
    pub fn new(
        config: ValidatedConfig<InstallConfig>,
        hal: Arc<dyn InstallerHal>,
        pipeline: &str,
    ) -> Self {
        let config = config.into_inner();
        let progress = ProgressRecord::new(pipeline, config.dry_run);
        Self {
            config,
            hal,
            mode: RunMode::DryRun,
            yes_i_know: false,
            plan: None,
            device_map: None,
            mounts: None,
            fstab: None,
            boot: None,
            warnings: Warnings::new(),
            progress,
        }
    }

    pub fn with_yes_i_know(mut self, yes_i_know: bool) -> Self {
        self.yes_i_know = yes_i_know;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.config.dry_run
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// Journal snapshot including the warnings gathered so far.
    pub fn snapshot(&self) -> ProgressRecord {
        let mut record = self.progress.clone();
        record.warnings = self.warnings.as_slice().to_vec();
        record
    }
}

impl WorkflowState for InstallSession {
    fn is_completed(&self, stage: &str) -> bool {
        self.progress.is_completed(stage)
    }

    fn set_current(&mut self, stage: &str) {
        self.progress.current = Some(stage.to_string());
    }

    fn mark_completed(&mut self, stage: &str) {
        self.progress.mark_completed(stage);
    }

    fn has_artifact(&self, artifact: Artifact) -> bool {
        self.progress.artifacts.contains(&artifact)
    }

    fn record_artifact(&mut self, artifact: Artifact) {
        self.progress.record_artifact(artifact);
    }

    fn record_failure(&mut self, stage: &str, error: &str) {
        self.progress.failed = Some(StageFailure {
            stage: stage.to_string(),
            error: error.to_string(),
        });
    }
}

impl StateStore<InstallSession> for Journal {
    fn save(&self, state: &InstallSession) -> Result<()> {
        self.write(&state.snapshot())
    }
}
