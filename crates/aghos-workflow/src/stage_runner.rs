//! Ordered stage execution with declared inputs and outputs.
//!
//! Stages form a static list. Each one names the artifacts it needs and the
//! artifacts it leaves behind; the runner refuses to start a stage whose
//! inputs no earlier stage produced, and persists progress around every stage.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Durable outputs handed from one stage to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Artifact {
    ValidatedPlan,
    Confirmation,
    DeviceMap,
    MountTopology,
    Fstab,
    Bootloader,
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Artifact::ValidatedPlan => "validated plan",
            Artifact::Confirmation => "confirmation",
            Artifact::DeviceMap => "device map",
            Artifact::MountTopology => "mount topology",
            Artifact::Fstab => "fstab",
            Artifact::Bootloader => "bootloader",
        };
        f.write_str(name)
    }
}

pub type StageFn<'a, S> = Box<dyn Fn(&mut S, bool) -> Result<()> + 'a>;

pub struct StageDefinition<'a, S> {
    pub name: &'a str,
    pub consumes: &'a [Artifact],
    pub produces: &'a [Artifact],
    pub run: StageFn<'a, S>,
}

pub trait WorkflowState {
    fn is_completed(&self, stage: &str) -> bool;
    fn set_current(&mut self, stage: &str);
    fn mark_completed(&mut self, stage: &str);
    fn has_artifact(&self, artifact: Artifact) -> bool;
    fn record_artifact(&mut self, artifact: Artifact);

    /// Called once with the error that stopped the run.
    fn record_failure(&mut self, _stage: &str, _error: &str) {}
}

pub trait StateStore<S> {
    fn save(&self, state: &S) -> Result<()>;
}

pub struct StageRunner<Store> {
    store: Store,
    dry_run: bool,
    persist: bool,
}

impl<Store> StageRunner<Store> {
    pub fn new(store: Store, dry_run: bool) -> Self {
        Self {
            store,
            dry_run,
            persist: true,
        }
    }

    pub fn new_with_persist(store: Store, dry_run: bool, persist: bool) -> Self {
        Self {
            store,
            dry_run,
            persist,
        }
    }

    pub fn run<S>(&self, state: &mut S, stages: &[StageDefinition<'_, S>]) -> Result<()>
    where
        S: WorkflowState,
        Store: StateStore<S>,
    {
        for stage in stages {
            if state.is_completed(stage.name) {
                continue;
            }
            if let Some(missing) = stage.consumes.iter().find(|a| !state.has_artifact(**a)) {
                let msg = format!(
                    "Stage '{}' needs the {} but no earlier stage produced it",
                    stage.name, missing
                );
                state.record_failure(stage.name, &msg);
                self.save(state)?;
                anyhow::bail!(msg);
            }

            log::info!("▶️ {}", stage.name);
            state.set_current(stage.name);
            self.save(state)?;

            if let Err(err) = (stage.run)(state, self.dry_run) {
                state.record_failure(stage.name, &format!("{:#}", err));
                self.save(state)?;
                return Err(err);
            }

            for artifact in stage.produces {
                state.record_artifact(*artifact);
            }
            state.mark_completed(stage.name);
            self.save(state)?;
        }

        Ok(())
    }

    fn save<S>(&self, state: &S) -> Result<()>
    where
        Store: StateStore<S>,
    {
        if self.persist {
            self.store.save(state)?;
        }
        Ok(())
    }
}
