//! TypeState helpers for install configs (validation -> arming -> executing).
//!
//! Destructive operations take a [`RunMode`]. The only way to build the
//! executing variant is through an [`ExecuteArmToken`], and the only way to
//! mint one is to pass the confirmation gate.

use crate::errors::ProvisionError;
use aghos_hal::{FormatOptions, PartedOptions};
use anyhow::Result;

pub const EXECUTE_CONFIRMATION: &str = "I UNDERSTAND THIS WILL ERASE THE SELECTED DISK";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecuteArmToken(());

impl ExecuteArmToken {
    pub fn try_new(yes_i_know: bool, confirmed: bool) -> Result<Self, ProvisionError> {
        if !yes_i_know {
            return Err(ProvisionError::MissingYesIKnow);
        }
        if !confirmed {
            return Err(ProvisionError::Aborted);
        }
        Ok(Self(()))
    }
}

/// How destructive steps are carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Log every command, mutate nothing.
    DryRun,
    Execute(ExecuteArmToken),
}

impl RunMode {
    pub fn is_dry_run(&self) -> bool {
        matches!(self, RunMode::DryRun)
    }

    pub fn parted_options(&self) -> PartedOptions {
        PartedOptions::new(self.is_dry_run(), !self.is_dry_run())
    }

    pub fn format_options(&self) -> FormatOptions {
        FormatOptions::new(self.is_dry_run(), !self.is_dry_run())
    }
}

pub trait ValidateConfig {
    fn validate_cfg(&self) -> Result<()>;
}

pub trait HasRunMode {
    fn is_dry_run(&self) -> bool;
}

#[derive(Debug, Clone)]
pub struct UnvalidatedConfig<T>(pub T);

#[derive(Debug, Clone)]
pub struct ValidatedConfig<T>(pub T);

#[derive(Debug, Clone)]
pub struct ArmedConfig<T> {
    pub cfg: T,
    pub token: ExecuteArmToken,
}

impl<T> UnvalidatedConfig<T> {
    pub fn new(cfg: T) -> Self {
        Self(cfg)
    }
}

impl<T: ValidateConfig> UnvalidatedConfig<T> {
    pub fn validate(self) -> Result<ValidatedConfig<T>> {
        self.0.validate_cfg()?;
        Ok(ValidatedConfig(self.0))
    }
}

impl<T> ValidatedConfig<T> {
    pub fn inner(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: HasRunMode> ValidatedConfig<T> {
    pub fn require_dry_run(&self) -> Result<()> {
        if !self.0.is_dry_run() {
            anyhow::bail!("expected dry-run config");
        }
        Ok(())
    }

    pub fn arm_execute(self, token: ExecuteArmToken) -> Result<ArmedConfig<T>> {
        if self.0.is_dry_run() {
            anyhow::bail!("cannot arm an execute token for a dry-run config");
        }
        Ok(ArmedConfig { cfg: self.0, token })
    }
}

impl<T> ArmedConfig<T> {
    pub fn run_mode(&self) -> RunMode {
        RunMode::Execute(self.token)
    }
}
