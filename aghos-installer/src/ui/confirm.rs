//! Confirmation gate for destructive operations.

use aghos_core::config_states::EXECUTE_CONFIRMATION;
use aghos_workflow::Confirm;
use anyhow::{Context, Result};
use dialoguer::Input;

/// Only the exact phrase counts; surrounding whitespace is ignored.
pub fn confirmation_matches(typed: &str) -> bool {
    typed.trim() == EXECUTE_CONFIRMATION
}

fn read_from_terminal(prompt: &str) -> Result<String> {
    Input::<String>::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()
        .context("Failed to read confirmation input")
}

/// Shows the plan and asks the operator to type [`EXECUTE_CONFIRMATION`].
pub struct TypedConfirm<R> {
    read: R,
}

impl TypedConfirm<fn(&str) -> Result<String>> {
    pub fn interactive() -> Self {
        Self {
            read: read_from_terminal,
        }
    }
}

impl<R> TypedConfirm<R>
where
    R: Fn(&str) -> Result<String>,
{
    pub fn with_reader(read: R) -> Self {
        Self { read }
    }
}

impl<R> Confirm for TypedConfirm<R>
where
    R: Fn(&str) -> Result<String>,
{
    fn confirm(&self, summary: &[String]) -> Result<bool> {
        eprintln!();
        for line in summary {
            eprintln!("{}", line);
        }
        eprintln!();
        eprintln!("⚠️ This cannot be undone.");
        let typed = (self.read)(&format!("Type '{}' to continue", EXECUTE_CONFIRMATION))?;
        let accepted = confirmation_matches(&typed);
        if !accepted {
            log::warn!("Confirmation phrase not entered; nothing was changed");
        }
        Ok(accepted)
    }
}
