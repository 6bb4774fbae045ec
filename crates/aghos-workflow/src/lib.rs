//! AGHOS workflow orchestration.
//!
//! This crate holds the stage runner, the statically declared install
//! pipelines, the session value threaded through every stage, preflight
//! checks and the progress journal. The provisioning steps themselves live
//! in `aghos-core`.

pub mod journal;
pub mod pipeline;
pub mod plan;
pub mod preflight;
pub mod session;
pub mod stage_runner;

#[cfg(test)]
pub(crate) mod test_env;

pub use pipeline::{run_finalize, run_install, run_mount_existing, AssumeYes, Confirm};
pub use session::InstallSession;
