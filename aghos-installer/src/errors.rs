use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid --map '{0}': expected DEVICE:MOUNTPOINT:FS (e.g. /dev/sda2:/:ext4)")]
    InvalidMap(String),

    #[error("No progress journal at {0}")]
    NoJournal(PathBuf),

    #[error("Teardown of {root} left {count} problem(s): {details}")]
    TeardownIncomplete {
        root: PathBuf,
        count: usize,
        details: String,
    },
}
