//! CLI argument parsing for the `aghos` binary.

use aghos_core::partitioning::TableKind;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TableArg {
    /// GPT partition table (UEFI)
    Gpt,
    /// MBR (msdos) partition table, at most four partitions
    Mbr,
}

impl From<TableArg> for TableKind {
    fn from(arg: TableArg) -> Self {
        match arg {
            TableArg::Gpt => TableKind::Gpt,
            TableArg::Mbr => TableKind::Mbr,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "aghos", version)]
#[command(about = "🐧 AGHOS installer - partition, format, mount, fstab and GRUB")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Install configuration file (TOML); CLI flags override it
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log every command instead of running it
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Install root the target system is mounted under (default /mnt)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,
}

/// Flags shared by the commands that can modify devices.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ArmArgs {
    /// Confirm destructive operation (required for non-dry-run)
    #[arg(long)]
    pub yes_i_know: bool,

    /// Skip the interactive confirmation prompt
    #[arg(long)]
    pub assume_yes: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 💽 List disks
    Disks {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// 📐 Show the partition plan for a disk and how much space it uses
    Plan {
        /// Target disk device (e.g., /dev/sda)
        #[arg(long)]
        disk: Option<PathBuf>,

        #[arg(long, value_enum)]
        table: Option<TableArg>,
    },

    /// 💾 Erase a disk and install: partition, format, mount, fstab, GRUB
    Install {
        /// Target disk device (e.g., /dev/sda)
        #[arg(long)]
        disk: Option<PathBuf>,

        #[arg(long, value_enum)]
        table: Option<TableArg>,

        #[command(flatten)]
        arm: ArmArgs,
    },

    /// 📂 Mount existing partitions, then write fstab and install GRUB
    MountExisting {
        /// Existing partition as DEVICE:MOUNTPOINT:FS (repeatable)
        #[arg(long = "map", value_name = "DEVICE:MOUNTPOINT:FS")]
        maps: Vec<String>,

        /// Mount without formatting
        #[arg(long)]
        no_format: bool,

        #[command(flatten)]
        arm: ArmArgs,
    },

    /// 🥾 Write fstab and install GRUB into an already-mounted root
    Finalize,

    /// 🧹 Sync and unmount everything under the install root
    Teardown,

    /// 📜 Show the progress journal of the last run
    Status,
}
