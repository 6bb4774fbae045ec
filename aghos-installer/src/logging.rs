use env_logger::Target;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

fn open_log(path: &Path) -> io::Result<Target> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    Ok(Target::Pipe(Box::new(file)))
}

/// Initialise env_logger once. `RUST_LOG` wins over the `info` default.
///
/// With `log_file` set, output is appended there; if the file cannot be
/// opened (permissions, read-only FS) logging falls back to stderr.
pub fn init_with(log_file: Option<PathBuf>) {
    let target = match log_file.as_deref().map(open_log) {
        Some(Ok(target)) => target,
        Some(Err(err)) => {
            eprintln!("aghos: cannot open log file ({}), logging to stderr", err);
            Target::Stderr
        }
        None => Target::Stderr,
    };

    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .target(target)
        .init();
}
