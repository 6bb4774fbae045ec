//! Child process helpers with bounded runtime.

use crate::{HalError, HalResult};
use std::io::Read;
use std::process::{Child, Command, Output, Stdio};
use std::thread::JoinHandle;
use std::time::Duration;
use wait_timeout::ChildExt;

pub(crate) fn map_command_err(program: &str, err: std::io::Error) -> HalError {
    if err.kind() == std::io::ErrorKind::NotFound {
        return HalError::CommandNotFound(program.to_string());
    }
    HalError::Io(err)
}

pub(crate) fn output_failed(program: &str, output: &Output) -> HalError {
    HalError::CommandFailed {
        program: program.to_string(),
        code: output.status.code(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn reap(child: &mut Child, handles: [JoinHandle<Vec<u8>>; 2]) {
    let _ = child.kill();
    let _ = child.wait();
    for handle in handles {
        let _ = handle.join();
    }
}

/// Run `cmd`, capturing stdout/stderr, and kill it if it outlives `timeout`.
///
/// The child is killed and reaped on every error path.
pub(crate) fn output_with_timeout(
    program: &str,
    cmd: &mut Command,
    timeout: Duration,
) -> HalResult<Output> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = cmd.spawn().map_err(|e| map_command_err(program, e))?;

    // Drain pipes concurrently to avoid deadlocks on large output.
    let stdout_handle = drain(child.stdout.take());
    let stderr_handle = drain(child.stderr.take());

    let status = match child.wait_timeout(timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            reap(&mut child, [stdout_handle, stderr_handle]);
            return Err(HalError::CommandTimeout {
                program: program.to_string(),
                timeout_secs: timeout.as_secs(),
            });
        }
        Err(err) => {
            reap(&mut child, [stdout_handle, stderr_handle]);
            return Err(HalError::Io(err));
        }
    };

    let stdout = stdout_handle.join().unwrap_or_default();
    let stderr = stderr_handle.join().unwrap_or_default();
    Ok(Output {
        status,
        stdout,
        stderr,
    })
}

pub(crate) fn status_with_timeout(
    program: &str,
    cmd: &mut Command,
    timeout: Duration,
) -> HalResult<()> {
    let output = output_with_timeout(program, cmd, timeout)?;
    if !output.status.success() {
        return Err(output_failed(program, &output));
    }
    Ok(())
}

/// Run `cmd` and return trimmed stdout on success.
pub(crate) fn stdout_with_timeout(
    program: &str,
    cmd: &mut Command,
    timeout: Duration,
) -> HalResult<String> {
    let output = output_with_timeout(program, cmd, timeout)?;
    if !output.status.success() {
        return Err(output_failed(program, &output));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
