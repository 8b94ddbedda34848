use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use wait_timeout::ChildExt;

use crate::logs::ReportSink;

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

pub fn run_command(cmd: &str, args: &[&str], timeout: Duration) -> Result<CommandOutput> {
    let mut child = Command::new(cmd)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to start process: {cmd}"))?;

    // Drain both pipes while waiting so a chatty child cannot block on a full pipe.
    let stdout_reader = child.stdout.take().map(|mut out| {
        std::thread::spawn(move || {
            let mut buf = String::new();
            let _ = out.read_to_string(&mut buf);
            buf
        })
    });
    let stderr_reader = child.stderr.take().map(|mut err| {
        std::thread::spawn(move || {
            let mut buf = String::new();
            let _ = err.read_to_string(&mut buf);
            buf
        })
    });

    let status = match child
        .wait_timeout(timeout)
        .with_context(|| format!("failed to wait for process: {cmd}"))?
    {
        Some(status) => status,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(anyhow!("timed out after {timeout:?}: {cmd}"));
        }
    };

    let stdout = stdout_reader
        .and_then(|h| h.join().ok())
        .unwrap_or_default();
    let stderr = stderr_reader
        .and_then(|h| h.join().ok())
        .unwrap_or_default();

    Ok(CommandOutput {
        exit_code: status.code().unwrap_or(-1),
        stdout,
        stderr,
    })
}

/// What `run_logged` saw: trimmed stdout and the warnings it wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggedRun {
    pub stdout: String,
    pub warnings: Vec<String>,
}

impl LoggedRun {
    pub fn ok(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Runs a command and mirrors its output into the report.
///
/// stdout is always logged. Spawn failures, timeouts, non-empty stderr and
/// non-zero exits are written as warnings and returned; none of them abort
/// the run.
pub fn run_logged(
    sink: &mut ReportSink,
    cmd: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<LoggedRun> {
    tracing::debug!(cmd, ?args, "running external command");
    let mut run = LoggedRun::default();
    let output = match run_command(cmd, args, timeout) {
        Ok(output) => output,
        Err(err) => {
            let message = format!("{err:#}");
            sink.warn(&message)?;
            run.warnings.push(message);
            return Ok(run);
        }
    };

    run.stdout = output.stdout.trim().to_string();
    sink.line(&run.stdout)?;
    let stderr = output.stderr.trim();
    if !stderr.is_empty() {
        sink.warn(stderr)?;
        run.warnings.push(stderr.to_string());
    }
    if output.exit_code != 0 {
        tracing::debug!(cmd, exit_code = output.exit_code, "external command failed");
        let message = format!("{cmd} exited with status {}", output.exit_code);
        sink.warn(&message)?;
        run.warnings.push(message);
    }
    Ok(run)
}

pub fn effective_home_dir() -> Result<PathBuf> {
    std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("HOME is not set"))
}
