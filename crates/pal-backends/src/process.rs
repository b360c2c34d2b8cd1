//! Bounded subprocess execution shared by the external-engine backends.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{BackendError, BackendResult};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Cooperative cancellation flag shared between a job owner and a running backend.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct ProcessSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
    /// Base name of the `.stdout.log` / `.stderr.log` files written in `cwd`.
    pub log_stem: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessExit {
    Exited { code: Option<i32>, success: bool },
    TimedOut,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub exit: ProcessExit,
    pub elapsed: Duration,
    pub stdout_log: PathBuf,
    pub stderr_log: PathBuf,
}

/// Run `spec` to completion, killing it once `timeout` elapses or `cancel` fires.
///
/// Output goes to log files rather than pipes so a child that writes a lot
/// can never block on a full pipe.
pub fn run_with_timeout(
    spec: &ProcessSpec,
    timeout: Duration,
    cancel: &CancelToken,
) -> BackendResult<ProcessOutcome> {
    let stdout_log = spec.cwd.join(format!("{}.stdout.log", spec.log_stem));
    let stderr_log = spec.cwd.join(format!("{}.stderr.log", spec.log_stem));
    let started = Instant::now();
    let outcome = |exit| ProcessOutcome {
        exit,
        elapsed: started.elapsed(),
        stdout_log: stdout_log.clone(),
        stderr_log: stderr_log.clone(),
    };

    if cancel.is_cancelled() {
        return Ok(outcome(ProcessExit::Cancelled));
    }

    let stdout = File::create(&stdout_log).map_err(|e| BackendError::io(&stdout_log, e))?;
    let stderr = File::create(&stderr_log).map_err(|e| BackendError::io(&stderr_log, e))?;

    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .current_dir(&spec.cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr));
    for (key, value) in &spec.env {
        command.env(key, value);
    }

    let mut child = command.spawn().map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
            BackendError::ExecutableNotFound {
                program: spec.program.clone(),
            }
        }
        _ => BackendError::io(&spec.program, e),
    })?;
    tracing::info!(program = %spec.program.display(), pid = child.id(), "started subprocess");

    loop {
        if let Some(status) = child.try_wait().map_err(|e| BackendError::io(&spec.program, e))? {
            tracing::info!(
                program = %spec.program.display(),
                code = ?status.code(),
                elapsed_s = started.elapsed().as_secs_f64(),
                "subprocess exited"
            );
            return Ok(outcome(ProcessExit::Exited {
                code: status.code(),
                success: status.success(),
            }));
        }

        let stop = if cancel.is_cancelled() {
            Some(ProcessExit::Cancelled)
        } else if started.elapsed() >= timeout {
            Some(ProcessExit::TimedOut)
        } else {
            None
        };
        if let Some(exit) = stop {
            if let Err(e) = child.kill() {
                tracing::debug!(error = %e, "kill after exit");
            }
            child.wait().map_err(|e| BackendError::io(&spec.program, e))?;
            tracing::warn!(program = %spec.program.display(), ?exit, "subprocess stopped");
            return Ok(outcome(exit));
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Resolve `program` the way a shell would: paths are taken as given, bare
/// names are searched on `PATH`.
pub fn find_executable(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 {
        return program.is_file().then(|| program.to_path_buf());
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

/// Last `count` non-empty lines of a log file; empty when it cannot be read.
pub fn tail_lines(path: &Path, count: usize) -> Vec<String> {
    let Ok(file) = File::open(path) else {
        return Vec::new();
    };
    let lines: Vec<String> = BufReader::new(file)
        .lines()
        .map_while(Result::ok)
        .filter(|l| !l.trim().is_empty())
        .collect();
    let skip = lines.len().saturating_sub(count);
    lines.into_iter().skip(skip).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_token_never_spawns() {
        let dir = tempfile::tempdir().unwrap();
        let token = CancelToken::new();
        token.cancel();
        let spec = ProcessSpec {
            program: PathBuf::from("definitely-not-a-real-program"),
            args: Vec::new(),
            cwd: dir.path().to_path_buf(),
            env: Vec::new(),
            log_stem: "run".to_string(),
        };
        let outcome = run_with_timeout(&spec, Duration::from_secs(1), &token).unwrap();
        assert_eq!(outcome.exit, ProcessExit::Cancelled);
    }

    #[test]
    fn missing_program_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let spec = ProcessSpec {
            program: dir.path().join("no-such-binary"),
            args: Vec::new(),
            cwd: dir.path().to_path_buf(),
            env: Vec::new(),
            log_stem: "run".to_string(),
        };
        let err = run_with_timeout(&spec, Duration::from_secs(1), &CancelToken::new()).unwrap_err();
        assert!(matches!(err, BackendError::ExecutableNotFound { .. }), "{err}");
    }

    #[test]
    fn tail_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("x.log");
        std::fs::write(&log, "a\n\nb\nc\n\n").unwrap();
        assert_eq!(tail_lines(&log, 2), vec!["b", "c"]);
        assert!(tail_lines(&dir.path().join("missing"), 3).is_empty());
    }
}
