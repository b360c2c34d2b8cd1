//! The contract every simulator family implements.

use std::fmt;
use std::path::{Path, PathBuf};

use pal_model::{has_errors, SimRequest, UnifiedResult, ValidationIssue};
use serde::{Deserialize, Serialize};

use crate::error::{BackendError, BackendResult};
use crate::process::{CancelToken, ProcessExit, ProcessOutcome};
use crate::progress::{ProgressReporter, RunProgressEvent, RunStage};
use crate::registry::{BackendCategory, BackendKind};

/// How a run ended. Only `Completed` output may be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::TimedOut => write!(f, "timed out"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// What a backend run left behind. Never parsed by `run` itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawOutput {
    pub backend: String,
    pub workdir: PathBuf,
    pub case_name: String,
    pub status: RunStatus,
    /// Run-level errors: non-zero exits, timeouts, solver complaints.
    pub errors: Vec<String>,
    pub exit_code: Option<i32>,
    pub elapsed_s: f64,
    pub files: Vec<PathBuf>,
}

impl RawOutput {
    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Build the raw output of a finished subprocess; `log_tail` supplies
    /// the last lines of its error log for failed runs.
    pub fn from_process(
        backend: &str,
        workdir: &Path,
        case_name: &str,
        outcome: &ProcessOutcome,
        log_tail: impl FnOnce() -> Vec<String>,
    ) -> Self {
        let (status, exit_code, mut errors) = match outcome.exit {
            ProcessExit::Exited { success: true, code } => (RunStatus::Completed, code, Vec::new()),
            ProcessExit::Exited { success: false, code } => (
                RunStatus::Failed,
                code,
                vec![match code {
                    Some(c) => format!("{backend} exited with status {c}"),
                    None => format!("{backend} was terminated by a signal"),
                }],
            ),
            ProcessExit::TimedOut => (
                RunStatus::TimedOut,
                None,
                vec![format!(
                    "{backend} did not finish within {:.1} s",
                    outcome.elapsed.as_secs_f64()
                )],
            ),
            ProcessExit::Cancelled => (RunStatus::Cancelled, None, vec!["run was cancelled".to_string()]),
        };
        if status == RunStatus::Failed {
            errors.extend(log_tail());
        }
        Self {
            backend: backend.to_string(),
            workdir: workdir.to_path_buf(),
            case_name: case_name.to_string(),
            status,
            errors,
            exit_code,
            elapsed_s: outcome.elapsed.as_secs_f64(),
            files: list_files(workdir),
        }
    }
}

/// Regular files directly inside `dir`, sorted.
pub fn list_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    files
}

/// Availability of one registered backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendHealth {
    pub category: BackendCategory,
    pub name: String,
    pub kind: BackendKind,
    pub available: bool,
    pub detail: String,
}

/// A simulator family.
///
/// Implementations must be thread-safe: the registry hands the same instance
/// to every job.
pub trait SimulatorBackend: Send + Sync {
    /// Registry name, e.g. `opm-flow`.
    fn name(&self) -> &str;

    fn kind(&self) -> BackendKind;

    fn category(&self) -> BackendCategory {
        self.kind().category()
    }

    /// Structural checks only; never runs the engine. Any error-severity
    /// issue means `run` must not be called.
    fn validate(&self, request: &SimRequest) -> Vec<ValidationIssue>;

    /// Write the input into `workdir`, run the engine and report where the
    /// output went. Timeouts, failures and cancellation come back in
    /// [`RawOutput::status`]; `Err` is reserved for a broken installation or
    /// an unwritable workdir.
    fn run(
        &self,
        request: &SimRequest,
        workdir: &Path,
        cancel: &CancelToken,
        progress: &mut dyn FnMut(RunProgressEvent),
    ) -> BackendResult<RawOutput>;

    /// Decode completed output; `request` fills in grid and well names the
    /// output omits.
    fn parse_result(&self, raw: &RawOutput, request: &SimRequest) -> BackendResult<UnifiedResult>;

    /// Cheap availability check, e.g. whether the engine executable resolves.
    fn probe(&self) -> BackendHealth;
}

/// Refuse to parse output of a run that did not complete.
pub fn ensure_completed(raw: &RawOutput) -> BackendResult<()> {
    if raw.succeeded() {
        Ok(())
    } else {
        Err(BackendError::RunFailed {
            status: raw.status,
            errors: raw.errors.clone(),
        })
    }
}

/// Validate, run and parse in that order.
pub fn execute(
    backend: &dyn SimulatorBackend,
    request: &SimRequest,
    workdir: &Path,
    cancel: &CancelToken,
    progress: &mut dyn FnMut(RunProgressEvent),
) -> BackendResult<UnifiedResult> {
    let issues = backend.validate(request);
    if has_errors(&issues) {
        return Err(BackendError::Validation(issues));
    }
    for warning in &issues {
        tracing::warn!(backend = backend.name(), %warning, "validation warning");
    }

    let raw = backend.run(request, workdir, cancel, progress)?;
    ensure_completed(&raw)?;

    let mut reporter = ProgressReporter::new(backend.name(), progress);
    reporter.emit(RunStage::Parsing, None);
    let result = backend.parse_result(&raw, request)?;
    reporter.emit(
        RunStage::Done,
        Some(format!("{} timesteps", result.timesteps.len())),
    );
    Ok(result)
}
