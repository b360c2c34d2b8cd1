//! Reference backend serving a recorded output directory.
//!
//! Any directory [`pal_results::read_result`] understands can be replayed:
//! binary output captured from a real engine, or text streams written by
//! [`record_result`].

use std::path::{Path, PathBuf};

use pal_core::UnitSystem;
use pal_model::{validate_request, SimRequest, UnifiedResult, ValidationIssue, ValidationLimits};
use pal_results::text::{write_cells_csv, write_summary_csv, CellStep, WellStep};
use pal_results::{read_result, ResultHints};

use crate::contract::{ensure_completed, list_files, BackendHealth, RawOutput, RunStatus, SimulatorBackend};
use crate::error::{BackendError, BackendResult};
use crate::process::CancelToken;
use crate::progress::{ProgressReporter, RunProgressEvent, RunStage};
use crate::registry::BackendKind;

#[derive(Debug, Clone)]
pub struct ReplayBackend {
    name: String,
    source_dir: PathBuf,
}

impl ReplayBackend {
    pub fn new(source_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: BackendKind::Replay.default_name().to_string(),
            source_dir: source_dir.into(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }
}

impl SimulatorBackend for ReplayBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Replay
    }

    fn validate(&self, request: &SimRequest) -> Vec<ValidationIssue> {
        validate_request(request, &ValidationLimits::default())
    }

    fn run(
        &self,
        _request: &SimRequest,
        workdir: &Path,
        cancel: &CancelToken,
        progress: &mut dyn FnMut(RunProgressEvent),
    ) -> BackendResult<RawOutput> {
        let mut reporter = ProgressReporter::new(self.name.as_str(), progress);
        if !self.source_dir.is_dir() {
            return Err(BackendError::MissingRecording {
                path: self.source_dir.clone(),
            });
        }

        reporter.emit(RunStage::WritingInput, None);
        std::fs::create_dir_all(workdir).map_err(|e| BackendError::io(workdir, e))?;

        reporter.emit(RunStage::Executing, Some(self.source_dir.display().to_string()));
        let started = std::time::Instant::now();
        let mut status = RunStatus::Completed;
        let mut errors = Vec::new();
        for file in list_files(&self.source_dir) {
            if cancel.is_cancelled() {
                status = RunStatus::Cancelled;
                errors.push("run was cancelled".to_string());
                break;
            }
            let Some(file_name) = file.file_name() else {
                continue;
            };
            let target = workdir.join(file_name);
            std::fs::copy(&file, &target).map_err(|e| BackendError::io(&file, e))?;
        }

        reporter.emit(RunStage::CollectingOutput, None);
        Ok(RawOutput {
            backend: self.name.clone(),
            workdir: workdir.to_path_buf(),
            case_name: String::new(),
            status,
            errors,
            exit_code: None,
            elapsed_s: started.elapsed().as_secs_f64(),
            files: list_files(workdir),
        })
    }

    fn parse_result(&self, raw: &RawOutput, request: &SimRequest) -> BackendResult<UnifiedResult> {
        ensure_completed(raw)?;
        // Recordings keep whatever case name the producing engine used.
        let hints = ResultHints {
            case_name: None,
            ..ResultHints::from_request(self.name.as_str(), "", request)
        };
        Ok(read_result(&raw.workdir, &hints)?)
    }

    fn probe(&self) -> BackendHealth {
        let available = self.source_dir.is_dir();
        let detail = if available {
            format!("{} files", list_files(&self.source_dir).len())
        } else {
            format!("{} missing", self.source_dir.display())
        };
        BackendHealth {
            category: self.category(),
            name: self.name.clone(),
            kind: self.kind(),
            available,
            detail,
        }
    }
}

/// Write `result` into `dir` as METRIC text streams replayable by
/// [`ReplayBackend`]. Steps without cell arrays are left out of the cell
/// stream; a stream with no rows at all is not written.
pub fn record_result(dir: &Path, case_name: &str, result: &UnifiedResult) -> BackendResult<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).map_err(|e| BackendError::io(dir, e))?;
    let mut written = Vec::new();

    let well_steps: Vec<WellStep> = result
        .timesteps
        .iter()
        .filter(|t| !t.wells.is_empty())
        .map(|t| WellStep {
            report_step: t.report_step,
            time_days: t.time_days,
            wells: t.wells.clone(),
        })
        .collect();
    if !well_steps.is_empty() {
        let path = dir.join(format!("{case_name}.summary.csv"));
        std::fs::write(&path, write_summary_csv(UnitSystem::Metric, &well_steps))
            .map_err(|e| BackendError::io(&path, e))?;
        written.push(path);
    }

    let cell_steps: Vec<CellStep> = result
        .timesteps
        .iter()
        .filter_map(|t| {
            t.cells.as_ref().map(|cells| CellStep {
                report_step: t.report_step,
                time_days: t.time_days,
                cells: cells.clone(),
            })
        })
        .collect();
    if !cell_steps.is_empty() {
        let path = dir.join(format!("{case_name}.cells.csv"));
        let meta = &result.metadata;
        std::fs::write(
            &path,
            write_cells_csv(UnitSystem::Metric, meta.dims, meta.phases, &cell_steps),
        )
        .map_err(|e| BackendError::io(&path, e))?;
        written.push(path);
    }

    tracing::info!(dir = %dir.display(), files = written.len(), "recorded result");
    Ok(written)
}
