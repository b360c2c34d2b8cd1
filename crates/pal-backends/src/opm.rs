//! Native-binary backend: OPM Flow reading a generated deck and writing
//! unified binary restart and summary files.

use std::path::{Path, PathBuf};
use std::time::Duration;

use pal_core::UnitSystem;
use pal_deck::{generate_deck, DeckOptions};
use pal_model::{validate_request, SimRequest, UnifiedResult, ValidationIssue, ValidationLimits};
use pal_results::{read_result, ResultHints};
use serde::{Deserialize, Serialize};

use crate::contract::{ensure_completed, BackendHealth, RawOutput, SimulatorBackend};
use crate::error::{BackendError, BackendResult};
use crate::process::{find_executable, run_with_timeout, tail_lines, CancelToken, ProcessSpec};
use crate::progress::{ProgressReporter, RunProgressEvent, RunStage};
use crate::registry::BackendKind;
use crate::CASE_NAME;

const LOG_TAIL_LINES: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpmFlowConfig {
    /// `flow` binary; bare names are looked up on `PATH`.
    pub executable: PathBuf,
    pub timeout_s: u64,
    pub max_cells: usize,
    /// Unit system of the generated deck.
    pub deck_units: UnitSystem,
    /// Appended after the deck and output-dir arguments.
    pub extra_args: Vec<String>,
}

impl Default for OpmFlowConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("flow"),
            timeout_s: 3600,
            max_cells: 5_000_000,
            deck_units: UnitSystem::Field,
            extra_args: Vec::new(),
        }
    }
}

impl OpmFlowConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_s)
    }
}

#[derive(Debug, Clone)]
pub struct OpmFlowBackend {
    name: String,
    config: OpmFlowConfig,
}

impl OpmFlowBackend {
    pub fn new(config: OpmFlowConfig) -> BackendResult<Self> {
        if config.deck_units.deck_keyword().is_none() {
            return Err(BackendError::Config {
                what: format!("deck unit system {} has no deck keyword", config.deck_units),
            });
        }
        Ok(Self {
            name: BackendKind::OpmFlow.default_name().to_string(),
            config,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn config(&self) -> &OpmFlowConfig {
        &self.config
    }

    fn deck_path(workdir: &Path) -> PathBuf {
        workdir.join(format!("{CASE_NAME}.DATA"))
    }
}

/// Solver complaints from the print file of a run that exited cleanly.
fn print_file_errors(workdir: &Path) -> Vec<String> {
    let prt = workdir.join(format!("{CASE_NAME}.PRT"));
    tail_lines(&prt, usize::MAX)
        .into_iter()
        .filter(|line| line.contains("Error:") || line.contains("Problem:"))
        .collect()
}

impl SimulatorBackend for OpmFlowBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::OpmFlow
    }

    fn validate(&self, request: &SimRequest) -> Vec<ValidationIssue> {
        validate_request(
            request,
            &ValidationLimits {
                max_cells: self.config.max_cells,
            },
        )
    }

    fn run(
        &self,
        request: &SimRequest,
        workdir: &Path,
        cancel: &CancelToken,
        progress: &mut dyn FnMut(RunProgressEvent),
    ) -> BackendResult<RawOutput> {
        let mut reporter = ProgressReporter::new(self.name.as_str(), progress);

        reporter.emit(RunStage::WritingInput, None);
        std::fs::create_dir_all(workdir).map_err(|e| BackendError::io(workdir, e))?;
        let deck = generate_deck(
            request,
            &DeckOptions {
                unit_system: self.config.deck_units,
            },
        )?;
        let deck_path = Self::deck_path(workdir);
        std::fs::write(&deck_path, deck).map_err(|e| BackendError::io(&deck_path, e))?;

        let mut args = vec![
            format!("{CASE_NAME}.DATA"),
            format!("--output-dir={}", workdir.display()),
        ];
        args.extend(self.config.extra_args.iter().cloned());
        let spec = ProcessSpec {
            program: self.config.executable.clone(),
            args,
            cwd: workdir.to_path_buf(),
            env: Vec::new(),
            log_stem: "flow".to_string(),
        };
        reporter.emit(RunStage::Executing, Some(format!("{} cells", request.dims().cell_count())));
        let outcome = run_with_timeout(&spec, self.config.timeout(), cancel)?;

        reporter.emit(RunStage::CollectingOutput, None);
        let mut raw = RawOutput::from_process(&self.name, workdir, CASE_NAME, &outcome, || {
            tail_lines(&outcome.stderr_log, LOG_TAIL_LINES)
        });
        if raw.succeeded() {
            let complaints = print_file_errors(workdir);
            if !complaints.is_empty() {
                tracing::warn!(backend = %self.name, count = complaints.len(), "solver reported errors");
                raw.errors.extend(complaints);
            }
        }
        Ok(raw)
    }

    fn parse_result(&self, raw: &RawOutput, request: &SimRequest) -> BackendResult<UnifiedResult> {
        ensure_completed(raw)?;
        let hints = ResultHints::from_request(self.name.as_str(), raw.case_name.as_str(), request);
        Ok(read_result(&raw.workdir, &hints)?)
    }

    fn probe(&self) -> BackendHealth {
        let (available, detail) = match find_executable(&self.config.executable) {
            Some(path) => (true, path.display().to_string()),
            None => (
                false,
                format!("{} not found", self.config.executable.display()),
            ),
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
