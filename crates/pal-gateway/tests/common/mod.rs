#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use pal_backends::*;
use pal_model::samples::two_well_oil_water;
use pal_model::*;

pub fn request() -> SimRequest {
    two_well_oil_water(3, 2, 1)
}

pub fn recorded(request: &SimRequest) -> UnifiedResult {
    let dims = request.dims();
    let n = dims.cell_count();
    let metadata = ResultMetadata {
        backend: "fixture".to_string(),
        unit_system: CANONICAL_UNITS,
        source_unit_system: None,
        dims,
        phases: request.phases,
        well_names: request.well_names(),
    };
    let steps = (1..=2u32)
        .map(|r| Timestep {
            report_step: r,
            time_days: 30.0 * r as f64,
            cells: Some(CellArrays::from_primary(vec![240.0; n], vec![0.25; n], None).unwrap()),
            wells: vec![WellState {
                oil_rate_m3_per_day: Some(200.0),
                bhp_bar: Some(180.0),
                ..WellState::named("PROD1")
            }],
        })
        .collect();
    UnifiedResult::new(metadata, steps).unwrap()
}

/// Holds its worker until cancelled.
pub struct Blocker;

impl SimulatorBackend for Blocker {
    fn name(&self) -> &str {
        "blocker"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::OpmFlow
    }

    fn validate(&self, _request: &SimRequest) -> Vec<ValidationIssue> {
        Vec::new()
    }

    fn run(
        &self,
        _request: &SimRequest,
        workdir: &Path,
        cancel: &CancelToken,
        _progress: &mut dyn FnMut(RunProgressEvent),
    ) -> BackendResult<RawOutput> {
        while !cancel.is_cancelled() {
            std::thread::sleep(Duration::from_millis(10));
        }
        Ok(RawOutput {
            backend: "blocker".to_string(),
            workdir: workdir.to_path_buf(),
            case_name: CASE_NAME.to_string(),
            status: RunStatus::Cancelled,
            errors: vec!["run was cancelled".to_string()],
            exit_code: None,
            elapsed_s: 0.0,
            files: Vec::new(),
        })
    }

    fn parse_result(&self, raw: &RawOutput, _request: &SimRequest) -> BackendResult<UnifiedResult> {
        ensure_completed(raw)?;
        unreachable!("blocker never completes")
    }

    fn probe(&self) -> BackendHealth {
        BackendHealth {
            category: self.category(),
            name: self.name().to_string(),
            kind: self.kind(),
            available: true,
            detail: "test double".to_string(),
        }
    }
}

/// Waits for cancellation, then completes normally anyway.
pub struct Finisher;

impl SimulatorBackend for Finisher {
    fn name(&self) -> &str {
        "finisher"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::OpmFlow
    }

    fn validate(&self, _request: &SimRequest) -> Vec<ValidationIssue> {
        Vec::new()
    }

    fn run(
        &self,
        _request: &SimRequest,
        workdir: &Path,
        cancel: &CancelToken,
        _progress: &mut dyn FnMut(RunProgressEvent),
    ) -> BackendResult<RawOutput> {
        while !cancel.is_cancelled() {
            std::thread::sleep(Duration::from_millis(10));
        }
        Ok(RawOutput {
            backend: "finisher".to_string(),
            workdir: workdir.to_path_buf(),
            case_name: CASE_NAME.to_string(),
            status: RunStatus::Completed,
            errors: Vec::new(),
            exit_code: Some(0),
            elapsed_s: 0.0,
            files: Vec::new(),
        })
    }

    fn parse_result(&self, _raw: &RawOutput, request: &SimRequest) -> BackendResult<UnifiedResult> {
        Ok(recorded(request))
    }

    fn probe(&self) -> BackendHealth {
        BackendHealth {
            category: self.category(),
            name: self.name().to_string(),
            kind: self.kind(),
            available: true,
            detail: "test double".to_string(),
        }
    }
}

/// Registry with a recorded `reference/replay` and a `simulator/blocker`.
pub fn registry(recording: &Path) -> Arc<AdapterRegistry> {
    record_result(recording, "BASE", &recorded(&request())).unwrap();
    let registry = Arc::new(AdapterRegistry::new());
    registry.register(
        BackendCategory::Reference,
        "replay",
        Arc::new(ReplayBackend::new(recording)),
    );
    registry.register(BackendCategory::Simulator, "blocker", Arc::new(Blocker));
    registry
}

pub const POLL: Duration = Duration::from_millis(10);
