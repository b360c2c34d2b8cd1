//! pal-results: decoding simulator output into [`UnifiedResult`] and storing it.
//!
//! [`read_result`] looks for a binary restart stream, a binary summary pair
//! and the text streams scripted backends write, in that order of preference.
//! Whatever is present is merged by report step, converted to canonical units
//! and checked against the model invariants.

pub mod binary;
pub mod restart;
pub mod store;
pub mod summary;
pub mod text;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use pal_core::UnitSystem;
use pal_model::{
    CANONICAL_UNITS, GridDims, PhaseConfig, ResultMetadata, SimRequest, Timestep, UnifiedResult,
    WellState,
};

pub use binary::{BinData, BinKeyword, BinaryWriter, Endian};
pub use store::{ResultStore, StoreError, StoreResult, StoredManifest};

pub type DecodeResult<T> = Result<T, DecodeError>;

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error(
        "{source_name}: malformed record at byte {offset}: {message} (expected {expected}, found {found})"
    )]
    Record {
        source_name: String,
        offset: u64,
        expected: usize,
        found: usize,
        message: String,
    },

    #[error("{source_name}{}: {message}", offset_suffix(.offset))]
    Content {
        source_name: String,
        offset: Option<u64>,
        message: String,
    },

    #[error("I/O error on {path}: {source}", path = .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No simulator output found in {dir}", dir = .dir.display())]
    NoOutput { dir: PathBuf },

    #[error(transparent)]
    Core(#[from] pal_core::CoreError),

    #[error("Decoded result is invalid: {0}")]
    Model(#[from] pal_model::ModelError),
}

fn offset_suffix(offset: &Option<u64>) -> String {
    match offset {
        Some(o) => format!(" at byte {o}"),
        None => String::new(),
    }
}

/// Report-step times further apart than this are logged as a mismatch.
const TIME_MATCH_TOL_DAYS: f64 = 1e-6;

/// What the caller knows about the run that produced an output directory.
#[derive(Debug, Clone, Default)]
pub struct ResultHints {
    pub backend: String,
    /// Base name of the output files; any case is accepted when unset.
    pub case_name: Option<String>,
    pub dims: Option<GridDims>,
    pub phases: Option<PhaseConfig>,
    pub well_names: Vec<String>,
}

impl ResultHints {
    pub fn new(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            ..Self::default()
        }
    }

    pub fn from_request(backend: impl Into<String>, case_name: impl Into<String>, request: &SimRequest) -> Self {
        Self {
            backend: backend.into(),
            case_name: Some(case_name.into()),
            dims: Some(request.dims()),
            phases: Some(request.phases),
            well_names: request.well_names(),
        }
    }
}

/// Output files found in one directory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputFiles {
    pub restart: Option<PathBuf>,
    pub smspec: Option<PathBuf>,
    pub unsmry: Option<PathBuf>,
    pub summary_csv: Option<PathBuf>,
    pub cells_csv: Option<PathBuf>,
}

impl OutputFiles {
    pub fn is_empty(&self) -> bool {
        self.restart.is_none()
            && self.smspec.is_none()
            && self.unsmry.is_none()
            && self.summary_csv.is_none()
            && self.cells_csv.is_none()
    }
}

const SUFFIXES: [&str; 5] = [".UNRST", ".SMSPEC", ".UNSMRY", ".summary.csv", ".cells.csv"];

fn suffix_slot<'a>(files: &'a mut OutputFiles, suffix: &str) -> &'a mut Option<PathBuf> {
    match suffix {
        ".UNRST" => &mut files.restart,
        ".SMSPEC" => &mut files.smspec,
        ".UNSMRY" => &mut files.unsmry,
        ".summary.csv" => &mut files.summary_csv,
        _ => &mut files.cells_csv,
    }
}

/// Find output files in `dir`. Without a case name the first match of each
/// kind in name order is taken.
pub fn locate_outputs(dir: &Path, case_name: Option<&str>) -> DecodeResult<OutputFiles> {
    let mut files = OutputFiles::default();
    if let Some(case) = case_name {
        for suffix in SUFFIXES {
            let path = dir.join(format!("{case}{suffix}"));
            if path.is_file() {
                *suffix_slot(&mut files, suffix) = Some(path);
            }
        }
        return Ok(files);
    }

    let io = |source: std::io::Error| DecodeError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut names: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(io)?
        .map(|entry| entry.map(|e| e.path()).map_err(io))
        .collect::<DecodeResult<_>>()?;
    names.sort();
    for path in names.into_iter().filter(|p| p.is_file()) {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
            continue;
        };
        for suffix in SUFFIXES {
            let slot = suffix_slot(&mut files, suffix);
            if name.len() > suffix.len() && name.ends_with(suffix) && slot.is_none() {
                *slot = Some(path.clone());
            }
        }
    }
    Ok(files)
}

fn content(source: &Path, message: impl Into<String>) -> DecodeError {
    DecodeError::Content {
        source_name: source.display().to_string(),
        offset: None,
        message: message.into(),
    }
}

/// Report steps keyed by index; the first source to claim a step sets its time.
#[derive(Default)]
struct Merge {
    steps: BTreeMap<u32, Timestep>,
}

impl Merge {
    fn step(&mut self, report_step: u32, time_days: f64, source: &str) -> &mut Timestep {
        let step = self.steps.entry(report_step).or_insert_with(|| Timestep {
            report_step,
            time_days,
            cells: None,
            wells: Vec::new(),
        });
        if (step.time_days - time_days).abs() > TIME_MATCH_TOL_DAYS * step.time_days.abs().max(1.0) {
            tracing::warn!(
                report_step,
                kept = step.time_days,
                other = time_days,
                source,
                "report step times disagree between streams"
            );
        }
        step
    }

    fn time_of(&self, report_step: u32) -> Option<f64> {
        self.steps.get(&report_step).map(|s| s.time_days)
    }

    fn add_wells(&mut self, report_step: u32, time_days: f64, wells: Vec<WellState>, source: &str) {
        self.step(report_step, time_days, source).wells = wells;
    }
}

/// Decode every output stream found in `dir` into one canonical result.
pub fn read_result(dir: &Path, hints: &ResultHints) -> DecodeResult<UnifiedResult> {
    let files = locate_outputs(dir, hints.case_name.as_deref())?;
    if files.is_empty() {
        return Err(DecodeError::NoOutput {
            dir: dir.to_path_buf(),
        });
    }

    let mut merge = Merge::default();
    let mut unit_systems: Vec<UnitSystem> = Vec::new();
    let mut dims: Option<GridDims> = None;
    let mut phases: Option<PhaseConfig> = None;
    let mut well_names: Vec<String> = Vec::new();

    if let Some(path) = &files.restart {
        let data = restart::read_restart(path)?;
        let source = path.display().to_string();
        for step in &data.steps {
            let cells = data.cells(step)?;
            merge.step(step.report_step, step.time_days, &source).cells = Some(cells);
        }
        unit_systems.push(data.unit_system);
        dims = Some(data.dims);
        phases = Some(data.phases);
        if files.cells_csv.is_some() {
            tracing::debug!(dir = %dir.display(), "binary restart present, ignoring text cell stream");
        }
    } else if let Some(path) = &files.cells_csv {
        let data = text::read_cells_csv(path)?;
        let source = path.display().to_string();
        for step in data.steps {
            merge.step(step.report_step, step.time_days, &source).cells = Some(step.cells);
        }
        unit_systems.push(data.unit_system);
        dims = data.dims;
        phases = data.phases;
    }

    match (&files.smspec, &files.unsmry) {
        (Some(smspec), Some(unsmry)) => {
            let data = summary::read_summary(smspec, unsmry)?;
            let source = unsmry.display().to_string();
            for step in &data.steps {
                let time = match data.time_days(step).or_else(|| merge.time_of(step.report_step)) {
                    Some(t) => t,
                    None => {
                        return Err(content(
                            unsmry,
                            format!("report step {} has no TIME and no restart step", step.report_step),
                        ));
                    }
                };
                merge.add_wells(step.report_step, time, data.well_states(step), &source);
            }
            unit_systems.push(data.spec.unit_system);
            dims = dims.or(data.spec.dims);
            well_names = data.spec.well_names();
            if files.summary_csv.is_some() {
                tracing::debug!(dir = %dir.display(), "binary summary present, ignoring text summary");
            }
        }
        (Some(only), None) => return Err(content(only, "summary specification has no UNSMRY data file")),
        (None, Some(only)) => return Err(content(only, "summary data has no SMSPEC specification")),
        (None, None) => {
            if let Some(path) = &files.summary_csv {
                let data = text::read_summary_csv(path)?;
                let source = path.display().to_string();
                for step in data.steps {
                    for w in &step.wells {
                        if !well_names.contains(&w.name) {
                            well_names.push(w.name.clone());
                        }
                    }
                    merge.add_wells(step.report_step, step.time_days, step.wells, &source);
                }
                unit_systems.push(data.unit_system);
            }
        }
    }

    if let (Some(found), Some(expected)) = (dims, hints.dims)
        && found != expected
    {
        return Err(content(
            dir,
            format!(
                "output grid is {}x{}x{}, request grid is {}x{}x{}",
                found.nx, found.ny, found.nz, expected.nx, expected.ny, expected.nz
            ),
        ));
    }
    let dims = dims
        .or(hints.dims)
        .ok_or_else(|| content(dir, "grid dimensions are not recorded in the output"))?;
    let phases = phases
        .or(hints.phases)
        .ok_or_else(|| content(dir, "phase configuration is not recorded in the output"))?;
    if well_names.is_empty() {
        well_names = hints.well_names.clone();
    }

    let source_unit_system = unit_systems.first().copied();
    if unit_systems.iter().any(|u| Some(*u) != source_unit_system) {
        tracing::warn!(dir = %dir.display(), ?unit_systems, "output streams use different unit systems");
    }

    let metadata = ResultMetadata {
        backend: hints.backend.clone(),
        unit_system: CANONICAL_UNITS,
        source_unit_system,
        dims,
        phases,
        well_names,
    };
    let timesteps: Vec<Timestep> = merge.steps.into_values().collect();
    tracing::info!(
        dir = %dir.display(),
        backend = %hints.backend,
        steps = timesteps.len(),
        "decoded simulator output"
    );
    Ok(UnifiedResult::new(metadata, timesteps)?)
}
