//! Scripted-interpreter backend: MRST running under GNU Octave.
//!
//! The deck is written in METRIC units and read back by MRST's deck reader;
//! a generated driver script runs the fully implicit black-oil solver and
//! writes text summary and cell streams in strict SI units.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use pal_core::UnitSystem;
use pal_deck::{generate_deck, DeckOptions};
use pal_model::{validate_request, SimRequest, UnifiedResult, ValidationIssue, ValidationLimits};
use pal_results::text::{CELL_COLUMNS, SUMMARY_COLUMNS};
use pal_results::{read_result, ResultHints};
use serde::{Deserialize, Serialize};

use crate::contract::{ensure_completed, BackendHealth, RawOutput, SimulatorBackend};
use crate::error::{BackendError, BackendResult};
use crate::process::{find_executable, run_with_timeout, tail_lines, CancelToken, ProcessSpec};
use crate::progress::{ProgressReporter, RunProgressEvent, RunStage};
use crate::registry::BackendKind;
use crate::CASE_NAME;

pub const DRIVER_SCRIPT: &str = "run_case.m";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MrstConfig {
    pub octave: PathBuf,
    /// Directory holding MRST's `startup.m`. When unset the interpreter is
    /// expected to have MRST on its path already.
    pub mrst_root: Option<PathBuf>,
    pub timeout_s: u64,
    pub max_cells: usize,
}

impl Default for MrstConfig {
    fn default() -> Self {
        Self {
            octave: PathBuf::from("octave"),
            mrst_root: None,
            timeout_s: 7200,
            max_cells: 200_000,
        }
    }
}

impl MrstConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_s)
    }
}

#[derive(Debug, Clone)]
pub struct MrstBackend {
    name: String,
    config: MrstConfig,
}

impl MrstBackend {
    pub fn new(config: MrstConfig) -> Self {
        Self {
            name: BackendKind::Mrst.default_name().to_string(),
            config,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn config(&self) -> &MrstConfig {
        &self.config
    }
}

fn octave_string(path: &Path) -> String {
    path.display().to_string().replace('\'', "''")
}

/// Octave driver that simulates `<CASE>.DATA` and writes both text streams.
pub fn driver_script(mrst_root: Option<&Path>, gas: bool) -> String {
    let mut s = String::new();
    s.push_str("% generated driver; reads the deck, simulates, writes SI text streams\n");
    if let Some(root) = mrst_root {
        let _ = writeln!(s, "run(fullfile('{}', 'startup.m'));", octave_string(root));
    }
    s.push_str(
        "mrstModule add ad-core ad-blackoil ad-props deckformat\n\
         deck = convertDeckUnits(readEclipseDeck('",
    );
    let _ = writeln!(s, "{CASE_NAME}.DATA'));");
    s.push_str(
        "G = computeGeometry(initEclipseGrid(deck));\n\
         rock = compressRock(initEclipseRock(deck), G.cells.indexMap);\n\
         fluid = initDeckADIFluid(deck);\n\
         model = selectModelFromDeck(G, rock, fluid, deck);\n\
         state0 = initStateDeck(model, deck);\n\
         schedule = convertDeckScheduleToMRST(model, deck);\n\
         [wellSols, states] = simulateScheduleAD(state0, model, schedule);\n\
         t = cumsum(schedule.step.val);\n",
    );

    let _ = writeln!(s, "fid = fopen('{CASE_NAME}.summary.csv', 'w');");
    let _ = writeln!(
        s,
        "fprintf(fid, '# units: SI\\n{}\\n');",
        SUMMARY_COLUMNS.join(",")
    );
    s.push_str(
        "for r = 1:numel(wellSols)\n\
         \x20 for w = 1:numel(wellSols{r})\n\
         \x20   ws = wellSols{r}(w);\n\
         \x20   qo = max(-ws.qOs, 0); qw = max(-ws.qWs, 0); qg = max(-ws.qGs, 0);\n\
         \x20   iw = max(ws.qWs, 0); ig = max(ws.qGs, 0);\n\
         \x20   fprintf(fid, '%d,%.12g,%s,%.12g,%.12g,%.12g,%.12g,%.12g,%.12g,,,\\n', \
         r, t(r), ws.name, qo, qw, qg, iw, ig, ws.bhp);\n\
         \x20 end\n\
         end\n\
         fclose(fid);\n",
    );

    let _ = writeln!(s, "fid = fopen('{CASE_NAME}.cells.csv', 'w');");
    let _ = writeln!(
        s,
        "fprintf(fid, '# units: SI\\n# dims: %d %d %d\\n# phases: {}\\n{}\\n', G.cartDims);",
        if gas { 7 } else { 3 },
        CELL_COLUMNS.join(",")
    );
    s.push_str(
        "for r = 1:numel(states)\n\
         \x20 st = states{r};\n\
         \x20 for c = 1:G.cells.num\n",
    );
    if gas {
        s.push_str(
            "\x20   fprintf(fid, '%d,%.12g,%d,%.12g,%.12g,%.12g\\n', \
             r, t(r), G.cells.indexMap(c) - 1, st.pressure(c), st.s(c, 1), st.s(c, 3));\n",
        );
    } else {
        s.push_str(
            "\x20   fprintf(fid, '%d,%.12g,%d,%.12g,%.12g,\\n', \
             r, t(r), G.cells.indexMap(c) - 1, st.pressure(c), st.s(c, 1));\n",
        );
    }
    s.push_str(
        "\x20 end\n\
         end\n\
         fclose(fid);\n",
    );
    s
}

impl SimulatorBackend for MrstBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Mrst
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
                unit_system: UnitSystem::Metric,
            },
        )?;
        let deck_path = workdir.join(format!("{CASE_NAME}.DATA"));
        std::fs::write(&deck_path, deck).map_err(|e| BackendError::io(&deck_path, e))?;
        let script = driver_script(self.config.mrst_root.as_deref(), request.phases.gas);
        let script_path = workdir.join(DRIVER_SCRIPT);
        std::fs::write(&script_path, script).map_err(|e| BackendError::io(&script_path, e))?;

        let spec = ProcessSpec {
            program: self.config.octave.clone(),
            args: vec![
                "--no-gui".to_string(),
                "--quiet".to_string(),
                DRIVER_SCRIPT.to_string(),
            ],
            cwd: workdir.to_path_buf(),
            env: Vec::new(),
            log_stem: "octave".to_string(),
        };
        reporter.emit(RunStage::Executing, None);
        let outcome = run_with_timeout(&spec, self.config.timeout(), cancel)?;

        reporter.emit(RunStage::CollectingOutput, None);
        // Octave prints script errors on stderr and still exits non-zero.
        Ok(RawOutput::from_process(&self.name, workdir, CASE_NAME, &outcome, || {
            tail_lines(&outcome.stderr_log, 20)
        }))
    }

    fn parse_result(&self, raw: &RawOutput, request: &SimRequest) -> BackendResult<UnifiedResult> {
        ensure_completed(raw)?;
        let hints = ResultHints::from_request(self.name.as_str(), raw.case_name.as_str(), request);
        Ok(read_result(&raw.workdir, &hints)?)
    }

    fn probe(&self) -> BackendHealth {
        let octave = find_executable(&self.config.octave);
        let startup = self.config.mrst_root.as_ref().map(|r| r.join("startup.m"));
        let (available, detail) = match (octave, startup) {
            (None, _) => (false, format!("{} not found", self.config.octave.display())),
            (Some(_), Some(startup)) if !startup.is_file() => {
                (false, format!("{} not found", startup.display()))
            }
            (Some(path), _) => (true, path.display().to_string()),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_writes_both_streams() {
        let script = driver_script(Some(Path::new("/opt/mrst")), false);
        assert!(script.contains("run(fullfile('/opt/mrst', 'startup.m'));"));
        assert!(script.contains("readEclipseDeck('CASE.DATA')"));
        assert!(script.contains("CASE.summary.csv"));
        assert!(script.contains("CASE.cells.csv"));
        assert!(script.contains("# phases: 3"));
        assert!(!script.contains("st.s(c, 3)"));
    }

    #[test]
    fn three_phase_driver_writes_gas_saturation() {
        let script = driver_script(None, true);
        assert!(!script.contains("startup.m"));
        assert!(script.contains("# phases: 7"));
        assert!(script.contains("st.s(c, 3)"));
    }
}
