use std::path::Path;

use pal_core::UnitSystem;
use pal_model::{samples, CellArrays, GridDims, PhaseConfig, WellState, CANONICAL_UNITS};
use pal_results::restart::{encode_restart, RestartData, RestartStep};
use pal_results::summary::{encode_summary, standard_spec, SummaryData, SummaryStep};
use pal_results::text::{write_cells_csv, write_summary_csv, CellStep, WellStep};
use pal_results::*;

const CASE: &str = "CASE";

fn restart_fixture(order: &[u32]) -> RestartData {
    let n = 6;
    RestartData {
        unit_system: UnitSystem::Field,
        dims: GridDims::new(3, 2, 1),
        phases: PhaseConfig::oil_water(),
        steps: order
            .iter()
            .map(|&r| RestartStep {
                report_step: r,
                time_days: 30.0 * r as f64,
                pressure: vec![3000.0 - 100.0 * r as f64; n],
                swat: vec![0.2 + 0.05 * r as f64; n],
                sgas: None,
            })
            .collect(),
    }
}

fn summary_fixture(steps: u32) -> SummaryData {
    let wells = vec!["INJ1".to_string(), "PROD1".to_string()];
    let spec = standard_spec(UnitSystem::Field, Some(GridDims::new(3, 2, 1)), &wells);
    let steps = (1..=steps)
        .map(|r| {
            let values = spec
                .vectors
                .iter()
                .map(|v| match (v.keyword.as_str(), v.well.as_str()) {
                    ("TIME", _) => 30.0 * r as f64,
                    ("WOPR", "PROD1") => 500.0 + r as f64,
                    ("WWIR", "INJ1") => 800.0,
                    ("WBHP", _) => 2500.0,
                    _ => 0.0,
                })
                .collect();
            SummaryStep {
                report_step: r,
                values,
            }
        })
        .collect();
    SummaryData { spec, steps }
}

fn write_binary_case(dir: &Path, restart_order: &[u32], summary_steps: u32) {
    let restart = encode_restart(&restart_fixture(restart_order), Endian::Big).unwrap();
    std::fs::write(dir.join(format!("{CASE}.UNRST")), restart).unwrap();
    let (spec, data) = encode_summary(&summary_fixture(summary_steps), Endian::Big).unwrap();
    std::fs::write(dir.join(format!("{CASE}.SMSPEC")), spec).unwrap();
    std::fs::write(dir.join(format!("{CASE}.UNSMRY")), data).unwrap();
}

#[test]
fn restart_and_summary_merge_by_report_step() {
    let dir = tempfile::tempdir().unwrap();
    // Restart blocks out of order; merging must follow SEQNUM, not position.
    write_binary_case(dir.path(), &[0, 2, 1], 2);

    let result = read_result(dir.path(), &ResultHints::new("opm-flow")).unwrap();
    assert_eq!(result.metadata.backend, "opm-flow");
    assert_eq!(result.metadata.unit_system, CANONICAL_UNITS);
    assert_eq!(result.metadata.source_unit_system, Some(UnitSystem::Field));
    assert_eq!(result.metadata.well_names, vec!["INJ1", "PROD1"]);
    assert_eq!(result.timesteps.len(), 3);

    let steps: Vec<u32> = result.timesteps.iter().map(|t| t.report_step).collect();
    assert_eq!(steps, vec![0, 1, 2]);
    assert!(result.timesteps[0].wells.is_empty());

    let step2 = result.step_by_report(2).unwrap();
    assert_eq!(step2.time_days, 60.0);
    let cells = step2.cells.as_ref().unwrap();
    // 2800 psi
    assert!((cells.pressure_bar[0] - 193.053_2).abs() < 1e-3);
    assert!((cells.oil_saturation[0] - 0.7).abs() < 1e-6);
    let prod = step2.wells.iter().find(|w| w.name == "PROD1").unwrap();
    // 502 STB/day
    assert!((prod.oil_rate_m3_per_day.unwrap() - 79.811_6).abs() < 1e-3);
}

#[test]
fn summary_only_output_uses_request_hints() {
    let dir = tempfile::tempdir().unwrap();
    let (spec, data) = encode_summary(&summary_fixture(3), Endian::Little).unwrap();
    std::fs::write(dir.path().join("RUN.SMSPEC"), spec).unwrap();
    std::fs::write(dir.path().join("RUN.UNSMRY"), data).unwrap();

    let request = samples::two_well_oil_water(3, 2, 1);
    let hints = ResultHints::from_request("replay", "RUN", &request);
    let result = read_result(dir.path(), &hints).unwrap();
    assert_eq!(result.timesteps.len(), 3);
    assert!(result.timesteps.iter().all(|t| t.cells.is_none()));
    assert_eq!(result.metadata.phases, PhaseConfig::oil_water());
}

#[test]
fn empty_directory_is_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let err = read_result(dir.path(), &ResultHints::new("x")).unwrap_err();
    assert!(matches!(err, DecodeError::NoOutput { .. }), "{err}");
}

#[test]
fn grid_mismatch_with_request_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    write_binary_case(dir.path(), &[0, 1], 1);
    let request = samples::two_well_oil_water(4, 4, 1);
    let err = read_result(dir.path(), &ResultHints::from_request("x", CASE, &request)).unwrap_err();
    assert!(err.to_string().contains("request grid is 4x4x1"), "{err}");
}

#[test]
fn summary_without_data_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let (spec, _) = encode_summary(&summary_fixture(1), Endian::Big).unwrap();
    std::fs::write(dir.path().join("CASE.SMSPEC"), spec).unwrap();
    let err = read_result(dir.path(), &ResultHints::new("x")).unwrap_err();
    assert!(err.to_string().contains("UNSMRY"), "{err}");
}

#[test]
fn text_streams_in_strict_si_are_read() {
    let dir = tempfile::tempdir().unwrap();
    let dims = GridDims::new(2, 1, 1);
    let cells: Vec<CellStep> = (0..2)
        .map(|r| CellStep {
            report_step: r,
            time_days: 10.0 * r as f64,
            cells: CellArrays::from_primary(vec![250.0, 249.0], vec![0.3, 0.35], None).unwrap(),
        })
        .collect();
    let mut prod = WellState::named("PROD1");
    prod.oil_rate_m3_per_day = Some(100.0);
    prod.bhp_bar = Some(180.0);
    let wells = vec![WellStep {
        report_step: 1,
        time_days: 10.0,
        wells: vec![prod],
    }];
    std::fs::write(
        dir.path().join("CASE.cells.csv"),
        write_cells_csv(UnitSystem::StrictSi, dims, PhaseConfig::oil_water(), &cells),
    )
    .unwrap();
    std::fs::write(
        dir.path().join("CASE.summary.csv"),
        write_summary_csv(UnitSystem::StrictSi, &wells),
    )
    .unwrap();

    let result = read_result(dir.path(), &ResultHints::new("mrst")).unwrap();
    assert_eq!(result.metadata.source_unit_system, Some(UnitSystem::StrictSi));
    assert_eq!(result.metadata.dims, dims);
    let step = result.step_by_report(1).unwrap();
    assert!((step.time_days - 10.0).abs() < 1e-9);
    let well = &step.wells[0];
    assert!((well.oil_rate_m3_per_day.unwrap() - 100.0).abs() < 1e-9);
    assert!((well.bhp_bar.unwrap() - 180.0).abs() < 1e-9);
    let cells = step.cells.as_ref().unwrap();
    assert!((cells.pressure_bar[1] - 249.0).abs() < 1e-9);
}
