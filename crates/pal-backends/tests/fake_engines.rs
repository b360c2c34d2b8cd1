//! Shell scripts standing in for the external engines.
#![cfg(unix)]

mod common;

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use pal_backends::*;
use pal_model::samples::two_well_oil_water;

fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn flow(executable: PathBuf, timeout_s: u64) -> OpmFlowBackend {
    OpmFlowBackend::new(OpmFlowConfig {
        executable,
        timeout_s,
        ..OpmFlowConfig::default()
    })
    .unwrap()
}

#[test]
fn flow_output_is_collected_and_parsed() {
    let request = two_well_oil_water(3, 2, 1);
    let fixture = tempfile::tempdir().unwrap();
    record_result(fixture.path(), CASE_NAME, &common::sample_result(&request)).unwrap();

    let bin = tempfile::tempdir().unwrap();
    let exe = script(
        bin.path(),
        "flow",
        &format!(
            "test -f CASE.DATA || exit 3\ngrep -q FIELD CASE.DATA || exit 4\ncp '{}'/* .",
            fixture.path().display()
        ),
    );
    let backend = flow(exe, 30);
    assert!(backend.probe().available);

    let workdir = tempfile::tempdir().unwrap();
    let result = execute(&backend, &request, workdir.path(), &CancelToken::new(), &mut |_| {}).unwrap();
    assert_eq!(result.metadata.backend, "opm-flow");
    common::assert_same_values(&common::sample_result(&request), &result);
}

#[test]
fn non_zero_exit_is_a_failed_run() {
    let bin = tempfile::tempdir().unwrap();
    let exe = script(bin.path(), "flow", "echo 'linear solver failed to converge' >&2\nexit 2");
    let backend = flow(exe, 30);

    let request = two_well_oil_water(3, 2, 1);
    let workdir = tempfile::tempdir().unwrap();
    let raw = backend
        .run(&request, workdir.path(), &CancelToken::new(), &mut |_| {})
        .unwrap();

    assert_eq!(raw.status, RunStatus::Failed);
    assert_eq!(raw.exit_code, Some(2));
    assert!(raw.errors.iter().any(|e| e.contains("failed to converge")), "{:?}", raw.errors);
    assert!(raw.files.iter().any(|f| f.ends_with("CASE.DATA")));
    assert!(matches!(
        backend.parse_result(&raw, &request),
        Err(BackendError::RunFailed { status: RunStatus::Failed, .. })
    ));
}

#[test]
fn slow_engine_times_out() {
    let bin = tempfile::tempdir().unwrap();
    let exe = script(bin.path(), "flow", "exec sleep 30");
    let backend = flow(exe, 1);

    let request = two_well_oil_water(3, 2, 1);
    let workdir = tempfile::tempdir().unwrap();
    let raw = backend
        .run(&request, workdir.path(), &CancelToken::new(), &mut |_| {})
        .unwrap();
    assert_eq!(raw.status, RunStatus::TimedOut);
    assert!(raw.elapsed_s < 20.0);
}

#[test]
fn cancel_kills_running_engine() {
    let bin = tempfile::tempdir().unwrap();
    let exe = script(bin.path(), "flow", "exec sleep 30");
    let backend = flow(exe, 60);

    let token = CancelToken::new();
    let remote = token.clone();
    let canceller = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(200));
        remote.cancel();
    });

    let request = two_well_oil_water(3, 2, 1);
    let workdir = tempfile::tempdir().unwrap();
    let raw = backend.run(&request, workdir.path(), &token, &mut |_| {}).unwrap();
    canceller.join().unwrap();
    assert_eq!(raw.status, RunStatus::Cancelled);
}

#[test]
fn missing_executable_is_reported_before_anything_runs() {
    let backend = flow(PathBuf::from("/definitely/not/flow"), 30);
    assert!(!backend.probe().available);

    let request = two_well_oil_water(3, 2, 1);
    let workdir = tempfile::tempdir().unwrap();
    let err = backend
        .run(&request, workdir.path(), &CancelToken::new(), &mut |_| {})
        .unwrap_err();
    assert!(matches!(err, BackendError::ExecutableNotFound { .. }), "{err}");
}

#[test]
fn mrst_text_streams_are_read_in_strict_si() {
    let bin = tempfile::tempdir().unwrap();
    let body = r#"test -f run_case.m || exit 3
cat > CASE.summary.csv <<'CSV'
# units: SI
report_step,time,well,oil_rate,water_rate,gas_rate,water_injection_rate,gas_injection_rate,bhp,cumulative_oil,cumulative_water,cumulative_gas
1,86400,PROD1,0.001,0,0,0,0,15000000,,,
1,86400,INJ1,0,0,0,0.002,0,30000000,,,
CSV
cat > CASE.cells.csv <<'CSV'
# units: SI
# dims: 2 1 1
# phases: 3
report_step,time,cell,pressure,swat,sgas
1,86400,0,20000000,0.25,
1,86400,1,21000000,0.3,
CSV"#;
    let octave = script(bin.path(), "octave", body);
    let backend = MrstBackend::new(MrstConfig {
        octave,
        ..MrstConfig::default()
    });

    let request = two_well_oil_water(2, 1, 1);
    let workdir = tempfile::tempdir().unwrap();
    let result = execute(&backend, &request, workdir.path(), &CancelToken::new(), &mut |_| {}).unwrap();

    assert!(workdir.path().join(mrst::DRIVER_SCRIPT).is_file());
    assert_eq!(result.metadata.source_unit_system, Some(pal_core::UnitSystem::StrictSi));
    let step = &result.timesteps[0];
    assert!((step.time_days - 1.0).abs() < 1e-9);
    let cells = step.cells.as_ref().unwrap();
    assert!((cells.pressure_bar[0] - 200.0).abs() < 1e-9);
    assert!((cells.oil_saturation[1] - 0.7).abs() < 1e-12);
    let prod = step.wells.iter().find(|w| w.name == "PROD1").unwrap();
    assert!((prod.oil_rate_m3_per_day.unwrap() - 86.4).abs() < 1e-9);
    assert!((prod.bhp_bar.unwrap() - 150.0).abs() < 1e-9);
}
