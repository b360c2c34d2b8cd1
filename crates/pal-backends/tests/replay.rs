mod common;

use pal_backends::*;
use pal_model::samples::two_well_oil_water;

#[test]
fn recorded_result_replays() {
    let request = two_well_oil_water(3, 2, 1);
    let original = common::sample_result(&request);

    let recording = tempfile::tempdir().unwrap();
    let written = record_result(recording.path(), "BASE", &original).unwrap();
    assert_eq!(written.len(), 2);

    let backend = ReplayBackend::new(recording.path());
    let workdir = tempfile::tempdir().unwrap();
    let mut stages = Vec::new();
    let replayed = execute(
        &backend,
        &request,
        workdir.path(),
        &CancelToken::new(),
        &mut |e: RunProgressEvent| stages.push(e.stage),
    )
    .unwrap();

    assert_eq!(replayed.metadata.backend, "replay");
    assert_eq!(replayed.metadata.dims, request.dims());
    common::assert_same_values(&original, &replayed);
    assert_eq!(stages.first(), Some(&RunStage::WritingInput));
    assert_eq!(stages.last(), Some(&RunStage::Done));
    assert!(stages.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn missing_recording_is_an_error() {
    let request = two_well_oil_water(3, 2, 1);
    let workdir = tempfile::tempdir().unwrap();
    let backend = ReplayBackend::new(workdir.path().join("absent"));
    let err = execute(&backend, &request, workdir.path(), &CancelToken::new(), &mut |_| {}).unwrap_err();
    assert!(matches!(err, BackendError::MissingRecording { .. }), "{err}");
}

#[test]
fn invalid_request_never_runs() {
    let mut request = two_well_oil_water(3, 2, 1);
    request.wells[1].completion.k2 = 4;

    let workdir = tempfile::tempdir().unwrap();
    let backend = ReplayBackend::new(workdir.path().join("absent"));
    let mut events = 0;
    let err = execute(&backend, &request, workdir.path(), &CancelToken::new(), &mut |_| events += 1).unwrap_err();

    match err {
        BackendError::Validation(issues) => assert!(pal_model::has_errors(&issues)),
        other => panic!("expected validation failure, got {other}"),
    }
    assert_eq!(events, 0);
}

#[test]
fn cancelled_replay_is_not_parsed() {
    let request = two_well_oil_water(3, 2, 1);
    let recording = tempfile::tempdir().unwrap();
    record_result(recording.path(), "BASE", &common::sample_result(&request)).unwrap();

    let token = CancelToken::new();
    token.cancel();
    let workdir = tempfile::tempdir().unwrap();
    let backend = ReplayBackend::new(recording.path());
    let err = execute(&backend, &request, workdir.path(), &token, &mut |_| {}).unwrap_err();
    assert_eq!(err.run_status(), Some(RunStatus::Cancelled));
}
