use pal_core::UnitSystem;
use pal_model::*;
use pal_results::*;

fn result() -> UnifiedResult {
    let metadata = ResultMetadata {
        backend: "replay".to_string(),
        unit_system: CANONICAL_UNITS,
        source_unit_system: Some(UnitSystem::Field),
        dims: GridDims::new(2, 1, 1),
        phases: PhaseConfig::oil_water(),
        well_names: vec!["PROD1".to_string()],
    };
    let steps = (0..3)
        .map(|r| Timestep {
            report_step: r,
            time_days: 15.0 * r as f64,
            cells: Some(CellArrays::from_primary(vec![200.0, 201.0], vec![0.2, 0.25], None).unwrap()),
            wells: vec![WellState {
                oil_rate_m3_per_day: Some(50.0),
                ..WellState::named("PROD1")
            }],
        })
        .collect();
    UnifiedResult::new(metadata, steps).unwrap()
}

#[test]
fn save_and_load_result() {
    let dir = tempfile::tempdir().unwrap();
    let store = ResultStore::new(dir.path().join("results")).unwrap();
    let original = result();

    assert!(!store.has_result("job-1"));
    let manifest = store.save("job-1", Some("abc123"), &original).unwrap();
    assert_eq!(manifest.timestep_count, 3);
    assert!(store.has_result("job-1"));

    let loaded = store.load("job-1").unwrap();
    assert_eq!(loaded, original);
    let manifest = store.load_manifest("job-1").unwrap();
    assert_eq!(manifest.request_fingerprint.as_deref(), Some("abc123"));
}

#[test]
fn missing_job_is_not_found_and_delete_removes() {
    let dir = tempfile::tempdir().unwrap();
    let store = ResultStore::new(dir.path().to_path_buf()).unwrap();
    assert!(matches!(store.load("nope"), Err(StoreError::NotFound { .. })));

    store.save("a", None, &result()).unwrap();
    store.save("b", None, &result()).unwrap();
    assert_eq!(store.list().unwrap().len(), 2);

    store.delete("a").unwrap();
    let remaining: Vec<String> = store.list().unwrap().into_iter().map(|m| m.job_id).collect();
    assert_eq!(remaining, vec!["b"]);
}
