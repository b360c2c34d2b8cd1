use std::path::PathBuf;
use std::sync::Arc;

use pal_app::*;
use pal_backends::*;
use pal_compare::CompareOptions;
use pal_deck::DeckOptions;
use pal_model::samples::two_well_oil_water;
use pal_model::*;

fn recorded(request: &SimRequest) -> UnifiedResult {
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
    let steps = (1..=3u32)
        .map(|r| Timestep {
            report_step: r,
            time_days: 10.0 * r as f64,
            cells: Some(CellArrays::from_primary(vec![250.0 - r as f64; n], vec![0.2 + 0.05 * r as f64; n], None).unwrap()),
            wells: vec![
                WellState {
                    water_injection_rate_m3_per_day: Some(300.0),
                    bhp_bar: Some(280.0),
                    ..WellState::named("INJ1")
                },
                WellState {
                    oil_rate_m3_per_day: Some(150.0 - r as f64),
                    bhp_bar: Some(190.0),
                    ..WellState::named("PROD1")
                },
            ],
        })
        .collect();
    UnifiedResult::new(metadata, steps).unwrap()
}

fn replay_ref(name: &str) -> BackendRef {
    BackendRef::new(BackendCategory::Reference, name)
}

#[test]
fn injected_empty_registry_is_kept() {
    let registry = Arc::new(AdapterRegistry::new());
    let pal = Pal::new(Some(Arc::clone(&registry)));
    assert!(Arc::ptr_eq(pal.registry(), &registry));
    assert!(pal.health().is_empty());

    let err = pal
        .validate(&two_well_oil_water(3, 2, 1), &replay_ref("replay"))
        .unwrap_err();
    assert!(matches!(err, AppError::Registry(RegistryError::NotFound { .. })), "{err}");
}

#[test]
fn default_uses_the_process_registry() {
    let pal = Pal::new(None);
    assert!(Arc::ptr_eq(pal.registry(), &AdapterRegistry::global()));
}

#[test]
fn bootstrap_registers_configured_backends() {
    let config = PalConfig {
        backends: BackendsConfig {
            replays: vec![ReplaySource {
                name: "spe1-recorded".to_string(),
                dir: PathBuf::from("/nonexistent/spe1"),
            }],
            ..BackendsConfig::default()
        },
        ..PalConfig::default()
    };
    let registry = AdapterRegistry::new();
    bootstrap_registry(&config, &registry).unwrap();

    assert_eq!(registry.len(), 3);
    registry.get(BackendCategory::Simulator, "opm-flow").unwrap();
    registry.get(BackendCategory::Simulator, "mrst").unwrap();
    let replay = registry.get(BackendCategory::Reference, "spe1-recorded").unwrap();
    assert_eq!(replay.kind(), BackendKind::Replay);

    let health = registry.health();
    let recorded = health.iter().find(|h| h.name == "spe1-recorded").unwrap();
    assert!(!recorded.available);
}

#[test]
fn disabled_engines_are_not_registered() {
    let config = PalConfig::from_yaml_str("backends:\n  opm_flow: null\n  mrst: null\n").unwrap();
    let registry = AdapterRegistry::new();
    bootstrap_registry(&config, &registry).unwrap();
    assert!(registry.is_empty());
}

#[test]
fn run_blocking_replays_and_compares() {
    let request = two_well_oil_water(3, 2, 1);
    let original = recorded(&request);
    let recording = tempfile::tempdir().unwrap();
    record_result(recording.path(), "BASE", &original).unwrap();

    let registry = Arc::new(AdapterRegistry::new());
    registry.register(
        BackendCategory::Reference,
        "replay",
        Arc::new(ReplayBackend::new(recording.path())),
    );
    let pal = Pal::new(Some(registry));
    assert!(pal.validate(&request, &replay_ref("replay")).unwrap().is_empty());

    let workdir = tempfile::tempdir().unwrap();
    let mut events = 0;
    let replayed = pal
        .run_blocking(
            &request,
            &replay_ref("replay"),
            workdir.path(),
            &CancelToken::new(),
            &mut |_| events += 1,
        )
        .unwrap();
    assert!(events > 0);
    assert_eq!(replayed.timesteps.len(), 3);

    let report = pal
        .compare(&original, &replayed, "fixture", "replay", &CompareOptions::default())
        .unwrap();
    assert_eq!(report.aligned_steps.len(), 3);
    assert_eq!(report.quality, MatchQuality::Excellent);
    assert!(report.aggregate_nrmse < 1e-9);

    let reread = pal
        .read_result(recording.path(), &pal_results::ResultHints::from_request("fixture", "BASE", &request))
        .unwrap();
    assert_eq!(reread.timesteps.len(), 3);
}

#[test]
fn decks_round_trip_through_the_facade() {
    let pal = Pal::new(Some(Arc::new(AdapterRegistry::new())));
    let request = two_well_oil_water(4, 3, 2);
    let deck = pal.generate_deck(&request, &DeckOptions::default()).unwrap();
    assert!(deck.contains("FIELD"));

    let parsed = pal.parse_deck_str(&deck, None).unwrap();
    assert_eq!(parsed.dims(), request.dims());
    assert_eq!(parsed.well_names(), request.well_names());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("CASE.DATA");
    std::fs::write(&path, &deck).unwrap();
    let from_file = pal.parse_deck_file(&path).unwrap();
    assert_eq!(from_file.dims(), request.dims());
}

#[test]
fn gateway_shares_the_facade_registry() {
    let registry = Arc::new(AdapterRegistry::new());
    let pal = Pal::new(Some(Arc::clone(&registry)));
    let workspace = tempfile::tempdir().unwrap();
    let gateway = pal
        .gateway(pal_gateway::GatewayConfig {
            workspace_root: workspace.path().to_path_buf(),
            ..Default::default()
        })
        .unwrap();
    assert!(Arc::ptr_eq(gateway.registry(), &registry));
}

#[test]
fn configured_compare_options_govern_file_comparisons() {
    let request = two_well_oil_water(3, 2, 1);
    let original = recorded(&request);
    let mut shifted = original.clone();
    for step in &mut shifted.timesteps {
        step.time_days += 0.3;
    }
    let dir = tempfile::tempdir().unwrap();
    let (a, b) = (dir.path().join("base.json"), dir.path().join("shifted.json"));
    save_result_json(&a, &original).unwrap();
    save_result_json(&b, &shifted).unwrap();

    let pal = Pal::new(Some(Arc::new(AdapterRegistry::new())));
    let defaults = PalConfig::default();
    let report = pal.compare_files(&a, &b, &defaults.compare).unwrap();
    assert_eq!(report.aligned_steps.len(), 3);
    assert_eq!(report.label_a, "base");

    let strict = PalConfig::from_yaml_str("compare:\n  time_tolerance_days: 0.1\n").unwrap();
    let err = pal.compare_files(&a, &b, &strict.compare).unwrap_err();
    assert!(
        matches!(err, AppError::Compare(pal_compare::CompareError::NoAlignedSteps { .. })),
        "{err}"
    );
}
