use pal_core::{nearly_equal, Tolerances, UnitSystem};
use pal_deck::{generate_deck, parse_deck_str, DeckError, DeckOptions};
use pal_model::*;
use proptest::prelude::*;
use serde_json::Value;

/// Structural equality with numbers compared within text round-trip tolerance.
fn assert_close(a: &Value, b: &Value, path: &str) {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap(), y.as_f64().unwrap());
            assert!(
                nearly_equal(x, y, Tolerances::text_round_trip()),
                "{path}: {x} != {y}"
            );
        }
        (Value::Array(xs), Value::Array(ys)) => {
            assert_eq!(xs.len(), ys.len(), "{path}: length differs");
            for (idx, (x, y)) in xs.iter().zip(ys).enumerate() {
                assert_close(x, y, &format!("{path}[{idx}]"));
            }
        }
        (Value::Object(xs), Value::Object(ys)) => {
            let mut keys: Vec<_> = xs.keys().collect();
            keys.sort();
            let mut other: Vec<_> = ys.keys().collect();
            other.sort();
            assert_eq!(keys, other, "{path}: keys differ");
            for key in keys {
                assert_close(&xs[key], &ys[key], &format!("{path}.{key}"));
            }
        }
        _ => assert_eq!(a, b, "{path}"),
    }
}

fn assert_requests_close(a: &SimRequest, b: &SimRequest) {
    let a = serde_json::to_value(a).unwrap();
    let b = serde_json::to_value(b).unwrap();
    assert_close(&a, &b, "request");
}

fn round_trip(request: &SimRequest, unit_system: UnitSystem) -> SimRequest {
    let text = generate_deck(request, &DeckOptions { unit_system }).unwrap();
    parse_deck_str(&text, None).unwrap_or_else(|e| panic!("{e}\n{text}"))
}

#[test]
fn black_oil_10x10x3_scalar_fields_match_exactly() {
    let request = samples::two_well_black_oil(10, 10, 3);
    let parsed = round_trip(&request, UnitSystem::Field);

    assert_eq!(parsed.dims(), GridDims::new(10, 10, 3));
    assert_eq!(parsed.well_names(), vec!["INJ1", "PROD1"]);
    assert_eq!(parsed.phases, PhaseConfig::black_oil());
    assert_eq!(parsed.title, request.title);
    assert_eq!(parsed.start_date, request.start_date);
    for (a, b) in request.wells.iter().zip(&parsed.wells) {
        assert_eq!(a.kind, b.kind);
        assert_eq!(a.phase, b.phase);
        assert_eq!((a.i, a.j), (b.i, b.j));
        assert_eq!(a.completion, b.completion);
        assert_eq!(a.control.mode, b.control.mode);
    }

    assert_requests_close(&request, &parsed);
}

#[test]
fn oil_water_round_trips_in_every_deck_unit_system() {
    let mut request = samples::two_well_oil_water(4, 3, 2);
    request.properties.ntg = Some(vec![0.9; 24]);
    request.pore_volume_multipliers = Some((0..24).map(|i| 1.0 + 0.1 * (i % 3) as f64).collect());

    for system in [UnitSystem::Field, UnitSystem::Metric, UnitSystem::Lab] {
        let parsed = round_trip(&request, system);
        assert_requests_close(&request, &parsed);
    }
}

#[test]
fn corey_relperm_is_emitted_as_tables() {
    let mut request = samples::two_well_black_oil(2, 2, 2);
    request.relperm = RelPermDef::Corey(CoreyParams::default());
    let parsed = round_trip(&request, UnitSystem::Metric);
    match parsed.relperm {
        RelPermDef::Tables { swof, sgof } => {
            assert_eq!(swof.len(), 11);
            assert_eq!(sgof.map(|t| t.len()), Some(11));
        }
        other => panic!("expected tables, got {other:?}"),
    }
}

#[test]
fn deck_without_unit_keyword_is_metric() {
    let request = samples::two_well_oil_water(2, 2, 1);
    let text = generate_deck(
        &request,
        &DeckOptions {
            unit_system: UnitSystem::Metric,
        },
    )
    .unwrap()
    .replace("\nMETRIC\n", "\n");
    let parsed = parse_deck_str(&text, None).unwrap();
    assert_requests_close(&request, &parsed);
}

#[test]
fn generated_deck_is_parseable_after_validation_failure() {
    // Generation does not validate; a bad completion still round-trips and is
    // caught by validation afterwards.
    let mut request = samples::two_well_oil_water(3, 3, 2);
    request.wells[1].completion = CompletionDef { k1: 1, k2: 3 };
    let parsed = round_trip(&request, UnitSystem::Field);
    let issues = validate_request(&parsed, &ValidationLimits::default());
    assert!(issues
        .iter()
        .any(|i| i.code == IssueCode::CompletionRange && i.severity == Severity::Error));
}

#[test]
fn titles_survive_verbatim() {
    let mut request = samples::two_well_oil_water(2, 2, 1);
    for title in ["", "Case A -- tuned", "Sector / refined"] {
        request.title = title.to_string();
        assert!(validate_request(&request, &ValidationLimits::default()).is_empty());
        let parsed = round_trip(&request, UnitSystem::Metric);
        assert_eq!(parsed.title, title);
    }
}

#[test]
fn titles_a_deck_cannot_carry_are_refused() {
    let mut request = samples::two_well_oil_water(2, 2, 1);
    for title in ["two\nlines", "  padded"] {
        request.title = title.to_string();
        let err = generate_deck(&request, &DeckOptions::default()).unwrap_err();
        assert!(matches!(err, DeckError::Generate { .. }), "{err}");
    }
}

#[test]
fn control_before_first_step_becomes_initial_control() {
    let mut request = samples::two_well_oil_water(3, 2, 1);
    request.schedule.events.insert(
        0,
        ScheduleEvent::Control {
            well: "PROD1".to_string(),
            status: WellStatus::Open,
            control: WellControl {
                mode: ControlMode::Bhp,
                target: 150.0,
                bhp_limit_bar: None,
            },
        },
    );
    let issues = validate_request(&request, &ValidationLimits::default());
    assert!(!has_errors(&issues));
    assert!(issues.iter().any(|i| i.code == IssueCode::InitialControl));

    let parsed = round_trip(&request, UnitSystem::Metric);
    assert_eq!(parsed.schedule.events.len(), request.schedule.events.len() - 1);
    let producer = parsed.well("PROD1").unwrap();
    assert_eq!(producer.control.mode, ControlMode::Bhp);
    assert!((producer.control.target - 150.0).abs() < 1e-9);
}

fn request_strategy() -> impl Strategy<Value = (SimRequest, UnitSystem)> {
    (
        1usize..5,
        1usize..5,
        1usize..4,
        prop::collection::vec(0.05f64..0.35, 1..8),
        1.0f64..5000.0,
        10.0f64..2000.0,
        150.0f64..450.0,
        prop::collection::vec(0.5f64..400.0, 1..6),
        prop_oneof![
            Just(UnitSystem::Field),
            Just(UnitSystem::Metric),
            Just(UnitSystem::Lab)
        ],
        any::<bool>(),
    )
        .prop_map(
            |(nx, ny, nz, poro, perm, rate, pressure, steps, units, gas)| {
                let mut r = if gas {
                    samples::two_well_black_oil(nx, ny, nz)
                } else {
                    samples::two_well_oil_water(nx, ny, nz)
                };
                let n = r.cell_count();
                r.properties.porosity = (0..n).map(|i| poro[i % poro.len()]).collect();
                r.properties.permx_md = (0..n).map(|i| perm * (1.0 + i as f64)).collect();
                r.wells[1].control.target = rate;
                r.equilibration.datum_pressure_bar = pressure;
                r.schedule.events = steps
                    .into_iter()
                    .map(|days| ScheduleEvent::Advance { days })
                    .collect();
                (r, units)
            },
        )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn parse_generate_round_trip((request, units) in request_strategy()) {
        let parsed = round_trip(&request, units);
        prop_assert_eq!(parsed.dims(), request.dims());
        prop_assert_eq!(parsed.well_names(), request.well_names());
        prop_assert_eq!(parsed.schedule.events.len(), request.schedule.events.len());
        assert_requests_close(&request, &parsed);
    }
}
