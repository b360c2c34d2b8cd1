#![allow(dead_code)]

use pal_model::*;

/// Three report steps on the request grid with both streams populated.
pub fn sample_result(request: &SimRequest) -> UnifiedResult {
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
        .map(|r| {
            let pressure = (0..n).map(|c| 250.0 - 5.0 * r as f64 + 0.5 * c as f64).collect();
            let swat = (0..n).map(|c| 0.2 + 0.01 * r as f64 + 0.001 * c as f64).collect();
            Timestep {
                report_step: r,
                time_days: 30.0 * r as f64,
                cells: Some(CellArrays::from_primary(pressure, swat, None).unwrap()),
                wells: vec![
                    WellState {
                        water_injection_rate_m3_per_day: Some(300.0),
                        bhp_bar: Some(310.0 - r as f64),
                        ..WellState::named("INJ1")
                    },
                    WellState {
                        oil_rate_m3_per_day: Some(250.0 - 10.0 * r as f64),
                        water_rate_m3_per_day: Some(5.0 * r as f64),
                        bhp_bar: Some(190.0 - r as f64),
                        cumulative_oil_m3: Some(7500.0 * r as f64),
                        ..WellState::named("PROD1")
                    },
                ],
            }
        })
        .collect();
    UnifiedResult::new(metadata, steps).unwrap()
}

pub fn assert_same_values(a: &UnifiedResult, b: &UnifiedResult) {
    assert_eq!(a.timesteps.len(), b.timesteps.len());
    for (x, y) in a.timesteps.iter().zip(&b.timesteps) {
        assert_eq!(x.report_step, y.report_step);
        assert!((x.time_days - y.time_days).abs() < 1e-9);
        let (cx, cy) = (x.cells.as_ref().unwrap(), y.cells.as_ref().unwrap());
        for (p, q) in cx.pressure_bar.iter().zip(&cy.pressure_bar) {
            assert!((p - q).abs() < 1e-9, "{p} vs {q}");
        }
        for w in &x.wells {
            let other = y.wells.iter().find(|o| o.name == w.name).unwrap();
            assert_eq!(w.oil_rate_m3_per_day.is_some(), other.oil_rate_m3_per_day.is_some());
            if let (Some(p), Some(q)) = (w.bhp_bar, other.bhp_bar) {
                assert!((p - q).abs() < 1e-9);
            }
        }
    }
}
