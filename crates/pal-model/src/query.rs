//! Query helpers for extracting series from a unified result.

use crate::report::{CellField, WellSignal};
use crate::result::{CellArrays, UnifiedResult, WellState};
use crate::{ModelError, ModelResult};

/// Summary of a result's time range and content.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSummary {
    pub time_range_days: (f64, f64),
    pub timestep_count: usize,
    pub steps_with_cells: usize,
    pub well_count: usize,
}

pub fn summarize(result: &UnifiedResult) -> ModelResult<ResultSummary> {
    let (Some(first), Some(last)) = (result.timesteps.first(), result.timesteps.last()) else {
        return Err(ModelError::Invariant {
            what: "result has no timesteps".to_string(),
        });
    };

    Ok(ResultSummary {
        time_range_days: (first.time_days, last.time_days),
        timestep_count: result.timesteps.len(),
        steps_with_cells: result
            .timesteps
            .iter()
            .filter(|t| t.cells.is_some())
            .count(),
        well_count: list_well_names(result).len(),
    })
}

/// All well names seen in any timestep, in first-seen order.
pub fn list_well_names(result: &UnifiedResult) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for step in &result.timesteps {
        for well in &step.wells {
            if !names.contains(&well.name) {
                names.push(well.name.clone());
            }
        }
    }
    names
}

pub fn well_value(state: &WellState, signal: WellSignal) -> Option<f64> {
    match signal {
        WellSignal::OilRate => state.oil_rate_m3_per_day,
        WellSignal::WaterRate => state.water_rate_m3_per_day,
        WellSignal::GasRate => state.gas_rate_m3_per_day,
        WellSignal::WaterInjectionRate => state.water_injection_rate_m3_per_day,
        WellSignal::GasInjectionRate => state.gas_injection_rate_m3_per_day,
        WellSignal::Bhp => state.bhp_bar,
    }
}

pub fn cell_values(cells: &CellArrays, field: CellField) -> Option<&[f64]> {
    match field {
        CellField::Pressure => Some(&cells.pressure_bar),
        CellField::WaterSaturation => Some(&cells.water_saturation),
        CellField::GasSaturation => cells.gas_saturation.as_deref(),
        CellField::OilSaturation => Some(&cells.oil_saturation),
    }
}

/// Extract the (time, value) series of one well signal.
pub fn well_series(result: &UnifiedResult, well: &str, signal: WellSignal) -> Vec<(f64, f64)> {
    result
        .timesteps
        .iter()
        .filter_map(|step| {
            let state = step.wells.iter().find(|w| w.name == well)?;
            well_value(state, signal).map(|v| (step.time_days, v))
        })
        .collect()
}

/// Extract the (time, value) series of one cell (0-based natural index).
pub fn cell_series(
    result: &UnifiedResult,
    cell: usize,
    field: CellField,
) -> ModelResult<Vec<(f64, f64)>> {
    let n = result.metadata.dims.cell_count();
    if cell >= n {
        return Err(ModelError::Invariant {
            what: format!("cell index {cell} outside grid of {n} cells"),
        });
    }

    Ok(result
        .timesteps
        .iter()
        .filter_map(|step| {
            let cells = step.cells.as_ref()?;
            let values = cell_values(cells, field)?;
            values.get(cell).map(|v| (step.time_days, *v))
        })
        .collect())
}

/// Parse a signal name as used on the command line and HTTP queries.
pub fn parse_signal(name: &str) -> ModelResult<WellSignal> {
    match name.to_ascii_lowercase().as_str() {
        "oil_rate" | "wopr" => Ok(WellSignal::OilRate),
        "water_rate" | "wwpr" => Ok(WellSignal::WaterRate),
        "gas_rate" | "wgpr" => Ok(WellSignal::GasRate),
        "water_injection_rate" | "wwir" => Ok(WellSignal::WaterInjectionRate),
        "gas_injection_rate" | "wgir" => Ok(WellSignal::GasInjectionRate),
        "bhp" | "wbhp" => Ok(WellSignal::Bhp),
        other => Err(ModelError::Invariant {
            what: format!("unknown well signal: {other}"),
        }),
    }
}
