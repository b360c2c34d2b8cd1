//! Canonical simulation output.

use pal_core::UnitSystem;
use serde::{Deserialize, Serialize};

use crate::request::{GridDims, PhaseConfig};
use crate::{ModelError, ModelResult};

/// Unit system of every value stored in a [`UnifiedResult`].
pub const CANONICAL_UNITS: UnitSystem = UnitSystem::Metric;

/// Tolerance on `So + Sw + Sg = 1`.
pub const SATURATION_SUM_TOL: f64 = 1e-6;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnifiedResult {
    pub metadata: ResultMetadata,
    pub timesteps: Vec<Timestep>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultMetadata {
    /// Name of the backend that produced the result.
    pub backend: String,
    /// Always [`CANONICAL_UNITS`] once decoded.
    pub unit_system: UnitSystem,
    /// Unit system detected in the raw output, before conversion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_unit_system: Option<UnitSystem>,
    pub dims: GridDims,
    pub phases: PhaseConfig,
    #[serde(default)]
    pub well_names: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Timestep {
    pub report_step: u32,
    pub time_days: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cells: Option<CellArrays>,
    #[serde(default)]
    pub wells: Vec<WellState>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CellArrays {
    pub pressure_bar: Vec<f64>,
    pub water_saturation: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_saturation: Option<Vec<f64>>,
    /// Always derived as `1 - Sw - Sg`.
    pub oil_saturation: Vec<f64>,
}

impl CellArrays {
    /// Build cell arrays from the primary unknowns; oil saturation is derived.
    pub fn from_primary(
        pressure_bar: Vec<f64>,
        water_saturation: Vec<f64>,
        gas_saturation: Option<Vec<f64>>,
    ) -> ModelResult<Self> {
        let n = pressure_bar.len();
        if water_saturation.len() != n {
            return Err(ModelError::Invariant {
                what: format!(
                    "water saturation has {} entries, pressure has {n}",
                    water_saturation.len()
                ),
            });
        }
        if let Some(sg) = &gas_saturation
            && sg.len() != n
        {
            return Err(ModelError::Invariant {
                what: format!("gas saturation has {} entries, pressure has {n}", sg.len()),
            });
        }

        let oil_saturation = match &gas_saturation {
            Some(sg) => water_saturation
                .iter()
                .zip(sg)
                .map(|(sw, sg)| 1.0 - sw - sg)
                .collect(),
            None => water_saturation.iter().map(|sw| 1.0 - sw).collect(),
        };

        Ok(Self {
            pressure_bar,
            water_saturation,
            gas_saturation,
            oil_saturation,
        })
    }

    pub fn len(&self) -> usize {
        self.pressure_bar.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pressure_bar.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WellState {
    pub name: String,
    pub oil_rate_m3_per_day: Option<f64>,
    pub water_rate_m3_per_day: Option<f64>,
    pub gas_rate_m3_per_day: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water_injection_rate_m3_per_day: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_injection_rate_m3_per_day: Option<f64>,
    pub bhp_bar: Option<f64>,
    pub cumulative_oil_m3: Option<f64>,
    pub cumulative_water_m3: Option<f64>,
    pub cumulative_gas_m3: Option<f64>,
}

impl WellState {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl UnifiedResult {
    /// Assemble a result, ordering timesteps by simulation time and checking invariants.
    pub fn new(metadata: ResultMetadata, mut timesteps: Vec<Timestep>) -> ModelResult<Self> {
        timesteps.sort_by(|a, b| {
            a.time_days
                .total_cmp(&b.time_days)
                .then(a.report_step.cmp(&b.report_step))
        });
        let result = Self {
            metadata,
            timesteps,
        };
        result.check_invariants()?;
        Ok(result)
    }

    /// Verify ordering, cell-array lengths and saturation closure.
    pub fn check_invariants(&self) -> ModelResult<()> {
        let n = self.metadata.dims.cell_count();
        let mut last_t = f64::NEG_INFINITY;
        for step in &self.timesteps {
            if !step.time_days.is_finite() || step.time_days < last_t {
                return Err(ModelError::Invariant {
                    what: format!(
                        "timestep {} at t={} days is out of order",
                        step.report_step, step.time_days
                    ),
                });
            }
            last_t = step.time_days;

            let Some(cells) = &step.cells else { continue };
            let sg_len = cells.gas_saturation.as_ref().map(Vec::len).unwrap_or(n);
            if cells.pressure_bar.len() != n
                || cells.water_saturation.len() != n
                || cells.oil_saturation.len() != n
                || sg_len != n
            {
                return Err(ModelError::Invariant {
                    what: format!(
                        "report step {} cell arrays do not have {n} entries",
                        step.report_step
                    ),
                });
            }
            for idx in 0..n {
                let sg = cells.gas_saturation.as_ref().map(|s| s[idx]).unwrap_or(0.0);
                let sum = cells.oil_saturation[idx] + cells.water_saturation[idx] + sg;
                if (sum - 1.0).abs() > SATURATION_SUM_TOL {
                    return Err(ModelError::Invariant {
                        what: format!(
                            "report step {} cell {idx}: saturations sum to {sum}",
                            step.report_step
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn step_by_report(&self, report_step: u32) -> Option<&Timestep> {
        self.timesteps.iter().find(|t| t.report_step == report_step)
    }

    pub fn times_days(&self) -> Vec<f64> {
        self.timesteps.iter().map(|t| t.time_days).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(n: usize) -> ResultMetadata {
        ResultMetadata {
            backend: "test".to_string(),
            unit_system: CANONICAL_UNITS,
            source_unit_system: None,
            dims: GridDims::new(n, 1, 1),
            phases: PhaseConfig::black_oil(),
            well_names: vec![],
        }
    }

    #[test]
    fn oil_saturation_is_derived() {
        let cells =
            CellArrays::from_primary(vec![100.0, 110.0], vec![0.2, 0.3], Some(vec![0.1, 0.0]))
                .unwrap();
        assert!((cells.oil_saturation[0] - 0.7).abs() < 1e-12);
        assert!((cells.oil_saturation[1] - 0.7).abs() < 1e-12);

        let two_phase = CellArrays::from_primary(vec![100.0], vec![0.25], None).unwrap();
        assert!((two_phase.oil_saturation[0] - 0.75).abs() < 1e-12);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let err = CellArrays::from_primary(vec![1.0, 2.0], vec![0.2], None).unwrap_err();
        assert!(err.to_string().contains("water saturation"));
    }

    #[test]
    fn new_sorts_timesteps_by_time() {
        let steps = vec![
            Timestep {
                report_step: 2,
                time_days: 20.0,
                cells: None,
                wells: vec![],
            },
            Timestep {
                report_step: 1,
                time_days: 10.0,
                cells: None,
                wells: vec![],
            },
        ];
        let result = UnifiedResult::new(metadata(2), steps).unwrap();
        assert_eq!(result.times_days(), vec![10.0, 20.0]);
    }

    #[test]
    fn wrong_cell_count_violates_invariant() {
        let cells = CellArrays::from_primary(vec![1.0], vec![0.2], Some(vec![0.1])).unwrap();
        let steps = vec![Timestep {
            report_step: 0,
            time_days: 0.0,
            cells: Some(cells),
            wells: vec![],
        }];
        assert!(UnifiedResult::new(metadata(2), steps).is_err());
    }
}
