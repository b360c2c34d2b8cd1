//! Numerical agreement between two independently produced results.
//!
//! Timesteps are paired by simulation time, cells by their (i, j, k)
//! position within the grid extent both results share, and wells by name.
//! Anything present on one side only is left out of the metrics and listed
//! in the report.

pub mod align;
pub mod metrics;

use pal_model::query::{cell_values, list_well_names, well_value};
use pal_model::{
    CellField, ComparisonReport, FieldMetrics, GridDims, MatchQuality, SignalMetrics, UnifiedResult, WellMetrics,
    WellSignal,
};
use serde::{Deserialize, Serialize};

use crate::align::align;
use crate::metrics::Samples;

pub type CompareResult<T> = Result<T, CompareError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompareError {
    #[error("Invalid time tolerance: {value} days")]
    InvalidTolerance { value: f64 },

    #[error(
        "Match thresholds must be positive and increasing: excellent {excellent}, good {good}, acceptable {acceptable}"
    )]
    InvalidThresholds {
        excellent: f64,
        good: f64,
        acceptable: f64,
    },

    #[error("No timesteps of '{label_a}' and '{label_b}' lie within {tolerance_days} days of each other")]
    NoAlignedSteps {
        label_a: String,
        label_b: String,
        tolerance_days: f64,
    },

    #[error("'{label_a}' and '{label_b}' share no cell field or well signal")]
    NothingToCompare { label_a: String, label_b: String },
}

/// Upper NRMSE bounds of each verdict; anything above `acceptable` is poor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchThresholds {
    pub excellent: f64,
    pub good: f64,
    pub acceptable: f64,
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            excellent: 0.02,
            good: 0.05,
            acceptable: 0.15,
        }
    }
}

impl MatchThresholds {
    pub fn validate(&self) -> CompareResult<()> {
        let ordered = 0.0 < self.excellent && self.excellent <= self.good && self.good <= self.acceptable;
        if ordered && self.acceptable.is_finite() {
            Ok(())
        } else {
            Err(CompareError::InvalidThresholds {
                excellent: self.excellent,
                good: self.good,
                acceptable: self.acceptable,
            })
        }
    }

    pub fn classify(&self, nrmse: f64) -> MatchQuality {
        if nrmse < self.excellent {
            MatchQuality::Excellent
        } else if nrmse < self.good {
            MatchQuality::Good
        } else if nrmse < self.acceptable {
            MatchQuality::Acceptable
        } else {
            MatchQuality::Poor
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareOptions {
    pub time_tolerance_days: f64,
    pub thresholds: MatchThresholds,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            time_tolerance_days: 0.5,
            thresholds: MatchThresholds::default(),
        }
    }
}

impl CompareOptions {
    pub fn validate(&self) -> CompareResult<()> {
        if !(self.time_tolerance_days >= 0.0 && self.time_tolerance_days.is_finite()) {
            return Err(CompareError::InvalidTolerance {
                value: self.time_tolerance_days,
            });
        }
        self.thresholds.validate()
    }
}

const CELL_FIELDS: [CellField; 4] = [
    CellField::Pressure,
    CellField::WaterSaturation,
    CellField::GasSaturation,
    CellField::OilSaturation,
];

/// Natural-order index pairs of the cells inside both grids.
fn common_cells(a: GridDims, b: GridDims) -> Vec<(usize, usize)> {
    let (nx, ny, nz) = (a.nx.min(b.nx), a.ny.min(b.ny), a.nz.min(b.nz));
    let mut pairs = Vec::with_capacity(nx * ny * nz);
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                pairs.push((i + a.nx * (j + a.ny * k), i + b.nx * (j + b.ny * k)));
            }
        }
    }
    pairs
}

/// Compare `b` against `a`.
///
/// NRMSE, MAE and the verdict do not change when the two sides are swapped;
/// R² is computed against `a`.
pub fn compare(
    a: &UnifiedResult,
    b: &UnifiedResult,
    label_a: &str,
    label_b: &str,
    options: &CompareOptions,
) -> CompareResult<ComparisonReport> {
    options.validate()?;
    let tolerance = options.time_tolerance_days;
    let mut warnings = Vec::new();

    let alignment = align(&a.timesteps, &b.timesteps, tolerance);
    if alignment.pairs.is_empty() {
        return Err(CompareError::NoAlignedSteps {
            label_a: label_a.to_string(),
            label_b: label_b.to_string(),
            tolerance_days: tolerance,
        });
    }
    let unmatched_a_days: Vec<f64> = alignment.unmatched_a.iter().map(|&i| a.timesteps[i].time_days).collect();
    let unmatched_b_days: Vec<f64> = alignment.unmatched_b.iter().map(|&j| b.timesteps[j].time_days).collect();
    for (label, days) in [(label_a, &unmatched_a_days), (label_b, &unmatched_b_days)] {
        if !days.is_empty() {
            tracing::warn!(label, dropped = days.len(), "timesteps without a partner");
            warnings.push(format!("{} timesteps of '{label}' have no partner within {tolerance} days", days.len()));
        }
    }

    let (dims_a, dims_b) = (a.metadata.dims, b.metadata.dims);
    let cells = common_cells(dims_a, dims_b);
    let cells_only_in_a = dims_a.cell_count() - cells.len();
    let cells_only_in_b = dims_b.cell_count() - cells.len();
    if dims_a != dims_b {
        warnings.push(format!(
            "grids differ ({}x{}x{} vs {}x{}x{}); {} common cells compared",
            dims_a.nx,
            dims_a.ny,
            dims_a.nz,
            dims_b.nx,
            dims_b.ny,
            dims_b.nz,
            cells.len()
        ));
    }

    let mut fields = Vec::new();
    for field in CELL_FIELDS {
        let mut samples = Samples::new();
        for &(i, j) in &alignment.pairs {
            let (Some(ca), Some(cb)) = (&a.timesteps[i].cells, &b.timesteps[j].cells) else {
                continue;
            };
            let (Some(va), Some(vb)) = (cell_values(ca, field), cell_values(cb, field)) else {
                continue;
            };
            for &(ia, ib) in &cells {
                if let (Some(x), Some(y)) = (va.get(ia), vb.get(ib)) {
                    samples.push(*x, *y);
                }
            }
        }
        if let Some(m) = samples.agreement() {
            fields.push(FieldMetrics {
                field,
                nrmse: m.nrmse,
                mae: m.mae,
                max_abs_error: m.max_abs_error,
                samples: m.samples,
            });
        }
    }

    let names_a = list_well_names(a);
    let names_b = list_well_names(b);
    let wells_only_in_a: Vec<String> = names_a.iter().filter(|n| !names_b.contains(n)).cloned().collect();
    let wells_only_in_b: Vec<String> = names_b.iter().filter(|n| !names_a.contains(n)).cloned().collect();
    if !wells_only_in_a.is_empty() || !wells_only_in_b.is_empty() {
        warnings.push(format!(
            "wells excluded: only in '{label_a}': {:?}, only in '{label_b}': {:?}",
            wells_only_in_a, wells_only_in_b
        ));
    }

    let mut wells = Vec::new();
    for name in names_a.iter().filter(|n| names_b.contains(n)) {
        let mut signals = Vec::new();
        for signal in WellSignal::ALL {
            let mut samples = Samples::new();
            for &(i, j) in &alignment.pairs {
                let wa = a.timesteps[i].wells.iter().find(|w| &w.name == name);
                let wb = b.timesteps[j].wells.iter().find(|w| &w.name == name);
                if let (Some(x), Some(y)) = (wa.and_then(|w| well_value(w, signal)), wb.and_then(|w| well_value(w, signal))) {
                    samples.push(x, y);
                }
            }
            if let Some(m) = samples.agreement() {
                signals.push(SignalMetrics {
                    signal,
                    nrmse: m.nrmse,
                    mae: m.mae,
                    r_squared: m.r_squared,
                    samples: m.samples,
                });
            }
        }
        if !signals.is_empty() {
            wells.push(WellMetrics {
                well: name.clone(),
                signals,
            });
        }
    }

    let nrmses: Vec<f64> = fields
        .iter()
        .map(|f| f.nrmse)
        .chain(wells.iter().flat_map(|w| w.signals.iter().map(|s| s.nrmse)))
        .collect();
    if nrmses.is_empty() {
        return Err(CompareError::NothingToCompare {
            label_a: label_a.to_string(),
            label_b: label_b.to_string(),
        });
    }
    let aggregate_nrmse = nrmses.iter().sum::<f64>() / nrmses.len() as f64;
    let quality = options.thresholds.classify(aggregate_nrmse);
    tracing::info!(label_a, label_b, aggregate_nrmse, %quality, "comparison finished");

    Ok(ComparisonReport {
        label_a: label_a.to_string(),
        label_b: label_b.to_string(),
        time_tolerance_days: tolerance,
        aligned_steps: alignment.steps(&a.timesteps, &b.timesteps),
        unmatched_a_days,
        unmatched_b_days,
        fields,
        wells,
        wells_only_in_a,
        wells_only_in_b,
        cells_only_in_a,
        cells_only_in_b,
        aggregate_nrmse,
        quality,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_classify_at_upper_bounds() {
        let t = MatchThresholds::default();
        assert_eq!(t.classify(0.0), MatchQuality::Excellent);
        assert_eq!(t.classify(0.02), MatchQuality::Good);
        assert_eq!(t.classify(0.149), MatchQuality::Acceptable);
        assert_eq!(t.classify(0.5), MatchQuality::Poor);
    }

    #[test]
    fn unordered_thresholds_are_rejected() {
        let t = MatchThresholds {
            excellent: 0.1,
            good: 0.05,
            acceptable: 0.2,
        };
        assert!(t.validate().is_err());
        let bad = CompareOptions {
            time_tolerance_days: f64::NAN,
            ..CompareOptions::default()
        };
        assert!(matches!(bad.validate(), Err(CompareError::InvalidTolerance { .. })));
    }

    #[test]
    fn common_cells_follow_shared_extent() {
        let pairs = common_cells(GridDims::new(3, 2, 1), GridDims::new(2, 2, 2));
        assert_eq!(pairs, vec![(0, 0), (1, 1), (3, 2), (4, 3)]);
    }
}
