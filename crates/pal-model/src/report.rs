//! Agreement report between two independently produced results.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MatchQuality {
    Excellent,
    Good,
    Acceptable,
    Poor,
}

impl fmt::Display for MatchQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Excellent => write!(f, "excellent"),
            Self::Good => write!(f, "good"),
            Self::Acceptable => write!(f, "acceptable"),
            Self::Poor => write!(f, "poor"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CellField {
    Pressure,
    WaterSaturation,
    GasSaturation,
    OilSaturation,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WellSignal {
    OilRate,
    WaterRate,
    GasRate,
    WaterInjectionRate,
    GasInjectionRate,
    Bhp,
}

impl WellSignal {
    pub const ALL: [WellSignal; 6] = [
        WellSignal::OilRate,
        WellSignal::WaterRate,
        WellSignal::GasRate,
        WellSignal::WaterInjectionRate,
        WellSignal::GasInjectionRate,
        WellSignal::Bhp,
    ];
}

/// Pair of timesteps matched within the time tolerance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlignedStep {
    pub time_a_days: f64,
    pub time_b_days: f64,
    pub report_step_a: u32,
    pub report_step_b: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldMetrics {
    pub field: CellField,
    pub nrmse: f64,
    pub mae: f64,
    pub max_abs_error: f64,
    pub samples: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignalMetrics {
    pub signal: WellSignal,
    pub nrmse: f64,
    pub mae: f64,
    pub r_squared: f64,
    pub samples: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WellMetrics {
    pub well: String,
    pub signals: Vec<SignalMetrics>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComparisonReport {
    pub label_a: String,
    pub label_b: String,
    pub time_tolerance_days: f64,
    pub aligned_steps: Vec<AlignedStep>,
    /// Times (days) of steps in A with no partner in B.
    pub unmatched_a_days: Vec<f64>,
    pub unmatched_b_days: Vec<f64>,
    pub fields: Vec<FieldMetrics>,
    pub wells: Vec<WellMetrics>,
    pub wells_only_in_a: Vec<String>,
    pub wells_only_in_b: Vec<String>,
    /// Cells beyond the common grid extent, excluded from cell metrics.
    pub cells_only_in_a: usize,
    pub cells_only_in_b: usize,
    pub aggregate_nrmse: f64,
    pub quality: MatchQuality,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl ComparisonReport {
    pub fn field(&self, field: CellField) -> Option<&FieldMetrics> {
        self.fields.iter().find(|f| f.field == field)
    }

    pub fn well(&self, name: &str) -> Option<&WellMetrics> {
        self.wells.iter().find(|w| w.well == name)
    }
}

impl WellMetrics {
    pub fn signal(&self, signal: WellSignal) -> Option<&SignalMetrics> {
        self.signals.iter().find(|s| s.signal == signal)
    }
}
