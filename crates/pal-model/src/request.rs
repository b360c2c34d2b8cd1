//! Simulator-agnostic simulation request.
//!
//! All quantities are canonical (metres, bar, sm³/day, days, kg/m³, mD, cP).
//! Cell-indexed arrays are stored in natural order: I fastest, then J, then K.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimRequest {
    pub title: String,
    pub start_date: NaiveDate,
    pub grid: GridDef,
    pub properties: StaticProperties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pore_volume_multipliers: Option<Vec<f64>>,
    pub phases: PhaseConfig,
    pub pvt: PvtDef,
    pub relperm: RelPermDef,
    pub equilibration: EquilibrationDef,
    #[serde(default)]
    pub wells: Vec<WellDef>,
    #[serde(default)]
    pub schedule: ScheduleDef,
}

impl SimRequest {
    pub fn dims(&self) -> GridDims {
        self.grid.dims
    }

    pub fn cell_count(&self) -> usize {
        self.grid.dims.cell_count()
    }

    pub fn well(&self, name: &str) -> Option<&WellDef> {
        self.wells.iter().find(|w| w.name == name)
    }

    pub fn well_names(&self) -> Vec<String> {
        self.wells.iter().map(|w| w.name.clone()).collect()
    }

    /// Cumulative simulation time at the end of every `Advance` event.
    pub fn report_times_days(&self) -> Vec<f64> {
        let mut t = 0.0;
        self.schedule
            .events
            .iter()
            .filter_map(|e| match e {
                ScheduleEvent::Advance { days } => {
                    t += days;
                    Some(t)
                }
                ScheduleEvent::Control { .. } => None,
            })
            .collect()
    }

    pub fn total_days(&self) -> f64 {
        self.report_times_days().last().copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct GridDims {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
}

impl GridDims {
    pub fn new(nx: usize, ny: usize, nz: usize) -> Self {
        Self { nx, ny, nz }
    }

    /// `None` when `nx * ny * nz` does not fit in a `usize`.
    pub fn checked_cell_count(&self) -> Option<usize> {
        self.nx.checked_mul(self.ny)?.checked_mul(self.nz)
    }

    /// Saturates at `usize::MAX`; run [`crate::validate_request`] before
    /// sizing anything from an untrusted grid.
    pub fn cell_count(&self) -> usize {
        self.checked_cell_count().unwrap_or(usize::MAX)
    }

    pub fn layer_cells(&self) -> usize {
        self.nx.saturating_mul(self.ny)
    }

    /// Natural (0-based) index of the 1-based cell (i, j, k).
    pub fn natural_index(&self, i: usize, j: usize, k: usize) -> usize {
        (i - 1) + (j - 1) * self.nx + (k - 1) * self.nx * self.ny
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GridDef {
    pub dims: GridDims,
    pub geometry: CellGeometry,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum CellGeometry {
    /// Tensor-product grid: one size per column/row/layer and a top depth per column.
    Cartesian {
        dx_m: Vec<f64>,
        dy_m: Vec<f64>,
        dz_m: Vec<f64>,
        /// Top depth of the first layer, one entry per (i, j) column.
        tops_m: Vec<f64>,
    },
    CornerPoint {
        /// 6 * (nx+1) * (ny+1) pillar coordinates.
        coord_m: Vec<f64>,
        /// 8 * nx * ny * nz corner depths.
        zcorn_m: Vec<f64>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StaticProperties {
    pub porosity: Vec<f64>,
    pub permx_md: Vec<f64>,
    pub permy_md: Vec<f64>,
    pub permz_md: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ntg: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PhaseConfig {
    pub oil: bool,
    pub water: bool,
    pub gas: bool,
}

impl PhaseConfig {
    pub fn oil_water() -> Self {
        Self {
            oil: true,
            water: true,
            gas: false,
        }
    }

    pub fn black_oil() -> Self {
        Self {
            oil: true,
            water: true,
            gas: true,
        }
    }

    pub fn phase_count(&self) -> usize {
        [self.oil, self.water, self.gas].iter().filter(|p| **p).count()
    }

    pub fn is_three_phase(&self) -> bool {
        self.oil && self.water && self.gas
    }

    /// Phase indicator code written to restart headers
    /// (1 oil, 2 water, 3 oil/water, 4 gas, 5 oil/gas, 6 gas/water, 7 all three).
    pub fn ecl_code(&self) -> i32 {
        (self.oil as i32) + 2 * (self.water as i32) + 4 * (self.gas as i32)
    }

    pub fn from_ecl_code(code: i32) -> Option<Self> {
        if !(1..=7).contains(&code) {
            return None;
        }
        Some(Self {
            oil: code & 1 != 0,
            water: code & 2 != 0,
            gas: code & 4 != 0,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PvtDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water: Option<WaterPvt>,
    /// Dead-oil table (PVDO).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oil: Option<Vec<PvdoRow>>,
    /// Dry-gas table (PVDG).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<Vec<PvdgRow>>,
    pub surface_density: SurfaceDensity,
    pub rock: RockDef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WaterPvt {
    pub ref_pressure_bar: f64,
    pub bw: f64,
    pub compressibility_per_bar: f64,
    pub viscosity_cp: f64,
    pub viscosibility_per_bar: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PvdoRow {
    pub pressure_bar: f64,
    pub bo: f64,
    pub viscosity_cp: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PvdgRow {
    pub pressure_bar: f64,
    /// Reservoir m³ per surface m³.
    pub bg: f64,
    pub viscosity_cp: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SurfaceDensity {
    pub oil_kg_m3: f64,
    pub water_kg_m3: f64,
    pub gas_kg_m3: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RockDef {
    pub ref_pressure_bar: f64,
    pub compressibility_per_bar: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum RelPermDef {
    Tables {
        swof: Vec<SwofRow>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sgof: Option<Vec<SgofRow>>,
    },
    Corey(CoreyParams),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SwofRow {
    pub sw: f64,
    pub krw: f64,
    pub krow: f64,
    pub pcow_bar: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SgofRow {
    pub sg: f64,
    pub krg: f64,
    pub krog: f64,
    pub pcog_bar: f64,
}

/// Simplified Corey-type parametrisation used when full tables are absent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CoreyParams {
    /// Connate water saturation.
    pub swc: f64,
    /// Residual oil saturation to water.
    pub sorw: f64,
    /// Critical gas saturation.
    pub sgc: f64,
    /// Residual oil saturation to gas.
    pub sorg: f64,
    pub nw: f64,
    pub now: f64,
    pub ng: f64,
    pub nog: f64,
    pub krw_max: f64,
    pub kro_max: f64,
    pub krg_max: f64,
}

impl Default for CoreyParams {
    fn default() -> Self {
        Self {
            swc: 0.2,
            sorw: 0.2,
            sgc: 0.05,
            sorg: 0.1,
            nw: 2.0,
            now: 2.0,
            ng: 2.0,
            nog: 2.0,
            krw_max: 0.6,
            kro_max: 1.0,
            krg_max: 0.8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EquilibrationDef {
    pub datum_depth_m: f64,
    pub datum_pressure_bar: f64,
    pub woc_depth_m: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goc_depth_m: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum WellKind {
    Producer,
    Injector,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Phase {
    Oil,
    Water,
    Gas,
}

impl Phase {
    pub fn deck_name(self) -> &'static str {
        match self {
            Self::Oil => "OIL",
            Self::Water => "WATER",
            Self::Gas => "GAS",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum WellStatus {
    Open,
    Shut,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ControlMode {
    OilRate,
    WaterRate,
    GasRate,
    LiquidRate,
    /// Injector surface rate of the injected phase.
    SurfaceRate,
    Bhp,
}

impl ControlMode {
    pub fn valid_for(self, kind: WellKind) -> bool {
        match kind {
            WellKind::Producer => !matches!(self, Self::SurfaceRate),
            WellKind::Injector => matches!(self, Self::SurfaceRate | Self::Bhp),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WellControl {
    pub mode: ControlMode,
    /// Rate target in sm³/day, or pressure in bar for `Bhp`.
    pub target: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bhp_limit_bar: Option<f64>,
}

/// Single completion interval, 1-based layer indices, inclusive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletionDef {
    pub k1: usize,
    pub k2: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WellDef {
    pub name: String,
    pub group: String,
    /// 1-based column index.
    pub i: usize,
    /// 1-based row index.
    pub j: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_depth_m: Option<f64>,
    pub kind: WellKind,
    pub phase: Phase,
    pub completion: CompletionDef,
    pub status: WellStatus,
    pub control: WellControl,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScheduleDef {
    #[serde(default)]
    pub events: Vec<ScheduleEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ScheduleEvent {
    Advance {
        days: f64,
    },
    Control {
        well: String,
        status: WellStatus,
        control: WellControl,
    },
}
