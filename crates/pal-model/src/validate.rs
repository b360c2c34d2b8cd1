//! Structural request validation.
//!
//! Validation never runs a simulator. It collects every issue it finds instead
//! of stopping at the first one, so a caller can correct a request in one pass.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::request::{
    CellGeometry, ControlMode, Phase, RelPermDef, ScheduleEvent, SimRequest, WellControl,
    WellDef, WellKind,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    Title,
    GridDims,
    CellCeiling,
    Geometry,
    ArrayLength,
    ValueRange,
    PhaseConfig,
    MissingTable,
    TableOrder,
    DuplicateWell,
    WellBounds,
    CompletionRange,
    ControlMode,
    UnknownWell,
    EmptySchedule,
    NonPositiveTimestep,
    InitialControl,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub code: IssueCode,
    /// Dotted location of the offending field, e.g. `wells[1].completion`.
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn error(code: IssueCode, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn warning(code: IssueCode, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sev = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{sev} [{:?}] {}: {}", self.code, self.path, self.message)
    }
}

/// True when any issue forbids running the request.
pub fn has_errors(issues: &[ValidationIssue]) -> bool {
    issues.iter().any(|i| i.severity == Severity::Error)
}

/// Backend-specific limits applied on top of the structural checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationLimits {
    pub max_cells: usize,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_cells: 10_000_000,
        }
    }
}

/// A deck carries its title as one verbatim line that readers trim.
pub fn title_fits_deck(title: &str) -> bool {
    !title.contains(['\n', '\r']) && title.trim() == title
}

pub fn validate_request(request: &SimRequest, limits: &ValidationLimits) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let dims = request.dims();

    if !title_fits_deck(&request.title) {
        issues.push(ValidationIssue::error(
            IssueCode::Title,
            "title",
            "title must be a single line without leading or trailing whitespace",
        ));
    }

    if dims.nx == 0 || dims.ny == 0 || dims.nz == 0 {
        issues.push(ValidationIssue::error(
            IssueCode::GridDims,
            "grid.dims",
            format!("grid dimensions must be positive, got {}x{}x{}", dims.nx, dims.ny, dims.nz),
        ));
        // Every other check depends on a usable cell count.
        return issues;
    }

    match dims.checked_cell_count() {
        Some(n) if n <= limits.max_cells => {}
        Some(n) => {
            issues.push(ValidationIssue::error(
                IssueCode::CellCeiling,
                "grid.dims",
                format!("{n} cells exceeds backend ceiling of {}", limits.max_cells),
            ));
            return issues;
        }
        None => {
            issues.push(ValidationIssue::error(
                IssueCode::CellCeiling,
                "grid.dims",
                format!(
                    "{}x{}x{} cells overflows the addressable cell count",
                    dims.nx, dims.ny, dims.nz
                ),
            ));
            return issues;
        }
    }

    validate_geometry(request, &mut issues);
    validate_properties(request, &mut issues);
    validate_fluids(request, &mut issues);

    let mut names = HashSet::new();
    for (idx, well) in request.wells.iter().enumerate() {
        if !names.insert(well.name.as_str()) {
            issues.push(ValidationIssue::error(
                IssueCode::DuplicateWell,
                format!("wells[{idx}].name"),
                format!("well '{}' is defined more than once", well.name),
            ));
        }
        validate_well(request, idx, well, &mut issues);
    }

    validate_schedule(request, &mut issues);
    issues
}

fn check_len(
    issues: &mut Vec<ValidationIssue>,
    path: &str,
    values: &[f64],
    expected: usize,
) -> bool {
    if values.len() != expected {
        issues.push(ValidationIssue::error(
            IssueCode::ArrayLength,
            path,
            format!("expected {expected} entries, found {}", values.len()),
        ));
        return false;
    }
    true
}

fn check_range(
    issues: &mut Vec<ValidationIssue>,
    path: &str,
    values: &[f64],
    min: f64,
    max: f64,
) {
    if let Some((idx, v)) = values
        .iter()
        .enumerate()
        .find(|(_, v)| !v.is_finite() || **v < min || **v > max)
    {
        issues.push(ValidationIssue::error(
            IssueCode::ValueRange,
            format!("{path}[{idx}]"),
            format!("value {v} outside [{min}, {max}]"),
        ));
    }
}

fn validate_geometry(request: &SimRequest, issues: &mut Vec<ValidationIssue>) {
    let dims = request.dims();
    match &request.grid.geometry {
        CellGeometry::Cartesian {
            dx_m,
            dy_m,
            dz_m,
            tops_m,
        } => {
            for (path, values, expected) in [
                ("grid.geometry.dx_m", dx_m, dims.nx),
                ("grid.geometry.dy_m", dy_m, dims.ny),
                ("grid.geometry.dz_m", dz_m, dims.nz),
            ] {
                if check_len(issues, path, values, expected) {
                    check_range(issues, path, values, f64::MIN_POSITIVE, f64::MAX);
                }
            }
            if check_len(issues, "grid.geometry.tops_m", tops_m, dims.layer_cells()) {
                check_range(issues, "grid.geometry.tops_m", tops_m, f64::MIN, f64::MAX);
            }
        }
        CellGeometry::CornerPoint { coord_m, zcorn_m } => {
            let coord_len = dims
                .nx
                .checked_add(1)
                .zip(dims.ny.checked_add(1))
                .and_then(|(px, py)| px.checked_mul(py)?.checked_mul(6));
            let zcorn_len = dims.checked_cell_count().and_then(|n| n.checked_mul(8));
            let (Some(coord_len), Some(zcorn_len)) = (coord_len, zcorn_len) else {
                issues.push(ValidationIssue::error(
                    IssueCode::CellCeiling,
                    "grid.geometry",
                    "corner-point arrays for this grid overflow the addressable length",
                ));
                return;
            };
            if check_len(issues, "grid.geometry.coord_m", coord_m, coord_len) {
                check_range(issues, "grid.geometry.coord_m", coord_m, f64::MIN, f64::MAX);
            }
            if check_len(issues, "grid.geometry.zcorn_m", zcorn_m, zcorn_len) {
                check_range(issues, "grid.geometry.zcorn_m", zcorn_m, f64::MIN, f64::MAX);
            }
        }
    }
}

fn validate_properties(request: &SimRequest, issues: &mut Vec<ValidationIssue>) {
    let n = request.cell_count();
    let props = &request.properties;

    if check_len(issues, "properties.porosity", &props.porosity, n) {
        check_range(issues, "properties.porosity", &props.porosity, 0.0, 1.0);
    }
    for (path, values) in [
        ("properties.permx_md", &props.permx_md),
        ("properties.permy_md", &props.permy_md),
        ("properties.permz_md", &props.permz_md),
    ] {
        if check_len(issues, path, values, n) {
            check_range(issues, path, values, 0.0, f64::MAX);
        }
    }
    if let Some(ntg) = &props.ntg
        && check_len(issues, "properties.ntg", ntg, n)
    {
        check_range(issues, "properties.ntg", ntg, 0.0, 1.0);
    }
    if let Some(multpv) = &request.pore_volume_multipliers
        && check_len(issues, "pore_volume_multipliers", multpv, n)
    {
        check_range(issues, "pore_volume_multipliers", multpv, 0.0, f64::MAX);
    }
}

fn validate_fluids(request: &SimRequest, issues: &mut Vec<ValidationIssue>) {
    let phases = request.phases;
    if !(phases.oil && phases.water) {
        issues.push(ValidationIssue::error(
            IssueCode::PhaseConfig,
            "phases",
            "supported configurations are oil-water and oil-water-gas",
        ));
    }

    let pvt = &request.pvt;
    if phases.water && pvt.water.is_none() {
        issues.push(ValidationIssue::error(
            IssueCode::MissingTable,
            "pvt.water",
            "water phase is active but no water PVT record is given",
        ));
    }
    if phases.oil && pvt.oil.as_ref().is_none_or(|t| t.is_empty()) {
        issues.push(ValidationIssue::error(
            IssueCode::MissingTable,
            "pvt.oil",
            "oil phase is active but the dead-oil table is missing",
        ));
    }
    if phases.gas && pvt.gas.as_ref().is_none_or(|t| t.is_empty()) {
        issues.push(ValidationIssue::error(
            IssueCode::MissingTable,
            "pvt.gas",
            "gas phase is active but the dry-gas table is missing",
        ));
    }
    if !phases.gas && pvt.gas.is_some() {
        issues.push(ValidationIssue::warning(
            IssueCode::PhaseConfig,
            "pvt.gas",
            "gas table given for a run without a gas phase; it will be ignored",
        ));
    }

    if let Some(rows) = &pvt.oil
        && rows.windows(2).any(|w| w[1].pressure_bar <= w[0].pressure_bar)
    {
        issues.push(ValidationIssue::error(
            IssueCode::TableOrder,
            "pvt.oil",
            "pressures must be strictly increasing",
        ));
    }
    if let Some(rows) = &pvt.gas
        && rows.windows(2).any(|w| w[1].pressure_bar <= w[0].pressure_bar)
    {
        issues.push(ValidationIssue::error(
            IssueCode::TableOrder,
            "pvt.gas",
            "pressures must be strictly increasing",
        ));
    }

    match &request.relperm {
        RelPermDef::Tables { swof, sgof } => {
            if swof.is_empty() {
                issues.push(ValidationIssue::error(
                    IssueCode::MissingTable,
                    "relperm.swof",
                    "water-oil saturation table is empty",
                ));
            }
            if swof.windows(2).any(|w| w[1].sw <= w[0].sw) {
                issues.push(ValidationIssue::error(
                    IssueCode::TableOrder,
                    "relperm.swof",
                    "water saturations must be strictly increasing",
                ));
            }
            let sw: Vec<f64> = swof.iter().map(|r| r.sw).collect();
            check_range(issues, "relperm.swof.sw", &sw, 0.0, 1.0);
            match sgof {
                Some(rows) => {
                    if rows.windows(2).any(|w| w[1].sg <= w[0].sg) {
                        issues.push(ValidationIssue::error(
                            IssueCode::TableOrder,
                            "relperm.sgof",
                            "gas saturations must be strictly increasing",
                        ));
                    }
                    let sg: Vec<f64> = rows.iter().map(|r| r.sg).collect();
                    check_range(issues, "relperm.sgof.sg", &sg, 0.0, 1.0);
                }
                None if phases.gas => issues.push(ValidationIssue::error(
                    IssueCode::MissingTable,
                    "relperm.sgof",
                    "gas phase is active but the gas-oil saturation table is missing",
                )),
                None => {}
            }
        }
        RelPermDef::Corey(c) => {
            let ends = [c.swc, c.sorw, c.sgc, c.sorg];
            check_range(issues, "relperm.corey.endpoints", &ends, 0.0, 1.0);
            if c.swc + c.sorw >= 1.0 {
                issues.push(ValidationIssue::error(
                    IssueCode::ValueRange,
                    "relperm.corey",
                    "swc + sorw must be below 1",
                ));
            }
            let exps = [c.nw, c.now, c.ng, c.nog];
            check_range(issues, "relperm.corey.exponents", &exps, f64::MIN_POSITIVE, 20.0);
        }
    }

    let eq = &request.equilibration;
    check_range(
        issues,
        "equilibration.datum_pressure_bar",
        &[eq.datum_pressure_bar],
        f64::MIN_POSITIVE,
        f64::MAX,
    );
    if phases.gas && eq.goc_depth_m.is_none() {
        issues.push(ValidationIssue::warning(
            IssueCode::PhaseConfig,
            "equilibration.goc_depth_m",
            "three-phase run without a gas-oil contact starts without a gas cap",
        ));
    }
}

fn validate_control(
    path: &str,
    kind: WellKind,
    phase: Phase,
    control: &WellControl,
    gas_enabled: bool,
    issues: &mut Vec<ValidationIssue>,
) {
    if !control.mode.valid_for(kind) {
        issues.push(ValidationIssue::error(
            IssueCode::ControlMode,
            format!("{path}.mode"),
            format!("control mode {:?} is not valid for a {kind:?}", control.mode),
        ));
    }
    if !control.target.is_finite() || control.target < 0.0 {
        issues.push(ValidationIssue::error(
            IssueCode::ValueRange,
            format!("{path}.target"),
            format!("target {} must be finite and non-negative", control.target),
        ));
    }
    if let Some(limit) = control.bhp_limit_bar
        && (!limit.is_finite() || limit <= 0.0)
    {
        issues.push(ValidationIssue::error(
            IssueCode::ValueRange,
            format!("{path}.bhp_limit_bar"),
            format!("BHP limit {limit} must be positive"),
        ));
    }
    let uses_gas = matches!(control.mode, ControlMode::GasRate)
        || (kind == WellKind::Injector && phase == Phase::Gas);
    if uses_gas && !gas_enabled {
        issues.push(ValidationIssue::error(
            IssueCode::PhaseConfig,
            path,
            "gas control on a run without a gas phase",
        ));
    }
}

fn validate_well(
    request: &SimRequest,
    idx: usize,
    well: &WellDef,
    issues: &mut Vec<ValidationIssue>,
) {
    let dims = request.dims();
    let path = format!("wells[{idx}]");

    if well.name.is_empty() || well.name.len() > 8 || well.name.contains(char::is_whitespace) {
        issues.push(ValidationIssue::error(
            IssueCode::ValueRange,
            format!("{path}.name"),
            format!("well name '{}' must be 1-8 characters without spaces", well.name),
        ));
    }
    if well.i == 0 || well.i > dims.nx || well.j == 0 || well.j > dims.ny {
        issues.push(ValidationIssue::error(
            IssueCode::WellBounds,
            format!("{path}.i/j"),
            format!(
                "well '{}' at ({}, {}) lies outside the {}x{} areal grid",
                well.name, well.i, well.j, dims.nx, dims.ny
            ),
        ));
    }
    let c = well.completion;
    if c.k1 == 0 || c.k1 > c.k2 || c.k2 > dims.nz {
        issues.push(ValidationIssue::error(
            IssueCode::CompletionRange,
            format!("{path}.completion"),
            format!(
                "completion K{}..K{} of well '{}' must satisfy 1 <= K1 <= K2 <= {}",
                c.k1, c.k2, well.name, dims.nz
            ),
        ));
    }
    validate_control(
        &format!("{path}.control"),
        well.kind,
        well.phase,
        &well.control,
        request.phases.gas,
        issues,
    );
}

fn validate_schedule(request: &SimRequest, issues: &mut Vec<ValidationIssue>) {
    let events = &request.schedule.events;
    if !events
        .iter()
        .any(|e| matches!(e, ScheduleEvent::Advance { .. }))
    {
        issues.push(ValidationIssue::error(
            IssueCode::EmptySchedule,
            "schedule.events",
            "schedule must advance time at least once",
        ));
    }

    let mut advanced = false;
    for (idx, event) in events.iter().enumerate() {
        let path = format!("schedule.events[{idx}]");
        if !advanced
            && let ScheduleEvent::Control { well, .. } = event
        {
            issues.push(ValidationIssue::warning(
                IssueCode::InitialControl,
                path.clone(),
                format!(
                    "control change for '{well}' before the first time step replaces the well's \
                     initial control; decks fold it into the well definition"
                ),
            ));
        }
        match event {
            ScheduleEvent::Advance { days } => {
                advanced = true;
                if !days.is_finite() || *days <= 0.0 {
                    issues.push(ValidationIssue::error(
                        IssueCode::NonPositiveTimestep,
                        path,
                        format!("timestep of {days} days must be positive"),
                    ));
                }
            }
            ScheduleEvent::Control { well, control, .. } => match request.well(well) {
                Some(def) => validate_control(
                    &format!("{path}.control"),
                    def.kind,
                    def.phase,
                    control,
                    request.phases.gas,
                    issues,
                ),
                None => issues.push(ValidationIssue::error(
                    IssueCode::UnknownWell,
                    path,
                    format!("control change references undefined well '{well}'"),
                )),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::GridDims;
    use crate::samples;

    fn codes(issues: &[ValidationIssue]) -> Vec<IssueCode> {
        issues.iter().map(|i| i.code).collect()
    }

    #[test]
    fn sample_request_is_valid() {
        let request = samples::two_well_oil_water(10, 10, 3);
        let issues = validate_request(&request, &ValidationLimits::default());
        assert!(!has_errors(&issues), "{issues:?}");
    }

    #[test]
    fn completion_below_grid_is_an_error() {
        let mut request = samples::two_well_oil_water(10, 10, 3);
        request.wells[0].completion.k2 = 4;
        let issues = validate_request(&request, &ValidationLimits::default());
        assert!(has_errors(&issues));
        assert!(codes(&issues).contains(&IssueCode::CompletionRange));
    }

    #[test]
    fn well_outside_areal_grid_is_an_error() {
        let mut request = samples::two_well_oil_water(10, 10, 3);
        request.wells[1].i = 11;
        let issues = validate_request(&request, &ValidationLimits::default());
        assert!(codes(&issues).contains(&IssueCode::WellBounds));
    }

    #[test]
    fn schedule_without_advance_is_rejected() {
        let mut request = samples::two_well_oil_water(4, 4, 2);
        request.schedule.events.clear();
        let issues = validate_request(&request, &ValidationLimits::default());
        assert!(codes(&issues).contains(&IssueCode::EmptySchedule));
    }

    #[test]
    fn non_positive_timestep_is_rejected() {
        let mut request = samples::two_well_oil_water(4, 4, 2);
        request
            .schedule
            .events
            .push(ScheduleEvent::Advance { days: 0.0 });
        let issues = validate_request(&request, &ValidationLimits::default());
        assert!(codes(&issues).contains(&IssueCode::NonPositiveTimestep));
    }

    #[test]
    fn cell_ceiling_applies() {
        let request = samples::two_well_oil_water(10, 10, 3);
        let issues = validate_request(&request, &ValidationLimits { max_cells: 100 });
        assert!(codes(&issues).contains(&IssueCode::CellCeiling));
    }

    #[test]
    fn multi_line_or_padded_titles_are_rejected() {
        let mut request = samples::two_well_oil_water(4, 4, 2);
        for title in ["Case A\nsecond line", " Case A", "Case A\t"] {
            request.title = title.to_string();
            let issues = validate_request(&request, &ValidationLimits::default());
            assert_eq!(codes(&issues), vec![IssueCode::Title], "{title:?}");
        }
        for title in ["", "Case A -- tuned"] {
            request.title = title.to_string();
            assert!(validate_request(&request, &ValidationLimits::default()).is_empty());
        }
    }

    #[test]
    fn control_before_first_step_is_flagged() {
        let mut request = samples::two_well_oil_water(4, 4, 2);
        let control = ScheduleEvent::Control {
            well: "PROD1".to_string(),
            status: crate::request::WellStatus::Open,
            control: request.wells[1].control.clone(),
        };
        request.schedule.events.insert(0, control);
        let issues = validate_request(&request, &ValidationLimits::default());
        assert_eq!(codes(&issues), vec![IssueCode::InitialControl]);
        assert!(!has_errors(&issues));
        assert_eq!(issues[0].path, "schedule.events[0]");
    }

    #[test]
    fn overflowing_dims_are_a_ceiling_error() {
        let mut request = samples::two_well_oil_water(4, 4, 2);
        request.grid.dims = GridDims::new(1 << 33, 1 << 33, 2);
        let issues = validate_request(
            &request,
            &ValidationLimits {
                max_cells: usize::MAX,
            },
        );
        assert_eq!(codes(&issues), vec![IssueCode::CellCeiling]);
        assert!(has_errors(&issues));
    }

    #[test]
    fn huge_corner_point_grid_does_not_overflow() {
        let mut request = samples::two_well_oil_water(4, 4, 2);
        request.grid.dims = GridDims::new(1 << 31, 1 << 31, 1);
        request.grid.geometry = CellGeometry::CornerPoint {
            coord_m: Vec::new(),
            zcorn_m: Vec::new(),
        };
        let issues = validate_request(
            &request,
            &ValidationLimits {
                max_cells: usize::MAX,
            },
        );
        assert!(codes(&issues).contains(&IssueCode::CellCeiling), "{issues:?}");
    }

    #[test]
    fn property_length_mismatch_is_reported() {
        let mut request = samples::two_well_oil_water(4, 4, 2);
        request.properties.porosity.pop();
        let issues = validate_request(&request, &ValidationLimits::default());
        let issue = issues
            .iter()
            .find(|i| i.code == IssueCode::ArrayLength)
            .expect("length issue");
        assert_eq!(issue.path, "properties.porosity");
    }

    #[test]
    fn injector_cannot_use_oil_rate() {
        let mut request = samples::two_well_oil_water(4, 4, 2);
        request.wells[0].control.mode = ControlMode::OilRate;
        let issues = validate_request(&request, &ValidationLimits::default());
        assert!(codes(&issues).contains(&IssueCode::ControlMode));
    }
}
