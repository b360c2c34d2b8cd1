//! Raw deck -> canonical `SimRequest`.
//!
//! Every value is converted into canonical units on the way in. The schedule
//! is read strictly in order: a keyword that names a well before WELSPECS has
//! defined it is an error, as is a required keyword that never appears.

use chrono::NaiveDate;
use pal_core::units::{to_canonical, Quantity, UnitSystem};
use pal_core::{nearly_equal, Tolerances};
use pal_model::*;

use crate::keywords::Section;
use crate::lexer::SourceLocation;
use crate::raw::{Item, RawDeck, RawKeyword, Record};
use crate::{DeckError, DeckResult};

fn parse_number(text: &str) -> Option<f64> {
    let value = text
        .parse::<f64>()
        .ok()
        .or_else(|| text.replace(['D', 'd'], "E").parse::<f64>().ok())?;
    value.is_finite().then_some(value)
}

/// Positional access to the items of one record.
struct Fields<'a> {
    keyword: &'a str,
    record: &'a Record,
}

impl<'a> Fields<'a> {
    fn new(keyword: &'a RawKeyword, record: &'a Record) -> Self {
        Self {
            keyword: &keyword.name,
            record,
        }
    }

    fn error(&self, message: impl Into<String>) -> DeckError {
        DeckError::structural(self.record.loc.clone(), Some(self.keyword), message)
    }

    fn text(&self, idx: usize) -> Option<&'a str> {
        match self.record.items.get(idx) {
            Some(Item::Value(s)) | Some(Item::Quoted(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    fn required_text(&self, idx: usize, what: &str) -> DeckResult<&'a str> {
        self.text(idx)
            .ok_or_else(|| self.error(format!("item {} ({what}) is required", idx + 1)))
    }

    fn upper(&self, idx: usize, what: &str) -> DeckResult<String> {
        Ok(self.required_text(idx, what)?.to_ascii_uppercase())
    }

    fn opt_float(&self, idx: usize, what: &str) -> DeckResult<Option<f64>> {
        match self.text(idx) {
            None => Ok(None),
            Some(t) => parse_number(t).map(Some).ok_or_else(|| {
                self.error(format!("item {} ({what}) is not a number: '{t}'", idx + 1))
            }),
        }
    }

    fn float(&self, idx: usize, what: &str) -> DeckResult<f64> {
        self.opt_float(idx, what)?
            .ok_or_else(|| self.error(format!("item {} ({what}) is required", idx + 1)))
    }

    fn opt_int(&self, idx: usize, what: &str) -> DeckResult<Option<usize>> {
        match self.text(idx) {
            None => Ok(None),
            Some(t) => t.parse::<usize>().map(Some).map_err(|_| {
                self.error(format!(
                    "item {} ({what}) is not a non-negative integer: '{t}'",
                    idx + 1
                ))
            }),
        }
    }

    fn int(&self, idx: usize, what: &str) -> DeckResult<usize> {
        self.opt_int(idx, what)?
            .ok_or_else(|| self.error(format!("item {} ({what}) is required", idx + 1)))
    }
}

fn kw_error(kw: &RawKeyword, message: impl Into<String>) -> DeckError {
    DeckError::structural(kw.loc.clone(), Some(&kw.name), message)
}

fn missing(deck: &RawDeck, keyword: &str, message: impl Into<String>) -> DeckError {
    DeckError::structural(deck.end.clone(), Some(keyword), message)
}

fn single(kw: &RawKeyword) -> DeckResult<Fields<'_>> {
    kw.records
        .first()
        .map(|r| Fields::new(kw, r))
        .ok_or_else(|| kw_error(kw, "keyword has no data record"))
}

/// All items of a single-record keyword as numbers; defaults are not allowed.
fn numbers(kw: &RawKeyword) -> DeckResult<Vec<f64>> {
    let mut out = Vec::new();
    for record in &kw.records {
        for item in &record.items {
            match item {
                Item::Value(t) => out.push(
                    parse_number(t)
                        .ok_or_else(|| kw_error(kw, format!("'{t}' is not a number")))?,
                ),
                Item::Quoted(t) => {
                    return Err(kw_error(kw, format!("unexpected string '{t}' in numeric data")));
                }
                Item::Default => {
                    return Err(kw_error(kw, "defaulted values are not allowed in array data"));
                }
            }
        }
    }
    Ok(out)
}

fn array(kw: &RawKeyword, expected: usize, units: UnitSystem, quantity: Quantity) -> DeckResult<Vec<f64>> {
    let values = numbers(kw)?;
    if values.len() != expected {
        return Err(kw_error(
            kw,
            format!("expected {expected} values, found {}", values.len()),
        ));
    }
    Ok(values
        .into_iter()
        .map(|v| to_canonical(units, quantity, v))
        .collect())
}

/// Rows of a flat table keyword with `width` columns.
fn table_rows(kw: &RawKeyword, width: usize) -> DeckResult<Vec<Vec<f64>>> {
    let values = numbers(kw)?;
    if values.is_empty() || values.len() % width != 0 {
        return Err(kw_error(
            kw,
            format!(
                "table needs a multiple of {width} values, found {}",
                values.len()
            ),
        ));
    }
    Ok(values.chunks(width).map(<[f64]>::to_vec).collect())
}

struct Runspec {
    title: String,
    dims: GridDims,
    phases: PhaseConfig,
    start_date: NaiveDate,
    units: UnitSystem,
}

fn month_number(name: &str) -> Option<u32> {
    let month = match name.to_ascii_uppercase().as_str() {
        "JAN" => 1,
        "FEB" => 2,
        "MAR" => 3,
        "APR" => 4,
        "MAY" => 5,
        "JUN" => 6,
        "JUL" | "JLY" => 7,
        "AUG" => 8,
        "SEP" => 9,
        "OCT" => 10,
        "NOV" => 11,
        "DEC" => 12,
        _ => return None,
    };
    Some(month)
}

fn read_date(fields: &Fields<'_>) -> DeckResult<NaiveDate> {
    let day = fields.int(0, "day")?;
    let month_text = fields.required_text(1, "month")?;
    let year = fields.int(2, "year")?;
    let month = month_number(month_text)
        .ok_or_else(|| fields.error(format!("unknown month '{month_text}'")))?;
    let (Ok(y), Ok(d)) = (i32::try_from(year), u32::try_from(day)) else {
        return Err(fields.error(format!("date {day} {month_text} {year} is out of range")));
    };
    NaiveDate::from_ymd_opt(y, month, d)
        .ok_or_else(|| fields.error(format!("invalid date {day} {month_text} {year}")))
}

fn read_runspec(deck: &RawDeck) -> DeckResult<Runspec> {
    let mut title = String::new();
    let mut dims = None;
    let mut phases = PhaseConfig {
        oil: false,
        water: false,
        gas: false,
    };
    let mut start_date = None;
    let mut units: Option<UnitSystem> = None;

    for kw in deck.in_section(Section::Runspec) {
        match kw.name.as_str() {
            "TITLE" => {
                let fields = single(kw)?;
                title = fields
                    .record
                    .items
                    .iter()
                    .filter_map(|item| match item {
                        Item::Value(s) | Item::Quoted(s) => Some(s.as_str()),
                        Item::Default => None,
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
            }
            "DIMENS" => {
                let fields = single(kw)?;
                let nx = fields.int(0, "NX")?;
                let ny = fields.int(1, "NY")?;
                let nz = fields.int(2, "NZ")?;
                if nx == 0 || ny == 0 || nz == 0 {
                    return Err(fields.error("grid dimensions must be positive"));
                }
                let grid = GridDims::new(nx, ny, nz);
                if grid.checked_cell_count().is_none() {
                    return Err(fields.error(format!("grid {nx} x {ny} x {nz} overflows the cell count")));
                }
                dims = Some(grid);
            }
            "OIL" => phases.oil = true,
            "WATER" => phases.water = true,
            "GAS" => phases.gas = true,
            "METRIC" | "FIELD" | "LAB" => {
                let system = UnitSystem::from_label(&kw.name)
                    .map_err(|e| kw_error(kw, e.to_string()))?;
                if let Some(previous) = units
                    && previous != system
                {
                    return Err(kw_error(
                        kw,
                        format!("conflicting unit systems {previous} and {system}"),
                    ));
                }
                units = Some(system);
            }
            "START" => start_date = Some(read_date(&single(kw)?)?),
            "TABDIMS" => {
                let fields = single(kw)?;
                for (idx, what) in [(0, "NTSFUN"), (1, "NTPVT")] {
                    if fields.opt_int(idx, what)?.is_some_and(|n| n > 1) {
                        return Err(fields.error(format!("{what} > 1 is not supported")));
                    }
                }
            }
            _ => {}
        }
    }

    let dims = dims.ok_or_else(|| missing(deck, "DIMENS", "DIMENS is required in RUNSPEC"))?;
    if phases.phase_count() == 0 {
        return Err(missing(deck, "RUNSPEC", "no phases declared (OIL, WATER, GAS)"));
    }
    let start_date =
        start_date.ok_or_else(|| missing(deck, "START", "START is required in RUNSPEC"))?;
    let units = units.unwrap_or_else(|| {
        tracing::debug!("no unit keyword in RUNSPEC, assuming METRIC");
        UnitSystem::Metric
    });

    Ok(Runspec {
        title,
        dims,
        phases,
        start_date,
        units,
    })
}

/// Reduce a per-cell size array to one value per index along `axis`, which
/// requires the sizes to be constant across the other two axes.
fn tensor_axis(kw: &RawKeyword, values: &[f64], dims: GridDims, axis: usize) -> DeckResult<Vec<f64>> {
    let len = [dims.nx, dims.ny, dims.nz][axis];
    let mut out = vec![f64::NAN; len];
    for k in 1..=dims.nz {
        for j in 1..=dims.ny {
            for i in 1..=dims.nx {
                let along = [i, j, k][axis] - 1;
                let v = values[dims.natural_index(i, j, k)];
                if out[along].is_nan() {
                    out[along] = v;
                } else if !nearly_equal(out[along], v, Tolerances::text_round_trip()) {
                    return Err(kw_error(
                        kw,
                        "cell sizes vary across the grid; only tensor-product grids are supported",
                    ));
                }
            }
        }
    }
    Ok(out)
}

fn axis_sizes(
    deck: &RawDeck,
    dims: GridDims,
    units: UnitSystem,
    vector: &str,
    per_cell: &str,
    axis: usize,
) -> DeckResult<Vec<f64>> {
    let len = [dims.nx, dims.ny, dims.nz][axis];
    if let Some(kw) = deck.find(Section::Grid, vector) {
        return array(kw, len, units, Quantity::Length);
    }
    if let Some(kw) = deck.find(Section::Grid, per_cell) {
        let values = array(kw, dims.cell_count(), units, Quantity::Length)?;
        return tensor_axis(kw, &values, dims, axis);
    }
    Err(missing(
        deck,
        vector,
        format!("{vector} or {per_cell} is required in GRID"),
    ))
}

fn read_geometry(deck: &RawDeck, dims: GridDims, units: UnitSystem) -> DeckResult<CellGeometry> {
    if let Some(coord) = deck.find(Section::Grid, "COORD") {
        let zcorn = deck
            .find(Section::Grid, "ZCORN")
            .ok_or_else(|| kw_error(coord, "COORD given without ZCORN"))?;
        let pillars = 6 * (dims.nx + 1) * (dims.ny + 1);
        return Ok(CellGeometry::CornerPoint {
            coord_m: array(coord, pillars, units, Quantity::Length)?,
            zcorn_m: array(zcorn, 8 * dims.cell_count(), units, Quantity::Length)?,
        });
    }

    let dx_m = axis_sizes(deck, dims, units, "DXV", "DX", 0)?;
    let dy_m = axis_sizes(deck, dims, units, "DYV", "DY", 1)?;
    let dz_m = axis_sizes(deck, dims, units, "DZV", "DZ", 2)?;

    let tops = deck
        .find(Section::Grid, "TOPS")
        .ok_or_else(|| missing(deck, "TOPS", "TOPS is required in GRID"))?;
    let mut tops_m: Vec<f64> = numbers(tops)?
        .into_iter()
        .map(|v| to_canonical(units, Quantity::Length, v))
        .collect();
    // A full-grid TOPS array only contributes its first layer.
    if tops_m.len() == dims.cell_count() {
        tops_m.truncate(dims.layer_cells());
    }
    if tops_m.len() != dims.layer_cells() {
        return Err(kw_error(
            tops,
            format!(
                "expected {} or {} values, found {}",
                dims.layer_cells(),
                dims.cell_count(),
                tops_m.len()
            ),
        ));
    }

    Ok(CellGeometry::Cartesian {
        dx_m,
        dy_m,
        dz_m,
        tops_m,
    })
}

fn required_cell_array(
    deck: &RawDeck,
    name: &str,
    n: usize,
    units: UnitSystem,
    quantity: Quantity,
) -> DeckResult<Vec<f64>> {
    let kw = deck
        .find(Section::Grid, name)
        .ok_or_else(|| missing(deck, name, format!("{name} is required in GRID")))?;
    array(kw, n, units, quantity)
}

fn read_properties(deck: &RawDeck, n: usize, units: UnitSystem) -> DeckResult<StaticProperties> {
    let ntg = deck
        .find(Section::Grid, "NTG")
        .map(|kw| array(kw, n, units, Quantity::Dimensionless))
        .transpose()?;
    Ok(StaticProperties {
        porosity: required_cell_array(deck, "PORO", n, units, Quantity::Dimensionless)?,
        permx_md: required_cell_array(deck, "PERMX", n, units, Quantity::Permeability)?,
        permy_md: required_cell_array(deck, "PERMY", n, units, Quantity::Permeability)?,
        permz_md: required_cell_array(deck, "PERMZ", n, units, Quantity::Permeability)?,
        ntg,
    })
}

fn read_pvt(deck: &RawDeck, phases: PhaseConfig, units: UnitSystem) -> DeckResult<PvtDef> {
    let conv = |q: Quantity, v: f64| to_canonical(units, q, v);

    let water = match deck.find(Section::Props, "PVTW") {
        Some(kw) => {
            let f = single(kw)?;
            Some(WaterPvt {
                ref_pressure_bar: conv(Quantity::Pressure, f.float(0, "reference pressure")?),
                bw: f.float(1, "Bw")?,
                compressibility_per_bar: conv(
                    Quantity::Compressibility,
                    f.float(2, "compressibility")?,
                ),
                viscosity_cp: conv(Quantity::Viscosity, f.float(3, "viscosity")?),
                viscosibility_per_bar: conv(
                    Quantity::Compressibility,
                    f.opt_float(4, "viscosibility")?.unwrap_or(0.0),
                ),
            })
        }
        None if phases.water => {
            return Err(missing(deck, "PVTW", "PVTW is required for a water phase"));
        }
        None => None,
    };

    let oil = match deck.find(Section::Props, "PVDO") {
        Some(kw) => Some(
            table_rows(kw, 3)?
                .into_iter()
                .map(|r| PvdoRow {
                    pressure_bar: conv(Quantity::Pressure, r[0]),
                    bo: r[1],
                    viscosity_cp: conv(Quantity::Viscosity, r[2]),
                })
                .collect(),
        ),
        None if phases.oil => {
            return Err(missing(deck, "PVDO", "PVDO is required for an oil phase"));
        }
        None => None,
    };

    let gas = match deck.find(Section::Props, "PVDG") {
        Some(kw) => Some(
            table_rows(kw, 3)?
                .into_iter()
                .map(|r| PvdgRow {
                    pressure_bar: conv(Quantity::Pressure, r[0]),
                    bg: conv(Quantity::GasFvf, r[1]),
                    viscosity_cp: conv(Quantity::Viscosity, r[2]),
                })
                .collect(),
        ),
        None if phases.gas => {
            return Err(missing(deck, "PVDG", "PVDG is required for a gas phase"));
        }
        None => None,
    };

    let density = deck
        .find(Section::Props, "DENSITY")
        .ok_or_else(|| missing(deck, "DENSITY", "DENSITY is required in PROPS"))?;
    let f = single(density)?;
    let surface_density = SurfaceDensity {
        oil_kg_m3: conv(Quantity::Density, f.float(0, "oil density")?),
        water_kg_m3: conv(Quantity::Density, f.float(1, "water density")?),
        gas_kg_m3: conv(Quantity::Density, f.float(2, "gas density")?),
    };

    let rock = deck
        .find(Section::Props, "ROCK")
        .ok_or_else(|| missing(deck, "ROCK", "ROCK is required in PROPS"))?;
    let f = single(rock)?;
    let rock = RockDef {
        ref_pressure_bar: conv(Quantity::Pressure, f.float(0, "reference pressure")?),
        compressibility_per_bar: conv(Quantity::Compressibility, f.float(1, "compressibility")?),
    };

    Ok(PvtDef {
        water,
        oil,
        gas,
        surface_density,
        rock,
    })
}

fn read_relperm(deck: &RawDeck, phases: PhaseConfig, units: UnitSystem) -> DeckResult<RelPermDef> {
    let swof = deck
        .find(Section::Props, "SWOF")
        .ok_or_else(|| missing(deck, "SWOF", "SWOF is required in PROPS"))?;
    let swof = table_rows(swof, 4)?
        .into_iter()
        .map(|r| SwofRow {
            sw: r[0],
            krw: r[1],
            krow: r[2],
            pcow_bar: to_canonical(units, Quantity::Pressure, r[3]),
        })
        .collect();

    let sgof = match deck.find(Section::Props, "SGOF") {
        Some(kw) => Some(
            table_rows(kw, 4)?
                .into_iter()
                .map(|r| SgofRow {
                    sg: r[0],
                    krg: r[1],
                    krog: r[2],
                    pcog_bar: to_canonical(units, Quantity::Pressure, r[3]),
                })
                .collect(),
        ),
        None if phases.gas => {
            return Err(missing(deck, "SGOF", "SGOF is required for a gas phase"));
        }
        None => None,
    };

    Ok(RelPermDef::Tables { swof, sgof })
}

fn check_regions(deck: &RawDeck, n: usize) -> DeckResult<()> {
    for kw in deck.in_section(Section::Regions) {
        let values = numbers(kw)?;
        if values.len() != n {
            return Err(kw_error(
                kw,
                format!("expected {n} values, found {}", values.len()),
            ));
        }
        if values.iter().any(|v| *v != 1.0) {
            return Err(kw_error(kw, "only a single region (1) is supported"));
        }
    }
    Ok(())
}

fn read_equilibration(deck: &RawDeck, units: UnitSystem) -> DeckResult<EquilibrationDef> {
    let kw = deck
        .find(Section::Solution, "EQUIL")
        .ok_or_else(|| missing(deck, "EQUIL", "EQUIL is required in SOLUTION"))?;
    let f = single(kw)?;
    let length = |v: f64| to_canonical(units, Quantity::Length, v);
    Ok(EquilibrationDef {
        datum_depth_m: length(f.float(0, "datum depth")?),
        datum_pressure_bar: to_canonical(units, Quantity::Pressure, f.float(1, "datum pressure")?),
        woc_depth_m: length(f.float(2, "water-oil contact")?),
        goc_depth_m: f.opt_float(4, "gas-oil contact")?.map(length),
    })
}

/// Whether `k1..=k2` overlaps or abuts an existing interval.
fn touches(c: CompletionDef, k1: usize, k2: usize, fields: &Fields<'_>) -> DeckResult<bool> {
    let (Some(c_end), Some(end)) = (c.k2.checked_add(1), k2.checked_add(1)) else {
        return Err(fields.error(format!("layer index {} is out of range", k2.max(c.k2))));
    };
    Ok(k1 <= c_end && end >= c.k1)
}

struct WellDraft {
    name: String,
    group: String,
    i: usize,
    j: usize,
    ref_depth_m: Option<f64>,
    phase: Phase,
    loc: SourceLocation,
    completion: Option<CompletionDef>,
    kind: Option<WellKind>,
    initial: Option<(WellStatus, WellControl)>,
}

struct ScheduleReader {
    units: UnitSystem,
    start_date: NaiveDate,
    elapsed_days: f64,
    advanced: bool,
    wells: Vec<WellDraft>,
    events: Vec<ScheduleEvent>,
}

fn parse_status(fields: &Fields<'_>, idx: usize) -> DeckResult<WellStatus> {
    match fields.text(idx).map(str::to_ascii_uppercase).as_deref() {
        None | Some("OPEN") => Ok(WellStatus::Open),
        Some("SHUT") | Some("STOP") => Ok(WellStatus::Shut),
        Some(other) => Err(fields.error(format!("unknown well status '{other}'"))),
    }
}

fn parse_phase(fields: &Fields<'_>, idx: usize) -> DeckResult<Phase> {
    match fields.upper(idx, "phase")?.as_str() {
        "OIL" | "LIQ" => Ok(Phase::Oil),
        "WATER" | "WAT" => Ok(Phase::Water),
        "GAS" => Ok(Phase::Gas),
        other => Err(fields.error(format!("unknown phase '{other}'"))),
    }
}

impl ScheduleReader {
    fn well_mut(&mut self, fields: &Fields<'_>, name: &str) -> DeckResult<&mut WellDraft> {
        self.wells
            .iter_mut()
            .find(|w| w.name == name)
            .ok_or_else(|| fields.error(format!("well '{name}' is used before WELSPECS defines it")))
    }

    fn welspecs(&mut self, fields: &Fields<'_>) -> DeckResult<()> {
        let name = fields.required_text(0, "well name")?.to_string();
        let group = fields.required_text(1, "group")?.to_string();
        let i = fields.int(2, "I")?;
        let j = fields.int(3, "J")?;
        let ref_depth_m = fields
            .opt_float(4, "reference depth")?
            .map(|v| to_canonical(self.units, Quantity::Length, v));
        let phase = parse_phase(fields, 5)?;

        if let Some(existing) = self.wells.iter_mut().find(|w| w.name == name) {
            if existing.i != i || existing.j != j {
                return Err(fields.error(format!("well '{name}' cannot be relocated")));
            }
            existing.group = group;
            existing.ref_depth_m = ref_depth_m;
            existing.phase = phase;
            return Ok(());
        }

        self.wells.push(WellDraft {
            name,
            group,
            i,
            j,
            ref_depth_m,
            phase,
            loc: fields.record.loc.clone(),
            completion: None,
            kind: None,
            initial: None,
        });
        Ok(())
    }

    fn compdat(&mut self, fields: &Fields<'_>) -> DeckResult<()> {
        let name = fields.required_text(0, "well name")?.to_string();
        let advanced = self.advanced;
        let well = self.well_mut(fields, &name)?;
        let i = fields.opt_int(1, "I")?.unwrap_or(well.i);
        let j = fields.opt_int(2, "J")?.unwrap_or(well.j);
        let k1 = fields.int(3, "K1")?;
        let k2 = fields.int(4, "K2")?;

        if (i, j) != (well.i, well.j) {
            return Err(fields.error(format!(
                "connection ({i}, {j}) is outside the well column ({}, {}); deviated wells are not supported",
                well.i, well.j
            )));
        }
        if k1 > k2 {
            return Err(fields.error(format!("K1 {k1} is greater than K2 {k2}")));
        }

        well.completion = match well.completion {
            None => Some(CompletionDef { k1, k2 }),
            Some(_) if advanced => {
                return Err(fields.error("completion changes after the first time step are not supported"));
            }
            Some(c) if touches(c, k1, k2, fields)? => Some(CompletionDef {
                k1: k1.min(c.k1),
                k2: k2.max(c.k2),
            }),
            Some(c) => {
                return Err(fields.error(format!(
                    "interval {k1}..{k2} is disjoint from {}..{}; one interval per well is supported",
                    c.k1, c.k2
                )));
            }
        };
        Ok(())
    }

    fn apply_control(
        &mut self,
        fields: &Fields<'_>,
        name: &str,
        kind: WellKind,
        status: WellStatus,
        control: WellControl,
    ) -> DeckResult<()> {
        let advanced = self.advanced;
        let well = self.well_mut(fields, name)?;
        match well.kind {
            None => well.kind = Some(kind),
            Some(existing) if existing != kind => {
                return Err(fields.error(format!(
                    "well '{name}' is a {existing:?} and cannot take a {kind:?} control"
                )));
            }
            Some(_) => {}
        }

        if !advanced {
            well.initial = Some((status, control));
            return Ok(());
        }
        if well.initial.is_none() {
            tracing::debug!(well = name, "well first controlled after the first time step; starting shut");
            well.initial = Some((WellStatus::Shut, control.clone()));
        }
        self.events.push(ScheduleEvent::Control {
            well: name.to_string(),
            status,
            control,
        });
        Ok(())
    }

    fn wconprod(&mut self, fields: &Fields<'_>) -> DeckResult<()> {
        let name = fields.required_text(0, "well name")?.to_string();
        let status = parse_status(fields, 1)?;
        let mode_text = fields.upper(2, "control mode")?;
        let (mode, idx, quantity) = match mode_text.as_str() {
            "ORAT" => (ControlMode::OilRate, 3, Quantity::LiquidRate),
            "WRAT" => (ControlMode::WaterRate, 4, Quantity::LiquidRate),
            "GRAT" => (ControlMode::GasRate, 5, Quantity::GasRate),
            "LRAT" => (ControlMode::LiquidRate, 6, Quantity::LiquidRate),
            "BHP" => (ControlMode::Bhp, 8, Quantity::Pressure),
            other => {
                return Err(fields.error(format!("unsupported producer control mode '{other}'")));
            }
        };
        let target = to_canonical(self.units, quantity, fields.float(idx, &mode_text)?);
        let bhp_limit_bar = match mode {
            ControlMode::Bhp => None,
            _ => fields
                .opt_float(8, "BHP limit")?
                .map(|v| to_canonical(self.units, Quantity::Pressure, v)),
        };
        let control = WellControl {
            mode,
            target,
            bhp_limit_bar,
        };
        self.apply_control(fields, &name, WellKind::Producer, status, control)
    }

    fn wconinje(&mut self, fields: &Fields<'_>) -> DeckResult<()> {
        let name = fields.required_text(0, "well name")?.to_string();
        let injected = parse_phase(fields, 1)?;
        let well_phase = self.well_mut(fields, &name)?.phase;
        if injected != well_phase {
            return Err(fields.error(format!(
                "injected phase {injected:?} differs from the WELSPECS phase {well_phase:?}"
            )));
        }
        let status = parse_status(fields, 2)?;
        let rate_quantity = match injected {
            Phase::Gas => Quantity::GasRate,
            _ => Quantity::LiquidRate,
        };
        let control = match fields.upper(3, "control mode")?.as_str() {
            "RATE" => WellControl {
                mode: ControlMode::SurfaceRate,
                target: to_canonical(self.units, rate_quantity, fields.float(4, "surface rate")?),
                bhp_limit_bar: fields
                    .opt_float(6, "BHP limit")?
                    .map(|v| to_canonical(self.units, Quantity::Pressure, v)),
            },
            "BHP" => WellControl {
                mode: ControlMode::Bhp,
                target: to_canonical(self.units, Quantity::Pressure, fields.float(6, "BHP")?),
                bhp_limit_bar: None,
            },
            other => {
                return Err(fields.error(format!("unsupported injector control mode '{other}'")));
            }
        };
        self.apply_control(fields, &name, WellKind::Injector, status, control)
    }

    fn advance(&mut self, kw: &RawKeyword, days: f64) -> DeckResult<()> {
        if days <= 0.0 {
            return Err(kw_error(kw, format!("time step of {days} days is not positive")));
        }
        self.elapsed_days += days;
        self.advanced = true;
        self.events.push(ScheduleEvent::Advance { days });
        Ok(())
    }

    fn keyword(&mut self, kw: &RawKeyword) -> DeckResult<()> {
        match kw.name.as_str() {
            "WELSPECS" => {
                for record in &kw.records {
                    self.welspecs(&Fields::new(kw, record))?;
                }
            }
            "COMPDAT" => {
                for record in &kw.records {
                    self.compdat(&Fields::new(kw, record))?;
                }
            }
            "WCONPROD" => {
                for record in &kw.records {
                    self.wconprod(&Fields::new(kw, record))?;
                }
            }
            "WCONINJE" => {
                for record in &kw.records {
                    self.wconinje(&Fields::new(kw, record))?;
                }
            }
            "TSTEP" => {
                for value in numbers(kw)? {
                    let days = to_canonical(self.units, Quantity::Time, value);
                    self.advance(kw, days)?;
                }
            }
            "DATES" => {
                for record in &kw.records {
                    let date = read_date(&Fields::new(kw, record))?;
                    let target = (date - self.start_date).num_days() as f64;
                    self.advance(kw, target - self.elapsed_days)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn finish(self) -> DeckResult<(Vec<WellDef>, ScheduleDef)> {
        let mut wells = Vec::with_capacity(self.wells.len());
        for draft in self.wells {
            let completion = draft.completion.ok_or_else(|| {
                DeckError::structural(
                    draft.loc.clone(),
                    Some("COMPDAT"),
                    format!("well '{}' has no connections", draft.name),
                )
            })?;
            let (Some(kind), Some((status, control))) = (draft.kind, draft.initial) else {
                return Err(DeckError::structural(
                    draft.loc.clone(),
                    Some("WELSPECS"),
                    format!("well '{}' has no WCONPROD or WCONINJE control", draft.name),
                ));
            };
            wells.push(WellDef {
                name: draft.name,
                group: draft.group,
                i: draft.i,
                j: draft.j,
                ref_depth_m: draft.ref_depth_m,
                kind,
                phase: draft.phase,
                completion,
                status,
                control,
            });
        }
        Ok((
            wells,
            ScheduleDef {
                events: self.events,
            },
        ))
    }
}

/// Interpret a raw deck as a canonical request.
pub fn interpret(deck: &RawDeck) -> DeckResult<SimRequest> {
    let runspec = read_runspec(deck)?;
    let units = runspec.units;
    let n = runspec.dims.cell_count();

    let geometry = read_geometry(deck, runspec.dims, units)?;
    let properties = read_properties(deck, n, units)?;
    let pore_volume_multipliers = deck
        .find(Section::Edit, "MULTPV")
        .map(|kw| array(kw, n, units, Quantity::Dimensionless))
        .transpose()?;
    let pvt = read_pvt(deck, runspec.phases, units)?;
    let relperm = read_relperm(deck, runspec.phases, units)?;
    check_regions(deck, n)?;
    let equilibration = read_equilibration(deck, units)?;

    let mut schedule = ScheduleReader {
        units,
        start_date: runspec.start_date,
        elapsed_days: 0.0,
        advanced: false,
        wells: Vec::new(),
        events: Vec::new(),
    };
    for kw in deck.in_section(Section::Schedule) {
        schedule.keyword(kw)?;
    }
    let (wells, schedule) = schedule.finish()?;

    tracing::debug!(
        units = %units,
        cells = n,
        wells = wells.len(),
        events = schedule.events.len(),
        "interpreted deck"
    );

    Ok(SimRequest {
        title: runspec.title,
        start_date: runspec.start_date,
        grid: GridDef {
            dims: runspec.dims,
            geometry,
        },
        properties,
        pore_volume_multipliers,
        phases: runspec.phases,
        pvt,
        relperm,
        equilibration,
        wells,
        schedule,
    })
}
