//! Canonical `SimRequest` -> deck text.

use chrono::Datelike;
use pal_core::units::{from_canonical, Quantity, UnitSystem};
use pal_model::*;

use crate::format::{
    array_record, compress, format_sig, EDIT_DIGITS, GRID_DIGITS, PROPS_DIGITS, SCHEDULE_DIGITS,
    SOLUTION_DIGITS,
};
use crate::{DeckError, DeckOptions, DeckResult};

/// Rows used when sampling a Corey parametrisation into tables.
pub const COREY_ROWS: usize = 11;

const MONTHS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

const FIELD_VECTORS: [&str; 8] = ["FOPR", "FWPR", "FGPR", "FWIR", "FGIR", "FOPT", "FWPT", "FGPT"];
const WELL_VECTORS: [&str; 9] = [
    "WOPR", "WWPR", "WGPR", "WWIR", "WGIR", "WBHP", "WOPT", "WWPT", "WGPT",
];

struct DeckWriter {
    out: String,
    units: UnitSystem,
}

impl DeckWriter {
    fn line(&mut self, text: &str) {
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    fn num(&self, quantity: Quantity, value: f64, digits: usize) -> String {
        format_sig(from_canonical(self.units, quantity, value), digits)
    }

    fn array(&mut self, keyword: &str, values: &[f64], quantity: Quantity, digits: usize) {
        let converted: Vec<f64> = values
            .iter()
            .map(|v| from_canonical(self.units, quantity, *v))
            .collect();
        self.line(keyword);
        self.out.push_str(&array_record(&converted, digits));
    }

    /// One record per row, the final row carrying the terminating `/`.
    fn table(&mut self, keyword: &str, rows: &[Vec<String>]) {
        self.line(keyword);
        for row in rows {
            self.out.push(' ');
            self.out.push_str(&row.join(" "));
            self.out.push('\n');
        }
        self.line(" /");
    }

    /// A multi-record keyword; each record is terminated, then the block.
    fn records(&mut self, keyword: &str, records: &[Vec<String>]) {
        self.line(keyword);
        for record in records {
            self.out.push(' ');
            self.out.push_str(&compress(record).join(" "));
            self.line(" /");
        }
        self.line("/");
    }
}

fn quoted(s: &str) -> String {
    format!("'{s}'")
}

fn default_token() -> String {
    "1*".to_string()
}

fn corey_swof(p: &CoreyParams) -> Vec<SwofRow> {
    let span = 1.0 - p.swc - p.sorw;
    (0..COREY_ROWS)
        .map(|idx| {
            let s = idx as f64 / (COREY_ROWS - 1) as f64;
            SwofRow {
                sw: p.swc + s * span,
                krw: p.krw_max * s.powf(p.nw),
                krow: p.kro_max * (1.0 - s).powf(p.now),
                pcow_bar: 0.0,
            }
        })
        .collect()
}

fn corey_sgof(p: &CoreyParams) -> Vec<SgofRow> {
    let sg_max = 1.0 - p.swc - p.sorg;
    (0..COREY_ROWS)
        .map(|idx| {
            let sg = sg_max * idx as f64 / (COREY_ROWS - 1) as f64;
            let mobile = ((sg - p.sgc) / (sg_max - p.sgc)).clamp(0.0, 1.0);
            SgofRow {
                sg,
                krg: p.krg_max * mobile.powf(p.ng),
                krog: p.kro_max * (1.0 - sg / sg_max).powf(p.nog),
                pcog_bar: 0.0,
            }
        })
        .collect()
}

fn rate_quantity(mode: ControlMode, phase: Phase) -> Quantity {
    match mode {
        ControlMode::GasRate => Quantity::GasRate,
        ControlMode::SurfaceRate if phase == Phase::Gas => Quantity::GasRate,
        ControlMode::Bhp => Quantity::Pressure,
        _ => Quantity::LiquidRate,
    }
}

fn status_token(status: WellStatus) -> String {
    quoted(match status {
        WellStatus::Open => "OPEN",
        WellStatus::Shut => "SHUT",
    })
}

fn control_record(
    w: &DeckWriter,
    well: &WellDef,
    status: WellStatus,
    control: &WellControl,
) -> DeckResult<Vec<String>> {
    if !control.mode.valid_for(well.kind) {
        return Err(DeckError::generate(format!(
            "control mode {:?} is not valid for {:?} '{}'",
            control.mode, well.kind, well.name
        )));
    }
    let target = w.num(
        rate_quantity(control.mode, well.phase),
        control.target,
        SCHEDULE_DIGITS,
    );
    let limit = control
        .bhp_limit_bar
        .map(|v| w.num(Quantity::Pressure, v, SCHEDULE_DIGITS))
        .unwrap_or_else(default_token);

    let mut record = vec![quoted(&well.name)];
    match well.kind {
        WellKind::Producer => {
            // name status mode ORAT WRAT GRAT LRAT RESV BHP
            let (mode, slot) = match control.mode {
                ControlMode::OilRate => ("ORAT", 0),
                ControlMode::WaterRate => ("WRAT", 1),
                ControlMode::GasRate => ("GRAT", 2),
                ControlMode::LiquidRate => ("LRAT", 3),
                ControlMode::Bhp => ("BHP", 5),
                ControlMode::SurfaceRate => surface_rate_on_producer(well)?,
            };
            record.push(status_token(status));
            record.push(quoted(mode));
            let mut slots = vec![default_token(); 6];
            slots[slot] = target;
            if control.mode != ControlMode::Bhp {
                slots[5] = limit;
            }
            record.extend(slots);
        }
        WellKind::Injector => {
            // name type status mode RATE RESV BHP
            record.push(quoted(well.phase.deck_name()));
            record.push(status_token(status));
            match control.mode {
                ControlMode::SurfaceRate => {
                    record.push(quoted("RATE"));
                    record.extend([target, default_token(), limit]);
                }
                _ => {
                    record.push(quoted("BHP"));
                    record.extend([default_token(), default_token(), target]);
                }
            }
        }
    }
    Ok(record)
}

fn surface_rate_on_producer(well: &WellDef) -> DeckResult<(&'static str, usize)> {
    Err(DeckError::generate(format!(
        "producer '{}' cannot use an injector surface-rate control",
        well.name
    )))
}

fn control_keyword(kind: WellKind) -> &'static str {
    match kind {
        WellKind::Producer => "WCONPROD",
        WellKind::Injector => "WCONINJE",
    }
}

fn write_runspec(w: &mut DeckWriter, req: &SimRequest) -> DeckResult<()> {
    let dims = req.dims();
    let unit_keyword = w.units.deck_keyword().ok_or_else(|| {
        DeckError::generate(format!("unit system {} has no deck keyword", w.units))
    })?;

    w.line("RUNSPEC");
    if !title_fits_deck(&req.title) {
        return Err(DeckError::generate(format!(
            "title {:?} cannot be written on a single untrimmed deck line",
            req.title
        )));
    }
    w.line("TITLE");
    w.line(&req.title);
    w.blank();
    w.line("DIMENS");
    w.line(&format!(" {} {} {} /", dims.nx, dims.ny, dims.nz));
    w.blank();
    for (flag, keyword) in [
        (req.phases.oil, "OIL"),
        (req.phases.water, "WATER"),
        (req.phases.gas, "GAS"),
    ] {
        if flag {
            w.line(keyword);
        }
    }
    w.line(unit_keyword);
    w.blank();

    let start = req.start_date;
    w.line("START");
    w.line(&format!(
        " {} '{}' {} /",
        start.day(),
        MONTHS[start.month0() as usize],
        start.year()
    ));
    w.blank();
    w.line("WELLDIMS");
    w.line(&format!(
        " {} {} 1 {} /",
        req.wells.len().max(1),
        dims.nz,
        req.wells.len().max(1)
    ));
    w.line("TABDIMS");
    w.line(" 1 1 /");
    w.line("EQLDIMS");
    w.line(" 1 /");
    w.line("UNIFOUT");
    w.blank();
    Ok(())
}

fn write_grid(w: &mut DeckWriter, req: &SimRequest) {
    w.line("GRID");
    w.line("INIT");
    match &req.grid.geometry {
        CellGeometry::Cartesian {
            dx_m,
            dy_m,
            dz_m,
            tops_m,
        } => {
            w.array("DXV", dx_m, Quantity::Length, GRID_DIGITS);
            w.array("DYV", dy_m, Quantity::Length, GRID_DIGITS);
            w.array("DZV", dz_m, Quantity::Length, GRID_DIGITS);
            w.array("TOPS", tops_m, Quantity::Length, GRID_DIGITS);
        }
        CellGeometry::CornerPoint { coord_m, zcorn_m } => {
            w.array("COORD", coord_m, Quantity::Length, GRID_DIGITS);
            w.array("ZCORN", zcorn_m, Quantity::Length, GRID_DIGITS);
        }
    }
    let props = &req.properties;
    w.array("PORO", &props.porosity, Quantity::Dimensionless, GRID_DIGITS);
    w.array("PERMX", &props.permx_md, Quantity::Permeability, GRID_DIGITS);
    w.array("PERMY", &props.permy_md, Quantity::Permeability, GRID_DIGITS);
    w.array("PERMZ", &props.permz_md, Quantity::Permeability, GRID_DIGITS);
    if let Some(ntg) = &props.ntg {
        w.array("NTG", ntg, Quantity::Dimensionless, GRID_DIGITS);
    }
    w.blank();

    if let Some(multpv) = &req.pore_volume_multipliers {
        w.line("EDIT");
        w.array("MULTPV", multpv, Quantity::Dimensionless, EDIT_DIGITS);
        w.blank();
    }
}

fn write_props(w: &mut DeckWriter, req: &SimRequest) -> DeckResult<()> {
    let d = PROPS_DIGITS;
    let pvt = &req.pvt;
    w.line("PROPS");

    if let Some(water) = &pvt.water {
        w.line("PVTW");
        let record = [
            w.num(Quantity::Pressure, water.ref_pressure_bar, d),
            format_sig(water.bw, d),
            w.num(Quantity::Compressibility, water.compressibility_per_bar, d),
            w.num(Quantity::Viscosity, water.viscosity_cp, d),
            w.num(Quantity::Compressibility, water.viscosibility_per_bar, d),
        ];
        w.line(&format!(" {} /", record.join(" ")));
    }
    if let Some(oil) = &pvt.oil {
        let rows: Vec<Vec<String>> = oil
            .iter()
            .map(|r| {
                vec![
                    w.num(Quantity::Pressure, r.pressure_bar, d),
                    format_sig(r.bo, d),
                    w.num(Quantity::Viscosity, r.viscosity_cp, d),
                ]
            })
            .collect();
        w.table("PVDO", &rows);
    }
    if let Some(gas) = &pvt.gas {
        let rows: Vec<Vec<String>> = gas
            .iter()
            .map(|r| {
                vec![
                    w.num(Quantity::Pressure, r.pressure_bar, d),
                    w.num(Quantity::GasFvf, r.bg, d),
                    w.num(Quantity::Viscosity, r.viscosity_cp, d),
                ]
            })
            .collect();
        w.table("PVDG", &rows);
    }

    let rho = &pvt.surface_density;
    w.line("DENSITY");
    let record = [
        w.num(Quantity::Density, rho.oil_kg_m3, d),
        w.num(Quantity::Density, rho.water_kg_m3, d),
        w.num(Quantity::Density, rho.gas_kg_m3, d),
    ];
    w.line(&format!(" {} /", record.join(" ")));
    w.line("ROCK");
    let record = [
        w.num(Quantity::Pressure, pvt.rock.ref_pressure_bar, d),
        w.num(Quantity::Compressibility, pvt.rock.compressibility_per_bar, d),
    ];
    w.line(&format!(" {} /", record.join(" ")));

    let (swof, sgof) = match &req.relperm {
        RelPermDef::Tables { swof, sgof } => (swof.clone(), sgof.clone()),
        RelPermDef::Corey(params) => (
            corey_swof(params),
            req.phases.gas.then(|| corey_sgof(params)),
        ),
    };
    if swof.is_empty() {
        return Err(DeckError::generate("SWOF table is empty"));
    }
    let rows: Vec<Vec<String>> = swof
        .iter()
        .map(|r| {
            vec![
                format_sig(r.sw, d),
                format_sig(r.krw, d),
                format_sig(r.krow, d),
                w.num(Quantity::Pressure, r.pcow_bar, d),
            ]
        })
        .collect();
    w.table("SWOF", &rows);

    match sgof {
        Some(sgof) if req.phases.gas => {
            let rows: Vec<Vec<String>> = sgof
                .iter()
                .map(|r| {
                    vec![
                        format_sig(r.sg, d),
                        format_sig(r.krg, d),
                        format_sig(r.krog, d),
                        w.num(Quantity::Pressure, r.pcog_bar, d),
                    ]
                })
                .collect();
            w.table("SGOF", &rows);
        }
        None if req.phases.gas => {
            return Err(DeckError::generate("gas phase requires an SGOF table"));
        }
        _ => {}
    }
    w.blank();
    Ok(())
}

fn write_regions(w: &mut DeckWriter, req: &SimRequest) {
    w.line("REGIONS");
    w.line("SATNUM");
    w.line(&format!(" {}*1 /", req.cell_count()));
    w.blank();
}

fn write_solution(w: &mut DeckWriter, req: &SimRequest) {
    let d = SOLUTION_DIGITS;
    let eq = &req.equilibration;
    w.line("SOLUTION");
    w.line("EQUIL");
    let goc = eq
        .goc_depth_m
        .map(|v| w.num(Quantity::Length, v, d))
        .unwrap_or_else(default_token);
    w.line(&format!(
        " {} {} {} 0 {} 0 /",
        w.num(Quantity::Length, eq.datum_depth_m, d),
        w.num(Quantity::Pressure, eq.datum_pressure_bar, d),
        w.num(Quantity::Length, eq.woc_depth_m, d),
        goc
    ));
    w.line("RPTRST");
    w.line(" 'BASIC=2' /");
    w.blank();
}

fn write_summary(w: &mut DeckWriter) {
    w.line("SUMMARY");
    for v in FIELD_VECTORS {
        w.line(v);
    }
    for v in WELL_VECTORS {
        w.line(v);
        w.line(" /");
    }
    w.blank();
}

fn write_schedule(w: &mut DeckWriter, req: &SimRequest) -> DeckResult<()> {
    w.line("SCHEDULE");
    w.line("RPTRST");
    w.line(" 'BASIC=2' /");

    if !req.wells.is_empty() {
        let welspecs: Vec<Vec<String>> = req
            .wells
            .iter()
            .map(|well| {
                vec![
                    quoted(&well.name),
                    quoted(&well.group),
                    well.i.to_string(),
                    well.j.to_string(),
                    well.ref_depth_m
                        .map(|v| w.num(Quantity::Length, v, SCHEDULE_DIGITS))
                        .unwrap_or_else(default_token),
                    quoted(well.phase.deck_name()),
                ]
            })
            .collect();
        w.records("WELSPECS", &welspecs);

        let compdat: Vec<Vec<String>> = req
            .wells
            .iter()
            .map(|well| {
                vec![
                    quoted(&well.name),
                    default_token(),
                    default_token(),
                    well.completion.k1.to_string(),
                    well.completion.k2.to_string(),
                    quoted("OPEN"),
                ]
            })
            .collect();
        w.records("COMPDAT", &compdat);

        for kind in [WellKind::Producer, WellKind::Injector] {
            let records = req
                .wells
                .iter()
                .filter(|well| well.kind == kind)
                .map(|well| control_record(w, well, well.status, &well.control))
                .collect::<DeckResult<Vec<_>>>()?;
            if !records.is_empty() {
                w.records(control_keyword(kind), &records);
            }
        }
    }

    for event in &req.schedule.events {
        match event {
            ScheduleEvent::Advance { days } => {
                if *days <= 0.0 {
                    return Err(DeckError::generate(format!(
                        "time step of {days} days is not positive"
                    )));
                }
                w.line("TSTEP");
                let step = w.num(Quantity::Time, *days, SCHEDULE_DIGITS);
                w.line(&format!(" {step} /"));
            }
            ScheduleEvent::Control {
                well,
                status,
                control,
            } => {
                let def = req.well(well).ok_or_else(|| {
                    DeckError::generate(format!("schedule refers to unknown well '{well}'"))
                })?;
                let record = control_record(w, def, *status, control)?;
                w.records(control_keyword(def.kind), &[record]);
            }
        }
    }
    w.blank();
    w.line("END");
    Ok(())
}

/// Emit the full deck. Sections are always written in the same order; EDIT
/// only when pore-volume multipliers are present.
pub fn generate(req: &SimRequest, options: &DeckOptions) -> DeckResult<String> {
    let mut w = DeckWriter {
        out: String::new(),
        units: options.unit_system,
    };
    w.line(&format!("-- {} ({} units)", req.title.trim(), options.unit_system));
    w.blank();

    write_runspec(&mut w, req)?;
    write_grid(&mut w, req);
    write_props(&mut w, req)?;
    write_regions(&mut w, req);
    write_solution(&mut w, req);
    write_summary(&mut w);
    write_schedule(&mut w, req)?;

    tracing::debug!(
        bytes = w.out.len(),
        units = %options.unit_system,
        wells = req.wells.len(),
        "generated deck"
    );
    Ok(w.out)
}
