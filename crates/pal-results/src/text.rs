//! Text streams written by scripted backends.
//!
//! `<CASE>.summary.csv` holds one row per (report step, well);
//! `<CASE>.cells.csv` holds one row per (report step, cell). Both start with
//! `# key: value` metadata lines, of which `units` is required. Empty fields
//! are absent values.

use std::fmt::Write as _;
use std::path::Path;

use pal_core::units::{from_canonical, to_canonical, Quantity, UnitSystem};
use pal_model::{CellArrays, GridDims, PhaseConfig, WellState};

use crate::{DecodeError, DecodeResult};

pub const SUMMARY_COLUMNS: [&str; 12] = [
    "report_step",
    "time",
    "well",
    "oil_rate",
    "water_rate",
    "gas_rate",
    "water_injection_rate",
    "gas_injection_rate",
    "bhp",
    "cumulative_oil",
    "cumulative_water",
    "cumulative_gas",
];

pub const CELL_COLUMNS: [&str; 6] = ["report_step", "time", "cell", "pressure", "swat", "sgas"];

/// Well values of one report step, canonical units.
#[derive(Debug, Clone, PartialEq)]
pub struct WellStep {
    pub report_step: u32,
    pub time_days: f64,
    pub wells: Vec<WellState>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextSummary {
    pub unit_system: UnitSystem,
    pub steps: Vec<WellStep>,
}

/// Cell values of one report step, canonical units.
#[derive(Debug, Clone, PartialEq)]
pub struct CellStep {
    pub report_step: u32,
    pub time_days: f64,
    pub cells: CellArrays,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextCells {
    pub unit_system: UnitSystem,
    pub dims: Option<GridDims>,
    pub phases: Option<PhaseConfig>,
    pub steps: Vec<CellStep>,
}

struct Line<'a> {
    offset: u64,
    fields: Vec<&'a str>,
}

struct Table<'a> {
    source: &'a str,
    unit_system: UnitSystem,
    meta: Vec<(&'a str, &'a str)>,
    rows: Vec<Line<'a>>,
}

impl<'a> Table<'a> {
    fn error(&self, offset: u64, message: impl Into<String>) -> DecodeError {
        DecodeError::Content {
            source_name: self.source.to_string(),
            offset: Some(offset),
            message: message.into(),
        }
    }

    fn meta(&self, key: &str) -> Option<&'a str> {
        self.meta.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }

    fn optional(&self, line: &Line<'_>, col: usize, quantity: Quantity) -> DecodeResult<Option<f64>> {
        match line.fields.get(col).map(|f| f.trim()) {
            None | Some("") => Ok(None),
            Some(text) => {
                let value: f64 = text.parse().map_err(|_| {
                    self.error(line.offset, format!("column {} holds '{text}', not a number", col + 1))
                })?;
                if !value.is_finite() {
                    return Err(self.error(line.offset, format!("column {} is not finite", col + 1)));
                }
                Ok(Some(to_canonical(self.unit_system, quantity, value)))
            }
        }
    }

    fn required(&self, line: &Line<'_>, col: usize, quantity: Quantity) -> DecodeResult<f64> {
        self.optional(line, col, quantity)?
            .ok_or_else(|| self.error(line.offset, format!("column {} is empty", col + 1)))
    }

    fn index(&self, line: &Line<'_>, col: usize) -> DecodeResult<usize> {
        let text = line.fields.get(col).map(|f| f.trim()).unwrap_or("");
        text.parse()
            .map_err(|_| self.error(line.offset, format!("column {} holds '{text}', not an index", col + 1)))
    }
}

fn split_table<'a>(text: &'a str, source: &'a str, columns: &[&str]) -> DecodeResult<Table<'a>> {
    let mut meta = Vec::new();
    let mut rows = Vec::new();
    let mut header_seen = false;
    let mut offset = 0u64;
    let error = |offset: u64, message: String| DecodeError::Content {
        source_name: source.to_string(),
        offset: Some(offset),
        message,
    };

    for raw in text.split_inclusive('\n') {
        let line_offset = offset;
        offset += raw.len() as u64;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix('#') {
            if let Some((key, value)) = rest.split_once(':') {
                meta.push((key.trim(), value.trim()));
            }
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if !header_seen {
            if fields != columns {
                return Err(error(
                    line_offset,
                    format!("header is '{line}', expected '{}'", columns.join(",")),
                ));
            }
            header_seen = true;
            continue;
        }
        if fields.len() != columns.len() {
            return Err(DecodeError::Record {
                source_name: source.to_string(),
                offset: line_offset,
                expected: columns.len(),
                found: fields.len(),
                message: "row has the wrong number of fields".to_string(),
            });
        }
        rows.push(Line {
            offset: line_offset,
            fields,
        });
    }

    if !header_seen {
        return Err(DecodeError::Content {
            source_name: source.to_string(),
            offset: None,
            message: "no header row".to_string(),
        });
    }
    let units = meta
        .iter()
        .find(|(k, _)| *k == "units")
        .map(|(_, v)| *v)
        .ok_or_else(|| DecodeError::Content {
            source_name: source.to_string(),
            offset: None,
            message: "no '# units:' line".to_string(),
        })?;
    let unit_system = UnitSystem::from_label(units)?;

    Ok(Table {
        source,
        unit_system,
        meta,
        rows,
    })
}

/// Rows grouped by report step in file order; a step may not reappear.
fn grouped<'t, 'a>(table: &'t Table<'a>) -> DecodeResult<Vec<(u32, Vec<&'t Line<'a>>)>> {
    let mut groups: Vec<(u32, Vec<&Line<'a>>)> = Vec::new();
    for line in &table.rows {
        let step = u32::try_from(table.index(line, 0)?)
            .map_err(|_| table.error(line.offset, "report step out of range"))?;
        match groups.last_mut() {
            Some((current, lines)) if *current == step => lines.push(line),
            _ => {
                if groups.iter().any(|(s, _)| *s == step) {
                    return Err(table.error(line.offset, format!("report step {step} is not contiguous")));
                }
                groups.push((step, vec![line]));
            }
        }
    }
    Ok(groups)
}

fn step_time(table: &Table<'_>, lines: &[&Line<'_>]) -> DecodeResult<f64> {
    let first = lines[0];
    let time = table.required(first, 1, Quantity::Time)?;
    for line in &lines[1..] {
        let t = table.required(line, 1, Quantity::Time)?;
        if (t - time).abs() > 1e-9 * time.abs().max(1.0) {
            return Err(table.error(line.offset, "time differs within one report step"));
        }
    }
    Ok(time)
}

pub fn parse_summary_csv(text: &str, source: &str) -> DecodeResult<TextSummary> {
    let table = split_table(text, source, &SUMMARY_COLUMNS)?;
    let mut steps = Vec::new();
    for (report_step, lines) in grouped(&table)? {
        let time_days = step_time(&table, &lines)?;
        let mut wells = Vec::with_capacity(lines.len());
        for line in lines {
            let name = line.fields[2];
            if name.is_empty() {
                return Err(table.error(line.offset, "well name is empty"));
            }
            let liquid = Quantity::LiquidRate;
            let gas = Quantity::GasRate;
            wells.push(WellState {
                name: name.to_string(),
                oil_rate_m3_per_day: table.optional(line, 3, liquid)?,
                water_rate_m3_per_day: table.optional(line, 4, liquid)?,
                gas_rate_m3_per_day: table.optional(line, 5, gas)?,
                water_injection_rate_m3_per_day: table.optional(line, 6, liquid)?,
                gas_injection_rate_m3_per_day: table.optional(line, 7, gas)?,
                bhp_bar: table.optional(line, 8, Quantity::Pressure)?,
                cumulative_oil_m3: table.optional(line, 9, Quantity::LiquidVolume)?,
                cumulative_water_m3: table.optional(line, 10, Quantity::LiquidVolume)?,
                cumulative_gas_m3: table.optional(line, 11, Quantity::GasVolume)?,
            });
        }
        steps.push(WellStep {
            report_step,
            time_days,
            wells,
        });
    }
    Ok(TextSummary {
        unit_system: table.unit_system,
        steps,
    })
}

fn parse_dims(table: &Table<'_>) -> DecodeResult<Option<GridDims>> {
    let Some(text) = table.meta("dims") else {
        return Ok(None);
    };
    let parts: Vec<usize> = text
        .split_whitespace()
        .map(|p| p.parse::<usize>().ok().filter(|n| *n > 0))
        .collect::<Option<_>>()
        .filter(|v: &Vec<usize>| v.len() == 3)
        .ok_or_else(|| DecodeError::Content {
            source_name: table.source.to_string(),
            offset: None,
            message: format!("invalid dims line '{text}'"),
        })?;
    Ok(Some(GridDims::new(parts[0], parts[1], parts[2])))
}

fn parse_phases(table: &Table<'_>) -> DecodeResult<Option<PhaseConfig>> {
    let Some(text) = table.meta("phases") else {
        return Ok(None);
    };
    text.parse::<i32>()
        .ok()
        .and_then(PhaseConfig::from_ecl_code)
        .map(Some)
        .ok_or_else(|| DecodeError::Content {
            source_name: table.source.to_string(),
            offset: None,
            message: format!("invalid phases line '{text}'"),
        })
}

pub fn parse_cells_csv(text: &str, source: &str) -> DecodeResult<TextCells> {
    let table = split_table(text, source, &CELL_COLUMNS)?;
    let dims = parse_dims(&table)?;
    let phases = parse_phases(&table)?;

    let mut steps = Vec::new();
    for (report_step, lines) in grouped(&table)? {
        let time_days = step_time(&table, &lines)?;
        let n = lines.len();
        let mut pressure = Vec::with_capacity(n);
        let mut swat = Vec::with_capacity(n);
        let mut sgas = Vec::with_capacity(n);
        for (expected, line) in lines.iter().enumerate() {
            let cell = table.index(line, 2)?;
            if cell != expected {
                return Err(table.error(
                    line.offset,
                    format!("cell {cell} out of order in report step {report_step}, expected {expected}"),
                ));
            }
            pressure.push(table.required(line, 3, Quantity::Pressure)?);
            swat.push(table.required(line, 4, Quantity::Dimensionless)?);
            sgas.push(table.optional(line, 5, Quantity::Dimensionless)?);
        }
        let sgas = if sgas.iter().all(Option::is_none) {
            None
        } else {
            let values: Option<Vec<f64>> = sgas.into_iter().collect();
            let Some(values) = values else {
                return Err(table.error(lines[0].offset, format!("report step {report_step} has sgas for some cells only")));
            };
            Some(values)
        };
        if let Some(d) = dims
            && d.cell_count() != n
        {
            return Err(DecodeError::Record {
                source_name: source.to_string(),
                offset: lines[0].offset,
                expected: d.cell_count(),
                found: n,
                message: format!("report step {report_step} has the wrong number of cells"),
            });
        }
        steps.push(CellStep {
            report_step,
            time_days,
            cells: CellArrays::from_primary(pressure, swat, sgas)?,
        });
    }

    Ok(TextCells {
        unit_system: table.unit_system,
        dims,
        phases,
        steps,
    })
}

fn read_text(path: &Path) -> DecodeResult<String> {
    std::fs::read_to_string(path).map_err(|source| DecodeError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn read_summary_csv(path: &Path) -> DecodeResult<TextSummary> {
    parse_summary_csv(&read_text(path)?, &path.display().to_string())
}

pub fn read_cells_csv(path: &Path) -> DecodeResult<TextCells> {
    parse_cells_csv(&read_text(path)?, &path.display().to_string())
}

fn label(system: UnitSystem) -> &'static str {
    match system {
        UnitSystem::Metric => "METRIC",
        UnitSystem::Field => "FIELD",
        UnitSystem::Lab => "LAB",
        UnitSystem::StrictSi => "SI",
    }
}

fn cell(out: &mut String, system: UnitSystem, quantity: Quantity, value: Option<f64>) {
    out.push(',');
    if let Some(v) = value {
        let _ = write!(out, "{}", from_canonical(system, quantity, v));
    }
}

/// Render canonical well steps as a summary stream in `system` units.
pub fn write_summary_csv(system: UnitSystem, steps: &[WellStep]) -> String {
    let mut out = format!("# units: {}\n{}\n", label(system), SUMMARY_COLUMNS.join(","));
    for step in steps {
        let time = from_canonical(system, Quantity::Time, step.time_days);
        for w in &step.wells {
            let _ = write!(out, "{},{},{}", step.report_step, time, w.name);
            cell(&mut out, system, Quantity::LiquidRate, w.oil_rate_m3_per_day);
            cell(&mut out, system, Quantity::LiquidRate, w.water_rate_m3_per_day);
            cell(&mut out, system, Quantity::GasRate, w.gas_rate_m3_per_day);
            cell(&mut out, system, Quantity::LiquidRate, w.water_injection_rate_m3_per_day);
            cell(&mut out, system, Quantity::GasRate, w.gas_injection_rate_m3_per_day);
            cell(&mut out, system, Quantity::Pressure, w.bhp_bar);
            cell(&mut out, system, Quantity::LiquidVolume, w.cumulative_oil_m3);
            cell(&mut out, system, Quantity::LiquidVolume, w.cumulative_water_m3);
            cell(&mut out, system, Quantity::GasVolume, w.cumulative_gas_m3);
            out.push('\n');
        }
    }
    out
}

/// Render canonical cell steps as a cell stream in `system` units.
pub fn write_cells_csv(system: UnitSystem, dims: GridDims, phases: PhaseConfig, steps: &[CellStep]) -> String {
    let mut out = format!(
        "# units: {}\n# dims: {} {} {}\n# phases: {}\n{}\n",
        label(system),
        dims.nx,
        dims.ny,
        dims.nz,
        phases.ecl_code(),
        CELL_COLUMNS.join(",")
    );
    for step in steps {
        let time = from_canonical(system, Quantity::Time, step.time_days);
        let c = &step.cells;
        for idx in 0..c.len() {
            let _ = write!(out, "{},{},{}", step.report_step, time, idx);
            cell(&mut out, system, Quantity::Pressure, Some(c.pressure_bar[idx]));
            cell(&mut out, system, Quantity::Dimensionless, Some(c.water_saturation[idx]));
            cell(
                &mut out,
                system,
                Quantity::Dimensionless,
                c.gas_saturation.as_ref().map(|s| s[idx]),
            );
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUMMARY: &str = "\
# units: SI
# written by a driver script
report_step,time,well,oil_rate,water_rate,gas_rate,water_injection_rate,gas_injection_rate,bhp,cumulative_oil,cumulative_water,cumulative_gas
1,86400,PROD1,0.001,0.0005,,,,2.5e7,86.4,43.2,
1,86400,INJ1,,,,0.002,,3.1e7,,,
2,172800,PROD1,0.001,0.0006,,,,2.4e7,172.8,95.04,
";

    #[test]
    fn strict_si_summary_is_converted() {
        let summary = parse_summary_csv(SUMMARY, "s").unwrap();
        assert_eq!(summary.unit_system, UnitSystem::StrictSi);
        assert_eq!(summary.steps.len(), 2);
        let step = &summary.steps[0];
        assert!((step.time_days - 1.0).abs() < 1e-12);
        let prod = &step.wells[0];
        assert!((prod.oil_rate_m3_per_day.unwrap() - 86.4).abs() < 1e-9);
        assert!((prod.bhp_bar.unwrap() - 250.0).abs() < 1e-9);
        assert_eq!(prod.gas_rate_m3_per_day, None);
        let inj = &step.wells[1];
        assert!((inj.water_injection_rate_m3_per_day.unwrap() - 172.8).abs() < 1e-9);
    }

    #[test]
    fn non_numeric_field_reports_line_offset() {
        let text = SUMMARY.replace("2.4e7", "high");
        let err = parse_summary_csv(&text, "s").unwrap_err();
        let offset = text.find("2,172800").unwrap() as u64;
        assert!(
            matches!(err, DecodeError::Content { offset: Some(o), .. } if o == offset),
            "{err}"
        );
    }

    #[test]
    fn missing_units_line_is_an_error() {
        let text = SUMMARY.replace("# units: SI\n", "");
        assert!(parse_summary_csv(&text, "s").is_err());
    }

    #[test]
    fn cells_written_in_field_units_read_back_canonical() {
        let cells = CellArrays::from_primary(vec![200.0, 210.0], vec![0.2, 0.3], Some(vec![0.1, 0.0])).unwrap();
        let steps = vec![CellStep {
            report_step: 4,
            time_days: 120.0,
            cells,
        }];
        let text = write_cells_csv(UnitSystem::Field, GridDims::new(2, 1, 1), PhaseConfig::black_oil(), &steps);
        let parsed = parse_cells_csv(&text, "c").unwrap();
        assert_eq!(parsed.dims, Some(GridDims::new(2, 1, 1)));
        assert_eq!(parsed.phases, Some(PhaseConfig::black_oil()));
        let back = &parsed.steps[0];
        assert_eq!(back.report_step, 4);
        for (a, b) in back.cells.pressure_bar.iter().zip(&steps[0].cells.pressure_bar) {
            assert!((a - b).abs() < 1e-9);
        }
        assert!((back.cells.oil_saturation[0] - 0.7).abs() < 1e-12);
    }

    #[test]
    fn cells_out_of_order_are_rejected() {
        let text = "# units: METRIC\nreport_step,time,cell,pressure,swat,sgas\n0,0,1,200,0.2,\n0,0,0,200,0.2,\n";
        let err = parse_cells_csv(text, "c").unwrap_err();
        assert!(err.to_string().contains("out of order"), "{err}");
    }
}
