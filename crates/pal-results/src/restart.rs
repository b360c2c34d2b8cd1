//! Unified restart stream (`<CASE>.UNRST`): one block of per-cell arrays per
//! report step, each block opened by SEQNUM.

use std::path::Path;

use pal_core::units::{slice_to_canonical, Quantity, UnitSystem};
use pal_model::{CellArrays, GridDims, PhaseConfig};

use crate::binary::{self, BinData, BinKeyword, BinaryWriter, Endian};
use crate::{DecodeError, DecodeResult};

pub const INTEHEAD_UNIT: usize = 2;
pub const INTEHEAD_NX: usize = 8;
pub const INTEHEAD_NY: usize = 9;
pub const INTEHEAD_NZ: usize = 10;
pub const INTEHEAD_NACTIVE: usize = 11;
pub const INTEHEAD_PHASE: usize = 14;
const INTEHEAD_MIN_LEN: usize = 15;

/// One report step as stored, in the file's unit system.
#[derive(Debug, Clone, PartialEq)]
pub struct RestartStep {
    pub report_step: u32,
    pub time_days: f64,
    pub pressure: Vec<f64>,
    pub swat: Vec<f64>,
    pub sgas: Option<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestartData {
    pub unit_system: UnitSystem,
    pub dims: GridDims,
    pub phases: PhaseConfig,
    pub steps: Vec<RestartStep>,
}

impl RestartData {
    /// Canonical cell arrays of `step`; oil saturation is derived.
    pub fn cells(&self, step: &RestartStep) -> DecodeResult<CellArrays> {
        let mut pressure = step.pressure.clone();
        slice_to_canonical(self.unit_system, Quantity::Pressure, &mut pressure);
        let swat = if self.phases.water {
            step.swat.clone()
        } else {
            vec![0.0; pressure.len()]
        };
        let sgas = if self.phases.gas { step.sgas.clone() } else { None };
        Ok(CellArrays::from_primary(pressure, swat, sgas)?)
    }
}

struct Block<'a> {
    seqnum: &'a BinKeyword,
    keywords: Vec<&'a BinKeyword>,
}

impl<'a> Block<'a> {
    fn get(&self, name: &str) -> Option<&'a BinKeyword> {
        self.keywords.iter().copied().find(|k| k.name == name)
    }
}

fn content(source: &str, offset: u64, message: impl Into<String>) -> DecodeError {
    DecodeError::Content {
        source_name: source.to_string(),
        offset: Some(offset),
        message: message.into(),
    }
}

fn numeric(kw: &BinKeyword, source: &str, expected: usize) -> DecodeResult<Vec<f64>> {
    let values = kw
        .data
        .to_f64()
        .ok_or_else(|| content(source, kw.offset, format!("{} is not numeric", kw.name)))?;
    if values.len() != expected {
        return Err(DecodeError::Record {
            source_name: source.to_string(),
            offset: kw.offset,
            expected,
            found: values.len(),
            message: format!("{} has the wrong number of cells", kw.name),
        });
    }
    Ok(values)
}

struct Header {
    unit_system: UnitSystem,
    dims: GridDims,
    phases: PhaseConfig,
}

fn header(kw: &BinKeyword, source: &str) -> DecodeResult<Header> {
    let ints = kw
        .data
        .as_ints()
        .ok_or_else(|| content(source, kw.offset, "INTEHEAD is not integer data"))?;
    if ints.len() < INTEHEAD_MIN_LEN {
        return Err(DecodeError::Record {
            source_name: source.to_string(),
            offset: kw.offset,
            expected: INTEHEAD_MIN_LEN,
            found: ints.len(),
            message: "INTEHEAD is too short".to_string(),
        });
    }
    let unit_system = UnitSystem::from_ecl_code(ints[INTEHEAD_UNIT])?;
    let dim = |idx: usize| {
        usize::try_from(ints[idx])
            .ok()
            .filter(|v| *v > 0)
            .ok_or_else(|| content(source, kw.offset, format!("invalid grid dimension {}", ints[idx])))
    };
    let dims = GridDims::new(dim(INTEHEAD_NX)?, dim(INTEHEAD_NY)?, dim(INTEHEAD_NZ)?);
    let nactive = ints[INTEHEAD_NACTIVE];
    if usize::try_from(nactive).ok() != Some(dims.cell_count()) {
        return Err(content(
            source,
            kw.offset,
            format!(
                "{nactive} active cells in a {}x{}x{} grid; inactive cells are not supported",
                dims.nx, dims.ny, dims.nz
            ),
        ));
    }
    let phases = PhaseConfig::from_ecl_code(ints[INTEHEAD_PHASE]).ok_or_else(|| {
        content(source, kw.offset, format!("unknown phase code {}", ints[INTEHEAD_PHASE]))
    })?;
    Ok(Header {
        unit_system,
        dims,
        phases,
    })
}

/// Interpret decoded restart keywords.
pub fn parse_restart(keywords: &[BinKeyword], source: &str) -> DecodeResult<RestartData> {
    let mut blocks: Vec<Block<'_>> = Vec::new();
    for kw in keywords {
        if kw.name == "SEQNUM" {
            blocks.push(Block {
                seqnum: kw,
                keywords: Vec::new(),
            });
        } else if let Some(block) = blocks.last_mut() {
            block.keywords.push(kw);
        } else {
            return Err(content(source, kw.offset, format!("{} appears before the first SEQNUM", kw.name)));
        }
    }
    let Some(first) = blocks.first() else {
        return Err(DecodeError::Content {
            source_name: source.to_string(),
            offset: None,
            message: "restart stream holds no report steps".to_string(),
        });
    };

    let head_kw = first
        .get("INTEHEAD")
        .ok_or_else(|| content(source, first.seqnum.offset, "first report step has no INTEHEAD"))?;
    let head = header(head_kw, source)?;
    let n = head.dims.cell_count();

    let mut steps = Vec::with_capacity(blocks.len());
    for block in &blocks {
        let report_step = block
            .seqnum
            .data
            .as_ints()
            .and_then(|v| v.first().copied())
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| content(source, block.seqnum.offset, "SEQNUM does not hold a report step"))?;

        if let Some(kw) = block.get("INTEHEAD") {
            let h = header(kw, source)?;
            if h.dims != head.dims || h.unit_system != head.unit_system || h.phases != head.phases {
                return Err(content(source, kw.offset, "INTEHEAD changes between report steps"));
            }
        }

        let time_days = block
            .get("DOUBHEAD")
            .and_then(|k| k.data.to_f64())
            .and_then(|v| v.first().copied())
            .ok_or_else(|| content(source, block.seqnum.offset, format!("report step {report_step} has no DOUBHEAD time")))?;

        let require = |name: &str| {
            block.get(name).ok_or_else(|| {
                content(source, block.seqnum.offset, format!("report step {report_step} has no {name}"))
            })
        };
        let pressure = numeric(require("PRESSURE")?, source, n)?;
        let swat = if head.phases.water {
            numeric(require("SWAT")?, source, n)?
        } else {
            vec![0.0; n]
        };
        let sgas = match block.get("SGAS") {
            Some(kw) => Some(numeric(kw, source, n)?),
            None if head.phases.is_three_phase() => {
                return Err(content(
                    source,
                    block.seqnum.offset,
                    format!("report step {report_step} has no SGAS in a three-phase run"),
                ));
            }
            None => None,
        };

        steps.push(RestartStep {
            report_step,
            time_days,
            pressure,
            swat,
            sgas,
        });
    }

    tracing::debug!(source, steps = steps.len(), units = %head.unit_system, "decoded restart stream");
    Ok(RestartData {
        unit_system: head.unit_system,
        dims: head.dims,
        phases: head.phases,
        steps,
    })
}

pub fn read_restart(path: &Path) -> DecodeResult<RestartData> {
    let keywords = binary::read_file(path)?;
    parse_restart(&keywords, &path.display().to_string())
}

/// Encode restart data as a unified restart stream.
pub fn encode_restart(data: &RestartData, endian: Endian) -> DecodeResult<Vec<u8>> {
    let unit_code = data.unit_system.ecl_code().ok_or_else(|| DecodeError::Content {
        source_name: "restart encoder".to_string(),
        offset: None,
        message: format!("unit system {} has no binary code", data.unit_system),
    })?;
    let cells = data.dims.cell_count() as i32;
    let mut intehead = vec![0i32; 95];
    intehead[INTEHEAD_UNIT] = unit_code;
    intehead[INTEHEAD_NX] = data.dims.nx as i32;
    intehead[INTEHEAD_NY] = data.dims.ny as i32;
    intehead[INTEHEAD_NZ] = data.dims.nz as i32;
    intehead[INTEHEAD_NACTIVE] = cells;
    intehead[INTEHEAD_PHASE] = data.phases.ecl_code();

    let reals = |v: &[f64]| BinData::Real(v.iter().map(|x| *x as f32).collect());
    let mut w = BinaryWriter::new(endian);
    for step in &data.steps {
        w.keyword("SEQNUM", &BinData::Inte(vec![step.report_step as i32]))
            .keyword("INTEHEAD", &BinData::Inte(intehead.clone()))
            .keyword("DOUBHEAD", &BinData::Doub(vec![step.time_days, 0.0]))
            .keyword("STARTSOL", &BinData::Mess)
            .keyword("PRESSURE", &reals(&step.pressure))
            .keyword("SWAT", &reals(&step.swat));
        if let Some(sgas) = &step.sgas {
            w.keyword("SGAS", &reals(sgas));
        }
        w.keyword("ENDSOL", &BinData::Mess);
    }
    Ok(w.into_bytes())
}
