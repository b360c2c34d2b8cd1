//! Summary specification (`<CASE>.SMSPEC`) and unified summary data
//! (`<CASE>.UNSMRY`).
//!
//! The specification lists one vector per column: a mnemonic from KEYWORDS,
//! the well it belongs to from WGNAMES (or NAMES) and its unit. UNSMRY holds
//! one SEQHDR per report step followed by any number of MINISTEP/PARAMS
//! pairs; the last PARAMS before the next SEQHDR is the report-step value.

use std::collections::HashMap;
use std::path::Path;

use pal_core::units::{to_canonical, unit_label, Quantity, UnitSystem};
use pal_model::{GridDims, WellState};

use crate::binary::{self, BinData, BinKeyword, BinaryWriter, Endian};
use crate::{DecodeError, DecodeResult};

/// Placeholder well name used for field and group vectors.
pub const NO_WELL: &str = ":+:+:+:+";

/// Well vectors understood by the decoder.
pub const WELL_VECTORS: [&str; 9] = [
    "WOPR", "WWPR", "WGPR", "WWIR", "WGIR", "WBHP", "WOPT", "WWPT", "WGPT",
];

fn vector_quantity(mnemonic: &str) -> Option<Quantity> {
    Some(match mnemonic {
        "WOPR" | "WWPR" | "WWIR" => Quantity::LiquidRate,
        "WGPR" | "WGIR" => Quantity::GasRate,
        "WBHP" => Quantity::Pressure,
        "WOPT" | "WWPT" => Quantity::LiquidVolume,
        "WGPT" => Quantity::GasVolume,
        "TIME" => Quantity::Time,
        _ => return None,
    })
}

fn slot<'a>(state: &'a mut WellState, mnemonic: &str) -> Option<&'a mut Option<f64>> {
    Some(match mnemonic {
        "WOPR" => &mut state.oil_rate_m3_per_day,
        "WWPR" => &mut state.water_rate_m3_per_day,
        "WGPR" => &mut state.gas_rate_m3_per_day,
        "WWIR" => &mut state.water_injection_rate_m3_per_day,
        "WGIR" => &mut state.gas_injection_rate_m3_per_day,
        "WBHP" => &mut state.bhp_bar,
        "WOPT" => &mut state.cumulative_oil_m3,
        "WWPT" => &mut state.cumulative_water_m3,
        "WGPT" => &mut state.cumulative_gas_m3,
        _ => return None,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryVector {
    pub keyword: String,
    pub well: String,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummarySpec {
    pub unit_system: UnitSystem,
    pub dims: Option<GridDims>,
    pub vectors: Vec<SummaryVector>,
}

impl SummarySpec {
    /// Index of TIME in the vector list.
    pub fn time_index(&self) -> Option<usize> {
        self.vectors.iter().position(|v| v.keyword == "TIME")
    }

    /// Well names in first-seen order, skipping placeholders.
    pub fn well_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for v in &self.vectors {
            if WELL_VECTORS.contains(&v.keyword.as_str())
                && v.well != NO_WELL
                && !v.well.is_empty()
                && !names.contains(&v.well)
            {
                names.push(v.well.clone());
            }
        }
        names
    }
}

/// Values of one report step, raw and in SMSPEC order.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryStep {
    pub report_step: u32,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryData {
    pub spec: SummarySpec,
    pub steps: Vec<SummaryStep>,
}

impl SummaryData {
    /// Canonical time of `step` in days, if TIME was recorded.
    pub fn time_days(&self, step: &SummaryStep) -> Option<f64> {
        let idx = self.spec.time_index()?;
        step.values
            .get(idx)
            .map(|t| to_canonical(self.spec.unit_system, Quantity::Time, *t))
    }

    /// Canonical well states of `step`, one per well in SMSPEC order.
    pub fn well_states(&self, step: &SummaryStep) -> Vec<WellState> {
        let names = self.spec.well_names();
        let mut states: Vec<WellState> = names.iter().map(WellState::named).collect();
        let index: HashMap<&str, usize> = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.as_str(), i))
            .collect();

        for (vector, value) in self.spec.vectors.iter().zip(&step.values) {
            let Some(&w) = index.get(vector.well.as_str()) else {
                continue;
            };
            let Some(quantity) = vector_quantity(&vector.keyword) else {
                continue;
            };
            if let Some(target) = slot(&mut states[w], &vector.keyword) {
                *target = Some(to_canonical(self.spec.unit_system, quantity, *value));
            }
        }
        states
    }
}

fn content(source: &str, offset: Option<u64>, message: impl Into<String>) -> DecodeError {
    DecodeError::Content {
        source_name: source.to_string(),
        offset,
        message: message.into(),
    }
}

fn strings<'a>(kw: &'a BinKeyword, source: &str) -> DecodeResult<&'a [String]> {
    kw.data
        .as_strings()
        .ok_or_else(|| content(source, Some(kw.offset), format!("{} is not character data", kw.name)))
}

/// Interpret decoded SMSPEC keywords.
pub fn parse_spec(keywords: &[BinKeyword], source: &str) -> DecodeResult<SummarySpec> {
    let find = |name: &str| keywords.iter().find(|k| k.name == name);

    let unit_system = match find("INTEHEAD").and_then(|k| k.data.as_ints()).and_then(|v| v.first()) {
        Some(code) => UnitSystem::from_ecl_code(*code)?,
        None => {
            tracing::debug!(source, "summary specification has no INTEHEAD, assuming METRIC");
            UnitSystem::Metric
        }
    };

    let dims = find("DIMENS")
        .and_then(|k| k.data.as_ints())
        .filter(|v| v.len() >= 4)
        .and_then(|v| {
            let d = |x: i32| usize::try_from(x).ok().filter(|n| *n > 0);
            Some(GridDims::new(d(v[1])?, d(v[2])?, d(v[3])?))
        });

    let keywords_kw = find("KEYWORDS")
        .ok_or_else(|| content(source, None, "summary specification has no KEYWORDS"))?;
    let mnemonics = strings(keywords_kw, source)?;
    let wells_kw = find("WGNAMES")
        .or_else(|| find("NAMES"))
        .ok_or_else(|| content(source, None, "summary specification has no WGNAMES"))?;
    let wells = strings(wells_kw, source)?;
    if wells.len() != mnemonics.len() {
        return Err(DecodeError::Record {
            source_name: source.to_string(),
            offset: wells_kw.offset,
            expected: mnemonics.len(),
            found: wells.len(),
            message: format!("{} does not match KEYWORDS", wells_kw.name),
        });
    }
    let units: Vec<String> = match find("UNITS") {
        Some(kw) => strings(kw, source)?.to_vec(),
        None => vec![String::new(); mnemonics.len()],
    };

    let vectors = mnemonics
        .iter()
        .zip(wells)
        .enumerate()
        .map(|(i, (keyword, well))| SummaryVector {
            keyword: keyword.clone(),
            well: well.clone(),
            unit: units.get(i).cloned().unwrap_or_default(),
        })
        .collect();

    Ok(SummarySpec {
        unit_system,
        dims,
        vectors,
    })
}

/// Interpret decoded UNSMRY keywords against `spec`.
pub fn parse_data(spec: &SummarySpec, keywords: &[BinKeyword], source: &str) -> DecodeResult<Vec<SummaryStep>> {
    let mut steps: Vec<SummaryStep> = Vec::new();
    let mut current: Option<Vec<f64>> = None;
    let mut seen_header = false;

    for kw in keywords {
        match kw.name.as_str() {
            "SEQHDR" => {
                if let Some(values) = current.take() {
                    steps.push(SummaryStep {
                        report_step: steps.len() as u32 + 1,
                        values,
                    });
                }
                seen_header = true;
            }
            "PARAMS" => {
                if !seen_header {
                    return Err(content(source, Some(kw.offset), "PARAMS appears before the first SEQHDR"));
                }
                let values = kw
                    .data
                    .to_f64()
                    .ok_or_else(|| content(source, Some(kw.offset), "PARAMS is not numeric"))?;
                if values.len() != spec.vectors.len() {
                    return Err(DecodeError::Record {
                        source_name: source.to_string(),
                        offset: kw.offset,
                        expected: spec.vectors.len(),
                        found: values.len(),
                        message: "PARAMS length differs from the summary specification".to_string(),
                    });
                }
                current = Some(values);
            }
            _ => {}
        }
    }
    if let Some(values) = current {
        steps.push(SummaryStep {
            report_step: steps.len() as u32 + 1,
            values,
        });
    }
    Ok(steps)
}

/// Read a summary specification and its data file.
pub fn read_summary(smspec: &Path, unsmry: &Path) -> DecodeResult<SummaryData> {
    let spec_source = smspec.display().to_string();
    let spec = parse_spec(&binary::read_file(smspec)?, &spec_source)?;
    let data_source = unsmry.display().to_string();
    let steps = parse_data(&spec, &binary::read_file(unsmry)?, &data_source)?;
    tracing::debug!(
        smspec = %spec_source,
        vectors = spec.vectors.len(),
        steps = steps.len(),
        "decoded summary"
    );
    Ok(SummaryData { spec, steps })
}

/// Encode `data` as an (SMSPEC, UNSMRY) pair. Steps without a SEQHDR
/// counterpart cannot exist, so report steps are renumbered by position.
pub fn encode_summary(data: &SummaryData, endian: Endian) -> DecodeResult<(Vec<u8>, Vec<u8>)> {
    let unit_code = data.spec.unit_system.ecl_code().ok_or_else(|| {
        content(
            "summary encoder",
            None,
            format!("unit system {} has no binary code", data.spec.unit_system),
        )
    })?;
    let dims = data.spec.dims.unwrap_or(GridDims::new(1, 1, 1));
    let count = data.spec.vectors.len() as i32;
    let column = |f: fn(&SummaryVector) -> &String| {
        BinData::Char(data.spec.vectors.iter().map(|v| f(v).clone()).collect())
    };

    let mut spec = BinaryWriter::new(endian);
    spec.keyword("INTEHEAD", &BinData::Inte(vec![unit_code, 100]))
        .keyword(
            "DIMENS",
            &BinData::Inte(vec![count, dims.nx as i32, dims.ny as i32, dims.nz as i32, 0, -1]),
        )
        .keyword("KEYWORDS", &column(|v| &v.keyword))
        .keyword("WGNAMES", &column(|v| &v.well))
        .keyword("UNITS", &column(|v| &v.unit));

    let mut smry = BinaryWriter::new(endian);
    for (i, step) in data.steps.iter().enumerate() {
        smry.keyword("SEQHDR", &BinData::Inte(vec![i as i32]))
            .keyword("MINISTEP", &BinData::Inte(vec![i as i32]))
            .keyword("PARAMS", &BinData::Real(step.values.iter().map(|v| *v as f32).collect()));
    }
    Ok((spec.into_bytes(), smry.into_bytes()))
}

/// Spec with TIME followed by every well vector for each of `wells`.
pub fn standard_spec(unit_system: UnitSystem, dims: Option<GridDims>, wells: &[String]) -> SummarySpec {
    let mut vectors = vec![SummaryVector {
        keyword: "TIME".to_string(),
        well: NO_WELL.to_string(),
        unit: unit_label(unit_system, Quantity::Time).to_string(),
    }];
    for well in wells {
        for mnemonic in WELL_VECTORS {
            let unit = vector_quantity(mnemonic)
                .map(|q| unit_label(unit_system, q))
                .unwrap_or_default();
            vectors.push(SummaryVector {
                keyword: mnemonic.to_string(),
                well: well.clone(),
                unit: unit.to_string(),
            });
        }
    }
    SummarySpec {
        unit_system,
        dims,
        vectors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(units: UnitSystem) -> SummaryData {
        let wells = vec!["PROD1".to_string(), "INJ1".to_string()];
        let mut spec = standard_spec(units, Some(GridDims::new(2, 2, 1)), &wells);
        spec.vectors.push(SummaryVector {
            keyword: "FOPR".to_string(),
            well: NO_WELL.to_string(),
            unit: String::new(),
        });
        let width = spec.vectors.len();
        let steps = (1..=3)
            .map(|r| SummaryStep {
                report_step: r,
                values: (0..width).map(|i| if i == 0 { 10.0 * r as f64 } else { 100.0 + i as f64 }).collect(),
            })
            .collect();
        SummaryData { spec, steps }
    }

    #[test]
    fn encoded_summary_decodes_to_the_same_steps() {
        let data = sample(UnitSystem::Metric);
        let (spec_bytes, smry_bytes) = encode_summary(&data, Endian::Big).unwrap();
        let spec = parse_spec(&binary::decode(&spec_bytes, "s").unwrap(), "s").unwrap();
        let steps = parse_data(&spec, &binary::decode(&smry_bytes, "u").unwrap(), "u").unwrap();
        assert_eq!(spec, data.spec);
        assert_eq!(steps, data.steps);
    }

    #[test]
    fn field_units_convert_rates_and_pressure() {
        let mut data = sample(UnitSystem::Field);
        let wopr = data.spec.vectors.iter().position(|v| v.keyword == "WOPR").unwrap();
        let wbhp = data.spec.vectors.iter().position(|v| v.keyword == "WBHP").unwrap();
        data.steps[0].values[wopr] = 1000.0;
        data.steps[0].values[wbhp] = 2000.0;

        let states = data.well_states(&data.steps[0]);
        assert_eq!(states.len(), 2);
        assert_eq!(states[0].name, "PROD1");
        let oil = states[0].oil_rate_m3_per_day.unwrap();
        assert!((oil - 158.987_3).abs() < 1e-3, "{oil}");
        let bhp = states[0].bhp_bar.unwrap();
        assert!((bhp - 137.895_14).abs() < 1e-4, "{bhp}");
        assert_eq!(data.time_days(&data.steps[2]), Some(30.0));
    }

    #[test]
    fn last_ministep_wins_within_a_report_step() {
        let spec = standard_spec(UnitSystem::Metric, None, &[]);
        let mut w = BinaryWriter::new(Endian::Little);
        w.keyword("SEQHDR", &BinData::Inte(vec![0]))
            .keyword("MINISTEP", &BinData::Inte(vec![0]))
            .keyword("PARAMS", &BinData::Real(vec![1.0]))
            .keyword("MINISTEP", &BinData::Inte(vec![1]))
            .keyword("PARAMS", &BinData::Real(vec![2.0]))
            .keyword("SEQHDR", &BinData::Inte(vec![1]))
            .keyword("MINISTEP", &BinData::Inte(vec![2]))
            .keyword("PARAMS", &BinData::Real(vec![5.0]));
        let steps = parse_data(&spec, &binary::decode(w.as_bytes(), "u").unwrap(), "u").unwrap();
        assert_eq!(
            steps,
            vec![
                SummaryStep { report_step: 1, values: vec![2.0] },
                SummaryStep { report_step: 2, values: vec![5.0] },
            ]
        );
    }

    #[test]
    fn params_before_seqhdr_is_rejected() {
        let spec = standard_spec(UnitSystem::Metric, None, &[]);
        let mut w = BinaryWriter::new(Endian::Little);
        w.keyword("PARAMS", &BinData::Real(vec![1.0]));
        let err = parse_data(&spec, &binary::decode(w.as_bytes(), "u").unwrap(), "u").unwrap_err();
        assert!(matches!(err, DecodeError::Content { offset: Some(0), .. }), "{err}");
    }
}
