//! Small, fully specified requests used by tests, health probes and smoke runs.

use chrono::NaiveDate;

use crate::request::*;

fn layered(n: usize, nx: usize, ny: usize, base: f64, step: f64) -> Vec<f64> {
    (0..n)
        .map(|idx| {
            let k = idx / (nx * ny);
            base + step * k as f64 + 0.001 * (idx % 7) as f64
        })
        .collect()
}

fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default()
}

fn base_request(nx: usize, ny: usize, nz: usize, phases: PhaseConfig) -> SimRequest {
    let dims = GridDims::new(nx, ny, nz);
    let n = dims.cell_count();
    let permx: Vec<f64> = layered(n, nx, ny, 100.0, 50.0);

    SimRequest {
        title: "TWO WELL SECTOR".to_string(),
        start_date: start_date(),
        grid: GridDef {
            dims,
            geometry: CellGeometry::Cartesian {
                dx_m: vec![30.0; nx],
                dy_m: vec![30.0; ny],
                dz_m: (0..nz).map(|k| 4.0 + k as f64).collect(),
                tops_m: vec![2000.0; nx * ny],
            },
        },
        properties: StaticProperties {
            porosity: layered(n, nx, ny, 0.2, 0.02),
            permy_md: permx.clone(),
            permz_md: permx.iter().map(|p| p * 0.1).collect(),
            permx_md: permx,
            ntg: None,
        },
        pore_volume_multipliers: None,
        phases,
        pvt: PvtDef {
            water: Some(WaterPvt {
                ref_pressure_bar: 250.0,
                bw: 1.03,
                compressibility_per_bar: 4.5e-5,
                viscosity_cp: 0.5,
                viscosibility_per_bar: 0.0,
            }),
            oil: Some(vec![
                PvdoRow {
                    pressure_bar: 100.0,
                    bo: 1.25,
                    viscosity_cp: 1.2,
                },
                PvdoRow {
                    pressure_bar: 250.0,
                    bo: 1.2,
                    viscosity_cp: 1.4,
                },
                PvdoRow {
                    pressure_bar: 400.0,
                    bo: 1.17,
                    viscosity_cp: 1.6,
                },
            ]),
            gas: None,
            surface_density: SurfaceDensity {
                oil_kg_m3: 850.0,
                water_kg_m3: 1020.0,
                gas_kg_m3: 0.9,
            },
            rock: RockDef {
                ref_pressure_bar: 250.0,
                compressibility_per_bar: 5.0e-5,
            },
        },
        relperm: RelPermDef::Tables {
            swof: vec![
                SwofRow {
                    sw: 0.2,
                    krw: 0.0,
                    krow: 1.0,
                    pcow_bar: 0.0,
                },
                SwofRow {
                    sw: 0.5,
                    krw: 0.15,
                    krow: 0.3,
                    pcow_bar: 0.0,
                },
                SwofRow {
                    sw: 0.8,
                    krw: 0.6,
                    krow: 0.0,
                    pcow_bar: 0.0,
                },
            ],
            sgof: None,
        },
        equilibration: EquilibrationDef {
            datum_depth_m: 2000.0,
            datum_pressure_bar: 250.0,
            woc_depth_m: 2100.0,
            goc_depth_m: None,
        },
        wells: vec![
            WellDef {
                name: "INJ1".to_string(),
                group: "G1".to_string(),
                i: 1,
                j: 1,
                ref_depth_m: Some(2000.0),
                kind: WellKind::Injector,
                phase: Phase::Water,
                completion: CompletionDef { k1: 1, k2: nz },
                status: WellStatus::Open,
                control: WellControl {
                    mode: ControlMode::SurfaceRate,
                    target: 300.0,
                    bhp_limit_bar: Some(400.0),
                },
            },
            WellDef {
                name: "PROD1".to_string(),
                group: "G1".to_string(),
                i: nx,
                j: ny,
                ref_depth_m: Some(2000.0),
                kind: WellKind::Producer,
                phase: Phase::Oil,
                completion: CompletionDef { k1: 1, k2: nz },
                status: WellStatus::Open,
                control: WellControl {
                    mode: ControlMode::OilRate,
                    target: 250.0,
                    bhp_limit_bar: Some(150.0),
                },
            },
        ],
        schedule: ScheduleDef {
            events: vec![
                ScheduleEvent::Advance { days: 30.0 },
                ScheduleEvent::Advance { days: 30.0 },
                ScheduleEvent::Control {
                    well: "PROD1".to_string(),
                    status: WellStatus::Open,
                    control: WellControl {
                        mode: ControlMode::Bhp,
                        target: 180.0,
                        bhp_limit_bar: None,
                    },
                },
                ScheduleEvent::Advance { days: 60.0 },
            ],
        },
    }
}

/// Oil-water sector with one water injector (`INJ1`) and one oil producer (`PROD1`).
pub fn two_well_oil_water(nx: usize, ny: usize, nz: usize) -> SimRequest {
    base_request(nx, ny, nz, PhaseConfig::oil_water())
}

/// Three-phase black-oil variant with dry gas tables and a gas cap.
pub fn two_well_black_oil(nx: usize, ny: usize, nz: usize) -> SimRequest {
    let mut request = base_request(nx, ny, nz, PhaseConfig::black_oil());
    request.pvt.gas = Some(vec![
        PvdgRow {
            pressure_bar: 100.0,
            bg: 0.0105,
            viscosity_cp: 0.014,
        },
        PvdgRow {
            pressure_bar: 250.0,
            bg: 0.0045,
            viscosity_cp: 0.019,
        },
        PvdgRow {
            pressure_bar: 400.0,
            bg: 0.0031,
            viscosity_cp: 0.024,
        },
    ]);
    if let RelPermDef::Tables { sgof, .. } = &mut request.relperm {
        *sgof = Some(vec![
            SgofRow {
                sg: 0.0,
                krg: 0.0,
                krog: 1.0,
                pcog_bar: 0.0,
            },
            SgofRow {
                sg: 0.3,
                krg: 0.2,
                krog: 0.25,
                pcog_bar: 0.0,
            },
            SgofRow {
                sg: 0.8,
                krg: 0.8,
                krog: 0.0,
                pcog_bar: 0.0,
            },
        ]);
    }
    request.equilibration.goc_depth_m = Some(1995.0);
    request
}
