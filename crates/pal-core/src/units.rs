// pal-core/src/units.rs

//! Single conversion table between canonical units and external unit systems.
//!
//! Canonical units follow the reservoir-engineering SI convention: metres, bar,
//! m³/day at surface conditions, days, kg/m³, millidarcy and centipoise. Every
//! external representation (deck files, binary output, interpreter scripts)
//! goes through [`to_canonical`] / [`from_canonical`]; no other module carries
//! conversion literals.

use serde::{Deserialize, Serialize};
use std::fmt;
use uom::si::f64::{
    DynamicViscosity as UomDynamicViscosity, Length as UomLength,
    MassDensity as UomMassDensity, Pressure as UomPressure, Time as UomTime,
    Volume as UomVolume,
};

use crate::error::{CoreError, CoreResult};

/// One millidarcy expressed in m².
pub const MILLIDARCY_M2: f64 = 9.869_233e-16;

/// One psi expressed in pascal, from the exact avoirdupois pound and standard gravity.
const PSI_PA: f64 = 6_894.757_293_168;

/// External unit system of a deck, a binary output stream or a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitSystem {
    /// m, bar, sm³/day, days. Identical to canonical units.
    Metric,
    /// ft, psi, STB/day, Mscf/day, days.
    Field,
    /// cm, atm, scc/hr, hours.
    Lab,
    /// m, Pa, m³/s, seconds. Used by interpreter-based simulators.
    StrictSi,
}

impl UnitSystem {
    /// Decode the unit code stored in binary header arrays (1 = METRIC, 2 = FIELD, 3 = LAB).
    pub fn from_ecl_code(code: i32) -> CoreResult<Self> {
        match code {
            1 => Ok(Self::Metric),
            2 => Ok(Self::Field),
            3 => Ok(Self::Lab),
            other => Err(CoreError::UnknownUnitCode { code: other }),
        }
    }

    /// Inverse of [`UnitSystem::from_ecl_code`]. Strict SI has no binary code.
    pub fn ecl_code(self) -> Option<i32> {
        match self {
            Self::Metric => Some(1),
            Self::Field => Some(2),
            Self::Lab => Some(3),
            Self::StrictSi => None,
        }
    }

    /// Deck keyword that selects this unit system, if any.
    pub fn deck_keyword(self) -> Option<&'static str> {
        match self {
            Self::Metric => Some("METRIC"),
            Self::Field => Some("FIELD"),
            Self::Lab => Some("LAB"),
            Self::StrictSi => None,
        }
    }

    pub fn from_label(label: &str) -> CoreResult<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "METRIC" => Ok(Self::Metric),
            "FIELD" => Ok(Self::Field),
            "LAB" => Ok(Self::Lab),
            "SI" | "STRICT_SI" => Ok(Self::StrictSi),
            other => Err(CoreError::UnknownUnitLabel {
                label: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Metric => write!(f, "METRIC"),
            Self::Field => write!(f, "FIELD"),
            Self::Lab => write!(f, "LAB"),
            Self::StrictSi => write!(f, "SI"),
        }
    }
}

/// Physical quantity family of a numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantity {
    Length,
    Pressure,
    /// 1/pressure (rock and water compressibility, viscosibility).
    Compressibility,
    /// Liquid surface rate (oil, water, liquid).
    LiquidRate,
    /// Gas surface rate.
    GasRate,
    LiquidVolume,
    GasVolume,
    Density,
    /// Gas formation volume factor (reservoir volume per surface gas volume).
    GasFvf,
    Time,
    Permeability,
    Viscosity,
    Dimensionless,
}

#[inline]
fn length_m(system: UnitSystem) -> f64 {
    use uom::si::length::{centimeter, foot, meter};
    let one = match system {
        UnitSystem::Metric | UnitSystem::StrictSi => UomLength::new::<meter>(1.0),
        UnitSystem::Field => UomLength::new::<foot>(1.0),
        UnitSystem::Lab => UomLength::new::<centimeter>(1.0),
    };
    one.get::<meter>()
}

#[inline]
fn pressure_bar(system: UnitSystem) -> f64 {
    use uom::si::pressure::{atmosphere, bar, pascal};
    let one = match system {
        UnitSystem::Metric => UomPressure::new::<bar>(1.0),
        UnitSystem::Field => UomPressure::new::<pascal>(PSI_PA),
        UnitSystem::Lab => UomPressure::new::<atmosphere>(1.0),
        UnitSystem::StrictSi => UomPressure::new::<pascal>(1.0),
    };
    one.get::<bar>()
}

#[inline]
fn time_days(system: UnitSystem) -> f64 {
    use uom::si::time::{day, hour, second};
    let one = match system {
        UnitSystem::Metric | UnitSystem::Field => UomTime::new::<day>(1.0),
        UnitSystem::Lab => UomTime::new::<hour>(1.0),
        UnitSystem::StrictSi => UomTime::new::<second>(1.0),
    };
    one.get::<day>()
}

#[inline]
fn liquid_volume_m3(system: UnitSystem) -> f64 {
    use uom::si::volume::{barrel, cubic_centimeter, cubic_meter};
    let one = match system {
        UnitSystem::Metric | UnitSystem::StrictSi => UomVolume::new::<cubic_meter>(1.0),
        UnitSystem::Field => UomVolume::new::<barrel>(1.0),
        UnitSystem::Lab => UomVolume::new::<cubic_centimeter>(1.0),
    };
    one.get::<cubic_meter>()
}

#[inline]
fn gas_volume_m3(system: UnitSystem) -> f64 {
    use uom::si::volume::{cubic_centimeter, cubic_foot, cubic_meter};
    let one = match system {
        UnitSystem::Metric | UnitSystem::StrictSi => UomVolume::new::<cubic_meter>(1.0),
        // Mscf
        UnitSystem::Field => UomVolume::new::<cubic_foot>(1000.0),
        UnitSystem::Lab => UomVolume::new::<cubic_centimeter>(1.0),
    };
    one.get::<cubic_meter>()
}

#[inline]
fn density_kg_m3(system: UnitSystem) -> f64 {
    use uom::si::mass_density::{
        gram_per_cubic_centimeter, kilogram_per_cubic_meter, pound_per_cubic_foot,
    };
    let one = match system {
        UnitSystem::Metric | UnitSystem::StrictSi => {
            UomMassDensity::new::<kilogram_per_cubic_meter>(1.0)
        }
        UnitSystem::Field => UomMassDensity::new::<pound_per_cubic_foot>(1.0),
        UnitSystem::Lab => UomMassDensity::new::<gram_per_cubic_centimeter>(1.0),
    };
    one.get::<kilogram_per_cubic_meter>()
}

#[inline]
fn viscosity_cp(system: UnitSystem) -> f64 {
    use uom::si::dynamic_viscosity::{centipoise, pascal_second};
    let one = match system {
        UnitSystem::StrictSi => UomDynamicViscosity::new::<pascal_second>(1.0),
        _ => UomDynamicViscosity::new::<centipoise>(1.0),
    };
    one.get::<centipoise>()
}

/// Canonical units per one external unit of `quantity` in `system`.
pub fn factor(system: UnitSystem, quantity: Quantity) -> f64 {
    match quantity {
        Quantity::Length => length_m(system),
        Quantity::Pressure => pressure_bar(system),
        Quantity::Compressibility => 1.0 / pressure_bar(system),
        Quantity::LiquidRate => liquid_volume_m3(system) / time_days(system),
        Quantity::GasRate => gas_volume_m3(system) / time_days(system),
        Quantity::LiquidVolume => liquid_volume_m3(system),
        Quantity::GasVolume => gas_volume_m3(system),
        Quantity::Density => density_kg_m3(system),
        Quantity::GasFvf => liquid_volume_m3(system) / gas_volume_m3(system),
        Quantity::Time => time_days(system),
        Quantity::Permeability => match system {
            UnitSystem::StrictSi => 1.0 / MILLIDARCY_M2,
            _ => 1.0,
        },
        Quantity::Viscosity => viscosity_cp(system),
        Quantity::Dimensionless => 1.0,
    }
}

/// Convert a value expressed in `system` units into canonical units.
#[inline]
pub fn to_canonical(system: UnitSystem, quantity: Quantity, value: f64) -> f64 {
    value * factor(system, quantity)
}

/// Convert a canonical value into `system` units.
#[inline]
pub fn from_canonical(system: UnitSystem, quantity: Quantity, value: f64) -> f64 {
    value / factor(system, quantity)
}

/// Convert a whole slice in place into canonical units.
pub fn slice_to_canonical(system: UnitSystem, quantity: Quantity, values: &mut [f64]) {
    let f = factor(system, quantity);
    if f != 1.0 {
        values.iter_mut().for_each(|v| *v *= f);
    }
}

/// Unit label for `quantity` in `system`, as written in deck comments and
/// summary UNITS arrays.
pub fn unit_label(system: UnitSystem, quantity: Quantity) -> &'static str {
    use Quantity as Q;
    use UnitSystem as U;
    match (system, quantity) {
        (U::Metric, Q::Length) | (U::StrictSi, Q::Length) => "M",
        (U::Field, Q::Length) => "FT",
        (U::Lab, Q::Length) => "CM",
        (U::Metric, Q::Pressure) => "BARSA",
        (U::Field, Q::Pressure) => "PSIA",
        (U::Lab, Q::Pressure) => "ATMA",
        (U::StrictSi, Q::Pressure) => "PA",
        (U::Metric, Q::LiquidRate) | (U::Metric, Q::GasRate) => "SM3/DAY",
        (U::Field, Q::LiquidRate) => "STB/DAY",
        (U::Field, Q::GasRate) => "MSCF/DAY",
        (U::Lab, Q::LiquidRate) | (U::Lab, Q::GasRate) => "SCC/HR",
        (U::StrictSi, Q::LiquidRate) | (U::StrictSi, Q::GasRate) => "M3/S",
        (U::Metric, Q::LiquidVolume) | (U::Metric, Q::GasVolume) => "SM3",
        (U::Field, Q::LiquidVolume) => "STB",
        (U::Field, Q::GasVolume) => "MSCF",
        (U::Lab, Q::LiquidVolume) | (U::Lab, Q::GasVolume) => "SCC",
        (U::StrictSi, Q::LiquidVolume) | (U::StrictSi, Q::GasVolume) => "M3",
        (U::Metric, Q::Time) | (U::Field, Q::Time) => "DAYS",
        (U::Lab, Q::Time) => "HR",
        (U::StrictSi, Q::Time) => "S",
        (_, Q::Density) => match system {
            U::Field => "LB/FT3",
            U::Lab => "G/CC",
            _ => "KG/M3",
        },
        (_, Q::Compressibility) => match system {
            U::Field => "1/PSI",
            U::Lab => "1/ATM",
            U::StrictSi => "1/PA",
            U::Metric => "1/BARS",
        },
        (_, Q::GasFvf) => match system {
            U::Field => "RB/MSCF",
            U::Lab => "RCC/SCC",
            _ => "RM3/SM3",
        },
        (U::StrictSi, Q::Permeability) => "M2",
        (_, Q::Permeability) => "MD",
        (U::StrictSi, Q::Viscosity) => "PA*S",
        (_, Q::Viscosity) => "CP",
        (_, Q::Dimensionless) => "",
    }
}
