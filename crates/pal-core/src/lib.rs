//! Units and numerics shared by every layer of the adapter.
//!
//! Canonical quantities are METRIC reservoir units (bar, m, m³/day, days).
//! [`units`] holds the one conversion table between those and each external
//! unit system a deck or result file may use.

pub mod error;
pub mod numeric;
pub mod units;

pub use error::{CoreError, CoreResult};
pub use numeric::*;
pub use units::{from_canonical, to_canonical, Quantity, UnitSystem};
