//! pal-model: canonical data model shared by every backend.
//!
//! `SimRequest` goes in, `UnifiedResult` comes out, and two results produce a
//! `ComparisonReport`. All values are in canonical units (see `pal_core::units`).

pub mod fingerprint;
pub mod query;
pub mod report;
pub mod request;
pub mod result;
pub mod samples;
pub mod validate;

pub use fingerprint::request_fingerprint;
pub use report::*;
pub use request::*;
pub use result::*;
pub use validate::{
    has_errors, title_fits_deck, validate_request, IssueCode, Severity, ValidationIssue, ValidationLimits,
};

use std::path::Path;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(thiserror::Error, Debug)]
pub enum ModelError {
    #[error("Invariant violated: {what}")]
    Invariant { what: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn load_request_yaml(path: &Path) -> ModelResult<SimRequest> {
    let content = std::fs::read_to_string(path)?;
    let request: SimRequest = serde_yaml::from_str(&content)?;
    Ok(request)
}

pub fn save_request_yaml(path: &Path, request: &SimRequest) -> ModelResult<()> {
    let content = serde_yaml::to_string(request)?;
    std::fs::write(path, content)?;
    Ok(())
}

pub fn load_request_json(path: &Path) -> ModelResult<SimRequest> {
    let content = std::fs::read_to_string(path)?;
    let request: SimRequest = serde_json::from_str(&content)?;
    Ok(request)
}

pub fn save_request_json(path: &Path, request: &SimRequest) -> ModelResult<()> {
    let content = serde_json::to_string_pretty(request)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Load a result and re-check its invariants; a stored file may have been edited.
pub fn load_result_json(path: &Path) -> ModelResult<UnifiedResult> {
    let content = std::fs::read_to_string(path)?;
    let result: UnifiedResult = serde_json::from_str(&content)?;
    result.check_invariants()?;
    Ok(result)
}

pub fn save_result_json(path: &Path, result: &UnifiedResult) -> ModelResult<()> {
    let content = serde_json::to_string_pretty(result)?;
    std::fs::write(path, content)?;
    Ok(())
}
