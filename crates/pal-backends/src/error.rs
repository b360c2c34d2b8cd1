//! Error types for backends and the adapter registry.

use std::path::PathBuf;

use pal_model::{Severity, ValidationIssue};

use crate::contract::RunStatus;
use crate::registry::BackendCategory;

pub type BackendResult<T> = Result<T, BackendError>;
pub type RegistryResult<T> = Result<T, RegistryError>;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Request failed validation: {}", first_error(.0))]
    Validation(Vec<ValidationIssue>),

    #[error("Executable not found: {}", .program.display())]
    ExecutableNotFound { program: PathBuf },

    #[error("Run {status}: {}", .errors.join("; "))]
    RunFailed {
        status: RunStatus,
        errors: Vec<String>,
    },

    #[error("Recorded output not found: {}", .path.display())]
    MissingRecording { path: PathBuf },

    #[error("Backend configuration error: {what}")]
    Config { what: String },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Deck error: {0}")]
    Deck(#[from] pal_deck::DeckError),

    #[error("Decode error: {0}")]
    Decode(#[from] pal_results::DecodeError),
}

fn first_error(issues: &[ValidationIssue]) -> String {
    let errors = issues.iter().filter(|i| i.severity == Severity::Error).count();
    match issues.iter().find(|i| i.severity == Severity::Error) {
        Some(first) if errors > 1 => format!("{first} (and {} more)", errors - 1),
        Some(first) => first.to_string(),
        None => "no errors".to_string(),
    }
}

impl BackendError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Status of a run that finished without producing a usable result.
    pub fn run_status(&self) -> Option<RunStatus> {
        match self {
            Self::RunFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("No backend registered as {category}/{name}")]
    NotFound {
        category: BackendCategory,
        name: String,
    },

    #[error("Backend name '{name}' is registered in several categories")]
    Ambiguous { name: String },

    #[error("Unknown backend category: {0}")]
    UnknownCategory(String),
}
