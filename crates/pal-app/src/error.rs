//! Error type of the facade and configuration layer.

use std::path::PathBuf;

pub type AppResult<T> = Result<T, AppError>;

/// Wraps the error of every layer below so callers handle one type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {what}")]
    Config { what: String },

    #[error("Failed to read config file {}: {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    #[error(transparent)]
    Model(#[from] pal_model::ModelError),

    #[error(transparent)]
    Deck(#[from] pal_deck::DeckError),

    #[error(transparent)]
    Decode(#[from] pal_results::DecodeError),

    #[error(transparent)]
    Backend(#[from] pal_backends::BackendError),

    #[error(transparent)]
    Registry(#[from] pal_backends::RegistryError),

    #[error(transparent)]
    Compare(#[from] pal_compare::CompareError),

    #[error(transparent)]
    Gateway(#[from] pal_gateway::GatewayError),
}
