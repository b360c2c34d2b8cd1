use pal_backends::RegistryError;
use pal_results::StoreError;

use crate::job::JobState;

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Job not found: {job_id}")]
    NotFound { job_id: String },

    #[error("Job {job_id} has no result yet (state: {state})")]
    NotReady { job_id: String, state: JobState },

    #[error("Backend lookup failed: {0}")]
    Registry(#[from] RegistryError),

    #[error("Invalid gateway configuration: {what}")]
    Config { what: String },

    #[error("Jobs can only be submitted from inside a Tokio runtime")]
    NoRuntime,

    #[error("Result store error: {0}")]
    Store(#[from] StoreError),
}
