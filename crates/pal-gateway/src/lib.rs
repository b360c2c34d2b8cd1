//! Asynchronous job submission over the adapter registry, plus its HTTP
//! surface.
//!
//! Each job runs validate → run → parse on the blocking pool; at most
//! `max_concurrent_jobs` run at once and the rest wait in the queue.

pub mod error;
pub mod gateway;
pub mod http;
pub mod job;

pub use error::{GatewayError, GatewayResult};
pub use gateway::{GatewayConfig, GatewayHealth, JobGateway};
pub use http::{router, RunBody, Submitted};
pub use job::{FailureKind, JobFailure, JobState, JobStatus};
