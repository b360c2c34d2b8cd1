//! Backend contract, adapter registry and the concrete simulator backends.
//!
//! Every backend runs in three steps: `validate` (structural checks, never
//! touches the engine), `run` (write input, invoke the engine, collect output
//! paths) and `parse_result` (decode output into a [`pal_model::UnifiedResult`]).
//! [`execute`] chains them in that order.

pub mod contract;
pub mod error;
pub mod mrst;
pub mod opm;
pub mod process;
pub mod progress;
pub mod registry;
pub mod replay;

pub use contract::{ensure_completed, execute, BackendHealth, RawOutput, RunStatus, SimulatorBackend};
pub use error::{BackendError, BackendResult, RegistryError, RegistryResult};
pub use mrst::{MrstBackend, MrstConfig};
pub use opm::{OpmFlowBackend, OpmFlowConfig};
pub use process::CancelToken;
pub use progress::{RunProgressEvent, RunStage};
pub use registry::{AdapterRegistry, BackendCategory, BackendKind, BackendRef};
pub use replay::{record_result, ReplayBackend};

/// Base name of every input and output file a backend writes in its workdir.
pub const CASE_NAME: &str = "CASE";
