//! Convenience facade over the adapter layer, plus configuration bootstrap.
//!
//! [`Pal`] holds nothing but a registry handle. Every method forwards to the
//! crate that owns the capability, so callers may skip the facade entirely.

pub mod bootstrap;
pub mod config;
pub mod error;

use std::path::Path;
use std::sync::Arc;

use pal_backends::{AdapterRegistry, BackendHealth, BackendRef, CancelToken, RunProgressEvent};
use pal_compare::CompareOptions;
use pal_deck::DeckOptions;
use pal_gateway::{GatewayConfig, JobGateway};
use pal_model::{load_result_json, ComparisonReport, SimRequest, UnifiedResult, ValidationIssue};
use pal_results::ResultHints;

pub use bootstrap::bootstrap_registry;
pub use config::{BackendsConfig, PalConfig, ReplaySource};
pub use error::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct Pal {
    registry: Arc<AdapterRegistry>,
}

impl Pal {
    /// Use the injected registry, or the process-wide one when none is given.
    /// An injected registry is kept even when it is empty.
    pub fn new(registry: Option<Arc<AdapterRegistry>>) -> Self {
        let registry = match registry {
            Some(registry) => registry,
            None => AdapterRegistry::global(),
        };
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.registry
    }

    pub fn generate_deck(&self, request: &SimRequest, options: &DeckOptions) -> AppResult<String> {
        Ok(pal_deck::generate_deck(request, options)?)
    }

    pub fn parse_deck_file(&self, path: &Path) -> AppResult<SimRequest> {
        Ok(pal_deck::parse_deck_file(path)?)
    }

    pub fn parse_deck_str(&self, text: &str, base_dir: Option<&Path>) -> AppResult<SimRequest> {
        Ok(pal_deck::parse_deck_str(text, base_dir)?)
    }

    pub fn read_result(&self, dir: &Path, hints: &ResultHints) -> AppResult<UnifiedResult> {
        Ok(pal_results::read_result(dir, hints)?)
    }

    pub fn validate(&self, request: &SimRequest, backend: &BackendRef) -> AppResult<Vec<ValidationIssue>> {
        Ok(self.registry.resolve(backend)?.validate(request))
    }

    /// Validate, run and parse on the calling thread.
    pub fn run_blocking(
        &self,
        request: &SimRequest,
        backend: &BackendRef,
        workdir: &Path,
        cancel: &CancelToken,
        progress: &mut dyn FnMut(RunProgressEvent),
    ) -> AppResult<UnifiedResult> {
        let engine = self.registry.resolve(backend)?;
        Ok(pal_backends::execute(engine.as_ref(), request, workdir, cancel, progress)?)
    }

    pub fn compare(
        &self,
        a: &UnifiedResult,
        b: &UnifiedResult,
        label_a: &str,
        label_b: &str,
        options: &CompareOptions,
    ) -> AppResult<ComparisonReport> {
        Ok(pal_compare::compare(a, b, label_a, label_b, options)?)
    }

    /// Compare two results saved as JSON, each labelled by its file stem.
    pub fn compare_files(&self, a: &Path, b: &Path, options: &CompareOptions) -> AppResult<ComparisonReport> {
        let result_a = load_result_json(a)?;
        let result_b = load_result_json(b)?;
        self.compare(&result_a, &result_b, &file_label(a), &file_label(b), options)
    }

    pub fn health(&self) -> Vec<BackendHealth> {
        self.registry.health()
    }

    /// A job gateway over this facade's registry.
    pub fn gateway(&self, config: GatewayConfig) -> AppResult<JobGateway> {
        Ok(JobGateway::new(Arc::clone(&self.registry), config)?)
    }
}

fn file_label(path: &Path) -> String {
    match path.file_stem() {
        Some(stem) => stem.to_string_lossy().into_owned(),
        None => path.display().to_string(),
    }
}
