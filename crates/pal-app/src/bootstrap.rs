use std::sync::Arc;

use pal_backends::{AdapterRegistry, MrstBackend, OpmFlowBackend, ReplayBackend, SimulatorBackend};

use crate::config::PalConfig;
use crate::error::AppResult;

/// Register every backend `config` enables. Existing entries under the
/// same key are replaced.
pub fn bootstrap_registry(config: &PalConfig, registry: &AdapterRegistry) -> AppResult<()> {
    if let Some(flow) = &config.backends.opm_flow {
        let backend = OpmFlowBackend::new(flow.clone())?;
        register(registry, Arc::new(backend));
    }
    if let Some(mrst) = &config.backends.mrst {
        register(registry, Arc::new(MrstBackend::new(mrst.clone())));
    }
    for source in &config.backends.replays {
        let backend = ReplayBackend::new(&source.dir).with_name(&source.name);
        register(registry, Arc::new(backend));
    }
    tracing::info!(backends = registry.len(), "registry ready");
    Ok(())
}

fn register(registry: &AdapterRegistry, backend: Arc<dyn SimulatorBackend>) {
    let name = backend.name().to_string();
    registry.register(backend.category(), name, backend);
}
