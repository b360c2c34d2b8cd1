//! Process-wide store of backend instances keyed by (category, name).

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::contract::{BackendHealth, SimulatorBackend};
use crate::error::{RegistryError, RegistryResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendCategory {
    /// Runs an external engine.
    Simulator,
    /// Serves previously recorded output.
    Reference,
}

impl fmt::Display for BackendCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simulator => write!(f, "simulator"),
            Self::Reference => write!(f, "reference"),
        }
    }
}

impl FromStr for BackendCategory {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simulator" => Ok(Self::Simulator),
            "reference" => Ok(Self::Reference),
            _ => Err(RegistryError::UnknownCategory(s.to_string())),
        }
    }
}

/// Known backend families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    OpmFlow,
    Mrst,
    Replay,
}

impl BackendKind {
    pub fn category(self) -> BackendCategory {
        match self {
            Self::OpmFlow | Self::Mrst => BackendCategory::Simulator,
            Self::Replay => BackendCategory::Reference,
        }
    }

    /// Default registry name.
    pub fn default_name(self) -> &'static str {
        match self {
            Self::OpmFlow => "opm-flow",
            Self::Mrst => "mrst",
            Self::Replay => "replay",
        }
    }
}

/// Registry key as seen by callers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BackendRef {
    pub category: BackendCategory,
    pub name: String,
}

impl BackendRef {
    pub fn new(category: BackendCategory, name: impl Into<String>) -> Self {
        Self {
            category,
            name: name.into(),
        }
    }
}

impl fmt::Display for BackendRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.name)
    }
}

type Entries = IndexMap<(BackendCategory, String), Arc<dyn SimulatorBackend>>;

static GLOBAL: Lazy<Arc<AdapterRegistry>> = Lazy::new(|| Arc::new(AdapterRegistry::new()));

/// Backends keyed by (category, name), in registration order.
///
/// Registration happens at startup; lookups clone the `Arc` out so no lock is
/// held while a backend runs.
#[derive(Default)]
pub struct AdapterRegistry {
    entries: RwLock<Entries>,
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("entries", &self.refs())
            .finish()
    }
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide instance.
    pub fn global() -> Arc<AdapterRegistry> {
        Arc::clone(&GLOBAL)
    }

    /// Insert or replace; returns the backend previously under this key.
    pub fn register(
        &self,
        category: BackendCategory,
        name: impl Into<String>,
        backend: Arc<dyn SimulatorBackend>,
    ) -> Option<Arc<dyn SimulatorBackend>> {
        let name = name.into();
        let previous = self.entries.write().insert((category, name.clone()), backend);
        if previous.is_some() {
            tracing::info!(%category, name = %name, "replaced registered backend");
        } else {
            tracing::info!(%category, name = %name, "registered backend");
        }
        previous
    }

    pub fn get(&self, category: BackendCategory, name: &str) -> RegistryResult<Arc<dyn SimulatorBackend>> {
        self.entries
            .read()
            .get(&(category, name.to_string()))
            .cloned()
            .ok_or_else(|| RegistryError::NotFound {
                category,
                name: name.to_string(),
            })
    }

    pub fn resolve(&self, backend: &BackendRef) -> RegistryResult<Arc<dyn SimulatorBackend>> {
        self.get(backend.category, &backend.name)
    }

    /// Look a backend up by name alone; fails if the name is used in more
    /// than one category.
    pub fn find(&self, name: &str) -> RegistryResult<Arc<dyn SimulatorBackend>> {
        let entries = self.entries.read();
        let mut matches = entries.iter().filter(|((_, n), _)| n == name);
        match (matches.next(), matches.next()) {
            (Some((_, backend)), None) => Ok(Arc::clone(backend)),
            (Some(_), Some(_)) => Err(RegistryError::Ambiguous {
                name: name.to_string(),
            }),
            (None, _) => Err(RegistryError::NotFound {
                category: BackendCategory::Simulator,
                name: name.to_string(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn refs(&self) -> Vec<BackendRef> {
        self.entries
            .read()
            .keys()
            .map(|(category, name)| BackendRef::new(*category, name.clone()))
            .collect()
    }

    /// Probe every entry. Probes run outside the lock.
    pub fn health(&self) -> Vec<BackendHealth> {
        let snapshot: Vec<((BackendCategory, String), Arc<dyn SimulatorBackend>)> = self
            .entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect();
        snapshot
            .into_iter()
            .map(|((category, name), backend)| BackendHealth {
                category,
                name,
                ..backend.probe()
            })
            .collect()
    }
}
