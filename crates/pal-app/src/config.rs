//! Process configuration: YAML file plus `PAL_*` environment overrides.

use std::path::{Path, PathBuf};

use pal_backends::{MrstConfig, OpmFlowConfig};
use pal_compare::CompareOptions;
use pal_gateway::GatewayConfig;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

pub const ENV_WORKSPACE_ROOT: &str = "PAL_WORKSPACE_ROOT";
pub const ENV_MAX_CONCURRENT_JOBS: &str = "PAL_MAX_CONCURRENT_JOBS";
pub const ENV_FLOW_BIN: &str = "PAL_FLOW_BIN";
pub const ENV_OCTAVE_BIN: &str = "PAL_OCTAVE_BIN";
pub const ENV_MRST_ROOT: &str = "PAL_MRST_ROOT";
pub const ENV_BACKEND_TIMEOUT_S: &str = "PAL_BACKEND_TIMEOUT_S";

/// A recorded output directory served as a reference backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplaySource {
    pub name: String,
    pub dir: PathBuf,
}

/// Which backends to register. A `null` engine entry disables it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendsConfig {
    pub opm_flow: Option<OpmFlowConfig>,
    pub mrst: Option<MrstConfig>,
    pub replays: Vec<ReplaySource>,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            opm_flow: Some(OpmFlowConfig::default()),
            mrst: Some(MrstConfig::default()),
            replays: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PalConfig {
    pub workspace_root: PathBuf,
    pub max_concurrent_jobs: usize,
    pub persist_results: bool,
    pub keep_workdirs: bool,
    pub backends: BackendsConfig,
    pub compare: CompareOptions,
}

impl Default for PalConfig {
    fn default() -> Self {
        let gateway = GatewayConfig::default();
        Self {
            workspace_root: gateway.workspace_root,
            max_concurrent_jobs: gateway.max_concurrent_jobs,
            persist_results: gateway.persist_results,
            keep_workdirs: gateway.keep_workdirs,
            backends: BackendsConfig::default(),
            compare: CompareOptions::default(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> AppResult<T> {
    value.trim().parse().map_err(|_| AppError::Config {
        what: format!("{key}={value:?} is not a valid value"),
    })
}

impl PalConfig {
    pub fn from_yaml_str(text: &str) -> AppResult<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> AppResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| AppError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// File (or defaults), then process environment, then validation.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        tracing::debug!(?config, "configuration loaded");
        Ok(config)
    }

    /// Apply `PAL_*` overrides read through `lookup`. Overriding an engine
    /// path re-enables an engine the file disabled.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> AppResult<()> {
        if let Some(root) = lookup(ENV_WORKSPACE_ROOT) {
            self.workspace_root = PathBuf::from(root);
        }
        if let Some(value) = lookup(ENV_MAX_CONCURRENT_JOBS) {
            self.max_concurrent_jobs = parse_env(ENV_MAX_CONCURRENT_JOBS, &value)?;
        }
        if let Some(bin) = lookup(ENV_FLOW_BIN) {
            self.backends.opm_flow.get_or_insert_with(OpmFlowConfig::default).executable = PathBuf::from(bin);
        }
        if let Some(bin) = lookup(ENV_OCTAVE_BIN) {
            self.backends.mrst.get_or_insert_with(MrstConfig::default).octave = PathBuf::from(bin);
        }
        if let Some(root) = lookup(ENV_MRST_ROOT) {
            self.backends.mrst.get_or_insert_with(MrstConfig::default).mrst_root = Some(PathBuf::from(root));
        }
        if let Some(value) = lookup(ENV_BACKEND_TIMEOUT_S) {
            let timeout_s: u64 = parse_env(ENV_BACKEND_TIMEOUT_S, &value)?;
            if let Some(flow) = &mut self.backends.opm_flow {
                flow.timeout_s = timeout_s;
            }
            if let Some(mrst) = &mut self.backends.mrst {
                mrst.timeout_s = timeout_s;
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> AppResult<()> {
        let fail = |what: String| Err(AppError::Config { what });
        if self.max_concurrent_jobs == 0 {
            return fail("max_concurrent_jobs must be at least 1".to_string());
        }
        let timeouts = [
            self.backends.opm_flow.as_ref().map(|c| ("opm_flow", c.timeout_s)),
            self.backends.mrst.as_ref().map(|c| ("mrst", c.timeout_s)),
        ];
        for (name, timeout_s) in timeouts.into_iter().flatten() {
            if timeout_s == 0 {
                return fail(format!("{name} timeout must be positive"));
            }
        }
        let mut names: Vec<&str> = self.backends.replays.iter().map(|r| r.name.as_str()).collect();
        names.sort_unstable();
        if let Some(pair) = names.windows(2).find(|w| w[0] == w[1]) {
            return fail(format!("replay source '{}' is listed twice", pair[0]));
        }
        self.compare.validate()?;
        Ok(())
    }

    pub fn gateway(&self) -> GatewayConfig {
        GatewayConfig {
            workspace_root: self.workspace_root.clone(),
            max_concurrent_jobs: self.max_concurrent_jobs,
            persist_results: self.persist_results,
            keep_workdirs: self.keep_workdirs,
        }
    }
}
