//! Persisted results, one directory per job.

use std::fs;
use std::path::{Path, PathBuf};

use pal_model::{ResultMetadata, Timestep, UnifiedResult};
use serde::{Deserialize, Serialize};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Stored result invalid: {0}")]
    Model(#[from] pal_model::ModelError),

    #[error("Result not found: {job_id}")]
    NotFound { job_id: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredManifest {
    pub job_id: String,
    pub backend: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_fingerprint: Option<String>,
    /// RFC 3339 timestamp of when the result was saved.
    pub saved_at: String,
    pub metadata: ResultMetadata,
    pub timestep_count: usize,
}

#[derive(Clone, Debug)]
pub struct ResultStore {
    root_dir: PathBuf,
}

impl ResultStore {
    pub fn new(root_dir: PathBuf) -> StoreResult<Self> {
        if !root_dir.exists() {
            fs::create_dir_all(&root_dir)?;
        }
        Ok(Self { root_dir })
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn job_dir(&self, job_id: &str) -> PathBuf {
        self.root_dir.join(job_id)
    }

    pub fn has_result(&self, job_id: &str) -> bool {
        self.job_dir(job_id).join("manifest.json").exists()
    }

    pub fn save(
        &self,
        job_id: &str,
        request_fingerprint: Option<&str>,
        result: &UnifiedResult,
    ) -> StoreResult<StoredManifest> {
        let dir = self.job_dir(job_id);
        fs::create_dir_all(&dir)?;

        let mut lines = String::new();
        for step in &result.timesteps {
            lines.push_str(&serde_json::to_string(step)?);
            lines.push('\n');
        }
        fs::write(dir.join("timesteps.jsonl"), lines)?;

        // The manifest goes last so `has_result` never sees half a result.
        let manifest = StoredManifest {
            job_id: job_id.to_string(),
            backend: result.metadata.backend.clone(),
            request_fingerprint: request_fingerprint.map(str::to_string),
            saved_at: chrono::Utc::now().to_rfc3339(),
            metadata: result.metadata.clone(),
            timestep_count: result.timesteps.len(),
        };
        fs::write(dir.join("manifest.json"), serde_json::to_string_pretty(&manifest)?)?;
        tracing::debug!(job_id, steps = manifest.timestep_count, "stored result");
        Ok(manifest)
    }

    pub fn load_manifest(&self, job_id: &str) -> StoreResult<StoredManifest> {
        let path = self.job_dir(job_id).join("manifest.json");
        if !path.exists() {
            return Err(StoreError::NotFound {
                job_id: job_id.to_string(),
            });
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Load a stored result and re-check its invariants.
    pub fn load(&self, job_id: &str) -> StoreResult<UnifiedResult> {
        let manifest = self.load_manifest(job_id)?;
        let content = fs::read_to_string(self.job_dir(job_id).join("timesteps.jsonl"))?;
        let mut timesteps = Vec::with_capacity(manifest.timestep_count);
        for line in content.lines() {
            if !line.trim().is_empty() {
                let step: Timestep = serde_json::from_str(line)?;
                timesteps.push(step);
            }
        }
        Ok(UnifiedResult::new(manifest.metadata, timesteps)?)
    }

    /// Every stored manifest, newest first.
    pub fn list(&self) -> StoreResult<Vec<StoredManifest>> {
        let mut manifests = Vec::new();
        if !self.root_dir.exists() {
            return Ok(manifests);
        }
        for entry in fs::read_dir(&self.root_dir)? {
            let entry = entry?;
            if entry.path().is_dir() {
                let job_id = entry.file_name().to_string_lossy().to_string();
                if let Ok(manifest) = self.load_manifest(&job_id) {
                    manifests.push(manifest);
                }
            }
        }
        manifests.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        Ok(manifests)
    }

    pub fn delete(&self, job_id: &str) -> StoreResult<()> {
        let dir = self.job_dir(job_id);
        if dir.exists() {
            fs::remove_dir_all(dir)?;
        }
        Ok(())
    }
}
