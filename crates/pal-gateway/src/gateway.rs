//! Bounded asynchronous job queue in front of the adapter registry.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use pal_backends::{
    execute, AdapterRegistry, BackendCategory, BackendHealth, BackendRef, BackendResult, CancelToken, RegistryError,
    RunProgressEvent, SimulatorBackend,
};
use pal_model::{request_fingerprint, SimRequest, UnifiedResult};
use pal_results::{ResultStore, StoredManifest};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::error::{GatewayError, GatewayResult};
use crate::job::{FailureKind, JobFailure, JobState, JobStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Job workdirs live under `<workspace_root>/jobs/<job_id>`.
    pub workspace_root: PathBuf,
    pub max_concurrent_jobs: usize,
    /// Save every finished result under `<workspace_root>/results`.
    pub persist_results: bool,
    /// Leave job workdirs on disk after the job ends.
    pub keep_workdirs: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::from("pal-workspace"),
            max_concurrent_jobs: 2,
            persist_results: false,
            keep_workdirs: false,
        }
    }
}

/// Registry probes plus queue capacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayHealth {
    pub backends: Vec<BackendHealth>,
    pub max_concurrent_jobs: usize,
    pub running: usize,
    pub queued: usize,
}

struct JobEntry {
    status: JobStatus,
    cancel: CancelToken,
    result: Option<Arc<UnifiedResult>>,
}

struct Inner {
    registry: Arc<AdapterRegistry>,
    config: GatewayConfig,
    slots: Arc<Semaphore>,
    jobs: RwLock<IndexMap<String, JobEntry>>,
    store: Option<ResultStore>,
}

/// Cheap to clone; clones share the job table.
#[derive(Clone)]
pub struct JobGateway {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for JobGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobGateway")
            .field("config", &self.inner.config)
            .field("jobs", &self.inner.jobs.read().len())
            .finish()
    }
}

impl JobGateway {
    pub fn new(registry: Arc<AdapterRegistry>, config: GatewayConfig) -> GatewayResult<Self> {
        if config.max_concurrent_jobs == 0 {
            return Err(GatewayError::Config {
                what: "max_concurrent_jobs must be at least 1".to_string(),
            });
        }
        let store = if config.persist_results {
            Some(ResultStore::new(config.workspace_root.join("results"))?)
        } else {
            None
        };
        Ok(Self {
            inner: Arc::new(Inner {
                registry,
                slots: Arc::new(Semaphore::new(config.max_concurrent_jobs)),
                config,
                jobs: RwLock::new(IndexMap::new()),
                store,
            }),
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.inner.registry
    }

    /// Turn `category/name` or a bare registered name into a registry key.
    pub fn resolve_selector(&self, selector: &str) -> GatewayResult<BackendRef> {
        if let Some((category, name)) = selector.split_once('/') {
            let backend = BackendRef::new(category.parse()?, name);
            self.inner.registry.resolve(&backend)?;
            return Ok(backend);
        }
        let mut matches = self.inner.registry.refs().into_iter().filter(|r| r.name == selector);
        match (matches.next(), matches.next()) {
            (Some(found), None) => Ok(found),
            (Some(_), Some(_)) => Err(RegistryError::Ambiguous {
                name: selector.to_string(),
            }
            .into()),
            (None, _) => Err(RegistryError::NotFound {
                category: BackendCategory::Simulator,
                name: selector.to_string(),
            }
            .into()),
        }
    }

    /// Queue `request` on `backend` and return its job id without waiting.
    ///
    /// The backend is resolved immediately so unknown names fail here rather
    /// than inside the job. Must be called from within a Tokio runtime.
    pub fn submit(&self, request: SimRequest, backend: BackendRef) -> GatewayResult<String> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| GatewayError::NoRuntime)?;
        let engine = self.inner.registry.resolve(&backend)?;

        let job_id = uuid::Uuid::new_v4().to_string();
        let cancel = CancelToken::new();
        let fingerprint = request_fingerprint(&request).ok();
        let status = JobStatus::queued(job_id.clone(), backend.clone(), fingerprint.clone());
        self.inner.jobs.write().insert(
            job_id.clone(),
            JobEntry {
                status,
                cancel: cancel.clone(),
                result: None,
            },
        );
        tracing::info!(%job_id, %backend, "job queued");

        runtime.spawn(run_job(
            Arc::clone(&self.inner),
            job_id.clone(),
            engine,
            request,
            fingerprint,
            cancel,
        ));
        Ok(job_id)
    }

    pub fn status(&self, job_id: &str) -> GatewayResult<JobStatus> {
        self.inner
            .jobs
            .read()
            .get(job_id)
            .map(|e| e.status.clone())
            .ok_or_else(|| not_found(job_id))
    }

    /// The result of a finished job; `NotReady` for every other state.
    ///
    /// Jobs this gateway does not know, such as those of an earlier process,
    /// are served from the result store when one is configured.
    pub fn result(&self, job_id: &str) -> GatewayResult<Arc<UnifiedResult>> {
        {
            let jobs = self.inner.jobs.read();
            if let Some(entry) = jobs.get(job_id) {
                return match (&entry.result, entry.status.state) {
                    (Some(result), JobState::Done) => Ok(Arc::clone(result)),
                    (_, state) => Err(GatewayError::NotReady {
                        job_id: job_id.to_string(),
                        state,
                    }),
                };
            }
        }
        match &self.inner.store {
            Some(store) if store.has_result(job_id) => Ok(Arc::new(store.load(job_id)?)),
            _ => Err(not_found(job_id)),
        }
    }

    /// Manifests of every persisted result, newest first. Empty when
    /// persistence is off.
    pub fn stored_results(&self) -> GatewayResult<Vec<StoredManifest>> {
        match &self.inner.store {
            Some(store) => Ok(store.list()?),
            None => Ok(Vec::new()),
        }
    }

    /// Remove a persisted result. The in-memory job table is left alone.
    pub fn delete_stored(&self, job_id: &str) -> GatewayResult<()> {
        match &self.inner.store {
            Some(store) if store.has_result(job_id) => {
                store.delete(job_id)?;
                tracing::info!(%job_id, "stored result deleted");
                Ok(())
            }
            _ => Err(not_found(job_id)),
        }
    }

    /// Queued jobs fail at once; running jobs have their engine stopped and
    /// fail when it exits. Finished jobs are left alone.
    pub fn cancel(&self, job_id: &str) -> GatewayResult<JobStatus> {
        let mut jobs = self.inner.jobs.write();
        let entry = jobs.get_mut(job_id).ok_or_else(|| not_found(job_id))?;
        match entry.status.state {
            JobState::Queued => {
                entry.cancel.cancel();
                entry.status.fail(JobFailure::cancelled());
                tracing::info!(%job_id, "queued job cancelled");
            }
            JobState::Running => {
                entry.cancel.cancel();
                tracing::info!(%job_id, "cancellation requested for running job");
            }
            JobState::Done | JobState::Failed => {}
        }
        Ok(entry.status.clone())
    }

    /// Most recent first.
    pub fn list(&self, limit: Option<usize>) -> Vec<JobStatus> {
        let jobs = self.inner.jobs.read();
        jobs.values()
            .rev()
            .take(limit.unwrap_or(usize::MAX))
            .map(|e| e.status.clone())
            .collect()
    }

    pub fn health(&self) -> GatewayHealth {
        let (running, queued) = {
            let jobs = self.inner.jobs.read();
            let count = |state: JobState| jobs.values().filter(|e| e.status.state == state).count();
            (count(JobState::Running), count(JobState::Queued))
        };
        GatewayHealth {
            backends: self.inner.registry.health(),
            max_concurrent_jobs: self.inner.config.max_concurrent_jobs,
            running,
            queued,
        }
    }

    /// Poll until the job reaches a terminal state.
    pub async fn wait(&self, job_id: &str, poll: Duration) -> GatewayResult<JobStatus> {
        loop {
            let status = self.status(job_id)?;
            if status.state.is_terminal() {
                return Ok(status);
            }
            tokio::time::sleep(poll).await;
        }
    }
}

fn not_found(job_id: &str) -> GatewayError {
    GatewayError::NotFound {
        job_id: job_id.to_string(),
    }
}

impl Inner {
    fn update(&self, job_id: &str, apply: impl FnOnce(&mut JobEntry)) {
        if let Some(entry) = self.jobs.write().get_mut(job_id) {
            apply(entry);
        }
    }

    fn workdir(&self, job_id: &str) -> PathBuf {
        self.config.workspace_root.join("jobs").join(job_id)
    }
}

/// Save a finished result when the gateway persists results. Failures are logged.
async fn persist(inner: &Arc<Inner>, job_id: &str, fingerprint: Option<String>, result: Arc<UnifiedResult>) {
    if inner.store.is_none() {
        return;
    }
    let store_inner = Arc::clone(inner);
    let store_id = job_id.to_string();
    let saved = tokio::task::spawn_blocking(move || {
        store_inner
            .store
            .as_ref()
            .map(|store| store.save(&store_id, fingerprint.as_deref(), &result))
    })
    .await;
    match saved {
        Ok(Some(Err(e))) => tracing::warn!(%job_id, error = %e, "could not persist result"),
        Err(join) => tracing::warn!(%job_id, error = %join, "result persistence panicked"),
        Ok(_) => {}
    }
}

async fn run_job(
    inner: Arc<Inner>,
    job_id: String,
    backend: Arc<dyn SimulatorBackend>,
    request: SimRequest,
    fingerprint: Option<String>,
    cancel: CancelToken,
) {
    let permit = match Arc::clone(&inner.slots).acquire_owned().await {
        Ok(permit) => permit,
        Err(e) => {
            inner.update(&job_id, |entry| {
                entry.status.fail(JobFailure::new(FailureKind::Internal, e.to_string()));
            });
            return;
        }
    };

    let mut started = false;
    inner.update(&job_id, |entry| started = entry.status.advance(JobState::Running));
    if !started {
        tracing::debug!(%job_id, "job left the queue before it could start");
        return;
    }
    tracing::info!(%job_id, backend = backend.name(), "job started");

    let workdir = inner.workdir(&job_id);
    let blocking_inner = Arc::clone(&inner);
    let blocking_id = job_id.clone();
    let blocking_cancel = cancel.clone();
    let blocking_dir = workdir.clone();
    let outcome = tokio::task::spawn_blocking(move || -> BackendResult<UnifiedResult> {
        let mut sink = |event: RunProgressEvent| {
            blocking_inner.update(&blocking_id, |entry| entry.status.report(event.stage));
        };
        execute(backend.as_ref(), &request, &blocking_dir, &blocking_cancel, &mut sink)
    })
    .await;
    drop(permit);

    match outcome {
        Ok(Ok(result)) if !cancel.is_cancelled() => {
            let result = Arc::new(result);
            persist(&inner, &job_id, fingerprint, Arc::clone(&result)).await;
            let steps = result.timesteps.len();
            inner.update(&job_id, |entry| {
                if entry.status.advance(JobState::Done) {
                    entry.result = Some(result);
                }
            });
            tracing::info!(%job_id, steps, "job done");
        }
        Ok(Ok(_)) => {
            inner.update(&job_id, |entry| {
                entry.status.fail(JobFailure::cancelled());
            });
            tracing::info!(%job_id, "job cancelled, output discarded");
        }
        Ok(Err(e)) => {
            let failure = JobFailure::from(&e);
            tracing::warn!(%job_id, kind = ?failure.kind, error = %e, "job failed");
            inner.update(&job_id, |entry| {
                entry.status.fail(failure);
            });
        }
        Err(join) => {
            tracing::error!(%job_id, error = %join, "job worker panicked");
            inner.update(&job_id, |entry| {
                entry.status.fail(JobFailure::new(FailureKind::Internal, join.to_string()));
            });
        }
    }

    if !inner.config.keep_workdirs
        && workdir.exists()
        && let Err(e) = std::fs::remove_dir_all(&workdir)
    {
        tracing::warn!(%job_id, error = %e, "could not remove job workdir");
    }
}
