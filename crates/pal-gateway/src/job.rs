//! Job records and their state machine.

use std::fmt;

use chrono::{DateTime, Utc};
use pal_backends::{BackendError, BackendRef, RunStage, RunStatus};
use serde::{Deserialize, Serialize};

/// Lifecycle of a job. Transitions only move forward:
/// queued → running → done | failed, or queued → failed on cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Done,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Running => 1,
            Self::Done | Self::Failed => 2,
        }
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_become(self, next: JobState) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Running => write!(f, "running"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Cancelled,
    Validation,
    /// The engine ran but did not complete: non-zero exit, non-convergence, timeout.
    Execution,
    /// Output existed but could not be decoded.
    Decode,
    /// Broken installation or workspace: missing executable, unwritable workdir.
    Environment,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl JobFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self::new(FailureKind::Cancelled, "job was cancelled")
    }
}

impl From<&BackendError> for JobFailure {
    fn from(err: &BackendError) -> Self {
        let kind = match err {
            BackendError::Validation(_) => FailureKind::Validation,
            BackendError::RunFailed {
                status: RunStatus::Cancelled,
                ..
            } => FailureKind::Cancelled,
            BackendError::RunFailed { .. } => FailureKind::Execution,
            BackendError::Decode(_) => FailureKind::Decode,
            BackendError::Deck(_) => FailureKind::Validation,
            BackendError::ExecutableNotFound { .. }
            | BackendError::MissingRecording { .. }
            | BackendError::Config { .. }
            | BackendError::Io { .. } => FailureKind::Environment,
        };
        Self::new(kind, err.to_string())
    }
}

/// Externally visible snapshot of one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: String,
    pub backend: BackendRef,
    pub state: JobState,
    /// 0..=100, derived from the last reported run stage.
    pub progress: u8,
    pub stage: Option<RunStage>,
    pub failure: Option<JobFailure>,
    /// Unset when the request could not be serialized for hashing.
    pub request_fingerprint: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobStatus {
    pub fn queued(job_id: String, backend: BackendRef, request_fingerprint: Option<String>) -> Self {
        Self {
            job_id,
            backend,
            state: JobState::Queued,
            progress: RunStage::Queued.percent(),
            stage: Some(RunStage::Queued),
            failure: None,
            request_fingerprint,
            submitted_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Move to `next` if the transition is legal; returns whether it happened.
    pub fn advance(&mut self, next: JobState) -> bool {
        if !self.state.can_become(next) {
            tracing::debug!(job_id = %self.job_id, from = %self.state, to = %next, "ignored state transition");
            return false;
        }
        let now = Utc::now();
        match next {
            JobState::Running => self.started_at = Some(now),
            JobState::Done => {
                self.finished_at = Some(now);
                self.stage = Some(RunStage::Done);
                self.progress = RunStage::Done.percent();
            }
            JobState::Failed => self.finished_at = Some(now),
            JobState::Queued => {}
        }
        self.state = next;
        true
    }

    pub fn fail(&mut self, failure: JobFailure) -> bool {
        if self.advance(JobState::Failed) {
            self.failure = Some(failure);
            true
        } else {
            false
        }
    }

    /// Record a stage reported by the running backend. Progress never moves back.
    pub fn report(&mut self, stage: RunStage) {
        if self.state == JobState::Running && stage.percent() >= self.progress {
            self.stage = Some(stage);
            self.progress = stage.percent();
        }
    }
}
