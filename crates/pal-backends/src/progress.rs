use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Coarse milestones of one backend run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Queued,
    WritingInput,
    Executing,
    CollectingOutput,
    Parsing,
    Done,
}

impl RunStage {
    /// Progress percentage reported while the run is at this stage.
    pub fn percent(self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::WritingInput => 10,
            Self::Executing => 30,
            Self::CollectingOutput => 80,
            Self::Parsing => 90,
            Self::Done => 100,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunProgressEvent {
    pub backend: String,
    pub stage: RunStage,
    pub elapsed_wall_s: f64,
    pub message: Option<String>,
}

/// Stamps events with the backend name and elapsed time before handing them
/// to the caller's sink.
pub struct ProgressReporter<'a> {
    backend: String,
    started: Instant,
    sink: &'a mut dyn FnMut(RunProgressEvent),
}

impl<'a> ProgressReporter<'a> {
    pub fn new(backend: impl Into<String>, sink: &'a mut dyn FnMut(RunProgressEvent)) -> Self {
        Self {
            backend: backend.into(),
            started: Instant::now(),
            sink,
        }
    }

    pub fn emit(&mut self, stage: RunStage, message: Option<String>) {
        tracing::debug!(backend = %self.backend, ?stage, "run progress");
        (self.sink)(RunProgressEvent {
            backend: self.backend.clone(),
            stage,
            elapsed_wall_s: self.started.elapsed().as_secs_f64(),
            message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_is_monotonic_in_stage_order() {
        let stages = [
            RunStage::Queued,
            RunStage::WritingInput,
            RunStage::Executing,
            RunStage::CollectingOutput,
            RunStage::Parsing,
            RunStage::Done,
        ];
        for pair in stages.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].percent() < pair[1].percent());
        }
    }

    #[test]
    fn reporter_stamps_backend_name() {
        let mut seen = Vec::new();
        let mut sink = |e: RunProgressEvent| seen.push((e.backend, e.stage));
        let mut reporter = ProgressReporter::new("opm-flow", &mut sink);
        reporter.emit(RunStage::Executing, None);
        drop(reporter);
        assert_eq!(seen, vec![("opm-flow".to_string(), RunStage::Executing)]);
    }
}
