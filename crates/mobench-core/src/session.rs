use serde::{Deserialize, Serialize};

use crate::config::BenchmarkSettings;
use crate::model::ModelSpec;

/// Lifecycle of one benchmark session. `Running`/`Collecting` carry the
/// index of the active input-size configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Starting,
    Loading,
    Running { config: usize },
    Collecting { config: usize },
    Unloading,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed)
    }
}

/// One model under test across all configured input sizes and repetitions.
/// Owned exclusively by the orchestrator's sequencing worker.
#[derive(Debug, Clone)]
pub struct BenchmarkSession {
    pub model: ModelSpec,
    pub settings: BenchmarkSettings,
    pub current_run: u32,
    pub status: SessionStatus,
}

impl BenchmarkSession {
    pub fn new(model: ModelSpec, settings: BenchmarkSettings) -> Self {
        Self {
            model,
            settings,
            current_run: 0,
            status: SessionStatus::Idle,
        }
    }

    pub fn total_runs(&self) -> u32 {
        self.settings.run_repetitions
    }

    pub fn set_status(&mut self, status: SessionStatus) {
        tracing::debug!(model = %self.model.model_id, from = ?self.status, to = ?status, "session transition");
        self.status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_completed_and_failed_are_terminal() {
        assert!(SessionStatus::Completed.is_terminal());
        assert!(SessionStatus::Failed.is_terminal());
        assert!(!SessionStatus::Idle.is_terminal());
        assert!(!SessionStatus::Running { config: 0 }.is_terminal());
        assert!(!SessionStatus::Collecting { config: 2 }.is_terminal());
        assert!(!SessionStatus::Unloading.is_terminal());
    }

    #[test]
    fn new_session_starts_idle() {
        let session = BenchmarkSession::new(
            ModelSpec::new("Llama_3.2_1B"),
            BenchmarkSettings::default(),
        );
        assert_eq!(session.status, SessionStatus::Idle);
        assert_eq!(session.current_run, 0);
    }
}
