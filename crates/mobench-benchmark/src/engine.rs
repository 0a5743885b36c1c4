use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Engine returned status {0}")]
    Status(u16),

    #[error("Load failed with result code {0}")]
    LoadCode(i32),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Engine error: {0}")]
    Other(String),
}

/// One generation request. `input_tokens` is the target prompt length;
/// runtimes that take a total sequence length combine the two.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub input_tokens: u32,
    pub max_output_tokens: u32,
}

/// Terminal stats blob delivered once per generation. Every field is
/// optional: runtimes that report nothing still complete the run, the
/// orchestrator falls back to its own measurements.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerationStats {
    pub generated_tokens: Option<u32>,
    pub prompt_eval_end_ms: Option<u64>,
    pub inference_end_ms: Option<u64>,
}

impl GenerationStats {
    /// Self-reported generation window, `inference_end - prompt_eval_end`,
    /// when both timestamps are present.
    pub fn inference_window_ms(&self) -> Option<u64> {
        match (self.inference_end_ms, self.prompt_eval_end_ms) {
            (Some(end), Some(prompt_end)) if end > prompt_end => Some(end - prompt_end),
            _ => None,
        }
    }
}

/// Live generation, split across the two channels of the protocol:
/// a stream of partial results and a single-fire completion signal.
///
/// The completion channel is authoritative: the engine sends exactly one
/// stats value per generation and must close the token channel no later
/// than that send, so a drained token stream never outlives its run.
pub struct GenerationHandle {
    pub tokens: mpsc::Receiver<String>,
    pub stats: oneshot::Receiver<GenerationStats>,
}

/// One model-load + generate cycle on a native runtime.
///
/// `load` maps the runtime's result code onto `Result`; a non-zero code
/// surfaces as `EngineError::LoadCode`. After `stop()` the engine must not
/// deliver further tokens for the interrupted generation — per-run channels
/// make stale deliveries unreachable, `stop` only has to halt the work.
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    async fn load(&mut self) -> Result<(), EngineError>;

    async fn begin_generate(
        &mut self,
        request: GenerationRequest,
    ) -> Result<GenerationHandle, EngineError>;

    async fn stop(&mut self);

    async fn unload(&mut self);
}
