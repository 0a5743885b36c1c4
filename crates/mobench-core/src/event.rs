use serde::{Deserialize, Serialize};

/// Callback surface exposed to the observer (UI, CLI, tests). Exactly one
/// terminal event — `Completed` or a session-fatal `Error` — closes the
/// stream, preceded by `ResourcesReleased`. Per-run failures surface as
/// non-terminal `Error` events and the session keeps going.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BenchmarkEvent {
    Started {
        model: String,
    },
    ModelLoaded {
        model: String,
        success: bool,
        load_time_ms: u64,
    },
    InferenceStarted {
        input_tokens: u32,
        run: u32,
        total_runs: u32,
    },
    InferenceCompleted {
        input_tokens: u32,
        result: String,
        inference_time_ms: u64,
        tokens_per_sec: f64,
        run: u32,
        total_runs: u32,
    },
    MetricsPosted {
        input_tokens: u32,
        run: u32,
        total_runs: u32,
        success: bool,
    },
    ResourcesReleased {
        model: String,
    },
    Completed {
        model: String,
        total_runs: u32,
    },
    Error {
        message: String,
    },
}
