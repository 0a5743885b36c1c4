pub mod collector;
pub mod engine;
pub mod ollama;
pub mod orchestrator;
pub mod reporter;
pub mod telemetry;

pub use collector::PeriodicCollector;
pub use engine::{
    EngineError, GenerationHandle, GenerationRequest, GenerationStats, InferenceEngine,
};
pub use ollama::OllamaEngine;
pub use orchestrator::{
    build_prompt, tokens_per_second, Orchestrator, RunSink, RunStatus, SessionContext,
    SessionHandle,
};
pub use reporter::{MetricsReporter, PhoneData, RunEntry, SessionData, UploadPayload};
pub use telemetry::{capture_frame, TelemetryProbe};
