use serde::{Deserialize, Serialize};

/// Settings for one benchmark session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkSettings {
    /// Ordered target prompt-token counts, one inference run per entry.
    pub input_token_counts: Vec<u32>,
    /// How many times the full list of input sizes is repeated.
    pub run_repetitions: u32,
    /// Requested output length per generation.
    pub target_output_tokens: u32,
    /// Ceiling on a single generation before the run is abandoned.
    pub inference_timeout_secs: u64,
    /// Cadence of the in-run memory sampler.
    pub sample_interval_ms: u64,
}

impl Default for BenchmarkSettings {
    fn default() -> Self {
        Self {
            input_token_counts: vec![10],
            run_repetitions: 1,
            target_output_tokens: 10,
            inference_timeout_secs: 3000,
            sample_interval_ms: 2000,
        }
    }
}

impl BenchmarkSettings {
    /// Total number of inference runs a session will attempt.
    pub fn total_runs(&self) -> u32 {
        self.input_token_counts.len() as u32 * self.run_repetitions
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub endpoint: String,
    pub protect_key: String,
    pub version: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            protect_key: String::new(),
            version: format!("mobench-{}", env!("CARGO_PKG_VERSION")),
        }
    }
}
