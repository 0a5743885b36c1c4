use thiserror::Error;

#[derive(Error, Debug)]
pub enum MobenchError {
    #[error("Another benchmark session is already active")]
    Concurrency,

    #[error("Model load failed: {0}")]
    Load(String),

    #[error("Inference timed out after {timeout_secs} seconds for {input_tokens} input tokens. Generated {generated_tokens} tokens so far.")]
    Timeout {
        timeout_secs: u64,
        input_tokens: u32,
        generated_tokens: u32,
    },

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Metrics error: {0}")]
    Metrics(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, MobenchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_names_the_run() {
        let err = MobenchError::Timeout {
            timeout_secs: 3000,
            input_tokens: 10,
            generated_tokens: 4,
        };
        let msg = err.to_string();
        assert!(msg.contains("timed out"));
        assert!(msg.contains("10 input tokens"));
        assert!(msg.contains("4 tokens"));
    }
}
