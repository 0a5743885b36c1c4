use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::engine::{
    EngineError, GenerationHandle, GenerationRequest, GenerationStats, InferenceEngine,
};

/// Inference engine backed by an Ollama server. `load` forces the weights
/// into memory with an empty generate call, `begin_generate` streams
/// NDJSON chunks off `/api/generate`, and `unload` drops the model with
/// `keep_alive: 0`.
pub struct OllamaEngine {
    host: String,
    model: String,
    client: reqwest::Client,
    generation: Option<JoinHandle<()>>,
}

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    prompt: Option<&'a str>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ApiOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    keep_alive: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ApiOptions {
    num_predict: u32,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    eval_count: Option<u64>,
    prompt_eval_duration: Option<u64>,
    eval_duration: Option<u64>,
}

/// Maps the final chunk's nanosecond timings onto the stats contract:
/// prompt-eval end and inference end as milliseconds from request start.
fn stats_from_chunk(chunk: &GenerateChunk) -> GenerationStats {
    let prompt_ms = chunk.prompt_eval_duration.map(|ns| ns / 1_000_000);
    let total_ms = match (chunk.prompt_eval_duration, chunk.eval_duration) {
        (Some(prompt), Some(eval)) => Some((prompt + eval) / 1_000_000),
        (None, Some(eval)) => Some(eval / 1_000_000),
        _ => None,
    };
    GenerationStats {
        generated_tokens: chunk.eval_count.map(|c| c as u32),
        prompt_eval_end_ms: prompt_ms,
        inference_end_ms: total_ms,
    }
}

impl OllamaEngine {
    pub fn new(host: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            model: model.into(),
            client: reqwest::Client::new(),
            generation: None,
        }
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.host)
    }
}

#[async_trait]
impl InferenceEngine for OllamaEngine {
    async fn load(&mut self) -> Result<(), EngineError> {
        debug!(model = %self.model, "loading model");
        let request = ApiRequest {
            model: &self.model,
            prompt: None,
            stream: false,
            options: None,
            keep_alive: None,
        };

        let resp = self
            .client
            .post(self.generate_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| EngineError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(EngineError::Status(resp.status().as_u16()));
        }
        Ok(())
    }

    async fn begin_generate(
        &mut self,
        request: GenerationRequest,
    ) -> Result<GenerationHandle, EngineError> {
        let body = ApiRequest {
            model: &self.model,
            prompt: Some(&request.prompt),
            stream: true,
            options: Some(ApiOptions {
                num_predict: request.max_output_tokens,
            }),
            keep_alive: None,
        };

        let resp = self
            .client
            .post(self.generate_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(EngineError::Status(resp.status().as_u16()));
        }

        let (token_tx, token_rx) = mpsc::channel(100);
        let (stats_tx, stats_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            // Completion is single-fire: the sender is taken on first use
            // and any later terminal chunk is dropped.
            let mut stats_tx = Some(stats_tx);
            let mut stream = resp.bytes_stream();
            let mut buffer = String::new();

            while let Some(next) = stream.next().await {
                let bytes = match next {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        warn!("generation stream error: {}", e);
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&bytes));

                while let Some(pos) = buffer.find('\n') {
                    let line: String = buffer.drain(..=pos).collect();
                    if !handle_line(line.trim(), &token_tx, &mut stats_tx).await {
                        return;
                    }
                }
            }

            if !buffer.trim().is_empty() {
                handle_line(buffer.trim(), &token_tx, &mut stats_tx).await;
            }
        });

        self.generation = Some(task);

        Ok(GenerationHandle {
            tokens: token_rx,
            stats: stats_rx,
        })
    }

    async fn stop(&mut self) {
        // No server-side cancel on the generate API; dropping the transfer
        // aborts the generation client-side and closes both channels.
        if let Some(task) = self.generation.take() {
            task.abort();
        }
    }

    async fn unload(&mut self) {
        debug!(model = %self.model, "unloading model");
        let request = ApiRequest {
            model: &self.model,
            prompt: None,
            stream: false,
            options: None,
            keep_alive: Some(0),
        };

        if let Err(e) = self
            .client
            .post(self.generate_url())
            .json(&request)
            .send()
            .await
        {
            warn!("model unload request failed: {}", e);
        }
        self.generation = None;
    }
}

/// Parses one NDJSON line, forwarding the token and, on the terminal
/// chunk, the stats. Returns false once the generation is finished.
async fn handle_line(
    line: &str,
    token_tx: &mpsc::Sender<String>,
    stats_tx: &mut Option<oneshot::Sender<GenerationStats>>,
) -> bool {
    if line.is_empty() {
        return true;
    }
    let chunk: GenerateChunk = match serde_json::from_str(line) {
        Ok(chunk) => chunk,
        Err(e) => {
            warn!("unparseable generation chunk: {}", e);
            return true;
        }
    };

    if !chunk.response.is_empty() && token_tx.send(chunk.response.clone()).await.is_err() {
        return false;
    }

    if chunk.done {
        if let Some(tx) = stats_tx.take() {
            let _ = tx.send(stats_from_chunk(&chunk));
        }
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_chunk_maps_nanoseconds_to_milliseconds() {
        let chunk: GenerateChunk = serde_json::from_str(
            r#"{"response":"","done":true,"eval_count":10,"prompt_eval_duration":100000000,"eval_duration":700000000}"#,
        )
        .unwrap();
        assert!(chunk.done);

        let stats = stats_from_chunk(&chunk);
        assert_eq!(stats.generated_tokens, Some(10));
        assert_eq!(stats.prompt_eval_end_ms, Some(100));
        assert_eq!(stats.inference_end_ms, Some(800));
        assert_eq!(stats.inference_window_ms(), Some(700));
    }

    #[test]
    fn partial_chunk_carries_a_token() {
        let chunk: GenerateChunk =
            serde_json::from_str(r#"{"response":"Hel","done":false}"#).unwrap();
        assert_eq!(chunk.response, "Hel");
        assert!(!chunk.done);
        assert_eq!(stats_from_chunk(&chunk).generated_tokens, None);
    }

    #[test]
    fn missing_timings_stay_absent() {
        let chunk: GenerateChunk =
            serde_json::from_str(r#"{"response":"","done":true,"eval_count":5}"#).unwrap();
        let stats = stats_from_chunk(&chunk);
        assert_eq!(stats.generated_tokens, Some(5));
        assert_eq!(stats.inference_window_ms(), None);
    }
}
