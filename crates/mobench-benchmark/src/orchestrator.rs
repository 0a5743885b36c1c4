use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use mobench_core::{
    epoch_ms, ram_usage_pct, BenchmarkEvent, BenchmarkSession, BenchmarkSettings, DeviceIdentity,
    InferenceOutcome, MobenchError, ModelSpec, Result, RunMetrics, SessionStatus, TelemetrySample,
    TelemetrySeries, UploadConfig,
};

use crate::collector::PeriodicCollector;
use crate::engine::{GenerationRequest, GenerationStats, InferenceEngine};
use crate::reporter::{MetricsReporter, UploadPayload};
use crate::telemetry::{capture_frame, TelemetryProbe};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::Error => "error",
        }
    }
}

/// Local persistence seam for finished runs. Failures are metrics-class:
/// logged and swallowed, never abort the session.
pub trait RunSink: Send + Sync {
    fn record(
        &self,
        model: &str,
        family: &str,
        payload: &serde_json::Value,
        status: RunStatus,
    ) -> Result<()>;
}

/// Collaborators wired into one session.
pub struct SessionContext {
    pub engine: Box<dyn InferenceEngine>,
    pub telemetry: Arc<dyn TelemetryProbe>,
    pub identity: DeviceIdentity,
    pub reporter: Option<MetricsReporter>,
    pub sink: Option<Arc<dyn RunSink>>,
}

/// Handle to a running session: the event stream plus its stop switch.
pub struct SessionHandle {
    pub events: mpsc::Receiver<BenchmarkEvent>,
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl SessionHandle {
    /// Requests cancellation: aborts native generation, halts the sampler,
    /// releases the model. The interrupted run is reported as an explicit
    /// error outcome before the stream terminates.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Waits for the sequencing worker to finish.
    pub async fn wait(self) {
        let _ = self.join.await;
    }
}

/// Drives the full benchmark sequence for one model:
/// load -> for each (repetition, input-size) { snapshot, generate with
/// timeout, collect telemetry, report } -> unload -> completion.
///
/// At most one session is active per orchestrator; `start` rejects a
/// second caller with `MobenchError::Concurrency`.
pub struct Orchestrator {
    settings: BenchmarkSettings,
    active: Arc<AtomicBool>,
}

impl Orchestrator {
    pub fn new(settings: BenchmarkSettings) -> Self {
        Self {
            settings,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    #[instrument(skip(self, ctx), fields(model = %model.model_id))]
    pub fn start(&self, model: ModelSpec, ctx: SessionContext) -> Result<SessionHandle> {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(MobenchError::Concurrency);
        }
        let guard = ActiveGuard {
            flag: self.active.clone(),
        };

        info!("starting benchmark session");
        let (events, rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();

        let worker = SessionWorker {
            session: BenchmarkSession::new(model, self.settings.clone()),
            engine: ctx.engine,
            telemetry: ctx.telemetry,
            identity: ctx.identity,
            reporter: ctx.reporter,
            sink: ctx.sink,
            events,
            cancel: cancel.clone(),
            load_time_ms: 0,
        };

        let join = tokio::spawn(async move {
            let _guard = guard;
            worker.run().await;
        });

        Ok(SessionHandle {
            events: rx,
            cancel,
            join,
        })
    }
}

/// Clears the active flag when the worker exits, however it exits.
struct ActiveGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

enum RunExit {
    Continue,
    Cancelled,
}

enum Waited {
    Stats(GenerationStats),
    Timeout,
    ChannelClosed,
    Cancelled,
}

struct SessionWorker {
    session: BenchmarkSession,
    engine: Box<dyn InferenceEngine>,
    telemetry: Arc<dyn TelemetryProbe>,
    identity: DeviceIdentity,
    reporter: Option<MetricsReporter>,
    sink: Option<Arc<dyn RunSink>>,
    events: mpsc::Sender<BenchmarkEvent>,
    cancel: CancellationToken,
    load_time_ms: u64,
}

impl SessionWorker {
    async fn run(mut self) {
        let model_id = self.session.model.model_id.clone();
        self.session.set_status(SessionStatus::Starting);
        self.emit(BenchmarkEvent::Started {
            model: model_id.clone(),
        })
        .await;

        self.session.set_status(SessionStatus::Loading);
        let load_start = Instant::now();
        let load_result = tokio::select! {
            _ = self.cancel.cancelled() => None,
            result = self.engine.load() => Some(result),
        };
        let load_time_ms = load_start.elapsed().as_millis() as u64;

        match load_result {
            Some(Ok(())) => {
                info!(model = %model_id, load_time_ms, "model loaded");
                self.load_time_ms = load_time_ms;
                self.emit(BenchmarkEvent::ModelLoaded {
                    model: model_id.clone(),
                    success: true,
                    load_time_ms,
                })
                .await;
            }
            Some(Err(e)) => {
                error!(model = %model_id, "model load failed: {}", e);
                self.emit(BenchmarkEvent::ModelLoaded {
                    model: model_id.clone(),
                    success: false,
                    load_time_ms,
                })
                .await;
                self.finish_failed(MobenchError::Load(e.to_string()).to_string())
                    .await;
                return;
            }
            None => {
                self.finish_failed("Benchmark cancelled".to_string()).await;
                return;
            }
        }

        // One load/unload pair covers every configuration and repetition.
        let total_runs = self.session.settings.run_repetitions;
        let sizes = self.session.settings.input_token_counts.clone();
        let mut cancelled = false;

        'session: for run in 1..=total_runs {
            self.session.current_run = run;
            for (config, &input_tokens) in sizes.iter().enumerate() {
                if self.cancel.is_cancelled() {
                    cancelled = true;
                    break 'session;
                }
                match self.run_one(config, input_tokens, run, total_runs).await {
                    RunExit::Continue => {}
                    RunExit::Cancelled => {
                        cancelled = true;
                        break 'session;
                    }
                }
            }
        }

        if cancelled {
            self.finish_failed("Benchmark cancelled".to_string()).await;
        } else {
            self.finish_completed(total_runs).await;
        }
    }

    async fn run_one(
        &mut self,
        config: usize,
        input_tokens: u32,
        run: u32,
        total_runs: u32,
    ) -> RunExit {
        self.session.set_status(SessionStatus::Running { config });
        self.emit(BenchmarkEvent::InferenceStarted {
            input_tokens,
            run,
            total_runs,
        })
        .await;

        // Start snapshot strictly before the generate call goes out.
        let start = capture_frame(&*self.telemetry);
        let start_sample = TelemetrySample::now(start.rss_mb);
        let collector = PeriodicCollector::start(
            self.telemetry.clone(),
            Duration::from_millis(self.session.settings.sample_interval_ms),
        );

        let started_at_ms = epoch_ms();
        let started = Instant::now();

        let request = GenerationRequest {
            prompt: build_prompt(input_tokens),
            input_tokens,
            max_output_tokens: self.session.settings.target_output_tokens,
        };

        let handle = match self.engine.begin_generate(request).await {
            Ok(handle) => handle,
            Err(e) => {
                collector.stop().await;
                warn!(input_tokens, "generation could not start: {}", e);
                self.emit(BenchmarkEvent::Error {
                    message: MobenchError::Inference(e.to_string()).to_string(),
                })
                .await;
                return RunExit::Continue;
            }
        };

        let streamed = Arc::new(AtomicU32::new(0));
        let streamed_in_task = streamed.clone();
        let mut tokens = handle.tokens;
        let drain = tokio::spawn(async move {
            let mut text = String::new();
            let mut first_token: Option<Instant> = None;
            while let Some(chunk) = tokens.recv().await {
                if first_token.is_none() {
                    first_token = Some(Instant::now());
                }
                streamed_in_task.fetch_add(1, Ordering::Relaxed);
                text.push_str(&chunk);
            }
            (text, first_token)
        });

        let timeout_secs = self.session.settings.inference_timeout_secs;
        let ceiling = Duration::from_secs(timeout_secs);
        let waited = tokio::select! {
            _ = self.cancel.cancelled() => Waited::Cancelled,
            result = tokio::time::timeout(ceiling, handle.stats) => match result {
                Ok(Ok(stats)) => Waited::Stats(stats),
                Ok(Err(_)) => Waited::ChannelClosed,
                Err(_) => Waited::Timeout,
            },
        };

        // The sampler stops at the run boundary no matter how the run ends.
        let mid_samples = collector.stop().await;

        match waited {
            Waited::Cancelled => {
                self.engine.stop().await;
                drain.abort();
                self.emit(BenchmarkEvent::Error {
                    message: format!("Inference cancelled for {} input tokens", input_tokens),
                })
                .await;
                RunExit::Cancelled
            }
            Waited::Timeout => {
                self.engine.stop().await;
                drain.abort();
                let err = MobenchError::Timeout {
                    timeout_secs,
                    input_tokens,
                    generated_tokens: streamed.load(Ordering::Relaxed),
                };
                warn!(model = %self.session.model.model_id, "{}", err);
                self.emit(BenchmarkEvent::Error {
                    message: err.to_string(),
                })
                .await;
                RunExit::Continue
            }
            Waited::ChannelClosed => {
                drain.abort();
                self.emit(BenchmarkEvent::Error {
                    message: MobenchError::Inference(
                        "generation ended without a completion signal".to_string(),
                    )
                    .to_string(),
                })
                .await;
                RunExit::Continue
            }
            Waited::Stats(stats) => {
                let inference_time_ms = started.elapsed().as_millis() as u64;
                let (text, first_token) = drain.await.unwrap_or_default();

                self.session.set_status(SessionStatus::Collecting { config });
                // End snapshot strictly after the completion signal.
                let end = capture_frame(&*self.telemetry);

                let generated_tokens = stats
                    .generated_tokens
                    .unwrap_or(self.session.settings.target_output_tokens);
                let tps = tokens_per_second(generated_tokens, &stats, inference_time_ms);
                let ttft_ms = first_token
                    .map(|t| t.duration_since(started).as_millis() as u64)
                    .unwrap_or(inference_time_ms);

                let mut series = TelemetrySeries::new();
                series.push(start_sample);
                series.extend(mid_samples);
                series.push(TelemetrySample::now(end.rss_mb));

                let total_memory = self.identity.total_memory_bytes;
                let metrics = RunMetrics {
                    outcome: InferenceOutcome {
                        text: text.clone(),
                        generated_tokens,
                        inference_time_ms,
                        ttft_ms,
                        tokens_per_sec: tps,
                        success: true,
                    },
                    start_ram_usage_pct: ram_usage_pct(start.rss_mb, total_memory),
                    end_ram_usage_pct: ram_usage_pct(end.rss_mb, total_memory),
                    series,
                    start,
                    end,
                    started_at_ms,
                    input_tokens,
                };

                self.emit(BenchmarkEvent::InferenceCompleted {
                    input_tokens,
                    result: text,
                    inference_time_ms,
                    tokens_per_sec: tps,
                    run,
                    total_runs,
                })
                .await;

                let posted = self.post_metrics(&metrics).await;
                self.emit(BenchmarkEvent::MetricsPosted {
                    input_tokens,
                    run,
                    total_runs,
                    success: posted,
                })
                .await;

                RunExit::Continue
            }
        }
    }

    /// Records the run locally, then uploads. The upload runs as its own
    /// task, but the worker waits on it: uploads stay strictly ordered,
    /// at most one in flight per session.
    async fn post_metrics(&mut self, metrics: &RunMetrics) -> bool {
        let version = self
            .reporter
            .as_ref()
            .map(|r| r.version().to_string())
            .unwrap_or_else(|| UploadConfig::default().version);
        let payload = UploadPayload::shape(
            &self.identity,
            &self.session.model,
            self.load_time_ms,
            metrics,
            &version,
        );

        self.record(&payload, RunStatus::Completed);

        match &self.reporter {
            Some(reporter) => {
                let reporter = reporter.clone();
                let upload = tokio::spawn(async move { reporter.post(&payload).await });
                upload.await.unwrap_or(false)
            }
            None => {
                debug!("no upload endpoint configured, skipping metrics post");
                false
            }
        }
    }

    fn record(&self, payload: &UploadPayload, status: RunStatus) {
        let Some(sink) = &self.sink else { return };
        let value = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(e) => {
                warn!("failed to serialize run for local store: {}", e);
                return;
            }
        };
        if let Err(e) = sink.record(
            &payload.model,
            &payload.family,
            &value,
            status,
        ) {
            warn!("failed to store run locally: {}", e);
        }
    }

    fn record_failure(&self) {
        let Some(sink) = &self.sink else { return };
        if let Err(e) = sink.record(
            &self.session.model.model_id,
            &self.session.model.family(),
            &serde_json::json!({}),
            RunStatus::Error,
        ) {
            warn!("failed to store failed session locally: {}", e);
        }
    }

    async fn finish_completed(mut self, total_runs: u32) {
        let model = self.session.model.model_id.clone();
        self.session.set_status(SessionStatus::Unloading);
        self.engine.unload().await;
        self.session.set_status(SessionStatus::Completed);
        self.emit(BenchmarkEvent::ResourcesReleased {
            model: model.clone(),
        })
        .await;
        info!(%model, total_runs, "benchmark completed");
        self.emit(BenchmarkEvent::Completed { model, total_runs }).await;
    }

    async fn finish_failed(mut self, message: String) {
        let model = self.session.model.model_id.clone();
        self.session.set_status(SessionStatus::Failed);
        self.engine.unload().await;
        self.record_failure();
        self.emit(BenchmarkEvent::ResourcesReleased {
            model: model.clone(),
        })
        .await;
        error!(%model, "benchmark failed: {}", message);
        self.emit(BenchmarkEvent::Error { message }).await;
    }

    async fn emit(&self, event: BenchmarkEvent) {
        if self.events.send(event).await.is_err() {
            debug!("benchmark event receiver dropped");
        }
    }
}

/// tps = tokens x 1000 / elapsed-ms, preferring the engine's self-reported
/// generation window over the measured wall clock. Zero tokens or a zero
/// window yield 0.0, never NaN.
pub fn tokens_per_second(generated_tokens: u32, stats: &GenerationStats, wall_ms: u64) -> f64 {
    if generated_tokens == 0 {
        return 0.0;
    }
    if let Some(window_ms) = stats.inference_window_ms() {
        return generated_tokens as f64 * 1000.0 / window_ms as f64;
    }
    if wall_ms > 0 {
        return generated_tokens as f64 * 1000.0 / wall_ms as f64;
    }
    0.0
}

/// Builds a prompt targeting `input_tokens` prompt tokens. A single
/// "Hello" is one token in the Llama tokenizer family and the wrapper adds
/// two, so n-2 repetitions land on the target count.
pub fn build_prompt(input_tokens: u32) -> String {
    "Hello".repeat(input_tokens.saturating_sub(2) as usize)
}
