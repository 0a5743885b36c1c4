use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mobench_benchmark::{
    MetricsReporter, OllamaEngine, Orchestrator, SessionContext, TelemetryProbe,
};
use mobench_core::{BenchmarkEvent, BenchmarkSettings, ModelSpec, UploadConfig};
use mobench_services::{device_identity, ResultStore, SysfsTelemetry};

#[derive(Parser)]
#[command(name = "mobench")]
#[command(about = "On-device LLM benchmark harness", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a benchmark session against a local runtime
    Run {
        /// Model ID to benchmark
        #[arg(short, long)]
        model: String,

        /// Target prompt-token counts, one inference run per value
        #[arg(short, long, default_values_t = vec![10u32])]
        input_tokens: Vec<u32>,

        /// How many times to repeat the full list of input sizes
        #[arg(short, long, default_value = "1")]
        runs: u32,

        /// Output tokens requested per generation
        #[arg(short, long, default_value = "10")]
        output_tokens: u32,

        /// Per-generation timeout ceiling in seconds
        #[arg(long, default_value = "3000")]
        timeout_secs: u64,

        /// Runtime host URL
        #[arg(long, default_value = "http://localhost:11434")]
        host: String,

        /// Collection endpoint base URL (overrides MOBENCH_ENDPOINT)
        #[arg(long)]
        endpoint: Option<String>,

        /// Skip the metrics upload entirely
        #[arg(long)]
        no_upload: bool,
    },

    /// Print a device telemetry snapshot
    Device,

    /// List locally stored benchmark results
    History,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            model,
            input_tokens,
            runs,
            output_tokens,
            timeout_secs,
            host,
            endpoint,
            no_upload,
        } => {
            cmd_run(
                model,
                input_tokens,
                runs,
                output_tokens,
                timeout_secs,
                host,
                endpoint,
                no_upload,
            )
            .await
        }
        Commands::Device => cmd_device(),
        Commands::History => cmd_history(),
    }
}

fn resolve_host(host: String) -> String {
    std::env::var("OLLAMA_HOST").unwrap_or(host)
}

fn upload_config(endpoint: Option<String>) -> Option<UploadConfig> {
    let endpoint = endpoint.or_else(|| std::env::var("MOBENCH_ENDPOINT").ok())?;
    Some(UploadConfig {
        endpoint,
        protect_key: std::env::var("MOBENCH_PROTECT_KEY").unwrap_or_default(),
        ..Default::default()
    })
}

async fn cmd_run(
    model: String,
    input_tokens: Vec<u32>,
    runs: u32,
    output_tokens: u32,
    timeout_secs: u64,
    host: String,
    endpoint: Option<String>,
    no_upload: bool,
) -> Result<()> {
    let settings = BenchmarkSettings {
        input_token_counts: input_tokens,
        run_repetitions: runs,
        target_output_tokens: output_tokens,
        inference_timeout_secs: timeout_secs,
        ..Default::default()
    };

    let store = Arc::new(ResultStore::new(None)?);
    let identity = device_identity(&store);
    let host = resolve_host(host);

    let reporter = if no_upload {
        None
    } else {
        upload_config(endpoint).map(|cfg| MetricsReporter::new(&cfg))
    };
    if reporter.is_none() {
        println!("Upload disabled; results are kept in the local store only.");
    }

    println!();
    println!("Benchmarking {} against {}", model, host);
    println!(
        "  Input sizes: {:?}  Repetitions: {}  Output tokens: {}",
        settings.input_token_counts, settings.run_repetitions, settings.target_output_tokens
    );
    println!();

    let orchestrator = Orchestrator::new(settings);
    let context = SessionContext {
        engine: Box::new(OllamaEngine::new(&host, &model)),
        telemetry: Arc::new(SysfsTelemetry::default()),
        identity,
        reporter,
        sink: Some(store),
    };

    let mut handle = orchestrator.start(ModelSpec::new(&model), context)?;

    let mut failed = false;
    while let Some(event) = handle.events.recv().await {
        match event {
            BenchmarkEvent::Started { model } => {
                println!("Benchmark started: {}", model);
            }
            BenchmarkEvent::ModelLoaded {
                success,
                load_time_ms,
                ..
            } => match success {
                true => println!("Model loaded in {} ms", load_time_ms),
                false => println!("Model load failed after {} ms", load_time_ms),
            },
            BenchmarkEvent::InferenceStarted {
                input_tokens,
                run,
                total_runs,
            } => {
                println!(
                    "[run {}/{}] generating with {} input tokens...",
                    run, total_runs, input_tokens
                );
            }
            BenchmarkEvent::InferenceCompleted {
                inference_time_ms,
                tokens_per_sec,
                ..
            } => {
                println!(
                    "  completed in {} ms ({:.2} t/s)",
                    inference_time_ms, tokens_per_sec
                );
            }
            BenchmarkEvent::MetricsPosted { success, .. } => match success {
                true => println!("  metrics posted"),
                false => println!("  metrics not posted"),
            },
            BenchmarkEvent::ResourcesReleased { .. } => {
                println!("Resources released");
            }
            BenchmarkEvent::Completed { total_runs, .. } => {
                println!("Benchmark completed ({} repetition(s))", total_runs);
            }
            BenchmarkEvent::Error { message } => {
                println!("Error: {}", message);
                failed = true;
            }
        }
    }
    handle.wait().await;

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_device() -> Result<()> {
    let store = ResultStore::new(None)?;
    let identity = device_identity(&store);
    let telemetry = SysfsTelemetry::default();

    println!("Device:");
    println!("{:-<50}", "");
    println!("  Id:             {}", identity.device_id);
    println!("  Model:          {}", identity.model);
    println!("  Brand:          {}", identity.brand);
    println!(
        "  OS:             {} {}",
        identity.system_name, identity.system_version
    );
    println!(
        "  Total memory:   {:.1} GB",
        identity.total_memory_bytes as f64 / 1024.0 / 1024.0 / 1024.0
    );
    println!();

    println!("Telemetry:");
    println!("{:-<50}", "");
    match telemetry.memory_rss_mb() {
        Some(mb) => println!("  RSS:            {} MB", mb),
        None => println!("  RSS:            unavailable"),
    }
    match telemetry.battery_level() {
        Some(level) => println!("  Battery:        {:.0}%", level * 100.0),
        None => println!("  Battery:        no battery"),
    }
    if let Some(temp) = telemetry.battery_temperature_c() {
        println!("  Battery temp:   {:.1} °C", temp);
    }
    if let Some(snapshot) = telemetry.battery_snapshot() {
        println!(
            "  Capacity:       {:.0}/{:.0} mAh",
            snapshot.remaining_capacity_mah, snapshot.battery_capacity_mah
        );
    }
    for zone in telemetry.thermal_zones() {
        println!("  {:<15} {:.1} °C", format!("{}:", zone.label), zone.celsius);
    }

    Ok(())
}

fn cmd_history() -> Result<()> {
    let store = ResultStore::new(None)?;
    let rows = store.list()?;

    if rows.is_empty() {
        println!("No stored benchmark results.");
        return Ok(());
    }

    println!();
    println!("  {:<28} {:<18} {:<10} {}", "Model", "Family", "Status", "Stored at");
    println!("{:-<75}", "");
    for row in rows {
        println!(
            "  {:<28} {:<18} {:<10} {}",
            row.model, row.family, row.status, row.timestamp
        );
    }
    println!();

    Ok(())
}
