use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use tokio::net::TcpListener;

use mobench_benchmark::{GenerationRequest, InferenceEngine, OllamaEngine};

type Requests = Arc<Mutex<Vec<serde_json::Value>>>;

const STREAM_BODY: &str = concat!(
    "{\"response\":\"The\",\"done\":false}\n",
    "{\"response\":\" cat\",\"done\":false}\n",
    "{\"response\":\"\",\"done\":true,\"eval_count\":10,",
    "\"prompt_eval_duration\":100000000,\"eval_duration\":700000000}\n",
);

async fn spawn_server(requests: Requests) -> String {
    let app = Router::new()
        .route(
            "/api/generate",
            post(
                |State(requests): State<Requests>, Json(body): Json<serde_json::Value>| async move {
                    let streaming = body["stream"].as_bool().unwrap_or(false);
                    requests.lock().unwrap().push(body);
                    match streaming {
                        true => STREAM_BODY.to_string(),
                        false => "{\"done\":true}".to_string(),
                    }
                },
            ),
        )
        .with_state(requests);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn generation_streams_tokens_and_fires_one_stats_signal() {
    let requests: Requests = Arc::default();
    let host = spawn_server(requests.clone()).await;

    let mut engine = OllamaEngine::new(&host, "llama3.2:1b");
    engine.load().await.unwrap();

    let handle = engine
        .begin_generate(GenerationRequest {
            prompt: "HelloHello".into(),
            input_tokens: 4,
            max_output_tokens: 10,
        })
        .await
        .unwrap();

    let mut tokens = handle.tokens;
    let mut text = String::new();
    while let Some(chunk) = tokens.recv().await {
        text.push_str(&chunk);
    }
    assert_eq!(text, "The cat");

    let stats = handle.stats.await.unwrap();
    assert_eq!(stats.generated_tokens, Some(10));
    assert_eq!(stats.prompt_eval_end_ms, Some(100));
    assert_eq!(stats.inference_end_ms, Some(800));
    assert_eq!(stats.inference_window_ms(), Some(700));

    let seen = requests.lock().unwrap();
    assert_eq!(seen.len(), 2);
    // load call holds the model without generating
    assert_eq!(seen[0]["stream"], false);
    assert!(seen[0]["prompt"].is_null());
    // generate call carries the prompt and the output token cap
    assert_eq!(seen[1]["stream"], true);
    assert_eq!(seen[1]["prompt"], "HelloHello");
    assert_eq!(seen[1]["options"]["num_predict"], 10);
}

#[tokio::test]
async fn unload_drops_the_model_with_zero_keep_alive() {
    let requests: Requests = Arc::default();
    let host = spawn_server(requests.clone()).await;

    let mut engine = OllamaEngine::new(&host, "llama3.2:1b");
    engine.unload().await;

    let seen = requests.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0]["keep_alive"], 0);
}

#[tokio::test]
async fn load_against_a_dead_server_is_an_error() {
    let mut engine = OllamaEngine::new("http://127.0.0.1:1", "llama3.2:1b");
    assert!(engine.load().await.is_err());
}
