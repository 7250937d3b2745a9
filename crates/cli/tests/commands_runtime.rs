use std::env;
use std::net::SocketAddr;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use copilot_cli::commands::ask::AskArgs;
use copilot_cli::commands::{ask, config, email, price};
use copilot_core::config::ENV_KEYS;
use serde_json::{json, Value};

const CREDENTIALS: [(&str, &str); 2] = [
    ("COPILOT_API_KEY", "0123456789abcdef0123456789abcdef"),
    ("COPILOT_API_ENDPOINT", "https://example.openai.azure.com"),
];

#[test]
fn ask_returns_config_failure_without_api_key() {
    with_env(&[], || {
        let result = ask::run(AskArgs {
            user_name: "Ada".to_string(),
            user_id: "ada".to_string(),
            keep: false,
            prompt: "hello".to_string(),
        });
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "ask");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
        assert!(payload["message"].as_str().unwrap_or("").contains("agent.api_key"));
    });
}

#[test]
fn ask_prints_reply_saves_chart_and_removes_remote_state() {
    let deleted: Deleted = Arc::default();
    let base = spawn_server(azure_router(Arc::clone(&deleted)));
    let output = tempfile::tempdir().expect("tempdir");
    let charts = output.path().join("charts");
    let charts_value = charts.to_string_lossy().into_owned();

    let vars = [
        ("COPILOT_API_KEY", "0123456789abcdef0123456789abcdef"),
        ("COPILOT_API_ENDPOINT", base.as_str()),
        ("COPILOT_OUTPUT_FOLDER", charts_value.as_str()),
        ("COPILOT_RUN_POLL_INTERVAL_MS", "1"),
    ];
    with_env(&vars, || {
        let result = ask::run(AskArgs {
            user_name: "Ada".to_string(),
            user_id: "ada".to_string(),
            keep: false,
            prompt: "Chart MSFT for me".to_string(),
        });
        assert_eq!(result.exit_code, 0, "expected successful ask: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "ask");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["error_class"], Value::Null);
        let saved = charts.join("file_chart.png");
        let expected = format!(
            "Trading Agent: Here is the MSFT chart, Ada.\nTrading Agent: [image file file_chart]\nsaved {}",
            saved.display()
        );
        assert_eq!(payload["message"], expected.as_str());

        assert_eq!(std::fs::read(&saved).expect("saved chart"), CHART_BYTES.to_vec());
    });

    let deleted = deleted.lock().expect("deleted lock").clone();
    assert_eq!(deleted, vec!["assistant:asst_1".to_string(), "thread:thread_1".to_string()]);
}

#[test]
fn price_reports_latest_close_from_market_data() {
    let base = spawn_server(Router::new().route("/v8/finance/chart/{symbol}", get(chart)));
    let mut vars = CREDENTIALS.to_vec();
    vars.push(("COPILOT_MARKET_DATA_BASE_URL", base.as_str()));

    with_env(&vars, || {
        let result = price::run("msft");
        assert_eq!(result.exit_code, 0, "expected successful price lookup: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "price");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["message"], "MSFT 415.1");

        let unknown = price::run("NOPE");
        assert_eq!(unknown.exit_code, 4);
        assert_eq!(parse_payload(&unknown.output)["error_class"], "unknown_symbol");
    });
}

#[test]
fn email_requires_a_configured_webhook() {
    with_env(&CREDENTIALS, || {
        let result = email::run("ada@example.com", "hi");
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "email_not_configured");
    });
}

#[test]
fn email_succeeds_only_when_the_webhook_accepts() {
    let base = spawn_server(
        Router::new()
            .route("/accept", post(|| async { StatusCode::ACCEPTED }))
            .route("/reject", post(|| async { StatusCode::BAD_REQUEST })),
    );

    let accept_uri = format!("{base}/accept");
    let mut vars = CREDENTIALS.to_vec();
    vars.push(("EMAIL_URI", accept_uri.as_str()));
    with_env(&vars, || {
        let result = email::run("ada@example.com", "MSFT closed at 415.10");
        assert_eq!(result.exit_code, 0, "expected accepted email: {}", result.output);
        assert_eq!(parse_payload(&result.output)["message"], "email sent to ada@example.com");
    });

    let reject_uri = format!("{base}/reject");
    let mut vars = CREDENTIALS.to_vec();
    vars.push(("COPILOT_EMAIL_URI", reject_uri.as_str()));
    with_env(&vars, || {
        let result = email::run("ada@example.com", "hi");
        assert_eq!(result.exit_code, 5);
        assert_eq!(parse_payload(&result.output)["error_class"], "email_rejected");
    });
}

#[test]
fn config_redacts_api_key_and_attributes_sources() {
    with_env(
        &[
            ("OPENAI_KEY", "0123456789abcdef0123456789abcdef"),
            ("OPENAI_URI", "https://example.openai.azure.com"),
            ("COPILOT_KEEP_STATE", "true"),
        ],
        || {
            let output = config::run();
            assert!(output.starts_with("effective config"));
            assert!(!output.contains("0123456789abcdef"), "api key leaked: {output}");
            assert!(output.contains("- agent.api_key = 0123*** (source: env (OPENAI_KEY))"));
            assert!(output.contains(
                "- agent.api_endpoint = https://example.openai.azure.com (source: env (OPENAI_URI))"
            ));
            assert!(output.contains("- workspace.keep_state = true (source: env (COPILOT_KEEP_STATE))"));
            assert!(output.contains("- agent.email_uri = <unset> (source: default)"));
            assert!(output.contains("- runs.run_timeout_secs = 300 (source: default)"));
        },
    );
}

#[test]
fn config_reports_validation_failure() {
    with_env(&[], || {
        let output = config::run();
        assert!(output.starts_with("config validation failed"));
    });
}

async fn chart(Path(symbol): Path<String>) -> Response {
    if symbol != "MSFT" {
        return StatusCode::NOT_FOUND.into_response();
    }
    Json(json!({
        "chart": {
            "result": [{ "indicators": { "quote": [{ "close": [410.0, 415.1] }] } }],
            "error": null
        }
    }))
    .into_response()
}

type Deleted = Arc<Mutex<Vec<String>>>;

const CHART_BYTES: [u8; 4] = [0x89, b'P', b'N', b'G'];

fn azure_router(deleted: Deleted) -> Router {
    Router::new()
        .route(
            "/openai/assistants",
            post(|Json(body): Json<Value>| async move {
                Json(json!({ "id": "asst_1", "name": body["name"], "model": body["model"] }))
            }),
        )
        .route("/openai/assistants/{id}", delete(delete_assistant))
        .route("/openai/threads", post(|| async { Json(json!({ "id": "thread_1" })) }))
        .route("/openai/threads/{thread_id}", delete(delete_thread))
        .route("/openai/threads/{thread_id}/messages", post(create_message).get(list_messages))
        .route(
            "/openai/threads/{thread_id}/runs",
            post(|Path(thread_id): Path<String>| async move {
                Json(json!({ "id": "run_1", "thread_id": thread_id, "status": "queued" }))
            }),
        )
        .route(
            "/openai/threads/{thread_id}/runs/{run_id}",
            get(|Path((thread_id, run_id)): Path<(String, String)>| async move {
                Json(json!({ "id": run_id, "thread_id": thread_id, "status": "completed" }))
            }),
        )
        .route("/openai/files/{file_id}/content", get(|| async { CHART_BYTES.to_vec() }))
        .with_state(deleted)
}

async fn delete_assistant(State(deleted): State<Deleted>, Path(id): Path<String>) -> Json<Value> {
    deleted.lock().expect("deleted lock").push(format!("assistant:{id}"));
    Json(json!({ "id": id, "deleted": true }))
}

async fn delete_thread(State(deleted): State<Deleted>, Path(id): Path<String>) -> Json<Value> {
    deleted.lock().expect("deleted lock").push(format!("thread:{id}"));
    Json(json!({ "id": id, "deleted": true }))
}

async fn create_message(Path(thread_id): Path<String>, Json(body): Json<Value>) -> Response {
    if body["role"] != "user" || body["content"] != "Chart MSFT for me" {
        return StatusCode::BAD_REQUEST.into_response();
    }
    Json(json!({
        "id": "msg_user",
        "thread_id": thread_id,
        "role": "user",
        "created_at": 1,
        "content": [{ "type": "text", "text": { "value": body["content"], "annotations": [] } }]
    }))
    .into_response()
}

async fn list_messages(Path(thread_id): Path<String>) -> Json<Value> {
    Json(json!({
        "data": [{
            "id": "msg_reply",
            "thread_id": thread_id,
            "role": "assistant",
            "created_at": 2,
            "run_id": "run_1",
            "content": [
                { "type": "text", "text": { "value": "Here is the MSFT chart, Ada.", "annotations": [] } },
                { "type": "image_file", "image_file": { "file_id": "file_chart" } }
            ]
        }],
        "has_more": false
    }))
}

fn spawn_server(router: Router) -> String {
    let (sender, receiver) = mpsc::channel::<SocketAddr>();
    thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("mock server runtime");
        runtime.block_on(async move {
            let listener =
                tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
            sender.send(listener.local_addr().expect("local address")).expect("send address");
            axum::serve(listener, router).await.expect("mock server");
        });
    });
    format!("http://{}", receiver.recv().expect("mock server address"))
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let previous_values: Vec<(&str, Option<String>)> =
        ENV_KEYS.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in ENV_KEYS {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
