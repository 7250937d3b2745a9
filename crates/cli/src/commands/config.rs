use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use copilot_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "agent.api_key",
        &redact_key(config.agent.api_key.expose_secret()),
        source("agent.api_key", &["COPILOT_API_KEY", "OPENAI_KEY"]),
    ));
    lines.push(render_line(
        "agent.api_version",
        &config.agent.api_version,
        source("agent.api_version", &["COPILOT_API_VERSION", "OPENAI_VERSION"]),
    ));
    lines.push(render_line(
        "agent.api_endpoint",
        &config.agent.api_endpoint,
        source("agent.api_endpoint", &["COPILOT_API_ENDPOINT", "OPENAI_URI"]),
    ));
    lines.push(render_line(
        "agent.model_deployment",
        &config.agent.model_deployment,
        source("agent.model_deployment", &["COPILOT_MODEL_DEPLOYMENT", "OPENAI_GPT_DEPLOYMENT"]),
    ));
    lines.push(render_line(
        "agent.email_uri",
        config.agent.email_uri.as_deref().unwrap_or("<unset>"),
        source("agent.email_uri", &["COPILOT_EMAIL_URI", "EMAIL_URI"]),
    ));

    let data_folder = config
        .workspace
        .data_folder
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<unset>".to_string());
    lines.push(render_line(
        "workspace.data_folder",
        &data_folder,
        source("workspace.data_folder", &["COPILOT_DATA_FOLDER", "DATA_FOLDER"]),
    ));
    lines.push(render_line(
        "workspace.output_folder",
        &config.workspace.output_folder.display().to_string(),
        source("workspace.output_folder", &["COPILOT_OUTPUT_FOLDER"]),
    ));
    lines.push(render_line(
        "workspace.keep_state",
        &config.workspace.keep_state.to_string(),
        source("workspace.keep_state", &["COPILOT_KEEP_STATE"]),
    ));

    lines.push(render_line(
        "runs.poll_interval_ms",
        &config.runs.poll_interval_ms.to_string(),
        source("runs.poll_interval_ms", &["COPILOT_RUN_POLL_INTERVAL_MS"]),
    ));
    lines.push(render_line(
        "runs.run_timeout_secs",
        &config.runs.run_timeout_secs.to_string(),
        source("runs.run_timeout_secs", &["COPILOT_RUN_TIMEOUT_SECS"]),
    ));
    lines.push(render_line(
        "runs.request_timeout_secs",
        &config.runs.request_timeout_secs.to_string(),
        source("runs.request_timeout_secs", &["COPILOT_REQUEST_TIMEOUT_SECS"]),
    ));

    lines.push(render_line(
        "market_data.base_url",
        &config.market_data.base_url,
        source("market_data.base_url", &["COPILOT_MARKET_DATA_BASE_URL"]),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", &["COPILOT_LOGGING_LEVEL", "COPILOT_LOG_LEVEL"]),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", &["COPILOT_LOGGING_FORMAT", "COPILOT_LOG_FORMAT"]),
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("copilot.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/copilot.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_key(key: &str) -> String {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if trimmed.chars().count() > 8 {
        let prefix: String = trimmed.chars().take(4).collect();
        return format!("{prefix}***");
    }

    "<redacted>".to_string()
}
