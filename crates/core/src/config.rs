use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub workspace: WorkspaceConfig,
    pub runs: RunConfig,
    pub market_data: MarketDataConfig,
    pub logging: LoggingConfig,
}

/// Credentials and endpoints for the hosted assistants service and the email webhook.
#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub api_key: SecretString,
    pub api_version: String,
    pub api_endpoint: String,
    pub model_deployment: String,
    pub email_uri: Option<String>,
}

#[derive(Clone, Debug)]
pub struct WorkspaceConfig {
    pub data_folder: Option<PathBuf>,
    pub output_folder: PathBuf,
    pub keep_state: bool,
}

#[derive(Clone, Debug)]
pub struct RunConfig {
    pub poll_interval_ms: u64,
    pub run_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct MarketDataConfig {
    pub base_url: String,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub api_key: Option<String>,
    pub api_endpoint: Option<String>,
    pub email_uri: Option<String>,
    pub data_folder: Option<PathBuf>,
    pub keep_state: Option<bool>,
    pub market_data_base_url: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

pub const DEFAULT_API_VERSION: &str = "2024-05-01-preview";
pub const DEFAULT_MARKET_DATA_BASE_URL: &str = "https://query1.finance.yahoo.com";

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            agent: AgentConfig {
                api_key: String::new().into(),
                api_version: DEFAULT_API_VERSION.to_string(),
                api_endpoint: String::new(),
                model_deployment: "gpt-4o".to_string(),
                email_uri: None,
            },
            workspace: WorkspaceConfig {
                data_folder: None,
                output_folder: PathBuf::from("output"),
                keep_state: false,
            },
            runs: RunConfig { poll_interval_ms: 1_000, run_timeout_secs: 300, request_timeout_secs: 60 },
            market_data: MarketDataConfig { base_url: DEFAULT_MARKET_DATA_BASE_URL.to_string() },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AgentConfig {
    /// Assistants REST root, e.g. `https://my-resource.openai.azure.com/openai`.
    pub fn api_root(&self) -> String {
        format!("{}/openai", self.api_endpoint.trim_end_matches('/'))
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("copilot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(agent) = patch.agent {
            if let Some(api_key_value) = agent.api_key {
                self.agent.api_key = secret_value(api_key_value);
            }
            if let Some(api_version) = agent.api_version {
                self.agent.api_version = api_version;
            }
            if let Some(api_endpoint) = agent.api_endpoint {
                self.agent.api_endpoint = api_endpoint;
            }
            if let Some(model_deployment) = agent.model_deployment {
                self.agent.model_deployment = model_deployment;
            }
            if let Some(email_uri) = agent.email_uri {
                self.agent.email_uri = Some(email_uri);
            }
        }

        if let Some(workspace) = patch.workspace {
            if let Some(data_folder) = workspace.data_folder {
                self.workspace.data_folder = Some(data_folder);
            }
            if let Some(output_folder) = workspace.output_folder {
                self.workspace.output_folder = output_folder;
            }
            if let Some(keep_state) = workspace.keep_state {
                self.workspace.keep_state = keep_state;
            }
        }

        if let Some(runs) = patch.runs {
            if let Some(poll_interval_ms) = runs.poll_interval_ms {
                self.runs.poll_interval_ms = poll_interval_ms;
            }
            if let Some(run_timeout_secs) = runs.run_timeout_secs {
                self.runs.run_timeout_secs = run_timeout_secs;
            }
            if let Some(request_timeout_secs) = runs.request_timeout_secs {
                self.runs.request_timeout_secs = request_timeout_secs;
            }
        }

        if let Some(market_data) = patch.market_data {
            if let Some(base_url) = market_data.base_url {
                self.market_data.base_url = base_url;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("COPILOT_API_KEY").or_else(|| read_env("OPENAI_KEY")) {
            self.agent.api_key = secret_value(value);
        }
        if let Some(value) = read_env("COPILOT_API_VERSION").or_else(|| read_env("OPENAI_VERSION"))
        {
            self.agent.api_version = value;
        }
        if let Some(value) = read_env("COPILOT_API_ENDPOINT").or_else(|| read_env("OPENAI_URI")) {
            self.agent.api_endpoint = value;
        }
        let model_deployment = read_env("COPILOT_MODEL_DEPLOYMENT")
            .or_else(|| read_env("OPENAI_GPT_DEPLOYMENT"));
        if let Some(value) = model_deployment {
            self.agent.model_deployment = value;
        }
        if let Some(value) = read_env("COPILOT_EMAIL_URI").or_else(|| read_env("EMAIL_URI")) {
            self.agent.email_uri = Some(value);
        }

        if let Some(value) = read_env("COPILOT_DATA_FOLDER").or_else(|| read_env("DATA_FOLDER")) {
            self.workspace.data_folder = Some(PathBuf::from(value));
        }
        if let Some(value) = read_env("COPILOT_OUTPUT_FOLDER") {
            self.workspace.output_folder = PathBuf::from(value);
        }
        if let Some(value) = read_env("COPILOT_KEEP_STATE") {
            self.workspace.keep_state = parse_bool("COPILOT_KEEP_STATE", &value)?;
        }

        if let Some(value) = read_env("COPILOT_RUN_POLL_INTERVAL_MS") {
            self.runs.poll_interval_ms = parse_u64("COPILOT_RUN_POLL_INTERVAL_MS", &value)?;
        }
        if let Some(value) = read_env("COPILOT_RUN_TIMEOUT_SECS") {
            self.runs.run_timeout_secs = parse_u64("COPILOT_RUN_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("COPILOT_REQUEST_TIMEOUT_SECS") {
            self.runs.request_timeout_secs = parse_u64("COPILOT_REQUEST_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("COPILOT_MARKET_DATA_BASE_URL") {
            self.market_data.base_url = value;
        }

        let log_level =
            read_env("COPILOT_LOGGING_LEVEL").or_else(|| read_env("COPILOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("COPILOT_LOGGING_FORMAT").or_else(|| read_env("COPILOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(api_key) = overrides.api_key {
            self.agent.api_key = secret_value(api_key);
        }
        if let Some(api_endpoint) = overrides.api_endpoint {
            self.agent.api_endpoint = api_endpoint;
        }
        if let Some(email_uri) = overrides.email_uri {
            self.agent.email_uri = Some(email_uri);
        }
        if let Some(data_folder) = overrides.data_folder {
            self.workspace.data_folder = Some(data_folder);
        }
        if let Some(keep_state) = overrides.keep_state {
            self.workspace.keep_state = keep_state;
        }
        if let Some(base_url) = overrides.market_data_base_url {
            self.market_data.base_url = base_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_agent(&self.agent)?;
        validate_runs(&self.runs)?;
        validate_market_data(&self.market_data)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("copilot.toml"), PathBuf::from("config/copilot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn validate_agent(agent: &AgentConfig) -> Result<(), ConfigError> {
    if agent.api_key.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "agent.api_key is required. Find it under Keys and Endpoint of the Azure OpenAI resource"
                .to_string(),
        ));
    }

    let endpoint = agent.api_endpoint.trim();
    if endpoint.is_empty() {
        return Err(ConfigError::Validation("agent.api_endpoint is required".to_string()));
    }
    if !is_http_url(endpoint) {
        return Err(ConfigError::Validation(
            "agent.api_endpoint must start with http:// or https://".to_string(),
        ));
    }

    if agent.api_version.trim().is_empty() {
        return Err(ConfigError::Validation("agent.api_version must not be empty".to_string()));
    }

    if agent.model_deployment.trim().is_empty() {
        return Err(ConfigError::Validation(
            "agent.model_deployment must name a model deployment".to_string(),
        ));
    }

    if let Some(email_uri) = &agent.email_uri {
        if !is_http_url(email_uri) {
            return Err(ConfigError::Validation(
                "agent.email_uri must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_runs(runs: &RunConfig) -> Result<(), ConfigError> {
    if runs.poll_interval_ms == 0 {
        return Err(ConfigError::Validation(
            "runs.poll_interval_ms must be greater than zero".to_string(),
        ));
    }

    if runs.run_timeout_secs == 0 || runs.run_timeout_secs > 3_600 {
        return Err(ConfigError::Validation(
            "runs.run_timeout_secs must be in range 1..=3600".to_string(),
        ));
    }

    if runs.request_timeout_secs == 0 || runs.request_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "runs.request_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_market_data(market_data: &MarketDataConfig) -> Result<(), ConfigError> {
    if !is_http_url(&market_data.base_url) {
        return Err(ConfigError::Validation(
            "market_data.base_url must start with http:// or https://".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    agent: Option<AgentPatch>,
    workspace: Option<WorkspacePatch>,
    runs: Option<RunsPatch>,
    market_data: Option<MarketDataPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentPatch {
    api_key: Option<String>,
    api_version: Option<String>,
    api_endpoint: Option<String>,
    model_deployment: Option<String>,
    email_uri: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WorkspacePatch {
    data_folder: Option<PathBuf>,
    output_folder: Option<PathBuf>,
    keep_state: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct RunsPatch {
    poll_interval_ms: Option<u64>,
    run_timeout_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct MarketDataPatch {
    base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

/// Every environment variable `AppConfig::load` consults, primary names and aliases.
pub const ENV_KEYS: &[&str] = &[
    "COPILOT_API_KEY",
    "OPENAI_KEY",
    "COPILOT_API_VERSION",
    "OPENAI_VERSION",
    "COPILOT_API_ENDPOINT",
    "OPENAI_URI",
    "COPILOT_MODEL_DEPLOYMENT",
    "OPENAI_GPT_DEPLOYMENT",
    "COPILOT_EMAIL_URI",
    "EMAIL_URI",
    "COPILOT_DATA_FOLDER",
    "DATA_FOLDER",
    "COPILOT_OUTPUT_FOLDER",
    "COPILOT_KEEP_STATE",
    "COPILOT_RUN_POLL_INTERVAL_MS",
    "COPILOT_RUN_TIMEOUT_SECS",
    "COPILOT_REQUEST_TIMEOUT_SECS",
    "COPILOT_MARKET_DATA_BASE_URL",
    "COPILOT_LOGGING_LEVEL",
    "COPILOT_LOG_LEVEL",
    "COPILOT_LOGGING_FORMAT",
    "COPILOT_LOG_FORMAT",
];
