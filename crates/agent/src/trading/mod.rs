//! Trading assistant: stock-price lookup and email sending exposed to the
//! assistant as function tools, plus the factory that wires them together.

pub mod email;
pub mod market;

use std::sync::Arc;
use std::time::Duration;

use copilot_core::{AppConfig, ToolSpec};
use serde_json::json;

pub use email::{EmailWebhook, SendEmailTool};
pub use market::{get_stock_price, MarketData, MarketDataError, StockPriceTool, YahooChart};

use crate::api::{AssistantsApi, AzureAssistantsClient};
use crate::assistant::{AgentOptions, AssistantAgent};
use crate::errors::AgentError;
use crate::runs::RunSettings;
use crate::tools::ToolRegistry;

pub const AGENT_NAME: &str = "Trading Agent";
pub const AGENT_INSTRUCTIONS: &str = "You are an agent that can help get the latest stock prices and perform investment related calculations.";

pub fn stock_price_spec() -> ToolSpec {
    ToolSpec::function(
        "get_stock_price",
        "Retrieve the latest closing price of a stock using its ticker symbol",
        json!({
            "type": "object",
            "properties": {
                "symbol": { "type": "string", "description": "The ticker symbol of the stock, e.g. MSFT" }
            },
            "required": ["symbol"]
        }),
    )
}

pub fn send_email_spec() -> ToolSpec {
    ToolSpec::function(
        "send_email",
        "Send an email to a recipient. The content may contain HTML",
        json!({
            "type": "object",
            "properties": {
                "to": { "type": "string", "description": "Recipient email address" },
                "content": { "type": "string", "description": "Body of the email" }
            },
            "required": ["to", "content"]
        }),
    )
}

/// The capabilities the trading assistant may call back into.
#[derive(Clone)]
pub struct TradingCapabilities {
    pub market: Arc<dyn MarketData>,
    pub email: Option<EmailWebhook>,
}

impl TradingCapabilities {
    pub fn from_config(config: &AppConfig) -> Result<Self, reqwest::Error> {
        let timeout = Duration::from_secs(config.runs.request_timeout_secs);
        let market = YahooChart::new(config.market_data.base_url.clone(), timeout)?;
        let email = match &config.agent.email_uri {
            Some(uri) => Some(EmailWebhook::new(uri.clone(), timeout)?),
            None => None,
        };
        Ok(Self { market: Arc::new(market), email })
    }

    /// `code_interpreter` and `get_stock_price`, plus `send_email` when a webhook is configured.
    pub fn tool_specs(&self) -> Vec<ToolSpec> {
        let mut specs = vec![ToolSpec::CodeInterpreter, stock_price_spec()];
        if self.email.is_some() {
            specs.push(send_email_spec());
        }
        specs
    }

    pub fn registry(&self) -> ToolRegistry {
        let mut registry = ToolRegistry::default();
        registry.register(StockPriceTool::new(Arc::clone(&self.market)));
        if let Some(webhook) = &self.email {
            registry.register(SendEmailTool::new(webhook.clone()));
        }
        registry
    }

    pub fn agent_options(&self, config: &AppConfig) -> AgentOptions {
        AgentOptions::new(AGENT_NAME, AGENT_INSTRUCTIONS, self.tool_specs())
            .with_data_folder(config.workspace.data_folder.clone())
            .with_keep_state(config.workspace.keep_state)
            .with_delegate(Arc::new(self.registry()))
            .with_runs(RunSettings::from(&config.runs))
    }
}

/// Builds the assistants client from `config` unless one is supplied.
pub fn assistants_client(
    config: &AppConfig,
    client: Option<Arc<dyn AssistantsApi>>,
) -> Result<Arc<dyn AssistantsApi>, AgentError> {
    match client {
        Some(client) => Ok(client),
        None => {
            let timeout = Duration::from_secs(config.runs.request_timeout_secs);
            let client: Arc<dyn AssistantsApi> =
                Arc::new(AzureAssistantsClient::new(&config.agent, timeout)?);
            Ok(client)
        }
    }
}

/// Creates the trading assistant with its function tools wired in.
pub async fn build_trading_agent(
    config: &AppConfig,
    client: Option<Arc<dyn AssistantsApi>>,
    capabilities: TradingCapabilities,
) -> Result<AssistantAgent, AgentError> {
    let api = assistants_client(config, client)?;
    AssistantAgent::new(&config.agent, api, capabilities.agent_options(config)).await
}
