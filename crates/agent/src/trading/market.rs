use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::info;

use crate::tools::Tool;

#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("unknown ticker symbol `{0}`")]
    UnknownSymbol(String),
    #[error("market data provider returned {status} for `{symbol}`")]
    Status { symbol: String, status: u16 },
    #[error("no closing price is available for `{0}`")]
    NoClose(String),
    #[error("market data base url `{0}` cannot carry a chart path")]
    InvalidBaseUrl(String),
    #[error("market data request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Source of end-of-day prices.
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn latest_close(&self, symbol: &str) -> Result<f64, MarketDataError>;
}

/// Latest closing price for `symbol`.
pub async fn get_stock_price(
    market: &dyn MarketData,
    symbol: &str,
) -> Result<f64, MarketDataError> {
    let symbol = symbol.trim().to_ascii_uppercase();
    if !is_ticker(&symbol) {
        return Err(MarketDataError::UnknownSymbol(symbol));
    }

    let price = market.latest_close(&symbol).await?;
    info!(event_name = "trading.stock_price", symbol = %symbol, price, "stock price retrieved");
    Ok(price)
}

/// Tickers, indices (`^GSPC`), share classes (`BRK.B`) and FX/futures (`EURUSD=X`, `ES=F`).
fn is_ticker(symbol: &str) -> bool {
    !symbol.is_empty()
        && symbol.chars().all(|ch| {
            ch.is_ascii_uppercase() || ch.is_ascii_digit() || matches!(ch, '.' | '^' | '=' | '-')
        })
}

/// Yahoo Finance chart endpoint (`/v8/finance/chart/{symbol}`).
#[derive(Clone)]
pub struct YahooChart {
    http: Client,
    base_url: String,
}

impl YahooChart {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("copilot-agent/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        Self { http, base_url: base_url.into().trim_end_matches('/').to_string() }
    }

    /// `{base}/v8/finance/chart/{symbol}` with the symbol escaped as a single segment.
    fn chart_url(&self, symbol: &str) -> Result<Url, MarketDataError> {
        let invalid = || MarketDataError::InvalidBaseUrl(self.base_url.clone());
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", symbol]);
        Ok(url)
    }
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteSeries>,
}

#[derive(Debug, Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[async_trait]
impl MarketData for YahooChart {
    async fn latest_close(&self, symbol: &str) -> Result<f64, MarketDataError> {
        let url = self.chart_url(symbol)?;
        let response =
            self.http.get(url).query(&[("range", "1d"), ("interval", "1d")]).send().await?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => return Err(MarketDataError::UnknownSymbol(symbol.to_string())),
            status => {
                return Err(MarketDataError::Status {
                    symbol: symbol.to_string(),
                    status: status.as_u16(),
                })
            }
        }

        let envelope: ChartEnvelope = response.json().await?;
        let result = envelope
            .chart
            .result
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| MarketDataError::UnknownSymbol(symbol.to_string()))?;

        result
            .indicators
            .quote
            .iter()
            .flat_map(|series| series.close.iter())
            .rev()
            .find_map(|close| *close)
            .ok_or_else(|| MarketDataError::NoClose(symbol.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct StockPriceArgs {
    symbol: String,
}

/// `get_stock_price` function tool.
pub struct StockPriceTool {
    market: Arc<dyn MarketData>,
}

impl StockPriceTool {
    pub fn new(market: Arc<dyn MarketData>) -> Self {
        Self { market }
    }
}

#[async_trait]
impl Tool for StockPriceTool {
    fn name(&self) -> &'static str {
        "get_stock_price"
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let args: StockPriceArgs = serde_json::from_value(input)?;
        let price = get_stock_price(self.market.as_ref(), &args.symbol).await?;
        Ok(json!(price))
    }
}
