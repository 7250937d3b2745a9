use std::time::Duration;

use copilot_agent::trading::{get_stock_price, MarketDataError, YahooChart};
use copilot_core::config::LoadOptions;

use crate::commands::{load_config, runtime, CommandResult};

pub fn run(symbol: &str) -> CommandResult {
    let config = match load_config("price", LoadOptions::default()) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("price") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let timeout = Duration::from_secs(config.runs.request_timeout_secs);
    let market = match YahooChart::new(config.market_data.base_url.clone(), timeout) {
        Ok(market) => market,
        Err(error) => return CommandResult::failure("price", "http_client", error.to_string(), 3),
    };

    match runtime.block_on(get_stock_price(&market, symbol)) {
        Ok(price) => {
            CommandResult::success("price", format!("{} {price}", symbol.trim().to_ascii_uppercase()))
        }
        Err(error @ MarketDataError::UnknownSymbol(_)) => {
            CommandResult::failure("price", "unknown_symbol", error.to_string(), 4)
        }
        Err(error) => CommandResult::failure("price", "market_data", error.to_string(), 5),
    }
}
