use std::time::Duration;

use copilot_agent::trading::EmailWebhook;
use copilot_core::config::LoadOptions;

use crate::commands::{load_config, runtime, CommandResult};

pub fn run(to: &str, content: &str) -> CommandResult {
    let config = match load_config("email", LoadOptions::default()) {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let Some(uri) = config.agent.email_uri.clone() else {
        return CommandResult::failure(
            "email",
            "email_not_configured",
            "agent.email_uri is not set (COPILOT_EMAIL_URI or EMAIL_URI)",
            2,
        );
    };

    let runtime = match runtime("email") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let timeout = Duration::from_secs(config.runs.request_timeout_secs);
    let webhook = match EmailWebhook::new(uri, timeout) {
        Ok(webhook) => webhook,
        Err(error) => return CommandResult::failure("email", "http_client", error.to_string(), 3),
    };

    if runtime.block_on(webhook.send_email(to, content)) {
        CommandResult::success("email", format!("email sent to {to}"))
    } else {
        CommandResult::failure("email", "email_rejected", format!("email to {to} was not accepted"), 5)
    }
}
