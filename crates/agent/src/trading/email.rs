use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::tools::Tool;

#[derive(Debug, Serialize)]
struct EmailPayload<'a> {
    to: &'a str,
    content: String,
}

/// HTTP-triggered workflow that sends an email (e.g. a Logic Apps endpoint).
#[derive(Clone)]
pub struct EmailWebhook {
    http: Client,
    uri: String,
}

impl EmailWebhook {
    pub fn new(uri: impl Into<String>, request_timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(request_timeout).build()?;
        Ok(Self::with_client(http, uri))
    }

    pub fn with_client(http: Client, uri: impl Into<String>) -> Self {
        Self { http, uri: uri.into() }
    }

    /// Posts `{to, content}` and reports whether the webhook accepted it.
    ///
    /// Only `202 Accepted` counts as sent. Other statuses and transport errors
    /// are logged and reported as `false`.
    pub async fn send_email(&self, to: &str, content: &str) -> bool {
        let payload =
            EmailPayload { to, content: html_escape::decode_html_entities(content).into_owned() };

        match self.http.post(&self.uri).json(&payload).send().await {
            Ok(response) if response.status() == StatusCode::ACCEPTED => {
                info!(event_name = "trading.email.sent", to, "email sent");
                true
            }
            Ok(response) => {
                warn!(
                    event_name = "trading.email.rejected",
                    to,
                    status = %response.status(),
                    "email webhook did not accept the request"
                );
                false
            }
            Err(error) => {
                warn!(
                    event_name = "trading.email.failed",
                    to,
                    error = %error,
                    "failed to send email via webhook"
                );
                false
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct SendEmailArgs {
    to: String,
    content: String,
}

/// `send_email` function tool.
pub struct SendEmailTool {
    webhook: EmailWebhook,
}

impl SendEmailTool {
    pub fn new(webhook: EmailWebhook) -> Self {
        Self { webhook }
    }
}

#[async_trait]
impl Tool for SendEmailTool {
    fn name(&self) -> &'static str {
        "send_email"
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let args: SendEmailArgs = serde_json::from_value(input)?;
        let sent = self.webhook.send_email(&args.to, &args.content).await;
        Ok(json!({ "sent": sent, "to": args.to }))
    }
}
