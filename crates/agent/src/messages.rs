use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::api::{Message, MessageContent, MessageRole};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageBody {
    Text { text: String },
    ImageFile { file_id: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageView {
    pub speaker: String,
    pub role: MessageRole,
    pub created_at: Option<DateTime<Utc>>,
    pub body: MessageBody,
}

impl fmt::Display for MessageView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.body {
            MessageBody::Text { text } => write!(f, "{}: {}", self.speaker, text),
            MessageBody::ImageFile { file_id } => {
                write!(f, "{}: [image file {}]", self.speaker, file_id)
            }
        }
    }
}

/// Flattens thread messages into one view per content part, oldest first.
///
/// Assistant messages are attributed to `assistant_name`; unsupported content
/// parts are skipped.
pub fn render_messages(assistant_name: &str, messages: &[Message]) -> Vec<MessageView> {
    let mut ordered: Vec<&Message> = messages.iter().collect();
    ordered.sort_by_key(|message| message.created_at);

    let mut views = Vec::new();
    for message in ordered {
        let speaker = match message.role {
            MessageRole::Assistant => assistant_name.to_string(),
            MessageRole::User => "user".to_string(),
        };
        let created_at = DateTime::<Utc>::from_timestamp(message.created_at, 0);

        for content in &message.content {
            let body = match content {
                MessageContent::Text { text } => MessageBody::Text { text: text.value.clone() },
                MessageContent::ImageFile { image_file } => {
                    MessageBody::ImageFile { file_id: image_file.file_id.clone() }
                }
                MessageContent::Unsupported => continue,
            };
            let view = MessageView { speaker: speaker.clone(), role: message.role, created_at, body };
            info!(event_name = "agent.message", message_id = %message.id, "{view}");
            views.push(view);
        }
    }
    views
}

/// Image file ids referenced by the views, in order.
pub fn image_file_ids(views: &[MessageView]) -> Vec<&str> {
    views
        .iter()
        .filter_map(|view| match &view.body {
            MessageBody::ImageFile { file_id } => Some(file_id.as_str()),
            MessageBody::Text { .. } => None,
        })
        .collect()
}
