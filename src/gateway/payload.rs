use crate::config::PayloadKind;
use serde::Serialize;

#[derive(Serialize, Debug, PartialEq)]
pub struct RestRequest<'a> {
    pub query: &'a str,
    pub user_id: &'a str,
    pub organization_id: &'a str,
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WebhookRequest<'a> {
    pub session_id: &'a str,
    pub action: &'static str,
    pub chat_input: &'a str,
}

/// Request body for a single message, shaped for the configured backend.
#[derive(Serialize, Debug, PartialEq)]
#[serde(untagged)]
pub enum SendPayload<'a> {
    Rest(RestRequest<'a>),
    /// n8n chat triggers expect a one-element batch.
    Webhook([WebhookRequest<'a>; 1]),
}

impl<'a> SendPayload<'a> {
    pub fn build(kind: &'a PayloadKind, text: &'a str) -> Self {
        match kind {
            PayloadKind::Rest {
                user_id,
                organization_id,
            } => SendPayload::Rest(RestRequest {
                query: text,
                user_id,
                organization_id,
            }),
            PayloadKind::Webhook { session_id } => SendPayload::Webhook([WebhookRequest {
                session_id,
                action: "sendMessage",
                chat_input: text,
            }]),
        }
    }
}

/// Path appended to the base URL for the message POST.
pub fn send_path(kind: &PayloadKind) -> &'static str {
    match kind {
        PayloadKind::Rest { .. } => "chat",
        PayloadKind::Webhook { .. } => "",
    }
}
