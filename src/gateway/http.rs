use super::error::{ChatError, ChatResult};
use super::normalize::normalize_body;
use super::payload::{SendPayload, send_path};
use super::Gateway;
use crate::config::ChatConfig;
use crate::types::ChatResponse;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);
const GENERIC_SEND_FAILURE: &str = "Failed to send message";

/// Gateway talking to the chat backend over HTTP(S).
pub struct HttpGateway {
    client: Client,
    config: ChatConfig,
}

impl HttpGateway {
    pub fn new(config: ChatConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> anyhow::Result<Self> {
        Self::new(ChatConfig::from_env()?)
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    fn base(&self) -> &str {
        self.config.api_url.trim_end_matches('/')
    }

    fn health_url(&self) -> String {
        format!("{}/", self.base())
    }

    fn send_url(&self) -> String {
        match send_path(&self.config.payload) {
            "" => self.base().to_string(),
            path => format!("{}/{}", self.base(), path),
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Sends the request built by `build`, re-issuing it after the server's
    /// `Retry-After` interval whenever the answer is 429.
    async fn dispatch<F>(&self, build: F) -> ChatResult<Response>
    where
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let mut retries = 0u32;
        loop {
            let response = self.authorize(build()).send().await?;
            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                return Ok(response);
            }

            if let Some(max) = self.config.max_rate_limit_retries
                && retries >= max
            {
                warn!(retries, "rate limit retries exhausted");
                let body = response.text().await.unwrap_or_default();
                return Err(ChatError::network("Rate limit exceeded").with_details(body_value(&body)));
            }

            let wait = retry_after(response.headers());
            warn!(wait_ms = wait.as_millis() as u64, retries, "rate limited, waiting before retry");
            tokio::time::sleep(wait).await;
            retries += 1;
        }
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn check_health(&self) -> bool {
        let url = self.health_url();
        debug!(%url, "checking backend health");
        match self.dispatch(|| self.client.get(&url)).await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(status = %response.status(), "health check failed");
                false
            }
            Err(err) => {
                warn!(error = %err, "health check failed");
                false
            }
        }
    }

    async fn send_message(&self, text: &str) -> ChatResult<ChatResponse> {
        if !self.check_health().await {
            return Err(ChatError::unhealthy());
        }

        let url = self.send_url();
        let payload = SendPayload::build(&self.config.payload, text);
        debug!(%url, chars = text.chars().count(), "sending message");

        let response = self.dispatch(|| self.client.post(&url).json(&payload)).await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(%status, body_len = body.len(), "received backend response");

        if !status.is_success() {
            warn!(%status, "backend rejected message");
            return Err(status_error(&body));
        }

        let answer = normalize_body(&body)?;
        info!(context = answer.context.len(), "backend answered");
        Ok(answer)
    }
}

/// Reads `Retry-After` as a number of seconds, falling back to one second.
fn retry_after(headers: &HeaderMap) -> Duration {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<f64>().ok())
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

fn body_value(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}

/// Builds the error for a non-2xx reply, preferring the server's own message.
fn status_error(body: &str) -> ChatError {
    let details = body_value(body);
    let message = ["message", "detail"]
        .iter()
        .find_map(|field| details.get(*field).and_then(Value::as_str))
        .filter(|m| !m.is_empty())
        .unwrap_or(GENERIC_SEND_FAILURE)
        .to_string();
    ChatError::network(message).with_details(details)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PayloadKind;
    use crate::gateway::ErrorCode;
    use reqwest::header::HeaderValue;
    use serde_json::json;

    #[test]
    fn retry_after_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), DEFAULT_RETRY_AFTER);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("2"));
        assert_eq!(retry_after(&headers), Duration::from_secs(2));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("0.5"));
        assert_eq!(retry_after(&headers), Duration::from_millis(500));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(retry_after(&headers), DEFAULT_RETRY_AFTER);
    }

    #[test]
    fn status_error_prefers_server_message() {
        let err = status_error(r#"{"message":"quota exceeded"}"#);
        assert_eq!(err.code, ErrorCode::Network);
        assert_eq!(err.message, "quota exceeded");
        assert_eq!(err.details, Some(json!({"message": "quota exceeded"})));

        let err = status_error(r#"{"detail":"Not Found"}"#);
        assert_eq!(err.message, "Not Found");

        let err = status_error("Bad Gateway");
        assert_eq!(err.message, GENERIC_SEND_FAILURE);
        assert_eq!(err.details, Some(json!("Bad Gateway")));
    }

    #[test]
    fn urls_follow_payload_kind() {
        let webhook = HttpGateway::new(ChatConfig::new(
            "https://n8n.example.com/webhook/abc/",
            PayloadKind::Webhook {
                session_id: "s".into(),
            },
        ))
        .expect("gateway should build");
        assert_eq!(webhook.health_url(), "https://n8n.example.com/webhook/abc/");
        assert_eq!(webhook.send_url(), "https://n8n.example.com/webhook/abc");

        let rest = HttpGateway::new(ChatConfig::new(
            "http://localhost:8000",
            PayloadKind::Rest {
                user_id: "u".into(),
                organization_id: "o".into(),
            },
        ))
        .expect("gateway should build");
        assert_eq!(rest.health_url(), "http://localhost:8000/");
        assert_eq!(rest.send_url(), "http://localhost:8000/chat");
    }
}
