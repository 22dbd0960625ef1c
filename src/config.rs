//! Environment-driven configuration for the chat gateway.
//!
//! Every setting is read from a `CHAT_*` variable. [`ChatConfig::from_lookup`]
//! takes an arbitrary lookup function so tests never touch the process
//! environment.

use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_RATE_LIMIT_RETRIES: u32 = 5;
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 2000;
pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_SESSION_ID: &str = "webhook-session";
pub const DEFAULT_USER_ID: &str = "test_user";
pub const DEFAULT_ORGANIZATION_ID: &str = "test_org";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}

/// Which request shape the backend expects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PayloadKind {
    /// `POST {base}/chat` with `{query, user_id, organization_id}`.
    Rest {
        user_id: String,
        organization_id: String,
    },
    /// `POST {base}` with `[{sessionId, action, chatInput}]` (n8n webhooks).
    Webhook { session_id: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatConfig {
    pub api_url: String,
    pub api_token: Option<String>,
    pub payload: PayloadKind,
    pub timeout: Duration,
    /// `None` retries 429 responses for as long as the server keeps sending them.
    pub max_rate_limit_retries: Option<u32>,
    pub max_message_length: usize,
    pub health_interval: Duration,
}

impl ChatConfig {
    pub fn new(api_url: impl Into<String>, payload: PayloadKind) -> Self {
        Self {
            api_url: api_url.into(),
            api_token: None,
            payload,
            timeout: DEFAULT_TIMEOUT,
            max_rate_limit_retries: Some(DEFAULT_MAX_RATE_LIMIT_RETRIES),
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
            health_interval: DEFAULT_HEALTH_INTERVAL,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_url = get("CHAT_API_URL").ok_or(ConfigError::Missing("CHAT_API_URL"))?;
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                key: "CHAT_API_URL",
                value: api_url,
            });
        }

        let payload = match get("CHAT_PAYLOAD")
            .unwrap_or_else(|| "webhook".into())
            .to_ascii_lowercase()
            .as_str()
        {
            "webhook" | "n8n" => PayloadKind::Webhook {
                session_id: get("CHAT_SESSION_ID").unwrap_or_else(|| DEFAULT_SESSION_ID.into()),
            },
            "rest" => PayloadKind::Rest {
                user_id: get("CHAT_USER_ID").unwrap_or_else(|| DEFAULT_USER_ID.into()),
                organization_id: get("CHAT_ORGANIZATION_ID")
                    .unwrap_or_else(|| DEFAULT_ORGANIZATION_ID.into()),
            },
            other => {
                return Err(ConfigError::Invalid {
                    key: "CHAT_PAYLOAD",
                    value: other.to_string(),
                });
            }
        };

        let timeout = parse_or(&get, "CHAT_TIMEOUT_SECS", DEFAULT_TIMEOUT.as_secs())?;
        let max_rate_limit_retries = match get("CHAT_MAX_RATE_LIMIT_RETRIES") {
            Some(v) if v.eq_ignore_ascii_case("unlimited") => None,
            Some(v) => Some(v.parse::<u32>().map_err(|_| ConfigError::Invalid {
                key: "CHAT_MAX_RATE_LIMIT_RETRIES",
                value: v,
            })?),
            None => Some(DEFAULT_MAX_RATE_LIMIT_RETRIES),
        };
        let max_message_length = parse_or(
            &get,
            "CHAT_MAX_MESSAGE_LENGTH",
            DEFAULT_MAX_MESSAGE_LENGTH,
        )?;
        let health_interval = parse_or(
            &get,
            "CHAT_HEALTH_INTERVAL_SECS",
            DEFAULT_HEALTH_INTERVAL.as_secs(),
        )?;

        if timeout == 0 {
            return Err(ConfigError::Invalid {
                key: "CHAT_TIMEOUT_SECS",
                value: "0".into(),
            });
        }
        if max_message_length == 0 {
            return Err(ConfigError::Invalid {
                key: "CHAT_MAX_MESSAGE_LENGTH",
                value: "0".into(),
            });
        }

        Ok(Self {
            api_url,
            api_token: get("CHAT_API_TOKEN"),
            payload,
            timeout: Duration::from_secs(timeout),
            max_rate_limit_retries,
            max_message_length,
            health_interval: Duration::from_secs(health_interval.max(1)),
        })
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(value) => value
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}
