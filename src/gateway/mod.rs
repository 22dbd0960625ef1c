//! Backend gateway for the chat widget.
//!
//! Turns a plain-text user message into an HTTP request against the
//! configured backend (a REST endpoint or an n8n webhook), normalizes the
//! reply into a [`ChatResponse`] and classifies every failure into a
//! [`ChatError`].
//!
//! # Architecture
//!
//! - `http` - [`HttpGateway`], the reqwest-backed implementation
//! - `normalize` - decoding of the heterogeneous reply shapes
//! - `payload` - request bodies for the two backend flavours
//! - `error` - the typed error taxonomy
//!
//! # Usage
//!
//! ```rust,no_run
//! use creovai_chat::gateway::{Gateway, HttpGateway};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let gateway = HttpGateway::from_env()?;
//! let reply = gateway.send_message("Hello!").await?;
//! println!("{}", reply.answer);
//! # Ok(())
//! # }
//! ```
mod error;
mod http;
mod normalize;
mod payload;

use crate::types::ChatResponse;
use async_trait::async_trait;

pub use error::{ChatError, ChatResult, ErrorCode};
pub use http::HttpGateway;
pub use normalize::{ANSWER_FIELDS, normalize_body, normalize_response};
pub use payload::SendPayload;

#[async_trait]
pub trait Gateway: Send + Sync {
    /// Lightweight probe of the backend. Every failure collapses to `false`.
    async fn check_health(&self) -> bool;

    /// Health-checks the backend, then sends `text` and returns the
    /// normalized answer.
    async fn send_message(&self, text: &str) -> ChatResult<ChatResponse>;
}
