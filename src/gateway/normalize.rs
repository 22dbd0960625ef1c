//! Decoding of backend replies into a [`ChatResponse`].
//!
//! Backends wired through n8n answer with a JSON object, a JSON document
//! encoded inside a string, or a one-element array wrapping either. The
//! shape is recognised once, in this order:
//!
//! 1. array: take element 0, or `{}` when empty
//! 2. string: parse as JSON, keeping the raw string when that fails
//! 3. object: look the answer up under [`ANSWER_FIELDS`]

use super::error::{ChatError, ChatResult};
use crate::types::ChatResponse;
use serde_json::{Map, Value};

/// Field names that may carry the answer, highest priority first.
pub const ANSWER_FIELDS: &[&str] = &["answer", "response", "output", "reply"];

enum ResponseShape {
    Batch(Vec<Value>),
    Encoded(String),
    Record(Map<String, Value>),
    Other(Value),
}

impl From<Value> for ResponseShape {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => ResponseShape::Batch(items),
            Value::String(raw) => ResponseShape::Encoded(raw),
            Value::Object(map) => ResponseShape::Record(map),
            other => ResponseShape::Other(other),
        }
    }
}

impl From<ResponseShape> for Value {
    fn from(shape: ResponseShape) -> Self {
        match shape {
            ResponseShape::Batch(items) => Value::Array(items),
            ResponseShape::Encoded(raw) => Value::String(raw),
            ResponseShape::Record(map) => Value::Object(map),
            ResponseShape::Other(value) => value,
        }
    }
}

/// Turns a decoded response body into the canonical answer.
pub fn normalize_response(body: Value) -> ChatResult<ChatResponse> {
    let payload = match ResponseShape::from(body) {
        ResponseShape::Batch(items) => items
            .into_iter()
            .next()
            .unwrap_or_else(|| Value::Object(Map::new())),
        shape => shape.into(),
    };

    let payload = match ResponseShape::from(payload) {
        ResponseShape::Encoded(raw) => {
            serde_json::from_str::<Value>(&raw).unwrap_or(Value::String(raw))
        }
        shape => shape.into(),
    };

    match ResponseShape::from(payload) {
        ResponseShape::Record(map) => match extract_answer(&map) {
            Some(answer) => Ok(ChatResponse {
                answer,
                context: extract_context(&map),
            }),
            None => Err(ChatError::invalid_format(Value::Object(map))),
        },
        shape => Err(ChatError::invalid_format(shape.into())),
    }
}

/// Decodes a raw HTTP body, treating non-JSON text as a plain string payload.
pub fn normalize_body(body: &str) -> ChatResult<ChatResponse> {
    let value = serde_json::from_str::<Value>(body).unwrap_or_else(|_| Value::String(body.into()));
    normalize_response(value)
}

fn extract_answer(map: &Map<String, Value>) -> Option<String> {
    ANSWER_FIELDS.iter().find_map(|field| match map.get(*field) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    })
}

fn extract_context(map: &Map<String, Value>) -> Vec<String> {
    match map.get("context") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}
