//! Shared test doubles for the session store tests

use async_trait::async_trait;
use creovai_chat::gateway::{ChatError, ChatResult, Gateway};
use creovai_chat::types::ChatResponse;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::Semaphore;

/// Gateway that answers from a queue of canned results.
///
/// When built with [`ScriptedGateway::gated`], each `send_message` waits for
/// [`ScriptedGateway::release`] before answering.
pub struct ScriptedGateway {
    replies: Mutex<VecDeque<ChatResult<ChatResponse>>>,
    sent: Mutex<Vec<String>>,
    gate: Option<Semaphore>,
}

impl ScriptedGateway {
    pub fn new(replies: Vec<ChatResult<ChatResponse>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            sent: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    pub fn gated(replies: Vec<ChatResult<ChatResponse>>) -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new(replies)
        }
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

pub fn answer(text: &str) -> ChatResult<ChatResponse> {
    Ok(ChatResponse {
        answer: text.to_string(),
        context: Vec::new(),
    })
}

pub fn failure(err: ChatError) -> ChatResult<ChatResponse> {
    Err(err)
}

#[async_trait]
impl Gateway for ScriptedGateway {
    async fn check_health(&self) -> bool {
        true
    }

    async fn send_message(&self, text: &str) -> ChatResult<ChatResponse> {
        self.sent.lock().unwrap().push(text.to_string());
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("no scripted reply left")
    }
}
