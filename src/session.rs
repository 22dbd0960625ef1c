//! Conversation state for one chat session.
//!
//! [`SessionStore`] owns the message list and request status and mutates
//! them only through `send`, `clear` and `retry`. It is created once per
//! conversation and shared by reference (or `Arc`) with whatever needs it.
//!
//! Only one request may be in flight at a time; a second `send` while the
//! first is pending is rejected with [`Rejected::Busy`]. Every request is
//! tagged with the epoch it started in, and `clear` advances the epoch so a
//! response that arrives afterwards is dropped instead of landing in the
//! fresh conversation.

use crate::gateway::{ChatError, ChatResult, ErrorCode, Gateway};
use crate::input::{InputAssessment, InputLimits};
use crate::types::{ChatResponse, Message, MessageStatus, Role};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ChatState {
    pub messages: Vec<Message>,
    pub is_loading: bool,
    pub error: Option<ChatError>,
    /// Id of the most recently appended message, user or assistant.
    pub last_message_id: Option<String>,
}

impl ChatState {
    pub fn last_message(&self) -> Option<&Message> {
        let id = self.last_message_id.as_deref()?;
        self.messages.iter().rev().find(|msg| msg.id == id)
    }

    fn push(&mut self, message: Message) {
        self.last_message_id = Some(message.id.clone());
        self.messages.push(message);
    }

    fn settle(&mut self, id: &str, status: MessageStatus) {
        if let Some(msg) = self.messages.iter_mut().find(|msg| msg.id == id) {
            msg.settle(status);
        }
    }
}

/// Why a send or retry did not start a request.
#[derive(Clone, Debug, PartialEq)]
pub enum Rejected {
    Empty,
    Busy,
    TooLong(InputAssessment),
    NothingToRetry,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SendOutcome {
    Rejected(Rejected),
    Replied {
        user_id: String,
        assistant_id: String,
    },
    Failed(ChatError),
    /// The session was cleared while the request was in flight.
    Stale,
}

/// A user message that has been recorded but not yet answered.
///
/// Dropping it without [`SessionStore::complete_send`] settles the message
/// as cancelled, so the session never stays loading.
#[must_use = "a pending send is cancelled when dropped"]
pub struct PendingSend<'a> {
    store: &'a SessionStore,
    message_id: String,
    content: String,
    epoch: u64,
    settled: bool,
}

impl PendingSend<'_> {
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

impl std::fmt::Debug for PendingSend<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingSend")
            .field("message_id", &self.message_id)
            .field("epoch", &self.epoch)
            .field("settled", &self.settled)
            .finish()
    }
}

impl Drop for PendingSend<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.settled = true;
            let _ = self.store.apply(
                &self.message_id,
                self.epoch,
                Err(ChatError::new(ErrorCode::Unknown, "Request was cancelled")),
            );
        }
    }
}

#[derive(Default)]
struct Inner {
    state: ChatState,
    epoch: u64,
}

pub struct SessionStore {
    gateway: Arc<dyn Gateway>,
    limits: InputLimits,
    inner: Mutex<Inner>,
}

impl SessionStore {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self::with_limits(gateway, InputLimits::default())
    }

    pub fn with_limits(gateway: Arc<dyn Gateway>, limits: InputLimits) -> Self {
        Self {
            gateway,
            limits,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn limits(&self) -> InputLimits {
        self.limits
    }

    pub fn snapshot(&self) -> ChatState {
        self.lock().state.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.lock().state.is_loading
    }

    pub fn error(&self) -> Option<ChatError> {
        self.lock().state.error.clone()
    }

    /// Records `content` as a pending user message and marks the session
    /// loading. Nothing touches the network here.
    pub fn begin_send(&self, content: &str) -> Result<PendingSend<'_>, Rejected> {
        let content = content.trim();
        if content.is_empty() {
            return Err(Rejected::Empty);
        }
        let assessment = self.limits.assess(content);
        if assessment.is_over_limit() {
            return Err(Rejected::TooLong(assessment));
        }

        let mut inner = self.lock();
        if inner.state.is_loading {
            return Err(Rejected::Busy);
        }

        let message = Message::user(content);
        let pending = PendingSend {
            store: self,
            message_id: message.id.clone(),
            content: content.to_string(),
            epoch: inner.epoch,
            settled: false,
        };
        inner.state.push(message);
        inner.state.is_loading = true;
        inner.state.error = None;
        debug!(id = %pending.message_id, "user message pending");
        Ok(pending)
    }

    /// Applies the gateway result for `pending`. Results from before the
    /// last `clear` are discarded.
    pub fn complete_send(
        &self,
        mut pending: PendingSend<'_>,
        result: ChatResult<ChatResponse>,
    ) -> SendOutcome {
        pending.settled = true;
        self.apply(&pending.message_id, pending.epoch, result)
    }

    fn apply(&self, message_id: &str, epoch: u64, result: ChatResult<ChatResponse>) -> SendOutcome {
        let mut inner = self.lock();
        if inner.epoch != epoch {
            debug!(id = %message_id, "discarding response for cleared session");
            return SendOutcome::Stale;
        }

        let state = &mut inner.state;
        state.is_loading = false;
        match result {
            Ok(response) => {
                state.settle(message_id, MessageStatus::Sent);
                let reply = Message::assistant(response.answer);
                let assistant_id = reply.id.clone();
                state.push(reply);
                info!(id = %message_id, "message answered");
                SendOutcome::Replied {
                    user_id: message_id.to_string(),
                    assistant_id,
                }
            }
            Err(err) => {
                state.settle(message_id, MessageStatus::Error);
                state.error = Some(err.clone());
                warn!(id = %message_id, code = %err.code, "message failed");
                SendOutcome::Failed(err)
            }
        }
    }

    pub async fn send(&self, content: &str) -> SendOutcome {
        let pending = match self.begin_send(content) {
            Ok(pending) => pending,
            Err(rejected) => return SendOutcome::Rejected(rejected),
        };
        let text = pending.content.clone();
        let result = self.gateway.send_message(&text).await;
        self.complete_send(pending, result)
    }

    /// Re-sends the content of the last message if it was written by the
    /// user. The old message keeps its status; a new one is appended.
    pub async fn retry(&self) -> SendOutcome {
        let content = {
            let mut inner = self.lock();
            if inner.state.is_loading {
                return SendOutcome::Rejected(Rejected::Busy);
            }
            let content = match inner.state.last_message() {
                Some(msg) if msg.role == Role::User => msg.content.clone(),
                _ => return SendOutcome::Rejected(Rejected::NothingToRetry),
            };
            inner.state.error = None;
            content
        };
        self.send(&content).await
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.state = ChatState::default();
        inner.epoch += 1;
        info!(epoch = inner.epoch, "chat cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl Gateway for Echo {
        async fn check_health(&self) -> bool {
            true
        }

        async fn send_message(&self, text: &str) -> ChatResult<ChatResponse> {
            Ok(ChatResponse {
                answer: format!("echo: {text}"),
                context: Vec::new(),
            })
        }
    }

    fn store() -> SessionStore {
        SessionStore::with_limits(Arc::new(Echo), InputLimits::new(20))
    }

    #[test]
    fn begin_send_appends_pending_message() {
        let store = store();
        let pending = store.begin_send("  hi  ").expect("send should start");

        let state = store.snapshot();
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.messages[0].content, "hi");
        assert_eq!(state.messages[0].status, Some(MessageStatus::Sending));
        assert!(state.is_loading);
        assert_eq!(state.last_message_id.as_deref(), Some(pending.message_id()));
    }

    #[test]
    fn second_send_while_loading_is_busy() {
        let store = store();
        let _pending = store.begin_send("one").expect("send should start");
        assert_eq!(store.begin_send("two").unwrap_err(), Rejected::Busy);
        assert_eq!(store.snapshot().messages.len(), 1);
    }

    #[test]
    fn over_limit_is_rejected() {
        let store = store();
        let err = store.begin_send(&"x".repeat(21)).unwrap_err();
        assert!(matches!(err, Rejected::TooLong(a) if a.chars == 21));
        assert!(store.snapshot().messages.is_empty());
    }

    #[test]
    fn stale_completion_is_discarded() {
        let store = store();
        let pending = store.begin_send("hello").expect("send should start");
        store.clear();

        let outcome = store.complete_send(
            pending,
            Ok(ChatResponse {
                answer: "late".into(),
                context: vec![],
            }),
        );
        assert_eq!(outcome, SendOutcome::Stale);
        assert_eq!(store.snapshot(), ChatState::default());
    }

    #[test]
    fn dropped_send_settles_as_error() {
        let store = store();
        let pending = store.begin_send("hello").expect("send should start");
        let id = pending.message_id().to_string();
        drop(pending);

        let state = store.snapshot();
        assert!(!state.is_loading);
        assert_eq!(state.messages[0].id, id);
        assert_eq!(state.messages[0].status, Some(MessageStatus::Error));
        assert_eq!(state.error.map(|e| e.code), Some(ErrorCode::Unknown));
    }

    #[tokio::test]
    async fn session_usable_after_abandoned_send() {
        fn start(store: &SessionStore) -> Result<(), Rejected> {
            let _pending = store.begin_send("hello")?;
            Err(Rejected::Empty)
        }

        let store = store();
        assert_eq!(start(&store), Err(Rejected::Empty));
        assert!(!store.is_loading());

        let outcome = store.send("next").await;
        assert!(matches!(outcome, SendOutcome::Replied { .. }));
        let statuses: Vec<_> = store.snapshot().messages.iter().map(|m| m.status).collect();
        assert_eq!(
            statuses,
            vec![
                Some(MessageStatus::Error),
                Some(MessageStatus::Sent),
                Some(MessageStatus::Sent),
            ]
        );
    }

    #[tokio::test]
    async fn retry_while_loading_is_busy() {
        let store = store();
        let pending = store.begin_send("first").expect("send should start");

        assert_eq!(store.retry().await, SendOutcome::Rejected(Rejected::Busy));
        assert_eq!(store.snapshot().messages.len(), 1);

        let outcome = store.complete_send(
            pending,
            Err(ChatError::new(ErrorCode::Network, "Failed to send message")),
        );
        assert!(matches!(outcome, SendOutcome::Failed(_)));
        assert!(store.error().is_some());
    }

    #[tokio::test]
    async fn send_round_trip() {
        let store = store();
        let outcome = store.send("ping").await;
        assert!(matches!(outcome, SendOutcome::Replied { .. }));

        let state = store.snapshot();
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[1].content, "echo: ping");
        assert_eq!(state.messages[1].role, Role::Assistant);
        assert!(!state.is_loading);
    }
}
