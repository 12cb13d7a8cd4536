//! # Session History Store
//!
//! Maps a session key to an ordered message log. Sessions are created on first
//! reference and live as long as the store; `clear` empties one in place.
//!
//! Handles returned for the same key share one log, so an agent can hold on
//! to a `SessionHistory` while another component appends to it. Messages are
//! only ever appended, never reordered or edited.

use crate::provider::{ChatMessage, Role};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One session's ordered message log
#[derive(Debug, Clone)]
pub struct SessionHistory {
    key: Arc<str>,
    messages: Arc<Mutex<Vec<ChatMessage>>>,
}

impl SessionHistory {
    fn new(key: &str) -> Self {
        Self {
            key: Arc::from(key),
            messages: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Snapshot of the log
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn last(&self) -> Option<ChatMessage> {
        self.lock().last().cloned()
    }

    /// Contents of user-authored messages from position `from` on
    pub fn user_messages_since(&self, from: usize) -> Vec<String> {
        self.lock()
            .iter()
            .skip(from)
            .filter(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .collect()
    }

    pub fn user_messages(&self) -> Vec<String> {
        self.user_messages_since(0)
    }

    pub fn push_user(&self, content: impl Into<String>) {
        self.lock().push(ChatMessage::user(content));
    }

    pub fn push_assistant(&self, content: impl Into<String>) {
        self.lock().push(ChatMessage::assistant(content));
    }

    /// Append a finished exchange under a single lock: the user turns, then
    /// the reply.
    pub fn record_turn<S: AsRef<str>>(&self, inputs: &[S], reply: &str) {
        let mut messages = self.lock();
        messages.extend(inputs.iter().map(|i| ChatMessage::user(i.as_ref())));
        messages.push(ChatMessage::assistant(reply));
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// True when both handles point at the same log
    pub fn same_session(&self, other: &SessionHistory) -> bool {
        Arc::ptr_eq(&self.messages, &other.messages)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ChatMessage>> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Process-wide registry of sessions, cheap to clone and share between agents
#[derive(Debug, Clone, Default)]
pub struct HistoryStore {
    sessions: Arc<Mutex<HashMap<String, SessionHistory>>>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The session for `key`, created empty on first reference
    pub fn get_history(&self, key: &str) -> SessionHistory {
        self.lock()
            .entry(key.to_string())
            .or_insert_with(|| SessionHistory::new(key))
            .clone()
    }

    /// Empty the session in place; the key stays registered
    pub fn clear(&self, key: &str) {
        self.get_history(key).clear();
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    /// Registered keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SessionHistory>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
