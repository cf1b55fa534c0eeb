//! Per-session conversation state
//!
//! Each chat session gets a `ConversationContext`: a bounded turn window, an
//! optionally linked employee identity, and at most one partially-filled
//! operation waiting for an argument. Contexts live behind per-session async
//! mutexes so a session's turns are single-flight while different sessions
//! run concurrently. The store itself is bounded; the oldest-idle session is
//! evicted when a new one would exceed the cap.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::EmployeeId;
use crate::ops::OpName;

/// Default cap on remembered turns per session.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Default cap on live sessions.
pub const DEFAULT_SESSION_LIMIT: usize = 1024;

/// One remembered exchange half.
#[derive(Debug, Clone)]
pub struct Turn {
    pub role: &'static str,
    pub content: String,
    pub at: DateTime<Utc>,
}

/// An operation parked on one missing argument.
#[derive(Debug, Clone)]
pub struct PendingOp {
    pub op: OpName,
    /// Arguments collected so far.
    pub args: Value,
    /// The field the next utterance should supply.
    pub missing: &'static str,
}

/// Mutable state for one chat session. Never persisted.
#[derive(Debug)]
pub struct ConversationContext {
    history: VecDeque<Turn>,
    history_limit: usize,
    /// Set after the caller links a profile; lets "my attendance" resolve.
    pub resolved_employee: Option<EmployeeId>,
    pub pending: Option<PendingOp>,
}

impl ConversationContext {
    pub fn new(history_limit: usize) -> Self {
        Self {
            history: VecDeque::new(),
            history_limit: history_limit.max(1),
            resolved_employee: None,
            pending: None,
        }
    }

    /// Append a turn, evicting the oldest past the cap.
    pub fn push_turn(&mut self, role: &'static str, content: impl Into<String>) {
        if self.history.len() >= self.history_limit {
            self.history.pop_front();
        }
        self.history.push_back(Turn {
            role,
            content: content.into(),
            at: Utc::now(),
        });
    }

    pub fn history(&self) -> impl Iterator<Item = &Turn> {
        self.history.iter()
    }

    /// Most recent `n` turns, oldest first.
    pub fn recent_turns(&self, n: usize) -> Vec<(String, String)> {
        let skip = self.history.len().saturating_sub(n);
        self.history
            .iter()
            .skip(skip)
            .map(|t| (t.role.to_string(), t.content.clone()))
            .collect()
    }

    /// Drop history and any parked operation, keeping the linked identity.
    pub fn clear_conversation(&mut self) {
        self.history.clear();
        self.pending = None;
    }
}

struct SessionEntry {
    context: Arc<Mutex<ConversationContext>>,
    last_used: DateTime<Utc>,
}

/// Keyed session map. Explicitly scoped per session id - never process-wide
/// conversation state - so concurrent sessions cannot interfere.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionEntry>>,
    session_limit: usize,
    history_limit: usize,
}

impl SessionStore {
    pub fn new(session_limit: usize, history_limit: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            session_limit: session_limit.max(1),
            history_limit,
        }
    }

    /// Fetch or create the context for a session, refreshing its idle clock.
    pub async fn get_or_create(&self, session_id: &str) -> Arc<Mutex<ConversationContext>> {
        let mut sessions = self.sessions.lock().await;

        if sessions.len() >= self.session_limit && !sessions.contains_key(session_id) {
            // Evict the session idle the longest.
            if let Some(oldest) = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| key.clone())
            {
                debug!(session = %oldest, "evicting idle session");
                sessions.remove(&oldest);
            }
        }

        let entry = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionEntry {
                context: Arc::new(Mutex::new(ConversationContext::new(self.history_limit))),
                last_used: Utc::now(),
            });
        entry.last_used = Utc::now();
        Arc::clone(&entry.context)
    }

    /// Forget a session entirely.
    pub async fn remove(&self, session_id: &str) {
        self.sessions.lock().await.remove(session_id);
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_LIMIT, DEFAULT_HISTORY_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_evicts_oldest_at_cap() {
        let mut ctx = ConversationContext::new(3);
        for i in 0..5 {
            ctx.push_turn("user", format!("message {i}"));
        }
        let contents: Vec<&str> = ctx.history().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["message 2", "message 3", "message 4"]);
    }

    #[test]
    fn recent_turns_returns_tail_in_order() {
        let mut ctx = ConversationContext::new(10);
        ctx.push_turn("user", "first");
        ctx.push_turn("assistant", "second");
        ctx.push_turn("user", "third");
        let recent = ctx.recent_turns(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].1, "second");
        assert_eq!(recent[1].1, "third");
    }

    #[test]
    fn clear_keeps_linked_identity() {
        let mut ctx = ConversationContext::new(10);
        ctx.resolved_employee = EmployeeId::parse("507f1f77bcf86cd799439011");
        ctx.push_turn("user", "hello");
        ctx.pending = Some(PendingOp {
            op: OpName::AttendanceSummary,
            args: serde_json::json!({}),
            missing: "employee_id",
        });
        ctx.clear_conversation();
        assert!(ctx.history().next().is_none());
        assert!(ctx.pending.is_none());
        assert!(ctx.resolved_employee.is_some());
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let store = SessionStore::default();
        let a = store.get_or_create("alice").await;
        let b = store.get_or_create("bob").await;
        a.lock().await.push_turn("user", "only alice");
        assert_eq!(b.lock().await.history().count(), 0);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn store_evicts_oldest_idle_session_at_cap() {
        let store = SessionStore::new(2, 5);
        let first = store.get_or_create("first").await;
        first.lock().await.push_turn("user", "hi");
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.get_or_create("second").await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.get_or_create("third").await;

        assert_eq!(store.len().await, 2);
        // "first" was the oldest-idle entry; a fresh context comes back.
        let revived = store.get_or_create("first").await;
        assert_eq!(revived.lock().await.history().count(), 0);
    }
}
