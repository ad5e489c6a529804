use std::{collections::HashMap, hash::Hash, sync::Arc, time::Duration};

use serde::Serialize;
use tokio::{sync::Mutex, time::Instant};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One transcript entry. Sessions only ever hold user and assistant turns.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub role: Role,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// Append-only transcript of one connection.
#[derive(Debug, Default)]
pub struct ChatSession {
    turns: Vec<ChatTurn>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a question together with its reply, so the transcript never
    /// holds an unanswered user turn.
    pub fn record_exchange(&mut self, question: impl Into<String>, reply: ChatTurn) {
        self.turns.push(ChatTurn::user(question));
        self.turns.push(reply);
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Assistant reply being assembled from streamed fragments.
#[derive(Debug, Default)]
pub struct PendingReply {
    text: String,
    fragments: usize,
}

impl PendingReply {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: &str) {
        self.text.push_str(fragment);
        self.fragments += 1;
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn fragments(&self) -> usize {
        self.fragments
    }

    pub fn finish(self) -> ChatTurn {
        ChatTurn::assistant(self.text)
    }
}

pub const DEFAULT_IDLE: Duration = Duration::from_secs(60 * 60);

struct Slot {
    session: Arc<Mutex<ChatSession>>,
    last_used: Instant,
}

/// Sessions keyed by connection. A session is created on first use and lives
/// until [`SessionStore::discard`] or until it has been idle for `idle`;
/// sessions never share turns.
///
/// Callers hold a session's lock for a whole chat turn, which serializes turns
/// within one session. Idle sessions are swept on [`SessionStore::get_or_create`];
/// a session still referenced by a caller is never swept.
pub struct SessionStore<K> {
    idle: Duration,
    sessions: Mutex<HashMap<K, Slot>>,
}

impl<K> Default for SessionStore<K>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
{
    fn default() -> Self {
        Self::new(DEFAULT_IDLE)
    }
}

impl<K> SessionStore<K>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
{
    pub fn new(idle: Duration) -> Self {
        Self {
            idle,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get_or_create(&self, key: &K) -> Arc<Mutex<ChatSession>> {
        let now = Instant::now();
        let mut sessions = self.sessions.lock().await;

        sessions.retain(|k, slot| {
            let keep = Arc::strong_count(&slot.session) > 1
                || now.duration_since(slot.last_used) < self.idle;
            if !keep {
                debug!(key = ?k, "session expired");
            }
            keep
        });

        let slot = sessions.entry(key.clone()).or_insert_with(|| {
            debug!(?key, "session created");
            Slot {
                session: Arc::new(Mutex::new(ChatSession::new())),
                last_used: now,
            }
        });
        slot.last_used = now;
        slot.session.clone()
    }

    /// Drops the session for `key`. Returns true if one existed.
    pub async fn discard(&self, key: &K) -> bool {
        let removed = self.sessions.lock().await.remove(key).is_some();
        if removed {
            debug!(?key, "session discarded");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(text: &str) -> ChatTurn {
        ChatTurn::assistant(text)
    }

    #[tokio::test]
    async fn creates_session_once_per_key() {
        let store: SessionStore<u64> = SessionStore::default();

        let a = store.get_or_create(&1).await;
        a.lock().await.record_exchange("삼성전자 어때", reply("보합입니다"));
        let again = store.get_or_create(&1).await;

        assert!(Arc::ptr_eq(&a, &again));
        assert_eq!(again.lock().await.len(), 2);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let store: SessionStore<(u64, u64)> = SessionStore::default();

        store
            .get_or_create(&(1, 1))
            .await
            .lock()
            .await
            .record_exchange("hi", reply("hello"));
        let other = store.get_or_create(&(1, 2)).await;

        assert!(other.lock().await.is_empty());
    }

    #[tokio::test]
    async fn discard_forgets_history() {
        let store: SessionStore<u64> = SessionStore::default();
        store
            .get_or_create(&7)
            .await
            .lock()
            .await
            .record_exchange("hi", reply("hello"));

        assert!(store.discard(&7).await);
        assert!(!store.discard(&7).await);
        assert!(store.is_empty().await);
        assert!(store.get_or_create(&7).await.lock().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_sessions_are_swept() {
        let store: SessionStore<u64> = SessionStore::new(Duration::from_secs(60));

        for key in 0..3 {
            store
                .get_or_create(&key)
                .await
                .lock()
                .await
                .record_exchange("q", reply("a"));
        }
        assert_eq!(store.len().await, 3);

        tokio::time::advance(Duration::from_secs(61)).await;
        let fresh = store.get_or_create(&0).await;

        assert_eq!(store.len().await, 1);
        assert!(fresh.lock().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn use_keeps_a_session_alive() {
        let store: SessionStore<u64> = SessionStore::new(Duration::from_secs(60));
        store
            .get_or_create(&1)
            .await
            .lock()
            .await
            .record_exchange("q", reply("a"));

        tokio::time::advance(Duration::from_secs(40)).await;
        store.get_or_create(&1).await;
        tokio::time::advance(Duration::from_secs(40)).await;

        assert_eq!(store.get_or_create(&1).await.lock().await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn session_in_use_is_not_swept() {
        let store: SessionStore<u64> = SessionStore::new(Duration::from_secs(60));
        let held = store.get_or_create(&1).await;

        tokio::time::advance(Duration::from_secs(120)).await;
        store.get_or_create(&2).await;

        assert_eq!(store.len().await, 2);
        assert!(Arc::ptr_eq(&held, &store.get_or_create(&1).await));
    }

    #[test]
    fn pending_reply_finalizes_in_order() {
        let mut reply = PendingReply::new();
        for fragment in ["삼성", "전자는 ", "현재"] {
            reply.push(fragment);
        }

        assert_eq!(reply.text(), "삼성전자는 현재");
        assert_eq!(reply.fragments(), 3);
        assert_eq!(reply.finish(), ChatTurn::assistant("삼성전자는 현재"));
    }

    #[test]
    fn exchange_records_question_then_reply() {
        let mut session = ChatSession::new();
        session.record_exchange("q1", reply("a1"));
        session.record_exchange("q2", reply("AI 응답 오류: timeout"));

        let roles: Vec<Role> = session.turns().iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
        assert_eq!(session.turns()[2].text, "q2");
    }
}
