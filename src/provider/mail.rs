//! Mail-provider adapter (§6.4, §4.2). OAuth and message-fetch mechanics are
//! out of scope (§1) — this trait is the canonical interface contract the
//! ingestion stage programs against.

use crate::domain::Message;
use crate::error::AppResult;
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct HistoryDelta {
    pub changes: Vec<Message>,
    pub new_cursor: String,
    /// Provider-defined expiry — typically true once the cursor is ≥7 days
    /// stale (§4.2 step 2), forcing a full-scan fallback.
    pub expired: bool,
}

#[async_trait::async_trait]
pub trait MailProvider: Send + Sync {
    async fn list_messages(
        &self,
        query: &str,
        page_token: Option<&str>,
    ) -> AppResult<(Vec<Message>, Option<String>)>;

    async fn history_delta(&self, cursor: &str) -> AppResult<HistoryDelta>;
}

/// In-memory provider backing integration tests and local fixtures. Holds a
/// fixed message set and replays it across `list_messages` pages; `history_delta`
/// reports whatever was appended via `push_delta` since the adapter was built.
pub struct FixtureMailProvider {
    messages: Vec<Message>,
    deltas: Mutex<VecDeque<Vec<Message>>>,
    cursor_counter: Mutex<u64>,
}

impl FixtureMailProvider {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            deltas: Mutex::new(VecDeque::new()),
            cursor_counter: Mutex::new(0),
        }
    }

    /// Queues a batch of messages to be returned by the next `history_delta` call.
    pub fn push_delta(&self, messages: Vec<Message>) {
        self.deltas.lock().unwrap().push_back(messages);
    }
}

#[async_trait::async_trait]
impl MailProvider for FixtureMailProvider {
    async fn list_messages(
        &self,
        _query: &str,
        page_token: Option<&str>,
    ) -> AppResult<(Vec<Message>, Option<String>)> {
        // Fixture is small enough to return in a single page.
        if page_token.is_some() {
            return Ok((Vec::new(), None));
        }
        Ok((self.messages.clone(), None))
    }

    async fn history_delta(&self, _cursor: &str) -> AppResult<HistoryDelta> {
        let batch = self.deltas.lock().unwrap().pop_front().unwrap_or_default();
        let mut counter = self.cursor_counter.lock().unwrap();
        *counter += 1;
        Ok(HistoryDelta {
            changes: batch,
            new_cursor: format!("fixture-cursor-{}", *counter),
            expired: false,
        })
    }
}
