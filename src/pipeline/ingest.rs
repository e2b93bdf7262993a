//! Ingestion / sync engine (§4.2). Pulls messages from the `MailProvider`,
//! upserts Messages/Attachments, recomputes affected Threads, and maintains
//! the `SyncState` history cursor.

use crate::domain::{Message, SyncState, Thread};
use crate::error::AppResult;
use crate::pipeline::thread_state;
use crate::services::Services;
use crate::store::Store;
use chrono::Utc;
use std::collections::{HashMap, HashSet};

pub struct IngestReport {
    pub messages_ingested: usize,
    pub threads_recomputed: usize,
}

/// §4.2 steps 1-2: full scan when no cursor exists, else a delta since the
/// cursor, falling back to a full scan when the provider reports the
/// cursor expired. `force_full` (§6.1 `ingest --sync`) ignores an existing
/// cursor and always does a full scan, for resyncing after gaps.
pub async fn run(services: &Services, store: &Store, query: &str, force_full: bool) -> AppResult<IngestReport> {
    let sync_state = {
        let conn = store.conn.lock().unwrap();
        crate::store::sync_state::get(&conn)?
    };

    let (messages, new_cursor) = match &sync_state.last_history_id {
        None => {
            let all = full_scan(services, query).await?;
            let cursor = services.mail.history_delta("").await.ok().map(|d| d.new_cursor);
            (all, cursor)
        }
        Some(cursor) if !force_full => {
            let delta = services.mail.history_delta(cursor).await?;
            if delta.expired {
                let all = full_scan(services, query).await?;
                (all, Some(delta.new_cursor))
            } else {
                (delta.changes, Some(delta.new_cursor))
            }
        }
        Some(_) => {
            let all = full_scan(services, query).await?;
            let cursor = services.mail.history_delta("").await.ok().map(|d| d.new_cursor);
            (all, cursor)
        }
    };

    let touched_threads = upsert_messages(store, &messages)?;
    let threads_recomputed = recompute_threads(store, &touched_threads)?;

    let conn = store.conn.lock().unwrap();
    let mut state = crate::store::sync_state::get(&conn)?;
    state.total_synced += messages.len() as i64;
    if sync_state.last_history_id.is_none() {
        state.last_full_sync = Some(Utc::now());
    } else {
        state.last_incremental_sync = Some(Utc::now());
    }
    if let Some(cursor) = new_cursor {
        state.last_history_id = Some(cursor);
    }
    crate::store::sync_state::save(&conn, &state)?;

    Ok(IngestReport {
        messages_ingested: messages.len(),
        threads_recomputed,
    })
}

async fn full_scan(services: &Services, query: &str) -> AppResult<Vec<Message>> {
    let mut all = Vec::new();
    let mut page_token = None;
    loop {
        let (mut page, next) = services.mail.list_messages(query, page_token.as_deref()).await?;
        all.append(&mut page);
        match next {
            Some(t) => page_token = Some(t),
            None => break,
        }
    }
    Ok(all)
}

fn upsert_messages(store: &Store, messages: &[Message]) -> AppResult<HashSet<String>> {
    let conn = store.conn.lock().unwrap();
    let mut touched = HashSet::new();
    for m in messages {
        if crate::store::thread::get(&conn, &m.thread_id)?.is_none() {
            crate::store::thread::upsert(&conn, &stub_thread(&m.thread_id, m))?;
        }
        crate::store::message::upsert(&conn, m)?;
        touched.insert(m.thread_id.clone());
    }
    Ok(touched)
}

/// Placeholder row satisfying `messages.thread_id`'s foreign key ahead of the
/// message insert; `recompute_threads` overwrites every field once the
/// thread's full message set is in the store.
fn stub_thread(thread_id: &str, m: &Message) -> Thread {
    Thread {
        thread_id: thread_id.to_string(),
        normalized_subject: normalize_subject(&m.subject),
        participant_count: 1,
        message_count: 0,
        first_message_date: m.date,
        last_message_date: m.date,
        last_sender: m.from_address.clone(),
        user_participated: m.is_sent_by_user,
        user_last_replied: None,
        awaiting_response_from: crate::domain::enums::AwaitingResponseFrom::None,
        days_dormant: 0,
    }
}

/// §4.2 step 4: recompute every touched thread's aggregate fields and the
/// content-aware `awaiting_response_from`.
pub fn recompute_threads(store: &Store, thread_ids: &HashSet<String>) -> AppResult<usize> {
    let conn = store.conn.lock().unwrap();
    let mut count = 0;
    for thread_id in thread_ids {
        let messages = crate::store::message::list_for_thread(&conn, thread_id)?;
        if messages.is_empty() {
            continue;
        }
        let thread = recompute_one(thread_id, &messages);
        crate::store::thread::upsert(&conn, &thread)?;
        count += 1;
    }
    Ok(count)
}

fn recompute_one(thread_id: &str, messages: &[Message]) -> Thread {
    let mut senders: HashMap<&str, ()> = HashMap::new();
    for m in messages {
        senders.insert(m.from_address.as_str(), ());
    }
    let first = messages.iter().min_by_key(|m| m.date).unwrap();
    let last = messages.iter().max_by_key(|m| m.date).unwrap();
    let user_participated = messages.iter().any(|m| m.is_sent_by_user);
    let user_last_replied = messages
        .iter()
        .filter(|m| m.is_sent_by_user)
        .map(|m| m.date)
        .max();
    let now = Utc::now();
    let days_dormant = (now - last.date).num_days().max(0);
    let awaiting = thread_state::classify(last.preferred_body(), last.is_sent_by_user);

    Thread {
        thread_id: thread_id.to_string(),
        normalized_subject: normalize_subject(&last.subject),
        participant_count: senders.len() as i64,
        message_count: messages.len() as i64,
        first_message_date: first.date,
        last_message_date: last.date,
        last_sender: last.from_address.clone(),
        user_participated,
        user_last_replied,
        awaiting_response_from: awaiting,
        days_dormant,
    }
}

fn normalize_subject(subject: &str) -> String {
    let mut s = subject.trim();
    loop {
        let lower = s.to_lowercase();
        let stripped = ["re:", "fwd:", "fw:"].iter().find_map(|p| {
            if lower.starts_with(p) {
                Some(s[p.len()..].trim_start())
            } else {
                None
            }
        });
        match stripped {
            Some(next) => s = next,
            None => break,
        }
    }
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Message;
    use std::collections::HashMap as Map;

    fn msg(id: &str, thread: &str, date: chrono::DateTime<Utc>, from_user: bool, body: &str) -> Message {
        Message {
            message_id: id.to_string(),
            thread_id: thread.to_string(),
            date,
            from_address: "someone@example.com".to_string(),
            from_name: None,
            to: vec![],
            cc: vec![],
            reply_to: None,
            subject: "Re: Hello".to_string(),
            raw_headers: Map::new(),
            html_body: None,
            text_body: Some(body.to_string()),
            labels: vec![],
            size: 0,
            is_sent_by_user: from_user,
        }
    }

    #[test]
    fn recomputes_thread_aggregate_fields() {
        let t0 = Utc::now() - chrono::Duration::days(10);
        let t1 = Utc::now() - chrono::Duration::days(5);
        let messages = vec![
            msg("m1", "t1", t0, false, "Hi there, interested in a demo?"),
            msg("m2", "t1", t1, true, "Sure, let's talk."),
        ];
        let thread = recompute_one("t1", &messages);
        assert_eq!(thread.message_count, 2);
        assert_eq!(thread.normalized_subject, "Hello");
        assert!(thread.user_participated);
    }

    #[test]
    fn single_message_thread_never_awaits_gem_eligible_state_alone() {
        let t0 = Utc::now() - chrono::Duration::days(20);
        let messages = vec![msg("m1", "t1", t0, false, "What's your pricing?")];
        let thread = recompute_one("t1", &messages);
        assert_eq!(thread.message_count, 1);
    }
}
