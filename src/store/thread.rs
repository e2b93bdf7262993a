use crate::domain::enums::AwaitingResponseFrom;
use crate::domain::Thread;
use crate::error::AppResult;
use rusqlite::{params, Connection, Row};
use std::str::FromStr;

fn row_to_thread(row: &Row) -> rusqlite::Result<Thread> {
    let awaiting: String = row.get("awaiting_response_from")?;
    Ok(Thread {
        thread_id: row.get("thread_id")?,
        normalized_subject: row.get("normalized_subject")?,
        participant_count: row.get("participant_count")?,
        message_count: row.get("message_count")?,
        first_message_date: row.get("first_message_date")?,
        last_message_date: row.get("last_message_date")?,
        last_sender: row.get("last_sender")?,
        user_participated: row.get("user_participated")?,
        user_last_replied: row.get("user_last_replied")?,
        awaiting_response_from: AwaitingResponseFrom::from_str(&awaiting).unwrap(),
        days_dormant: row.get("days_dormant")?,
    })
}

pub fn upsert(conn: &Connection, t: &Thread) -> AppResult<()> {
    conn.execute(
        "INSERT INTO threads (
            thread_id, normalized_subject, participant_count, message_count,
            first_message_date, last_message_date, last_sender, user_participated,
            user_last_replied, awaiting_response_from, days_dormant
        ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)
        ON CONFLICT(thread_id) DO UPDATE SET
            normalized_subject=excluded.normalized_subject,
            participant_count=excluded.participant_count,
            message_count=excluded.message_count,
            first_message_date=excluded.first_message_date,
            last_message_date=excluded.last_message_date,
            last_sender=excluded.last_sender,
            user_participated=excluded.user_participated,
            user_last_replied=excluded.user_last_replied,
            awaiting_response_from=excluded.awaiting_response_from,
            days_dormant=excluded.days_dormant",
        params![
            t.thread_id,
            t.normalized_subject,
            t.participant_count,
            t.message_count,
            t.first_message_date,
            t.last_message_date,
            t.last_sender,
            t.user_participated,
            t.user_last_replied,
            t.awaiting_response_from.as_str(),
            t.days_dormant,
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, thread_id: &str) -> AppResult<Option<Thread>> {
    let mut stmt = conn.prepare("SELECT * FROM threads WHERE thread_id = ?1")?;
    let mut rows = stmt.query(params![thread_id])?;
    if let Some(row) = rows.next()? {
        Ok(Some(row_to_thread(row)?))
    } else {
        Ok(None)
    }
}

pub fn list_all(conn: &Connection) -> AppResult<Vec<Thread>> {
    let mut stmt = conn.prepare("SELECT * FROM threads ORDER BY last_message_date DESC")?;
    let rows = stmt
        .query_map([], row_to_thread)?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}
