use crate::domain::{Attachment, Message};
use crate::error::AppResult;
use rusqlite::{params, Connection, Row};

fn row_to_message(row: &Row) -> rusqlite::Result<Message> {
    let to_json: String = row.get("to_addresses")?;
    let cc_json: String = row.get("cc_addresses")?;
    let headers_json: String = row.get("raw_headers")?;
    let labels_json: String = row.get("labels")?;
    Ok(Message {
        message_id: row.get("message_id")?,
        thread_id: row.get("thread_id")?,
        date: row.get("date")?,
        from_address: row.get("from_address")?,
        from_name: row.get("from_name")?,
        to: serde_json::from_str(&to_json).unwrap_or_default(),
        cc: serde_json::from_str(&cc_json).unwrap_or_default(),
        reply_to: row.get("reply_to")?,
        subject: row.get("subject")?,
        raw_headers: serde_json::from_str(&headers_json).unwrap_or_default(),
        html_body: row.get("html_body")?,
        text_body: row.get("text_body")?,
        labels: serde_json::from_str(&labels_json).unwrap_or_default(),
        size: row.get("size")?,
        is_sent_by_user: row.get("is_sent_by_user")?,
    })
}

/// Upsert keyed on `message_id` — re-ingesting the same message is a no-op
/// on content (§8 idempotence law: re-ingesting yields a byte-equivalent set).
pub fn upsert(conn: &Connection, msg: &Message) -> AppResult<()> {
    conn.execute(
        "INSERT INTO messages (
            message_id, thread_id, date, from_address, from_name, to_addresses,
            cc_addresses, reply_to, subject, raw_headers, html_body, text_body,
            labels, size, is_sent_by_user
        ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15)
        ON CONFLICT(message_id) DO UPDATE SET
            thread_id=excluded.thread_id, date=excluded.date,
            from_address=excluded.from_address, from_name=excluded.from_name,
            to_addresses=excluded.to_addresses, cc_addresses=excluded.cc_addresses,
            reply_to=excluded.reply_to, subject=excluded.subject,
            raw_headers=excluded.raw_headers, html_body=excluded.html_body,
            text_body=excluded.text_body, labels=excluded.labels, size=excluded.size,
            is_sent_by_user=excluded.is_sent_by_user",
        params![
            msg.message_id,
            msg.thread_id,
            msg.date,
            msg.from_address,
            msg.from_name,
            serde_json::to_string(&msg.to)?,
            serde_json::to_string(&msg.cc)?,
            msg.reply_to,
            msg.subject,
            serde_json::to_string(&msg.raw_headers)?,
            msg.html_body,
            msg.text_body,
            serde_json::to_string(&msg.labels)?,
            msg.size,
            msg.is_sent_by_user,
        ],
    )?;
    Ok(())
}

pub fn insert_attachment(
    conn: &Connection,
    message_id: &str,
    filename: &str,
    mime_type: &str,
    size_bytes: i64,
) -> AppResult<()> {
    conn.execute(
        "INSERT INTO attachments (message_id, filename, mime_type, size_bytes) VALUES (?1,?2,?3,?4)",
        params![message_id, filename, mime_type, size_bytes],
    )?;
    Ok(())
}

pub fn list_attachments(conn: &Connection, message_id: &str) -> AppResult<Vec<Attachment>> {
    let mut stmt = conn.prepare(
        "SELECT id, message_id, filename, mime_type, size_bytes FROM attachments WHERE message_id = ?1",
    )?;
    let rows = stmt
        .query_map(params![message_id], |row| {
            Ok(Attachment {
                id: row.get(0)?,
                message_id: row.get(1)?,
                filename: row.get(2)?,
                mime_type: row.get(3)?,
                size_bytes: row.get(4)?,
            })
        })?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

pub fn get(conn: &Connection, message_id: &str) -> AppResult<Option<Message>> {
    let mut stmt = conn.prepare("SELECT * FROM messages WHERE message_id = ?1")?;
    let mut rows = stmt.query(params![message_id])?;
    if let Some(row) = rows.next()? {
        Ok(Some(row_to_message(row)?))
    } else {
        Ok(None)
    }
}

pub fn list_for_thread(conn: &Connection, thread_id: &str) -> AppResult<Vec<Message>> {
    let mut stmt = conn.prepare("SELECT * FROM messages WHERE thread_id = ?1 ORDER BY date ASC")?;
    let rows = stmt
        .query_map(params![thread_id], row_to_message)?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

pub fn list_all(conn: &Connection) -> AppResult<Vec<Message>> {
    let mut stmt = conn.prepare("SELECT * FROM messages ORDER BY date ASC")?;
    let rows = stmt
        .query_map([], row_to_message)?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

pub fn distinct_thread_ids(conn: &Connection) -> AppResult<Vec<String>> {
    let mut stmt = conn.prepare("SELECT DISTINCT thread_id FROM messages")?;
    let rows = stmt
        .query_map([], |r| r.get::<_, String>(0))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

/// Messages lacking a row in `table` (the left-anti-join every stage
/// performs to find unprocessed work, §2).
pub fn ids_missing_from(conn: &Connection, table: &str) -> AppResult<Vec<String>> {
    let sql = format!(
        "SELECT m.message_id FROM messages m LEFT JOIN {table} t ON t.message_id = m.message_id WHERE t.message_id IS NULL"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |r| r.get::<_, String>(0))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}
