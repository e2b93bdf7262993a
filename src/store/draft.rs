use crate::domain::enums::{Channel, DraftStatus, Strategy};
use crate::domain::EngagementDraft;
use crate::error::AppResult;
use rusqlite::{params, Connection, Row};
use std::str::FromStr;

fn row_to_draft(row: &Row) -> rusqlite::Result<EngagementDraft> {
    let strategy: String = row.get("strategy")?;
    let channel: String = row.get("channel")?;
    let status: String = row.get("status")?;
    Ok(EngagementDraft {
        id: row.get("id")?,
        gem_id: row.get("gem_id")?,
        sender_domain: row.get("sender_domain")?,
        strategy: Strategy::from_str(&strategy).unwrap(),
        channel: Channel::from_str(&channel).unwrap(),
        subject_line: row.get("subject_line")?,
        body_text: row.get("body_text")?,
        body_html: row.get("body_html")?,
        status: DraftStatus::from_str(&status).unwrap(),
        generated_at: row.get("generated_at")?,
        sent_at: row.get("sent_at")?,
        response_received: row.get("response_received")?,
        response_sentiment: row.get("response_sentiment")?,
    })
}

pub fn insert(conn: &Connection, d: &EngagementDraft) -> AppResult<i64> {
    conn.execute(
        "INSERT INTO engagement_drafts (
            gem_id, sender_domain, strategy, channel, subject_line, body_text, body_html,
            status, generated_at, sent_at, response_received, response_sentiment
        ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12)",
        params![
            d.gem_id,
            d.sender_domain,
            d.strategy.as_str(),
            d.channel.as_str(),
            d.subject_line,
            d.body_text,
            d.body_html,
            d.status.as_str(),
            d.generated_at,
            d.sent_at,
            d.response_received,
            d.response_sentiment,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get(conn: &Connection, id: i64) -> AppResult<Option<EngagementDraft>> {
    let mut stmt = conn.prepare("SELECT * FROM engagement_drafts WHERE id = ?1")?;
    let mut rows = stmt.query(params![id])?;
    if let Some(row) = rows.next()? {
        Ok(Some(row_to_draft(row)?))
    } else {
        Ok(None)
    }
}

pub fn list_all(conn: &Connection) -> AppResult<Vec<EngagementDraft>> {
    let mut stmt = conn.prepare("SELECT * FROM engagement_drafts ORDER BY generated_at DESC")?;
    let rows = stmt
        .query_map([], row_to_draft)?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

/// Count of drafts generated today, for `engagement_config.max_outreach_per_day` (§4.9, §8 property 9).
/// Drafts generated with an explicit gem id bypass this cap at the call site, not here.
pub fn count_generated_today(conn: &Connection) -> AppResult<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM engagement_drafts WHERE date(generated_at) = date('now')",
        [],
        |r| r.get(0),
    )
    .map_err(Into::into)
}

pub fn has_draft_for_gem(conn: &Connection, gem_id: i64) -> AppResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM engagement_drafts WHERE gem_id = ?1",
        params![gem_id],
        |r| r.get(0),
    )?;
    Ok(count > 0)
}
