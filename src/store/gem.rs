use crate::domain::enums::{GemStatus, GemType};
use crate::domain::{Gem, GemExplanation};
use crate::error::AppResult;
use rusqlite::{params, Connection, Row};
use std::str::FromStr;

fn row_to_gem(row: &Row) -> rusqlite::Result<Gem> {
    let gtype: String = row.get("gem_type")?;
    let status: String = row.get("status")?;
    let explanation: String = row.get("explanation")?;
    let actions: String = row.get("recommended_actions")?;
    let sources: String = row.get("source_message_ids")?;
    Ok(Gem {
        id: row.get("id")?,
        gem_type: GemType::from_str(&gtype).unwrap(),
        sender_domain: row.get("sender_domain")?,
        thread_id: row.get("thread_id")?,
        score: row.get("score")?,
        explanation: serde_json::from_str(&explanation).unwrap_or(GemExplanation {
            gem_type: GemType::from_str(&gtype).unwrap(),
            summary: String::new(),
            signals: Vec::new(),
            confidence: 0.0,
            estimated_value: crate::domain::enums::EstimatedValue::Low,
            urgency: crate::domain::enums::Urgency::Low,
        }),
        recommended_actions: serde_json::from_str(&actions).unwrap_or_default(),
        source_message_ids: serde_json::from_str(&sources).unwrap_or_default(),
        status: GemStatus::from_str(&status).unwrap(),
    })
}

/// Gems are append-only per detector run keyed on (sender_domain, gem_type,
/// thread_id): re-running the detector with no new upstream inputs must not
/// create duplicates, so this upserts on that composite identity rather than
/// always inserting.
pub fn upsert(conn: &Connection, g: &Gem) -> AppResult<i64> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM gems WHERE sender_domain = ?1 AND gem_type = ?2 AND
             (thread_id = ?3 OR (thread_id IS NULL AND ?3 IS NULL))",
            params![g.sender_domain, g.gem_type.as_str(), g.thread_id],
            |r| r.get(0),
        )
        .ok();

    if let Some(id) = existing {
        conn.execute(
            "UPDATE gems SET score=?1, explanation=?2, recommended_actions=?3, source_message_ids=?4
             WHERE id = ?5",
            params![
                g.score,
                serde_json::to_string(&g.explanation)?,
                serde_json::to_string(&g.recommended_actions)?,
                serde_json::to_string(&g.source_message_ids)?,
                id,
            ],
        )?;
        Ok(id)
    } else {
        conn.execute(
            "INSERT INTO gems (
                gem_type, sender_domain, thread_id, score, explanation,
                recommended_actions, source_message_ids, status
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
            params![
                g.gem_type.as_str(),
                g.sender_domain,
                g.thread_id,
                g.score,
                serde_json::to_string(&g.explanation)?,
                serde_json::to_string(&g.recommended_actions)?,
                serde_json::to_string(&g.source_message_ids)?,
                g.status.as_str(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }
}

pub fn get(conn: &Connection, id: i64) -> AppResult<Option<Gem>> {
    let mut stmt = conn.prepare("SELECT * FROM gems WHERE id = ?1")?;
    let mut rows = stmt.query(params![id])?;
    if let Some(row) = rows.next()? {
        Ok(Some(row_to_gem(row)?))
    } else {
        Ok(None)
    }
}

pub fn list_all(conn: &Connection) -> AppResult<Vec<Gem>> {
    let mut stmt = conn.prepare("SELECT * FROM gems ORDER BY score DESC")?;
    let rows = stmt
        .query_map([], row_to_gem)?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

pub fn list_top(conn: &Connection, n: i64) -> AppResult<Vec<Gem>> {
    let mut stmt = conn.prepare("SELECT * FROM gems ORDER BY score DESC LIMIT ?1")?;
    let rows = stmt
        .query_map(params![n], row_to_gem)?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

pub fn list_by_type(conn: &Connection, gem_type: &str) -> AppResult<Vec<Gem>> {
    let mut stmt = conn.prepare("SELECT * FROM gems WHERE gem_type = ?1 ORDER BY score DESC")?;
    let rows = stmt
        .query_map(params![gem_type], row_to_gem)?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

pub fn list_for_domain(conn: &Connection, domain: &str) -> AppResult<Vec<Gem>> {
    let mut stmt =
        conn.prepare("SELECT * FROM gems WHERE sender_domain = ?1 ORDER BY score DESC")?;
    let rows = stmt
        .query_map(params![domain], row_to_gem)?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

pub fn count_by_type(conn: &Connection) -> AppResult<Vec<(String, i64)>> {
    let mut stmt =
        conn.prepare("SELECT gem_type, COUNT(*) FROM gems GROUP BY gem_type ORDER BY 2 DESC")?;
    let rows = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}
