use crate::domain::enums::OverrideScope;
use crate::domain::ClassificationOverride;
use crate::error::AppResult;
use rusqlite::{params, Connection, Row};
use std::str::FromStr;

fn row_to_override(row: &Row) -> rusqlite::Result<ClassificationOverride> {
    let scope: String = row.get("scope")?;
    Ok(ClassificationOverride {
        id: row.get("id")?,
        message_id: row.get("message_id")?,
        sender_domain: row.get("sender_domain")?,
        field_name: row.get("field_name")?,
        original_value: row.get("original_value")?,
        corrected_value: row.get("corrected_value")?,
        scope: OverrideScope::from_str(&scope).unwrap(),
        created_at: row.get("created_at")?,
    })
}

pub fn insert(
    conn: &Connection,
    message_id: Option<&str>,
    sender_domain: &str,
    field_name: &str,
    original_value: Option<&str>,
    corrected_value: &str,
    scope: OverrideScope,
) -> AppResult<i64> {
    conn.execute(
        "INSERT INTO classification_overrides (
            message_id, sender_domain, field_name, original_value, corrected_value, scope, created_at
        ) VALUES (?1,?2,?3,?4,?5,?6,?7)",
        params![
            message_id,
            sender_domain,
            field_name,
            original_value,
            corrected_value,
            scope.as_str(),
            chrono::Utc::now(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_for_domain(conn: &Connection, domain: &str) -> AppResult<Vec<ClassificationOverride>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM classification_overrides WHERE sender_domain = ?1 AND scope = 'sender'",
    )?;
    let rows = stmt
        .query_map(params![domain], row_to_override)?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

pub fn list_for_message(conn: &Connection, message_id: &str) -> AppResult<Vec<ClassificationOverride>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM classification_overrides WHERE message_id = ?1 AND scope = 'message'",
    )?;
    let rows = stmt
        .query_map(params![message_id], row_to_override)?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

pub fn list_all(conn: &Connection) -> AppResult<Vec<ClassificationOverride>> {
    let mut stmt = conn.prepare("SELECT * FROM classification_overrides ORDER BY created_at DESC")?;
    let rows = stmt
        .query_map([], row_to_override)?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

/// Ten most recent overrides, newest first — feeds the `--retrain` corrections block (§4.6).
pub fn recent(conn: &Connection, limit: i64) -> AppResult<Vec<ClassificationOverride>> {
    let mut stmt =
        conn.prepare("SELECT * FROM classification_overrides ORDER BY created_at DESC LIMIT ?1")?;
    let rows = stmt
        .query_map(params![limit], row_to_override)?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

pub fn stats(conn: &Connection) -> AppResult<serde_json::Value> {
    let total: i64 = conn.query_row("SELECT COUNT(*) FROM classification_overrides", [], |r| {
        r.get(0)
    })?;
    let by_field: Vec<(String, i64)> = {
        let mut stmt = conn.prepare(
            "SELECT field_name, COUNT(*) FROM classification_overrides GROUP BY field_name",
        )?;
        stmt.query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
            .filter_map(|r| r.ok())
            .collect()
    };
    Ok(serde_json::json!({
        "total": total,
        "by_field": by_field.into_iter().collect::<std::collections::HashMap<_, _>>(),
    }))
}
