use crate::domain::enums::Stage;
use crate::domain::AiAuditEntry;
use crate::error::AppResult;
use rusqlite::{params, Connection, Row};
use std::str::FromStr;

fn row_to_entry(row: &Row) -> rusqlite::Result<AiAuditEntry> {
    let stage: String = row.get("stage")?;
    let parsed: Option<String> = row.get("response_parsed")?;
    Ok(AiAuditEntry {
        id: row.get("id")?,
        pipeline_run_id: row.get("pipeline_run_id")?,
        stage: Stage::from_str(&stage).unwrap(),
        sender_domain: row.get("sender_domain")?,
        prompt_template_id: row.get("prompt_template_id")?,
        prompt_rendered: row.get("prompt_rendered")?,
        system_prompt: row.get("system_prompt")?,
        model_used: row.get("model_used")?,
        response_raw: row.get("response_raw")?,
        response_parsed: parsed.and_then(|p| serde_json::from_str(&p).ok()),
        duration_ms: row.get("duration_ms")?,
    })
}

#[allow(clippy::too_many_arguments)]
pub fn insert(
    conn: &Connection,
    pipeline_run_id: i64,
    stage: Stage,
    sender_domain: Option<&str>,
    prompt_template_id: &str,
    prompt_rendered: &str,
    system_prompt: &str,
    model_used: &str,
    response_raw: &str,
    response_parsed: Option<&serde_json::Value>,
    duration_ms: i64,
) -> AppResult<i64> {
    conn.execute(
        "INSERT INTO ai_audit_entries (
            pipeline_run_id, stage, sender_domain, prompt_template_id, prompt_rendered,
            system_prompt, model_used, response_raw, response_parsed, duration_ms
        ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
        params![
            pipeline_run_id,
            stage.as_str(),
            sender_domain,
            prompt_template_id,
            prompt_rendered,
            system_prompt,
            model_used,
            response_raw,
            response_parsed.map(serde_json::to_string).transpose()?,
            duration_ms,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get(conn: &Connection, id: i64) -> AppResult<Option<AiAuditEntry>> {
    let mut stmt = conn.prepare("SELECT * FROM ai_audit_entries WHERE id = ?1")?;
    let mut rows = stmt.query(params![id])?;
    if let Some(row) = rows.next()? {
        Ok(Some(row_to_entry(row)?))
    } else {
        Ok(None)
    }
}

pub fn list(
    conn: &Connection,
    stage: Option<&str>,
    limit: i64,
    offset: i64,
) -> AppResult<Vec<AiAuditEntry>> {
    if let Some(s) = stage {
        let mut stmt = conn.prepare(
            "SELECT * FROM ai_audit_entries WHERE stage = ?1 ORDER BY id DESC LIMIT ?2 OFFSET ?3",
        )?;
        let rows = stmt
            .query_map(params![s, limit, offset], row_to_entry)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    } else {
        let mut stmt =
            conn.prepare("SELECT * FROM ai_audit_entries ORDER BY id DESC LIMIT ?1 OFFSET ?2")?;
        let rows = stmt
            .query_map(params![limit, offset], row_to_entry)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }
}

pub fn list_for_run(conn: &Connection, run_id: i64) -> AppResult<Vec<AiAuditEntry>> {
    let mut stmt =
        conn.prepare("SELECT * FROM ai_audit_entries WHERE pipeline_run_id = ?1 ORDER BY id ASC")?;
    let rows = stmt
        .query_map(params![run_id], row_to_entry)?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}
