use crate::domain::enums::{RunStatus, Stage, TriggeredBy};
use crate::domain::PipelineRun;
use crate::error::AppResult;
use rusqlite::{params, Connection, Row};
use std::str::FromStr;

fn row_to_run(row: &Row) -> rusqlite::Result<PipelineRun> {
    let stage: String = row.get("stage")?;
    let status: String = row.get("status")?;
    let triggered: String = row.get("triggered_by")?;
    let config: String = row.get("config_snapshot")?;
    Ok(PipelineRun {
        id: row.get("id")?,
        stage: Stage::from_str(&stage).unwrap(),
        status: RunStatus::from_str(&status).unwrap(),
        started_at: row.get("started_at")?,
        completed_at: row.get("completed_at")?,
        items_processed: row.get("items_processed")?,
        error_message: row.get("error_message")?,
        config_snapshot: serde_json::from_str(&config).unwrap_or(serde_json::json!({})),
        triggered_by: TriggeredBy::from_str(&triggered).unwrap(),
    })
}

pub fn start(
    conn: &Connection,
    stage: Stage,
    triggered_by: TriggeredBy,
    config_snapshot: &serde_json::Value,
) -> AppResult<i64> {
    conn.execute(
        "INSERT INTO pipeline_runs (stage, status, started_at, config_snapshot, triggered_by)
         VALUES (?1,'running',?2,?3,?4)",
        params![
            stage.as_str(),
            chrono::Utc::now(),
            serde_json::to_string(config_snapshot)?,
            triggered_by.as_str(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn finish(
    conn: &Connection,
    run_id: i64,
    status: RunStatus,
    items_processed: i64,
    error_message: Option<&str>,
) -> AppResult<()> {
    conn.execute(
        "UPDATE pipeline_runs SET status=?1, completed_at=?2, items_processed=?3, error_message=?4
         WHERE id = ?5",
        params![
            status.as_str(),
            chrono::Utc::now(),
            items_processed,
            error_message,
            run_id,
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, run_id: i64) -> AppResult<Option<PipelineRun>> {
    let mut stmt = conn.prepare("SELECT * FROM pipeline_runs WHERE id = ?1")?;
    let mut rows = stmt.query(params![run_id])?;
    if let Some(row) = rows.next()? {
        Ok(Some(row_to_run(row)?))
    } else {
        Ok(None)
    }
}

pub fn list_all(conn: &Connection) -> AppResult<Vec<PipelineRun>> {
    let mut stmt = conn.prepare("SELECT * FROM pipeline_runs ORDER BY started_at DESC")?;
    let rows = stmt
        .query_map([], row_to_run)?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

pub fn recent_activity(conn: &Connection, limit: i64) -> AppResult<Vec<PipelineRun>> {
    let mut stmt =
        conn.prepare("SELECT * FROM pipeline_runs ORDER BY started_at DESC LIMIT ?1")?;
    let rows = stmt
        .query_map(params![limit], row_to_run)?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}
