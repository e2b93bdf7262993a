use crate::domain::enums::{EntitySource, EntityType};
use crate::domain::ExtractedEntity;
use crate::error::AppResult;
use rusqlite::{params, Connection, Row};
use std::str::FromStr;

fn row_to_entity(row: &Row) -> rusqlite::Result<ExtractedEntity> {
    let etype: String = row.get("entity_type")?;
    let source: String = row.get("source")?;
    Ok(ExtractedEntity {
        id: row.get("id")?,
        message_id: row.get("message_id")?,
        entity_type: EntityType::from_str(&etype).unwrap(),
        value: row.get("value")?,
        normalized: row.get("normalized")?,
        context: row.get("context")?,
        confidence: row.get("confidence")?,
        source: EntitySource::from_str(&source).unwrap(),
    })
}

/// Entity rows are append-only per message: a re-run first deletes the
/// message's prior rows so the stage stays idempotent without needing a
/// natural key on (message_id, type, value).
pub fn replace_for_message(
    conn: &Connection,
    message_id: &str,
    entities: &[ExtractedEntity],
) -> AppResult<()> {
    conn.execute(
        "DELETE FROM extracted_entities WHERE message_id = ?1",
        params![message_id],
    )?;
    for e in entities {
        conn.execute(
            "INSERT INTO extracted_entities (
                message_id, entity_type, value, normalized, context, confidence, source
            ) VALUES (?1,?2,?3,?4,?5,?6,?7)",
            params![
                e.message_id,
                e.entity_type.as_str(),
                e.value,
                e.normalized,
                e.context,
                e.confidence,
                e.source.as_str(),
            ],
        )?;
    }
    Ok(())
}

pub fn list_for_message(conn: &Connection, message_id: &str) -> AppResult<Vec<ExtractedEntity>> {
    let mut stmt =
        conn.prepare("SELECT * FROM extracted_entities WHERE message_id = ?1 ORDER BY id ASC")?;
    let rows = stmt
        .query_map(params![message_id], row_to_entity)?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

pub fn list_for_messages(conn: &Connection, message_ids: &[String]) -> AppResult<Vec<ExtractedEntity>> {
    let mut out = Vec::new();
    for id in message_ids {
        out.extend(list_for_message(conn, id)?);
    }
    Ok(out)
}

pub fn list_by_type(conn: &Connection, entity_type: EntityType) -> AppResult<Vec<ExtractedEntity>> {
    let mut stmt =
        conn.prepare("SELECT * FROM extracted_entities WHERE entity_type = ?1 ORDER BY id ASC")?;
    let rows = stmt
        .query_map(params![entity_type.as_str()], row_to_entity)?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

pub fn has_any_for_message(conn: &Connection, message_id: &str) -> AppResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM extracted_entities WHERE message_id = ?1",
        params![message_id],
        |r| r.get(0),
    )?;
    Ok(count > 0)
}

/// Messages with no entity rows yet (left-anti-join against the distinct
/// message_ids already present, since `extracted_entities` has no natural
/// 1:1 key to join on directly).
pub fn ids_missing(conn: &Connection) -> AppResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT m.message_id FROM messages m
         LEFT JOIN (SELECT DISTINCT message_id FROM extracted_entities) e
           ON e.message_id = m.message_id
         WHERE e.message_id IS NULL",
    )?;
    let rows = stmt
        .query_map([], |r| r.get::<_, String>(0))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}
