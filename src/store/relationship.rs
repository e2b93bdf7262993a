use crate::domain::enums::RelationshipType;
use crate::domain::profile::RelationshipSource;
use crate::domain::SenderRelationship;
use crate::error::AppResult;
use rusqlite::{params, Connection, Row};
use std::str::FromStr;

fn source_tag(s: &RelationshipSource) -> &'static str {
    match s {
        RelationshipSource::Manual => "manual",
        RelationshipSource::AutoDetected => "auto_detected",
        RelationshipSource::Learned => "learned",
    }
}

fn source_from_tag(s: &str) -> RelationshipSource {
    match s {
        "manual" => RelationshipSource::Manual,
        "learned" => RelationshipSource::Learned,
        _ => RelationshipSource::AutoDetected,
    }
}

fn row_to_relationship(row: &Row) -> rusqlite::Result<SenderRelationship> {
    let rtype: String = row.get("relationship_type")?;
    let source: String = row.get("source")?;
    Ok(SenderRelationship {
        sender_domain: row.get("sender_domain")?,
        relationship_type: RelationshipType::from_str(&rtype).unwrap(),
        note: row.get("note")?,
        suppress_gems: row.get("suppress_gems")?,
        source: source_from_tag(&source),
    })
}

/// Manual sets always win (§4.7.3 precedence rule 1) — upserting here is
/// how `relationship --sender D --type T` takes effect on every subsequent
/// profiler run regardless of auto-detect signals.
pub fn upsert(conn: &Connection, r: &SenderRelationship) -> AppResult<()> {
    conn.execute(
        "INSERT INTO sender_relationships (sender_domain, relationship_type, note, suppress_gems, source)
         VALUES (?1,?2,?3,?4,?5)
         ON CONFLICT(sender_domain) DO UPDATE SET
            relationship_type=excluded.relationship_type, note=excluded.note,
            suppress_gems=excluded.suppress_gems, source=excluded.source",
        params![
            r.sender_domain,
            r.relationship_type.as_str(),
            r.note,
            r.suppress_gems,
            source_tag(&r.source),
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, domain: &str) -> AppResult<Option<SenderRelationship>> {
    let mut stmt = conn.prepare("SELECT * FROM sender_relationships WHERE sender_domain = ?1")?;
    let mut rows = stmt.query(params![domain])?;
    if let Some(row) = rows.next()? {
        Ok(Some(row_to_relationship(row)?))
    } else {
        Ok(None)
    }
}

pub fn list_all(conn: &Connection) -> AppResult<Vec<SenderRelationship>> {
    let mut stmt = conn.prepare("SELECT * FROM sender_relationships ORDER BY sender_domain ASC")?;
    let rows = stmt
        .query_map([], row_to_relationship)?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

pub fn list_by_type(conn: &Connection, t: RelationshipType) -> AppResult<Vec<SenderRelationship>> {
    let mut stmt =
        conn.prepare("SELECT * FROM sender_relationships WHERE relationship_type = ?1")?;
    let rows = stmt
        .query_map(params![t.as_str()], row_to_relationship)?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}
