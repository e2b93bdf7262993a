use crate::domain::SenderSegment;
use crate::error::AppResult;
use rusqlite::{params, Connection};

pub fn replace_for_domain(
    conn: &Connection,
    domain: &str,
    segments: &[SenderSegment],
) -> AppResult<()> {
    conn.execute(
        "DELETE FROM sender_segments WHERE sender_domain = ?1",
        params![domain],
    )?;
    for s in segments {
        conn.execute(
            "INSERT INTO sender_segments (sender_domain, segment, sub_segment, confidence)
             VALUES (?1,?2,?3,?4)",
            params![s.sender_domain, s.segment, s.sub_segment, s.confidence],
        )?;
    }
    Ok(())
}

pub fn list_for_domain(conn: &Connection, domain: &str) -> AppResult<Vec<SenderSegment>> {
    let mut stmt =
        conn.prepare("SELECT sender_domain, segment, sub_segment, confidence FROM sender_segments WHERE sender_domain = ?1")?;
    let rows = stmt
        .query_map(params![domain], |r| {
            Ok(SenderSegment {
                sender_domain: r.get(0)?,
                segment: r.get(1)?,
                sub_segment: r.get(2)?,
                confidence: r.get(3)?,
            })
        })?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

pub fn list_by_segment(conn: &Connection, segment: &str) -> AppResult<Vec<SenderSegment>> {
    let mut stmt = conn.prepare(
        "SELECT sender_domain, segment, sub_segment, confidence FROM sender_segments WHERE segment = ?1",
    )?;
    let rows = stmt
        .query_map(params![segment], |r| {
            Ok(SenderSegment {
                sender_domain: r.get(0)?,
                segment: r.get(1)?,
                sub_segment: r.get(2)?,
                confidence: r.get(3)?,
            })
        })?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

pub fn stats_by_segment(conn: &Connection) -> AppResult<Vec<(String, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT segment, COUNT(DISTINCT sender_domain) FROM sender_segments GROUP BY segment ORDER BY 2 DESC",
    )?;
    let rows = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}
