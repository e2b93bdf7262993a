use crate::domain::enums::EspConfidence;
use crate::domain::{ParsedMetadata, SenderTemporal};
use crate::error::AppResult;
use rusqlite::{params, Connection, Row};
use std::str::FromStr;

fn row_to_metadata(row: &Row) -> rusqlite::Result<ParsedMetadata> {
    let conf: Option<String> = row.get("esp_confidence")?;
    Ok(ParsedMetadata {
        message_id: row.get("message_id")?,
        sender_domain: row.get("sender_domain")?,
        sender_subdomain: row.get("sender_subdomain")?,
        envelope_sender: row.get("envelope_sender")?,
        esp_identified: row.get("esp_identified")?,
        esp_confidence: conf.map(|c| EspConfidence::from_str(&c).unwrap()),
        dkim_domain: row.get("dkim_domain")?,
        spf_result: row.get("spf_result")?,
        dmarc_result: row.get("dmarc_result")?,
        sending_ip: row.get("sending_ip")?,
        mail_server: row.get("mail_server")?,
        x_mailer: row.get("x_mailer")?,
        precedence: row.get("precedence")?,
        feedback_id: row.get("feedback_id")?,
        list_unsubscribe_url: row.get("list_unsubscribe_url")?,
        list_unsubscribe_email: row.get("list_unsubscribe_email")?,
        is_bulk: row.get("is_bulk")?,
    })
}

pub fn upsert(conn: &Connection, m: &ParsedMetadata) -> AppResult<()> {
    conn.execute(
        "INSERT INTO parsed_metadata (
            message_id, sender_domain, sender_subdomain, envelope_sender, esp_identified,
            esp_confidence, dkim_domain, spf_result, dmarc_result, sending_ip, mail_server,
            x_mailer, precedence, feedback_id, list_unsubscribe_url, list_unsubscribe_email, is_bulk
        ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17)
        ON CONFLICT(message_id) DO UPDATE SET
            sender_domain=excluded.sender_domain, sender_subdomain=excluded.sender_subdomain,
            envelope_sender=excluded.envelope_sender, esp_identified=excluded.esp_identified,
            esp_confidence=excluded.esp_confidence, dkim_domain=excluded.dkim_domain,
            spf_result=excluded.spf_result, dmarc_result=excluded.dmarc_result,
            sending_ip=excluded.sending_ip, mail_server=excluded.mail_server,
            x_mailer=excluded.x_mailer, precedence=excluded.precedence,
            feedback_id=excluded.feedback_id, list_unsubscribe_url=excluded.list_unsubscribe_url,
            list_unsubscribe_email=excluded.list_unsubscribe_email, is_bulk=excluded.is_bulk",
        params![
            m.message_id,
            m.sender_domain,
            m.sender_subdomain,
            m.envelope_sender,
            m.esp_identified,
            m.esp_confidence.as_ref().map(|c| c.as_str()),
            m.dkim_domain,
            m.spf_result,
            m.dmarc_result,
            m.sending_ip,
            m.mail_server,
            m.x_mailer,
            m.precedence,
            m.feedback_id,
            m.list_unsubscribe_url,
            m.list_unsubscribe_email,
            m.is_bulk,
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, message_id: &str) -> AppResult<Option<ParsedMetadata>> {
    let mut stmt = conn.prepare("SELECT * FROM parsed_metadata WHERE message_id = ?1")?;
    let mut rows = stmt.query(params![message_id])?;
    if let Some(row) = rows.next()? {
        Ok(Some(row_to_metadata(row)?))
    } else {
        Ok(None)
    }
}

pub fn list_for_domain(conn: &Connection, domain: &str) -> AppResult<Vec<ParsedMetadata>> {
    let mut stmt = conn.prepare("SELECT * FROM parsed_metadata WHERE sender_domain = ?1")?;
    let rows = stmt
        .query_map(params![domain], row_to_metadata)?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

/// `stats --by-esp`: message counts grouped by identified ESP, unidentified
/// senders rolled into `None`.
pub fn stats_by_esp(conn: &Connection) -> AppResult<Vec<(Option<String>, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT esp_identified, COUNT(*) FROM parsed_metadata GROUP BY esp_identified ORDER BY 2 DESC",
    )?;
    let rows = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

pub fn distinct_domains(conn: &Connection) -> AppResult<Vec<String>> {
    let mut stmt = conn.prepare("SELECT DISTINCT sender_domain FROM parsed_metadata")?;
    let rows = stmt
        .query_map([], |r| r.get::<_, String>(0))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

pub fn upsert_temporal(conn: &Connection, t: &SenderTemporal) -> AppResult<()> {
    conn.execute(
        "INSERT INTO sender_temporal (
            sender_domain, first_seen, last_seen, total_messages, avg_frequency_days,
            most_common_hour, most_common_weekday
        ) VALUES (?1,?2,?3,?4,?5,?6,?7)
        ON CONFLICT(sender_domain) DO UPDATE SET
            first_seen=excluded.first_seen, last_seen=excluded.last_seen,
            total_messages=excluded.total_messages, avg_frequency_days=excluded.avg_frequency_days,
            most_common_hour=excluded.most_common_hour, most_common_weekday=excluded.most_common_weekday",
        params![
            t.sender_domain,
            t.first_seen,
            t.last_seen,
            t.total_messages,
            t.avg_frequency_days,
            t.most_common_hour,
            t.most_common_weekday,
        ],
    )?;
    Ok(())
}

pub fn get_temporal(conn: &Connection, domain: &str) -> AppResult<Option<SenderTemporal>> {
    let result = conn.query_row(
        "SELECT sender_domain, first_seen, last_seen, total_messages, avg_frequency_days, most_common_hour, most_common_weekday
         FROM sender_temporal WHERE sender_domain = ?1",
        params![domain],
        |row| {
            Ok(SenderTemporal {
                sender_domain: row.get(0)?,
                first_seen: row.get(1)?,
                last_seen: row.get(2)?,
                total_messages: row.get(3)?,
                avg_frequency_days: row.get(4)?,
                most_common_hour: row.get(5)?,
                most_common_weekday: row.get(6)?,
            })
        },
    );
    match result {
        Ok(v) => Ok(Some(v)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
