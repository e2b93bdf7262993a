use crate::domain::enums::{CompanySize, SenderIntent};
use crate::domain::AiClassification;
use crate::error::AppResult;
use rusqlite::{params, Connection, Row};
use std::str::FromStr;

fn row_to_classification(row: &Row) -> rusqlite::Result<AiClassification> {
    let size: String = row.get("company_size_estimate")?;
    let intent: String = row.get("sender_intent")?;
    let pain: String = row.get("pain_points")?;
    Ok(AiClassification {
        message_id: row.get("message_id")?,
        industry: row.get("industry")?,
        company_size_estimate: CompanySize::from_str(&size).unwrap(),
        marketing_sophistication: row.get("marketing_sophistication")?,
        sender_intent: SenderIntent::from_str(&intent).unwrap(),
        product_type: row.get("product_type")?,
        product_description: row.get("product_description")?,
        pain_points: serde_json::from_str(&pain).unwrap_or_default(),
        target_audience: row.get("target_audience")?,
        partner_program_detected: row.get("partner_program_detected")?,
        renewal_signal_detected: row.get("renewal_signal_detected")?,
        ai_confidence: row.get("ai_confidence")?,
        model_used: row.get("model_used")?,
        has_override: row.get("has_override")?,
    })
}

pub fn upsert(conn: &Connection, c: &AiClassification) -> AppResult<()> {
    conn.execute(
        "INSERT INTO ai_classifications (
            message_id, industry, company_size_estimate, marketing_sophistication,
            sender_intent, product_type, product_description, pain_points, target_audience,
            partner_program_detected, renewal_signal_detected, ai_confidence, model_used, has_override
        ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14)
        ON CONFLICT(message_id) DO UPDATE SET
            industry=excluded.industry, company_size_estimate=excluded.company_size_estimate,
            marketing_sophistication=excluded.marketing_sophistication,
            sender_intent=excluded.sender_intent, product_type=excluded.product_type,
            product_description=excluded.product_description, pain_points=excluded.pain_points,
            target_audience=excluded.target_audience,
            partner_program_detected=excluded.partner_program_detected,
            renewal_signal_detected=excluded.renewal_signal_detected,
            ai_confidence=excluded.ai_confidence, model_used=excluded.model_used,
            has_override=excluded.has_override",
        params![
            c.message_id,
            c.industry,
            c.company_size_estimate.as_str(),
            c.marketing_sophistication,
            c.sender_intent.as_str(),
            c.product_type,
            c.product_description,
            serde_json::to_string(&c.pain_points)?,
            c.target_audience,
            c.partner_program_detected,
            c.renewal_signal_detected,
            c.ai_confidence,
            c.model_used,
            c.has_override,
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, message_id: &str) -> AppResult<Option<AiClassification>> {
    let mut stmt = conn.prepare("SELECT * FROM ai_classifications WHERE message_id = ?1")?;
    let mut rows = stmt.query(params![message_id])?;
    if let Some(row) = rows.next()? {
        Ok(Some(row_to_classification(row)?))
    } else {
        Ok(None)
    }
}

pub fn list_for_domain_message_ids(
    conn: &Connection,
    message_ids: &[String],
) -> AppResult<Vec<AiClassification>> {
    let mut out = Vec::with_capacity(message_ids.len());
    for id in message_ids {
        if let Some(c) = get(conn, id)? {
            out.push(c);
        }
    }
    Ok(out)
}

pub fn ids_missing(conn: &Connection) -> AppResult<Vec<String>> {
    crate::store::message::ids_missing_from(conn, "ai_classifications")
}
