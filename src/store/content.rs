use crate::domain::ParsedContent;
use crate::error::AppResult;
use rusqlite::{params, Connection, Row};

fn row_to_content(row: &Row) -> rusqlite::Result<ParsedContent> {
    let cta: String = row.get("cta_texts")?;
    let offer: String = row.get("offer_types")?;
    let tokens: String = row.get("personalization_tokens")?;
    let domains: String = row.get("unique_link_domains")?;
    let intents: String = row.get("link_intents")?;
    let utms: String = row.get("utm_campaigns")?;
    let social: String = row.get("social_links")?;
    Ok(ParsedContent {
        message_id: row.get("message_id")?,
        body_clean: row.get("body_clean")?,
        signature_block: row.get("signature_block")?,
        primary_headline: row.get("primary_headline")?,
        cta_texts: serde_json::from_str(&cta).unwrap_or_default(),
        offer_types: serde_json::from_str(&offer).unwrap_or_default(),
        has_personalization: row.get("has_personalization")?,
        personalization_tokens: serde_json::from_str(&tokens).unwrap_or_default(),
        link_count: row.get("link_count")?,
        tracking_pixel_count: row.get("tracking_pixel_count")?,
        unique_link_domains: serde_json::from_str(&domains).unwrap_or_default(),
        link_intents: serde_json::from_str(&intents).unwrap_or_default(),
        utm_campaigns: serde_json::from_str(&utms).unwrap_or_default(),
        physical_address: row.get("physical_address")?,
        social_links: serde_json::from_str(&social).unwrap_or_default(),
        image_count: row.get("image_count")?,
        template_complexity_score: row.get("template_complexity_score")?,
    })
}

pub fn upsert(conn: &Connection, c: &ParsedContent) -> AppResult<()> {
    conn.execute(
        "INSERT INTO parsed_content (
            message_id, body_clean, signature_block, primary_headline, cta_texts,
            offer_types, has_personalization, personalization_tokens, link_count,
            tracking_pixel_count, unique_link_domains, link_intents, utm_campaigns,
            physical_address, social_links, image_count, template_complexity_score
        ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17)
        ON CONFLICT(message_id) DO UPDATE SET
            body_clean=excluded.body_clean, signature_block=excluded.signature_block,
            primary_headline=excluded.primary_headline, cta_texts=excluded.cta_texts,
            offer_types=excluded.offer_types, has_personalization=excluded.has_personalization,
            personalization_tokens=excluded.personalization_tokens, link_count=excluded.link_count,
            tracking_pixel_count=excluded.tracking_pixel_count,
            unique_link_domains=excluded.unique_link_domains, link_intents=excluded.link_intents,
            utm_campaigns=excluded.utm_campaigns, physical_address=excluded.physical_address,
            social_links=excluded.social_links, image_count=excluded.image_count,
            template_complexity_score=excluded.template_complexity_score",
        params![
            c.message_id,
            c.body_clean,
            c.signature_block,
            c.primary_headline,
            serde_json::to_string(&c.cta_texts)?,
            serde_json::to_string(&c.offer_types)?,
            c.has_personalization,
            serde_json::to_string(&c.personalization_tokens)?,
            c.link_count,
            c.tracking_pixel_count,
            serde_json::to_string(&c.unique_link_domains)?,
            serde_json::to_string(&c.link_intents)?,
            serde_json::to_string(&c.utm_campaigns)?,
            c.physical_address,
            serde_json::to_string(&c.social_links)?,
            c.image_count,
            c.template_complexity_score,
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, message_id: &str) -> AppResult<Option<ParsedContent>> {
    let mut stmt = conn.prepare("SELECT * FROM parsed_content WHERE message_id = ?1")?;
    let mut rows = stmt.query(params![message_id])?;
    if let Some(row) = rows.next()? {
        Ok(Some(row_to_content(row)?))
    } else {
        Ok(None)
    }
}

pub fn list_for_domain(conn: &Connection, message_ids: &[String]) -> AppResult<Vec<ParsedContent>> {
    let mut out = Vec::with_capacity(message_ids.len());
    for id in message_ids {
        if let Some(c) = get(conn, id)? {
            out.push(c);
        }
    }
    Ok(out)
}
