use crate::domain::enums::CompanySize;
use crate::domain::SenderProfile;
use crate::error::AppResult;
use rusqlite::{params, Connection, Row};
use std::str::FromStr;

fn row_to_profile(row: &Row) -> rusqlite::Result<SenderProfile> {
    let size: Option<String> = row.get("company_size")?;
    let trend: String = row.get("sophistication_trend")?;
    let pain: String = row.get("pain_points")?;
    let contacts: String = row.get("known_contacts")?;
    let offer_dist: String = row.get("offer_type_distribution")?;
    let cta: String = row.get("cta_texts_all")?;
    let social: String = row.get("social_links")?;
    let utms: String = row.get("utm_campaign_names")?;
    let urls: String = row.get("partner_program_urls")?;
    let renewals: String = row.get("renewal_dates")?;
    let monetary: String = row.get("monetary_signals")?;
    let segments: String = row.get("economic_segments")?;
    Ok(SenderProfile {
        sender_domain: row.get("sender_domain")?,
        company_name: row.get("company_name")?,
        primary_email: row.get("primary_email")?,
        reply_to_email: row.get("reply_to_email")?,
        industry: row.get("industry")?,
        company_size: size.map(|s| CompanySize::from_str(&s).unwrap()),
        marketing_sophistication_avg: row.get("marketing_sophistication_avg")?,
        sophistication_trend: serde_json::from_str(&trend).unwrap_or_default(),
        esp_used: row.get("esp_used")?,
        product_type: row.get("product_type")?,
        product_description: row.get("product_description")?,
        pain_points: serde_json::from_str(&pain).unwrap_or_default(),
        target_audience: row.get("target_audience")?,
        known_contacts: serde_json::from_str(&contacts).unwrap_or_default(),
        total_messages: row.get("total_messages")?,
        first_contact: row.get("first_contact")?,
        last_contact: row.get("last_contact")?,
        avg_frequency_days: row.get("avg_frequency_days")?,
        offer_type_distribution: serde_json::from_str(&offer_dist).unwrap_or_default(),
        cta_texts_all: serde_json::from_str(&cta).unwrap_or_default(),
        social_links: serde_json::from_str(&social).unwrap_or_default(),
        physical_address: row.get("physical_address")?,
        utm_campaign_names: serde_json::from_str(&utms).unwrap_or_default(),
        has_personalization: row.get("has_personalization")?,
        has_partner_program: row.get("has_partner_program")?,
        partner_program_urls: serde_json::from_str(&urls).unwrap_or_default(),
        renewal_dates: serde_json::from_str(&renewals).unwrap_or_default(),
        monetary_signals: serde_json::from_str(&monetary).unwrap_or_default(),
        authentication_quality: row.get("authentication_quality")?,
        unsubscribe_url: row.get("unsubscribe_url")?,
        economic_segments: serde_json::from_str(&segments).unwrap_or_default(),
        thread_initiation_ratio: row.get("thread_initiation_ratio")?,
        user_reply_rate: row.get("user_reply_rate")?,
    })
}

pub fn upsert(conn: &Connection, p: &SenderProfile) -> AppResult<()> {
    conn.execute(
        "INSERT INTO sender_profiles (
            sender_domain, company_name, primary_email, reply_to_email, industry, company_size,
            marketing_sophistication_avg, sophistication_trend, esp_used, product_type,
            product_description, pain_points, target_audience, known_contacts, total_messages,
            first_contact, last_contact, avg_frequency_days, offer_type_distribution,
            cta_texts_all, social_links, physical_address, utm_campaign_names,
            has_personalization, has_partner_program, partner_program_urls, renewal_dates,
            monetary_signals, authentication_quality, unsubscribe_url, economic_segments,
            thread_initiation_ratio, user_reply_rate
        ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21,?22,
                   ?23,?24,?25,?26,?27,?28,?29,?30,?31,?32,?33)
        ON CONFLICT(sender_domain) DO UPDATE SET
            company_name=excluded.company_name, primary_email=excluded.primary_email,
            reply_to_email=excluded.reply_to_email, industry=excluded.industry,
            company_size=excluded.company_size,
            marketing_sophistication_avg=excluded.marketing_sophistication_avg,
            sophistication_trend=excluded.sophistication_trend, esp_used=excluded.esp_used,
            product_type=excluded.product_type, product_description=excluded.product_description,
            pain_points=excluded.pain_points, target_audience=excluded.target_audience,
            known_contacts=excluded.known_contacts, total_messages=excluded.total_messages,
            first_contact=excluded.first_contact, last_contact=excluded.last_contact,
            avg_frequency_days=excluded.avg_frequency_days,
            offer_type_distribution=excluded.offer_type_distribution,
            cta_texts_all=excluded.cta_texts_all, social_links=excluded.social_links,
            physical_address=excluded.physical_address,
            utm_campaign_names=excluded.utm_campaign_names,
            has_personalization=excluded.has_personalization,
            has_partner_program=excluded.has_partner_program,
            partner_program_urls=excluded.partner_program_urls,
            renewal_dates=excluded.renewal_dates, monetary_signals=excluded.monetary_signals,
            authentication_quality=excluded.authentication_quality,
            unsubscribe_url=excluded.unsubscribe_url, economic_segments=excluded.economic_segments,
            thread_initiation_ratio=excluded.thread_initiation_ratio,
            user_reply_rate=excluded.user_reply_rate",
        params![
            p.sender_domain,
            p.company_name,
            p.primary_email,
            p.reply_to_email,
            p.industry,
            p.company_size.as_ref().map(|c| c.as_str()),
            p.marketing_sophistication_avg,
            serde_json::to_string(&p.sophistication_trend)?,
            p.esp_used,
            p.product_type,
            p.product_description,
            serde_json::to_string(&p.pain_points)?,
            p.target_audience,
            serde_json::to_string(&p.known_contacts)?,
            p.total_messages,
            p.first_contact,
            p.last_contact,
            p.avg_frequency_days,
            serde_json::to_string(&p.offer_type_distribution)?,
            serde_json::to_string(&p.cta_texts_all)?,
            serde_json::to_string(&p.social_links)?,
            p.physical_address,
            serde_json::to_string(&p.utm_campaign_names)?,
            p.has_personalization,
            p.has_partner_program,
            serde_json::to_string(&p.partner_program_urls)?,
            serde_json::to_string(&p.renewal_dates)?,
            serde_json::to_string(&p.monetary_signals)?,
            p.authentication_quality,
            p.unsubscribe_url,
            serde_json::to_string(&p.economic_segments)?,
            p.thread_initiation_ratio,
            p.user_reply_rate,
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, domain: &str) -> AppResult<Option<SenderProfile>> {
    let mut stmt = conn.prepare("SELECT * FROM sender_profiles WHERE sender_domain = ?1")?;
    let mut rows = stmt.query(params![domain])?;
    if let Some(row) = rows.next()? {
        Ok(Some(row_to_profile(row)?))
    } else {
        Ok(None)
    }
}

pub fn list_all(conn: &Connection) -> AppResult<Vec<SenderProfile>> {
    let mut stmt = conn.prepare("SELECT * FROM sender_profiles ORDER BY sender_domain ASC")?;
    let rows = stmt
        .query_map([], row_to_profile)?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

/// `stats --by-industry`: domain counts grouped by classified industry,
/// unclassified domains rolled into `None`.
pub fn stats_by_industry(conn: &Connection) -> AppResult<Vec<(Option<String>, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT industry, COUNT(*) FROM sender_profiles GROUP BY industry ORDER BY 2 DESC",
    )?;
    let rows = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

pub fn count_by_industry(conn: &Connection, industry: &str) -> AppResult<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM sender_profiles WHERE industry = ?1",
        params![industry],
        |r| r.get(0),
    )
    .map_err(Into::into)
}
