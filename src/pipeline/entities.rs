//! Entity extractor (§4.5). Per message, combines NER-sourced,
//! regex-sourced, and header-sourced entities into `extracted_entities`.

use crate::config::EntityExtractionConfig;
use crate::domain::enums::{ContactRelationship, EntitySource, EntityType};
use crate::domain::{ExtractedEntity, Message, ParsedContent};
use crate::error::AppResult;
use crate::services::Services;
use crate::store::Store;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;

pub struct StageReport {
    pub items_processed: usize,
    pub errors: Vec<String>,
}

pub async fn run(services: &Services, store: &Store) -> AppResult<StageReport> {
    let missing = {
        let conn = store.conn.lock().unwrap();
        crate::store::entity::ids_missing(&conn)?
    };
    let mut processed = 0;
    let mut errors = Vec::new();

    for id in &missing {
        let (msg, content, sender_domain) = {
            let conn = store.conn.lock().unwrap();
            let Some(msg) = crate::store::message::get(&conn, id)? else {
                continue;
            };
            let content = crate::store::content::get(&conn, id)?;
            let meta = crate::store::metadata::get(&conn, id)?;
            (msg, content, meta.map(|m| m.sender_domain))
        };

        let text_source = build_text_source(&msg, content.as_ref());
        let mut entities = match services.ner.tag(&text_source).await {
            Ok(spans) => spans
                .into_iter()
                .map(|s| ner_span_to_entity(id, &s, &text_source))
                .collect(),
            Err(e) => {
                errors.push(format!("{id}: ner tagger failed: {e}"));
                Vec::new()
            }
        };

        entities.extend(regex_entities(id, &text_source, &services.config.entity_extraction));
        entities.extend(header_entities(id, &msg));

        let sender_domain = sender_domain.unwrap_or_default();
        for e in entities.iter_mut() {
            if e.entity_type == EntityType::Person {
                e.context = Some(
                    classify_person_relationship(e, &msg, &sender_domain).as_str().to_string(),
                );
            }
        }

        let conn = store.conn.lock().unwrap();
        crate::store::entity::replace_for_message(&conn, id, &entities)?;
        processed += 1;
    }

    Ok(StageReport {
        items_processed: processed,
        errors,
    })
}

fn build_text_source(msg: &Message, content: Option<&ParsedContent>) -> String {
    let mut parts = vec![msg.subject.clone()];
    if let Some(c) = content {
        parts.push(c.body_clean.clone());
        if let Some(sig) = &c.signature_block {
            parts.push(sig.clone());
        }
    } else {
        parts.push(msg.preferred_body().to_string());
    }
    parts.join("\n")
}

fn ner_span_to_entity(message_id: &str, span: &crate::provider::ner::Span, text: &str) -> ExtractedEntity {
    let value = text.get(span.start..span.end).unwrap_or("").to_string();
    let entity_type = match span.label.as_str() {
        "PERSON" => EntityType::Person,
        "ORG" => EntityType::Organization,
        "DATE" => EntityType::Date,
        other => EntityType::Other(other.to_lowercase()),
    };
    let normalized = if entity_type == EntityType::Date {
        normalize_date(&value, context_window(text, span.start, span.end))
    } else {
        None
    };
    ExtractedEntity {
        id: 0,
        message_id: message_id.to_string(),
        entity_type,
        value,
        normalized,
        context: None,
        confidence: span.confidence,
        source: EntitySource::Spacy,
    }
}

static MONEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\$\s?\d[\d,]*(?:\.\d+)?(?:k|m)?|\d[\d,]*(?:\.\d+)?\s?(?:usd|dollars)|\d+\s?/\s?mo\b|\d+%\s*(?:off|discount))").unwrap()
});
static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\+?\d[\d\-.\s()]{8,}\d").unwrap());
static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").unwrap());
static ROLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(CEO|CTO|CFO|COO|VP|Vice President|Director|Head of [A-Za-z ]+|Founder|Co-Founder|President|Manager)\b").unwrap()
});

static PROCUREMENT_ACTIVE_BUYING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(evaluating vendors|comparing (solutions|providers)|shortlist|budget approved)\b").unwrap()
});
static PROCUREMENT_CONTRACT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(msa|master service agreement|statement of work|sow|contract (review|negotiation))\b").unwrap()
});
static PROCUREMENT_SECURITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(security review|soc ?2|vendor questionnaire|infosec assessment|penetration test report)\b").unwrap()
});

fn regex_entities(message_id: &str, text: &str, cfg: &EntityExtractionConfig) -> Vec<ExtractedEntity> {
    let mut out = Vec::new();

    if cfg.extract_monetary {
        for m in MONEY_RE.find_iter(text) {
            out.push(simple_entity(message_id, EntityType::Money, m.as_str(), None));
        }
    }

    for m in PHONE_RE.find_iter(text) {
        out.push(simple_entity(message_id, EntityType::Phone, m.as_str(), None));
    }
    for m in URL_RE.find_iter(text) {
        out.push(simple_entity(message_id, EntityType::Url, m.as_str(), None));
    }
    for m in ROLE_RE.find_iter(text) {
        out.push(simple_entity(message_id, EntityType::Role, m.as_str(), None));
    }

    if cfg.extract_dates {
        out.extend(date_entities(message_id, text));
    }

    if cfg.extract_procurement {
        for m in PROCUREMENT_ACTIVE_BUYING_RE.find_iter(text) {
            out.push(simple_entity(message_id, EntityType::ProcurementSignal, m.as_str(), Some("active_buying".to_string())));
        }
        for m in PROCUREMENT_CONTRACT_RE.find_iter(text) {
            out.push(simple_entity(message_id, EntityType::ProcurementSignal, m.as_str(), Some("contract_activity".to_string())));
        }
        for m in PROCUREMENT_SECURITY_RE.find_iter(text) {
            out.push(simple_entity(message_id, EntityType::ProcurementSignal, m.as_str(), Some("security_review".to_string())));
        }
    }

    out
}

static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2},?\s+\d{4}\b|\b\d{4}-\d{2}-\d{2}\b").unwrap()
});

fn date_entities(message_id: &str, text: &str) -> Vec<ExtractedEntity> {
    DATE_RE
        .find_iter(text)
        .map(|m| {
            let normalized = normalize_date(m.as_str(), context_window(text, m.start(), m.end()));
            ExtractedEntity {
                id: 0,
                message_id: message_id.to_string(),
                entity_type: EntityType::Date,
                value: m.as_str().to_string(),
                normalized,
                context: None,
                confidence: 0.8,
                source: EntitySource::Regex,
            }
        })
        .collect()
}

/// §4.5 context window (chars, not message text) around a date match, used
/// to decide whether it's actually a renewal/contract date rather than an
/// unrelated future date (conference, shipping ETA, ...).
fn context_window(text: &str, start: usize, end: usize) -> &str {
    let window_start = text[..start].char_indices().rev().nth(60).map(|(i, _)| i).unwrap_or(0);
    let window_end = text[end..]
        .char_indices()
        .nth(60)
        .map(|(i, _)| end + i)
        .unwrap_or(text.len());
    &text[window_start..window_end]
}

static RENEWAL_CONTEXT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(renew(?:al|s|ing)?|expir(?:e|es|ation)|contract|subscription|term (?:ends|expires)|auto-?renew)\b").unwrap()
});

/// §4.5 "Date is-future": bucket is `renewal` only when the text around the
/// match actually mentions a renewal/contract/expiration, else `general` —
/// a future-dated mention of a conference or shipping ETA is not a renewal.
fn normalize_date(value: &str, context: &str) -> Option<String> {
    let parsed = dateparse(value)?;
    let bucket = if RENEWAL_CONTEXT_RE.is_match(context) { "renewal" } else { "general" };
    if parsed > Utc::now() {
        Some(format!("{bucket}:future"))
    } else {
        Some(format!("{bucket}:past"))
    }
}

/// Parses a raw date-entity value back into a `DateTime`, for stages that
/// need the actual instant rather than the coarse future/past bucket.
pub fn normalize_date_value(value: &str) -> Option<chrono::DateTime<Utc>> {
    dateparse(value)
}

fn dateparse(value: &str) -> Option<chrono::DateTime<Utc>> {
    if let Ok(d) = chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(d.and_hms_opt(0, 0, 0)?.and_utc());
    }
    let cleaned = value.replace(',', "");
    chrono::NaiveDate::parse_from_str(&cleaned, "%B %d %Y")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn simple_entity(message_id: &str, entity_type: EntityType, value: &str, normalized: Option<String>) -> ExtractedEntity {
    ExtractedEntity {
        id: 0,
        message_id: message_id.to_string(),
        entity_type,
        value: value.to_string(),
        normalized,
        context: None,
        confidence: 0.9,
        source: EntitySource::Regex,
    }
}

const ROLE_LIKE_LOCALS: &[&str] = &["noreply", "no-reply", "support", "info", "hello", "team", "sales", "billing", "notifications"];

fn is_role_like(address: &str) -> bool {
    address
        .split('@')
        .next()
        .map(|local| ROLE_LIKE_LOCALS.iter().any(|r| local.to_lowercase().contains(r)))
        .unwrap_or(false)
}

/// §4.5 header-sourced entities: CC addresses as person entities, confidence 0.6.
fn header_entities(message_id: &str, msg: &Message) -> Vec<ExtractedEntity> {
    msg.cc
        .iter()
        .map(|addr| ExtractedEntity {
            id: 0,
            message_id: message_id.to_string(),
            entity_type: EntityType::Person,
            value: addr.clone(),
            normalized: None,
            context: None,
            confidence: 0.6,
            source: EntitySource::Header,
        })
        .collect()
}

/// §4.5 person-relationship classification.
fn classify_person_relationship(entity: &ExtractedEntity, msg: &Message, sender_domain: &str) -> ContactRelationship {
    if SENIOR_TITLE_RE.is_match(&entity.value) {
        return ContactRelationship::DecisionMaker;
    }
    if entity.source == EntitySource::Header && is_role_like(&entity.value) {
        return ContactRelationship::Automated;
    }
    let address_matches_sender = entity.value.eq_ignore_ascii_case(&msg.from_address)
        || entity
            .value
            .split('@')
            .nth(1)
            .map(|d| d.eq_ignore_ascii_case(sender_domain))
            .unwrap_or(false);
    if address_matches_sender || is_role_like(&entity.value) {
        return ContactRelationship::VendorContact;
    }
    ContactRelationship::Peer
}

static SENIOR_TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(CEO|CTO|CFO|COO|VP|Vice President|Founder|Co-Founder|President|Director)\b").unwrap());

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_regex_matches_saas_shorthand_and_dollar_amount() {
        let cfg = EntityExtractionConfig {
            spacy_model: "x".into(),
            extract_monetary: true,
            extract_dates: false,
            extract_procurement: false,
        };
        let entities = regex_entities("m1", "Our plan is $99/mo or 20% off annually.", &cfg);
        assert!(entities.iter().any(|e| e.entity_type == EntityType::Money));
    }

    #[test]
    fn procurement_toggle_off_suppresses_branch() {
        let cfg = EntityExtractionConfig {
            spacy_model: "x".into(),
            extract_monetary: false,
            extract_dates: false,
            extract_procurement: false,
        };
        let entities = regex_entities("m1", "We are currently in a security review and SOC 2 audit.", &cfg);
        assert!(entities.iter().all(|e| e.entity_type != EntityType::ProcurementSignal));
    }

    #[test]
    fn future_date_near_renewal_language_is_bucketed_renewal() {
        let future = (Utc::now() + chrono::Duration::days(400)).format("%Y-%m-%d").to_string();
        let normalized = normalize_date(&future, "Your contract auto-renews on this date").unwrap();
        assert_eq!(normalized, "renewal:future");
    }

    #[test]
    fn future_date_with_no_renewal_language_is_bucketed_general() {
        let future = (Utc::now() + chrono::Duration::days(400)).format("%Y-%m-%d").to_string();
        let normalized = normalize_date(&future, "See you at the conference keynote").unwrap();
        assert_eq!(normalized, "general:future");
    }

    #[test]
    fn role_like_cc_address_classifies_as_automated() {
        let entity = ExtractedEntity {
            id: 0,
            message_id: "m1".into(),
            entity_type: EntityType::Person,
            value: "noreply@acme.com".into(),
            normalized: None,
            context: None,
            confidence: 0.6,
            source: EntitySource::Header,
        };
        let msg = Message {
            message_id: "m1".into(),
            thread_id: "t1".into(),
            date: Utc::now(),
            from_address: "sales@acme.com".into(),
            from_name: None,
            to: vec![],
            cc: vec![],
            reply_to: None,
            subject: "Hi".into(),
            raw_headers: Default::default(),
            html_body: None,
            text_body: Some("hi".into()),
            labels: vec![],
            size: 0,
            is_sent_by_user: false,
        };
        assert_eq!(classify_person_relationship(&entity, &msg, "acme.com"), ContactRelationship::Automated);
    }
}
