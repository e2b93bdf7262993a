//! Header / metadata extraction (§4.3). Consumes raw headers, produces one
//! `parsed_metadata` row per message, then rolls up `sender_temporal` per
//! domain.

use crate::domain::enums::EspConfidence;
use crate::domain::{Message, ParsedMetadata, SenderTemporal};
use crate::error::{AppError, AppResult};
use crate::pipeline::domain_root::{host_from_address, organizational_root};
use crate::pipeline::esp::{EspEvidence, EspRules};
use crate::services::Services;
use crate::store::Store;
use chrono::Datelike;
use chrono::Timelike;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

pub struct StageReport {
    pub items_processed: usize,
    pub errors: Vec<String>,
}

pub fn run(services: &Services, store: &Store) -> AppResult<StageReport> {
    let conn = store.conn.lock().unwrap();
    let missing = crate::store::message::ids_missing_from(&conn, "parsed_metadata")?;
    let mut processed = 0;
    let mut errors = Vec::new();
    let mut touched_domains = std::collections::HashSet::new();

    for id in &missing {
        let Some(msg) = crate::store::message::get(&conn, id)? else {
            continue;
        };
        match extract(&msg, &services.esp_rules) {
            Ok(parsed) => {
                touched_domains.insert(parsed.sender_domain.clone());
                crate::store::metadata::upsert(&conn, &parsed)?;
                processed += 1;
            }
            Err(e) => errors.push(format!("{id}: {e}")),
        }
    }

    for domain in &touched_domains {
        let temporal = compute_temporal(&conn, domain)?;
        crate::store::metadata::upsert_temporal(&conn, &temporal)?;
    }

    Ok(StageReport {
        items_processed: processed,
        errors,
    })
}

fn extract(msg: &Message, esp_rules: &EspRules) -> AppResult<ParsedMetadata> {
    let host = host_from_address(&msg.from_address)
        .ok_or_else(|| AppError::parse(format!("no host in from_address {}", msg.from_address)))?;
    let sender_domain = organizational_root(host);
    let sender_subdomain = host.to_string();

    let envelope_sender = header(&msg.raw_headers, "Return-Path")
        .or_else(|| header(&msg.raw_headers, "X-Envelope-From"));
    let dkim_domain = header(&msg.raw_headers, "DKIM-Signature").and_then(|v| extract_dkim_d(&v));

    let tracking_domains = extract_tracking_domains(msg);
    let evidence = EspEvidence {
        return_path: envelope_sender.as_deref(),
        dkim_domain: dkim_domain.as_deref(),
        sender_domain: &sender_domain,
        headers: &msg.raw_headers,
        tracking_domains: &tracking_domains,
        x_mailer: header_ref(&msg.raw_headers, "X-Mailer"),
    };
    let (esp_identified, esp_confidence) = esp_rules.identify(&evidence);

    let (spf_result, dmarc_result) = parse_authentication(&msg.raw_headers);
    let (mail_server, sending_ip) = parse_outermost_received(&msg.raw_headers);
    let x_mailer = header(&msg.raw_headers, "X-Mailer");
    let precedence = header(&msg.raw_headers, "Precedence");
    let feedback_id = header(&msg.raw_headers, "Feedback-ID");
    let (list_unsubscribe_url, list_unsubscribe_email) = parse_list_unsubscribe(&msg.raw_headers);

    let esp_is_marketing = esp_identified.is_some() && esp_identified.as_deref() != Some("custom_smtp");
    let is_bulk = precedence.as_deref() == Some("bulk")
        || list_unsubscribe_url.is_some()
        || list_unsubscribe_email.is_some()
        || esp_is_marketing;

    Ok(ParsedMetadata {
        message_id: msg.message_id.clone(),
        sender_domain,
        sender_subdomain,
        envelope_sender,
        esp_identified,
        esp_confidence: esp_confidence.map(|c| match c {
            EspConfidence::High => EspConfidence::High,
            EspConfidence::Medium => EspConfidence::Medium,
            EspConfidence::Low => EspConfidence::Low,
            other => other,
        }),
        dkim_domain,
        spf_result,
        dmarc_result,
        sending_ip,
        mail_server,
        x_mailer,
        precedence,
        feedback_id,
        list_unsubscribe_url,
        list_unsubscribe_email,
        is_bulk,
    })
}

fn header(headers: &HashMap<String, String>, name: &str) -> Option<String> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.clone())
}

fn header_ref<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

static DKIM_D_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bd=([a-z0-9.\-]+)").unwrap());

fn extract_dkim_d(value: &str) -> Option<String> {
    DKIM_D_RE.captures(value).map(|c| c[1].to_string())
}

static SPF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bspf=(\w+)").unwrap());
static DMARC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bdmarc=(\w+)").unwrap());

fn parse_authentication(headers: &HashMap<String, String>) -> (Option<String>, Option<String>) {
    let auth_results = header(headers, "Authentication-Results");
    let received_spf = header(headers, "Received-SPF");
    let spf = auth_results
        .as_deref()
        .and_then(|v| SPF_RE.captures(v))
        .map(|c| c[1].to_lowercase())
        .or_else(|| {
            received_spf
                .as_deref()
                .and_then(|v| v.split_whitespace().next())
                .map(|s| s.to_lowercase())
        });
    let dmarc = auth_results
        .as_deref()
        .and_then(|v| DMARC_RE.captures(v))
        .map(|c| c[1].to_lowercase());
    (spf, dmarc)
}

fn parse_outermost_received(headers: &HashMap<String, String>) -> (Option<String>, Option<String>) {
    let Some(received) = header(headers, "Received") else {
        return (None, None);
    };
    let ip_re = Regex::new(r"\[?(\d{1,3}(?:\.\d{1,3}){3})\]?").unwrap();
    let ip = ip_re.captures(&received).map(|c| c[1].to_string());
    let server_re = Regex::new(r"from\s+([a-zA-Z0-9.\-]+)").unwrap();
    let server = server_re.captures(&received).map(|c| c[1].to_string());
    (server, ip)
}

static UNSUB_URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<(https?://[^>]+)>").unwrap());
static UNSUB_MAILTO_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<mailto:([^>]+)>").unwrap());

fn parse_list_unsubscribe(headers: &HashMap<String, String>) -> (Option<String>, Option<String>) {
    let Some(value) = header(headers, "List-Unsubscribe") else {
        return (None, None);
    };
    let url = UNSUB_URL_RE.captures(&value).map(|c| c[1].to_string());
    let email = UNSUB_MAILTO_RE.captures(&value).map(|c| c[1].to_string());
    (url, email)
}

fn extract_tracking_domains(msg: &Message) -> Vec<String> {
    let body = msg.html_body.as_deref().unwrap_or("");
    let url_re = Regex::new(r#"https?://([a-zA-Z0-9.\-]+)"#).unwrap();
    url_re
        .captures_iter(body)
        .map(|c| c[1].to_string())
        .collect()
}

/// §4.3 temporal rollup: counts, span, mean gap between consecutive
/// messages, modal hour/weekday.
fn compute_temporal(conn: &rusqlite::Connection, domain: &str) -> AppResult<SenderTemporal> {
    let metas = crate::store::metadata::list_for_domain(conn, domain)?;
    let mut dates = Vec::new();
    for m in &metas {
        if let Some(msg) = crate::store::message::get(conn, &m.message_id)? {
            dates.push(msg.date);
        }
    }
    dates.sort();

    if dates.is_empty() {
        return Ok(SenderTemporal {
            sender_domain: domain.to_string(),
            ..Default::default()
        });
    }

    let first_seen = dates.first().copied();
    let last_seen = dates.last().copied();
    let total_messages = dates.len() as i64;

    let avg_frequency_days = if dates.len() >= 2 {
        let mut gaps = Vec::new();
        for w in dates.windows(2) {
            gaps.push((w[1] - w[0]).num_seconds() as f64 / 86400.0);
        }
        Some(gaps.iter().sum::<f64>() / gaps.len() as f64)
    } else {
        None
    };

    let mut hour_counts = [0i64; 24];
    let mut weekday_counts = [0i64; 7];
    for d in &dates {
        hour_counts[d.hour() as usize] += 1;
        weekday_counts[d.weekday().num_days_from_sunday() as usize] += 1;
    }
    let most_common_hour = hour_counts
        .iter()
        .enumerate()
        .max_by_key(|(_, c)| **c)
        .map(|(h, _)| h as u8);
    let most_common_weekday = weekday_counts
        .iter()
        .enumerate()
        .max_by_key(|(_, c)| **c)
        .map(|(w, _)| w as u8);

    Ok(SenderTemporal {
        sender_domain: domain.to_string(),
        first_seen,
        last_seen,
        total_messages,
        avg_frequency_days,
        most_common_hour,
        most_common_weekday,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    fn headers_with(pairs: &[(&str, &str)]) -> Map<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn make_msg(from: &str, headers: Map<String, String>) -> Message {
        Message {
            message_id: "m1".to_string(),
            thread_id: "t1".to_string(),
            date: chrono::Utc::now(),
            from_address: from.to_string(),
            from_name: None,
            to: vec![],
            cc: vec![],
            reply_to: None,
            subject: "Hi".to_string(),
            raw_headers: headers,
            html_body: None,
            text_body: Some("hello".to_string()),
            labels: vec![],
            size: 0,
            is_sent_by_user: false,
        }
    }

    #[test]
    fn normalizes_sender_domain_and_preserves_subdomain() {
        let rules = EspRules::load(None);
        let msg = make_msg("notify@notification.intuit.com", Map::new());
        let parsed = extract(&msg, &rules).unwrap();
        assert_eq!(parsed.sender_domain, "intuit.com");
        assert_eq!(parsed.sender_subdomain, "notification.intuit.com");
    }

    #[test]
    fn unknown_sender_with_matching_dkim_is_custom_smtp_low() {
        let rules = EspRules::load(None);
        let headers = headers_with(&[("DKIM-Signature", "v=1; d=acme.com; a=rsa-sha256")]);
        let msg = make_msg("hello@acme.com", headers);
        let parsed = extract(&msg, &rules).unwrap();
        assert_eq!(parsed.esp_identified.as_deref(), Some("custom_smtp"));
        assert_eq!(parsed.esp_confidence, Some(EspConfidence::Low));
    }

    #[test]
    fn bulk_flag_set_when_precedence_bulk() {
        let rules = EspRules::load(None);
        let headers = headers_with(&[("Precedence", "bulk")]);
        let msg = make_msg("hello@acme.com", headers);
        let parsed = extract(&msg, &rules).unwrap();
        assert!(parsed.is_bulk);
    }
}
