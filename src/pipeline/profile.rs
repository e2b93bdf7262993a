//! Profiler (§4.7.1-4.7.3). Aggregates every signal gathered so far into one
//! `SenderProfile` row per domain, computes the deterministic sophistication
//! score, thread metrics, and classifies the domain's relationship type.

use crate::domain::enums::{CompanySize, ContactRelationship, RelationshipType};
use crate::domain::profile::RelationshipSource;
use crate::domain::{ExtractedEntity, KnownContact, SenderProfile, SenderRelationship};
use crate::error::AppResult;
use crate::pipeline::entities::normalize_date_value;
use crate::pipeline::esp::EspRules;
use crate::services::Services;
use crate::store::Store;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

pub struct StageReport {
    pub domains_processed: usize,
}

pub fn run(services: &Services, store: &Store) -> AppResult<StageReport> {
    let conn = store.conn.lock().unwrap();
    let domains = crate::store::metadata::distinct_domains(&conn)?;
    let mut processed = 0;

    for domain in &domains {
        let profile = build_profile(&conn, domain)?;
        crate::store::profile::upsert(&conn, &profile)?;

        let relationship = classify_relationship(&conn, services, domain, &profile)?;
        crate::store::relationship::upsert(&conn, &relationship)?;
        processed += 1;
    }

    Ok(StageReport {
        domains_processed: processed,
    })
}

fn build_profile(conn: &rusqlite::Connection, domain: &str) -> AppResult<SenderProfile> {
    let metas = crate::store::metadata::list_for_domain(conn, domain)?;
    let message_ids: Vec<String> = metas.iter().map(|m| m.message_id.clone()).collect();

    let mut messages = Vec::new();
    for id in &message_ids {
        if let Some(m) = crate::store::message::get(conn, id)? {
            messages.push(m);
        }
    }

    let contents = crate::store::content::list_for_domain(conn, &message_ids)?;
    let classifications = crate::store::classification::list_for_domain_message_ids(conn, &message_ids)?;
    let entities = crate::store::entity::list_for_messages(conn, &message_ids)?;
    let temporal = crate::store::metadata::get_temporal(conn, domain)?;

    let mut profile = SenderProfile::empty(domain);
    profile.total_messages = messages.len() as i64;

    // Majority vote: industry, company size, product type (§4.7.1).
    profile.industry = majority_vote(classifications.iter().map(|c| c.industry.clone()).filter(|s| !s.is_empty()));
    profile.company_size = majority_vote(
        classifications
            .iter()
            .map(|c| c.company_size_estimate.as_str().to_string()),
    )
    .map(|s| CompanySize::from_str(&s).unwrap());
    profile.product_type =
        majority_vote(classifications.iter().map(|c| c.product_type.clone()).filter(|s| !s.is_empty()));

    // Most-recent non-empty: product description, target audience.
    profile.product_description = classifications
        .last()
        .map(|c| c.product_description.clone())
        .filter(|s| !s.is_empty());
    profile.target_audience = classifications
        .last()
        .map(|c| c.target_audience.clone())
        .filter(|s| !s.is_empty());

    profile.has_partner_program = classifications.iter().any(|c| c.partner_program_detected)
        || contents.iter().any(|c| c.link_intents.contains_key("partner_program"));

    profile.partner_program_urls = contents
        .iter()
        .filter_map(|c| c.link_intents.get("partner_program"))
        .flatten()
        .cloned()
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    profile.pain_points = classifications
        .iter()
        .flat_map(|c| c.pain_points.iter().cloned())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    // Distributions and content rollups.
    for c in &contents {
        for offer in &c.offer_types {
            *profile.offer_type_distribution.entry(offer.clone()).or_insert(0) += 1;
        }
        profile.cta_texts_all.extend(c.cta_texts.iter().cloned());
        profile.utm_campaign_names.extend(c.utm_campaigns.iter().cloned());
        if c.physical_address.is_some() {
            profile.physical_address = c.physical_address.clone();
        }
        for (k, v) in &c.social_links {
            profile.social_links.insert(k.clone(), v.clone());
        }
        if c.has_personalization {
            profile.has_personalization = true;
        }
    }

    profile.monetary_signals = entities
        .iter()
        .filter(|e| e.entity_type == crate::domain::enums::EntityType::Money)
        .map(|e| e.value.clone())
        .collect();

    for e in &entities {
        if e.entity_type == crate::domain::enums::EntityType::Date {
            if let Some(norm) = &e.normalized {
                if norm == "renewal:future" {
                    if let Some(dt) = normalize_date_value(&e.value) {
                        profile.renewal_dates.push(dt);
                    }
                }
            }
        }
    }

    // Known contacts: collapse person entities by email, priority rank
    // decision_maker > peer > vendor_contact > automated.
    profile.known_contacts = collapse_contacts(&entities);

    // Temporal.
    if let Some(t) = &temporal {
        profile.first_contact = Some(t.first_seen);
        profile.last_contact = Some(t.last_seen);
        profile.avg_frequency_days = t.avg_frequency_days;
    }

    // ESP used: the identified ESP on the most recent message, if any.
    profile.esp_used = metas.last().and_then(|m| m.esp_identified.clone());

    let auth_is_strong = metas.iter().any(|m| {
        m.spf_result.as_deref() == Some("pass")
            && m.dmarc_result.as_deref() == Some("pass")
            && m.dkim_domain.is_some()
    });
    profile.authentication_quality = if auth_is_strong {
        Some("strong".to_string())
    } else {
        None
    };
    profile.unsubscribe_url = metas.iter().find_map(|m| m.list_unsubscribe_url.clone());

    // Thread metrics (§4.7.2).
    let thread_ids: HashSet<String> = messages.iter().map(|m| m.thread_id.clone()).collect();
    let mut threads = Vec::new();
    for tid in &thread_ids {
        if let Some(t) = crate::store::thread::get(conn, tid)? {
            threads.push(t);
        }
    }
    if !threads.is_empty() {
        let initiated_by_user = threads
            .iter()
            .filter(|t| {
                messages
                    .iter()
                    .filter(|m| m.thread_id == t.thread_id)
                    .min_by_key(|m| m.date)
                    .map(|m| m.is_sent_by_user)
                    .unwrap_or(false)
            })
            .count();
        profile.thread_initiation_ratio = initiated_by_user as f64 / threads.len() as f64;
        let replied = threads.iter().filter(|t| t.user_participated).count();
        profile.user_reply_rate = replied as f64 / threads.len() as f64;
    }

    // Deterministic sophistication score (§4.7.1), blended with the AI average.
    let ai_avg = if classifications.is_empty() {
        None
    } else {
        Some(
            classifications.iter().map(|c| c.marketing_sophistication as f64).sum::<f64>()
                / classifications.len() as f64,
        )
    };
    let deterministic = deterministic_sophistication(&profile, &metas);
    profile.sophistication_trend = classifications.iter().map(|c| c.marketing_sophistication as f64).collect();
    profile.marketing_sophistication_avg = match ai_avg {
        Some(avg) => 0.6 * deterministic as f64 + 0.4 * avg,
        None => deterministic as f64,
    };

    Ok(profile)
}

fn majority_vote(values: impl Iterator<Item = String>) -> Option<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    counts.into_iter().max_by_key(|(_, c)| *c).map(|(v, _)| v)
}

/// §4.7.1 contact priority rank: decision_maker > peer > vendor_contact > automated.
fn contact_priority(rel: &ContactRelationship) -> u8 {
    match rel {
        ContactRelationship::DecisionMaker => 3,
        ContactRelationship::Peer => 2,
        ContactRelationship::VendorContact => 1,
        ContactRelationship::Automated => 0,
        ContactRelationship::Other(_) => 0,
    }
}

fn collapse_contacts(entities: &[ExtractedEntity]) -> Vec<KnownContact> {
    let mut by_email: HashMap<String, (Option<String>, u8)> = HashMap::new();
    for e in entities {
        if e.entity_type != crate::domain::enums::EntityType::Person {
            continue;
        }
        let rel = e
            .context
            .as_deref()
            .map(|c| ContactRelationship::from_str(c).unwrap())
            .unwrap_or(ContactRelationship::Peer);
        let rank = contact_priority(&rel);
        let entry = by_email.entry(e.value.clone()).or_insert((None, 0));
        if rank >= entry.1 {
            entry.0 = Some(rel.as_str().to_string());
            entry.1 = rank;
        }
    }
    by_email
        .into_iter()
        .map(|(email, (role, rank))| KnownContact {
            name: email.split('@').next().unwrap_or(&email).to_string(),
            role,
            email,
            priority_rank: rank,
        })
        .collect()
}

fn deterministic_sophistication(profile: &SenderProfile, metas: &[crate::domain::ParsedMetadata]) -> u8 {
    let mut score: i32 = match profile.esp_used.as_deref() {
        Some(name) => EspRules::tier(name) as i32,
        None => 1,
    };
    if profile.has_personalization {
        score += 2;
    }
    if !profile.utm_campaign_names.is_empty() {
        score += 1;
    }
    if profile.utm_campaign_names.len() >= 3 {
        score += 1;
    }
    if metas.iter().any(|m| {
        m.spf_result.as_deref() == Some("pass") && m.dmarc_result.as_deref() == Some("pass") && m.dkim_domain.is_some()
    }) {
        score += 1;
    }
    if profile.unsubscribe_url.is_some() {
        score += 1;
    }
    score.clamp(1, 10) as u8
}

/// §6.1 `relationships --auto-detect`: recomputes what every domain's
/// relationship would be classified as right now, without persisting.
/// Shares `classify_relationship`'s manual-override precedence so a domain
/// that's been set manually is reported as unchanged rather than overwritten.
pub fn auto_detect_relationships(
    conn: &rusqlite::Connection,
    services: &Services,
) -> AppResult<Vec<SenderRelationship>> {
    let mut out = Vec::new();
    for profile in crate::store::profile::list_all(conn)? {
        out.push(classify_relationship(conn, services, &profile.sender_domain, &profile)?);
    }
    Ok(out)
}

/// §4.7.3 relationship classifier: manual override wins, then known-entity
/// list match, then signal-weighted scoring, else `unknown`.
fn classify_relationship(
    conn: &rusqlite::Connection,
    services: &Services,
    domain: &str,
    profile: &SenderProfile,
) -> AppResult<SenderRelationship> {
    if let Some(existing) = crate::store::relationship::get(conn, domain)? {
        if matches!(existing.source, RelationshipSource::Manual) {
            return Ok(existing);
        }
    }

    if services.known_entities.infrastructure.contains(domain) {
        return Ok(auto(domain, RelationshipType::MyInfrastructure));
    }
    if services.known_entities.institutional.contains(domain) {
        return Ok(auto(domain, RelationshipType::Institutional));
    }

    let rtype = signal_weighted_classify(profile);
    Ok(auto(domain, rtype))
}

fn auto(domain: &str, relationship_type: RelationshipType) -> SenderRelationship {
    SenderRelationship {
        sender_domain: domain.to_string(),
        relationship_type,
        note: None,
        suppress_gems: false,
        source: RelationshipSource::AutoDetected,
    }
}

/// Recurring invoice/subscription-receipt language: the "renewal" offer
/// bucket (§4.4 `detect_offer_types`) plus at least one monetary signal,
/// the pattern a billing/subscription vendor's messages show.
fn recurring_billing_signal(profile: &SenderProfile) -> bool {
    profile.offer_type_distribution.get("renewal").copied().unwrap_or(0) > 0
        && !profile.monetary_signals.is_empty()
}

fn signal_weighted_classify(profile: &SenderProfile) -> RelationshipType {
    if profile.thread_initiation_ratio > 0.5 {
        return if recurring_billing_signal(profile) {
            RelationshipType::MyVendor
        } else {
            RelationshipType::MyServiceProvider
        };
    }
    if profile.thread_initiation_ratio < 0.3 && profile.total_messages <= 5 {
        return RelationshipType::InboundProspect;
    }
    if profile.total_messages > 5 && profile.user_reply_rate == 0.0 {
        return RelationshipType::SellingToMe;
    }
    RelationshipType::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_initiation_ratio_is_customer_side() {
        let mut profile = SenderProfile::empty("acme.com");
        profile.thread_initiation_ratio = 0.8;
        assert_eq!(signal_weighted_classify(&profile), RelationshipType::MyServiceProvider);
    }

    #[test]
    fn recurring_billing_signals_are_my_vendor() {
        let mut profile = SenderProfile::empty("billing.example.com");
        profile.thread_initiation_ratio = 0.8;
        profile.offer_type_distribution.insert("renewal".to_string(), 2);
        profile.monetary_signals.push("$49.99".to_string());
        assert_eq!(signal_weighted_classify(&profile), RelationshipType::MyVendor);
    }

    #[test]
    fn low_initiation_few_messages_is_inbound_prospect() {
        let mut profile = SenderProfile::empty("acme.com");
        profile.thread_initiation_ratio = 0.1;
        profile.total_messages = 2;
        assert_eq!(signal_weighted_classify(&profile), RelationshipType::InboundProspect);
    }

    #[test]
    fn high_volume_zero_replies_is_selling_to_me() {
        let mut profile = SenderProfile::empty("acme.com");
        profile.thread_initiation_ratio = 0.4;
        profile.total_messages = 20;
        profile.user_reply_rate = 0.0;
        assert_eq!(signal_weighted_classify(&profile), RelationshipType::SellingToMe);
    }

    #[test]
    fn contact_rank_prefers_decision_maker_over_peer() {
        assert!(contact_priority(&ContactRelationship::DecisionMaker) > contact_priority(&ContactRelationship::Peer));
    }
}
