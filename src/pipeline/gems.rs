//! Gem detector (§4.7.4). Runs one rule per `GemType` over every sender
//! domain's profile, threads, and messages, gated first by an eligibility
//! matrix keyed on the domain's classified `RelationshipType`.

use crate::domain::enums::{EntityType, EstimatedValue, GemType, RelationshipType, Urgency};
use crate::domain::{Gem, GemExplanation, GemSignal, SenderProfile};
use crate::error::AppResult;
use crate::services::Services;
use crate::store::Store;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

pub struct StageReport {
    pub gems_detected: usize,
}

/// §4.7.4 eligibility matrix: which relationship types a gem type may fire
/// for. `VendorUpsell` is retired and intentionally absent — never emitted.
fn eligible(gem_type: &GemType, relationship: &RelationshipType) -> bool {
    use RelationshipType::*;
    let allowed: &[RelationshipType] = match gem_type {
        GemType::DormantWarmThread | GemType::UnansweredAsk => {
            &[InboundProspect, WarmContact, PotentialPartner]
        }
        GemType::WeakMarketingLead => &[InboundProspect, WarmContact],
        // my_vendor is allowed but scores lower (partner_program_gem).
        GemType::PartnerProgram => &[MyVendor, WarmContact, PotentialPartner],
        GemType::RenewalLeverage => &[MyVendor, MyServiceProvider, MyInfrastructure],
        GemType::DistributionChannel => &[WarmContact, PotentialPartner, Community],
        GemType::CoMarketing => &[WarmContact, PotentialPartner],
        GemType::IndustryIntel => {
            &[SellingToMe, InboundProspect, WarmContact, PotentialPartner, Community]
        }
        GemType::ProcurementSignal => &[InboundProspect, WarmContact],
        _ => &[],
    };
    allowed.contains(relationship)
}

pub fn run(services: &Services, store: &Store) -> AppResult<StageReport> {
    let conn = store.conn.lock().unwrap();
    let profiles = crate::store::profile::list_all(&conn)?;
    let mut detected = 0;

    let min_dormancy = services.config.scoring.dormant_thread.min_dormancy_days;
    let target_industries = &services.config.scoring.target_industries;
    let your_audience_words: HashSet<&str> = services
        .config
        .engagement
        .your_audience
        .split_whitespace()
        .collect();

    for profile in &profiles {
        let sender_relationship = crate::store::relationship::get(&conn, &profile.sender_domain)?;
        let relationship = sender_relationship
            .as_ref()
            .map(|r| r.relationship_type.clone())
            .unwrap_or(RelationshipType::Unknown);
        // §4.8: a domain marked `suppress_gems` never surfaces gems, no
        // matter what the detectors below would otherwise find.
        if sender_relationship.map(|r| r.suppress_gems).unwrap_or(false) {
            continue;
        }

        let meta = crate::store::metadata::list_for_domain(&conn, &profile.sender_domain)?;
        let message_ids: Vec<String> = meta.iter().map(|m| m.message_id.clone()).collect();
        let classifications =
            crate::store::classification::list_for_domain_message_ids(&conn, &message_ids)?;
        let entities = crate::store::entity::list_for_messages(&conn, &message_ids)?;

        let mut gems = Vec::new();

        if eligible(&GemType::DormantWarmThread, &relationship) {
            gems.extend(dormant_warm_thread_gems(&conn, profile, &message_ids, min_dormancy)?);
        }
        if eligible(&GemType::UnansweredAsk, &relationship) {
            gems.extend(unanswered_ask_gems(&conn, profile, &message_ids)?);
        }
        if eligible(&GemType::WeakMarketingLead, &relationship) {
            if let Some(g) = weak_marketing_lead_gem(profile, &message_ids, target_industries) {
                gems.push(g);
            }
        }
        if eligible(&GemType::PartnerProgram, &relationship) {
            if let Some(g) = partner_program_gem(profile, &relationship, &entities, &classifications, &message_ids) {
                gems.push(g);
            }
        }
        if eligible(&GemType::RenewalLeverage, &relationship) {
            if let Some(g) = renewal_leverage_gem(profile, &relationship, &classifications, &message_ids) {
                gems.push(g);
            }
        }
        if eligible(&GemType::DistributionChannel, &relationship) {
            if let Some(g) = distribution_channel_gem(profile, &classifications, &message_ids) {
                gems.push(g);
            }
        }
        if eligible(&GemType::CoMarketing, &relationship) {
            if let Some(g) = co_marketing_gem(profile, &message_ids, &your_audience_words) {
                gems.push(g);
            }
        }
        if eligible(&GemType::IndustryIntel, &relationship) {
            if let Some(g) = industry_intel_gem(&conn, profile, &message_ids)? {
                gems.push(g);
            }
        }
        if eligible(&GemType::ProcurementSignal, &relationship) {
            if let Some(g) = procurement_signal_gem(profile, &entities, &message_ids) {
                gems.push(g);
            }
        }

        // §4.8 Testable Property #8: 0 <= g.score <= relationship_cap for
        // every stored gem, regardless of which detector produced it.
        let cap = crate::pipeline::score::cap_for(&relationship);
        for mut gem in gems {
            gem.score = gem.score.clamp(0.0, cap);
            crate::store::gem::upsert(&conn, &gem)?;
            detected += 1;
        }
    }

    Ok(StageReport { gems_detected: detected })
}

static WARM_PRICING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(pricing|quote|how much|cost)\b").unwrap());
static WARM_MEETING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(let'?s (meet|chat|hop on a call)|schedule a call|book a (time|meeting|demo))\b").unwrap());
static WARM_ASK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(can you|could you|would you be able to|please send)\b").unwrap());
static WARM_FOLLOWUP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(following up|just checking in|any update|circling back)\b").unwrap());
static WARM_BUDGET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(budget|approved funding|signed off)\b").unwrap());

static DISTRIBUTION_CONTENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(guest post|call for speakers|submit your story|podcast interview|sponsorship opportunit)").unwrap()
});

static COMPLETION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(final (deliverable|version|report|invoice)|project (complete|finished|wrapped|closed)|thanks? for (everything|your work|the help)|great working with you|contract (ended|expired|terminated)|engagement (complete|concluded)|closing out (this|the) project|all set.{0,20}thanks)\b",
    )
    .unwrap()
});

/// §4.7.4 dormant_warm_thread: six-gate pipeline over every thread in the domain.
fn dormant_warm_thread_gems(
    conn: &rusqlite::Connection,
    profile: &SenderProfile,
    message_ids: &[String],
    min_dormancy: i64,
) -> AppResult<Vec<Gem>> {
    let mut thread_ids = HashSet::new();
    for id in message_ids {
        if let Some(m) = crate::store::message::get(conn, id)? {
            thread_ids.insert(m.thread_id);
        }
    }

    let mut gems = Vec::new();

    for tid in &thread_ids {
        let Some(thread) = crate::store::thread::get(conn, tid)? else {
            continue;
        };
        // Gate 2: awaiting_response_from == user.
        if thread.awaiting_response_from.as_str() != "user" {
            continue;
        }
        // Gate 3: dormancy threshold.
        if thread.days_dormant < min_dormancy {
            continue;
        }
        // Gate 4: user participated at some point.
        if !thread.user_participated {
            continue;
        }
        // Gate 5: at least two messages.
        if thread.message_count < 2 {
            continue;
        }

        let messages = crate::store::message::list_for_thread(conn, tid)?;
        let bodies: Vec<String> = messages.iter().map(|m| m.preferred_body().to_string()).collect();
        let full_text = bodies.join("\n");

        // Gate 6: warm-signal scan plus no completion signal in the last 3 messages.
        let mut score_boost = 0i64;
        let mut signals = Vec::new();
        if WARM_PRICING_RE.is_match(&full_text) {
            score_boost += 15;
            signals.push(GemSignal { signal: "pricing_discussion".into(), evidence: "pricing/quote language".into(), threshold: None });
        }
        if WARM_MEETING_RE.is_match(&full_text) {
            score_boost += 12;
            signals.push(GemSignal { signal: "meeting_request".into(), evidence: "meeting/call request".into(), threshold: None });
        }
        if WARM_ASK_RE.is_match(&full_text) {
            score_boost += 10;
            signals.push(GemSignal { signal: "explicit_ask".into(), evidence: "explicit request for action".into(), threshold: None });
        }
        if WARM_FOLLOWUP_RE.is_match(&full_text) {
            score_boost += 5;
            signals.push(GemSignal { signal: "follow_up".into(), evidence: "follow-up language".into(), threshold: None });
        }
        if WARM_BUDGET_RE.is_match(&full_text) {
            score_boost += 12;
            signals.push(GemSignal { signal: "budget_indicator".into(), evidence: "budget/funding language".into(), threshold: None });
        }
        if profile
            .known_contacts
            .iter()
            .any(|c| c.priority_rank == 3 && full_text.contains(&c.name))
        {
            score_boost += 8;
            signals.push(GemSignal { signal: "decision_maker_mention".into(), evidence: "decision-maker referenced".into(), threshold: None });
        }
        score_boost = score_boost.min(30);

        if signals.is_empty() {
            continue;
        }

        let last_three: String = bodies.iter().rev().take(3).cloned().collect::<Vec<_>>().join("\n");
        if COMPLETION_RE.is_match(&last_three) {
            continue;
        }

        let explanation = GemExplanation {
            gem_type: GemType::DormantWarmThread,
            summary: format!("Thread \"{}\" has gone quiet for {} days while awaiting your reply.", thread.normalized_subject, thread.days_dormant),
            signals,
            confidence: 0.7,
            estimated_value: if score_boost >= 20 { EstimatedValue::Medium } else { EstimatedValue::Low },
            urgency: if thread.days_dormant > 30 { Urgency::High } else { Urgency::Medium },
        };

        gems.push(Gem {
            id: 0,
            gem_type: GemType::DormantWarmThread,
            sender_domain: profile.sender_domain.clone(),
            thread_id: Some(tid.clone()),
            score: (30 + score_boost) as f64,
            explanation,
            recommended_actions: vec!["Send a revival email referencing the open ask.".into()],
            source_message_ids: messages.iter().map(|m| m.message_id.clone()).collect(),
            status: crate::domain::enums::GemStatus::New,
        });
    }

    Ok(gems)
}

/// §4.7.4 unanswered_ask: one gem per thread where the user owes a reply
/// and the thread is still within its 30-day activity window.
fn unanswered_ask_gems(
    conn: &rusqlite::Connection,
    profile: &SenderProfile,
    message_ids: &[String],
) -> AppResult<Vec<Gem>> {
    let mut thread_ids = HashSet::new();
    for id in message_ids {
        if let Some(m) = crate::store::message::get(conn, id)? {
            thread_ids.insert(m.thread_id);
        }
    }

    let mut gems = Vec::new();
    for tid in &thread_ids {
        let Some(thread) = crate::store::thread::get(conn, tid)? else {
            continue;
        };
        if thread.awaiting_response_from.as_str() != "user" || thread.days_dormant > 30 {
            continue;
        }

        let thread_message_ids: Vec<String> = crate::store::message::list_for_thread(conn, tid)?
            .iter()
            .map(|m| m.message_id.clone())
            .collect();
        let entities = crate::store::entity::list_for_messages(conn, &thread_message_ids)?;
        let has_decision_maker = entities
            .iter()
            .any(|e| e.entity_type == EntityType::Person && e.context.as_deref() == Some("decision_maker"));
        let boost = if has_decision_maker { 10.0 } else { 0.0 };

        gems.push(Gem {
            id: 0,
            gem_type: GemType::UnansweredAsk,
            sender_domain: profile.sender_domain.clone(),
            thread_id: Some(tid.clone()),
            score: 60.0 + boost,
            explanation: GemExplanation {
                gem_type: GemType::UnansweredAsk,
                summary: format!("Thread \"{}\" still owes a reply.", thread.normalized_subject),
                signals: vec![GemSignal { signal: "unanswered_ask".into(), evidence: "explicit ask present".into(), threshold: None }],
                confidence: 0.6,
                estimated_value: EstimatedValue::Medium,
                urgency: Urgency::Medium,
            },
            recommended_actions: vec!["Reply to the outstanding question.".into()],
            source_message_ids: if thread_message_ids.is_empty() { message_ids.to_vec() } else { thread_message_ids },
            status: crate::domain::enums::GemStatus::New,
        });
    }
    Ok(gems)
}

fn weak_marketing_lead_gem(
    profile: &SenderProfile,
    message_ids: &[String],
    target_industries: &[String],
) -> Option<Gem> {
    let small_or_medium = matches!(
        profile.company_size,
        Some(crate::domain::enums::CompanySize::Small) | Some(crate::domain::enums::CompanySize::Medium)
    );
    let low_soph = profile.marketing_sophistication_avg <= 5.0;
    let industry_ok = target_industries.is_empty()
        || profile
            .industry
            .as_deref()
            .map(|i| target_industries.iter().any(|t| t == i))
            .unwrap_or(false);

    if !(small_or_medium && low_soph && industry_ok) {
        return None;
    }

    let score = 40.0 + (5.0 - profile.marketing_sophistication_avg).max(0.0) * 5.0;
    Some(Gem {
        id: 0,
        gem_type: GemType::WeakMarketingLead,
        sender_domain: profile.sender_domain.clone(),
        thread_id: None,
        score,
        explanation: GemExplanation {
            gem_type: GemType::WeakMarketingLead,
            summary: format!("{} shows weak marketing sophistication ({:.1}/10).", profile.sender_domain, profile.marketing_sophistication_avg),
            signals: vec![GemSignal {
                signal: "low_sophistication".into(),
                evidence: format!("{:.1}/10", profile.marketing_sophistication_avg),
                threshold: Some("5".into()),
            }],
            confidence: 0.55,
            estimated_value: EstimatedValue::Low,
            urgency: Urgency::Low,
        },
        recommended_actions: vec!["Pitch a marketing audit or retainer.".into()],
        source_message_ids: message_ids.to_vec(),
        status: crate::domain::enums::GemStatus::New,
    })
}

fn partner_program_gem(
    profile: &SenderProfile,
    relationship: &RelationshipType,
    entities: &[crate::domain::ExtractedEntity],
    classifications: &[crate::domain::AiClassification],
    message_ids: &[String],
) -> Option<Gem> {
    let offer_mentions_partnership = classifications
        .iter()
        .any(|c| c.sender_intent.as_str() == "partnership_pitch");
    if !profile.has_partner_program && !offer_mentions_partnership {
        return None;
    }
    let has_commission = entities
        .iter()
        .any(|e| e.entity_type == EntityType::Money && e.value.contains('%'));
    // Eligible for my_vendor, but scores lower there (§4.7.4).
    let base = if *relationship == RelationshipType::MyVendor { 20.0 } else { 30.0 };
    let score = (base + if has_commission { 10.0 } else { 0.0 }).min(crate::pipeline::score::cap_for(relationship));

    Some(Gem {
        id: 0,
        gem_type: GemType::PartnerProgram,
        sender_domain: profile.sender_domain.clone(),
        thread_id: None,
        score,
        explanation: GemExplanation {
            gem_type: GemType::PartnerProgram,
            summary: format!("{} runs a partner program.", profile.sender_domain),
            signals: vec![GemSignal { signal: "partner_program_detected".into(), evidence: "partner program link/mention".into(), threshold: None }],
            confidence: 0.6,
            estimated_value: EstimatedValue::Medium,
            urgency: Urgency::Low,
        },
        recommended_actions: vec!["Reach out about joining their partner program.".into()],
        source_message_ids: message_ids.to_vec(),
        status: crate::domain::enums::GemStatus::New,
    })
}

fn renewal_leverage_gem(
    profile: &SenderProfile,
    relationship: &RelationshipType,
    classifications: &[crate::domain::AiClassification],
    message_ids: &[String],
) -> Option<Gem> {
    let is_transactional = classifications
        .iter()
        .any(|c| c.sender_intent.as_str() == "transactional");
    if !is_transactional {
        return None;
    }
    let next = profile.renewal_dates.iter().min()?;
    let days_to_renewal = (*next - chrono::Utc::now()).num_days();
    let urgency = if days_to_renewal <= 30 {
        Urgency::High
    } else if days_to_renewal <= 60 {
        Urgency::Medium
    } else {
        Urgency::Low
    };

    Some(Gem {
        id: 0,
        gem_type: GemType::RenewalLeverage,
        sender_domain: profile.sender_domain.clone(),
        thread_id: None,
        score: 40.0f64.min(crate::pipeline::score::cap_for(relationship)),
        explanation: GemExplanation {
            gem_type: GemType::RenewalLeverage,
            summary: format!("Renewal window approaching in {} days.", days_to_renewal),
            signals: vec![GemSignal { signal: "renewal_date".into(), evidence: next.to_rfc3339(), threshold: None }],
            confidence: 0.65,
            estimated_value: EstimatedValue::Medium,
            urgency,
        },
        recommended_actions: vec!["Negotiate terms ahead of renewal.".into()],
        source_message_ids: message_ids.to_vec(),
        status: crate::domain::enums::GemStatus::New,
    })
}

fn distribution_channel_gem(
    profile: &SenderProfile,
    classifications: &[crate::domain::AiClassification],
    message_ids: &[String],
) -> Option<Gem> {
    let has_distribution_intent = classifications.iter().any(|c| {
        matches!(
            c.sender_intent.as_str(),
            "newsletter" | "event_invitation" | "community"
        )
    });
    if !has_distribution_intent || profile.total_messages < 5 {
        return None;
    }
    let cta_joined = profile.cta_texts_all.iter().cloned().collect::<Vec<_>>().join(" ");
    let content_bonus = if DISTRIBUTION_CONTENT_RE.is_match(&cta_joined) {
        15.0
    } else {
        0.0
    };

    Some(Gem {
        id: 0,
        gem_type: GemType::DistributionChannel,
        sender_domain: profile.sender_domain.clone(),
        thread_id: None,
        score: 15.0 + content_bonus,
        explanation: GemExplanation {
            gem_type: GemType::DistributionChannel,
            summary: format!("{} operates a recurring distribution channel.", profile.sender_domain),
            signals: vec![GemSignal { signal: "distribution_content".into(), evidence: "newsletter/event/community intent".into(), threshold: None }],
            confidence: 0.5,
            estimated_value: EstimatedValue::Low,
            urgency: Urgency::Low,
        },
        recommended_actions: vec!["Pitch inclusion in their distribution channel.".into()],
        source_message_ids: message_ids.to_vec(),
        status: crate::domain::enums::GemStatus::New,
    })
}

fn co_marketing_gem(
    profile: &SenderProfile,
    message_ids: &[String],
    your_audience_words: &HashSet<&str>,
) -> Option<Gem> {
    if profile.target_audience.is_none() {
        return None;
    }
    let their_words: HashSet<&str> = profile
        .target_audience
        .as_deref()
        .unwrap_or("")
        .split_whitespace()
        .collect();
    let overlap = your_audience_words.intersection(&their_words).count();
    if overlap < 2 {
        return None;
    }
    let volume_bonus = if profile.total_messages >= 5 { 10.0 } else { 0.0 };

    Some(Gem {
        id: 0,
        gem_type: GemType::CoMarketing,
        sender_domain: profile.sender_domain.clone(),
        thread_id: None,
        score: 30.0 + volume_bonus,
        explanation: GemExplanation {
            gem_type: GemType::CoMarketing,
            summary: "Target audiences overlap enough for a co-marketing pitch.".into(),
            signals: vec![GemSignal { signal: "audience_overlap".into(), evidence: format!("{overlap} shared terms"), threshold: Some("2".into()) }],
            confidence: 0.5,
            estimated_value: EstimatedValue::Medium,
            urgency: Urgency::Low,
        },
        recommended_actions: vec!["Propose a joint content or webinar swap.".into()],
        source_message_ids: message_ids.to_vec(),
        status: crate::domain::enums::GemStatus::New,
    })
}

fn industry_intel_gem(
    conn: &rusqlite::Connection,
    profile: &SenderProfile,
    message_ids: &[String],
) -> AppResult<Option<Gem>> {
    let Some(industry) = &profile.industry else {
        return Ok(None);
    };
    let count = crate::store::profile::count_by_industry(conn, industry)?;
    if count < 10 {
        return Ok(None);
    }

    Ok(Some(Gem {
        id: 0,
        gem_type: GemType::IndustryIntel,
        sender_domain: profile.sender_domain.clone(),
        thread_id: None,
        score: 20.0,
        explanation: GemExplanation {
            gem_type: GemType::IndustryIntel,
            summary: format!("{industry} now has {count} profiled senders — enough for an industry report."),
            signals: vec![GemSignal { signal: "industry_volume".into(), evidence: count.to_string(), threshold: Some("10".into()) }],
            confidence: 0.5,
            estimated_value: EstimatedValue::Low,
            urgency: Urgency::Low,
        },
        recommended_actions: vec!["Compile an industry intelligence report for outreach.".into()],
        source_message_ids: message_ids.to_vec(),
        status: crate::domain::enums::GemStatus::New,
    }))
}

fn procurement_signal_gem(
    profile: &SenderProfile,
    entities: &[crate::domain::ExtractedEntity],
    message_ids: &[String],
) -> Option<Gem> {
    let procurement: Vec<_> = entities
        .iter()
        .filter(|e| e.entity_type == EntityType::ProcurementSignal)
        .collect();
    if procurement.is_empty() {
        return None;
    }
    let has_security_review = procurement
        .iter()
        .any(|e| e.context.as_deref() == Some("security_review"));
    let score = 50.0 + if has_security_review { 15.0 } else { 0.0 };

    Some(Gem {
        id: 0,
        gem_type: GemType::ProcurementSignal,
        sender_domain: profile.sender_domain.clone(),
        thread_id: None,
        score,
        explanation: GemExplanation {
            gem_type: GemType::ProcurementSignal,
            summary: format!("{} shows active procurement activity.", profile.sender_domain),
            signals: procurement
                .iter()
                .map(|e| GemSignal { signal: "procurement_signal".into(), evidence: e.value.clone(), threshold: None })
                .collect(),
            confidence: 0.6,
            estimated_value: EstimatedValue::MediumHigh,
            urgency: if has_security_review { Urgency::High } else { Urgency::Medium },
        },
        recommended_actions: vec!["Position for their procurement cycle.".into()],
        source_message_ids: message_ids.to_vec(),
        status: crate::domain::enums::GemStatus::New,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_upsell_is_never_eligible() {
        for rel in [
            RelationshipType::InboundProspect,
            RelationshipType::WarmContact,
            RelationshipType::Unknown,
            RelationshipType::SellingToMe,
            RelationshipType::MyVendor,
        ] {
            assert!(!eligible(&GemType::VendorUpsell, &rel));
        }
    }

    #[test]
    fn renewal_leverage_only_eligible_for_my_vendor_and_service_provider() {
        assert!(eligible(&GemType::RenewalLeverage, &RelationshipType::MyVendor));
        assert!(eligible(&GemType::RenewalLeverage, &RelationshipType::MyServiceProvider));
        assert!(!eligible(&GemType::RenewalLeverage, &RelationshipType::InboundProspect));
    }

    #[test]
    fn weak_marketing_lead_requires_low_sophistication_and_size() {
        let mut profile = SenderProfile::empty("acme.com");
        profile.company_size = Some(crate::domain::enums::CompanySize::Enterprise);
        profile.marketing_sophistication_avg = 2.0;
        assert!(weak_marketing_lead_gem(&profile, &[], &[]).is_none());
    }
}
