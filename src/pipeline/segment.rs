//! Segmenter (§4.8). For every profiled domain, runs six segment rules
//! producing zero or more `(segment, sub_segment, confidence)` rows.

use crate::domain::enums::{GemType, RelationshipType};
use crate::domain::{Gem, SenderProfile, SenderSegment};
use crate::error::AppResult;
use crate::services::Services;
use crate::store::Store;

pub struct StageReport {
    pub domains_segmented: usize,
}

pub fn run(_services: &Services, store: &Store) -> AppResult<StageReport> {
    let conn = store.conn.lock().unwrap();
    let profiles = crate::store::profile::list_all(&conn)?;
    let mut processed = 0;

    for profile in &profiles {
        let relationship = crate::store::relationship::get(&conn, &profile.sender_domain)?
            .map(|r| r.relationship_type)
            .unwrap_or(RelationshipType::Unknown);
        let gems = crate::store::gem::list_for_domain(&conn, &profile.sender_domain)?;

        let mut segments = Vec::new();
        segments.extend(spend_segment(profile, &relationship));
        segments.extend(partner_segment(profile, &gems));
        segments.extend(prospect_segment(profile));
        segments.extend(dormant_segment(&gems));
        segments.extend(distribution_segment(profile));
        segments.extend(procurement_segment(&gems));

        crate::store::segment::replace_for_domain(&conn, &profile.sender_domain, &segments)?;
        processed += 1;
    }

    Ok(StageReport {
        domains_segmented: processed,
    })
}

fn seg(domain: &str, segment: &str, sub: &str, confidence: f64) -> SenderSegment {
    SenderSegment {
        sender_domain: domain.to_string(),
        segment: segment.to_string(),
        sub_segment: sub.to_string(),
        confidence,
    }
}

/// §4.8 spend_map: what we pay for, and whether it's at risk.
fn spend_segment(profile: &SenderProfile, relationship: &RelationshipType) -> Option<SenderSegment> {
    if !matches!(relationship, RelationshipType::MyVendor | RelationshipType::MyServiceProvider) {
        return None;
    }
    let days_since_contact = profile
        .last_contact
        .map(|d| (chrono::Utc::now() - d).num_days())
        .unwrap_or(0);

    let sub = if !profile.renewal_dates.is_empty() {
        "upcoming_renewal"
    } else if days_since_contact > 180 {
        "churned_vendor"
    } else {
        "active_subscription"
    };
    Some(seg(&profile.sender_domain, "spend_map", sub, 0.6))
}

/// §4.8 partner_map: referral program vs general partnership candidate.
fn partner_segment(profile: &SenderProfile, gems: &[Gem]) -> Option<SenderSegment> {
    let has_partner_gem = gems.iter().any(|g| g.gem_type == GemType::PartnerProgram);
    if !has_partner_gem && !profile.has_partner_program {
        return None;
    }
    let sub = if has_partner_gem { "referral_program" } else { "general" };
    Some(seg(&profile.sender_domain, "partner_map", sub, 0.55))
}

/// §4.8 prospect_map: how promising this sender is as a lead.
fn prospect_segment(profile: &SenderProfile) -> Option<SenderSegment> {
    let soph = profile.marketing_sophistication_avg;
    if soph <= 3.0 {
        Some(seg(&profile.sender_domain, "prospect_map", "hot_lead", 0.7))
    } else if soph <= 5.0 {
        Some(seg(&profile.sender_domain, "prospect_map", "warm_prospect", 0.55))
    } else if soph >= 6.0 {
        Some(seg(&profile.sender_domain, "prospect_map", "intelligence_value", 0.4))
    } else {
        None
    }
}

/// §4.8 dormant_threads: domains with at least one dormant warm thread.
fn dormant_segment(gems: &[Gem]) -> Option<SenderSegment> {
    let dormant = gems.iter().find(|g| g.gem_type == GemType::DormantWarmThread)?;
    Some(seg(&dormant.sender_domain, "dormant_threads", "unanswered", 0.65))
}

/// §4.8 distribution_map: what kind of recurring channel this sender runs.
fn distribution_segment(profile: &SenderProfile) -> Option<SenderSegment> {
    let offers = &profile.offer_type_distribution;
    let sub = if offers.contains_key("newsletter") {
        "newsletter"
    } else if offers.contains_key("event") {
        "event_organizer"
    } else if offers.contains_key("community") {
        "community"
    } else {
        return None;
    };
    Some(seg(&profile.sender_domain, "distribution_map", sub, 0.5))
}

/// §4.8 procurement_map: where this sender sits in our procurement pipeline.
fn procurement_segment(gems: &[Gem]) -> Option<SenderSegment> {
    let gem = gems.iter().find(|g| g.gem_type == GemType::ProcurementSignal)?;
    let sub = if gem.explanation.urgency == crate::domain::enums::Urgency::High {
        "security_compliance"
    } else if gem.score >= 60.0 {
        "formal_rfp"
    } else {
        "evaluation"
    };
    Some(seg(&gem.sender_domain, "procurement_map", sub, 0.5))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hot_lead_requires_low_sophistication() {
        let mut profile = SenderProfile::empty("acme.com");
        profile.marketing_sophistication_avg = 2.0;
        let s = prospect_segment(&profile).unwrap();
        assert_eq!(s.sub_segment, "hot_lead");
    }

    #[test]
    fn spend_segment_absent_for_non_vendor_relationship() {
        let profile = SenderProfile::empty("acme.com");
        assert!(spend_segment(&profile, &RelationshipType::InboundProspect).is_none());
    }
}
