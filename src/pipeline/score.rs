//! Scorer (§4.8). A pure function over a domain's profile, relationship,
//! and detected gems — no table of its own; `engage` and the `stats`/`export`
//! CLI commands call `compute` on demand rather than persisting a column that
//! would go stale the moment any upstream stage reruns.

use crate::domain::enums::{GemType, RelationshipType};
use crate::domain::{Gem, SenderProfile, SenderRelationship};

/// §4.8 relationship score caps — a domain's score is never allowed above
/// what its relationship type implies about how much attention it deserves.
/// Shared with the gem detector, which caps every individual gem's score
/// the same way before it's ever stored.
pub(crate) fn cap_for(relationship: &RelationshipType) -> f64 {
    match relationship {
        RelationshipType::InboundProspect => 100.0,
        RelationshipType::WarmContact => 90.0,
        RelationshipType::PotentialPartner => 80.0,
        RelationshipType::Community => 50.0,
        RelationshipType::Unknown => 60.0,
        RelationshipType::SellingToMe => 20.0,
        RelationshipType::MyVendor => 25.0,
        RelationshipType::MyServiceProvider => 15.0,
        RelationshipType::MyInfrastructure => 5.0,
        RelationshipType::Institutional => 5.0,
        RelationshipType::Other(_) => 60.0,
    }
}

fn is_opportunity_side(relationship: &RelationshipType) -> bool {
    matches!(
        relationship,
        RelationshipType::InboundProspect
            | RelationshipType::WarmContact
            | RelationshipType::PotentialPartner
            | RelationshipType::Unknown
    )
}

/// §4.8: combined profile/inbound/gem score, capped by relationship type.
/// Returns 0 whenever gems are suppressed for this domain.
pub fn compute(
    profile: &SenderProfile,
    relationship: &SenderRelationship,
    target_industries: &[String],
    gems: &[Gem],
) -> f64 {
    if relationship.suppress_gems {
        return 0.0;
    }

    let profile_score = profile_subscore(profile, &relationship.relationship_type, target_industries);
    let inbound_score = inbound_subscore(profile);
    let gem_score = gem_subscore(gems);

    let total = profile_score + inbound_score + gem_score;
    total.min(cap_for(&relationship.relationship_type))
}

fn profile_subscore(profile: &SenderProfile, relationship: &RelationshipType, target_industries: &[String]) -> f64 {
    let mut score = 0.0;

    score += match profile.company_size {
        Some(crate::domain::enums::CompanySize::Small) => 10.0,
        Some(crate::domain::enums::CompanySize::Medium) => 7.0,
        _ => 2.0,
    };

    let industry_match = profile
        .industry
        .as_deref()
        .map(|i| target_industries.iter().any(|t| t == i))
        .unwrap_or(false);
    score += if industry_match { 8.0 } else { 2.0 };

    if let Some(last) = profile.last_contact {
        let days = (chrono::Utc::now() - last).num_days();
        score += if days <= 30 {
            8.0
        } else if days <= 90 {
            4.0
        } else {
            0.0
        };
    }

    if profile.known_contacts.iter().any(|c| c.priority_rank == 3) {
        score += 7.0;
    }

    if !profile.monetary_signals.is_empty() && is_opportunity_side(relationship) {
        score += 7.0;
    }

    score.min(40.0)
}

fn inbound_subscore(profile: &SenderProfile) -> f64 {
    let a = (1.0 - profile.thread_initiation_ratio).max(0.0) * 15.0;
    let b = profile.user_reply_rate.min(1.0) * 15.0;
    (a + b).min(30.0)
}

fn gem_subscore(gems: &[Gem]) -> f64 {
    let unique_types = gems
        .iter()
        .map(|g| g.gem_type.as_str())
        .collect::<std::collections::HashSet<_>>()
        .len()
        .min(3);
    let mut score = unique_types as f64 * 5.0;

    for gem in gems {
        score += match gem.gem_type {
            GemType::DormantWarmThread => 10.0,
            GemType::PartnerProgram => 3.0,
            GemType::ProcurementSignal => 7.0,
            _ => 0.0,
        };
    }

    score.min(30.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::profile::RelationshipSource;

    fn relationship(rtype: RelationshipType, suppress: bool) -> SenderRelationship {
        SenderRelationship {
            sender_domain: "acme.com".into(),
            relationship_type: rtype,
            note: None,
            suppress_gems: suppress,
            source: RelationshipSource::AutoDetected,
        }
    }

    #[test]
    fn suppressed_relationship_scores_zero() {
        let profile = SenderProfile::empty("acme.com");
        let rel = relationship(RelationshipType::InboundProspect, true);
        assert_eq!(compute(&profile, &rel, &[], &[]), 0.0);
    }

    #[test]
    fn score_never_exceeds_relationship_cap() {
        let mut profile = SenderProfile::empty("acme.com");
        profile.thread_initiation_ratio = 0.0;
        profile.user_reply_rate = 1.0;
        profile.company_size = Some(crate::domain::enums::CompanySize::Small);
        let rel = relationship(RelationshipType::MyInfrastructure, false);
        assert!(compute(&profile, &rel, &[], &[]) <= 5.0);
    }
}
