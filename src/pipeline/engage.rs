//! Engagement generator (§4.9). Turns a gem into a drafted outbound email by
//! routing its gem type to a strategy, assembling per-strategy prompt
//! context, and parsing the model's `{subject_line, body}` JSON response.

use crate::domain::enums::{Channel, DraftStatus, GemType, Strategy};
use crate::domain::{EngagementDraft, Gem, SenderProfile};
use crate::error::AppResult;
use crate::pipeline::prompts::{
    self, ENGAGEMENT_REVISER_PROMPT, ENGAGEMENT_REVISER_SYSTEM_PROMPT, ENGAGEMENT_SYSTEM_PROMPT,
};
use crate::services::Services;
use crate::store::Store;
use std::collections::HashMap;

pub struct EngageOptions {
    pub model: String,
    /// When set, generate for this gem id regardless of filters/caps.
    pub explicit_gem_id: Option<i64>,
    /// §6.1 `--crew`: route the draft through a second reviewer call before
    /// it's saved.
    pub crew: bool,
}

pub struct StageReport {
    pub drafts_generated: usize,
    pub errors: Vec<String>,
}

/// §4.9 strategy routing. `VendorUpsell`/`Other` never reach here because
/// the detector never emits them, but the fallback keeps this total.
fn route(gem_type: &GemType) -> Strategy {
    match gem_type {
        GemType::DormantWarmThread => Strategy::Revival,
        GemType::UnansweredAsk => Strategy::Mirror,
        GemType::WeakMarketingLead => Strategy::Audit,
        GemType::PartnerProgram => Strategy::Partner,
        GemType::RenewalLeverage => Strategy::RenewalNegotiation,
        GemType::DistributionChannel => Strategy::DistributionPitch,
        GemType::CoMarketing => Strategy::DistributionPitch,
        GemType::IndustryIntel => Strategy::IndustryReport,
        GemType::ProcurementSignal => Strategy::Audit,
        _ => Strategy::Mirror,
    }
}

fn template_for(strategy: &Strategy) -> &'static str {
    match strategy {
        Strategy::Audit => prompts::STRATEGY_AUDIT_PROMPT,
        Strategy::Revival => prompts::STRATEGY_REVIVAL_PROMPT,
        Strategy::Partner => prompts::STRATEGY_PARTNER_PROMPT,
        Strategy::RenewalNegotiation => prompts::STRATEGY_RENEWAL_NEGOTIATION_PROMPT,
        Strategy::IndustryReport => prompts::STRATEGY_INDUSTRY_REPORT_PROMPT,
        Strategy::Mirror => prompts::STRATEGY_MIRROR_PROMPT,
        Strategy::DistributionPitch => prompts::STRATEGY_DISTRIBUTION_PITCH_PROMPT,
        Strategy::Other(_) => prompts::STRATEGY_MIRROR_PROMPT,
    }
}

pub async fn run(services: &Services, store: &Store, opts: &EngageOptions) -> AppResult<StageReport> {
    let gems = {
        let conn = store.conn.lock().unwrap();
        if let Some(gem_id) = opts.explicit_gem_id {
            crate::store::gem::get(&conn, gem_id)?.into_iter().collect()
        } else {
            crate::store::gem::list_all(&conn)?
        }
    };

    let mut generated = 0;
    let mut errors = Vec::new();

    for gem in gems {
        let already_drafted = {
            let conn = store.conn.lock().unwrap();
            crate::store::draft::has_draft_for_gem(&conn, gem.id)?
        };
        if already_drafted && opts.explicit_gem_id.is_none() {
            continue;
        }

        if opts.explicit_gem_id.is_none() && !passes_filters(services, store, &gem)? {
            continue;
        }

        match generate_one(services, store, &gem, opts).await {
            Ok(()) => generated += 1,
            Err(e) => errors.push(format!("gem {}: {e}", gem.id)),
        }
    }

    Ok(StageReport {
        drafts_generated: generated,
        errors,
    })
}

/// §4.9: `preferred_strategies` restricts which strategies fire, and
/// `max_outreach_per_day` caps total daily drafts. An explicit gem id
/// bypasses both (checked by the caller before this is reached).
fn passes_filters(services: &Services, store: &Store, gem: &Gem) -> AppResult<bool> {
    let preferred = &services.config.engagement.preferred_strategies;
    if !preferred.is_empty() {
        let strategy = route(&gem.gem_type);
        if !preferred.iter().any(|s| s == strategy.as_str()) {
            return Ok(false);
        }
    }

    let conn = store.conn.lock().unwrap();
    let today_count = crate::store::draft::count_generated_today(&conn)?;
    Ok(today_count < services.config.engagement.max_outreach_per_day)
}

async fn generate_one(services: &Services, store: &Store, gem: &Gem, opts: &EngageOptions) -> AppResult<()> {
    let profile = {
        let conn = store.conn.lock().unwrap();
        crate::store::profile::get(&conn, &gem.sender_domain)?
            .unwrap_or_else(|| SenderProfile::empty(&gem.sender_domain))
    };

    let strategy = route(&gem.gem_type);
    let template = template_for(&strategy);
    let vars = build_vars(services, &profile, gem, &strategy);
    let user_prompt = prompts::render(template, &vars);

    let raw = services
        .llm
        .complete(ENGAGEMENT_SYSTEM_PROMPT, &user_prompt, &opts.model, true)
        .await?;

    let mut parsed: serde_json::Value = serde_json::from_str(&raw)
        .map_err(|e| crate::error::AppError::parse(format!("invalid draft JSON: {e}")))?;

    if opts.crew {
        parsed = revise_draft(services, &vars, &parsed, &opts.model).await?;
    }

    let subject_line = parsed["subject_line"].as_str().unwrap_or_default().to_string();
    let body = parsed["body"].as_str().unwrap_or_default().to_string();

    let draft = EngagementDraft {
        id: 0,
        gem_id: gem.id,
        sender_domain: gem.sender_domain.clone(),
        strategy,
        channel: Channel::Email,
        subject_line,
        body_text: body,
        body_html: None,
        status: DraftStatus::Draft,
        generated_at: chrono::Utc::now(),
        sent_at: None,
        response_received: false,
        response_sentiment: None,
    };

    let conn = store.conn.lock().unwrap();
    crate::store::draft::insert(&conn, &draft)?;
    Ok(())
}

/// `--crew` reviewer pass. Falls back to the first draft if the reviewer's
/// response doesn't parse, rather than failing the whole gem.
async fn revise_draft(
    services: &Services,
    base_vars: &HashMap<String, String>,
    draft: &serde_json::Value,
    model: &str,
) -> AppResult<serde_json::Value> {
    let mut vars = base_vars.clone();
    vars.insert("draft_json".to_string(), draft.to_string());
    let prompt = prompts::render(ENGAGEMENT_REVISER_PROMPT, &vars);

    let raw = services
        .llm
        .complete(ENGAGEMENT_REVISER_SYSTEM_PROMPT, &prompt, model, true)
        .await?;

    Ok(serde_json::from_str(&raw).unwrap_or_else(|_| draft.clone()))
}

fn best_contact(profile: &SenderProfile) -> (String, String) {
    profile
        .known_contacts
        .iter()
        .max_by_key(|c| c.priority_rank)
        .map(|c| (c.name.clone(), c.role.clone().unwrap_or_default()))
        .unwrap_or_else(|| ("there".to_string(), String::new()))
}

fn build_vars(
    services: &Services,
    profile: &SenderProfile,
    gem: &Gem,
    strategy: &Strategy,
) -> HashMap<String, String> {
    let (contact_name, contact_role) = best_contact(profile);
    let eng = &services.config.engagement;

    let mut vars = HashMap::new();
    vars.insert(
        "company_name".to_string(),
        profile.company_name.clone().unwrap_or_else(|| gem.sender_domain.clone()),
    );
    vars.insert("contact_name".to_string(), contact_name);
    vars.insert("contact_role".to_string(), contact_role);
    vars.insert("industry".to_string(), profile.industry.clone().unwrap_or_default());
    vars.insert(
        "company_size".to_string(),
        profile.company_size.as_ref().map(|s| s.as_str().to_string()).unwrap_or_default(),
    );
    vars.insert("esp_used".to_string(), profile.esp_used.clone().unwrap_or_default());
    vars.insert(
        "sophistication".to_string(),
        format!("{:.0}", profile.marketing_sophistication_avg),
    );
    vars.insert(
        "product_description".to_string(),
        profile.product_description.clone().unwrap_or_default(),
    );
    vars.insert("pain_points".to_string(), profile.pain_points.join(", "));
    vars.insert("your_service".to_string(), eng.your_service.clone());
    vars.insert("your_tone".to_string(), eng.your_tone.clone());
    vars.insert("your_audience".to_string(), eng.your_audience.clone());
    vars.insert("gem_type".to_string(), gem.gem_type.as_str().to_string());
    vars.insert(
        "gem_explanation".to_string(),
        serde_json::to_string(&gem.explanation).unwrap_or_default(),
    );
    vars.insert("observation".to_string(), gem.explanation.summary.clone());

    match strategy {
        Strategy::Revival => {
            vars.insert("thread_subject".to_string(), gem.explanation.summary.clone());
            vars.insert(
                "dormancy_days".to_string(),
                gem.explanation
                    .signals
                    .iter()
                    .find(|s| s.signal == "dormant_days")
                    .map(|s| s.evidence.clone())
                    .unwrap_or_else(|| "several".to_string()),
            );
        }
        Strategy::RenewalNegotiation => {
            vars.insert(
                "renewal_dates".to_string(),
                profile.renewal_dates.iter().map(|d| d.to_rfc3339()).collect::<Vec<_>>().join(", "),
            );
            vars.insert("monetary_signals".to_string(), profile.monetary_signals.join(", "));
        }
        Strategy::Partner => {
            vars.insert("partner_urls".to_string(), profile.partner_program_urls.join(", "));
        }
        Strategy::DistributionPitch => {
            vars.insert(
                "target_audience".to_string(),
                profile.target_audience.clone().unwrap_or_default(),
            );
        }
        _ => {}
    }

    vars
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dormant_warm_thread_routes_to_revival() {
        assert_eq!(route(&GemType::DormantWarmThread), Strategy::Revival);
    }

    #[test]
    fn renewal_leverage_routes_to_renewal_negotiation() {
        assert_eq!(route(&GemType::RenewalLeverage), Strategy::RenewalNegotiation);
    }

    #[test]
    fn vendor_upsell_falls_back_to_mirror_defensively() {
        assert_eq!(route(&GemType::VendorUpsell), Strategy::Mirror);
    }
}
