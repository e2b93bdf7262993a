//! AI classifier (§4.6). Produces one `ai_classification` row per message
//! that lacks one, layering sender- and message-scope overrides before the
//! model call and skipping the call entirely when overrides cover every
//! field.

use crate::domain::enums::{CompanySize, SenderIntent};
use crate::domain::{AiClassification, ClassificationOverride};
use crate::error::AppResult;
use crate::pipeline::prompts::{
    self, CLASSIFICATION_PROMPT, CLASSIFICATION_SYSTEM_PROMPT, CLASSIFICATION_VERIFIER_PROMPT,
    CLASSIFICATION_VERIFIER_SYSTEM_PROMPT, CORRECTIONS_HEADER,
};
use crate::services::Services;
use crate::store::Store;
use std::collections::HashMap;
use std::str::FromStr;

pub struct ClassifyOptions {
    pub model: String,
    pub retrain: bool,
    /// §6.1 `--crew`: route the first pass's JSON through a second reviewer
    /// call before committing it, instead of trusting one model in isolation.
    pub crew: bool,
}

pub struct StageReport {
    pub items_processed: usize,
    pub errors: Vec<String>,
}

const REQUIRED_FIELDS: &[&str] = &[
    "industry",
    "company_size_estimate",
    "marketing_sophistication",
    "sender_intent",
    "product_type",
    "product_description",
    "target_audience",
];

pub async fn run(services: &Services, store: &Store, opts: &ClassifyOptions) -> AppResult<StageReport> {
    let missing = {
        let conn = store.conn.lock().unwrap();
        crate::store::classification::ids_missing(&conn)?
    };
    let mut processed = 0;
    let mut errors = Vec::new();

    for id in &missing {
        match classify_one(services, store, id, opts).await {
            Ok(Some(classification)) => {
                let conn = store.conn.lock().unwrap();
                crate::store::classification::upsert(&conn, &classification)?;
                processed += 1;
            }
            Ok(None) => {}
            Err(e) => errors.push(format!("{id}: {e}")),
        }
    }

    Ok(StageReport {
        items_processed: processed,
        errors,
    })
}

async fn classify_one(
    services: &Services,
    store: &Store,
    message_id: &str,
    opts: &ClassifyOptions,
) -> AppResult<Option<AiClassification>> {
    let (msg, content, sender_domain, entities, sender_overrides, message_overrides) = {
        let conn = store.conn.lock().unwrap();
        let Some(msg) = crate::store::message::get(&conn, message_id)? else {
            return Ok(None);
        };
        let content = crate::store::content::get(&conn, message_id)?;
        let meta = crate::store::metadata::get(&conn, message_id)?;
        let sender_domain = meta.as_ref().map(|m| m.sender_domain.clone()).unwrap_or_default();
        let entities = crate::store::entity::list_for_message(&conn, message_id)?;
        let sender_overrides = crate::store::overrides::list_for_domain(&conn, &sender_domain)?;
        let message_overrides = crate::store::overrides::list_for_message(&conn, message_id)?;
        (msg, content, sender_domain, entities, sender_overrides, message_overrides)
    };

    let mut overrides: HashMap<String, String> = HashMap::new();
    for o in &sender_overrides {
        overrides.insert(o.field_name.clone(), o.corrected_value.clone());
    }
    for o in &message_overrides {
        overrides.insert(o.field_name.clone(), o.corrected_value.clone());
    }
    let has_override = !overrides.is_empty();

    if REQUIRED_FIELDS.iter().all(|f| overrides.contains_key(*f)) {
        return Ok(Some(build_from_overrides(message_id, &overrides, &opts.model)));
    }

    let body_clean = content
        .as_ref()
        .map(|c| c.body_clean.clone())
        .unwrap_or_else(|| msg.preferred_body().to_string());
    let truncated: String = body_clean.chars().take(services.config.ai.max_body_chars).collect();

    let offer_types = content
        .as_ref()
        .map(|c| c.offer_types.iter().cloned().collect::<Vec<_>>().join(", "))
        .unwrap_or_default();
    let cta_texts = content
        .as_ref()
        .map(|c| c.cta_texts.join(", "))
        .unwrap_or_default();
    let entities_summary = entities
        .iter()
        .map(|e| format!("{}:{}", e.entity_type.as_str(), e.value))
        .collect::<Vec<_>>()
        .join("; ");

    let mut vars = HashMap::new();
    vars.insert("from_name".to_string(), msg.from_name.clone().unwrap_or_default());
    vars.insert("from_address".to_string(), msg.from_address.clone());
    vars.insert("subject".to_string(), msg.subject.clone());
    vars.insert(
        "esp_identified".to_string(),
        crate::store::metadata::get(&store.conn.lock().unwrap(), message_id)?
            .and_then(|m| m.esp_identified)
            .unwrap_or_default(),
    );
    vars.insert("offer_types".to_string(), offer_types);
    vars.insert("cta_texts".to_string(), cta_texts);
    vars.insert("extracted_entities_summary".to_string(), entities_summary);
    vars.insert("body_clean".to_string(), truncated);

    let mut user_prompt = prompts::render(CLASSIFICATION_PROMPT, &vars);

    if opts.retrain {
        let recent = {
            let conn = store.conn.lock().unwrap();
            crate::store::overrides::recent(&conn, 10)?
        };
        if !recent.is_empty() {
            user_prompt.push_str(CORRECTIONS_HEADER);
            for c in &recent {
                user_prompt.push_str(&format_correction(c));
                user_prompt.push('\n');
            }
        }
    }

    let raw = services
        .llm
        .complete(CLASSIFICATION_SYSTEM_PROMPT, &user_prompt, &opts.model, true)
        .await?;

    let mut parsed: serde_json::Value = serde_json::from_str(&raw)
        .map_err(|e| crate::error::AppError::parse(format!("invalid classification JSON: {e}")))?;

    if opts.crew {
        parsed = review_classification(services, &vars, &parsed, &opts.model).await?;
    }

    let mut classification = parse_classification(message_id, &parsed, &opts.model)?;
    apply_overrides(&mut classification, &overrides);
    classification.has_override = has_override;

    let _ = sender_domain;
    Ok(Some(classification))
}

/// `--crew` reviewer pass. Falls back to the first pass's JSON if the
/// reviewer's response doesn't parse, rather than failing the whole message.
async fn review_classification(
    services: &Services,
    base_vars: &HashMap<String, String>,
    draft: &serde_json::Value,
    model: &str,
) -> AppResult<serde_json::Value> {
    let mut vars = base_vars.clone();
    vars.insert("draft_json".to_string(), draft.to_string());
    let prompt = prompts::render(CLASSIFICATION_VERIFIER_PROMPT, &vars);

    let raw = services
        .llm
        .complete(CLASSIFICATION_VERIFIER_SYSTEM_PROMPT, &prompt, model, true)
        .await?;

    Ok(serde_json::from_str(&raw).unwrap_or_else(|_| draft.clone()))
}

fn format_correction(c: &ClassificationOverride) -> String {
    format!(
        "{} / {} / {} → {}",
        c.sender_domain,
        c.field_name,
        c.original_value.as_deref().unwrap_or("(none)"),
        c.corrected_value
    )
}

fn parse_classification(message_id: &str, v: &serde_json::Value, model: &str) -> AppResult<AiClassification> {
    Ok(AiClassification {
        message_id: message_id.to_string(),
        industry: v["industry"].as_str().unwrap_or_default().to_string(),
        company_size_estimate: CompanySize::from_str(v["company_size_estimate"].as_str().unwrap_or("small"))
            .unwrap_or(CompanySize::Small),
        marketing_sophistication: v["marketing_sophistication"].as_u64().unwrap_or(5) as u8,
        sender_intent: SenderIntent::from_str(v["sender_intent"].as_str().unwrap_or("promotional"))
            .unwrap_or(SenderIntent::Promotional),
        product_type: v["product_type"].as_str().unwrap_or_default().to_string(),
        product_description: v["product_description"].as_str().unwrap_or_default().to_string(),
        pain_points: v["pain_points"]
            .as_array()
            .map(|a| a.iter().filter_map(|x| x.as_str().map(String::from)).collect())
            .unwrap_or_default(),
        target_audience: v["target_audience"].as_str().unwrap_or_default().to_string(),
        partner_program_detected: v["partner_program_detected"].as_bool().unwrap_or(false),
        renewal_signal_detected: v["renewal_signal_detected"].as_bool().unwrap_or(false),
        ai_confidence: v["ai_confidence"].as_f64().unwrap_or(0.5),
        model_used: model.to_string(),
        has_override: false,
    })
}

fn build_from_overrides(message_id: &str, overrides: &HashMap<String, String>, model: &str) -> AiClassification {
    AiClassification {
        message_id: message_id.to_string(),
        industry: overrides.get("industry").cloned().unwrap_or_default(),
        company_size_estimate: overrides
            .get("company_size_estimate")
            .and_then(|v| CompanySize::from_str(v).ok())
            .unwrap_or(CompanySize::Small),
        marketing_sophistication: overrides
            .get("marketing_sophistication")
            .and_then(|v| v.parse().ok())
            .unwrap_or(5),
        sender_intent: overrides
            .get("sender_intent")
            .and_then(|v| SenderIntent::from_str(v).ok())
            .unwrap_or(SenderIntent::Promotional),
        product_type: overrides.get("product_type").cloned().unwrap_or_default(),
        product_description: overrides.get("product_description").cloned().unwrap_or_default(),
        pain_points: Vec::new(),
        target_audience: overrides.get("target_audience").cloned().unwrap_or_default(),
        partner_program_detected: false,
        renewal_signal_detected: false,
        ai_confidence: 1.0,
        model_used: model.to_string(),
        has_override: true,
    }
}

fn apply_overrides(c: &mut AiClassification, overrides: &HashMap<String, String>) {
    if let Some(v) = overrides.get("industry") {
        c.industry = v.clone();
    }
    if let Some(v) = overrides.get("company_size_estimate").and_then(|v| CompanySize::from_str(v).ok()) {
        c.company_size_estimate = v;
    }
    if let Some(v) = overrides.get("marketing_sophistication").and_then(|v| v.parse().ok()) {
        c.marketing_sophistication = v;
    }
    if let Some(v) = overrides.get("sender_intent").and_then(|v| SenderIntent::from_str(v).ok()) {
        c.sender_intent = v;
    }
    if let Some(v) = overrides.get("product_type") {
        c.product_type = v.clone();
    }
    if let Some(v) = overrides.get("product_description") {
        c.product_description = v.clone();
    }
    if let Some(v) = overrides.get("target_audience") {
        c.target_audience = v.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_map_wins_over_defaults() {
        let mut c = parse_classification(
            "m1",
            &serde_json::json!({"industry": "Software", "ai_confidence": 0.4}),
            "ollama:llama3",
        )
        .unwrap();
        let mut overrides = HashMap::new();
        overrides.insert("industry".to_string(), "Finance".to_string());
        apply_overrides(&mut c, &overrides);
        assert_eq!(c.industry, "Finance");
    }

    #[test]
    fn all_fields_overridden_builds_without_model_call() {
        let mut overrides = HashMap::new();
        for f in REQUIRED_FIELDS {
            overrides.insert(f.to_string(), "x".to_string());
        }
        let c = build_from_overrides("m1", &overrides, "ollama:llama3");
        assert!(c.has_override);
    }
}
