//! Prompt templates (§4.6, §4.9). Plain `const &str` with `{placeholder}`
//! substitution — deliberately no templating crate, matching the teacher's
//! preference for plain functions over macros.

use std::collections::HashMap;

pub const CLASSIFICATION_SYSTEM_PROMPT: &str =
    "You are an email classification assistant. Respond with JSON only, no prose, matching the requested schema exactly.";

pub const CLASSIFICATION_PROMPT: &str = "\
From: {from_name} <{from_address}>
Subject: {subject}
ESP: {esp_identified}
Offer types: {offer_types}
CTA texts: {cta_texts}
Extracted entities: {extracted_entities_summary}

Body:
{body_clean}

Classify this email. Respond with JSON:
{{
  \"industry\": string,
  \"company_size_estimate\": \"small\"|\"medium\"|\"enterprise\",
  \"marketing_sophistication\": integer 1-10,
  \"sender_intent\": string,
  \"product_type\": string,
  \"product_description\": string,
  \"pain_points\": [string],
  \"target_audience\": string,
  \"partner_program_detected\": boolean,
  \"renewal_signal_detected\": boolean,
  \"ai_confidence\": number 0-1
}}";

pub const CORRECTIONS_HEADER: &str = "\nPrior corrections (use as few-shot guidance, not training):\n";

pub const ENGAGEMENT_SYSTEM_PROMPT: &str =
    "You write concise, specific outbound emails. Respond with JSON only: {\"subject_line\": string, \"body\": string}.";

pub const STRATEGY_AUDIT_PROMPT: &str = "\
Write a re-engagement email to {contact_name} ({contact_role}) at {company_name}, a {company_size} company in \
{industry}. They use {esp_used} with sophistication {sophistication}/10. Product: {product_description}. \
Pain points: {pain_points}. Opportunity: {gem_explanation}. Observation: {observation}. \
Your service: {your_service} ({your_tone} tone). Your audience: {your_audience}.";

pub const STRATEGY_REVIVAL_PROMPT: &str = "\
Write a revival email for the thread \"{thread_subject}\", dormant {dormancy_days} days, to {contact_name} \
({contact_role}) at {company_name}. Opportunity: {gem_explanation}. Observation: {observation}. \
Your service: {your_service} ({your_tone} tone).";

pub const STRATEGY_PARTNER_PROMPT: &str = "\
Write a partnership outreach email to {contact_name} ({contact_role}) at {company_name} referencing \
{partner_urls}. Opportunity: {gem_explanation}. Your service: {your_service} ({your_tone} tone).";

pub const STRATEGY_RENEWAL_NEGOTIATION_PROMPT: &str = "\
Write a renewal-negotiation email to {contact_name} ({contact_role}) at {company_name} about renewal \
dates {renewal_dates} and monetary signals {monetary_signals}. Opportunity: {gem_explanation}. \
Your service: {your_service} ({your_tone} tone).";

pub const STRATEGY_INDUSTRY_REPORT_PROMPT: &str = "\
Write an industry-intelligence outreach email to {contact_name} ({contact_role}) at {company_name} in \
{industry}. Opportunity: {gem_explanation}. Your service: {your_service} ({your_tone} tone).";

pub const STRATEGY_MIRROR_PROMPT: &str = "\
Write a reply mirroring the tone of {company_name}'s own outreach, addressed to {contact_name} \
({contact_role}). Opportunity: {gem_explanation}. Your service: {your_service} ({your_tone} tone).";

pub const STRATEGY_DISTRIBUTION_PITCH_PROMPT: &str = "\
Write a distribution-channel pitch to {contact_name} ({contact_role}) at {company_name} targeting \
audience {target_audience}. Opportunity: {gem_explanation}. Your service: {your_service} ({your_tone} tone).";

pub const CLASSIFICATION_VERIFIER_SYSTEM_PROMPT: &str =
    "You are a second reviewer checking another model's email classification. Respond with JSON only.";

/// §6.1 `--crew` mode: a reviewer pass over the first pass's own JSON output,
/// used instead of trusting a single model's classification.
pub const CLASSIFICATION_VERIFIER_PROMPT: &str = "\
Original email subject: {subject}
Body:
{body_clean}

A first-pass classifier produced this JSON:
{draft_json}

Review it for accuracy. Respond with the same JSON shape, corrected where wrong:
{{
  \"industry\": string,
  \"company_size_estimate\": \"small\"|\"medium\"|\"enterprise\",
  \"marketing_sophistication\": integer 1-10,
  \"sender_intent\": string,
  \"product_type\": string,
  \"product_description\": string,
  \"pain_points\": [string],
  \"target_audience\": string,
  \"partner_program_detected\": boolean,
  \"renewal_signal_detected\": boolean,
  \"ai_confidence\": number 0-1
}}";

pub const ENGAGEMENT_REVISER_SYSTEM_PROMPT: &str =
    "You are a second reviewer tightening an outbound email draft for specificity and tone. Respond with JSON only: {\"subject_line\": string, \"body\": string}.";

/// §6.1 `--crew` mode: a reviewer pass over the draft generator's own output.
pub const ENGAGEMENT_REVISER_PROMPT: &str = "\
A first-pass draft for {contact_name} ({contact_role}) at {company_name} was written as:
{draft_json}

Tighten it for specificity and the requested tone ({your_tone}). Keep the same opportunity and facts. \
Respond with the corrected JSON in the same shape.";

/// Substitutes every `{key}` occurrence in `template` from `vars`. Unknown
/// placeholders are left untouched rather than erroring, since a missing
/// per-strategy variable is expected for strategies that don't define it.
pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();
    let bytes = template.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            if let Some(end) = template[i..].find('}') {
                let key = &template[i + 1..i + end];
                if let Some(value) = vars.get(key) {
                    out.push_str(value);
                    i += end + 1;
                    continue;
                }
            }
        }
        let ch = template[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }
    let _ = chars.peek();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_placeholders_and_leaves_unknown() {
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        let rendered = render("Hi {name}, re: {missing}", &vars);
        assert_eq!(rendered, "Hi Alice, re: {missing}");
    }
}
