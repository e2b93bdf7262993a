//! ESP fingerprinting rule set (§4.3): a declarative table of `{ signals,
//! confidence }` entries. A sender matches the first rule whose signals all
//! hold. Loaded once at startup into an immutable `EspRules`, optionally
//! overridden by `esp_fingerprints_file` (§6.2).

use crate::domain::enums::EspConfidence;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EspSignal {
    ReturnPathContains { value: String },
    DkimDomainEquals { value: String },
    HeaderPresent { header: String },
    TrackingDomainContains { value: String },
    XMailerContains { value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EspRule {
    pub name: String,
    pub signals: Vec<EspSignal>,
    pub confidence: EspConfidence,
}

/// Evidence gathered per message for rule matching.
pub struct EspEvidence<'a> {
    pub return_path: Option<&'a str>,
    pub dkim_domain: Option<&'a str>,
    pub sender_domain: &'a str,
    pub headers: &'a std::collections::HashMap<String, String>,
    pub tracking_domains: &'a [String],
    pub x_mailer: Option<&'a str>,
}

pub struct EspRules {
    rules: Vec<EspRule>,
}

impl EspRules {
    pub fn load(path: Option<&str>) -> Self {
        if let Some(p) = path
            && let Ok(text) = std::fs::read_to_string(p)
            && let Ok(rules) = serde_yaml::from_str::<Vec<EspRule>>(&text)
        {
            return Self { rules };
        }
        Self {
            rules: default_rules(),
        }
    }

    /// Returns the matched ESP's display name and confidence, or a
    /// `custom_smtp / low` fallback when the DKIM domain equals the
    /// sender's own root (§4.3).
    pub fn identify(&self, evidence: &EspEvidence) -> (Option<String>, Option<EspConfidence>) {
        for rule in &self.rules {
            if rule.signals.iter().all(|s| signal_holds(s, evidence)) {
                return (Some(rule.name.clone()), Some(rule.confidence.clone()));
            }
        }
        if evidence.dkim_domain.map(|d| d == evidence.sender_domain).unwrap_or(false) {
            return (Some("custom_smtp".to_string()), Some(EspConfidence::Low));
        }
        (None, None)
    }

    /// Sophistication tier (§4.7.1): 3 for HubSpot/Salesforce/Klaviyo/
    /// ActiveCampaign, 2 for SendGrid/Mailchimp/ConvertKit/Postmark/Constant
    /// Contact, 1 otherwise.
    pub fn tier(name: &str) -> u8 {
        let lower = name.to_lowercase();
        const TIER3: &[&str] = &["hubspot", "salesforce", "klaviyo", "activecampaign"];
        const TIER2: &[&str] = &["sendgrid", "mailchimp", "convertkit", "postmark", "constant contact"];
        if TIER3.iter().any(|t| lower.contains(t)) {
            3
        } else if TIER2.iter().any(|t| lower.contains(t)) {
            2
        } else {
            1
        }
    }
}

fn signal_holds(signal: &EspSignal, ev: &EspEvidence) -> bool {
    match signal {
        EspSignal::ReturnPathContains { value } => ev
            .return_path
            .map(|rp| rp.to_lowercase().contains(&value.to_lowercase()))
            .unwrap_or(false),
        EspSignal::DkimDomainEquals { value } => {
            ev.dkim_domain.map(|d| d.eq_ignore_ascii_case(value)).unwrap_or(false)
        }
        EspSignal::HeaderPresent { header } => ev
            .headers
            .keys()
            .any(|k| k.eq_ignore_ascii_case(header)),
        EspSignal::TrackingDomainContains { value } => ev
            .tracking_domains
            .iter()
            .any(|d| d.to_lowercase().contains(&value.to_lowercase())),
        EspSignal::XMailerContains { value } => ev
            .x_mailer
            .map(|x| x.to_lowercase().contains(&value.to_lowercase()))
            .unwrap_or(false),
    }
}

fn default_rules() -> Vec<EspRule> {
    use EspSignal::*;
    vec![
        EspRule {
            name: "HubSpot".into(),
            signals: vec![TrackingDomainContains { value: "hubspot".into() }],
            confidence: EspConfidence::High,
        },
        EspRule {
            name: "Salesforce".into(),
            signals: vec![ReturnPathContains { value: "salesforce".into() }],
            confidence: EspConfidence::High,
        },
        EspRule {
            name: "Klaviyo".into(),
            signals: vec![TrackingDomainContains { value: "klaviyo".into() }],
            confidence: EspConfidence::High,
        },
        EspRule {
            name: "ActiveCampaign".into(),
            signals: vec![TrackingDomainContains { value: "activehosted".into() }],
            confidence: EspConfidence::High,
        },
        EspRule {
            name: "SendGrid".into(),
            signals: vec![HeaderPresent { header: "X-SG-EID".into() }],
            confidence: EspConfidence::High,
        },
        EspRule {
            name: "Mailchimp".into(),
            signals: vec![TrackingDomainContains { value: "list-manage.com".into() }],
            confidence: EspConfidence::High,
        },
        EspRule {
            name: "ConvertKit".into(),
            signals: vec![TrackingDomainContains { value: "convertkit".into() }],
            confidence: EspConfidence::Medium,
        },
        EspRule {
            name: "Postmark".into(),
            signals: vec![XMailerContains { value: "postmark".into() }],
            confidence: EspConfidence::Medium,
        },
        EspRule {
            name: "Constant Contact".into(),
            signals: vec![ReturnPathContains { value: "constantcontact".into() }],
            confidence: EspConfidence::Medium,
        },
    ]
}
