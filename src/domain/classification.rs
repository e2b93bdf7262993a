use super::enums::{CompanySize, OverrideScope, SenderIntent};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiClassification {
    pub message_id: String,
    pub industry: String,
    pub company_size_estimate: CompanySize,
    pub marketing_sophistication: u8,
    pub sender_intent: SenderIntent,
    pub product_type: String,
    pub product_description: String,
    pub pain_points: Vec<String>,
    pub target_audience: String,
    pub partner_program_detected: bool,
    pub renewal_signal_detected: bool,
    pub ai_confidence: f64,
    pub model_used: String,
    pub has_override: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationOverride {
    pub id: i64,
    pub message_id: Option<String>,
    pub sender_domain: String,
    pub field_name: String,
    pub original_value: Option<String>,
    pub corrected_value: String,
    pub scope: OverrideScope,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
