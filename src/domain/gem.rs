use super::enums::{EstimatedValue, GemStatus, GemType, Urgency};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GemSignal {
    pub signal: String,
    /// Evidence text for qualitative signals, or a numeric value for
    /// threshold-based ones — kept as a string so both render uniformly.
    pub evidence: String,
    pub threshold: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GemExplanation {
    pub gem_type: GemType,
    pub summary: String,
    pub signals: Vec<GemSignal>,
    pub confidence: f64,
    pub estimated_value: EstimatedValue,
    pub urgency: Urgency,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gem {
    pub id: i64,
    pub gem_type: GemType,
    pub sender_domain: String,
    pub thread_id: Option<String>,
    pub score: f64,
    pub explanation: GemExplanation,
    pub recommended_actions: Vec<String>,
    pub source_message_ids: Vec<String>,
    pub status: GemStatus,
}
