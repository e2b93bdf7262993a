use super::enums::{Channel, DraftStatus, Strategy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementDraft {
    pub id: i64,
    pub gem_id: i64,
    pub sender_domain: String,
    pub strategy: Strategy,
    pub channel: Channel,
    pub subject_line: String,
    pub body_text: String,
    pub body_html: Option<String>,
    pub status: DraftStatus,
    pub generated_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub response_received: bool,
    pub response_sentiment: Option<String>,
}
