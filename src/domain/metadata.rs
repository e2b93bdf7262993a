use super::enums::EspConfidence;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedMetadata {
    pub message_id: String,
    /// Organizational-root normalization of the From host (e.g. `intuit.com`
    /// from `notification.intuit.com`). Sender-domain collisions across
    /// distinct ESPs that legitimately share a mail host are a known,
    /// accepted limitation (§9 open question) — not resolved via reply-to.
    pub sender_domain: String,
    /// Raw From host, unreduced.
    pub sender_subdomain: String,
    pub envelope_sender: Option<String>,
    pub esp_identified: Option<String>,
    pub esp_confidence: Option<EspConfidence>,
    pub dkim_domain: Option<String>,
    pub spf_result: Option<String>,
    pub dmarc_result: Option<String>,
    pub sending_ip: Option<String>,
    pub mail_server: Option<String>,
    pub x_mailer: Option<String>,
    pub precedence: Option<String>,
    pub feedback_id: Option<String>,
    pub list_unsubscribe_url: Option<String>,
    pub list_unsubscribe_email: Option<String>,
    pub is_bulk: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SenderTemporal {
    pub sender_domain: String,
    pub first_seen: Option<chrono::DateTime<chrono::Utc>>,
    pub last_seen: Option<chrono::DateTime<chrono::Utc>>,
    pub total_messages: i64,
    pub avg_frequency_days: Option<f64>,
    pub most_common_hour: Option<u8>,
    pub most_common_weekday: Option<u8>,
}
