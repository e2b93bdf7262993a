use super::enums::AwaitingResponseFrom;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub thread_id: String,
    pub normalized_subject: String,
    pub participant_count: i64,
    pub message_count: i64,
    pub first_message_date: DateTime<Utc>,
    pub last_message_date: DateTime<Utc>,
    pub last_sender: String,
    pub user_participated: bool,
    pub user_last_replied: Option<DateTime<Utc>>,
    pub awaiting_response_from: AwaitingResponseFrom,
    pub days_dormant: i64,
}
