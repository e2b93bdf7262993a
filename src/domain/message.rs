use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Canonical message record returned by a `MailProvider` and persisted verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: String,
    pub thread_id: String,
    pub date: DateTime<Utc>,
    pub from_address: String,
    pub from_name: Option<String>,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub reply_to: Option<String>,
    pub subject: String,
    pub raw_headers: HashMap<String, String>,
    pub html_body: Option<String>,
    pub text_body: Option<String>,
    pub labels: Vec<String>,
    pub size: i64,
    pub is_sent_by_user: bool,
}

impl Message {
    /// Body selection per §4.4 step 1: HTML if present and non-empty, else text.
    pub fn preferred_body(&self) -> &str {
        match &self.html_body {
            Some(h) if !h.trim().is_empty() => h.as_str(),
            _ => self.text_body.as_deref().unwrap_or(""),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: i64,
    pub message_id: String,
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: i64,
}
