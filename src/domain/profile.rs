use super::enums::{CompanySize, RelationshipType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnownContact {
    pub name: String,
    pub role: Option<String>,
    pub email: String,
    /// decision_maker > peer > vendor_contact > automated
    pub priority_rank: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenderProfile {
    pub sender_domain: String,
    pub company_name: Option<String>,
    pub primary_email: Option<String>,
    pub reply_to_email: Option<String>,
    pub industry: Option<String>,
    pub company_size: Option<CompanySize>,
    pub marketing_sophistication_avg: f64,
    pub sophistication_trend: Vec<f64>,
    pub esp_used: Option<String>,
    pub product_type: Option<String>,
    pub product_description: Option<String>,
    pub pain_points: Vec<String>,
    pub target_audience: Option<String>,
    pub known_contacts: Vec<KnownContact>,
    pub total_messages: i64,
    pub first_contact: Option<DateTime<Utc>>,
    pub last_contact: Option<DateTime<Utc>>,
    pub avg_frequency_days: Option<f64>,
    pub offer_type_distribution: HashMap<String, i64>,
    pub cta_texts_all: HashSet<String>,
    pub social_links: HashMap<String, String>,
    pub physical_address: Option<String>,
    pub utm_campaign_names: HashSet<String>,
    pub has_personalization: bool,
    pub has_partner_program: bool,
    pub partner_program_urls: Vec<String>,
    pub renewal_dates: Vec<DateTime<Utc>>,
    pub monetary_signals: Vec<String>,
    pub authentication_quality: Option<String>,
    pub unsubscribe_url: Option<String>,
    pub economic_segments: HashSet<String>,
    pub thread_initiation_ratio: f64,
    pub user_reply_rate: f64,
}

impl SenderProfile {
    pub fn empty(sender_domain: impl Into<String>) -> Self {
        Self {
            sender_domain: sender_domain.into(),
            company_name: None,
            primary_email: None,
            reply_to_email: None,
            industry: None,
            company_size: None,
            marketing_sophistication_avg: 1.0,
            sophistication_trend: Vec::new(),
            esp_used: None,
            product_type: None,
            product_description: None,
            pain_points: Vec::new(),
            target_audience: None,
            known_contacts: Vec::new(),
            total_messages: 0,
            first_contact: None,
            last_contact: None,
            avg_frequency_days: None,
            offer_type_distribution: HashMap::new(),
            cta_texts_all: HashSet::new(),
            social_links: HashMap::new(),
            physical_address: None,
            utm_campaign_names: HashSet::new(),
            has_personalization: false,
            has_partner_program: false,
            partner_program_urls: Vec::new(),
            renewal_dates: Vec::new(),
            monetary_signals: Vec::new(),
            authentication_quality: None,
            unsubscribe_url: None,
            economic_segments: HashSet::new(),
            thread_initiation_ratio: 0.0,
            user_reply_rate: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RelationshipSource {
    Manual,
    AutoDetected,
    Learned,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenderRelationship {
    pub sender_domain: String,
    pub relationship_type: RelationshipType,
    pub note: Option<String>,
    pub suppress_gems: bool,
    pub source: RelationshipSource,
}
