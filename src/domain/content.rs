use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ParsedContent {
    pub message_id: String,
    pub body_clean: String,
    pub signature_block: Option<String>,
    pub primary_headline: Option<String>,
    pub cta_texts: Vec<String>,
    pub offer_types: HashSet<String>,
    pub has_personalization: bool,
    pub personalization_tokens: Vec<String>,
    pub link_count: i64,
    pub tracking_pixel_count: i64,
    pub unique_link_domains: HashSet<String>,
    /// intent -> urls
    pub link_intents: HashMap<String, Vec<String>>,
    pub utm_campaigns: HashSet<String>,
    pub physical_address: Option<String>,
    /// platform -> url
    pub social_links: HashMap<String, String>,
    pub image_count: i64,
    pub template_complexity_score: u8,
}
