use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenderSegment {
    pub sender_domain: String,
    pub segment: String,
    pub sub_segment: String,
    pub confidence: f64,
}
