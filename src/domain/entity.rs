use super::enums::{EntitySource, EntityType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedEntity {
    pub id: i64,
    pub message_id: String,
    pub entity_type: EntityType,
    pub value: String,
    /// For `date` entities: `<bucket>:future` / `<bucket>:past` (§4.5).
    pub normalized: Option<String>,
    /// Free-form context. For `person` entities this holds the
    /// `ContactRelationship` tag (§4.5); for others, surrounding text.
    pub context: Option<String>,
    pub confidence: f64,
    pub source: EntitySource,
}
