//! `known_entities_file` (§6.2): organizational-root domain lists consulted
//! by the relationship classifier's rule 2 (§4.7.3) ahead of signal-weighted
//! scoring.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KnownEntities {
    #[serde(default)]
    pub infrastructure: HashSet<String>,
    #[serde(default)]
    pub institutional: HashSet<String>,
    #[serde(default)]
    pub marketing_platforms: HashSet<String>,
    #[serde(default)]
    pub user_suppressed: HashSet<String>,
}

impl KnownEntities {
    pub fn load(path: Option<&str>) -> Self {
        if let Some(p) = path
            && let Ok(text) = std::fs::read_to_string(p)
            && let Ok(parsed) = serde_yaml::from_str::<KnownEntities>(&text)
        {
            return parsed;
        }
        Self::default()
    }
}
