//! `GemsieveConfig` — the single structured config surface (§6.2).
//!
//! Loaded from `$GEMSIEVE_CONFIG`, `./config.yaml`, or a user config dir
//! path, parsed with `serde_yaml`. `Config::default()` -> `save_to` ->
//! `load_from` must round-trip byte-for-byte (§8).

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GmailConfig {
    #[serde(default)]
    pub credentials_file: Option<String>,
    #[serde(default)]
    pub token_file: Option<String>,
    #[serde(default = "default_query")]
    pub default_query: String,
}

fn default_query() -> String {
    "in:inbox".to_string()
}

impl Default for GmailConfig {
    fn default() -> Self {
        Self {
            credentials_file: None,
            token_file: None,
            default_query: default_query(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,
}

fn default_sqlite_path() -> String {
    "data/gemsieve.db".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: default_sqlite_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AiConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub ollama_base_url: Option<String>,
    #[serde(default)]
    pub ollama_api_key: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_body_chars")]
    pub max_body_chars: usize,
}

fn default_provider() -> String {
    "ollama".to_string()
}
fn default_model() -> String {
    "llama3".to_string()
}
fn default_batch_size() -> usize {
    10
}
fn default_max_body_chars() -> usize {
    2000
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            ollama_base_url: None,
            ollama_api_key: None,
            batch_size: default_batch_size(),
            max_body_chars: default_max_body_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntityExtractionConfig {
    #[serde(default = "default_spacy_model")]
    pub spacy_model: String,
    #[serde(default = "default_true")]
    pub extract_monetary: bool,
    #[serde(default = "default_true")]
    pub extract_dates: bool,
    #[serde(default = "default_true")]
    pub extract_procurement: bool,
}

fn default_spacy_model() -> String {
    "en_core_web_sm".to_string()
}

impl Default for EntityExtractionConfig {
    fn default() -> Self {
        Self {
            spacy_model: default_spacy_model(),
            extract_monetary: true,
            extract_dates: true,
            extract_procurement: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ScoringWeights {
    #[serde(default)]
    pub overrides: HashMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DormantThreadConfig {
    #[serde(default = "default_min_dormancy_days")]
    pub min_dormancy_days: i64,
}

fn default_min_dormancy_days() -> i64 {
    14
}

impl Default for DormantThreadConfig {
    fn default() -> Self {
        Self {
            min_dormancy_days: default_min_dormancy_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ScoringConfig {
    #[serde(default)]
    pub target_industries: Vec<String>,
    #[serde(default)]
    pub weights: ScoringWeights,
    #[serde(default)]
    pub dormant_thread: DormantThreadConfig,
    #[serde(default)]
    pub require_human_sender: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EngagementConfig {
    #[serde(default)]
    pub your_name: String,
    #[serde(default)]
    pub your_service: String,
    #[serde(default)]
    pub your_tone: String,
    #[serde(default)]
    pub your_audience: String,
    #[serde(default)]
    pub preferred_strategies: Vec<String>,
    #[serde(default = "default_max_outreach")]
    pub max_outreach_per_day: i64,
}

fn default_max_outreach() -> i64 {
    10
}

impl EngagementConfig {
    fn default_max() -> i64 {
        default_max_outreach()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GemsieveConfig {
    #[serde(default)]
    pub gmail: GmailConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub entity_extraction: EntityExtractionConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub engagement: EngagementConfig,
    /// Path to a YAML file with `infrastructure` / `institutional` /
    /// `marketing_platforms` / `user_suppressed` domain lists (§6.2, §4.7.3).
    #[serde(default)]
    pub known_entities_file: Option<String>,
    #[serde(default)]
    pub esp_fingerprints_file: Option<String>,
    #[serde(default)]
    pub custom_segments_file: Option<String>,
}

impl Default for GemsieveConfig {
    fn default() -> Self {
        Self {
            gmail: GmailConfig::default(),
            storage: StorageConfig::default(),
            ai: AiConfig::default(),
            entity_extraction: EntityExtractionConfig::default(),
            scoring: ScoringConfig::default(),
            engagement: EngagementConfig {
                max_outreach_per_day: EngagementConfig::default_max(),
                ..EngagementConfig::default()
            },
            known_entities_file: None,
            esp_fingerprints_file: None,
            custom_segments_file: None,
        }
    }
}

impl GemsieveConfig {
    pub fn load_from(path: &Path) -> AppResult<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&text)
            .map_err(|e| AppError::config(format!("malformed config at {}: {e}", path.display())))
    }

    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        let text = serde_yaml::to_string(self)
            .map_err(|e| AppError::config(format!("failed to serialize config: {e}")))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Default config file search path when no explicit path is given:
    /// user config dir, then `./config.yaml`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("gemsieve").join("config.yaml"))
            .unwrap_or_else(|| PathBuf::from("config.yaml"))
    }

    /// Loads from `$GEMSIEVE_CONFIG`, then `./config.yaml`, then the user
    /// config dir, falling back to defaults if none exist. Applies env-var
    /// overrides (§6.2) after the file load.
    pub fn load() -> AppResult<Self> {
        let mut config = if let Ok(path) = std::env::var("GEMSIEVE_CONFIG") {
            Self::load_from(Path::new(&path))?
        } else if Path::new("config.yaml").exists() {
            Self::load_from(Path::new("config.yaml"))?
        } else {
            let default_path = Self::default_path();
            if default_path.exists() {
                Self::load_from(&default_path)?
            } else {
                Self::default()
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("DATABASE_URL") {
            self.storage.sqlite_path = v;
        }
        if let Ok(v) = std::env::var("ollama_host") {
            self.ai.ollama_base_url = Some(v);
        }
        if let Ok(v) = std::env::var("ollama_api_key") {
            self.ai.ollama_api_key = Some(v);
        }
        if let Ok(v) = std::env::var("model_name") {
            self.ai.model = v;
        }
        // ANTHROPIC_API_KEY / OPENAI_API_KEY are read directly by the LLM
        // provider construction site (src/provider/llm.rs), not stored here.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_round_trips_through_yaml() {
        let cfg = GemsieveConfig::default();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        cfg.save_to(&path).unwrap();
        let loaded = GemsieveConfig::load_from(&path).unwrap();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn malformed_yaml_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "not: [valid yaml").unwrap();
        let err = GemsieveConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
