//! One explicit `Services` context assembled top-down at startup (§9 design
//! note: "no process-wide singletons after initialization"). Carries the
//! configured AI/mail/NER providers and the effectively-immutable pattern
//! tables (ESP rules, known entities, public-suffix list) that every stage
//! reads without locking.

use crate::config::GemsieveConfig;
use crate::pipeline::esp::EspRules;
use crate::pipeline::known_entities::KnownEntities;
use crate::provider::llm::{FixtureLlmProvider, HttpLlmClient};
use crate::provider::mail::{FixtureMailProvider, MailProvider};
use crate::provider::ner::{HeuristicNerTagger, NerTagger};
use crate::provider::LlmProvider;
use std::sync::Arc;
use std::time::Duration;

pub struct Services {
    pub config: GemsieveConfig,
    pub llm: Arc<dyn LlmProvider>,
    pub mail: Arc<dyn MailProvider>,
    pub ner: Arc<dyn NerTagger>,
    pub esp_rules: Arc<EspRules>,
    pub known_entities: Arc<KnownEntities>,
}

impl Services {
    /// Builds the real-use context: HTTP-backed LLM client, a mail provider
    /// that must be swapped in by the caller (ingestion is out of scope
    /// per §1 so no default network implementation ships), heuristic NER.
    pub fn new(config: GemsieveConfig, mail: Arc<dyn MailProvider>) -> Self {
        let llm: Arc<dyn LlmProvider> = Arc::new(HttpLlmClient::new(
            config
                .ai
                .ollama_base_url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            config.ai.ollama_api_key.clone(),
            std::env::var("OPENAI_API_KEY").ok(),
            std::env::var("ANTHROPIC_API_KEY").ok(),
            Duration::from_secs(60),
        ));
        let esp_rules = Arc::new(EspRules::load(config.esp_fingerprints_file.as_deref()));
        let known_entities = Arc::new(KnownEntities::load(config.known_entities_file.as_deref()));
        Self {
            config,
            llm,
            mail,
            ner: Arc::new(HeuristicNerTagger),
            esp_rules,
            known_entities,
        }
    }

    /// Fully in-memory context for tests: fixture mail, fixture LLM, heuristic NER.
    pub fn fixture(config: GemsieveConfig) -> Self {
        let esp_rules = Arc::new(EspRules::load(None));
        let known_entities = Arc::new(KnownEntities::load(None));
        Self {
            config,
            llm: Arc::new(FixtureLlmProvider),
            mail: Arc::new(FixtureMailProvider::new(Vec::new())),
            ner: Arc::new(HeuristicNerTagger),
            esp_rules,
            known_entities,
        }
    }
}
