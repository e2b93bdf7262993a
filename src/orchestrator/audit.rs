//! Audited LLM decorator (§4.6, §7). Wraps a real `LlmProvider` so every
//! call the pipeline makes is recorded to `ai_audit_entries`, independent of
//! whether the stage that issued it succeeds.

use crate::domain::enums::Stage;
use crate::error::AppResult;
use crate::provider::llm::LlmProvider;
use crate::store::Store;
use std::sync::Arc;
use std::time::Instant;

pub struct AuditedLlm {
    inner: Arc<dyn LlmProvider>,
    store: Arc<Store>,
    run_id: i64,
    stage: Stage,
    sender_domain: Option<String>,
    prompt_template_id: String,
}

impl AuditedLlm {
    pub fn new(
        inner: Arc<dyn LlmProvider>,
        store: Arc<Store>,
        run_id: i64,
        stage: Stage,
        sender_domain: Option<String>,
        prompt_template_id: impl Into<String>,
    ) -> Self {
        Self {
            inner,
            store,
            run_id,
            stage,
            sender_domain,
            prompt_template_id: prompt_template_id.into(),
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for AuditedLlm {
    async fn complete(&self, system: &str, user: &str, model: &str, json_mode: bool) -> AppResult<String> {
        let started = Instant::now();
        let result = self.inner.complete(system, user, model, json_mode).await;
        let duration_ms = started.elapsed().as_millis() as i64;

        let (response_raw, parsed) = match &result {
            Ok(raw) => (
                raw.clone(),
                serde_json::from_str::<serde_json::Value>(raw).ok(),
            ),
            Err(e) => (format!("ERROR: {e}"), None),
        };

        let conn = self.store.conn.lock().unwrap();
        let _ = crate::store::audit::insert(
            &conn,
            self.run_id,
            self.stage.clone(),
            self.sender_domain.as_deref(),
            &self.prompt_template_id,
            user,
            system,
            model,
            &response_raw,
            parsed.as_ref(),
            duration_ms,
        );
        drop(conn);

        result
    }
}
