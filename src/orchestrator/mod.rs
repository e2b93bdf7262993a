//! Pipeline orchestrator (§4.10). Owns the store and services, runs each
//! stage under a bounded concurrency limiter, and tracks which stages are
//! currently in flight so a second trigger for the same stage while one is
//! running is rejected rather than causing a concurrent double-run.
//!
//! Stages are re-entrant and idempotent by construction (§4, §8): running
//! `metadata` twice reprocesses only what changed, so the in-flight guard
//! here is about avoiding wasted duplicate work, not correctness.

pub mod audit;
pub mod events;

use crate::domain::enums::{RunStatus, Stage, TriggeredBy};
use crate::error::{AppError, AppResult};
use crate::services::Services;
use crate::store::Store;
pub use events::PipelineEvent;
use events::PipelineEventBus;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// The stages a "run all" sweep covers, in dependency order. `engage` is
/// deliberately excluded — it drafts outbound email and only runs when
/// explicitly requested (§4.9, §6.1).
pub const AUTO_STAGES: &[Stage] = &[
    Stage::Metadata,
    Stage::Content,
    Stage::Entities,
    Stage::Classify,
    Stage::Profile,
    Stage::Segment,
];

pub struct StageOutcome {
    pub stage: Stage,
    pub run_id: i64,
    pub items_processed: i64,
}

/// §6.1/§6.5: `retrain` and `crew` are accepted on the `classify` stage
/// (`retrain` folds in recent overrides, `crew` adds a reviewer pass);
/// `crew` alone is also meaningful when `engage` is triggered directly,
/// since `run_stage` itself always rejects `Stage::Engage`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StageOptions {
    pub retrain: bool,
    pub crew: bool,
}

pub struct Orchestrator {
    store: Arc<Store>,
    services: Arc<Services>,
    pub events: Arc<PipelineEventBus>,
    inflight: Mutex<HashSet<Stage>>,
    limiter: Arc<Semaphore>,
}

impl Orchestrator {
    /// `workers` bounds how many stages may run concurrently; the store's
    /// own `Mutex<Connection>` still serializes actual writes, this just
    /// caps contention when several stages are triggered at once.
    pub fn new(store: Arc<Store>, services: Arc<Services>, workers: usize) -> Self {
        Self {
            store,
            services,
            events: Arc::new(PipelineEventBus::new()),
            inflight: Mutex::new(HashSet::new()),
            limiter: Arc::new(Semaphore::new(workers.max(2))),
        }
    }

    fn try_enter(&self, stage: &Stage) -> bool {
        let mut inflight = self.inflight.lock().unwrap();
        if inflight.contains(stage) {
            return false;
        }
        inflight.insert(stage.clone());
        true
    }

    fn leave(&self, stage: &Stage) {
        self.inflight.lock().unwrap().remove(stage);
    }

    /// Runs every `AUTO_STAGES` entry in sequence; each stage's output feeds
    /// the next, so these cannot run concurrently with each other even
    /// though each individually goes through the bounded worker pool.
    pub async fn run_all(&self, triggered_by: TriggeredBy) -> AppResult<Vec<StageOutcome>> {
        let mut outcomes = Vec::new();
        for stage in AUTO_STAGES {
            outcomes.push(
                self.run_stage(stage.clone(), triggered_by.clone(), StageOptions::default())
                    .await?,
            );
        }
        Ok(outcomes)
    }

    pub async fn run_stage(
        &self,
        stage: Stage,
        triggered_by: TriggeredBy,
        opts: StageOptions,
    ) -> AppResult<StageOutcome> {
        if !self.try_enter(&stage) {
            return Err(AppError::invariant(format!("stage {stage} is already running")));
        }
        let _permit = self.limiter.acquire().await.map_err(|_| AppError::Cancelled)?;

        let run_id = {
            let conn = self.store.conn.lock().unwrap();
            crate::store::run::start(
                &conn,
                stage.clone(),
                triggered_by,
                &serde_json::json!({"retrain": opts.retrain, "crew": opts.crew}),
            )?
        };
        self.events.publish(PipelineEvent::Started { run_id, stage: stage.clone() });

        let result = run_stage_body(&self.services, &self.store, &stage, &opts, run_id, triggered_by.clone()).await;

        self.leave(&stage);

        match result {
            Ok(items) => {
                let conn = self.store.conn.lock().unwrap();
                crate::store::run::finish(&conn, run_id, RunStatus::Completed, items, None)?;
                drop(conn);
                self.events.publish(PipelineEvent::Done { run_id, stage: stage.clone(), items });
                Ok(StageOutcome { stage, run_id, items_processed: items })
            }
            Err(e) => {
                let msg = e.to_string();
                let conn = self.store.conn.lock().unwrap();
                crate::store::run::finish(&conn, run_id, RunStatus::Failed, 0, Some(&msg))?;
                drop(conn);
                self.events.publish(PipelineEvent::Failed { run_id, stage: stage.clone(), error: msg });
                Err(e)
            }
        }
    }
}

/// Dispatches a stage tag to its pipeline function. Gem detection rides
/// along with `Profile` (§4.10 registry has no separate tag for it) because
/// `segment` reads the gems `profile` just wrote.
async fn run_stage_body(
    services: &Services,
    store: &Arc<Store>,
    stage: &Stage,
    opts: &StageOptions,
    run_id: i64,
    triggered_by: TriggeredBy,
) -> AppResult<i64> {
    match stage {
        Stage::Metadata => Ok(crate::pipeline::metadata::run(services, store)?.items_processed as i64),
        Stage::Content => Ok(crate::pipeline::content::run(services, store)?.items_processed as i64),
        Stage::Entities => Ok(crate::pipeline::entities::run(services, store).await?.items_processed as i64),
        Stage::Classify => {
            let classify_opts = crate::pipeline::classify::ClassifyOptions {
                model: services.config.ai.model.clone(),
                retrain: opts.retrain,
                crew: opts.crew,
            };
            // §4.10: behavior is identical between triggers, but audit logging
            // of every provider call is only active for web-triggered runs.
            if triggered_by == TriggeredBy::Web {
                let audited_llm: Arc<dyn crate::provider::llm::LlmProvider> = Arc::new(audit::AuditedLlm::new(
                    services.llm.clone(),
                    Arc::clone(store),
                    run_id,
                    stage.clone(),
                    None,
                    "classification",
                ));
                let audited_services = Services {
                    config: services.config.clone(),
                    llm: audited_llm,
                    mail: services.mail.clone(),
                    ner: services.ner.clone(),
                    esp_rules: services.esp_rules.clone(),
                    known_entities: services.known_entities.clone(),
                };
                Ok(crate::pipeline::classify::run(&audited_services, store, &classify_opts)
                    .await?
                    .items_processed as i64)
            } else {
                Ok(crate::pipeline::classify::run(services, store, &classify_opts)
                    .await?
                    .items_processed as i64)
            }
        }
        Stage::Profile => {
            let profiled = crate::pipeline::profile::run(services, store)?.domains_processed as i64;
            let gemmed = crate::pipeline::gems::run(services, store)?.gems_detected as i64;
            Ok(profiled + gemmed)
        }
        Stage::Segment => Ok(crate::pipeline::segment::run(services, store)?.domains_segmented as i64),
        Stage::Engage => Err(AppError::invariant("engage must be triggered explicitly, not via run_stage")),
        Stage::Other(s) => Err(AppError::invariant(format!("unknown stage: {s}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GemsieveConfig;

    fn fixture_orchestrator() -> Orchestrator {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let services = Arc::new(Services::fixture(GemsieveConfig::default()));
        Orchestrator::new(store, services, 2)
    }

    #[tokio::test]
    async fn empty_store_run_all_completes_with_zero_items() {
        let orch = fixture_orchestrator();
        let outcomes = orch.run_all(TriggeredBy::Cli).await.unwrap();
        assert_eq!(outcomes.len(), AUTO_STAGES.len());
        assert!(outcomes.iter().all(|o| o.items_processed == 0));
    }

    #[tokio::test]
    async fn engage_stage_is_rejected_via_run_stage() {
        let orch = fixture_orchestrator();
        let err = orch
            .run_stage(Stage::Engage, TriggeredBy::Cli, StageOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Invariant(_)));
    }
}
