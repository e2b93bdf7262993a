//! `/api/pipeline/*` and `/api/stages` (§6.5). `run_stage` awaits the stage
//! to completion before responding — there's no background-job registry in
//! this crate to hand back a pending run id against, so the response here
//! carries the already-finished outcome; `run_status`/`list_runs` still let
//! a caller look up any run (including ones triggered from the CLI) by id.

use super::{err_response, AdminKey, ErrResponse};
use crate::domain::enums::{Stage, TriggeredBy};
use crate::orchestrator::{Orchestrator, PipelineEvent, StageOptions};
use crate::store::Store;
use rocket::response::stream::{Event, EventStream};
use rocket::serde::json::Json;
use rocket::{get, post, State};
use std::str::FromStr;
use std::sync::Arc;

#[derive(serde::Deserialize, Default)]
pub struct RunStageRequest {
    retrain: Option<bool>,
    crew: Option<bool>,
}

#[post("/api/pipeline/run/<stage>", format = "json", data = "<body>")]
pub async fn run_stage(
    orchestrator: &State<Arc<Orchestrator>>,
    _admin: AdminKey,
    stage: &str,
    body: Json<RunStageRequest>,
) -> Result<Json<serde_json::Value>, ErrResponse> {
    let opts = StageOptions {
        retrain: body.retrain.unwrap_or(false),
        crew: body.crew.unwrap_or(false),
    };

    if stage == "all" {
        let outcomes = orchestrator.run_all(TriggeredBy::Web).await.map_err(err_response)?;
        let runs: Vec<_> = outcomes
            .iter()
            .map(|o| serde_json::json!({"run_id": o.run_id, "stage": o.stage.as_str(), "items_processed": o.items_processed}))
            .collect();
        return Ok(Json(serde_json::json!({"runs": runs})));
    }

    let stage = Stage::from_str(stage).unwrap();
    let outcome = orchestrator
        .run_stage(stage, TriggeredBy::Web, opts)
        .await
        .map_err(err_response)?;
    Ok(Json(serde_json::json!({
        "run_id": outcome.run_id,
        "stage": outcome.stage.as_str(),
        "items_processed": outcome.items_processed,
    })))
}

#[get("/api/pipeline/status/<run_id>")]
pub fn run_status(
    store: &State<Arc<Store>>,
    run_id: i64,
) -> Result<Option<Json<crate::domain::PipelineRun>>, ErrResponse> {
    let conn = store.conn.lock().unwrap();
    let row = crate::store::run::get(&conn, run_id).map_err(err_response)?;
    Ok(row.map(Json))
}

#[get("/api/pipeline/runs?<limit>")]
pub fn list_runs(
    store: &State<Arc<Store>>,
    limit: Option<i64>,
) -> Result<Json<Vec<crate::domain::PipelineRun>>, ErrResponse> {
    let conn = store.conn.lock().unwrap();
    let rows = match limit {
        Some(n) => crate::store::run::recent_activity(&conn, n),
        None => crate::store::run::list_all(&conn),
    }
    .map_err(err_response)?;
    Ok(Json(rows))
}

#[get("/api/pipeline/stream")]
pub fn stream(orchestrator: &State<Arc<Orchestrator>>) -> EventStream![] {
    let mut rx = orchestrator.events.sender.subscribe();
    EventStream! {
        loop {
            match rx.recv().await {
                Ok(PipelineEvent::Started { run_id, stage }) => {
                    yield Event::json(&serde_json::json!({"run_id": run_id, "stage": stage.as_str()})).event("STARTED");
                }
                Ok(PipelineEvent::Done { run_id, stage, items }) => {
                    yield Event::json(&serde_json::json!({"run_id": run_id, "stage": stage.as_str(), "items": items})).event("DONE");
                }
                Ok(PipelineEvent::Failed { run_id, stage, error }) => {
                    yield Event::json(&serde_json::json!({"run_id": run_id, "stage": stage.as_str(), "error": error})).event("FAILED");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
            }
        }
    }
}

#[get("/api/stages")]
pub fn list_stages() -> Json<Vec<&'static str>> {
    Json(crate::orchestrator::AUTO_STAGES.iter().map(|s| s.as_str()).collect())
}
