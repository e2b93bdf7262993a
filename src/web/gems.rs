use super::{err_response, AdminKey, ErrResponse};
use crate::domain::enums::{RunStatus, Stage, TriggeredBy};
use crate::orchestrator::{audit::AuditedLlm, Orchestrator};
use crate::pipeline::engage::{self, EngageOptions};
use crate::provider::llm::LlmProvider;
use crate::services::Services;
use crate::store::Store;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{get, post, State};
use std::sync::Arc;

#[get("/api/gems?<top>&<gem_type>")]
pub fn list_gems(
    store: &State<Arc<Store>>,
    top: Option<i64>,
    gem_type: Option<&str>,
) -> Result<Json<Vec<crate::domain::Gem>>, ErrResponse> {
    let conn = store.conn.lock().unwrap();
    let rows = if let Some(n) = top {
        crate::store::gem::list_top(&conn, n)
    } else if let Some(t) = gem_type {
        crate::store::gem::list_by_type(&conn, t)
    } else {
        crate::store::gem::list_all(&conn)
    }
    .map_err(err_response)?;
    Ok(Json(rows))
}

#[get("/api/gems/<id>")]
pub fn get_gem(
    store: &State<Arc<Store>>,
    id: i64,
) -> Result<Option<Json<crate::domain::Gem>>, ErrResponse> {
    let conn = store.conn.lock().unwrap();
    let row = crate::store::gem::get(&conn, id).map_err(err_response)?;
    Ok(row.map(Json))
}

/// POST /api/gems/{id}/generate — drafts an engagement email for one gem.
/// Admin-gated: mutating endpoints that invoke the LLM provider require the
/// same bearer/`X-Admin-Key` the pipeline-run endpoints require.
#[post("/api/gems/<id>/generate", format = "json", data = "<body>")]
pub async fn generate_for_gem(
    store: &State<Arc<Store>>,
    services: &State<Arc<Services>>,
    _orchestrator: &State<Arc<Orchestrator>>,
    _admin: AdminKey,
    id: i64,
    body: Json<GenerateRequest>,
) -> Result<Json<serde_json::Value>, ErrResponse> {
    let model = body
        .model
        .clone()
        .unwrap_or_else(|| format!("{}:{}", services.config.ai.provider, services.config.ai.model));
    let opts = EngageOptions {
        model,
        explicit_gem_id: Some(id),
        crew: body.crew.unwrap_or(false),
    };

    // §4.6/§7: this is a web-triggered provider call, so it must be captured
    // in `ai_audit_entries` the same way a web-triggered classify stage is.
    let run_id = {
        let conn = store.conn.lock().unwrap();
        crate::store::run::start(&conn, Stage::Engage, TriggeredBy::Web, &serde_json::json!({"gem_id": id}))
            .map_err(err_response)?
    };
    let audited_llm: Arc<dyn LlmProvider> = Arc::new(AuditedLlm::new(
        services.llm.clone(),
        Arc::clone(&*store),
        run_id,
        Stage::Engage,
        None,
        "engagement",
    ));
    let audited_services = Services {
        config: services.config.clone(),
        llm: audited_llm,
        mail: services.mail.clone(),
        ner: services.ner.clone(),
        esp_rules: services.esp_rules.clone(),
        known_entities: services.known_entities.clone(),
    };

    let result = engage::run(&audited_services, &**store, &opts).await;

    let conn = store.conn.lock().unwrap();
    match &result {
        Ok(report) => {
            let _ = crate::store::run::finish(&conn, run_id, RunStatus::Completed, report.drafts_generated as i64, None);
        }
        Err(e) => {
            let _ = crate::store::run::finish(&conn, run_id, RunStatus::Failed, 0, Some(&e.to_string()));
        }
    }
    drop(conn);

    let report = result.map_err(err_response)?;
    if report.drafts_generated == 0 && !report.errors.is_empty() {
        return Err((
            Status::UnprocessableEntity,
            Json(serde_json::json!({"error": report.errors.join("; ")})),
        ));
    }
    Ok(Json(serde_json::json!({"drafts_generated": report.drafts_generated})))
}

#[derive(serde::Deserialize, Default)]
pub struct GenerateRequest {
    model: Option<String>,
    crew: Option<bool>,
}
