use super::{err_response, ErrResponse};
use crate::store::Store;
use rocket::serde::json::Json;
use rocket::{get, State};
use std::sync::Arc;

#[get("/api/ai-audit?<stage>&<limit>&<offset>")]
pub fn list_audit(
    store: &State<Arc<Store>>,
    stage: Option<&str>,
    limit: Option<i64>,
    offset: Option<i64>,
) -> Result<Json<Vec<crate::domain::AiAuditEntry>>, ErrResponse> {
    let conn = store.conn.lock().unwrap();
    let rows = crate::store::audit::list(&conn, stage, limit.unwrap_or(50), offset.unwrap_or(0))
        .map_err(err_response)?;
    Ok(Json(rows))
}

#[get("/api/ai-audit/<id>")]
pub fn get_audit(
    store: &State<Arc<Store>>,
    id: i64,
) -> Result<Option<Json<crate::domain::AiAuditEntry>>, ErrResponse> {
    let conn = store.conn.lock().unwrap();
    let row = crate::store::audit::get(&conn, id).map_err(err_response)?;
    Ok(row.map(Json))
}
