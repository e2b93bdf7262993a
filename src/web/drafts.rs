use super::{err_response, ErrResponse};
use crate::store::Store;
use rocket::serde::json::Json;
use rocket::{get, State};
use std::sync::Arc;

#[get("/api/drafts")]
pub fn list_drafts(store: &State<Arc<Store>>) -> Result<Json<Vec<crate::domain::EngagementDraft>>, ErrResponse> {
    let conn = store.conn.lock().unwrap();
    let rows = crate::store::draft::list_all(&conn).map_err(err_response)?;
    Ok(Json(rows))
}
