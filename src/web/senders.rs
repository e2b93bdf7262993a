use super::{err_response, ErrResponse};
use crate::store::Store;
use rocket::serde::json::Json;
use rocket::{get, State};
use std::sync::Arc;

#[get("/api/senders")]
pub fn list_senders(store: &State<Arc<Store>>) -> Result<Json<Vec<crate::domain::SenderProfile>>, ErrResponse> {
    let conn = store.conn.lock().unwrap();
    let rows = crate::store::profile::list_all(&conn).map_err(err_response)?;
    Ok(Json(rows))
}

#[get("/api/senders/<domain>")]
pub fn get_sender(
    store: &State<Arc<Store>>,
    domain: &str,
) -> Result<Option<Json<crate::domain::SenderProfile>>, ErrResponse> {
    let conn = store.conn.lock().unwrap();
    let row = crate::store::profile::get(&conn, domain).map_err(err_response)?;
    Ok(row.map(Json))
}
