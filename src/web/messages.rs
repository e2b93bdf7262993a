use super::{err_response, ErrResponse};
use crate::store::Store;
use rocket::serde::json::Json;
use rocket::{get, State};
use std::sync::Arc;

#[get("/api/messages?<thread_id>")]
pub fn list_messages(
    store: &State<Arc<Store>>,
    thread_id: Option<&str>,
) -> Result<Json<Vec<crate::domain::Message>>, ErrResponse> {
    let conn = store.conn.lock().unwrap();
    let rows = match thread_id {
        Some(t) => crate::store::message::list_for_thread(&conn, t),
        None => crate::store::message::list_all(&conn),
    }
    .map_err(err_response)?;
    Ok(Json(rows))
}

#[get("/api/messages/<id>")]
pub fn get_message(
    store: &State<Arc<Store>>,
    id: &str,
) -> Result<Option<Json<crate::domain::Message>>, ErrResponse> {
    let conn = store.conn.lock().unwrap();
    let row = crate::store::message::get(&conn, id).map_err(err_response)?;
    Ok(row.map(Json))
}
