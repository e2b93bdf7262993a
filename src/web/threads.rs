use super::{err_response, ErrResponse};
use crate::store::Store;
use rocket::serde::json::Json;
use rocket::{get, State};
use std::sync::Arc;

#[get("/api/threads")]
pub fn list_threads(store: &State<Arc<Store>>) -> Result<Json<Vec<crate::domain::Thread>>, ErrResponse> {
    let conn = store.conn.lock().unwrap();
    let rows = crate::store::thread::list_all(&conn).map_err(err_response)?;
    Ok(Json(rows))
}

#[get("/api/threads/<id>")]
pub fn get_thread(
    store: &State<Arc<Store>>,
    id: &str,
) -> Result<Option<Json<crate::domain::Thread>>, ErrResponse> {
    let conn = store.conn.lock().unwrap();
    let row = crate::store::thread::get(&conn, id).map_err(err_response)?;
    Ok(row.map(Json))
}
