use super::{err_response, ErrResponse};
use crate::store::Store;
use rocket::serde::json::Json;
use rocket::{get, State};
use std::sync::Arc;

#[get("/api/stats")]
pub fn overview(store: &State<Arc<Store>>) -> Result<Json<serde_json::Value>, ErrResponse> {
    Ok(Json(store.stats().map_err(err_response)?))
}

#[get("/api/stats/gems-by-type")]
pub fn gems_by_type(store: &State<Arc<Store>>) -> Result<Json<Vec<(String, i64)>>, ErrResponse> {
    let conn = store.conn.lock().unwrap();
    Ok(Json(crate::store::gem::count_by_type(&conn).map_err(err_response)?))
}

#[get("/api/stats/gems-top/<n>")]
pub fn gems_top(
    store: &State<Arc<Store>>,
    n: i64,
) -> Result<Json<Vec<crate::domain::Gem>>, ErrResponse> {
    let conn = store.conn.lock().unwrap();
    Ok(Json(crate::store::gem::list_top(&conn, n).map_err(err_response)?))
}

#[get("/api/stats/by-industry")]
pub fn by_industry(store: &State<Arc<Store>>) -> Result<Json<Vec<(Option<String>, i64)>>, ErrResponse> {
    let conn = store.conn.lock().unwrap();
    Ok(Json(crate::store::profile::stats_by_industry(&conn).map_err(err_response)?))
}

#[get("/api/stats/by-esp")]
pub fn by_esp(store: &State<Arc<Store>>) -> Result<Json<Vec<(Option<String>, i64)>>, ErrResponse> {
    let conn = store.conn.lock().unwrap();
    Ok(Json(crate::store::metadata::stats_by_esp(&conn).map_err(err_response)?))
}

#[get("/api/stats/pipeline-activity?<limit>")]
pub fn pipeline_activity(
    store: &State<Arc<Store>>,
    limit: Option<i64>,
) -> Result<Json<Vec<crate::domain::PipelineRun>>, ErrResponse> {
    let conn = store.conn.lock().unwrap();
    Ok(Json(
        crate::store::run::recent_activity(&conn, limit.unwrap_or(20)).map_err(err_response)?,
    ))
}
