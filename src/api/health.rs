use axum::{routing::get, Json, Router};
use serde_json::json;

use crate::api::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/healthz", get(|| async { Json(json!({ "status": "ok" })) }))
}
