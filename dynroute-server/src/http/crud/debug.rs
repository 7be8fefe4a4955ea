use std::collections::HashMap;

use hyper::StatusCode;
use serde_json::json;

use crate::http::{auth, AppState, JsonResponse};

pub async fn routes(state: &AppState, headers: &HashMap<String, String>) -> JsonResponse {
    auth::require_admin(state, headers)?;
    let paths = state.registry.list_paths().await;
    let count = paths.len();
    Ok((StatusCode::OK, json!({ "routes": paths, "count": count })))
}
