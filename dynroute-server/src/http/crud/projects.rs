use std::collections::HashMap;

use bytes::Bytes;
use hyper::StatusCode;
use serde::Deserialize;
use serde_json::json;

use dynroute_core::store::ProjectPatch;
use dynroute_core::CoreError;

use crate::http::{auth, AppState, JsonResponse};

#[derive(Deserialize)]
struct CreateBody {
    name: String,
    description: Option<String>,
}

pub async fn create(state: &AppState, headers: &HashMap<String, String>, body: &Bytes) -> JsonResponse {
    let owner = auth::owner_id(headers)?;
    let req: CreateBody = serde_json::from_slice(body)?;
    if req.name.trim().is_empty() {
        return Err(CoreError::BadRequest("name must not be empty".into()));
    }
    let project = state
        .store
        .create_project(&owner, &req.name, req.description.as_deref())
        .await?;
    tracing::info!(project_id = %project.id, "project created");
    Ok((StatusCode::CREATED, serde_json::to_value(project).unwrap()))
}

pub async fn list(state: &AppState, headers: &HashMap<String, String>) -> JsonResponse {
    let owner = auth::owner_id(headers)?;
    let projects = state.store.list_projects(&owner).await?;
    Ok((StatusCode::OK, serde_json::to_value(projects).unwrap()))
}

pub async fn get(state: &AppState, headers: &HashMap<String, String>, id: &str) -> JsonResponse {
    let owner = auth::owner_id(headers)?;
    let project = state
        .store
        .get_project(id)
        .await?
        .ok_or_else(|| CoreError::NotFound(id.to_string()))?;
    if project.owner_id != owner {
        return Err(CoreError::Forbidden);
    }
    Ok((StatusCode::OK, serde_json::to_value(project).unwrap()))
}

pub async fn update(
    state: &AppState,
    headers: &HashMap<String, String>,
    id: &str,
    body: &Bytes,
) -> JsonResponse {
    let owner = auth::owner_id(headers)?;
    let patch: ProjectPatch = serde_json::from_slice(body)?;
    if let Some(name) = &patch.name {
        if name.trim().is_empty() {
            return Err(CoreError::BadRequest("name must not be empty".into()));
        }
    }
    let matched = state.store.update_project(id, &owner, patch).await?;
    if !matched {
        return Err(project_not_found_or_forbidden(state, id, &owner).await);
    }
    Ok((StatusCode::OK, json!({ "message": "project updated" })))
}

pub async fn delete(state: &AppState, headers: &HashMap<String, String>, id: &str) -> JsonResponse {
    let owner = auth::owner_id(headers)?;
    let cascade = state.config.cascade_delete_projects;
    let result = state.store.delete_project(id, &owner, cascade).await?;
    let Some(cascade_result) = result else {
        return Err(project_not_found_or_forbidden(state, id, &owner).await);
    };
    for path in cascade_result.endpoint_paths.iter().chain(cascade_result.page_paths.iter()) {
        if let Err(e) = state.registry.unregister(path).await {
            tracing::warn!(%path, error = %e, "failed to unregister route after project delete");
        }
    }
    Ok((StatusCode::OK, json!({ "message": "project deleted" })))
}

async fn project_not_found_or_forbidden(state: &AppState, id: &str, owner: &str) -> CoreError {
    match state.store.get_project(id).await {
        Ok(Some(existing)) if existing.owner_id != owner => CoreError::Forbidden,
        Ok(Some(_)) => CoreError::NotFound(id.to_string()),
        Ok(None) => CoreError::NotFound(id.to_string()),
        Err(e) => e,
    }
}
