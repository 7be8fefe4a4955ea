use std::collections::HashMap;

use bytes::Bytes;
use hyper::StatusCode;
use serde::Deserialize;
use serde_json::json;

use dynroute_core::store::PagePatch;
use dynroute_core::CoreError;

use super::compose_page_path;
use crate::http::{auth, AppState, JsonResponse};

#[derive(Deserialize)]
struct CreateBody {
    path: String,
    #[serde(rename = "htmlContent")]
    html_content: String,
    #[serde(rename = "projectId")]
    project_id: String,
}

pub async fn create(state: &AppState, headers: &HashMap<String, String>, body: &Bytes) -> JsonResponse {
    let owner = auth::owner_id(headers)?;
    let req: CreateBody = serde_json::from_slice(body)?;

    let project = state
        .store
        .get_project(&req.project_id)
        .await?
        .ok_or_else(|| CoreError::NotFound(req.project_id.clone()))?;
    if project.owner_id != owner {
        return Err(CoreError::Forbidden);
    }

    let full_path = compose_page_path(&project.name_slug(), &req.path);
    if full_path.starts_with("/api/") {
        return Err(CoreError::BadRequest("pages may not live under /api/".into()));
    }

    let page = state
        .store
        .create_page(&owner, &full_path, &req.html_content, &project.id)
        .await?;

    if let Err(e) = state.registry.register_page(&page.path, &page.html_content).await {
        tracing::warn!(path = %page.path, error = %e, "page stored but registry registration failed");
    }
    tracing::info!(path = %page.path, "page created");
    Ok((StatusCode::CREATED, serde_json::to_value(page).unwrap()))
}

pub async fn list(state: &AppState, headers: &HashMap<String, String>, _query: &HashMap<String, String>) -> JsonResponse {
    let owner = auth::owner_id(headers)?;
    let pages = state.store.list_pages_by_owner(&owner).await?;
    Ok((StatusCode::OK, serde_json::to_value(pages).unwrap()))
}

pub async fn get(state: &AppState, headers: &HashMap<String, String>, id: &str) -> JsonResponse {
    let owner = auth::owner_id(headers)?;
    let page = state
        .store
        .get_page_by_id(id)
        .await?
        .ok_or_else(|| CoreError::NotFound(id.to_string()))?;
    if page.owner_id != owner {
        return Err(CoreError::Forbidden);
    }
    Ok((StatusCode::OK, serde_json::to_value(page).unwrap()))
}

pub async fn update(
    state: &AppState,
    headers: &HashMap<String, String>,
    id: &str,
    body: &Bytes,
) -> JsonResponse {
    let owner = auth::owner_id(headers)?;
    let patch: PagePatch = serde_json::from_slice(body)?;
    if patch.is_empty() {
        return Err(CoreError::BadRequest("no fields to update".into()));
    }

    let existing = state
        .store
        .get_page_by_id(id)
        .await?
        .ok_or_else(|| CoreError::NotFound(id.to_string()))?;
    if existing.owner_id != owner {
        return Err(CoreError::Forbidden);
    }
    let path_changed = patch.path.as_deref().is_some_and(|p| p != existing.path);

    let updated = state
        .store
        .update_page(id, &owner, patch)
        .await?
        .ok_or_else(|| CoreError::NotFound(id.to_string()))?;

    if path_changed {
        if let Err(e) = state.registry.unregister(&existing.path).await {
            tracing::warn!(path = %existing.path, error = %e, "failed to unregister old page path");
        }
    }
    if let Err(e) = state.registry.register_page(&updated.path, &updated.html_content).await {
        tracing::warn!(path = %updated.path, error = %e, "page updated but registry registration failed");
    }
    Ok((StatusCode::OK, json!({ "message": "page updated" })))
}

pub async fn delete(state: &AppState, headers: &HashMap<String, String>, id: &str) -> JsonResponse {
    let owner = auth::owner_id(headers)?;
    let existing = state
        .store
        .get_page_by_id(id)
        .await?
        .ok_or_else(|| CoreError::NotFound(id.to_string()))?;
    if existing.owner_id != owner {
        return Err(CoreError::Forbidden);
    }
    let deleted = state.store.delete_page(id, &owner).await?;
    if !deleted {
        return Err(CoreError::NotFound(id.to_string()));
    }
    if let Err(e) = state.registry.unregister(&existing.path).await {
        tracing::warn!(path = %existing.path, error = %e, "page deleted but registry unregister failed");
    }
    Ok((StatusCode::OK, json!({ "message": "page deleted" })))
}
