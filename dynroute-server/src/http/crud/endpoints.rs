use std::collections::HashMap;

use bytes::Bytes;
use hyper::StatusCode;
use serde::Deserialize;
use serde_json::json;

use dynroute_core::dispatch::is_reserved_api_path;
use dynroute_core::model::HttpMethod;
use dynroute_core::store::EndpointPatch;
use dynroute_core::{CoreError, Language};

use super::compose_endpoint_path;
use crate::http::{auth, AppState, JsonResponse};

#[derive(Deserialize)]
struct CreateBody {
    path: String,
    code: String,
    #[serde(default)]
    parameters: Vec<String>,
    #[serde(default, rename = "httpMethod")]
    http_method: Option<HttpMethod>,
    #[serde(default)]
    language: Option<Language>,
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

    let full_path = compose_endpoint_path(&project.name_slug(), &req.path);
    if is_reserved_api_path(&full_path) {
        return Err(CoreError::BadRequest(format!(
            "{full_path} collides with a reserved system route"
        )));
    }

    let method = req.http_method.unwrap_or_default();
    let language = req.language.unwrap_or_default();
    let endpoint = state
        .store
        .create_endpoint(&owner, &full_path, &req.parameters, &req.code, method, language, &project.id)
        .await?;

    if let Err(e) = state
        .registry
        .register_endpoint(&endpoint.path, endpoint.parameters.clone(), &endpoint.code, endpoint.http_method, endpoint.language)
        .await
    {
        tracing::warn!(path = %endpoint.path, error = %e, "endpoint stored but registry registration failed");
    }
    tracing::info!(path = %endpoint.path, "endpoint created");
    Ok((StatusCode::CREATED, serde_json::to_value(endpoint).unwrap()))
}

pub async fn list(state: &AppState, headers: &HashMap<String, String>, _query: &HashMap<String, String>) -> JsonResponse {
    let owner = auth::owner_id(headers)?;
    let endpoints = state.store.list_endpoints_by_owner(&owner).await?;
    Ok((StatusCode::OK, serde_json::to_value(endpoints).unwrap()))
}

pub async fn get(state: &AppState, headers: &HashMap<String, String>, id: &str) -> JsonResponse {
    let owner = auth::owner_id(headers)?;
    let endpoint = state
        .store
        .get_endpoint_by_id(id)
        .await?
        .ok_or_else(|| CoreError::NotFound(id.to_string()))?;
    if endpoint.owner_id != owner {
        return Err(CoreError::Forbidden);
    }
    Ok((StatusCode::OK, serde_json::to_value(endpoint).unwrap()))
}

pub async fn update(
    state: &AppState,
    headers: &HashMap<String, String>,
    id: &str,
    body: &Bytes,
) -> JsonResponse {
    let owner = auth::owner_id(headers)?;
    let patch: EndpointPatch = serde_json::from_slice(body)?;
    if patch.is_empty() {
        return Err(CoreError::BadRequest("no fields to update".into()));
    }

    let existing = state
        .store
        .get_endpoint_by_id(id)
        .await?
        .ok_or_else(|| CoreError::NotFound(id.to_string()))?;
    if existing.owner_id != owner {
        return Err(CoreError::Forbidden);
    }

    let path_changed = patch.path.as_deref().is_some_and(|p| p != existing.path);
    let updated = state
        .store
        .update_endpoint(id, &owner, patch)
        .await?
        .ok_or_else(|| CoreError::NotFound(id.to_string()))?;

    // Release the old handler: either it moved to a new key, or its code/
    // method/language changed in place. Either way `register_endpoint` at
    // the (possibly new) path replaces whatever was compiled for it.
    if path_changed {
        if let Err(e) = state.registry.unregister(&existing.path).await {
            tracing::warn!(path = %existing.path, error = %e, "failed to unregister old endpoint path");
        }
    }
    if let Err(e) = state
        .registry
        .register_endpoint(&updated.path, updated.parameters.clone(), &updated.code, updated.http_method, updated.language)
        .await
    {
        tracing::warn!(path = %updated.path, error = %e, "endpoint updated but registry registration failed");
    }
    Ok((StatusCode::OK, json!({ "message": "endpoint updated" })))
}

pub async fn delete(state: &AppState, headers: &HashMap<String, String>, id: &str) -> JsonResponse {
    let owner = auth::owner_id(headers)?;
    let existing = state
        .store
        .get_endpoint_by_id(id)
        .await?
        .ok_or_else(|| CoreError::NotFound(id.to_string()))?;
    if existing.owner_id != owner {
        return Err(CoreError::Forbidden);
    }
    let deleted = state.store.delete_endpoint(id, &owner).await?;
    if !deleted {
        return Err(CoreError::NotFound(id.to_string()));
    }
    if let Err(e) = state.registry.unregister(&existing.path).await {
        tracing::warn!(path = %existing.path, error = %e, "endpoint deleted but registry unregister failed");
    }
    Ok((StatusCode::OK, json!({ "message": "endpoint deleted" })))
}
