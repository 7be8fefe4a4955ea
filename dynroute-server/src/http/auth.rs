//! Stand-in auth boundary: authentication proper is out of scope, but the
//! CRUD Facade still needs a caller identity to enforce ownership. A real
//! auth layer replaces this without touching `dynroute-core`.

use std::collections::HashMap;

use dynroute_core::CoreError;

use super::AppState;

/// Reads the caller's identity from `X-User-Id`. Missing header is
/// `Unauthorized`, matching the CRUD surface's "all require authenticated
/// owner" requirement.
pub fn owner_id(headers: &HashMap<String, String>) -> Result<String, CoreError> {
    headers
        .get("x-user-id")
        .filter(|v| !v.trim().is_empty())
        .cloned()
        .ok_or(CoreError::Unauthorized)
}

/// Gate for `GET /api/debug/routes`: `X-Admin-Token` must match
/// `Config.admin_token`. When no admin token is configured the route does
/// not exist, reported the same way as any other unknown path.
pub fn require_admin(state: &AppState, headers: &HashMap<String, String>) -> Result<(), CoreError> {
    let configured = state
        .config
        .admin_token
        .as_deref()
        .ok_or_else(|| CoreError::NotFound("/api/debug/routes".into()))?;
    let provided = headers.get("x-admin-token").map(String::as_str).unwrap_or("");
    if provided == configured {
        Ok(())
    } else {
        Err(CoreError::Forbidden)
    }
}
