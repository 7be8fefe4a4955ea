//! C5: the narrow HTTP surface through which the Registry's contents
//! change, generalizing an `Application`/`Module` registration
//! pattern (register-a-static-handler) to "register a CRUD operation that
//! writes through to Store then Registry".

mod debug;
mod endpoints;
mod pages;
mod projects;

use std::collections::HashMap;

use bytes::Bytes;
use hyper::Method;

use super::{AppState, JsonResponse};

pub enum Route {
    ProjectsCreate,
    ProjectsList,
    ProjectGet(String),
    ProjectUpdate(String),
    ProjectDelete(String),
    EndpointsCreate,
    EndpointsList,
    EndpointGet(String),
    EndpointUpdate(String),
    EndpointDelete(String),
    PagesCreate,
    PagesList,
    PageGet(String),
    PageUpdate(String),
    PageDelete(String),
    DebugRoutes,
}

pub fn match_route(method: &Method, segments: &[&str]) -> Option<Route> {
    match segments {
        ["api", "projects"] => match *method {
            Method::POST => Some(Route::ProjectsCreate),
            Method::GET => Some(Route::ProjectsList),
            _ => None,
        },
        ["api", "projects", id] => match *method {
            Method::GET => Some(Route::ProjectGet(id.to_string())),
            Method::PUT => Some(Route::ProjectUpdate(id.to_string())),
            Method::DELETE => Some(Route::ProjectDelete(id.to_string())),
            _ => None,
        },
        ["api", "endpoints"] => match *method {
            Method::POST => Some(Route::EndpointsCreate),
            Method::GET => Some(Route::EndpointsList),
            _ => None,
        },
        ["api", "endpoints", id] => match *method {
            Method::GET => Some(Route::EndpointGet(id.to_string())),
            Method::PUT => Some(Route::EndpointUpdate(id.to_string())),
            Method::DELETE => Some(Route::EndpointDelete(id.to_string())),
            _ => None,
        },
        ["api", "pages"] => match *method {
            Method::POST => Some(Route::PagesCreate),
            Method::GET => Some(Route::PagesList),
            _ => None,
        },
        ["api", "pages", id] => match *method {
            Method::GET => Some(Route::PageGet(id.to_string())),
            Method::PUT => Some(Route::PageUpdate(id.to_string())),
            Method::DELETE => Some(Route::PageDelete(id.to_string())),
            _ => None,
        },
        ["api", "debug", "routes"] => match *method {
            Method::GET => Some(Route::DebugRoutes),
            _ => None,
        },
        _ => None,
    }
}

pub async fn handle(
    state: &AppState,
    route: Route,
    headers: &HashMap<String, String>,
    query: &HashMap<String, String>,
    body: &Bytes,
) -> JsonResponse {
    match route {
        Route::ProjectsCreate => projects::create(state, headers, body).await,
        Route::ProjectsList => projects::list(state, headers).await,
        Route::ProjectGet(id) => projects::get(state, headers, &id).await,
        Route::ProjectUpdate(id) => projects::update(state, headers, &id, body).await,
        Route::ProjectDelete(id) => projects::delete(state, headers, &id).await,
        Route::EndpointsCreate => endpoints::create(state, headers, body).await,
        Route::EndpointsList => endpoints::list(state, headers, query).await,
        Route::EndpointGet(id) => endpoints::get(state, headers, &id).await,
        Route::EndpointUpdate(id) => endpoints::update(state, headers, &id, body).await,
        Route::EndpointDelete(id) => endpoints::delete(state, headers, &id).await,
        Route::PagesCreate => pages::create(state, headers, body).await,
        Route::PagesList => pages::list(state, headers, query).await,
        Route::PageGet(id) => pages::get(state, headers, &id).await,
        Route::PageUpdate(id) => pages::update(state, headers, &id, body).await,
        Route::PageDelete(id) => pages::delete(state, headers, &id).await,
        Route::DebugRoutes => debug::routes(state, headers).await,
    }
}

/// Ensures a leading `/` and strips a single trailing `/`, same rule the
/// Dispatcher uses for incoming request paths.
fn normalize_user_path(raw: &str) -> String {
    dynroute_core::dispatch::canonicalize_path(raw)
}

/// `full_path = "/api/" + project.name_slug + normalized(user_path)`, with
/// re-anchoring when `user_path` already looks like a full `/api/...` path
/// (e.g. proposed by a generator) rather than a relative one.
pub fn compose_endpoint_path(slug: &str, user_path: &str) -> String {
    let normalized = normalize_user_path(user_path);
    if let Some(rest) = normalized.strip_prefix("/api/") {
        let remainder = rest.find('/').map(|idx| &rest[idx..]).unwrap_or("");
        normalize_user_path(&format!("/api/{slug}{remainder}"))
    } else {
        normalize_user_path(&format!("/api/{slug}{normalized}"))
    }
}

/// `full_path = "/" + project.name_slug + normalized(user_path)`; a
/// proposed path under `/api/` is re-anchored under `/<slug>/...` since
/// pages may not live there.
pub fn compose_page_path(slug: &str, user_path: &str) -> String {
    let normalized = normalize_user_path(user_path);
    if let Some(rest) = normalized.strip_prefix("/api/") {
        let remainder = rest.find('/').map(|idx| &rest[idx..]).unwrap_or("");
        normalize_user_path(&format!("/{slug}{remainder}"))
    } else {
        normalize_user_path(&format!("/{slug}{normalized}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_path_is_anchored_under_api_slug() {
        assert_eq!(compose_endpoint_path("math-utils", "sum"), "/api/math-utils/sum");
        assert_eq!(compose_endpoint_path("math-utils", "/sum"), "/api/math-utils/sum");
        assert_eq!(compose_endpoint_path("math-utils", "/sum/"), "/api/math-utils/sum");
    }

    #[test]
    fn endpoint_path_reanchors_a_full_api_path_onto_the_real_slug() {
        // A caller-supplied path that already looks like a full `/api/<slug>/...`
        // path (e.g. proposed by a generator against the wrong slug) gets its
        // first segment replaced rather than double-prefixed.
        assert_eq!(
            compose_endpoint_path("math-utils", "/api/other-slug/sum"),
            "/api/math-utils/sum"
        );
        assert_eq!(
            compose_endpoint_path("math-utils", "/api/other-slug"),
            "/api/math-utils"
        );
    }

    #[test]
    fn page_path_is_anchored_under_slug() {
        assert_eq!(compose_page_path("hello-world", "home"), "/hello-world/home");
        assert_eq!(compose_page_path("hello-world", "/home"), "/hello-world/home");
    }

    #[test]
    fn page_path_reanchors_an_api_path_away_from_api() {
        assert_eq!(
            compose_page_path("hello-world", "/api/other-slug/home"),
            "/hello-world/home"
        );
    }
}
