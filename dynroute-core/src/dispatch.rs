//! Framework-agnostic half of the catch-all dispatcher: path canonicalization,
//! parameter extraction and the reserved-path policy. The HTTP transport
//! (accept loop, query-string/body parsing, status-code mapping) lives in the
//! server crate; this module only knows about `Registry`, `Store` and JSON.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;

use crate::error::CoreError;
use crate::model::HttpMethod;
use crate::registry::Registry;
use crate::store::Store;

/// First-segment names that may never be used as a project slug, because
/// the static CRUD surface already claims `/api/<name>/...`.
pub const RESERVED_API_SEGMENTS: &[&str] = &["projects", "pages", "endpoints", "debug", "auth"];

/// Ensures a leading `/` and strips a single trailing `/`, except for the
/// root path itself.
pub fn canonicalize_path(raw: &str) -> String {
    let with_leading = if raw.starts_with('/') {
        raw.to_string()
    } else {
        format!("/{raw}")
    };
    if with_leading == "/" {
        with_leading
    } else {
        with_leading
            .strip_suffix('/')
            .map(str::to_string)
            .unwrap_or(with_leading)
    }
}

/// True when `path` would sit under a reserved first segment of `/api/`,
/// i.e. it can never be accepted as a new Endpoint path at creation time.
pub fn is_reserved_api_path(path: &str) -> bool {
    let Some(rest) = path.strip_prefix("/api/") else {
        return false;
    };
    let first_segment = rest.split('/').next().unwrap_or("");
    RESERVED_API_SEGMENTS.contains(&first_segment)
}

pub struct DispatchRequest<'a> {
    pub method: HttpMethod,
    pub path: &'a str,
    pub query: &'a HashMap<String, String>,
    /// Raw request body, present for `POST`.
    pub body: Option<&'a [u8]>,
}

pub enum DispatchOutcome {
    Html(String),
    Json(Value),
}

/// Runs the catch-all algorithm for one request: waits for the Registry to
/// be hydrated, resolves `canonical_path`, and either serves a page, invokes
/// an endpoint, falls back to the Store for a page the Registry hasn't
/// caught up to yet, or reports `NotFound`.
pub async fn dispatch(
    registry: &Registry,
    store: &dyn Store,
    req: DispatchRequest<'_>,
    handler_timeout: Duration,
) -> Result<DispatchOutcome, CoreError> {
    registry.ensure_initialized().await?;
    let canonical_path = canonicalize_path(req.path);

    if let Some(route) = registry.lookup(&canonical_path).await {
        match route {
            crate::model::RouteInfo::Page { html_content, .. } => {
                return Ok(DispatchOutcome::Html(html_content));
            }
            crate::model::RouteInfo::Endpoint {
                http_method,
                parameters,
                handler,
                ..
            } if http_method == req.method => {
                let params = build_params(req.method, &parameters, req.query, req.body)?;
                let result = tokio::time::timeout(handler_timeout, handler.invoke(params))
                    .await
                    .map_err(|_| CoreError::Timeout)??;
                return Ok(DispatchOutcome::Json(result));
            }
            crate::model::RouteInfo::Endpoint { .. } => {
                // Method mismatch: fall through to the Store page fallback
                // and ultimately NotFound, same as no route at all.
            }
        }
    }

    if let Some(page) = store.get_page_by_path(&canonical_path).await? {
        return Ok(DispatchOutcome::Html(page.html_content));
    }

    Err(CoreError::NotFound(canonical_path))
}

fn build_params(
    method: HttpMethod,
    parameters: &[String],
    query: &HashMap<String, String>,
    body: Option<&[u8]>,
) -> Result<Value, CoreError> {
    match method {
        HttpMethod::Get => {
            let mut map = serde_json::Map::with_capacity(parameters.len());
            for name in parameters {
                let value = query
                    .get(name)
                    .map(|v| Value::String(v.clone()))
                    .unwrap_or(Value::Null);
                map.insert(name.clone(), value);
            }
            Ok(Value::Object(map))
        }
        HttpMethod::Post => {
            let raw = body.unwrap_or(b"");
            serde_json::from_slice(raw).map_err(|_| CoreError::BadRequest("Invalid JSON body".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_adds_leading_slash_and_strips_trailing() {
        assert_eq!(canonicalize_path("foo/bar/"), "/foo/bar");
        assert_eq!(canonicalize_path("/foo/bar"), "/foo/bar");
        assert_eq!(canonicalize_path("/"), "/");
        assert_eq!(canonicalize_path(""), "/");
    }

    #[test]
    fn reserved_paths_are_flagged() {
        assert!(is_reserved_api_path("/api/projects"));
        assert!(is_reserved_api_path("/api/endpoints/abc"));
        assert!(!is_reserved_api_path("/api/math-utils/sum"));
        assert!(!is_reserved_api_path("/math-utils/home"));
    }

    #[test]
    fn get_params_read_from_query_with_null_for_missing() {
        let mut query = HashMap::new();
        query.insert("a".to_string(), "2".to_string());
        let params = build_params(
            HttpMethod::Get,
            &["a".to_string(), "b".to_string()],
            &query,
            None,
        )
        .unwrap();
        assert_eq!(params, serde_json::json!({"a": "2", "b": null}));
    }

    #[test]
    fn post_params_decode_json_body() {
        let query = HashMap::new();
        let params = build_params(HttpMethod::Post, &[], &query, Some(br#"{"x":5}"#)).unwrap();
        assert_eq!(params, serde_json::json!({"x": 5}));
    }

    #[test]
    fn post_invalid_json_is_bad_request() {
        let query = HashMap::new();
        let err = build_params(HttpMethod::Post, &[], &query, Some(b"not json")).unwrap_err();
        assert!(matches!(err, CoreError::BadRequest(_)));
    }
}
