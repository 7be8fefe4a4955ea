//! End-to-end exercise of Store -> Registry -> Dispatcher against an
//! in-memory SQLite database, without any HTTP transport involved.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dynroute_core::dispatch::{dispatch, DispatchOutcome, DispatchRequest};
use dynroute_core::{DefaultSandboxHost, HttpMethod, Language, Registry, SandboxHost, SqliteStore, Store};

async fn setup() -> (Arc<SqliteStore>, Registry) {
    let store = Arc::new(SqliteStore::connect("sqlite::memory:").await.unwrap());
    let host: Arc<dyn SandboxHost> = Arc::new(DefaultSandboxHost::new().unwrap());
    let registry = Registry::new(store.clone(), host);
    (store, registry)
}

#[tokio::test]
async fn create_call_delete_js_endpoint() {
    let (store, registry) = setup().await;
    let project = store.create_project("u1", "Math Utils", None).await.unwrap();
    assert_eq!(project.name_slug(), "math-utils");

    let full_path = format!("/api/{}/sum", project.name_slug());
    let endpoint = store
        .create_endpoint(
            "u1",
            &full_path,
            &["a".to_string(), "b".to_string()],
            "function endpoint_function(p){return {s: Number(p.a)+Number(p.b)};}",
            HttpMethod::Get,
            Language::Javascript,
            &project.id,
        )
        .await
        .unwrap();
    registry.register_endpoint(&endpoint.path, endpoint.parameters.clone(), &endpoint.code, endpoint.http_method, endpoint.language)
        .await
        .unwrap();

    let mut query = HashMap::new();
    query.insert("a".to_string(), "2".to_string());
    query.insert("b".to_string(), "3".to_string());
    let req = DispatchRequest {
        method: HttpMethod::Get,
        path: &full_path,
        query: &query,
        body: None,
    };
    let outcome = dispatch(&registry, store.as_ref(), req, Duration::from_secs(5)).await.unwrap();
    match outcome {
        DispatchOutcome::Json(v) => assert_eq!(v, serde_json::json!({"s": 5})),
        _ => panic!("expected json"),
    }

    store.delete_endpoint(&endpoint.id, "u1").await.unwrap();
    registry.unregister(&endpoint.path).await.unwrap();

    let req = DispatchRequest {
        method: HttpMethod::Get,
        path: &full_path,
        query: &query,
        body: None,
    };
    let err = dispatch(&registry, store.as_ref(), req, Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, dynroute_core::CoreError::NotFound(_)));
}

#[tokio::test]
async fn query_string_values_are_not_coerced() {
    let (store, registry) = setup().await;
    let project = store.create_project("u1", "P", None).await.unwrap();
    let full_path = format!("/api/{}/echo", project.name_slug());
    let endpoint = store
        .create_endpoint(
            "u1",
            &full_path,
            &["x".to_string()],
            "function endpoint_function(p) { return p; }",
            HttpMethod::Get,
            Language::Javascript,
            &project.id,
        )
        .await
        .unwrap();
    registry
        .register_endpoint(&endpoint.path, endpoint.parameters.clone(), &endpoint.code, endpoint.http_method, endpoint.language)
        .await
        .unwrap();

    let mut query = HashMap::new();
    query.insert("x".to_string(), "5".to_string());
    let req = DispatchRequest {
        method: HttpMethod::Get,
        path: &full_path,
        query: &query,
        body: None,
    };
    let outcome = dispatch(&registry, store.as_ref(), req, Duration::from_secs(5)).await.unwrap();
    match outcome {
        DispatchOutcome::Json(v) => assert_eq!(v, serde_json::json!({"x": "5"})),
        _ => panic!("expected json"),
    }
}

#[tokio::test]
async fn post_body_preserves_json_types() {
    let (store, registry) = setup().await;
    let project = store.create_project("u1", "P", None).await.unwrap();
    let full_path = format!("/api/{}/echo", project.name_slug());
    let endpoint = store
        .create_endpoint(
            "u1",
            &full_path,
            &[],
            "function endpoint_function(p) { return p; }",
            HttpMethod::Post,
            Language::Javascript,
            &project.id,
        )
        .await
        .unwrap();
    registry
        .register_endpoint(&endpoint.path, endpoint.parameters.clone(), &endpoint.code, endpoint.http_method, endpoint.language)
        .await
        .unwrap();

    let query = HashMap::new();
    let body = br#"{"x":5,"y":true}"#;
    let req = DispatchRequest {
        method: HttpMethod::Post,
        path: &full_path,
        query: &query,
        body: Some(body),
    };
    let outcome = dispatch(&registry, store.as_ref(), req, Duration::from_secs(5)).await.unwrap();
    match outcome {
        DispatchOutcome::Json(v) => assert_eq!(v, serde_json::json!({"x": 5, "y": true})),
        _ => panic!("expected json"),
    }
}

#[tokio::test]
async fn broken_handler_is_visible_instead_of_missing() {
    let (store, registry) = setup().await;
    let project = store.create_project("u1", "P", None).await.unwrap();
    let full_path = format!("/api/{}/broken", project.name_slug());
    let endpoint = store
        .create_endpoint(
            "u1",
            &full_path,
            &[],
            "garbage syntax!",
            HttpMethod::Get,
            Language::Javascript,
            &project.id,
        )
        .await
        .unwrap();
    registry
        .register_endpoint(&endpoint.path, endpoint.parameters.clone(), &endpoint.code, endpoint.http_method, endpoint.language)
        .await
        .unwrap();

    let query = HashMap::new();
    let req = DispatchRequest {
        method: HttpMethod::Get,
        path: &full_path,
        query: &query,
        body: None,
    };
    let outcome = dispatch(&registry, store.as_ref(), req, Duration::from_secs(5)).await.unwrap();
    match outcome {
        DispatchOutcome::Json(v) => assert!(v.get("error").is_some()),
        _ => panic!("expected json"),
    }
}

#[tokio::test]
async fn page_serves_html_verbatim() {
    let (store, registry) = setup().await;
    let project = store.create_project("u1", "Hello World", None).await.unwrap();
    assert_eq!(project.name_slug(), "hello-world");
    let full_path = format!("/{}/home", project.name_slug());
    let page = store
        .create_page("u1", &full_path, "<h1>hi</h1>", &project.id)
        .await
        .unwrap();
    registry.register_page(&page.path, &page.html_content).await.unwrap();

    let query = HashMap::new();
    let req = DispatchRequest {
        method: HttpMethod::Get,
        path: &full_path,
        query: &query,
        body: None,
    };
    let outcome = dispatch(&registry, store.as_ref(), req, Duration::from_secs(5)).await.unwrap();
    match outcome {
        DispatchOutcome::Html(html) => assert_eq!(html, "<h1>hi</h1>"),
        _ => panic!("expected html"),
    }
}

#[tokio::test]
async fn registry_converges_after_hydration() {
    let (store, registry) = setup().await;
    let project = store.create_project("u1", "P", None).await.unwrap();
    let endpoint_path = format!("/api/{}/one", project.name_slug());
    store
        .create_endpoint(
            "u1",
            &endpoint_path,
            &[],
            "function endpoint_function(p){return p;}",
            HttpMethod::Get,
            Language::Javascript,
            &project.id,
        )
        .await
        .unwrap();
    let page_path = format!("/{}/home", project.name_slug());
    store.create_page("u1", &page_path, "<p>hi</p>", &project.id).await.unwrap();

    registry.ensure_initialized().await.unwrap();
    let mut paths = registry.list_paths().await;
    paths.sort();
    let mut expected = vec![endpoint_path, page_path];
    expected.sort();
    assert_eq!(paths, expected);
}
