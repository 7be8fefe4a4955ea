//! HTTP transport: a hand-rolled hyper accept loop plus a small static
//! router for the CRUD surface, falling back to the catch-all dispatcher
//! for every other path.

mod auth;
mod crud;
mod dispatcher;

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response as HyperResponse, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use dynroute_core::{CoreError, Generator, Registry, Store};

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub registry: Arc<Registry>,
    pub generator: Arc<dyn Generator>,
    pub config: dynroute_core::Config,
}

pub type JsonResponse = Result<(StatusCode, Value), CoreError>;

pub async fn serve(
    state: Arc<AppState>,
    port: u16,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");
    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let state = Arc::clone(&state);
        tokio::task::spawn(async move {
            let service = service_fn(move |req| handle(Arc::clone(&state), req));
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                tracing::warn!(error = %e, "connection error");
            }
        });
    }
}

async fn handle(
    state: Arc<AppState>,
    req: Request<hyper::body::Incoming>,
) -> Result<HyperResponse<Full<Bytes>>, std::convert::Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = parse_query(req.uri().query().unwrap_or(""));
    let headers: HashMap<String, String> = req
        .headers()
        .iter()
        .map(|(k, v)| (k.as_str().to_ascii_lowercase(), v.to_str().unwrap_or("").to_string()))
        .collect();
    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            return Ok(json_response(
                StatusCode::BAD_REQUEST,
                &json!({ "error": format!("failed to read body: {e}") }),
            ))
        }
    };

    let span = tracing::info_span!("request", %method, %path);
    let _guard = span.enter();

    let segments: Vec<&str> = path.trim_matches('/').split('/').filter(|s| !s.is_empty()).collect();

    if segments.first() == Some(&"healthz") {
        return Ok(match healthz(&state).await {
            Ok((status, body)) => json_response(status, &body),
            Err(e) => error_response(&e),
        });
    }

    if let Some(route) = crud::match_route(&method, &segments) {
        return Ok(match crud::handle(&state, route, &headers, &query, &body).await {
            Ok((status, body)) => json_response(status, &body),
            Err(e) => error_response(&e),
        });
    }

    Ok(match dispatcher::handle(&state, &method, &path, &query, &body).await {
        Ok(dynroute_core::DispatchOutcome::Html(html)) => html_response(html),
        Ok(dynroute_core::DispatchOutcome::Json(value)) => json_response(StatusCode::OK, &value),
        Err(e) => error_response(&e),
    })
}

async fn healthz(state: &AppState) -> JsonResponse {
    if state.registry.is_ready().await {
        Ok((StatusCode::OK, json!({ "status": "ready" })))
    } else {
        Ok((StatusCode::SERVICE_UNAVAILABLE, json!({ "status": "initializing" })))
    }
}

fn parse_query(raw: &str) -> HashMap<String, String> {
    raw.split('&')
        .filter_map(|pair| {
            let mut it = pair.splitn(2, '=');
            let k = it.next()?.trim();
            if k.is_empty() {
                return None;
            }
            let v = it.next().unwrap_or("");
            Some((
                urlencoding_decode(k),
                urlencoding_decode(v),
            ))
        })
        .collect()
}

/// Minimal `application/x-www-form-urlencoded`-style percent-decoding;
/// query strings here only ever carry plain ASCII parameter values.
fn urlencoding_decode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        match c {
            '+' => out.push(' '),
            '%' => {
                let hi = chars.next();
                let lo = chars.next();
                if let (Some(hi), Some(lo)) = (hi, lo) {
                    if let Ok(byte) = u8::from_str_radix(&format!("{hi}{lo}"), 16) {
                        out.push(byte as char);
                        continue;
                    }
                }
                out.push('%');
            }
            other => out.push(other),
        }
    }
    out
}

fn json_response(status: StatusCode, body: &Value) -> HyperResponse<Full<Bytes>> {
    HyperResponse::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

pub fn html_response(body: String) -> HyperResponse<Full<Bytes>> {
    HyperResponse::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "text/html; charset=utf-8")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

/// The one place `CoreError` turns into a status code and JSON body —
/// `dynroute-core` itself never depends on HTTP types.
fn error_response(e: &CoreError) -> HyperResponse<Full<Bytes>> {
    let (status, body) = match e {
        CoreError::Unauthorized => (StatusCode::UNAUTHORIZED, json!({ "error": "unauthorized" })),
        CoreError::Forbidden => (StatusCode::FORBIDDEN, json!({ "error": "forbidden" })),
        CoreError::NotFound(_) => (StatusCode::NOT_FOUND, json!({ "error": "Not found" })),
        CoreError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
        CoreError::PathConflict(msg) => (StatusCode::CONFLICT, json!({ "error": msg })),
        CoreError::CompileError(msg) => (
            StatusCode::BAD_REQUEST,
            json!({ "error": "compilation error", "details": msg }),
        ),
        CoreError::RuntimeError(msg) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": "Error executing endpoint", "details": msg }),
        ),
        CoreError::Timeout => (
            StatusCode::GATEWAY_TIMEOUT,
            json!({ "error": "Endpoint timed out" }),
        ),
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "internal error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "internal server error" }),
            )
        }
    };
    json_response(status, &body)
}
