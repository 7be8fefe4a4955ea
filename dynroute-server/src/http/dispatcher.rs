//! Bridges the hyper request into `dynroute-core`'s catch-all dispatch.

use std::collections::HashMap;

use bytes::Bytes;
use hyper::Method;

use dynroute_core::{dispatch, CoreError, DispatchOutcome, DispatchRequest, HttpMethod};

use super::AppState;

pub async fn handle(
    state: &AppState,
    method: &Method,
    path: &str,
    query: &HashMap<String, String>,
    body: &Bytes,
) -> Result<DispatchOutcome, CoreError> {
    let core_method = match *method {
        Method::GET => HttpMethod::Get,
        Method::POST => HttpMethod::Post,
        _ => return Err(CoreError::NotFound(path.to_string())),
    };
    let req = DispatchRequest {
        method: core_method,
        path,
        query,
        body: if body.is_empty() { None } else { Some(body.as_ref()) },
    };
    dispatch(
        &state.registry,
        state.store.as_ref(),
        req,
        state.config.handler_timeout,
    )
    .await
}
