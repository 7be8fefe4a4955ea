//! Python guest execution via an embedded interpreter (`pyo3`).
//!
//! `pyo3` already covers Python embedding elsewhere in this workspace's lineage,
//! there used the other direction — a `cdylib` extension module that Python
//! imports. Here Rust drives an embedded interpreter instead
//! (`pyo3::prepare_freethreaded_python`), the same crate covering the same
//! "Python" concern from the opposite side (see DESIGN.md).

use std::sync::Arc;

use pyo3::prelude::*;
use pyo3::types::PyModule;
use serde_json::Value;

use super::Invokable;
use crate::error::CoreError;

pub struct PyEngine;

impl PyEngine {
    pub fn new() -> Self {
        pyo3::prepare_freethreaded_python();
        Self
    }

    pub async fn compile(&self, source: &str) -> Result<Arc<dyn Invokable>, CoreError> {
        let wrapped = wrap_python(source);
        // Module construction/compilation is CPU-bound and GIL-bound; hop to
        // a blocking thread so it never stalls the async executor.
        let func: Result<Py<PyAny>, String> = tokio::task::spawn_blocking(move || {
            Python::with_gil(|py| {
                let module = PyModule::from_code_bound(py, &wrapped, "endpoint.py", "endpoint")
                    .map_err(|e| e.to_string())?;
                module
                    .getattr("endpoint_function")
                    .map_err(|e| e.to_string())
                    .map(|f| f.into())
            })
        })
        .await
        .map_err(|e| CoreError::Internal(format!("python compile task panicked: {e}")))?;

        let func = func.map_err(CoreError::CompileError)?;
        Ok(Arc::new(PyHandler { func }))
    }
}

/// Wraps the user-supplied function *body* inside a generated
/// `def endpoint_function(params):`, indented uniformly —
/// unlike the JavaScript side, the guest supplies a body, not a full
/// function definition.
fn wrap_python(body: &str) -> String {
    let indented: String = body
        .lines()
        .map(|line| format!("    {line}"))
        .collect::<Vec<_>>()
        .join("\n");
    let indented = if indented.trim().is_empty() {
        "    pass".to_string()
    } else {
        indented
    };
    format!("def endpoint_function(params):\n{indented}\n")
}

struct PyHandler {
    func: Py<PyAny>,
}

#[async_trait::async_trait]
impl Invokable for PyHandler {
    async fn invoke(&self, params: Value) -> Result<Value, CoreError> {
        let func = self.func.clone();
        let result: Result<Value, String> = tokio::task::spawn_blocking(move || {
            Python::with_gil(|py| {
                let py_params = pythonize::pythonize(py, &params)
                    .map_err(|e| format!("failed to marshal params: {e}"))?;
                let outcome = func
                    .bind(py)
                    .call1((py_params,))
                    .map_err(|e| format!("Python execution error: {e}"))?;
                pythonize::depythonize_bound(outcome)
                    .map_err(|e| format!("result is not JSON-serializable: {e}"))
            })
        })
        .await
        .map_err(|e| CoreError::Internal(format!("python invoke task panicked: {e}")))?;

        match result {
            Ok(v) => Ok(v),
            Err(details) => Ok(serde_json::json!({
                "error": "Python execution error",
                "details": details,
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    // The embedded interpreter is process-global state; run these serially
    // rather than relying on the GIL alone to keep them isolated.

    #[tokio::test]
    #[serial]
    async fn echoes_params_for_identity_body() {
        let engine = PyEngine::new();
        let handler = engine.compile("return params").await.unwrap();
        let out = handler.invoke(serde_json::json!({"x": 5})).await.unwrap();
        assert_eq!(out, serde_json::json!({"x": 5}));
    }

    #[tokio::test]
    #[serial]
    async fn syntax_error_surfaces_as_compile_error() {
        let engine = PyEngine::new();
        let result = engine.compile("garbage syntax!").await;
        assert!(result.is_err());
    }
}
