//! Turns guest source into a callable and holds it until released.
//!
//! Dispatch on `Language` happens once, at compile time,
//! never per invocation: `compile()` returns a `CompiledHandler` that already
//! knows how to invoke itself.

mod javascript;
mod python;

use std::sync::Arc;

use serde_json::Value;

use crate::error::CoreError;
use crate::model::Language;

/// A compiled, invokable handler. Cheap to clone (wraps an `Arc`); every
/// clone shares the same underlying interpreter session. The teardown this
/// guards (the JS module entry, the Python function object) only happens
/// once `SandboxHost::release` runs for the matching `SandboxResource`,
/// never implicitly when a `CompiledHandler` clone drops.
#[derive(Clone)]
pub struct CompiledHandler {
    inner: Arc<dyn Invokable>,
    /// Present only for handlers that compiled with an error; the stub
    /// handler still satisfies the "broken endpoint is visible" guarantee
    /// instead of preventing registration.
    pub stub_error: Option<String>,
}

#[async_trait::async_trait]
trait Invokable: Send + Sync {
    async fn invoke(&self, params: Value) -> Result<Value, CoreError>;
}

struct StubHandler {
    message: String,
}

#[async_trait::async_trait]
impl Invokable for StubHandler {
    async fn invoke(&self, _params: Value) -> Result<Value, CoreError> {
        Ok(serde_json::json!({
            "error": "endpoint has a compilation error",
            "details": self.message,
        }))
    }
}

impl CompiledHandler {
    fn stub(message: String) -> Self {
        Self {
            inner: Arc::new(StubHandler {
                message: message.clone(),
            }),
            stub_error: Some(message),
        }
    }

    pub async fn invoke(&self, params: Value) -> Result<Value, CoreError> {
        self.inner.invoke(params).await
    }
}

/// A handle to an open interpreter/compilation session, used only to
/// release resources. Opaque to the Registry; owned by the Host.
pub enum SandboxResource {
    Javascript(u64),
    /// Python handlers hold no resource beyond the `CompiledHandler`'s own
    /// `Arc<Py<PyAny>>`, released when dropped; nothing extra to tear down.
    Python,
    /// The stub handler installed for a `CompileError` opens no session.
    None,
}

#[async_trait::async_trait]
pub trait SandboxHost: Send + Sync {
    async fn compile(&self, language: Language, source: &str) -> (CompiledHandler, SandboxResource);
    /// Idempotent; safe to call more than once for the same resource.
    async fn release(&self, resource: SandboxResource);
}

/// Default host: owns a JS worker thread (`javascript::JsEngine`) and an
/// embedded Python interpreter (`python::PyEngine`), dispatching on
/// `Language` once at compile time.
pub struct DefaultSandboxHost {
    js: javascript::JsEngine,
    py: python::PyEngine,
}

impl DefaultSandboxHost {
    pub fn new() -> Result<Self, CoreError> {
        Ok(Self {
            js: javascript::JsEngine::start()?,
            py: python::PyEngine::new(),
        })
    }
}

#[async_trait::async_trait]
impl SandboxHost for DefaultSandboxHost {
    async fn compile(&self, language: Language, source: &str) -> (CompiledHandler, SandboxResource) {
        match language {
            Language::Javascript => match self.js.compile(source).await {
                Ok((inner, module_id)) => (
                    CompiledHandler {
                        inner,
                        stub_error: None,
                    },
                    SandboxResource::Javascript(module_id),
                ),
                Err(e) => (CompiledHandler::stub(e.to_string()), SandboxResource::None),
            },
            Language::Python => match self.py.compile(source).await {
                Ok(inner) => (
                    CompiledHandler {
                        inner,
                        stub_error: None,
                    },
                    SandboxResource::Python,
                ),
                Err(e) => (CompiledHandler::stub(e.to_string()), SandboxResource::None),
            },
        }
    }

    async fn release(&self, resource: SandboxResource) {
        match resource {
            SandboxResource::Javascript(module_id) => self.js.release(module_id).await,
            SandboxResource::Python | SandboxResource::None => {}
        }
    }
}
