//! Plug-in seam for AI-assisted generation of handler/page bodies.
//!
//! The core treats generation as an external, opaque text producer; this
//! trait exists only so a caller has a documented place to wire one in
//! without touching the Store, Sandbox Host, Registry or Dispatcher.

use async_trait::async_trait;

use crate::error::CoreError;

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, CoreError>;
}

/// Default, no-op implementation: generation is simply not configured.
pub struct NullGenerator;

#[async_trait]
impl Generator for NullGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, CoreError> {
        Err(CoreError::Internal("generation not configured".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_generator_always_errors() {
        let gen = NullGenerator;
        assert!(gen.generate("anything").await.is_err());
    }
}
