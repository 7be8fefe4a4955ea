//! The in-memory `path -> RouteInfo` mapping and its lifecycle.
//!
//! Generalizes a single shared `Arc<RwLock<_>>`-style route table from
//! "one route table built once at startup" to a registry that is also
//! mutated at runtime by the CRUD Facade, with the
//! `Uninitialized -> Initializing -> Ready` state machine this requires
//! layered on top.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, Notify, RwLock};

use crate::error::CoreError;
use crate::model::{HttpMethod, Language, RouteInfo};
use crate::sandbox::{SandboxHost, SandboxResource};
use crate::store::Store;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum InitState {
    Uninitialized,
    Initializing,
    Ready,
}

pub struct Registry {
    store: Arc<dyn Store>,
    host: Arc<dyn SandboxHost>,
    routes: RwLock<HashMap<String, RouteInfo>>,
    /// Sandbox resource behind each endpoint's compiled handler, keyed the
    /// same as `routes`. Only ever touched by a writer holding
    /// `write_lock`, never shared with readers — `lookup` only needs the
    /// `CompiledHandler` the `RouteInfo` already carries.
    resources: Mutex<HashMap<String, SandboxResource>>,
    /// Serializes `register_*`/`refresh_*`/`unregister` against each other;
    /// `lookup` never takes this lock — lookups stay non-blocking
    /// relative to other lookups.
    write_lock: Mutex<()>,
    init_state: Mutex<InitState>,
    init_done: Notify,
}

impl Registry {
    pub fn new(store: Arc<dyn Store>, host: Arc<dyn SandboxHost>) -> Self {
        Self {
            store,
            host,
            routes: RwLock::new(HashMap::new()),
            resources: Mutex::new(HashMap::new()),
            write_lock: Mutex::new(()),
            init_state: Mutex::new(InitState::Uninitialized),
            init_done: Notify::new(),
        }
    }

    /// First call performs a full scan of the Store; concurrent callers
    /// during `Initializing` wait on the same completion signal. A failed
    /// scan returns to `Uninitialized` so the next call retries.
    pub async fn ensure_initialized(&self) -> Result<(), CoreError> {
        loop {
            let mut state = self.init_state.lock().await;
            match *state {
                InitState::Ready => return Ok(()),
                InitState::Initializing => {
                    drop(state);
                    self.init_done.notified().await;
                    continue;
                }
                InitState::Uninitialized => {
                    *state = InitState::Initializing;
                    drop(state);
                    match self.hydrate().await {
                        Ok(()) => {
                            *self.init_state.lock().await = InitState::Ready;
                            self.init_done.notify_waiters();
                            return Ok(());
                        }
                        Err(e) => {
                            *self.init_state.lock().await = InitState::Uninitialized;
                            self.init_done.notify_waiters();
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    async fn hydrate(&self) -> Result<(), CoreError> {
        let _guard = self.write_lock.lock().await;
        let endpoints = self.store.list_all_endpoints().await?;
        let pages = self.store.list_all_pages().await?;

        let mut fresh_routes = HashMap::with_capacity(endpoints.len() + pages.len());
        let mut fresh_resources = HashMap::with_capacity(endpoints.len());
        for endpoint in endpoints {
            let (handler, resource) = self.host.compile(endpoint.language, &endpoint.code).await;
            tracing::info!(path = %endpoint.path, "hydrated endpoint route");
            fresh_resources.insert(endpoint.path.clone(), resource);
            fresh_routes.insert(
                endpoint.path.clone(),
                RouteInfo::Endpoint {
                    path: endpoint.path,
                    parameters: endpoint.parameters,
                    http_method: endpoint.http_method,
                    language: endpoint.language,
                    handler,
                },
            );
        }
        for page in pages {
            tracing::info!(path = %page.path, "hydrated page route");
            fresh_routes.insert(
                page.path.clone(),
                RouteInfo::Page {
                    path: page.path,
                    html_content: page.html_content,
                },
            );
        }

        *self.routes.write().await = fresh_routes;
        *self.resources.lock().await = fresh_resources;
        Ok(())
    }

    pub async fn register_endpoint(
        &self,
        path: &str,
        parameters: Vec<String>,
        code: &str,
        method: HttpMethod,
        language: Language,
    ) -> Result<(), CoreError> {
        let _guard = self.write_lock.lock().await;
        let (handler, resource) = self.host.compile(language, code).await;
        let new_route = RouteInfo::Endpoint {
            path: path.to_string(),
            parameters,
            http_method: method,
            language,
            handler,
        };
        self.routes.write().await.insert(path.to_string(), new_route);
        let old_resource = self.resources.lock().await.insert(path.to_string(), resource);
        if let Some(old) = old_resource {
            self.host.release(old).await;
        }
        Ok(())
    }

    pub async fn register_page(&self, path: &str, html: &str) -> Result<(), CoreError> {
        let _guard = self.write_lock.lock().await;
        let new_route = RouteInfo::Page {
            path: path.to_string(),
            html_content: html.to_string(),
        };
        self.routes.write().await.insert(path.to_string(), new_route);
        if let Some(old) = self.resources.lock().await.remove(path) {
            self.host.release(old).await;
        }
        Ok(())
    }

    /// Re-reads the Store by `path`; re-registers if present, removes the
    /// entry (releasing any existing handler) if absent.
    pub async fn refresh_endpoint(&self, path: &str) -> Result<(), CoreError> {
        match self.store.get_endpoint_by_path(path).await? {
            Some(endpoint) => {
                self.register_endpoint(
                    &endpoint.path,
                    endpoint.parameters,
                    &endpoint.code,
                    endpoint.http_method,
                    endpoint.language,
                )
                .await
            }
            None => self.unregister(path).await,
        }
    }

    pub async fn refresh_page(&self, path: &str) -> Result<(), CoreError> {
        match self.store.get_page_by_path(path).await? {
            Some(page) => self.register_page(&page.path, &page.html_content).await,
            None => self.unregister(path).await,
        }
    }

    /// Removes `path` from the Registry, releasing its handler if any. The
    /// only way the CRUD Facade mutates the map — it never reaches in and
    /// modifies the table directly.
    pub async fn unregister(&self, path: &str) -> Result<(), CoreError> {
        let _guard = self.write_lock.lock().await;
        self.routes.write().await.remove(path);
        if let Some(old) = self.resources.lock().await.remove(path) {
            self.host.release(old).await;
        }
        Ok(())
    }

    /// Non-blocking readiness check for health probes; never triggers
    /// hydration itself.
    pub async fn is_ready(&self) -> bool {
        matches!(*self.init_state.lock().await, InitState::Ready)
    }

    pub async fn lookup(&self, path: &str) -> Option<RouteInfo> {
        self.routes.read().await.get(path).cloned()
    }

    pub async fn list_paths(&self) -> Vec<String> {
        self.routes.read().await.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::DefaultSandboxHost;
    use crate::store::SqliteStore;

    async fn registry() -> Registry {
        let store = Arc::new(SqliteStore::connect("sqlite::memory:").await.unwrap());
        let host = Arc::new(DefaultSandboxHost::new().unwrap());
        Registry::new(store, host)
    }

    #[tokio::test]
    async fn ensure_initialized_is_idempotent() {
        let r = registry().await;
        r.ensure_initialized().await.unwrap();
        r.ensure_initialized().await.unwrap();
        assert!(r.list_paths().await.is_empty());
    }

    #[tokio::test]
    async fn register_then_unregister_round_trips() {
        let r = registry().await;
        r.register_page("/p/home", "<h1>hi</h1>").await.unwrap();
        assert_eq!(r.list_paths().await, vec!["/p/home".to_string()]);
        assert!(r.lookup("/p/home").await.is_some());
        r.unregister("/p/home").await.unwrap();
        assert!(r.lookup("/p/home").await.is_none());
    }

    #[tokio::test]
    async fn refresh_idempotence_produces_identical_route_info() {
        let store = Arc::new(SqliteStore::connect("sqlite::memory:").await.unwrap());
        let host = Arc::new(DefaultSandboxHost::new().unwrap());
        let project = store.create_project("u1", "P", None).await.unwrap();
        store
            .create_endpoint(
                "u1",
                "/api/p/x",
                &[],
                "function endpoint_function(p){return p;}",
                HttpMethod::Get,
                Language::Javascript,
                &project.id,
            )
            .await
            .unwrap();
        let r = Registry::new(store, host);
        r.refresh_endpoint("/api/p/x").await.unwrap();
        r.refresh_endpoint("/api/p/x").await.unwrap();
        let route = r.lookup("/api/p/x").await.unwrap();
        match route {
            RouteInfo::Endpoint { path, .. } => assert_eq!(path, "/api/p/x"),
            _ => panic!("expected endpoint"),
        }
    }
}
