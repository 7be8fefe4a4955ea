//! The single source of truth for Project, Endpoint and Page.
//!
//! Every operation here is atomic at the row level; `path` uniqueness on
//! Endpoint and Page is enforced by a `UNIQUE` constraint in the schema
//! (see `sqlite.rs`), never by an application-level check-then-insert.

mod sqlite;

pub use sqlite::SqliteStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::{Endpoint, HttpMethod, Language, Page, Project};

/// Partial update for a Project: `None` means "leave unchanged".
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Partial update for an Endpoint. `None` means "leave unchanged"; fields are
/// a subset of the creatable fields.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct EndpointPatch {
    pub path: Option<String>,
    pub code: Option<String>,
    pub parameters: Option<Vec<String>>,
    #[serde(rename = "httpMethod")]
    pub http_method: Option<HttpMethod>,
    pub language: Option<Language>,
}

impl EndpointPatch {
    pub fn is_empty(&self) -> bool {
        self.path.is_none()
            && self.code.is_none()
            && self.parameters.is_none()
            && self.http_method.is_none()
            && self.language.is_none()
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PagePatch {
    pub path: Option<String>,
    #[serde(rename = "htmlContent")]
    pub html_content: Option<String>,
}

impl PagePatch {
    pub fn is_empty(&self) -> bool {
        self.path.is_none() && self.html_content.is_none()
    }
}

/// Rows deleted by a cascading project delete, for Registry cleanup.
#[derive(Clone, Debug, Default, Serialize)]
pub struct CascadeResult {
    pub endpoint_paths: Vec<String>,
    pub page_paths: Vec<String>,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn create_project(
        &self,
        owner: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<Project, CoreError>;
    async fn get_project(&self, id: &str) -> Result<Option<Project>, CoreError>;
    async fn list_projects(&self, owner: &str) -> Result<Vec<Project>, CoreError>;
    async fn update_project(
        &self,
        id: &str,
        owner: &str,
        patch: ProjectPatch,
    ) -> Result<bool, CoreError>;
    /// Deletes the project; when `cascade` is true also deletes its Endpoints
    /// and Pages, returning their paths so the caller can unregister them.
    async fn delete_project(
        &self,
        id: &str,
        owner: &str,
        cascade: bool,
    ) -> Result<Option<CascadeResult>, CoreError>;

    async fn create_endpoint(
        &self,
        owner: &str,
        path: &str,
        parameters: &[String],
        code: &str,
        method: HttpMethod,
        language: Language,
        project_id: &str,
    ) -> Result<Endpoint, CoreError>;
    async fn get_endpoint_by_id(&self, id: &str) -> Result<Option<Endpoint>, CoreError>;
    async fn get_endpoint_by_path(&self, path: &str) -> Result<Option<Endpoint>, CoreError>;
    async fn list_endpoints_by_owner(&self, owner: &str) -> Result<Vec<Endpoint>, CoreError>;
    async fn list_endpoints_by_project(&self, project_id: &str) -> Result<Vec<Endpoint>, CoreError>;
    async fn list_all_endpoints(&self) -> Result<Vec<Endpoint>, CoreError>;
    async fn update_endpoint(
        &self,
        id: &str,
        owner: &str,
        patch: EndpointPatch,
    ) -> Result<Option<Endpoint>, CoreError>;
    async fn delete_endpoint(&self, id: &str, owner: &str) -> Result<bool, CoreError>;

    async fn create_page(
        &self,
        owner: &str,
        path: &str,
        html_content: &str,
        project_id: &str,
    ) -> Result<Page, CoreError>;
    async fn get_page_by_id(&self, id: &str) -> Result<Option<Page>, CoreError>;
    async fn get_page_by_path(&self, path: &str) -> Result<Option<Page>, CoreError>;
    async fn list_pages_by_owner(&self, owner: &str) -> Result<Vec<Page>, CoreError>;
    async fn list_pages_by_project(&self, project_id: &str) -> Result<Vec<Page>, CoreError>;
    async fn list_all_pages(&self) -> Result<Vec<Page>, CoreError>;
    async fn update_page(
        &self,
        id: &str,
        owner: &str,
        patch: PagePatch,
    ) -> Result<Option<Page>, CoreError>;
    async fn delete_page(&self, id: &str, owner: &str) -> Result<bool, CoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_patch_accepts_camel_case_http_method() {
        let patch: EndpointPatch = serde_json::from_str(r#"{"httpMethod":"POST"}"#).unwrap();
        assert_eq!(patch.http_method, Some(HttpMethod::Post));
        assert!(!patch.is_empty());
    }

    #[test]
    fn page_patch_accepts_camel_case_html_content() {
        let patch: PagePatch = serde_json::from_str(r#"{"htmlContent":"<p>hi</p>"}"#).unwrap();
        assert_eq!(patch.html_content.as_deref(), Some("<p>hi</p>"));
        assert!(!patch.is_empty());
    }
}
