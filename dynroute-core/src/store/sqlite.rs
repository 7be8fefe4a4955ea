//! SQLite-backed `Store` implementation.
//!
//! Schema: `Project(id PK, name, description NULL,
//! userId FK, createdAt)`, `Page(id PK, path UNIQUE, htmlContent, projectId FK,
//! userId FK, createdAt)`, `Endpoint(id PK, path UNIQUE, parameters NULL,
//! code, language DEFAULT 'javascript', httpMethod DEFAULT 'GET', projectId
//! FK, userId FK, createdAt)`.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{CascadeResult, EndpointPatch, PagePatch, ProjectPatch, Store};
use crate::error::CoreError;
use crate::model::{join_parameters, split_parameters, Endpoint, HttpMethod, Language, Page, Project};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self, CoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(database_url)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS Project (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT,
                userId TEXT NOT NULL,
                createdAt TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS Endpoint (
                id TEXT PRIMARY KEY,
                path TEXT NOT NULL UNIQUE,
                parameters TEXT,
                code TEXT NOT NULL,
                language TEXT NOT NULL DEFAULT 'javascript',
                httpMethod TEXT NOT NULL DEFAULT 'GET',
                projectId TEXT NOT NULL,
                userId TEXT NOT NULL,
                createdAt TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS Page (
                id TEXT PRIMARY KEY,
                path TEXT NOT NULL UNIQUE,
                htmlContent TEXT NOT NULL,
                projectId TEXT NOT NULL,
                userId TEXT NOT NULL,
                createdAt TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn row_to_project(row: &sqlx::sqlite::SqliteRow) -> Result<Project, CoreError> {
        Ok(Project {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            owner_id: row.try_get("userId")?,
            created_at: row
                .try_get::<String, _>("createdAt")?
                .parse()
                .map_err(|e| CoreError::Internal(format!("bad createdAt: {e}")))?,
        })
    }

    fn row_to_endpoint(row: &sqlx::sqlite::SqliteRow) -> Result<Endpoint, CoreError> {
        let method: String = row.try_get("httpMethod")?;
        let language: String = row.try_get("language")?;
        let parameters: Option<String> = row.try_get("parameters")?;
        Ok(Endpoint {
            id: row.try_get("id")?,
            path: row.try_get("path")?,
            parameters: split_parameters(&parameters.unwrap_or_default()),
            code: row.try_get("code")?,
            language: language.parse()?,
            http_method: method.parse()?,
            project_id: row.try_get("projectId")?,
            owner_id: row.try_get("userId")?,
            created_at: row
                .try_get::<String, _>("createdAt")?
                .parse()
                .map_err(|e| CoreError::Internal(format!("bad createdAt: {e}")))?,
        })
    }

    fn row_to_page(row: &sqlx::sqlite::SqliteRow) -> Result<Page, CoreError> {
        Ok(Page {
            id: row.try_get("id")?,
            path: row.try_get("path")?,
            html_content: row.try_get("htmlContent")?,
            project_id: row.try_get("projectId")?,
            owner_id: row.try_get("userId")?,
            created_at: row
                .try_get::<String, _>("createdAt")?
                .parse()
                .map_err(|e| CoreError::Internal(format!("bad createdAt: {e}")))?,
        })
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn create_project(
        &self,
        owner: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<Project, CoreError> {
        if name.trim().is_empty() {
            return Err(CoreError::BadRequest("name must not be empty".into()));
        }
        let project = Project {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: description.map(|s| s.to_string()),
            owner_id: owner.to_string(),
            created_at: Utc::now(),
        };
        sqlx::query(
            "INSERT INTO Project (id, name, description, userId, createdAt) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&project.id)
        .bind(&project.name)
        .bind(&project.description)
        .bind(&project.owner_id)
        .bind(project.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(project)
    }

    async fn get_project(&self, id: &str) -> Result<Option<Project>, CoreError> {
        let row = sqlx::query("SELECT * FROM Project WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_project).transpose()
    }

    async fn list_projects(&self, owner: &str) -> Result<Vec<Project>, CoreError> {
        let rows = sqlx::query("SELECT * FROM Project WHERE userId = ? ORDER BY createdAt")
            .bind(owner)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_project).collect()
    }

    async fn update_project(
        &self,
        id: &str,
        owner: &str,
        patch: ProjectPatch,
    ) -> Result<bool, CoreError> {
        let Some(existing) = self.get_project(id).await? else {
            return Ok(false);
        };
        if existing.owner_id != owner {
            return Ok(false);
        }
        let name = patch.name.unwrap_or(existing.name);
        let description = patch.description.or(existing.description);
        let result = sqlx::query(
            "UPDATE Project SET name = ?, description = ? WHERE id = ? AND userId = ?",
        )
        .bind(name)
        .bind(description)
        .bind(id)
        .bind(owner)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_project(
        &self,
        id: &str,
        owner: &str,
        cascade: bool,
    ) -> Result<Option<CascadeResult>, CoreError> {
        let Some(existing) = self.get_project(id).await? else {
            return Ok(None);
        };
        if existing.owner_id != owner {
            return Ok(None);
        }

        let mut cascade_result = CascadeResult::default();
        if cascade {
            let endpoints = self.list_endpoints_by_project(id).await?;
            let pages = self.list_pages_by_project(id).await?;
            for e in &endpoints {
                sqlx::query("DELETE FROM Endpoint WHERE id = ?")
                    .bind(&e.id)
                    .execute(&self.pool)
                    .await?;
            }
            for p in &pages {
                sqlx::query("DELETE FROM Page WHERE id = ?")
                    .bind(&p.id)
                    .execute(&self.pool)
                    .await?;
            }
            cascade_result.endpoint_paths = endpoints.into_iter().map(|e| e.path).collect();
            cascade_result.page_paths = pages.into_iter().map(|p| p.path).collect();
        }

        let result = sqlx::query("DELETE FROM Project WHERE id = ? AND userId = ?")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() > 0 {
            Ok(Some(cascade_result))
        } else {
            Ok(None)
        }
    }

    async fn create_endpoint(
        &self,
        owner: &str,
        path: &str,
        parameters: &[String],
        code: &str,
        method: HttpMethod,
        language: Language,
        project_id: &str,
    ) -> Result<Endpoint, CoreError> {
        let endpoint = Endpoint {
            id: Uuid::new_v4().to_string(),
            path: path.to_string(),
            parameters: parameters.to_vec(),
            code: code.to_string(),
            language,
            http_method: method,
            project_id: project_id.to_string(),
            owner_id: owner.to_string(),
            created_at: Utc::now(),
        };
        sqlx::query(
            "INSERT INTO Endpoint (id, path, parameters, code, language, httpMethod, projectId, userId, createdAt) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&endpoint.id)
        .bind(&endpoint.path)
        .bind(join_parameters(&endpoint.parameters))
        .bind(&endpoint.code)
        .bind(endpoint.language.as_str_owned())
        .bind(endpoint.http_method.as_str())
        .bind(&endpoint.project_id)
        .bind(&endpoint.owner_id)
        .bind(endpoint.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(endpoint)
    }

    async fn get_endpoint_by_id(&self, id: &str) -> Result<Option<Endpoint>, CoreError> {
        let row = sqlx::query("SELECT * FROM Endpoint WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_endpoint).transpose()
    }

    async fn get_endpoint_by_path(&self, path: &str) -> Result<Option<Endpoint>, CoreError> {
        let row = sqlx::query("SELECT * FROM Endpoint WHERE path = ?")
            .bind(path)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_endpoint).transpose()
    }

    async fn list_endpoints_by_owner(&self, owner: &str) -> Result<Vec<Endpoint>, CoreError> {
        let rows = sqlx::query("SELECT * FROM Endpoint WHERE userId = ? ORDER BY createdAt")
            .bind(owner)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_endpoint).collect()
    }

    async fn list_endpoints_by_project(&self, project_id: &str) -> Result<Vec<Endpoint>, CoreError> {
        let rows = sqlx::query("SELECT * FROM Endpoint WHERE projectId = ? ORDER BY createdAt")
            .bind(project_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_endpoint).collect()
    }

    async fn list_all_endpoints(&self) -> Result<Vec<Endpoint>, CoreError> {
        let rows = sqlx::query("SELECT * FROM Endpoint ORDER BY createdAt")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_endpoint).collect()
    }

    async fn update_endpoint(
        &self,
        id: &str,
        owner: &str,
        patch: EndpointPatch,
    ) -> Result<Option<Endpoint>, CoreError> {
        let Some(existing) = self.get_endpoint_by_id(id).await? else {
            return Ok(None);
        };
        if existing.owner_id != owner {
            return Ok(None);
        }
        let updated = Endpoint {
            path: patch.path.unwrap_or(existing.path),
            code: patch.code.unwrap_or(existing.code),
            parameters: patch.parameters.unwrap_or(existing.parameters),
            http_method: patch.http_method.unwrap_or(existing.http_method),
            language: patch.language.unwrap_or(existing.language),
            ..existing
        };
        let result = sqlx::query(
            "UPDATE Endpoint SET path = ?, code = ?, parameters = ?, httpMethod = ?, language = ? \
             WHERE id = ? AND userId = ?",
        )
        .bind(&updated.path)
        .bind(&updated.code)
        .bind(join_parameters(&updated.parameters))
        .bind(updated.http_method.as_str())
        .bind(updated.language.as_str_owned())
        .bind(id)
        .bind(owner)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() > 0 {
            Ok(Some(updated))
        } else {
            Ok(None)
        }
    }

    async fn delete_endpoint(&self, id: &str, owner: &str) -> Result<bool, CoreError> {
        let result = sqlx::query("DELETE FROM Endpoint WHERE id = ? AND userId = ?")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_page(
        &self,
        owner: &str,
        path: &str,
        html_content: &str,
        project_id: &str,
    ) -> Result<Page, CoreError> {
        let page = Page {
            id: Uuid::new_v4().to_string(),
            path: path.to_string(),
            html_content: html_content.to_string(),
            project_id: project_id.to_string(),
            owner_id: owner.to_string(),
            created_at: Utc::now(),
        };
        sqlx::query(
            "INSERT INTO Page (id, path, htmlContent, projectId, userId, createdAt) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&page.id)
        .bind(&page.path)
        .bind(&page.html_content)
        .bind(&page.project_id)
        .bind(&page.owner_id)
        .bind(page.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(page)
    }

    async fn get_page_by_id(&self, id: &str) -> Result<Option<Page>, CoreError> {
        let row = sqlx::query("SELECT * FROM Page WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_page).transpose()
    }

    async fn get_page_by_path(&self, path: &str) -> Result<Option<Page>, CoreError> {
        let row = sqlx::query("SELECT * FROM Page WHERE path = ?")
            .bind(path)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_page).transpose()
    }

    async fn list_pages_by_owner(&self, owner: &str) -> Result<Vec<Page>, CoreError> {
        let rows = sqlx::query("SELECT * FROM Page WHERE userId = ? ORDER BY createdAt")
            .bind(owner)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_page).collect()
    }

    async fn list_pages_by_project(&self, project_id: &str) -> Result<Vec<Page>, CoreError> {
        let rows = sqlx::query("SELECT * FROM Page WHERE projectId = ? ORDER BY createdAt")
            .bind(project_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_page).collect()
    }

    async fn list_all_pages(&self) -> Result<Vec<Page>, CoreError> {
        let rows = sqlx::query("SELECT * FROM Page ORDER BY createdAt")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_page).collect()
    }

    async fn update_page(
        &self,
        id: &str,
        owner: &str,
        patch: PagePatch,
    ) -> Result<Option<Page>, CoreError> {
        let Some(existing) = self.get_page_by_id(id).await? else {
            return Ok(None);
        };
        if existing.owner_id != owner {
            return Ok(None);
        }
        let updated = Page {
            path: patch.path.unwrap_or(existing.path),
            html_content: patch.html_content.unwrap_or(existing.html_content),
            ..existing
        };
        let result = sqlx::query("UPDATE Page SET path = ?, htmlContent = ? WHERE id = ? AND userId = ?")
            .bind(&updated.path)
            .bind(&updated.html_content)
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() > 0 {
            Ok(Some(updated))
        } else {
            Ok(None)
        }
    }

    async fn delete_page(&self, id: &str, owner: &str) -> Result<bool, CoreError> {
        let result = sqlx::query("DELETE FROM Page WHERE id = ? AND userId = ?")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

impl Language {
    fn as_str_owned(&self) -> &'static str {
        match self {
            Language::Javascript => "javascript",
            Language::Python => "python",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn create_and_fetch_project() {
        let s = store().await;
        let p = s.create_project("u1", "Math Utils", None).await.unwrap();
        assert_eq!(p.name_slug(), "math-utils");
        let fetched = s.get_project(&p.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, p.id);
    }

    #[tokio::test]
    async fn endpoint_path_uniqueness_is_enforced_by_store() {
        let s = store().await;
        let p = s.create_project("u1", "P", None).await.unwrap();
        s.create_endpoint(
            "u1",
            "/api/p/x",
            &[],
            "function endpoint_function(p){return p;}",
            HttpMethod::Get,
            Language::Javascript,
            &p.id,
        )
        .await
        .unwrap();
        let second = s
            .create_endpoint(
                "u2",
                "/api/p/x",
                &[],
                "function endpoint_function(p){return p;}",
                HttpMethod::Get,
                Language::Javascript,
                &p.id,
            )
            .await;
        assert!(matches!(second, Err(CoreError::PathConflict(_))));
    }

    #[tokio::test]
    async fn cascade_delete_removes_endpoints_and_pages() {
        let s = store().await;
        let p = s.create_project("u1", "P", None).await.unwrap();
        s.create_endpoint(
            "u1",
            "/api/p/x",
            &[],
            "function endpoint_function(p){return p;}",
            HttpMethod::Get,
            Language::Javascript,
            &p.id,
        )
        .await
        .unwrap();
        s.create_page("u1", "/p/home", "<h1>hi</h1>", &p.id)
            .await
            .unwrap();
        let result = s.delete_project(&p.id, "u1", true).await.unwrap().unwrap();
        assert_eq!(result.endpoint_paths, vec!["/api/p/x".to_string()]);
        assert_eq!(result.page_paths, vec!["/p/home".to_string()]);
        assert!(s.list_endpoints_by_project(&p.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cascade_delete_by_non_owner_leaves_rows_untouched() {
        let s = store().await;
        let p = s.create_project("u1", "P", None).await.unwrap();
        s.create_endpoint(
            "u1",
            "/api/p/x",
            &[],
            "function endpoint_function(p){return p;}",
            HttpMethod::Get,
            Language::Javascript,
            &p.id,
        )
        .await
        .unwrap();
        s.create_page("u1", "/p/home", "<h1>hi</h1>", &p.id)
            .await
            .unwrap();

        let result = s.delete_project(&p.id, "u2", true).await.unwrap();
        assert!(result.is_none());
        assert!(s.get_project(&p.id).await.unwrap().is_some());
        assert_eq!(s.list_endpoints_by_project(&p.id).await.unwrap().len(), 1);
        assert_eq!(s.list_pages_by_project(&p.id).await.unwrap().len(), 1);
    }
}
