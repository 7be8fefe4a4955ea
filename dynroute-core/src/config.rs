//! Environment-driven configuration.

use std::env;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub session_secret: String,
    pub handler_timeout: Duration,
    /// cascade-delete on project removal, default on.
    pub cascade_delete_projects: bool,
    /// Gate for `GET /api/debug/routes`. `None` disables the route.
    pub admin_token: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, crate::error::CoreError> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite::memory:".to_string());
        let port = env::var("PORT")
            .ok()
            .map(|v| v.parse::<u16>())
            .transpose()
            .map_err(|e| crate::error::CoreError::Internal(format!("invalid PORT: {e}")))?
            .unwrap_or(8080);
        let session_secret = env::var("SESSION_SECRET").unwrap_or_else(|_| "dev-secret".to_string());
        let handler_timeout_ms = env::var("HANDLER_TIMEOUT_MS")
            .ok()
            .map(|v| v.parse::<u64>())
            .transpose()
            .map_err(|e| {
                crate::error::CoreError::Internal(format!("invalid HANDLER_TIMEOUT_MS: {e}"))
            })?
            .unwrap_or(10_000);
        let cascade_delete_projects = env::var("CASCADE_DELETE_PROJECTS")
            .ok()
            .map(|v| v != "0" && v.to_lowercase() != "false")
            .unwrap_or(true);
        let admin_token = env::var("ADMIN_TOKEN").ok();

        Ok(Self {
            database_url,
            port,
            session_secret,
            handler_timeout: Duration::from_millis(handler_timeout_ms),
            cascade_delete_projects,
            admin_token,
        })
    }
}
