//! Durable entities (Project, Endpoint, Page) and the in-memory RouteInfo.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl std::str::FromStr for HttpMethod {
    type Err = crate::error::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            other => Err(crate::error::CoreError::BadRequest(format!(
                "unsupported http method: {other}"
            ))),
        }
    }
}

impl Default for HttpMethod {
    fn default() -> Self {
        HttpMethod::Get
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Javascript,
    Python,
}

impl std::str::FromStr for Language {
    type Err = crate::error::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "javascript" | "js" => Ok(Language::Javascript),
            "python" | "py" => Ok(Language::Python),
            other => Err(crate::error::CoreError::BadRequest(format!(
                "unsupported language: {other}"
            ))),
        }
    }
}

impl Default for Language {
    fn default() -> Self {
        Language::Javascript
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
}

impl Project {
    /// `lower(name)` with runs of whitespace collapsed to `'-'`.
    pub fn name_slug(&self) -> String {
        slugify(&self.name)
    }
}

pub fn slugify(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    let mut out = String::with_capacity(lower.len());
    let mut last_was_space = false;
    for c in lower.chars() {
        if c.is_whitespace() {
            if !last_was_space && !out.is_empty() {
                out.push('-');
            }
            last_was_space = true;
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    out.trim_end_matches('-').to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: String,
    pub path: String,
    /// Ordered, possibly-empty, parameter names. Persists as a comma-joined string.
    pub parameters: Vec<String>,
    pub code: String,
    pub language: Language,
    pub http_method: HttpMethod,
    pub project_id: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
}

pub fn join_parameters(params: &[String]) -> String {
    params.join(",")
}

pub fn split_parameters(raw: &str) -> Vec<String> {
    if raw.trim().is_empty() {
        Vec::new()
    } else {
        raw.split(',').map(|s| s.trim().to_string()).collect()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    pub path: String,
    pub html_content: String,
    pub project_id: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
}

/// Optional display fields joined in from `user`/`project` for listings; absent rather
/// than failing decode when the join target has disappeared.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DisplayFields {
    pub user_email: Option<String>,
    pub project_name: Option<String>,
}

/// The Registry's in-memory record for one path.
#[derive(Clone)]
pub enum RouteInfo {
    Endpoint {
        path: String,
        parameters: Vec<String>,
        http_method: HttpMethod,
        language: Language,
        handler: crate::sandbox::CompiledHandler,
    },
    Page {
        path: String,
        html_content: String,
    },
}

impl RouteInfo {
    pub fn path(&self) -> &str {
        match self {
            RouteInfo::Endpoint { path, .. } => path,
            RouteInfo::Page { path, .. } => path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_collapses_whitespace_and_lowercases() {
        assert_eq!(slugify("Math   Utils"), "math-utils");
        assert_eq!(slugify("  Hello World  "), "hello-world");
        assert_eq!(slugify("already-slug"), "already-slug");
    }

    #[test]
    fn parameter_round_trip() {
        let params = vec!["a".to_string(), "b".to_string()];
        let joined = join_parameters(&params);
        assert_eq!(joined, "a,b");
        assert_eq!(split_parameters(&joined), params);
        assert!(split_parameters("").is_empty());
    }
}
