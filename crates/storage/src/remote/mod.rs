//! Client for the hosted document store that keeps the server-side copy of
//! profiles and quiz attempts.
//!
//! The API is a thin collection/document service: `GET
//! collections/{name}/documents` lists (filterable by query parameters),
//! `POST` creates, `PATCH documents/{id}` partially updates. Every response
//! body is JSON; listings arrive wrapped in a `{ total, documents }` envelope.

mod attempt_repo;
mod documents;
mod profile_repo;

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use std::sync::Arc;

use crate::repository::{Storage, StorageError};
use crate::sqlite::SqliteRepository;

pub(crate) const PROFILES_COLLECTION: &str = "profiles";
pub(crate) const ATTEMPTS_COLLECTION: &str = "attempts";

/// Connection settings for the hosted API.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    base_url: String,
    project_id: String,
    api_key: String,
}

impl RemoteConfig {
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        project_id: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            project_id: project_id.into(),
            api_key: api_key.into(),
        }
    }

    /// Reads `HOPQUIZ_API_BASE_URL`, `HOPQUIZ_API_PROJECT` and
    /// `HOPQUIZ_API_KEY`. Returns `None` when any of them is missing or
    /// blank, in which case the app runs on local storage alone.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = non_empty_env("HOPQUIZ_API_BASE_URL")?;
        let project_id = non_empty_env("HOPQUIZ_API_PROJECT")?;
        let api_key = non_empty_env("HOPQUIZ_API_KEY")?;
        Some(Self::new(base_url, project_id, api_key))
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// HTTP client for the document store. Implements both repository traits so
/// one store serves profiles and attempts over the same connection pool.
#[derive(Debug, Clone)]
pub struct RemoteStore {
    client: Client,
    config: RemoteConfig,
}

impl RemoteStore {
    #[must_use]
    pub fn new(config: RemoteConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Builds a store from the environment, or `None` when the API is not
    /// configured.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        RemoteConfig::from_env().map(Self::new)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header("X-Project-Id", &self.config.project_id)
            .header("X-Api-Key", &self.config.api_key)
    }

    pub(crate) fn documents_path(collection: &str) -> String {
        format!("collections/{collection}/documents")
    }

    pub(crate) fn document_path(collection: &str, id: &str) -> String {
        format!("collections/{collection}/documents/{id}")
    }
}

/// Maps a non-success response status onto the storage error taxonomy.
pub(crate) fn status_error(status: StatusCode) -> StorageError {
    match status {
        StatusCode::NOT_FOUND => StorageError::NotFound,
        StatusCode::CONFLICT => StorageError::Conflict,
        other => StorageError::Connection(format!("unexpected API status: {other}")),
    }
}

pub(crate) fn transport_error(err: reqwest::Error) -> StorageError {
    StorageError::Connection(err.to_string())
}

pub(crate) fn decode_error(err: reqwest::Error) -> StorageError {
    StorageError::Serialization(err.to_string())
}

impl Storage {
    /// Wires the remote document store for profiles and attempts with a
    /// local SQLite database for the offline progression snapshot.
    #[must_use]
    pub fn remote_with_sqlite(remote: RemoteStore, local: SqliteRepository) -> Self {
        Self {
            profiles: Arc::new(remote.clone()),
            attempts: Arc::new(remote),
            local_state: Arc::new(local),
        }
    }
}
