//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::SessionResultError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by question sources.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuestionSourceError {
    #[error("question request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by `ResultsService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ResultsError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by quiz sessions.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no questions available for this unit")]
    NoQuestions,
    #[error("session already completed")]
    Completed,
    #[error("current question already confirmed")]
    AlreadyConfirmed,
    #[error("no option selected")]
    NothingSelected,
    #[error("this mode does not score answers")]
    NotScorable,
    #[error("current question must be confirmed first")]
    NotConfirmed,
    #[error(transparent)]
    Result(#[from] SessionResultError),
    #[error(transparent)]
    Results(#[from] ResultsError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
