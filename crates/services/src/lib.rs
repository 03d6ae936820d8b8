#![forbid(unsafe_code)]

pub mod app_services;
pub mod auth;
pub mod catalogue_service;
pub mod error;
pub mod progression_service;
pub mod results_service;
pub mod sessions;

pub use quiz_core::Clock;
pub use sessions as session;

pub use error::{AppServicesError, QuestionSourceError, ResultsError, SessionError};

pub use app_services::AppServices;
pub use auth::{AuthProvider, HttpAuthProvider, StaticAuthProvider, UserIdentity};
pub use catalogue_service::{
    CatalogueDocument, CatalogueService, HttpQuestionSource, QuestionDocument, QuestionSource,
    StaticQuestionSource, UnitDocument,
};
pub use progression_service::{DEFAULT_SAVE_DELAY, ProgressionService};
pub use results_service::{CommittedResult, LeaderboardEntry, ResultsService};

pub use sessions::{
    QuizLoopService, QuizSession, SessionAdvance, SessionFinish, SessionProgress, SessionQuestion,
    SessionStep,
};
