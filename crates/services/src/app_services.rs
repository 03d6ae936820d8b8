use std::sync::Arc;

use quiz_core::model::Roadmap;
use storage::remote::RemoteStore;
use storage::repository::{InMemoryRepository, Storage};
use storage::sqlite::SqliteRepository;

use crate::Clock;
use crate::auth::AuthProvider;
use crate::catalogue_service::{CatalogueService, QuestionSource};
use crate::error::AppServicesError;
use crate::progression_service::ProgressionService;
use crate::results_service::ResultsService;
use crate::sessions::QuizLoopService;

/// Assembles the app-facing services over one storage backend, one question
/// source, and one auth provider.
#[derive(Clone)]
pub struct AppServices {
    catalogue: Arc<CatalogueService>,
    progression: Arc<ProgressionService>,
    results: Arc<ResultsService>,
    quiz_loop: Arc<QuizLoopService>,
    auth: Arc<dyn AuthProvider>,
}

impl AppServices {
    /// Wires every service over the given storage backend.
    #[must_use]
    pub fn with_storage(
        clock: Clock,
        storage: Storage,
        source: Arc<dyn QuestionSource>,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        let roadmap = Roadmap::default();
        let catalogue = Arc::new(CatalogueService::new(source));
        let progression = Arc::new(ProgressionService::new(
            clock,
            roadmap,
            Arc::clone(&storage.profiles),
            Arc::clone(&storage.local_state),
        ));
        let results = Arc::new(ResultsService::new(
            clock,
            Arc::clone(&storage.profiles),
            Arc::clone(&storage.attempts),
        ));
        let quiz_loop = Arc::new(QuizLoopService::new(
            clock,
            roadmap,
            Arc::clone(&catalogue),
            Arc::clone(&results),
            Arc::clone(&progression),
            Arc::clone(&auth),
        ));

        Self {
            catalogue,
            progression,
            results,
            quiz_loop,
            auth,
        }
    }

    /// Everything in memory: demos, tests, offline play.
    #[must_use]
    pub fn in_memory(
        clock: Clock,
        source: Arc<dyn QuestionSource>,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        Self::with_storage(clock, Storage::in_memory(), source, auth)
    }

    /// Build services over the local `SQLite` database, attaching the remote
    /// document store when the `HOPQUIZ_API_*` variables are configured.
    ///
    /// Without a remote store, profiles and attempts live in memory for the
    /// process lifetime; only the progression slot survives restarts.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the database cannot be opened or
    /// migrated.
    pub async fn open_local(
        db_url: &str,
        clock: Clock,
        source: Arc<dyn QuestionSource>,
        auth: Arc<dyn AuthProvider>,
    ) -> Result<Self, AppServicesError> {
        let sqlite = SqliteRepository::open(db_url).await?;
        let storage = match RemoteStore::from_env() {
            Some(remote) => Storage::remote_with_sqlite(remote, sqlite),
            None => {
                let repo = Arc::new(InMemoryRepository::new());
                Storage {
                    profiles: repo.clone(),
                    attempts: repo,
                    local_state: Arc::new(sqlite),
                }
            }
        };
        Ok(Self::with_storage(clock, storage, source, auth))
    }

    /// Resolves the current user and loads their progression. Call once at
    /// startup; infallible, like the pieces it glues together.
    pub async fn bootstrap(&self) {
        let identity = self.auth.current_user().await;
        self.progression.bootstrap(identity.as_ref()).await;
    }

    #[must_use]
    pub fn catalogue(&self) -> Arc<CatalogueService> {
        Arc::clone(&self.catalogue)
    }

    #[must_use]
    pub fn progression(&self) -> Arc<ProgressionService> {
        Arc::clone(&self.progression)
    }

    #[must_use]
    pub fn results(&self) -> Arc<ResultsService> {
        Arc::clone(&self.results)
    }

    #[must_use]
    pub fn quiz_loop(&self) -> Arc<QuizLoopService> {
        Arc::clone(&self.quiz_loop)
    }

    #[must_use]
    pub fn auth(&self) -> Arc<dyn AuthProvider> {
        Arc::clone(&self.auth)
    }
}
