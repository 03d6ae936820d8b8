use std::sync::Arc;

use quiz_core::Clock;
use quiz_core::model::{AttemptId, QuizMode, Roadmap, SessionResult, UnitId, UserStats};

use super::service::{QuizSession, SessionStep};
use crate::auth::AuthProvider;
use crate::catalogue_service::CatalogueService;
use crate::error::SessionError;
use crate::progression_service::ProgressionService;
use crate::results_service::ResultsService;

/// What a finished session left behind.
///
/// Learn sessions leave nothing. Scored anonymous sessions leave only the
/// result. Scored signed-in sessions also carry the committed attempt id and
/// the freshly folded lifetime stats; on a retried finalize after an earlier
/// successful commit, `stats` is `None` because nothing was rewritten.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionFinish {
    pub result: Option<SessionResult>,
    pub attempt_id: Option<AttemptId>,
    pub stats: Option<UserStats>,
}

/// Result of advancing a session through the loop service.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAdvance {
    /// Now on the question at this index.
    Question(usize),
    /// The session completed and its outcome was settled.
    Finished(SessionFinish),
}

/// Orchestrates session start, completion, and what completion triggers:
/// committing the result and marking the unit complete.
///
/// A unit only counts as completed once its result is safely committed (or
/// there is nothing to commit). A failed commit therefore surfaces as an
/// error with the unit still incomplete, and [`QuizLoopService::finalize`]
/// retries from the kept session.
#[derive(Clone)]
pub struct QuizLoopService {
    clock: Clock,
    roadmap: Roadmap,
    catalogue: Arc<CatalogueService>,
    results: Arc<ResultsService>,
    progression: Arc<ProgressionService>,
    auth: Arc<dyn AuthProvider>,
}

impl QuizLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        roadmap: Roadmap,
        catalogue: Arc<CatalogueService>,
        results: Arc<ResultsService>,
        progression: Arc<ProgressionService>,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        Self {
            clock,
            roadmap,
            catalogue,
            results,
            progression,
            auth,
        }
    }

    /// Start a new session for the given unit and mode.
    ///
    /// The ultimate unit draws from the pooled questions of every week;
    /// regular units draw from their own.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoQuestions` when the unit has no questions,
    /// which includes the degraded empty catalogue after a failed fetch.
    pub async fn start(&self, unit: UnitId, mode: QuizMode) -> Result<QuizSession, SessionError> {
        let questions = if self.roadmap.is_ultimate(unit) {
            self.catalogue.all_questions().await
        } else {
            self.catalogue.questions_for(unit).await
        };
        QuizSession::new(unit, mode, questions, &self.roadmap, self.clock.now())
    }

    /// Advance the session; on completion, settle its outcome.
    ///
    /// # Errors
    ///
    /// Returns session stepping errors, or `SessionError::Results` when the
    /// final commit fails. After a failed commit the session stays complete
    /// and uncommitted; call [`Self::finalize`] to retry.
    pub async fn advance(
        &self,
        session: &mut QuizSession,
    ) -> Result<SessionAdvance, SessionError> {
        match session.advance(self.clock.now())? {
            SessionStep::Question(index) => Ok(SessionAdvance::Question(index)),
            SessionStep::Finished => Ok(SessionAdvance::Finished(self.settle(session).await?)),
        }
    }

    /// Retry settling a completed session whose commit failed earlier.
    ///
    /// Idempotent: once the attempt is committed the stored id is returned
    /// without writing again.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` if the session is not complete, and
    /// `SessionError::Results` if the commit fails again.
    pub async fn finalize(&self, session: &mut QuizSession) -> Result<SessionFinish, SessionError> {
        if !session.is_complete() {
            return Err(SessionError::Completed);
        }
        self.settle(session).await
    }

    /// Commit the result (signed in) and mark the unit complete. Completion
    /// is strictly after the commit succeeds.
    async fn settle(&self, session: &mut QuizSession) -> Result<SessionFinish, SessionError> {
        let Some(result) = session.result()? else {
            // Learn sessions neither commit nor complete anything.
            return Ok(SessionFinish {
                result: None,
                attempt_id: None,
                stats: None,
            });
        };

        if let Some(existing) = session.attempt_id() {
            return Ok(SessionFinish {
                attempt_id: Some(existing.clone()),
                result: Some(result),
                stats: None,
            });
        }

        match self.auth.current_user().await {
            Some(user) => {
                let committed = self.results.commit(&user, &result).await?;
                session.set_attempt_id(committed.attempt_id.clone());
                self.progression.complete(result.unit());
                Ok(SessionFinish {
                    result: Some(result),
                    attempt_id: Some(committed.attempt_id),
                    stats: Some(committed.stats),
                })
            }
            None => {
                self.progression.complete(result.unit());
                Ok(SessionFinish {
                    result: Some(result),
                    attempt_id: None,
                    stats: None,
                })
            }
        }
    }
}
