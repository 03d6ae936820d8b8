use std::sync::Arc;

use quiz_core::Clock;
use quiz_core::model::{AttemptId, SessionResult, UserId, UserStats};
use storage::repository::{AttemptRecord, AttemptRepository, ProfileRepository};

use crate::auth::UserIdentity;
use crate::error::ResultsError;

//
// ─── COMMITTED RESULT ──────────────────────────────────────────────────────────
//

/// What a successful commit produced: the stored attempt's id and the
/// profile's lifetime stats with this result folded in.
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedResult {
    pub attempt_id: AttemptId,
    pub stats: UserStats,
}

/// One leaderboard row, ranked by lifetime total score.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub user_id: UserId,
    pub username: String,
    pub total_score: u64,
    pub average_score: f64,
    pub quizzes_taken: u32,
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Records finished quiz results and serves the read sides built on them:
/// attempt history and the score leaderboard.
#[derive(Clone)]
pub struct ResultsService {
    clock: Clock,
    profiles: Arc<dyn ProfileRepository>,
    attempts: Arc<dyn AttemptRepository>,
}

impl ResultsService {
    #[must_use]
    pub fn new(
        clock: Clock,
        profiles: Arc<dyn ProfileRepository>,
        attempts: Arc<dyn AttemptRepository>,
    ) -> Self {
        Self {
            clock,
            profiles,
            attempts,
        }
    }

    /// Commits one finished result for a signed-in user: folds it into the
    /// profile's lifetime stats and appends the attempt row as one visible
    /// unit, stamped with the service clock.
    ///
    /// # Errors
    ///
    /// Returns `ResultsError::Storage` when the profile cannot be read or
    /// the write fails. On error nothing is recorded, so the caller may
    /// simply retry the commit.
    pub async fn commit(
        &self,
        user: &UserIdentity,
        result: &SessionResult,
    ) -> Result<CommittedResult, ResultsError> {
        let profile = self
            .profiles
            .get_or_create(&user.id, user.display_name(), &user.email)
            .await?;

        let mut stats = profile.stats.clone();
        stats.apply_result(result);

        let attempt = AttemptRecord::from_result(
            user.id.clone(),
            user.display_name(),
            result,
            self.clock.now(),
        );
        let attempt_id = self
            .attempts
            .commit_attempt(&attempt, &profile.id, &stats)
            .await?;

        Ok(CommittedResult { attempt_id, stats })
    }

    /// The top `limit` profiles by lifetime total score, ranked from 1.
    /// Ties keep their stored order, so ranks are deterministic.
    ///
    /// # Errors
    ///
    /// Returns `ResultsError::Storage` when the listing cannot be read.
    pub async fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, ResultsError> {
        let profiles = self.profiles.list_by_score(limit).await?;
        Ok(profiles
            .into_iter()
            .enumerate()
            .map(|(index, profile)| LeaderboardEntry {
                rank: u32::try_from(index + 1).unwrap_or(u32::MAX),
                user_id: profile.user_id,
                username: profile.username,
                total_score: profile.stats.total_score(),
                average_score: profile.stats.average_score(),
                quizzes_taken: profile.stats.quizzes_taken(),
            })
            .collect())
    }

    /// The 1-based leaderboard position of a user, or `None` for users with
    /// no profile.
    ///
    /// # Errors
    ///
    /// Returns `ResultsError::Storage` when the listing cannot be read.
    pub async fn rank(&self, user_id: &UserId) -> Result<Option<u32>, ResultsError> {
        let profiles = self.profiles.list_by_score(u32::MAX).await?;
        Ok(profiles
            .iter()
            .position(|profile| profile.user_id == *user_id)
            .map(|index| u32::try_from(index + 1).unwrap_or(u32::MAX)))
    }

    /// A user's attempts, most recent first.
    ///
    /// # Errors
    ///
    /// Returns `ResultsError::Storage` when the listing cannot be read.
    pub async fn history(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<AttemptRecord>, ResultsError> {
        Ok(self.attempts.list_for_user(user_id, limit).await?)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::fixed_clock;
    use quiz_core::model::{QuizMode, UnitId};
    use storage::repository::Storage;

    fn identity(n: u32) -> UserIdentity {
        UserIdentity::new(
            UserId::new(format!("user-{n}")),
            Some(format!("player-{n}")),
            format!("player-{n}@example.com"),
        )
    }

    fn result(correct: u32, total: u32) -> SessionResult {
        SessionResult::new(
            UnitId::new(2),
            QuizMode::Practice,
            total,
            correct,
            total - correct,
            80,
        )
        .unwrap()
    }

    fn service(storage: &Storage) -> ResultsService {
        ResultsService::new(
            fixed_clock(),
            Arc::clone(&storage.profiles),
            Arc::clone(&storage.attempts),
        )
    }

    #[tokio::test]
    async fn commit_folds_stats_and_appends_history() {
        let storage = Storage::in_memory();
        let service = service(&storage);
        let user = identity(1);

        let first = service.commit(&user, &result(7, 10)).await.unwrap();
        assert_eq!(first.stats.quizzes_taken(), 1);
        assert_eq!(first.stats.total_score(), 7);

        let second = service.commit(&user, &result(5, 10)).await.unwrap();
        assert_eq!(second.stats.quizzes_taken(), 2);
        assert_eq!(second.stats.total_score(), 12);
        assert_ne!(first.attempt_id, second.attempt_id);

        let history = service.history(&user.id, 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].unit, UnitId::new(2));
        assert_eq!(history[0].username, "player-1");
    }

    #[tokio::test]
    async fn leaderboard_ranks_by_total_score() {
        let storage = Storage::in_memory();
        let service = service(&storage);

        service.commit(&identity(1), &result(3, 10)).await.unwrap();
        service.commit(&identity(2), &result(9, 10)).await.unwrap();
        service.commit(&identity(3), &result(6, 10)).await.unwrap();

        let board = service.leaderboard(10).await.unwrap();
        let names: Vec<&str> = board.iter().map(|e| e.username.as_str()).collect();
        assert_eq!(names, vec!["player-2", "player-3", "player-1"]);
        assert_eq!(board[0].rank, 1);
        assert_eq!(board[2].rank, 3);
        assert_eq!(board[0].total_score, 9);
        assert!((board[0].average_score - 90.0).abs() < f64::EPSILON);

        assert_eq!(service.rank(&identity(2).id).await.unwrap(), Some(1));
        assert_eq!(service.rank(&identity(1).id).await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn rank_is_none_for_unknown_users() {
        let storage = Storage::in_memory();
        let service = service(&storage);

        assert_eq!(service.rank(&UserId::new("ghost")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn history_respects_the_limit() {
        let storage = Storage::in_memory();
        let service = service(&storage);
        let user = identity(4);

        for _ in 0..3 {
            service.commit(&user, &result(5, 10)).await.unwrap();
        }

        let history = service.history(&user.id, 2).await.unwrap();
        assert_eq!(history.len(), 2);
    }
}
