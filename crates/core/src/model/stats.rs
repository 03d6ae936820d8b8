use crate::model::session::SessionResult;

/// Lifetime statistics for one user, folded from every committed attempt.
///
/// Counters only ever grow; the average is recomputed from the cumulative
/// totals on every fold rather than averaged incrementally.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserStats {
    quizzes_taken: u32,
    questions_answered: u64,
    correct: u64,
    incorrect: u64,
    total_score: u64,
    average_score: f64,
}

impl UserStats {
    /// A brand-new profile: all zeros.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rehydrates stats from stored values.
    #[must_use]
    pub fn from_persisted(
        quizzes_taken: u32,
        questions_answered: u64,
        correct: u64,
        incorrect: u64,
        total_score: u64,
        average_score: f64,
    ) -> Self {
        Self {
            quizzes_taken,
            questions_answered,
            correct,
            incorrect,
            total_score,
            average_score,
        }
    }

    /// Folds one session result into the running totals.
    ///
    /// `average_score` becomes lifetime correct over lifetime answered, as a
    /// percentage, guarded to 0.0 when nothing has been answered yet.
    #[allow(clippy::cast_precision_loss)]
    pub fn apply_result(&mut self, result: &SessionResult) {
        self.quizzes_taken = self.quizzes_taken.saturating_add(1);
        self.questions_answered = self
            .questions_answered
            .saturating_add(u64::from(result.total_questions()));
        self.correct = self.correct.saturating_add(u64::from(result.correct()));
        self.incorrect = self.incorrect.saturating_add(u64::from(result.incorrect()));
        self.total_score = self.total_score.saturating_add(u64::from(result.score()));

        self.average_score = if self.questions_answered == 0 {
            0.0
        } else {
            self.correct as f64 / self.questions_answered as f64 * 100.0
        };
    }

    #[must_use]
    pub fn quizzes_taken(&self) -> u32 {
        self.quizzes_taken
    }

    #[must_use]
    pub fn questions_answered(&self) -> u64 {
        self.questions_answered
    }

    #[must_use]
    pub fn correct(&self) -> u64 {
        self.correct
    }

    #[must_use]
    pub fn incorrect(&self) -> u64 {
        self.incorrect
    }

    /// Leaderboard ordering key: one point per correct answer, summed over
    /// every attempt.
    #[must_use]
    pub fn total_score(&self) -> u64 {
        self.total_score
    }

    /// Lifetime accuracy percentage.
    #[must_use]
    pub fn average_score(&self) -> f64 {
        self.average_score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{QuizMode, UnitId};

    fn result(total: u32, correct: u32) -> SessionResult {
        SessionResult::new(
            UnitId::new(1),
            QuizMode::Practice,
            total,
            correct,
            total - correct,
            60,
        )
        .unwrap()
    }

    #[test]
    fn fold_accumulates_and_recomputes_average() {
        let mut stats = UserStats::from_persisted(2, 20, 15, 5, 15, 75.0);
        stats.apply_result(&result(10, 7));

        assert_eq!(stats.quizzes_taken(), 3);
        assert_eq!(stats.questions_answered(), 30);
        assert_eq!(stats.correct(), 22);
        assert_eq!(stats.incorrect(), 8);
        assert_eq!(stats.total_score(), 22);
        assert!((stats.average_score() - (22.0 / 30.0 * 100.0)).abs() < 1e-9);
    }

    #[test]
    fn fold_from_zero() {
        let mut stats = UserStats::new();
        stats.apply_result(&result(5, 5));

        assert_eq!(stats.quizzes_taken(), 1);
        assert_eq!(stats.total_score(), 5);
        assert!((stats.average_score() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_session_never_divides_by_zero() {
        let mut stats = UserStats::new();
        let empty = SessionResult::new(UnitId::new(1), QuizMode::Practice, 0, 0, 0, 0).unwrap();
        stats.apply_result(&empty);

        assert_eq!(stats.quizzes_taken(), 1);
        assert_eq!(stats.questions_answered(), 0);
        assert!((stats.average_score() - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn counters_never_shrink() {
        let mut stats = UserStats::from_persisted(1, 10, 2, 8, 2, 20.0);
        let before_correct = stats.correct();
        stats.apply_result(&result(4, 0));

        assert_eq!(stats.correct(), before_correct);
        assert_eq!(stats.incorrect(), 12);
        assert!(stats.average_score() < 20.0);
    }
}
