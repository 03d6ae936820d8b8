use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::UnitId;

//
// ─── QUIZ MODE ─────────────────────────────────────────────────────────────────
//

/// How a quiz session is played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizMode {
    /// Answers stay visible; nothing is selected, graded, or recorded.
    Learn,
    /// Questions in catalogue order, graded, counts recorded.
    Practice,
    /// Graded like practice, with question and option order permuted.
    Shuffle,
}

impl QuizMode {
    /// True for the modes that grade answers and produce a result.
    #[must_use]
    pub fn is_scored(&self) -> bool {
        !matches!(self, Self::Learn)
    }

    /// True when the mode itself asks for permuted questions and options.
    /// The ultimate unit shuffles regardless of mode.
    #[must_use]
    pub fn shuffles(&self) -> bool {
        matches!(self, Self::Shuffle)
    }

    /// The wire/storage spelling of the mode.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Learn => "learn",
            Self::Practice => "practice",
            Self::Shuffle => "shuffle",
        }
    }
}

impl fmt::Display for QuizMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error type for parsing a mode from its storage spelling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseModeError {
    raw: String,
}

impl fmt::Display for ParseModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown quiz mode '{}'", self.raw)
    }
}

impl std::error::Error for ParseModeError {}

impl FromStr for QuizMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "learn" => Ok(Self::Learn),
            "practice" => Ok(Self::Practice),
            "shuffle" => Ok(Self::Shuffle),
            other => Err(ParseModeError {
                raw: other.to_string(),
            }),
        }
    }
}

//
// ─── SESSION RESULT ────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionResultError {
    #[error("total questions ({total}) does not match answer counts ({sum})")]
    CountMismatch { total: u32, sum: u32 },

    #[error("learn sessions are not scored and produce no result")]
    UnscoredMode,
}

/// Immutable outcome of one scored quiz session.
///
/// Learn sessions never produce one of these: the constructor refuses the
/// mode, so nothing unscored can reach the aggregation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionResult {
    unit: UnitId,
    mode: QuizMode,
    total_questions: u32,
    correct: u32,
    incorrect: u32,
    time_taken_secs: u64,
}

impl SessionResult {
    /// Builds a result from final session counters.
    ///
    /// # Errors
    ///
    /// Returns `SessionResultError::CountMismatch` when the answer counts do
    /// not add up to the question total, and `SessionResultError::UnscoredMode`
    /// for learn mode.
    pub fn new(
        unit: UnitId,
        mode: QuizMode,
        total_questions: u32,
        correct: u32,
        incorrect: u32,
        time_taken_secs: u64,
    ) -> Result<Self, SessionResultError> {
        if !mode.is_scored() {
            return Err(SessionResultError::UnscoredMode);
        }
        let sum = correct + incorrect;
        if sum != total_questions {
            return Err(SessionResultError::CountMismatch {
                total: total_questions,
                sum,
            });
        }

        Ok(Self {
            unit,
            mode,
            total_questions,
            correct,
            incorrect,
            time_taken_secs,
        })
    }

    #[must_use]
    pub fn unit(&self) -> UnitId {
        self.unit
    }

    #[must_use]
    pub fn mode(&self) -> QuizMode {
        self.mode
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn correct(&self) -> u32 {
        self.correct
    }

    #[must_use]
    pub fn incorrect(&self) -> u32 {
        self.incorrect
    }

    /// Wall-clock length of the session in whole seconds.
    #[must_use]
    pub fn time_taken_secs(&self) -> u64 {
        self.time_taken_secs
    }

    /// The score a session contributes: one point per correct answer.
    #[must_use]
    pub fn score(&self) -> u32 {
        self.correct
    }

    /// Correct answers over the question total, as a percentage. Zero for an
    /// empty total.
    #[must_use]
    pub fn score_percent(&self) -> f64 {
        if self.total_questions == 0 {
            return 0.0;
        }
        f64::from(self.correct) / f64::from(self.total_questions) * 100.0
    }
}
