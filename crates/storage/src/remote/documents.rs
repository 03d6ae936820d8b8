use chrono::{DateTime, Utc};
use quiz_core::model::{AttemptId, ProfileId, QuizMode, UnitId, UserId, UserStats};
use serde::{Deserialize, Serialize};

use crate::repository::{AttemptRecord, ProfileRecord, ProgressionRecord, StorageError};

//
// ─── WIRE SHAPES ───────────────────────────────────────────────────────────────
//

/// Envelope every document listing arrives in.
#[derive(Debug, Deserialize)]
pub struct DocumentList<T> {
    #[allow(dead_code)]
    pub total: u64,
    pub documents: Vec<T>,
}

/// A profile document as the hosted API stores it. Field names follow the
/// service's schema ("weeks", camelCase); the Rust side speaks "units".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub carrots: u32,
    pub unlocked_weeks: Vec<UnitId>,
    #[serde(default)]
    pub completed_weeks: Vec<UnitId>,
    #[serde(default)]
    pub active_week: Option<UnitId>,
    #[serde(default)]
    pub promo_started_at: Option<DateTime<Utc>>,
    pub total_quizzes_taken: u32,
    pub total_questions_answered: u64,
    pub total_correct: u64,
    pub total_incorrect: u64,
    pub total_score: u64,
    pub average_score: f64,
}

impl ProfileDocument {
    /// The payload for creating a fresh profile (no id yet, defaults applied).
    #[must_use]
    pub fn for_create(user_id: &UserId, username: &str, email: &str) -> Self {
        let progression = ProgressionRecord::default();
        Self {
            id: None,
            user_id: user_id.as_str().to_string(),
            username: username.to_string(),
            email: email.to_string(),
            carrots: progression.carrots,
            unlocked_weeks: progression.unlocked_units,
            completed_weeks: progression.completed_units,
            active_week: progression.active_unit,
            promo_started_at: progression.promo_started_at,
            total_quizzes_taken: 0,
            total_questions_answered: 0,
            total_correct: 0,
            total_incorrect: 0,
            total_score: 0,
            average_score: 0.0,
        }
    }

    /// Converts a stored document into the repository record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` when the document carries no id,
    /// which only happens if the server misbehaves.
    pub fn into_record(self) -> Result<ProfileRecord, StorageError> {
        let id = self
            .id
            .ok_or_else(|| StorageError::Serialization("profile document without id".into()))?;
        Ok(ProfileRecord {
            id: ProfileId::new(id),
            user_id: UserId::new(self.user_id),
            username: self.username,
            email: self.email,
            progression: ProgressionRecord {
                carrots: self.carrots,
                unlocked_units: self.unlocked_weeks,
                completed_units: self.completed_weeks,
                active_unit: self.active_week,
                promo_started_at: self.promo_started_at,
            },
            stats: UserStats::from_persisted(
                self.total_quizzes_taken,
                self.total_questions_answered,
                self.total_correct,
                self.total_incorrect,
                self.total_score,
                self.average_score,
            ),
        })
    }
}

/// Partial update writing only the progression fields of a profile.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressionPatch<'a> {
    pub carrots: u32,
    pub unlocked_weeks: &'a [UnitId],
    pub completed_weeks: &'a [UnitId],
    pub active_week: Option<UnitId>,
    pub promo_started_at: Option<DateTime<Utc>>,
}

impl<'a> ProgressionPatch<'a> {
    #[must_use]
    pub fn from_record(record: &'a ProgressionRecord) -> Self {
        Self {
            carrots: record.carrots,
            unlocked_weeks: &record.unlocked_units,
            completed_weeks: &record.completed_units,
            active_week: record.active_unit,
            promo_started_at: record.promo_started_at,
        }
    }
}

/// Partial update writing only the lifetime stats of a profile.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsPatch {
    pub total_quizzes_taken: u32,
    pub total_questions_answered: u64,
    pub total_correct: u64,
    pub total_incorrect: u64,
    pub total_score: u64,
    pub average_score: f64,
}

impl StatsPatch {
    #[must_use]
    pub fn from_stats(stats: &UserStats) -> Self {
        Self {
            total_quizzes_taken: stats.quizzes_taken(),
            total_questions_answered: stats.questions_answered(),
            total_correct: stats.correct(),
            total_incorrect: stats.incorrect(),
            total_score: stats.total_score(),
            average_score: stats.average_score(),
        }
    }
}

/// A quiz attempt document as the hosted API stores it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    pub username: String,
    pub week_number: UnitId,
    pub mode: QuizMode,
    pub total_questions: u32,
    pub correct_answers: u32,
    pub incorrect_answers: u32,
    pub score: u32,
    pub score_percentage: f64,
    pub time_taken: u64,
    pub completed_at: DateTime<Utc>,
}

impl AttemptDocument {
    #[must_use]
    pub fn from_record(record: &AttemptRecord) -> Self {
        Self {
            id: None,
            user_id: record.user_id.as_str().to_string(),
            username: record.username.clone(),
            week_number: record.unit,
            mode: record.mode,
            total_questions: record.total_questions,
            correct_answers: record.correct,
            incorrect_answers: record.incorrect,
            score: record.score,
            score_percentage: record.score_percent,
            time_taken: record.time_taken_secs,
            completed_at: record.completed_at,
        }
    }

    /// The id of a stored attempt document.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` when the server returned a
    /// document without an id.
    pub fn require_id(&self) -> Result<AttemptId, StorageError> {
        self.id
            .as_deref()
            .map(AttemptId::new)
            .ok_or_else(|| StorageError::Serialization("attempt document without id".into()))
    }

    #[must_use]
    pub fn into_record(self) -> AttemptRecord {
        AttemptRecord {
            user_id: UserId::new(self.user_id),
            username: self.username,
            unit: self.week_number,
            mode: self.mode,
            total_questions: self.total_questions,
            correct: self.correct_answers,
            incorrect: self.incorrect_answers,
            score: self.score,
            score_percent: self.score_percentage,
            time_taken_secs: self.time_taken,
            completed_at: self.completed_at,
        }
    }
}
