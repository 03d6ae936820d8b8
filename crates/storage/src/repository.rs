use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quiz_core::model::{
    AttemptId, ProfileId, ProgressionState, QuizMode, SessionResult, UnitId, UserId, UserStats,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── RECORDS ───────────────────────────────────────────────────────────────────
//

/// Persisted shape of `ProgressionState`.
///
/// Mirrors the domain aggregate so repositories can serialize it without
/// leaking storage concerns into the domain layer. This struct is also the
/// JSON payload of the local fallback store, so it derives serde.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressionRecord {
    pub carrots: u32,
    pub unlocked_units: Vec<UnitId>,
    pub completed_units: Vec<UnitId>,
    pub active_unit: Option<UnitId>,
    pub promo_started_at: Option<DateTime<Utc>>,
}

impl ProgressionRecord {
    #[must_use]
    pub fn from_state(state: &ProgressionState) -> Self {
        Self {
            carrots: state.carrots(),
            unlocked_units: state.unlocked().iter().copied().collect(),
            completed_units: state.completed().iter().copied().collect(),
            active_unit: Some(state.active_unit()),
            promo_started_at: state.promo_started_at(),
        }
    }

    /// Rehydrates the domain aggregate. Normalisation (empty unlocked set,
    /// missing cursor) happens in the domain constructor.
    #[must_use]
    pub fn into_state(self) -> ProgressionState {
        ProgressionState::from_persisted(
            self.carrots,
            self.unlocked_units.into_iter().collect(),
            self.completed_units.into_iter().collect(),
            self.active_unit,
            self.promo_started_at,
        )
    }
}

impl Default for ProgressionRecord {
    /// The record of a brand-new profile.
    fn default() -> Self {
        Self::from_state(&ProgressionState::new())
    }
}

/// One user profile document: identity, progression, and lifetime stats.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileRecord {
    pub id: ProfileId,
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub progression: ProgressionRecord,
    pub stats: UserStats,
}

/// One immutable quiz attempt.
///
/// Username and percentage are denormalized so history and completion views
/// render from attempt rows alone.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptRecord {
    pub user_id: UserId,
    pub username: String,
    pub unit: UnitId,
    pub mode: QuizMode,
    pub total_questions: u32,
    pub correct: u32,
    pub incorrect: u32,
    pub score: u32,
    pub score_percent: f64,
    pub time_taken_secs: u64,
    pub completed_at: DateTime<Utc>,
}

impl AttemptRecord {
    /// Builds the attempt row for a committed session result.
    #[must_use]
    pub fn from_result(
        user_id: UserId,
        username: impl Into<String>,
        result: &SessionResult,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            username: username.into(),
            unit: result.unit(),
            mode: result.mode(),
            total_questions: result.total_questions(),
            correct: result.correct(),
            incorrect: result.incorrect(),
            score: result.score(),
            score_percent: result.score_percent(),
            time_taken_secs: result.time_taken_secs(),
            completed_at,
        }
    }
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

/// Repository contract for user profiles.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Fetch the profile for a user, creating it with first-sight defaults
    /// when none exists. Idempotent: an existing profile is returned as-is,
    /// defaults are never re-applied, and a duplicate-creation conflict from
    /// a concurrent call resolves by returning the already-created record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the profile cannot be read or created.
    async fn get_or_create(
        &self,
        user_id: &UserId,
        username: &str,
        email: &str,
    ) -> Result<ProfileRecord, StorageError>;

    /// Fetch a profile by user id, if present.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure; a missing profile is `Ok(None)`.
    async fn find_by_user(&self, user_id: &UserId) -> Result<Option<ProfileRecord>, StorageError>;

    /// Overwrite the stored progression of a profile.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the profile is missing, or other
    /// storage errors.
    async fn update_progression(
        &self,
        id: &ProfileId,
        progression: &ProgressionRecord,
    ) -> Result<(), StorageError>;

    /// Profiles ordered by `total_score` descending. The order is stable:
    /// equal scores keep their first-seen order, which is what makes
    /// leaderboard ranks deterministic.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the listing cannot be read.
    async fn list_by_score(&self, limit: u32) -> Result<Vec<ProfileRecord>, StorageError>;
}

/// Repository contract for quiz attempts and the stats they fold into.
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Append the attempt and store the already-folded stats on the profile
    /// as one visible unit: a reader sees both or neither.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the profile is missing, or other
    /// storage errors. On error nothing is recorded.
    async fn commit_attempt(
        &self,
        attempt: &AttemptRecord,
        profile_id: &ProfileId,
        stats: &UserStats,
    ) -> Result<AttemptId, StorageError>;

    /// Attempts for a user, most recent first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the listing cannot be read.
    async fn list_for_user(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<AttemptRecord>, StorageError>;
}

/// Contract for the local fallback slot holding progression when the remote
/// store is unreachable (or nobody is signed in). One slot, last write wins.
#[async_trait]
pub trait LocalStateRepository: Send + Sync {
    /// Load the locally saved progression, if any was ever written.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the slot cannot be read or decoded.
    async fn load_state(&self) -> Result<Option<ProgressionRecord>, StorageError>;

    /// Overwrite the locally saved progression.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the slot cannot be written.
    async fn save_state(&self, state: &ProgressionRecord) -> Result<(), StorageError>;
}

//
// ─── IN-MEMORY IMPLEMENTATION ──────────────────────────────────────────────────
//

/// Simple in-memory repository implementation for testing and offline runs.
///
/// Profiles live in a `Vec` so insertion order survives; the stable sort in
/// `list_by_score` then gives ties their first-seen order.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    profiles: Arc<Mutex<Vec<ProfileRecord>>>,
    attempts: Arc<Mutex<Vec<(AttemptId, AttemptRecord)>>>,
    local_state: Arc<Mutex<Option<ProgressionRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn mint_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

#[async_trait]
impl ProfileRepository for InMemoryRepository {
    async fn get_or_create(
        &self,
        user_id: &UserId,
        username: &str,
        email: &str,
    ) -> Result<ProfileRecord, StorageError> {
        let mut guard = self
            .profiles
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if let Some(existing) = guard.iter().find(|p| p.user_id == *user_id) {
            return Ok(existing.clone());
        }
        let record = ProfileRecord {
            id: ProfileId::new(Self::mint_id()),
            user_id: user_id.clone(),
            username: username.to_string(),
            email: email.to_string(),
            progression: ProgressionRecord::default(),
            stats: UserStats::new(),
        };
        guard.push(record.clone());
        Ok(record)
    }

    async fn find_by_user(&self, user_id: &UserId) -> Result<Option<ProfileRecord>, StorageError> {
        let guard = self
            .profiles
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.iter().find(|p| p.user_id == *user_id).cloned())
    }

    async fn update_progression(
        &self,
        id: &ProfileId,
        progression: &ProgressionRecord,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .profiles
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let profile = guard
            .iter_mut()
            .find(|p| p.id == *id)
            .ok_or(StorageError::NotFound)?;
        profile.progression = progression.clone();
        Ok(())
    }

    async fn list_by_score(&self, limit: u32) -> Result<Vec<ProfileRecord>, StorageError> {
        let guard = self
            .profiles
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut records = guard.clone();
        // sort_by is stable: equal scores keep insertion order
        records.sort_by(|a, b| b.stats.total_score().cmp(&a.stats.total_score()));
        records.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(records)
    }
}

#[async_trait]
impl AttemptRepository for InMemoryRepository {
    async fn commit_attempt(
        &self,
        attempt: &AttemptRecord,
        profile_id: &ProfileId,
        stats: &UserStats,
    ) -> Result<AttemptId, StorageError> {
        // Update the profile first: if it is missing, the attempt never
        // becomes visible either.
        let mut profiles = self
            .profiles
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let profile = profiles
            .iter_mut()
            .find(|p| p.id == *profile_id)
            .ok_or(StorageError::NotFound)?;
        profile.stats = stats.clone();

        let id = AttemptId::new(Self::mint_id());
        let mut attempts = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        attempts.push((id.clone(), attempt.clone()));
        Ok(id)
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<AttemptRecord>, StorageError> {
        let guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut records: Vec<AttemptRecord> = guard
            .iter()
            .filter(|(_, a)| a.user_id == *user_id)
            .map(|(_, a)| a.clone())
            .collect();
        records.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        records.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(records)
    }
}

#[async_trait]
impl LocalStateRepository for InMemoryRepository {
    async fn load_state(&self) -> Result<Option<ProgressionRecord>, StorageError> {
        let guard = self
            .local_state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.clone())
    }

    async fn save_state(&self, state: &ProgressionRecord) -> Result<(), StorageError> {
        let mut guard = self
            .local_state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *guard = Some(state.clone());
        Ok(())
    }
}

//
// ─── STORAGE AGGREGATE ─────────────────────────────────────────────────────────
//

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub profiles: Arc<dyn ProfileRepository>,
    pub attempts: Arc<dyn AttemptRepository>,
    pub local_state: Arc<dyn LocalStateRepository>,
}

impl Storage {
    /// Everything in memory: tests, demos, offline play.
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let profiles: Arc<dyn ProfileRepository> = Arc::new(repo.clone());
        let attempts: Arc<dyn AttemptRepository> = Arc::new(repo.clone());
        let local_state: Arc<dyn LocalStateRepository> = Arc::new(repo);
        Self {
            profiles,
            attempts,
            local_state,
        }
    }
}
