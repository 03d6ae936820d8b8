use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::model::ids::UnitId;

/// Carrot balance granted to a brand-new profile.
pub const STARTING_CARROTS: u32 = 12;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressionError {
    #[error("roadmap must contain at least one week")]
    EmptyRoadmap,
}

//
// ─── ROADMAP ───────────────────────────────────────────────────────────────────
//

/// The course shape: how many regular weekly units exist.
///
/// The ultimate unit's id is always one past the final week, so it is derived
/// here and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roadmap {
    weeks: u32,
}

impl Roadmap {
    /// Number of regular weeks in the shipped course.
    pub const DEFAULT_WEEKS: u32 = 12;

    /// Creates a roadmap with the given number of regular weeks.
    ///
    /// # Errors
    ///
    /// Returns `ProgressionError::EmptyRoadmap` when `weeks` is zero.
    pub fn new(weeks: u32) -> Result<Self, ProgressionError> {
        if weeks == 0 {
            return Err(ProgressionError::EmptyRoadmap);
        }
        Ok(Self { weeks })
    }

    /// Number of regular weeks.
    #[must_use]
    pub fn weeks(&self) -> u32 {
        self.weeks
    }

    /// The last regular week.
    #[must_use]
    pub fn final_week(&self) -> UnitId {
        UnitId::new(self.weeks)
    }

    /// The reserved ultimate unit, one past the final week.
    #[must_use]
    pub fn ultimate(&self) -> UnitId {
        UnitId::new(self.weeks + 1)
    }

    /// True for week ids 1 through the final week.
    #[must_use]
    pub fn is_regular(&self, unit: UnitId) -> bool {
        unit.value() >= 1 && unit.value() <= self.weeks
    }

    /// True only for the ultimate unit.
    #[must_use]
    pub fn is_ultimate(&self, unit: UnitId) -> bool {
        unit == self.ultimate()
    }

    /// True for any unit the course contains, regular or ultimate.
    #[must_use]
    pub fn contains(&self, unit: UnitId) -> bool {
        self.is_regular(unit) || self.is_ultimate(unit)
    }

    /// The regular weeks in ascending order.
    pub fn regular_units(&self) -> impl Iterator<Item = UnitId> + use<> {
        (1..=self.weeks).map(UnitId::new)
    }
}

impl Default for Roadmap {
    fn default() -> Self {
        Self {
            weeks: Self::DEFAULT_WEEKS,
        }
    }
}

//
// ─── UNLOCK OUTCOME ────────────────────────────────────────────────────────────
//

/// What happened when a unit unlock was attempted.
///
/// Rejections are ordinary values, not errors: the caller renders them
/// (`"Not enough carrots!"`) and the state is guaranteed untouched.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockOutcome {
    /// The unit was locked and is now unlocked; `remaining` is the balance
    /// after paying the cost.
    Unlocked { remaining: u32 },
    /// The unit was already unlocked. Nothing changed, no cost was paid.
    AlreadyUnlocked,
    /// The sequential gate failed: the predecessor is still locked, the
    /// ultimate unit is not ready, or the unit is outside the roadmap.
    SequenceLocked,
    /// The balance cannot cover the cost. Nothing changed.
    InsufficientCarrots { required: u32, available: u32 },
}

impl UnlockOutcome {
    /// True when the unit is unlocked after the call, whether or not this
    /// attempt paid for it.
    #[must_use]
    pub fn is_unlocked(&self) -> bool {
        matches!(self, Self::Unlocked { .. } | Self::AlreadyUnlocked)
    }
}

//
// ─── PROGRESSION STATE ─────────────────────────────────────────────────────────
//

/// Per-user gamification state: the carrot ledger, which units are unlocked
/// and completed, the visual cursor, and the promo start time.
///
/// Unlocked and completed only ever grow, and the balance never goes
/// negative; every mutation below preserves that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressionState {
    carrots: u32,
    unlocked: BTreeSet<UnitId>,
    completed: BTreeSet<UnitId>,
    active_unit: UnitId,
    promo_started_at: Option<DateTime<Utc>>,
}

impl ProgressionState {
    /// First-sight defaults: 12 carrots, week 1 unlocked, nothing completed.
    #[must_use]
    pub fn new() -> Self {
        let first = UnitId::new(1);
        Self {
            carrots: STARTING_CARROTS,
            unlocked: BTreeSet::from([first]),
            completed: BTreeSet::new(),
            active_unit: first,
            promo_started_at: None,
        }
    }

    /// Rehydrates state from storage.
    ///
    /// An empty unlocked set normalises to `{1}` (week 1 is free), and a
    /// missing active unit derives as the highest unlocked week.
    #[must_use]
    pub fn from_persisted(
        carrots: u32,
        unlocked: BTreeSet<UnitId>,
        completed: BTreeSet<UnitId>,
        active_unit: Option<UnitId>,
        promo_started_at: Option<DateTime<Utc>>,
    ) -> Self {
        let mut unlocked = unlocked;
        if unlocked.is_empty() {
            unlocked.insert(UnitId::new(1));
        }
        let highest = unlocked
            .iter()
            .next_back()
            .copied()
            .unwrap_or_else(|| UnitId::new(1));
        Self {
            carrots,
            unlocked,
            completed,
            active_unit: active_unit.unwrap_or(highest),
            promo_started_at,
        }
    }

    // ─── Queries ────────────────────────────────────────────────────────────

    /// Current carrot balance.
    #[must_use]
    pub fn carrots(&self) -> u32 {
        self.carrots
    }

    /// Units the user has paid to open (week 1 included from the start).
    #[must_use]
    pub fn unlocked(&self) -> &BTreeSet<UnitId> {
        &self.unlocked
    }

    /// Units the user has finished at least once.
    #[must_use]
    pub fn completed(&self) -> &BTreeSet<UnitId> {
        &self.completed
    }

    /// The visual cursor: where the roadmap scrolls to. May point at a
    /// locked unit right after a completion.
    #[must_use]
    pub fn active_unit(&self) -> UnitId {
        self.active_unit
    }

    /// When the current promo window was started, if one was ever granted.
    #[must_use]
    pub fn promo_started_at(&self) -> Option<DateTime<Utc>> {
        self.promo_started_at
    }

    /// True when the unit is unlocked.
    #[must_use]
    pub fn is_unlocked(&self, unit: UnitId) -> bool {
        self.unlocked.contains(&unit)
    }

    /// True when the unit has been completed.
    #[must_use]
    pub fn is_completed(&self, unit: UnitId) -> bool {
        self.completed.contains(&unit)
    }

    /// Whether the sequential gate permits unlocking `unit` right now:
    /// week 1 always, week k when week k-1 is unlocked, and the ultimate
    /// unit once every regular week is unlocked. Units outside the roadmap
    /// are never unlockable.
    #[must_use]
    pub fn can_unlock(&self, unit: UnitId, roadmap: &Roadmap) -> bool {
        if roadmap.is_ultimate(unit) {
            return roadmap.regular_units().all(|week| self.is_unlocked(week));
        }
        if !roadmap.is_regular(unit) {
            return false;
        }
        match unit.predecessor() {
            None => true,
            Some(previous) => self.is_unlocked(previous),
        }
    }

    /// Attempts to unlock a unit for `cost` carrots.
    ///
    /// Already-unlocked units succeed as a no-op without paying. A failed
    /// gate or an uncoverable cost leaves the state untouched; the balance
    /// can never go negative.
    pub fn unlock(&mut self, unit: UnitId, cost: u32, roadmap: &Roadmap) -> UnlockOutcome {
        if self.is_unlocked(unit) {
            return UnlockOutcome::AlreadyUnlocked;
        }
        if !self.can_unlock(unit, roadmap) {
            return UnlockOutcome::SequenceLocked;
        }
        if self.carrots < cost {
            return UnlockOutcome::InsufficientCarrots {
                required: cost,
                available: self.carrots,
            };
        }
        self.carrots -= cost;
        self.unlocked.insert(unit);
        self.active_unit = unit;
        UnlockOutcome::Unlocked {
            remaining: self.carrots,
        }
    }

    /// Marks a unit completed. Idempotent: repeat completions change
    /// nothing, including the cursor. The first completion of a regular
    /// week before the final one advances the cursor to the next week,
    /// which may still be locked.
    pub fn complete(&mut self, unit: UnitId, roadmap: &Roadmap) {
        if !self.completed.insert(unit) {
            return;
        }
        if roadmap.is_regular(unit) && unit < roadmap.final_week() {
            self.active_unit = UnitId::new(unit.value() + 1);
        }
    }

    /// The lowest-numbered regular week that is still locked, or `None`
    /// when the whole roadmap is open.
    #[must_use]
    pub fn next_locked_unit(&self, roadmap: &Roadmap) -> Option<UnitId> {
        roadmap
            .regular_units()
            .find(|week| !self.is_unlocked(*week))
    }

    /// Adds earned carrots to the balance.
    pub fn add_carrots(&mut self, amount: u32) {
        self.carrots = self.carrots.saturating_add(amount);
    }

    /// Completed regular weeks over the roadmap total, rounded to a whole
    /// percentage. The ultimate unit does not count toward course progress.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn percent_complete(&self, roadmap: &Roadmap) -> u8 {
        let done = self
            .completed
            .iter()
            .filter(|unit| roadmap.is_regular(**unit))
            .count();
        ((done as f64 / f64::from(roadmap.weeks())) * 100.0).round() as u8
    }

    /// Records when a promo window started. Policy around restarting lives
    /// with the caller, which knows the configured promo duration.
    pub fn set_promo_started_at(&mut self, started_at: Option<DateTime<Utc>>) {
        self.promo_started_at = started_at;
    }
}

impl Default for ProgressionState {
    fn default() -> Self {
        Self::new()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
