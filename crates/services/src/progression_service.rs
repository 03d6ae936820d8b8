use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, warn};

use quiz_core::Clock;
use quiz_core::model::{
    DEFAULT_PROMO_SECS, ProfileId, ProgressionState, PromoGrant, Roadmap, UnitId, UnlockCosts,
    UnlockOutcome,
};
use storage::repository::{LocalStateRepository, ProfileRepository, ProgressionRecord};

use crate::auth::UserIdentity;

/// How long a dirty progression may sit in memory before it is written out.
///
/// Unlocks can come in bursts (a promo makes several units affordable at
/// once); the delay folds a burst into one write.
pub const DEFAULT_SAVE_DELAY: Duration = Duration::from_millis(500);

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Owns the live [`ProgressionState`] and keeps it persisted.
///
/// Mutations are synchronous: each one updates the in-memory aggregate
/// immediately and arms a debounced background save, so callers on render
/// paths never wait on IO. Saves go to the signed-in user's remote profile
/// when one was bootstrapped, and to the local slot otherwise — and on any
/// remote failure, so progress survives offline play.
#[derive(Clone)]
pub struct ProgressionService {
    clock: Clock,
    roadmap: Roadmap,
    costs: UnlockCosts,
    promo_duration: chrono::Duration,
    save_delay: Duration,
    profiles: Arc<dyn ProfileRepository>,
    local: Arc<dyn LocalStateRepository>,
    state: Arc<Mutex<ProgressionState>>,
    profile_id: Arc<Mutex<Option<ProfileId>>>,
    pending_save: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl ProgressionService {
    /// Creates a service with the default price table, promo window, and
    /// save delay.
    #[must_use]
    pub fn new(
        clock: Clock,
        roadmap: Roadmap,
        profiles: Arc<dyn ProfileRepository>,
        local: Arc<dyn LocalStateRepository>,
    ) -> Self {
        Self {
            clock,
            roadmap,
            costs: UnlockCosts::default(),
            promo_duration: chrono::Duration::seconds(DEFAULT_PROMO_SECS),
            save_delay: DEFAULT_SAVE_DELAY,
            profiles,
            local,
            state: Arc::new(Mutex::new(ProgressionState::new())),
            profile_id: Arc::new(Mutex::new(None)),
            pending_save: Arc::new(Mutex::new(None)),
        }
    }

    /// Overrides the carrot price table.
    #[must_use]
    pub fn with_costs(mut self, costs: UnlockCosts) -> Self {
        self.costs = costs;
        self
    }

    /// Overrides how long a started promo stays open.
    #[must_use]
    pub fn with_promo_duration(mut self, duration: chrono::Duration) -> Self {
        self.promo_duration = duration;
        self
    }

    /// Overrides the save debounce delay (usually shortened in tests).
    #[must_use]
    pub fn with_save_delay(mut self, delay: Duration) -> Self {
        self.save_delay = delay;
        self
    }

    // A poisoned lock still holds a consistent aggregate: every mutation is
    // a single call into `ProgressionState`. Recover the guard rather than
    // propagating a panic from some unrelated thread.
    fn state_guard(&self) -> MutexGuard<'_, ProgressionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn profile_guard(&self) -> MutexGuard<'_, Option<ProfileId>> {
        self.profile_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn pending_guard(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.pending_save
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // ─── Bootstrap ──────────────────────────────────────────────────────────

    /// Loads the starting state: the remote profile for a signed-in user,
    /// the local slot otherwise. Infallible — every failure is logged and
    /// degrades towards first-sight defaults, because a dead backend should
    /// never lock anyone out of playing.
    pub async fn bootstrap(&self, identity: Option<&UserIdentity>) {
        if let Some(user) = identity {
            match self
                .profiles
                .get_or_create(&user.id, user.display_name(), &user.email)
                .await
            {
                Ok(profile) => {
                    *self.profile_guard() = Some(profile.id.clone());
                    *self.state_guard() = profile.progression.into_state();
                    return;
                }
                Err(err) => {
                    warn!(error = %err, "profile bootstrap failed, falling back to local state");
                }
            }
        }
        match self.local.load_state().await {
            Ok(Some(record)) => *self.state_guard() = record.into_state(),
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, "local progression load failed, starting fresh");
            }
        }
    }

    // ─── Queries ────────────────────────────────────────────────────────────

    /// A point-in-time copy of the progression aggregate.
    #[must_use]
    pub fn snapshot(&self) -> ProgressionState {
        self.state_guard().clone()
    }

    /// The course shape this service drives.
    #[must_use]
    pub fn roadmap(&self) -> Roadmap {
        self.roadmap
    }

    /// Whether the sequential gate permits unlocking `unit` right now.
    #[must_use]
    pub fn can_unlock(&self, unit: UnitId) -> bool {
        self.state_guard().can_unlock(unit, &self.roadmap)
    }

    /// What `unit` costs right now, with any active promo applied.
    #[must_use]
    pub fn unlock_cost(&self, unit: UnitId) -> u32 {
        self.costs.cost_of(unit, &self.roadmap, self.promo_active())
    }

    /// The lowest regular week still locked, or `None` once all are open.
    #[must_use]
    pub fn next_locked_unit(&self) -> Option<UnitId> {
        self.state_guard().next_locked_unit(&self.roadmap)
    }

    /// Completed regular weeks over the roadmap total, as a whole percentage.
    #[must_use]
    pub fn percent_complete(&self) -> u8 {
        self.state_guard().percent_complete(&self.roadmap)
    }

    /// True while a started promo window is still open.
    #[must_use]
    pub fn promo_active(&self) -> bool {
        let started_at = self.state_guard().promo_started_at();
        started_at.is_some_and(|at| {
            PromoGrant::new(at)
                .with_duration(self.promo_duration)
                .is_active(self.clock.now())
        })
    }

    // ─── Mutations ──────────────────────────────────────────────────────────

    /// Attempts to unlock a unit at today's price. Only a paid unlock arms a
    /// save; rejections leave both memory and storage untouched.
    pub fn unlock(&self, unit: UnitId) -> UnlockOutcome {
        let cost = self.unlock_cost(unit);
        let outcome = self.state_guard().unlock(unit, cost, &self.roadmap);
        if let UnlockOutcome::Unlocked { .. } = outcome {
            self.schedule_save();
        }
        outcome
    }

    /// Marks a unit completed. Repeat completions are no-ops and do not
    /// touch storage.
    pub fn complete(&self, unit: UnitId) {
        {
            let mut state = self.state_guard();
            if state.is_completed(unit) {
                return;
            }
            state.complete(unit, &self.roadmap);
        }
        self.schedule_save();
    }

    /// Adds earned carrots to the balance.
    pub fn add_carrots(&self, amount: u32) {
        if amount == 0 {
            return;
        }
        self.state_guard().add_carrots(amount);
        self.schedule_save();
    }

    /// Opens a promo window at the current time. Returns `false` without
    /// restarting the window when one is already running.
    pub fn start_promo(&self) -> bool {
        if self.promo_active() {
            return false;
        }
        let now = self.clock.now();
        self.state_guard().set_promo_started_at(Some(now));
        self.schedule_save();
        true
    }

    // ─── Persistence ────────────────────────────────────────────────────────

    // Arms (or re-arms) the debounced save. Must run inside a tokio runtime,
    // which every caller in this crate does.
    fn schedule_save(&self) {
        let service = self.clone();
        let delay = self.save_delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            service.save_now().await;
        });
        if let Some(previous) = self.pending_guard().replace(handle) {
            previous.abort();
        }
    }

    /// Writes the current state out immediately, cancelling any pending
    /// debounced save. Called on sign-out and shutdown.
    pub async fn flush(&self) {
        if let Some(pending) = self.pending_guard().take() {
            pending.abort();
        }
        self.save_now().await;
    }

    async fn save_now(&self) {
        let record = ProgressionRecord::from_state(&self.state_guard());
        let profile_id = self.profile_guard().clone();
        if let Some(id) = profile_id {
            match self.profiles.update_progression(&id, &record).await {
                Ok(()) => return,
                Err(err) => {
                    warn!(error = %err, "remote progression save failed, falling back to local");
                }
            }
        }
        // Last line of persistence: past this point the change lives only
        // in memory.
        if let Err(err) = self.local.save_state(&record).await {
            error!(error = %err, "local progression save failed");
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use quiz_core::model::{STARTING_CARROTS, UserId, UserStats};
    use quiz_core::{fixed_clock, fixed_now};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use storage::repository::{InMemoryRepository, ProfileRecord, StorageError};

    fn unit(n: u32) -> UnitId {
        UnitId::new(n)
    }

    fn identity() -> UserIdentity {
        UserIdentity::new(
            UserId::new("user-1"),
            Some("Hop".to_string()),
            "hop@example.com",
        )
    }

    fn service_over(repo: &InMemoryRepository) -> ProgressionService {
        ProgressionService::new(
            fixed_clock(),
            Roadmap::default(),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        )
        .with_save_delay(Duration::from_millis(10))
    }

    /// Profile repository double: bootstrap can be made to fail, and every
    /// progression write fails.
    struct FailingProfiles {
        fail_bootstrap: bool,
    }

    #[async_trait]
    impl ProfileRepository for FailingProfiles {
        async fn get_or_create(
            &self,
            user_id: &UserId,
            username: &str,
            email: &str,
        ) -> Result<ProfileRecord, StorageError> {
            if self.fail_bootstrap {
                return Err(StorageError::Connection("remote is down".into()));
            }
            Ok(ProfileRecord {
                id: ProfileId::new("profile-1"),
                user_id: user_id.clone(),
                username: username.to_string(),
                email: email.to_string(),
                progression: ProgressionRecord::default(),
                stats: UserStats::new(),
            })
        }

        async fn find_by_user(
            &self,
            _user_id: &UserId,
        ) -> Result<Option<ProfileRecord>, StorageError> {
            Ok(None)
        }

        async fn update_progression(
            &self,
            _id: &ProfileId,
            _progression: &ProgressionRecord,
        ) -> Result<(), StorageError> {
            Err(StorageError::Connection("remote is down".into()))
        }

        async fn list_by_score(&self, _limit: u32) -> Result<Vec<ProfileRecord>, StorageError> {
            Ok(Vec::new())
        }
    }

    /// Local slot double that only counts writes.
    #[derive(Clone, Default)]
    struct CountingLocal {
        saves: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl LocalStateRepository for CountingLocal {
        async fn load_state(&self) -> Result<Option<ProgressionRecord>, StorageError> {
            Ok(None)
        }

        async fn save_state(&self, _state: &ProgressionRecord) -> Result<(), StorageError> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn counting_service(local: &CountingLocal, delay_ms: u64) -> ProgressionService {
        ProgressionService::new(
            fixed_clock(),
            Roadmap::default(),
            Arc::new(InMemoryRepository::new()),
            Arc::new(local.clone()),
        )
        .with_save_delay(Duration::from_millis(delay_ms))
    }

    #[tokio::test]
    async fn anonymous_bootstrap_restores_the_local_slot() {
        let repo = InMemoryRepository::new();
        let mut seeded = ProgressionState::new();
        seeded.unlock(unit(2), 1, &Roadmap::default());
        repo.save_state(&ProgressionRecord::from_state(&seeded))
            .await
            .unwrap();

        let service = service_over(&repo);
        service.bootstrap(None).await;

        let state = service.snapshot();
        assert!(state.is_unlocked(unit(2)));
        assert_eq!(state.carrots(), STARTING_CARROTS - 1);
    }

    #[tokio::test]
    async fn anonymous_bootstrap_without_a_slot_keeps_defaults() {
        let repo = InMemoryRepository::new();
        let service = service_over(&repo);
        service.bootstrap(None).await;

        let state = service.snapshot();
        assert_eq!(state.carrots(), STARTING_CARROTS);
        assert_eq!(state.unlocked().len(), 1);
    }

    #[tokio::test]
    async fn signed_in_bootstrap_prefers_the_remote_profile() {
        let repo = InMemoryRepository::new();
        // a stale local slot that must lose to the profile
        let mut local_state = ProgressionState::new();
        local_state.add_carrots(50);
        repo.save_state(&ProgressionRecord::from_state(&local_state))
            .await
            .unwrap();

        let service = service_over(&repo);
        service.bootstrap(Some(&identity())).await;

        assert_eq!(service.snapshot().carrots(), STARTING_CARROTS);
    }

    #[tokio::test]
    async fn failed_profile_bootstrap_degrades_to_local_state() {
        let local = InMemoryRepository::new();
        let mut seeded = ProgressionState::new();
        seeded.add_carrots(3);
        local
            .save_state(&ProgressionRecord::from_state(&seeded))
            .await
            .unwrap();

        let service = ProgressionService::new(
            fixed_clock(),
            Roadmap::default(),
            Arc::new(FailingProfiles {
                fail_bootstrap: true,
            }),
            Arc::new(local.clone()),
        )
        .with_save_delay(Duration::from_millis(10));
        service.bootstrap(Some(&identity())).await;

        assert_eq!(service.snapshot().carrots(), 15);

        // no profile id was captured, so later saves go straight to the slot
        assert!(service.unlock(unit(2)).is_unlocked());
        service.flush().await;
        assert_eq!(local.load_state().await.unwrap().unwrap().carrots, 14);
    }

    #[tokio::test]
    async fn unlock_saves_to_the_remote_profile() {
        let repo = InMemoryRepository::new();
        let service = service_over(&repo);
        service.bootstrap(Some(&identity())).await;

        assert_eq!(
            service.unlock(unit(2)),
            UnlockOutcome::Unlocked { remaining: 11 }
        );
        service.flush().await;

        let profile = repo
            .find_by_user(&UserId::new("user-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(profile.progression.carrots, 11);
        assert!(profile.progression.unlocked_units.contains(&unit(2)));
        // the remote save succeeded, so the local slot stays empty
        assert!(repo.load_state().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_remote_save_falls_back_to_the_local_slot() {
        let local = InMemoryRepository::new();
        let service = ProgressionService::new(
            fixed_clock(),
            Roadmap::default(),
            Arc::new(FailingProfiles {
                fail_bootstrap: false,
            }),
            Arc::new(local.clone()),
        )
        .with_save_delay(Duration::from_millis(10));
        service.bootstrap(Some(&identity())).await;

        assert!(service.unlock(unit(2)).is_unlocked());
        service.flush().await;

        let saved = local.load_state().await.unwrap().unwrap();
        assert_eq!(saved.carrots, 11);
        assert!(saved.unlocked_units.contains(&unit(2)));
    }

    #[tokio::test]
    async fn burst_of_mutations_coalesces_into_one_save() {
        let local = CountingLocal::default();
        let service = counting_service(&local, 20);

        service.add_carrots(1);
        service.add_carrots(1);
        assert!(service.unlock(unit(2)).is_unlocked());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(local.saves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejected_unlock_schedules_no_save() {
        let local = CountingLocal::default();
        let service = counting_service(&local, 10);

        assert_eq!(service.unlock(unit(5)), UnlockOutcome::SequenceLocked);
        assert_eq!(
            service.unlock(service.roadmap().ultimate()),
            UnlockOutcome::SequenceLocked
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(local.saves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn complete_is_saved_once_per_unit() {
        let local = CountingLocal::default();
        let service = counting_service(&local, 10);

        service.complete(unit(1));
        tokio::time::sleep(Duration::from_millis(100)).await;
        service.complete(unit(1));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(local.saves.load(Ordering::SeqCst), 1);
        assert!(service.snapshot().is_completed(unit(1)));
        assert_eq!(service.percent_complete(), 8);
    }

    #[tokio::test]
    async fn promo_waives_the_ultimate_cost_while_active() {
        let repo = InMemoryRepository::new();
        let service = service_over(&repo);
        let ultimate = service.roadmap().ultimate();

        assert_eq!(service.unlock_cost(ultimate), 5);
        assert!(service.start_promo());
        assert!(service.promo_active());
        assert_eq!(service.unlock_cost(ultimate), 0);
        assert_eq!(service.unlock_cost(unit(2)), 1);

        // a second start while the window is open is refused
        assert!(!service.start_promo());
        assert_eq!(service.snapshot().promo_started_at(), Some(fixed_now()));
    }

    #[tokio::test]
    async fn expired_promo_charges_full_price_and_may_restart() {
        let repo = InMemoryRepository::new();
        let service = service_over(&repo).with_promo_duration(chrono::Duration::zero());
        let ultimate = service.roadmap().ultimate();

        assert!(service.start_promo());
        assert!(!service.promo_active());
        assert_eq!(service.unlock_cost(ultimate), 5);
        assert!(service.start_promo());
    }

    #[tokio::test]
    async fn next_locked_unit_tracks_unlocks() {
        let repo = InMemoryRepository::new();
        let service = service_over(&repo);

        assert_eq!(service.next_locked_unit(), Some(unit(2)));
        assert!(service.can_unlock(unit(2)));
        assert!(service.unlock(unit(2)).is_unlocked());
        assert_eq!(service.next_locked_unit(), Some(unit(3)));
    }
}
