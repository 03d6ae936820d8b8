use chrono::{DateTime, Duration, Utc};

use crate::model::ids::UnitId;
use crate::model::progression::Roadmap;

/// How long a promo window stays open by default: five hours.
pub const DEFAULT_PROMO_SECS: i64 = 5 * 60 * 60;

//
// ─── PROMO GRANT ───────────────────────────────────────────────────────────────
//

/// A time-boxed promotion that makes the ultimate unit free to unlock.
///
/// Expiry is lazy: nothing is scheduled and nothing mutates. Whether the
/// window is open is derived from the stored start time whenever a cost is
/// computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromoGrant {
    started_at: DateTime<Utc>,
    duration: Duration,
}

impl PromoGrant {
    /// A grant starting at `started_at` with the default five-hour window.
    #[must_use]
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            duration: Duration::seconds(DEFAULT_PROMO_SECS),
        }
    }

    /// Overrides the window length.
    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// When the window opened.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// When the window closes.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.started_at + self.duration
    }

    /// True while `now` is strictly inside the window. At exactly the
    /// duration mark the grant is expired.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now >= self.started_at && now - self.started_at < self.duration
    }
}

//
// ─── UNLOCK COSTS ──────────────────────────────────────────────────────────────
//

/// Carrot prices for opening units.
///
/// Regular weeks share one price; the ultimate unit has its own, waived
/// entirely while a promo window is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnlockCosts {
    regular: u32,
    ultimate: u32,
}

impl UnlockCosts {
    /// Creates a price table.
    #[must_use]
    pub fn new(regular: u32, ultimate: u32) -> Self {
        Self { regular, ultimate }
    }

    /// Price of a regular week.
    #[must_use]
    pub fn regular(&self) -> u32 {
        self.regular
    }

    /// Full price of the ultimate unit.
    #[must_use]
    pub fn ultimate(&self) -> u32 {
        self.ultimate
    }

    /// Price of unlocking `unit` right now. Regular weeks never discount;
    /// the ultimate unit costs nothing while a promo is active.
    #[must_use]
    pub fn cost_of(&self, unit: UnitId, roadmap: &Roadmap, promo_active: bool) -> u32 {
        if roadmap.is_ultimate(unit) {
            if promo_active { 0 } else { self.ultimate }
        } else {
            self.regular
        }
    }
}

impl Default for UnlockCosts {
    /// One carrot per week, five for the ultimate unit.
    fn default() -> Self {
        Self {
            regular: 1,
            ultimate: 5,
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn promo_active_inside_window() {
        let start = fixed_now();
        let grant = PromoGrant::new(start);
        assert!(grant.is_active(start));
        assert!(grant.is_active(start + Duration::hours(4) + Duration::minutes(59)));
    }

    #[test]
    fn promo_expired_at_and_after_boundary() {
        let start = fixed_now();
        let grant = PromoGrant::new(start);
        assert!(!grant.is_active(start + Duration::hours(5)));
        assert!(!grant.is_active(start + Duration::hours(5) + Duration::minutes(1)));
    }

    #[test]
    fn promo_not_active_before_start() {
        let start = fixed_now();
        let grant = PromoGrant::new(start);
        assert!(!grant.is_active(start - Duration::seconds(1)));
    }

    #[test]
    fn promo_custom_duration() {
        let start = fixed_now();
        let grant = PromoGrant::new(start).with_duration(Duration::minutes(30));
        assert!(grant.is_active(start + Duration::minutes(29)));
        assert!(!grant.is_active(start + Duration::minutes(30)));
        assert_eq!(grant.expires_at(), start + Duration::minutes(30));
    }

    #[test]
    fn ultimate_is_free_under_promo() {
        let costs = UnlockCosts::default();
        let roadmap = Roadmap::default();
        let ultimate = roadmap.ultimate();

        assert_eq!(costs.cost_of(ultimate, &roadmap, false), 5);
        assert_eq!(costs.cost_of(ultimate, &roadmap, true), 0);
    }

    #[test]
    fn regular_weeks_ignore_promo() {
        let costs = UnlockCosts::default();
        let roadmap = Roadmap::default();

        assert_eq!(costs.cost_of(UnitId::new(3), &roadmap, false), 1);
        assert_eq!(costs.cost_of(UnitId::new(3), &roadmap, true), 1);
    }

    #[test]
    fn custom_price_table() {
        let costs = UnlockCosts::new(2, 8);
        let roadmap = Roadmap::default();
        assert_eq!(costs.cost_of(UnitId::new(5), &roadmap, true), 2);
        assert_eq!(costs.cost_of(roadmap.ultimate(), &roadmap, false), 8);
    }
}
