//! crates/medassist_core/src/quota.rs
//!
//! Per-user usage accounting. Counts are derived from stored query records at call
//! time; the record inserted after a successful answer is what moves the counter.
//!
//! There is no reservation token and no lock around check-then-insert: two requests
//! from the same user that pass the check before either record is stored are both
//! admitted. Over-admission is bounded by the number of in-flight requests minus one.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

use crate::domain::{Role, UsageCounters, UserAccount};
use crate::ports::{DatabaseService, PortError, PortResult};

//=========================================================================================
// Windows and Policy
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaWindow {
    Day,
    Month,
}

impl fmt::Display for QuotaWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuotaWindow::Day => f.write_str("daily"),
            QuotaWindow::Month => f.write_str("monthly"),
        }
    }
}

impl QuotaWindow {
    /// Returns `[start, end)` of the calendar window containing `now`, where the
    /// calendar is the one observed at `offset`.
    pub fn bounds(
        &self,
        now: DateTime<Utc>,
        offset: FixedOffset,
    ) -> PortResult<(DateTime<Utc>, DateTime<Utc>)> {
        let today = now.with_timezone(&offset).date_naive();
        let (start, end) = match self {
            QuotaWindow::Day => (Some(today), today.succ_opt()),
            QuotaWindow::Month => {
                let first = NaiveDate::from_ymd_opt(today.year(), today.month(), 1);
                let next = if today.month() == 12 {
                    NaiveDate::from_ymd_opt(today.year() + 1, 1, 1)
                } else {
                    NaiveDate::from_ymd_opt(today.year(), today.month() + 1, 1)
                };
                (first, next)
            }
        };

        match (start.and_then(|d| midnight(d, offset)), end.and_then(|d| midnight(d, offset))) {
            (Some(start), Some(end)) => Ok((start, end)),
            _ => Err(PortError::Unexpected(format!(
                "cannot compute {} window for {}",
                self, now
            ))),
        }
    }
}

fn midnight(date: NaiveDate, offset: FixedOffset) -> Option<DateTime<Utc>> {
    let naive = date.and_hms_opt(0, 0, 0)?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Daily and monthly ceilings of one role. `None` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoleCeilings {
    pub daily: Option<u64>,
    pub monthly: Option<u64>,
}

impl RoleCeilings {
    pub const UNLIMITED: RoleCeilings = RoleCeilings {
        daily: None,
        monthly: None,
    };

    pub fn limited(daily: u64, monthly: u64) -> Self {
        Self {
            daily: Some(daily),
            monthly: Some(monthly),
        }
    }

    pub fn for_window(&self, window: QuotaWindow) -> Option<u64> {
        match window {
            QuotaWindow::Day => self.daily,
            QuotaWindow::Month => self.monthly,
        }
    }
}

/// The role -> ceilings table. Externally configurable; defaults to the stock plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaPolicy {
    ceilings: HashMap<Role, RoleCeilings>,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        let ceilings = HashMap::from([
            (Role::Free, RoleCeilings::limited(3, 20)),
            (Role::Test, RoleCeilings::limited(50, 500)),
            (Role::Premium, RoleCeilings::limited(100, 1000)),
            (Role::Admin, RoleCeilings::UNLIMITED),
        ]);
        Self { ceilings }
    }
}

impl QuotaPolicy {
    pub fn with_ceilings(mut self, role: Role, ceilings: RoleCeilings) -> Self {
        self.ceilings.insert(role, ceilings);
        self
    }

    /// Roles missing from the table are treated as unlimited.
    pub fn ceilings(&self, role: Role) -> RoleCeilings {
        self.ceilings
            .get(&role)
            .copied()
            .unwrap_or(RoleCeilings::UNLIMITED)
    }
}

//=========================================================================================
// Errors
//=========================================================================================

#[derive(Debug, thiserror::Error)]
pub enum QuotaError {
    #[error("You have reached your {window} limit of {ceiling} queries.")]
    Exceeded { window: QuotaWindow, ceiling: u64 },
    #[error("Usage could not be verified, please try again later.")]
    Backend(#[source] PortError),
}

//=========================================================================================
// The Ledger
//=========================================================================================

pub struct QuotaLedger {
    db: Arc<dyn DatabaseService>,
    policy: QuotaPolicy,
    offset: FixedOffset,
}

impl QuotaLedger {
    pub fn new(db: Arc<dyn DatabaseService>, policy: QuotaPolicy, offset: FixedOffset) -> Self {
        Self { db, policy, offset }
    }

    pub fn policy(&self) -> &QuotaPolicy {
        &self.policy
    }

    /// Counts the user's queries in the current day and month windows.
    pub async fn counters(&self, user_id: Uuid, now: DateTime<Utc>) -> PortResult<UsageCounters> {
        let (day_start, day_end) = QuotaWindow::Day.bounds(now, self.offset)?;
        let (month_start, month_end) = QuotaWindow::Month.bounds(now, self.offset)?;

        let daily_count = self
            .db
            .count_queries_between(user_id, day_start, day_end)
            .await?;
        let monthly_count = self
            .db
            .count_queries_between(user_id, month_start, month_end)
            .await?;

        Ok(UsageCounters {
            user_id,
            daily_count,
            monthly_count,
        })
    }

    /// Decides whether `account` may submit one more query right now.
    ///
    /// Admits nothing when either window is at its ceiling. The daily window is
    /// reported first when both are exhausted.
    pub async fn check_and_reserve(
        &self,
        account: &UserAccount,
        now: DateTime<Utc>,
    ) -> Result<UsageCounters, QuotaError> {
        let ceilings = self.policy.ceilings(account.role);
        if ceilings == RoleCeilings::UNLIMITED {
            debug!(user_id = %account.id, role = %account.role, "quota check skipped for unlimited role");
            return Ok(UsageCounters {
                user_id: account.id,
                daily_count: 0,
                monthly_count: 0,
            });
        }

        let counters = self.counters(account.id, now).await.map_err(|e| {
            error!(user_id = %account.id, "failed to count queries for quota check: {}", e);
            QuotaError::Backend(e)
        })?;

        for (window, count) in [
            (QuotaWindow::Day, counters.daily_count),
            (QuotaWindow::Month, counters.monthly_count),
        ] {
            if let Some(ceiling) = ceilings.for_window(window) {
                if count >= ceiling {
                    return Err(QuotaError::Exceeded { window, ceiling });
                }
            }
        }

        Ok(counters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{account, FakeDatabase};
    use chrono::Duration;
    use futures::executor::block_on;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn day_window_follows_the_local_calendar() {
        let offset = FixedOffset::west_opt(5 * 3600).unwrap();
        // 02:30 UTC on the 15th is still the 14th at UTC-5.
        let (start, end) = QuotaWindow::Day
            .bounds(at("2026-10-15T02:30:00Z"), offset)
            .unwrap();
        assert_eq!(start, at("2026-10-14T05:00:00Z"));
        assert_eq!(end, at("2026-10-15T05:00:00Z"));
    }

    #[test]
    fn month_window_rolls_over_the_year() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let (start, end) = QuotaWindow::Month
            .bounds(at("2026-12-31T23:59:59Z"), utc)
            .unwrap();
        assert_eq!(start, at("2026-12-01T00:00:00Z"));
        assert_eq!(end, at("2027-01-01T00:00:00Z"));
    }

    #[test]
    fn free_user_is_rejected_once_daily_ceiling_is_reached() {
        let db = Arc::new(FakeDatabase::default());
        let ledger = QuotaLedger::new(db.clone(), QuotaPolicy::default(), FixedOffset::east_opt(0).unwrap());
        let user = account(Role::Free);
        let now = at("2026-10-15T12:00:00Z");

        for n in 0..3 {
            let counters = block_on(ledger.check_and_reserve(&user, now)).unwrap();
            assert_eq!(counters.daily_count, n);
            db.insert_query_at(Some(user.id), now - Duration::minutes(1));
        }

        match block_on(ledger.check_and_reserve(&user, now)) {
            Err(QuotaError::Exceeded { window, ceiling }) => {
                assert_eq!(window, QuotaWindow::Day);
                assert_eq!(ceiling, 3);
            }
            other => panic!("expected daily quota error, got {:?}", other),
        }
    }

    #[test]
    fn yesterday_does_not_count_toward_today() {
        let db = Arc::new(FakeDatabase::default());
        let ledger = QuotaLedger::new(db.clone(), QuotaPolicy::default(), FixedOffset::east_opt(0).unwrap());
        let user = account(Role::Free);
        let now = at("2026-10-15T00:10:00Z");
        for _ in 0..3 {
            db.insert_query_at(Some(user.id), at("2026-10-14T23:50:00Z"));
        }

        let counters = block_on(ledger.check_and_reserve(&user, now)).unwrap();
        assert_eq!(counters.daily_count, 0);
        assert_eq!(counters.monthly_count, 3);
    }

    #[test]
    fn monthly_ceiling_applies_when_days_are_spread() {
        let db = Arc::new(FakeDatabase::default());
        let ledger = QuotaLedger::new(db.clone(), QuotaPolicy::default(), FixedOffset::east_opt(0).unwrap());
        let user = account(Role::Free);
        for day in 1..=10 {
            let when = at(&format!("2026-10-{:02}T09:00:00Z", day));
            db.insert_query_at(Some(user.id), when);
            db.insert_query_at(Some(user.id), when);
        }

        match block_on(ledger.check_and_reserve(&user, at("2026-10-15T12:00:00Z"))) {
            Err(QuotaError::Exceeded { window, ceiling }) => {
                assert_eq!(window, QuotaWindow::Month);
                assert_eq!(ceiling, 20);
            }
            other => panic!("expected monthly quota error, got {:?}", other),
        }
    }

    #[test]
    fn admin_is_never_limited() {
        let db = Arc::new(FakeDatabase::default());
        let ledger = QuotaLedger::new(db.clone(), QuotaPolicy::default(), FixedOffset::east_opt(0).unwrap());
        let admin = account(Role::Admin);
        let now = at("2026-10-15T12:00:00Z");
        for _ in 0..500 {
            db.insert_query_at(Some(admin.id), now);
        }
        assert!(block_on(ledger.check_and_reserve(&admin, now)).is_ok());
    }

    #[test]
    fn concurrent_checks_before_insert_are_both_admitted() {
        let db = Arc::new(FakeDatabase::default());
        let ledger = QuotaLedger::new(db.clone(), QuotaPolicy::default(), FixedOffset::east_opt(0).unwrap());
        let user = account(Role::Free);
        let now = at("2026-10-15T12:00:00Z");
        db.insert_query_at(Some(user.id), now);
        db.insert_query_at(Some(user.id), now);

        // Both checks see two records; the third and fourth get through together.
        assert!(block_on(ledger.check_and_reserve(&user, now)).is_ok());
        assert!(block_on(ledger.check_and_reserve(&user, now)).is_ok());
    }

    #[test]
    fn configured_ceilings_override_defaults() {
        let db = Arc::new(FakeDatabase::default());
        let policy = QuotaPolicy::default().with_ceilings(Role::Free, RoleCeilings::limited(1, 1));
        let ledger = QuotaLedger::new(db.clone(), policy, FixedOffset::east_opt(0).unwrap());
        let user = account(Role::Free);
        let now = at("2026-10-15T12:00:00Z");
        db.insert_query_at(Some(user.id), now);
        assert!(matches!(
            block_on(ledger.check_and_reserve(&user, now)),
            Err(QuotaError::Exceeded { window: QuotaWindow::Day, ceiling: 1 })
        ));
    }

    #[test]
    fn count_failure_is_a_backend_error() {
        let db = Arc::new(FakeDatabase::default());
        db.fail_counts();
        let ledger = QuotaLedger::new(db, QuotaPolicy::default(), FixedOffset::east_opt(0).unwrap());
        let result = block_on(ledger.check_and_reserve(&account(Role::Premium), Utc::now()));
        assert!(matches!(result, Err(QuotaError::Backend(_))));
    }
}
