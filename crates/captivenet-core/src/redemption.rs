// ── Voucher redemption lockout ──
//
// Counts consecutive failed redemptions per client (device MAC). After
// `max_attempts` failures the client is blocked for the cooldown; the
// block lifts by itself and is evaluated lazily on the next access.

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use tracing::{info, warn};

use crate::config::LockoutPolicy;
use crate::error::CoreError;
use crate::model::MacAddress;

#[derive(Debug, Clone, Copy, Default)]
struct Attempts {
    failures: u32,
    blocked_at: Option<DateTime<Utc>>,
}

/// Per-client attempt counter with a timed block.
#[derive(Debug)]
pub struct RedemptionGuard {
    policy: LockoutPolicy,
    clients: DashMap<MacAddress, Attempts>,
}

impl RedemptionGuard {
    pub fn new(policy: LockoutPolicy) -> Self {
        Self {
            policy,
            clients: DashMap::new(),
        }
    }

    pub fn policy(&self) -> &LockoutPolicy {
        &self.policy
    }

    /// Fail with `RedemptionLocked` while the client is blocked. A locked
    /// attempt does not count as another failure.
    pub fn check(&self, client: &MacAddress, now: DateTime<Utc>) -> Result<(), CoreError> {
        match self.remaining_block(client, now) {
            Some(left) => Err(CoreError::RedemptionLocked {
                remaining_secs: ceil_secs(left),
            }),
            None => Ok(()),
        }
    }

    /// Time left on the client's block, if any. Clears an elapsed block.
    pub fn remaining_block(&self, client: &MacAddress, now: DateTime<Utc>) -> Option<TimeDelta> {
        let mut entry = self.clients.get_mut(client)?;
        let blocked_at = entry.blocked_at?;
        let until = blocked_at + self.policy.cooldown();
        if now < until {
            Some(until - now)
        } else {
            *entry = Attempts::default();
            drop(entry);
            info!(client = %client, "redemption block lifted");
            None
        }
    }

    /// Attempts left before a block. Zero while blocked.
    pub fn attempts_remaining(&self, client: &MacAddress, now: DateTime<Utc>) -> u32 {
        if self.remaining_block(client, now).is_some() {
            return 0;
        }
        let failures = self.clients.get(client).map_or(0, |a| a.failures);
        self.policy.max_attempts.saturating_sub(failures)
    }

    /// Count one failed attempt; returns the attempts still available.
    pub fn record_failure(&self, client: &MacAddress, now: DateTime<Utc>) -> u32 {
        if self.remaining_block(client, now).is_some() {
            return 0;
        }
        let mut entry = self.clients.entry(client.clone()).or_default();
        entry.failures = entry.failures.saturating_add(1);
        if entry.failures >= self.policy.max_attempts {
            entry.blocked_at = Some(now);
            warn!(
                client = %client,
                failures = entry.failures,
                cooldown_secs = self.policy.cooldown_secs,
                "redemption blocked after repeated failures"
            );
        }
        self.policy.max_attempts.saturating_sub(entry.failures)
    }

    pub fn record_success(&self, client: &MacAddress) {
        self.clients.remove(client);
    }
}

/// Whole seconds, rounded up so a countdown never shows 0 while blocked.
fn ceil_secs(delta: TimeDelta) -> i64 {
    let ms = delta.num_milliseconds();
    (ms + 999).div_euclid(1000)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap()
    }

    fn mac() -> MacAddress {
        MacAddress::new("aa:bb:cc:dd:ee:ff")
    }

    fn guard() -> RedemptionGuard {
        RedemptionGuard::new(LockoutPolicy::default())
    }

    #[test]
    fn fifth_failure_blocks_and_sixth_attempt_is_locked() {
        let g = guard();
        for expected_left in (0..5).rev() {
            g.check(&mac(), t0()).unwrap();
            assert_eq!(g.record_failure(&mac(), t0()), expected_left);
        }
        let err = g.check(&mac(), t0() + TimeDelta::seconds(10)).unwrap_err();
        assert_eq!(err, CoreError::RedemptionLocked { remaining_secs: 290 });
        // Locked attempts don't count further.
        assert_eq!(g.record_failure(&mac(), t0() + TimeDelta::seconds(20)), 0);
        let err = g.check(&mac(), t0() + TimeDelta::seconds(10)).unwrap_err();
        assert_eq!(err, CoreError::RedemptionLocked { remaining_secs: 290 });
    }

    #[test]
    fn block_lifts_exactly_at_cooldown() {
        let g = guard();
        for _ in 0..5 {
            g.record_failure(&mac(), t0());
        }
        let edge = t0() + TimeDelta::seconds(300);
        assert!(g.check(&mac(), edge - TimeDelta::milliseconds(1)).is_err());
        assert_eq!(
            g.remaining_block(&mac(), edge - TimeDelta::milliseconds(1)),
            Some(TimeDelta::milliseconds(1))
        );
        assert!(g.check(&mac(), edge).is_ok());
        assert_eq!(g.attempts_remaining(&mac(), edge), 5);
    }

    #[test]
    fn remaining_secs_rounds_up() {
        let g = guard();
        for _ in 0..5 {
            g.record_failure(&mac(), t0());
        }
        let err = g
            .check(&mac(), t0() + TimeDelta::milliseconds(299_500))
            .unwrap_err();
        assert_eq!(err, CoreError::RedemptionLocked { remaining_secs: 1 });
    }

    #[test]
    fn success_resets_counter() {
        let g = guard();
        g.record_failure(&mac(), t0());
        g.record_failure(&mac(), t0());
        assert_eq!(g.attempts_remaining(&mac(), t0()), 3);
        g.record_success(&mac());
        assert_eq!(g.attempts_remaining(&mac(), t0()), 5);
    }

    #[test]
    fn clients_are_tracked_separately() {
        let g = guard();
        for _ in 0..5 {
            g.record_failure(&mac(), t0());
        }
        let other = MacAddress::new("11:22:33:44:55:66");
        assert!(g.check(&other, t0()).is_ok());
        assert_eq!(g.attempts_remaining(&mac(), t0()), 0);
    }
}
