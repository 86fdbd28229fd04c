// ── Runtime console configuration ──
//
// Describes how the console classifies quotas, locks out guessing
// guests and issues vouchers. Never touches disk: the CLI builds a
// `ConsoleConfig` (usually from `captivenet-config`) and hands it in.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::{Plan, PlanId, Thresholds};

/// Voucher redemption lockout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutPolicy {
    /// Consecutive failures before the client is blocked.
    pub max_attempts: u32,
    /// Block length in seconds.
    pub cooldown_secs: u64,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            cooldown_secs: 300,
        }
    }
}

impl LockoutPolicy {
    pub fn cooldown(&self) -> TimeDelta {
        i64::try_from(self.cooldown_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX)
    }
}

/// Defaults applied when a generate request leaves fields out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherDefaults {
    pub max_uses: u32,
    pub validity_days: u32,
}

impl Default for VoucherDefaults {
    fn default() -> Self {
        Self {
            max_uses: 1,
            validity_days: 7,
        }
    }
}

impl VoucherDefaults {
    pub fn validity(&self) -> TimeDelta {
        TimeDelta::try_days(i64::from(self.validity_days)).unwrap_or(TimeDelta::MAX)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleConfig {
    pub thresholds: Thresholds,
    pub lockout: LockoutPolicy,
    /// How often the directory sweeps for expired sessions (seconds). 0 = never.
    pub refresh_interval_secs: u64,
    pub vouchers: VoucherDefaults,
    pub plans: Vec<Plan>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            lockout: LockoutPolicy::default(),
            refresh_interval_secs: 30,
            vouchers: VoucherDefaults::default(),
            plans: Plan::default_catalog(),
        }
    }
}

impl ConsoleConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        self.thresholds.validate()?;
        if self.lockout.max_attempts == 0 {
            return Err(CoreError::Config {
                message: "lockout max_attempts must be at least 1".into(),
            });
        }
        if self.vouchers.max_uses == 0 {
            return Err(CoreError::Config {
                message: "voucher max_uses must be at least 1".into(),
            });
        }
        if let Some(dup) = self
            .plans
            .iter()
            .enumerate()
            .find(|(i, p)| self.plans[..*i].iter().any(|q| q.id == p.id))
        {
            return Err(CoreError::Config {
                message: format!("duplicate plan id {}", dup.1.id),
            });
        }
        Ok(())
    }

    pub fn plan(&self, id: PlanId) -> Result<&Plan, CoreError> {
        self.plans
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| CoreError::not_found("plan", id))
    }
}
