// ── Hotspot voucher domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::ids::{AccountId, PlanId, VoucherCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum VoucherStatus {
    Active,
    Used,
    Expired,
    Revoked,
}

/// Access code granting guest sessions under a plan.
///
/// Single use by default; `max_uses > 1` lets the same code open several
/// sessions until `used_count` reaches the cap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voucher {
    pub code: VoucherCode,
    pub plan_id: PlanId,
    #[serde(default = "default_max_uses")]
    pub max_uses: u32,
    #[serde(default)]
    pub used_count: u32,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    #[serde(default = "default_status")]
    pub status: VoucherStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<AccountId>,
}

fn default_max_uses() -> u32 {
    1
}

fn default_status() -> VoucherStatus {
    VoucherStatus::Active
}

impl Voucher {
    pub fn uses_remaining(&self) -> u32 {
        self.max_uses.saturating_sub(self.used_count)
    }

    pub fn is_exhausted(&self) -> bool {
        self.used_count >= self.max_uses
    }

    /// Display status at `now`: an active voucher past its window shows as expired.
    pub fn status_at(&self, now: DateTime<Utc>) -> VoucherStatus {
        match self.status {
            VoucherStatus::Active if now > self.valid_until => VoucherStatus::Expired,
            other => other,
        }
    }
}
