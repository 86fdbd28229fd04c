// ── Billing plans ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::ids::PlanId;

pub const GIB: u64 = 1_073_741_824;
pub const HOUR_SECS: u64 = 3_600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum PlanType {
    Monthly,
    Weekly,
    Temporary,
}

/// Quota template that vouchers and subscriber sessions are issued under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub id: PlanId,
    pub code: String,
    pub name: String,
    pub plan_type: PlanType,
    pub data_quota_bytes: u64,
    pub time_quota_secs: u64,
    #[serde(default = "default_max_devices")]
    pub max_devices: u32,
    #[serde(default)]
    pub price_cents: u64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_max_devices() -> u32 {
    1
}

fn default_currency() -> String {
    "EUR".into()
}

impl Plan {
    /// The stock catalog: two guest passes and a monthly subscription.
    pub fn default_catalog() -> Vec<Self> {
        vec![
            Self {
                id: PlanId(1),
                code: "GUEST_1H".into(),
                name: "Guest 1H".into(),
                plan_type: PlanType::Temporary,
                data_quota_bytes: GIB,
                time_quota_secs: HOUR_SECS,
                max_devices: 1,
                price_cents: 0,
                currency: default_currency(),
            },
            Self {
                id: PlanId(2),
                code: "GUEST_1D".into(),
                name: "Guest 1 Day".into(),
                plan_type: PlanType::Temporary,
                data_quota_bytes: 5 * GIB,
                time_quota_secs: 24 * HOUR_SECS,
                max_devices: 1,
                price_cents: 299,
                currency: default_currency(),
            },
            Self {
                id: PlanId(3),
                code: "MONTHLY_STD".into(),
                name: "Monthly Standard".into(),
                plan_type: PlanType::Monthly,
                data_quota_bytes: 100 * GIB,
                time_quota_secs: 720 * HOUR_SECS,
                max_devices: 5,
                price_cents: 2_999,
                currency: default_currency(),
            },
        ]
    }
}
