// ── Typed request structs for Command payloads ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{AccountId, DeviceRef, PlanId, SessionId};

// ── Usage ──────────────────────────────────────────────────────────

/// One accounting tick reported by the gateway.
///
/// Wire form is camelCase (`sessionId`, `dataDeltaBytes`,
/// `timeDeltaSeconds`, `timestamp`); snake_case is accepted too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageEvent {
    #[serde(alias = "session_id")]
    pub session_id: SessionId,
    #[serde(alias = "data_delta_bytes")]
    pub data_delta_bytes: i64,
    #[serde(alias = "time_delta_seconds")]
    pub time_delta_seconds: i64,
    pub timestamp: DateTime<Utc>,
}

// ── Vouchers ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateVouchersRequest {
    pub plan_id: PlanId,
    pub quantity: u32,
    /// Defaults to the configured voucher `max_uses`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_uses: Option<u32>,
    /// Defaults to the time of generation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<DateTime<Utc>>,
    /// Defaults to `valid_from` plus the configured validity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<AccountId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedeemVoucherRequest {
    pub code: String,
    pub device: DeviceRef,
}

// ── Sessions ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSessionRequest {
    pub account_id: AccountId,
    pub device: DeviceRef,
    pub plan_id: PlanId,
}
