// ── Session lifecycle ──
//
// One live access grant: two quota ledgers plus timing, and the state
// machine ACTIVE → WARNING → CRITICAL → (EXPIRED | TERMINATED).
// Terminal states are latched and never left.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use strum::{Display, EnumIter, EnumString};
use tracing::debug;

use super::ids::{AccountId, MacAddress, PlanId, SessionId, VoucherCode};
use super::quota::{Dimension, Quota, QuotaStatus, Thresholds};
use crate::error::CoreError;

/// Overall session status.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum SessionStatus {
    Active,
    Warning,
    Critical,
    Expired,
    Terminated,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Expired | Self::Terminated)
    }

    pub fn is_alive(self) -> bool {
        !self.is_terminal()
    }

    fn from_severity(severity: QuotaStatus) -> Self {
        match severity {
            QuotaStatus::Normal => Self::Active,
            QuotaStatus::Warning => Self::Warning,
            QuotaStatus::Critical => Self::Critical,
            QuotaStatus::Exceeded => Self::Expired,
        }
    }
}

/// How the session was authenticated.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SessionKind {
    /// Guest access granted by redeeming a voucher code.
    Voucher,
    /// Subscriber or operator signed in with an account.
    Credentialed,
}

/// Who the session belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SessionOwner {
    Account { id: AccountId, username: String },
    Voucher { code: VoucherCode },
}

impl SessionOwner {
    pub fn kind(&self) -> SessionKind {
        match self {
            Self::Account { .. } => SessionKind::Credentialed,
            Self::Voucher { .. } => SessionKind::Voucher,
        }
    }

    /// Human label used by search and tables.
    pub fn label(&self) -> String {
        match self {
            Self::Account { username, .. } => username.clone(),
            Self::Voucher { code } => format!("guest:{code}"),
        }
    }
}

/// The device holding the session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceRef {
    pub name: String,
    pub mac: MacAddress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<IpAddr>,
}

/// How a terminal state was reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Closure {
    pub status: SessionStatus,
    pub at: DateTime<Utc>,
    pub reason: String,
}

/// Result of a terminate request. Terminating a closed session is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "status", rename_all = "snake_case")]
pub enum TerminateOutcome {
    Terminated,
    AlreadyClosed(SessionStatus),
}

/// One authenticated or voucher-based network access grant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub owner: SessionOwner,
    pub device: DeviceRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<PlanId>,

    data: Quota,
    time: Quota,

    start_time: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    expires_at: DateTime<Utc>,

    status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    closure: Option<Closure>,

    #[serde(default)]
    voucher_exhausted: bool,

    #[serde(default)]
    thresholds: Thresholds,
}

impl Session {
    /// Open a session at `start_time`; `expires_at = start_time + time_total`.
    pub fn open(
        id: SessionId,
        owner: SessionOwner,
        device: DeviceRef,
        data_total: u64,
        time_total_secs: u64,
        start_time: DateTime<Utc>,
        thresholds: Thresholds,
    ) -> Self {
        let mut session = Self {
            id,
            owner,
            device,
            plan_id: None,
            data: Quota::new(data_total),
            time: Quota::new(time_total_secs),
            start_time,
            last_activity: start_time,
            expires_at: offset(start_time, time_total_secs),
            status: SessionStatus::Active,
            closure: None,
            voucher_exhausted: false,
            thresholds,
        };
        session.recompute(start_time);
        session
    }

    /// Tag the session with the plan it was issued under.
    pub fn with_plan(mut self, plan_id: PlanId) -> Self {
        self.plan_id = Some(plan_id);
        self
    }

    /// Mark that this redemption consumed the voucher's last use.
    /// Only meaningful at creation; there is no setter afterwards.
    pub fn with_voucher_exhausted(mut self, exhausted: bool) -> Self {
        self.voucher_exhausted = exhausted;
        self
    }

    /// Seed prior consumption (fixtures, gateway resync) before the first tick.
    pub fn with_usage(
        mut self,
        data_used: u64,
        time_used: u64,
        last_activity: DateTime<Utc>,
    ) -> Self {
        self.data = Quota::with_usage(data_used, self.data.total());
        self.time = Quota::with_usage(time_used, self.time.total());
        self.last_activity = last_activity.max(self.start_time);
        self.recompute(self.last_activity);
        self
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn kind(&self) -> SessionKind {
        self.owner.kind()
    }

    pub fn data(&self) -> &Quota {
        &self.data
    }

    pub fn time(&self) -> &Quota {
        &self.time
    }

    pub fn quota(&self, dimension: Dimension) -> &Quota {
        match dimension {
            Dimension::Data => &self.data,
            Dimension::Time => &self.time,
        }
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Status as of the last mutation or observation.
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn closure(&self) -> Option<&Closure> {
        self.closure.as_ref()
    }

    pub fn voucher_exhausted(&self) -> bool {
        self.voucher_exhausted
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn is_alive(&self) -> bool {
        self.closure.is_none()
    }

    /// Most severe quota status across both dimensions.
    pub fn severity(&self) -> QuotaStatus {
        self.data
            .status(&self.thresholds)
            .max(self.time.status(&self.thresholds))
    }

    /// Status this session would report at `now`, without mutating it.
    pub fn status_at(&self, now: DateTime<Utc>) -> SessionStatus {
        if let Some(ref closure) = self.closure {
            return closure.status;
        }
        if self.expiry_reason(now).is_some() {
            return SessionStatus::Expired;
        }
        SessionStatus::from_severity(self.severity())
    }

    /// Countdown value: `max(0, expires_at - now)`. Always computed from the
    /// absolute expiry, so a paused or jumping clock never accumulates drift.
    pub fn remaining_time(&self, now: DateTime<Utc>) -> TimeDelta {
        (self.expires_at - now).max(TimeDelta::zero())
    }

    // ── Transitions ──────────────────────────────────────────────────

    /// Apply one accounting tick from the gateway.
    ///
    /// Both deltas are validated before either ledger changes, so a rejected
    /// tick leaves the ledgers untouched. `now` must be strictly after the
    /// last applied tick. A tick at or past the deadline finds the session
    /// closed and records nothing.
    pub fn tick(
        &mut self,
        data_delta: i64,
        time_delta: i64,
        now: DateTime<Utc>,
    ) -> Result<SessionStatus, CoreError> {
        self.recompute(now);
        self.ensure_alive()?;
        if now <= self.last_activity {
            return Err(CoreError::OutOfOrderTick {
                id: self.id,
                received: now,
                last_applied: self.last_activity,
            });
        }

        let mut data = self.data;
        let mut time = self.time;
        data.record(data_delta)?;
        time.record(time_delta)?;

        self.data = data;
        self.time = time;
        self.last_activity = now;
        Ok(self.recompute(now))
    }

    /// Re-evaluate expiry at `now` without recording usage. This is what
    /// the directory's periodic refresh calls.
    pub fn observe(&mut self, now: DateTime<Utc>) -> SessionStatus {
        self.recompute(now)
    }

    /// Administrative termination. Idempotent: a closed session reports
    /// its existing terminal state and is left as is, so an expired session
    /// stays expired.
    pub fn terminate(&mut self, reason: impl Into<String>, now: DateTime<Utc>) -> TerminateOutcome {
        if let SessionStatus::Expired | SessionStatus::Terminated = self.recompute(now) {
            return TerminateOutcome::AlreadyClosed(self.status);
        }
        self.close(SessionStatus::Terminated, now, reason.into());
        TerminateOutcome::Terminated
    }

    /// Raise one quota's cap. Extending time also pushes `expires_at` out by
    /// the same number of seconds. Closed sessions cannot be revived.
    pub fn extend_quota(
        &mut self,
        dimension: Dimension,
        amount: i64,
        now: DateTime<Utc>,
    ) -> Result<SessionStatus, CoreError> {
        self.recompute(now);
        self.ensure_alive()?;

        match dimension {
            Dimension::Data => self.data.extend(amount)?,
            Dimension::Time => {
                self.time.extend(amount)?;
                let secs = u64::try_from(amount).unwrap_or_default();
                self.expires_at = offset(self.expires_at, secs);
            }
        }
        Ok(self.recompute(now))
    }

    /// Administrative cut-off: move `expires_at` earlier. Never later.
    pub fn shorten_expiry(
        &mut self,
        until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<SessionStatus, CoreError> {
        self.recompute(now);
        self.ensure_alive()?;
        if until >= self.expires_at {
            return Err(CoreError::ValidationFailed {
                message: format!(
                    "new expiry {until} is not earlier than current expiry {}",
                    self.expires_at
                ),
            });
        }
        self.expires_at = until.max(self.start_time);
        Ok(self.recompute(now))
    }

    // ── Internals ────────────────────────────────────────────────────

    fn ensure_alive(&self) -> Result<(), CoreError> {
        match self.closure {
            Some(ref c) => Err(CoreError::SessionClosed {
                id: self.id,
                status: c.status,
            }),
            None => Ok(()),
        }
    }

    /// Terminal conditions first, then the worst of the two ledgers.
    fn recompute(&mut self, now: DateTime<Utc>) -> SessionStatus {
        if self.closure.is_some() {
            return self.status;
        }
        if let Some(reason) = self.expiry_reason(now) {
            self.close(SessionStatus::Expired, now, reason.into());
            return self.status;
        }
        self.status = SessionStatus::from_severity(self.severity());
        self.status
    }

    fn expiry_reason(&self, now: DateTime<Utc>) -> Option<&'static str> {
        if now >= self.expires_at {
            Some("time limit reached")
        } else if self.data.is_exhausted() {
            Some("data quota exhausted")
        } else if self.time.is_exhausted() {
            Some("time quota exhausted")
        } else {
            None
        }
    }

    fn close(&mut self, status: SessionStatus, at: DateTime<Utc>, reason: String) {
        debug!(session = %self.id, %status, %reason, "session closed");
        self.status = status;
        self.closure = Some(Closure { status, at, reason });
    }
}

/// `at + secs`, saturating at the far end of the calendar.
fn offset(at: DateTime<Utc>, secs: u64) -> DateTime<Utc> {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|d| at.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
