// ── Audit trail ──
//
// Append-only record of sensitive actions: who (role) did what to which
// target, when, and under which request id. Entries are never edited or
// removed; readers get frozen `Arc` copies.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::{Display, EnumIter, EnumString};
use tracing::trace;

use crate::model::RequestId;
use crate::policy::Role;

/// What happened.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum AuditAction {
    Validate,
    Reject,
    SessionStart,
    SessionRevoke,
    SessionTimeout,
    QuotaExceeded,
    QuotaExtend,
    ExpiryShorten,
    VoucherCreate,
    VoucherUse,
    VoucherRevoke,
    /// An operator command refused by the access policy.
    AccessDenied,
}

/// Kind of object an entry is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AuditTarget {
    Session,
    Voucher,
    Account,
}

/// One immutable audit record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    /// Position in the trail, starting at 1.
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    /// Acting role; `None` for the system, the gateway or a guest.
    pub actor_role: Option<Role>,
    pub action: AuditAction,
    pub target_type: AuditTarget,
    pub target_id: String,
    pub request_id: RequestId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// An entry before the log stamps its sequence number.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub actor_role: Option<Role>,
    pub action: AuditAction,
    pub target_type: AuditTarget,
    pub target_id: String,
    pub request_id: Option<RequestId>,
    pub detail: Option<String>,
}

impl AuditRecord {
    pub fn new(action: AuditAction, target_type: AuditTarget, target_id: impl ToString) -> Self {
        Self {
            actor_role: None,
            action,
            target_type,
            target_id: target_id.to_string(),
            request_id: None,
            detail: None,
        }
    }

    pub fn by(mut self, role: Option<Role>) -> Self {
        self.actor_role = role;
        self
    }

    pub fn request(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Narrow an audit listing. Empty criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditFilter {
    pub action: Option<AuditAction>,
    pub target_type: Option<AuditTarget>,
    pub target_id: Option<String>,
}

impl AuditFilter {
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.action.is_none_or(|a| a == entry.action)
            && self.target_type.is_none_or(|t| t == entry.target_type)
            && self
                .target_id
                .as_deref()
                .is_none_or(|id| id.eq_ignore_ascii_case(&entry.target_id))
    }
}

/// The trail itself. Only [`append`](Self::append) writes.
#[derive(Debug, Default)]
pub struct AuditLog {
    entries: Mutex<Vec<Arc<AuditEntry>>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp and store a record. A request id is drawn when none is given.
    pub fn append(&self, record: AuditRecord, at: DateTime<Utc>) -> Arc<AuditEntry> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = Arc::new(AuditEntry {
            seq: u64::try_from(entries.len()).unwrap_or(u64::MAX).saturating_add(1),
            timestamp: at,
            actor_role: record.actor_role,
            action: record.action,
            target_type: record.target_type,
            target_id: record.target_id,
            request_id: record.request_id.unwrap_or_else(RequestId::random),
            detail: record.detail,
        });
        entries.push(Arc::clone(&entry));
        trace!(seq = entry.seq, action = %entry.action, target = %entry.target_id, "audit entry");
        entry
    }

    /// Matching entries, oldest first.
    pub fn entries(&self, filter: &AuditFilter) -> Vec<Arc<AuditEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
