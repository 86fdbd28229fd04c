// ── Lifecycle events ──
//
// Broadcast to whoever renders notifications. Lagging receivers simply
// miss events; the directory snapshot remains the source of truth.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{Dimension, SessionId, SessionKind, SessionStatus, VoucherCode};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    Opened {
        id: SessionId,
        kind: SessionKind,
        owner: String,
    },
    /// Moved between alive sub-states (ACTIVE, WARNING, CRITICAL).
    StatusChanged {
        id: SessionId,
        from: SessionStatus,
        to: SessionStatus,
    },
    Expired {
        id: SessionId,
        reason: String,
    },
    Terminated {
        id: SessionId,
        reason: String,
    },
    QuotaExtended {
        id: SessionId,
        dimension: Dimension,
        amount: i64,
    },
    ExpiryShortened {
        id: SessionId,
        expires_at: DateTime<Utc>,
    },
    VoucherExhausted {
        code: VoucherCode,
    },
}

impl SessionEvent {
    /// Session this event concerns, if any.
    pub fn session_id(&self) -> Option<SessionId> {
        match self {
            Self::Opened { id, .. }
            | Self::StatusChanged { id, .. }
            | Self::Expired { id, .. }
            | Self::Terminated { id, .. }
            | Self::QuotaExtended { id, .. }
            | Self::ExpiryShortened { id, .. } => Some(*id),
            Self::VoucherExhausted { .. } => None,
        }
    }
}
