// ── Core error types ──
//
// Errors raised by the ledger, session lifecycle, voucher book, account
// registry and console. Ledger and lifecycle errors are meant for the
// immediate caller; redemption and command failures are shown to the
// guest or operator.

use thiserror::Error;

use crate::model::{SessionId, SessionStatus};

/// Unified error type for the core crate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    // ── Accounting errors ────────────────────────────────────────────
    #[error("Invalid amount {amount}: {reason}")]
    InvalidAmount { amount: i64, reason: &'static str },

    #[error("Session {id} is closed ({status})")]
    SessionClosed { id: SessionId, status: SessionStatus },

    #[error("Out-of-order usage tick for session {id}: {received} is not after {last_applied}")]
    OutOfOrderTick {
        id: SessionId,
        received: chrono::DateTime<chrono::Utc>,
        last_applied: chrono::DateTime<chrono::Utc>,
    },

    // ── Lookup errors ────────────────────────────────────────────────
    #[error("Entity not found: {entity_type} with id {identifier}")]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    // ── Voucher redemption ───────────────────────────────────────────
    #[error("Invalid voucher code: {code}")]
    InvalidCode { code: String },

    #[error("Voucher code {code} has expired")]
    CodeExpired { code: String },

    #[error("Voucher code {code} has already been used")]
    CodeAlreadyUsed { code: String },

    #[error("Too many failed attempts, try again in {remaining_secs}s")]
    RedemptionLocked { remaining_secs: i64 },

    // ── Authorization ────────────────────────────────────────────────
    #[error("Permission denied: {role} may not {action}")]
    PermissionDenied { role: String, action: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Cannot move {entity} from {from} to {to}")]
    InvalidTransition {
        entity: String,
        from: String,
        to: String,
    },

    #[error("Console is not running")]
    ConsoleStopped,

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn not_found(entity_type: &str, identifier: impl ToString) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            identifier: identifier.to_string(),
        }
    }

    /// Whether this failure counts against a guest's redemption attempts.
    pub fn is_redemption_failure(&self) -> bool {
        matches!(
            self,
            Self::InvalidCode { .. } | Self::CodeExpired { .. } | Self::CodeAlreadyUsed { .. }
        )
    }
}
