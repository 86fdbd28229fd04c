// ── Command API ──
//
// Every mutation flows through the `Command` enum. The console routes
// each variant to the directory, voucher book or account registry from
// a single processor task.

pub mod requests;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::CoreError;
use crate::model::{
    Account, AccountId, Dimension, RequestId, Session, SessionId, SessionStatus, TerminateOutcome,
    Voucher, VoucherCode,
};
use crate::policy::{Action, Role};

pub use requests::{GenerateVouchersRequest, RedeemVoucherRequest, StartSessionRequest, UsageEvent};

/// A command plus the channel its result goes back on.
pub(crate) struct CommandEnvelope {
    pub command: Command,
    /// Issuing role; `None` for unchecked callers.
    pub actor: Option<Role>,
    pub response_tx: tokio::sync::oneshot::Sender<Result<CommandResult, CoreError>>,
}

/// All write operations the console accepts.
#[derive(Debug, Clone)]
pub enum Command {
    // ── Session operations ───────────────────────────────────────────
    TerminateSession {
        id: SessionId,
        reason: String,
    },
    /// Not idempotent on its own: retries must reuse `request_id`.
    ExtendQuota {
        id: SessionId,
        dimension: Dimension,
        amount: i64,
        request_id: RequestId,
    },
    ShortenExpiry {
        id: SessionId,
        until: DateTime<Utc>,
    },
    ApplyUsage(UsageEvent),
    StartSubscriberSession(StartSessionRequest),

    // ── Voucher operations ───────────────────────────────────────────
    RedeemVoucher(RedeemVoucherRequest),
    GenerateVouchers(GenerateVouchersRequest),
    RevokeVoucher {
        code: VoucherCode,
    },

    // ── Account operations ───────────────────────────────────────────
    ValidateAccount {
        id: AccountId,
        notes: Option<String>,
        by: Option<AccountId>,
    },
    RejectAccount {
        id: AccountId,
        reason: String,
    },
}

impl Command {
    /// Policy action an operator needs to issue this command.
    ///
    /// Gateway ticks, guest redemption and subscriber login are not
    /// operator actions and return `None`.
    pub fn required_action(&self) -> Option<Action> {
        match self {
            Self::TerminateSession { .. } => Some(Action::TerminateSession),
            Self::ExtendQuota { .. } => Some(Action::ExtendQuota),
            Self::ShortenExpiry { .. } => Some(Action::ShortenExpiry),
            Self::GenerateVouchers(_) => Some(Action::GenerateVoucher),
            Self::RevokeVoucher { .. } => Some(Action::RevokeVoucher),
            Self::ValidateAccount { .. } => Some(Action::ValidateAccount),
            Self::RejectAccount { .. } => Some(Action::RejectAccount),
            Self::ApplyUsage(_) | Self::RedeemVoucher(_) | Self::StartSubscriberSession(_) => None,
        }
    }
}

/// Result of a successfully executed command.
#[derive(Debug, Clone)]
pub enum CommandResult {
    Status(SessionStatus),
    Terminated(TerminateOutcome),
    Session(Arc<Session>),
    Redeemed {
        session: Arc<Session>,
        voucher: Arc<Voucher>,
    },
    Vouchers(Vec<Arc<Voucher>>),
    Voucher(Arc<Voucher>),
    Account(Arc<Account>),
}
