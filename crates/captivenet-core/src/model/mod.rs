// ── Domain model ──
//
// Canonical types shared by the ledger, directory, voucher book, account
// registry and every consumer (CLI, future UI).

pub mod account;
pub mod ids;
pub mod plan;
pub mod quota;
pub mod session;
pub mod voucher;

// ── Re-exports ──────────────────────────────────────────────────────

pub use account::{Account, AccountStatus};
pub use ids::{AccountId, MacAddress, PlanId, RequestId, SessionId, VoucherCode};
pub use plan::{GIB, HOUR_SECS, Plan, PlanType};
pub use quota::{Dimension, Quota, QuotaStatus, Thresholds};
pub use session::{
    Closure, DeviceRef, Session, SessionKind, SessionOwner, SessionStatus, TerminateOutcome,
};
pub use voucher::{Voucher, VoucherStatus};
