//! Captive-portal core: quota accounting, session lifecycle, voucher
//! redemption and role-based access, shared by the CLI and future UIs.
//!
//! - **[`Console`]**: central facade. [`start()`](Console::start) spawns the
//!   command processor and the periodic expiry sweep;
//!   [`Console::oneshot()`](Console::oneshot) runs a single CLI invocation
//!   against seeded state.
//!
//! - **[`SessionDirectory`]**, **[`VoucherBook`]**, **[`AccountRegistry`]**:
//!   reactive stores built on `DashMap` + `tokio::sync::watch`. Updates are
//!   copy-on-write, so a rejected mutation leaves state untouched.
//!
//! - **[`EntityStream<T>`]**: subscription handle exposing `current()` /
//!   `latest()` / `changed()` for live views.
//!
//! - **[`Command`]**: typed mutation requests routed through an `mpsc`
//!   channel. [`Console::execute_as`] checks the caller's role against the
//!   [`AccessPolicy`] before anything is queued.
//!
//! - **[`AuditLog`]**: append-only trail of operator actions, redemptions
//!   and expiries, readable through [`Console::audit_log`].
//!
//! - **Domain model** ([`model`]): [`Session`] with its two [`Quota`]
//!   ledgers, [`Voucher`], [`Plan`], [`Account`].

pub mod audit;
pub mod clock;
pub mod command;
pub mod config;
pub mod console;
pub mod error;
pub mod event;
pub mod fixture;
pub mod model;
pub mod policy;
pub mod redemption;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use audit::{AuditAction, AuditEntry, AuditFilter, AuditLog, AuditRecord, AuditTarget};
pub use clock::{Clock, ManualClock, SystemClock};
pub use command::requests::*;
pub use command::{Command, CommandResult};
pub use config::{ConsoleConfig, LockoutPolicy, VoucherDefaults};
pub use console::Console;
pub use error::CoreError;
pub use event::SessionEvent;
pub use fixture::{Fixture, SessionSeed};
pub use policy::{AccessPolicy, Action, Guard, Permissions, Role, Route};
pub use redemption::RedemptionGuard;
pub use store::{
    AccountRegistry, Consumed, DirectorySummary, SessionDirectory, VoucherBatch, VoucherBook,
};
pub use stream::{EntityStream, SessionFilter};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    Account, AccountId, AccountStatus, Closure, DeviceRef, Dimension, GIB, HOUR_SECS, MacAddress,
    Plan, PlanId, PlanType, Quota, QuotaStatus, RequestId, Session, SessionId, SessionKind,
    SessionOwner, SessionStatus, TerminateOutcome, Thresholds, Voucher, VoucherCode,
    VoucherStatus,
};
