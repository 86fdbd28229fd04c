// ── Reactive portal store ──
//
// Sessions, vouchers and accounts, each in its own keyed collection with
// push-based change notification.

mod accounts;
mod collection;
mod directory;
mod vouchers;

pub use accounts::AccountRegistry;
pub use directory::{DirectorySummary, SessionDirectory};
pub use vouchers::{Consumed, VoucherBatch, VoucherBook};
