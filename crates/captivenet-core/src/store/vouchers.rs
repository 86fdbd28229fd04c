// ── Voucher book ──
//
// Issued voucher codes, their use counters and validity windows.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, info};

use super::collection::EntityCollection;
use crate::error::CoreError;
use crate::model::{AccountId, Plan, Voucher, VoucherCode, VoucherStatus};
use crate::stream::EntityStream;

const MAX_BATCH: u32 = 100;
/// Redraws per code before giving up on finding an unused one.
const MAX_DRAWS: usize = 64;

/// What to issue. Defaults are resolved by the caller.
#[derive(Debug, Clone)]
pub struct VoucherBatch<'a> {
    pub plan: &'a Plan,
    pub quantity: u32,
    pub max_uses: u32,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub notes: Option<String>,
    pub created_by: Option<AccountId>,
}

/// A consumed use of a voucher.
#[derive(Debug, Clone)]
pub struct Consumed {
    pub voucher: Arc<Voucher>,
    /// This use was the last one the voucher allowed.
    pub exhausted: bool,
}

pub struct VoucherBook {
    vouchers: EntityCollection<VoucherCode, Voucher>,
}

impl Default for VoucherBook {
    fn default() -> Self {
        Self::new()
    }
}

impl VoucherBook {
    pub fn new() -> Self {
        Self {
            vouchers: EntityCollection::new(),
        }
    }

    /// Load an existing voucher (fixtures, imports).
    pub fn insert(&self, voucher: Voucher) {
        self.vouchers.upsert(voucher.code.clone(), voucher);
    }

    pub fn get(&self, code: &VoucherCode) -> Option<Arc<Voucher>> {
        self.vouchers.get(code)
    }

    /// Newest first, then by code.
    pub fn list(&self) -> Vec<Arc<Voucher>> {
        let mut all: Vec<_> = self.vouchers.snapshot().iter().cloned().collect();
        all.sort_by(|a, b| {
            b.valid_from
                .cmp(&a.valid_from)
                .then_with(|| a.code.cmp(&b.code))
        });
        all
    }

    pub fn len(&self) -> usize {
        self.vouchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subscribe(&self) -> EntityStream<Voucher> {
        EntityStream::new(self.vouchers.subscribe())
    }

    // ── Issuing ──────────────────────────────────────────────────────

    /// Issue `quantity` fresh codes under `plan`.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        batch: VoucherBatch<'_>,
        rng: &mut R,
    ) -> Result<Vec<Arc<Voucher>>, CoreError> {
        if !(1..=MAX_BATCH).contains(&batch.quantity) {
            return Err(CoreError::ValidationFailed {
                message: format!("quantity must be between 1 and {MAX_BATCH}"),
            });
        }
        if batch.max_uses == 0 {
            return Err(CoreError::ValidationFailed {
                message: "max_uses must be at least 1".into(),
            });
        }
        if batch.valid_until <= batch.valid_from {
            return Err(CoreError::ValidationFailed {
                message: "valid_until must be after valid_from".into(),
            });
        }

        let mut issued = Vec::new();
        for _ in 0..batch.quantity {
            let code = self.fresh_code(rng)?;
            let voucher = Voucher {
                code: code.clone(),
                plan_id: batch.plan.id,
                max_uses: batch.max_uses,
                used_count: 0,
                valid_from: batch.valid_from,
                valid_until: batch.valid_until,
                status: VoucherStatus::Active,
                notes: batch.notes.clone(),
                created_by: batch.created_by,
            };
            self.vouchers.upsert(code.clone(), voucher);
            if let Some(stored) = self.vouchers.get(&code) {
                issued.push(stored);
            }
        }
        info!(
            plan = %batch.plan.code,
            quantity = issued.len(),
            max_uses = batch.max_uses,
            "vouchers generated"
        );
        Ok(issued)
    }

    fn fresh_code<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<VoucherCode, CoreError> {
        for _ in 0..MAX_DRAWS {
            let raw: String = (0..VoucherCode::LEN)
                .filter_map(|_| VoucherCode::ALPHABET.choose(&mut *rng).copied().map(char::from))
                .collect();
            let code = VoucherCode::parse(&raw)?;
            if !self.vouchers.contains(&code) {
                return Ok(code);
            }
            debug!(%code, "voucher code collision, redrawing");
        }
        Err(CoreError::Internal("could not draw an unused voucher code".into()))
    }

    /// ACTIVE → REVOKED. Revoking twice is a no-op.
    pub fn revoke(&self, code: &VoucherCode) -> Result<Arc<Voucher>, CoreError> {
        let (changed, stored) = self
            .vouchers
            .try_update(code, |v| match v.status {
                VoucherStatus::Active => {
                    v.status = VoucherStatus::Revoked;
                    Ok(true)
                }
                VoucherStatus::Revoked => Ok(false),
                other => Err(CoreError::InvalidTransition {
                    entity: format!("voucher {code}"),
                    from: other.to_string(),
                    to: VoucherStatus::Revoked.to_string(),
                }),
            })
            .ok_or_else(|| CoreError::not_found("voucher", code))??;
        if changed {
            info!(%code, "voucher revoked");
        }
        Ok(stored)
    }

    // ── Redemption ───────────────────────────────────────────────────

    /// Consume one use of `raw` at `now`.
    ///
    /// Checks run in order: format, existence and revocation
    /// (`InvalidCode`), validity window (`CodeExpired` once past
    /// `valid_until`, `InvalidCode` before `valid_from`), then remaining
    /// uses (`CodeAlreadyUsed`).
    pub fn redeem(&self, raw: &str, now: DateTime<Utc>) -> Result<Consumed, CoreError> {
        let code = VoucherCode::parse(raw)?;
        let invalid = || CoreError::InvalidCode {
            code: code.to_string(),
        };

        let (exhausted, voucher) = self
            .vouchers
            .try_update(&code, |v| {
                if v.status == VoucherStatus::Revoked {
                    return Err(invalid());
                }
                if v.status == VoucherStatus::Expired || now > v.valid_until {
                    return Err(CoreError::CodeExpired {
                        code: code.to_string(),
                    });
                }
                if now < v.valid_from {
                    return Err(invalid());
                }
                if v.status == VoucherStatus::Used || v.is_exhausted() {
                    return Err(CoreError::CodeAlreadyUsed {
                        code: code.to_string(),
                    });
                }
                v.used_count += 1;
                let exhausted = v.is_exhausted();
                if exhausted {
                    v.status = VoucherStatus::Used;
                }
                Ok(exhausted)
            })
            .ok_or_else(invalid)??;

        debug!(%code, used = voucher.used_count, max = voucher.max_uses, "voucher use consumed");
        Ok(Consumed { voucher, exhausted })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::PlanId;
    use chrono::{TimeDelta, TimeZone};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap()
    }

    fn plan() -> Plan {
        Plan::default_catalog().remove(0)
    }

    fn voucher(code: &str, max_uses: u32) -> Voucher {
        Voucher {
            code: VoucherCode::parse(code).unwrap(),
            plan_id: PlanId(1),
            max_uses,
            used_count: 0,
            valid_from: t0(),
            valid_until: t0() + TimeDelta::days(7),
            status: VoucherStatus::Active,
            notes: None,
            created_by: None,
        }
    }

    fn book_with(v: Voucher) -> VoucherBook {
        let book = VoucherBook::new();
        book.insert(v);
        book
    }

    #[test]
    fn single_use_code_redeems_once() {
        let book = book_with(voucher("DEMO1234", 1));
        let first = book.redeem("DEMO1234", t0() + TimeDelta::hours(1)).unwrap();
        assert!(first.exhausted);
        assert_eq!(first.voucher.status, VoucherStatus::Used);
        let err = book.redeem("demo1234", t0() + TimeDelta::hours(2)).unwrap_err();
        assert_eq!(
            err,
            CoreError::CodeAlreadyUsed {
                code: "DEMO1234".into()
            }
        );
    }

    #[test]
    fn multi_use_code_counts_up_to_cap() {
        let book = book_with(voucher("TEAM0001", 3));
        let now = t0() + TimeDelta::hours(1);
        assert!(!book.redeem("TEAM0001", now).unwrap().exhausted);
        assert!(!book.redeem("TEAM0001", now).unwrap().exhausted);
        let last = book.redeem("TEAM0001", now).unwrap();
        assert!(last.exhausted);
        assert_eq!(last.voucher.used_count, 3);
        assert!(matches!(
            book.redeem("TEAM0001", now),
            Err(CoreError::CodeAlreadyUsed { .. })
        ));
    }

    #[test]
    fn unknown_malformed_and_revoked_codes_are_invalid() {
        let book = book_with(voucher("DEMO1234", 1));
        let now = t0() + TimeDelta::hours(1);
        assert!(matches!(book.redeem("ZZZZ9999", now), Err(CoreError::InvalidCode { .. })));
        assert!(matches!(book.redeem("bad", now), Err(CoreError::InvalidCode { .. })));
        book.revoke(&VoucherCode::parse("DEMO1234").unwrap()).unwrap();
        assert!(matches!(book.redeem("DEMO1234", now), Err(CoreError::InvalidCode { .. })));
    }

    #[test]
    fn validity_window_is_enforced() {
        let book = book_with(voucher("DEMO1234", 1));
        assert!(matches!(
            book.redeem("DEMO1234", t0() - TimeDelta::seconds(1)),
            Err(CoreError::InvalidCode { .. })
        ));
        assert!(matches!(
            book.redeem("DEMO1234", t0() + TimeDelta::days(8)),
            Err(CoreError::CodeExpired { .. })
        ));
        // Failed attempts consume nothing.
        let v = book.get(&VoucherCode::parse("DEMO1234").unwrap()).unwrap();
        assert_eq!(v.used_count, 0);
    }

    #[test]
    fn revoke_is_idempotent_but_not_for_used_codes() {
        let book = book_with(voucher("DEMO1234", 1));
        let code = VoucherCode::parse("DEMO1234").unwrap();
        book.revoke(&code).unwrap();
        assert_eq!(book.revoke(&code).unwrap().status, VoucherStatus::Revoked);

        let book = book_with(voucher("USED0001", 1));
        book.redeem("USED0001", t0() + TimeDelta::hours(1)).unwrap();
        assert!(matches!(
            book.revoke(&VoucherCode::parse("USED0001").unwrap()),
            Err(CoreError::InvalidTransition { .. })
        ));
        assert!(matches!(
            book.revoke(&VoucherCode::parse("NOPE0000").unwrap()),
            Err(CoreError::NotFound { .. })
        ));
    }

    #[test]
    fn generate_issues_unique_wellformed_codes() {
        let book = VoucherBook::new();
        let plan = plan();
        let mut rng = StdRng::seed_from_u64(7);
        let issued = book
            .generate(
                VoucherBatch {
                    plan: &plan,
                    quantity: 25,
                    max_uses: 1,
                    valid_from: t0(),
                    valid_until: t0() + TimeDelta::days(7),
                    notes: Some("lobby".into()),
                    created_by: None,
                },
                &mut rng,
            )
            .unwrap();
        assert_eq!(issued.len(), 25);
        assert_eq!(book.len(), 25);
        for v in &issued {
            assert_eq!(v.code.as_str().len(), VoucherCode::LEN);
            assert_eq!(v.plan_id, plan.id);
            assert_eq!(v.status, VoucherStatus::Active);
        }
    }

    #[test]
    fn generate_validates_request() {
        let book = VoucherBook::new();
        let plan = plan();
        let mut rng = StdRng::seed_from_u64(1);
        let base = VoucherBatch {
            plan: &plan,
            quantity: 1,
            max_uses: 1,
            valid_from: t0(),
            valid_until: t0() + TimeDelta::days(1),
            notes: None,
            created_by: None,
        };
        for bad in [
            VoucherBatch {
                quantity: 0,
                ..base.clone()
            },
            VoucherBatch {
                quantity: 101,
                ..base.clone()
            },
            VoucherBatch {
                max_uses: 0,
                ..base.clone()
            },
            VoucherBatch {
                valid_until: t0(),
                ..base.clone()
            },
        ] {
            assert!(matches!(
                book.generate(bad, &mut rng),
                Err(CoreError::ValidationFailed { .. })
            ));
        }
        assert!(book.is_empty());
    }
}
