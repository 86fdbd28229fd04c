// ── Account registry ──
//
// Subscriber sign-ups waiting for operator validation, and the
// validate/reject transitions. Both are safe to retry.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use super::collection::EntityCollection;
use crate::error::CoreError;
use crate::model::{Account, AccountId, AccountStatus};
use crate::stream::EntityStream;

pub struct AccountRegistry {
    accounts: EntityCollection<AccountId, Account>,
}

impl Default for AccountRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountRegistry {
    pub fn new() -> Self {
        Self {
            accounts: EntityCollection::new(),
        }
    }

    pub fn insert(&self, account: Account) {
        self.accounts.upsert(account.id, account);
    }

    pub fn get(&self, id: AccountId) -> Option<Arc<Account>> {
        self.accounts.get(&id)
    }

    pub fn require(&self, id: AccountId) -> Result<Arc<Account>, CoreError> {
        self.get(id).ok_or_else(|| CoreError::not_found("account", id))
    }

    /// All accounts by id, optionally narrowed to one status.
    pub fn list(&self, status: Option<AccountStatus>) -> Vec<Arc<Account>> {
        let mut all: Vec<_> = self
            .accounts
            .snapshot()
            .iter()
            .filter(|a| status.is_none_or(|s| a.status == s))
            .cloned()
            .collect();
        all.sort_by_key(|a| a.id);
        all
    }

    pub fn subscribe(&self) -> EntityStream<Account> {
        EntityStream::new(self.accounts.subscribe())
    }

    /// PENDING → ACTIVE. Validating an active account again is a no-op.
    pub fn validate(
        &self,
        id: AccountId,
        notes: Option<String>,
        by: Option<AccountId>,
        now: DateTime<Utc>,
    ) -> Result<Arc<Account>, CoreError> {
        let (changed, stored) = self
            .accounts
            .try_update(&id, |a| match a.status {
                AccountStatus::Pending => {
                    a.status = AccountStatus::Active;
                    a.validation_notes = notes.filter(|n| !n.trim().is_empty());
                    a.validated_by = by;
                    a.validated_at = Some(now);
                    Ok(true)
                }
                AccountStatus::Active => Ok(false),
                other => Err(transition(id, other, AccountStatus::Active)),
            })
            .ok_or_else(|| CoreError::not_found("account", id))??;
        if changed {
            info!(account = %id, "account validated");
        }
        Ok(stored)
    }

    /// PENDING → REJECTED with a mandatory reason. Rejecting a rejected
    /// account again is a no-op.
    pub fn reject(
        &self,
        id: AccountId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Arc<Account>, CoreError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(CoreError::ValidationFailed {
                message: "a rejection reason is required".into(),
            });
        }
        let (changed, stored) = self
            .accounts
            .try_update(&id, |a| match a.status {
                AccountStatus::Pending => {
                    a.status = AccountStatus::Rejected;
                    a.rejection_reason = Some(reason.to_owned());
                    a.validated_at = Some(now);
                    Ok(true)
                }
                AccountStatus::Rejected => Ok(false),
                other => Err(transition(id, other, AccountStatus::Rejected)),
            })
            .ok_or_else(|| CoreError::not_found("account", id))??;
        if changed {
            info!(account = %id, %reason, "account rejected");
        }
        Ok(stored)
    }
}

fn transition(id: AccountId, from: AccountStatus, to: AccountStatus) -> CoreError {
    CoreError::InvalidTransition {
        entity: format!("account {id}"),
        from: from.to_string(),
        to: to.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::policy::Role;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap()
    }

    fn pending(id: u64) -> Account {
        Account {
            id: AccountId(id),
            email: format!("user{id}@example.com"),
            username: format!("user{id}"),
            first_name: String::new(),
            last_name: String::new(),
            role: Role::Subscriber,
            status: AccountStatus::Pending,
            validation_notes: None,
            rejection_reason: None,
            validated_by: None,
            validated_at: None,
        }
    }

    fn registry() -> AccountRegistry {
        let reg = AccountRegistry::new();
        reg.insert(pending(1));
        reg.insert(pending(2));
        reg
    }

    #[test]
    fn validate_activates_and_is_retry_safe() {
        let reg = registry();
        let a = reg
            .validate(AccountId(1), Some("ID checked".into()), Some(AccountId(9)), now())
            .unwrap();
        assert_eq!(a.status, AccountStatus::Active);
        assert_eq!(a.validated_by, Some(AccountId(9)));
        let again = reg.validate(AccountId(1), None, None, now()).unwrap();
        assert_eq!(again.validation_notes.as_deref(), Some("ID checked"));
    }

    #[test]
    fn reject_requires_reason() {
        let reg = registry();
        assert!(matches!(
            reg.reject(AccountId(2), "   ", now()),
            Err(CoreError::ValidationFailed { .. })
        ));
        assert_eq!(reg.get(AccountId(2)).unwrap().status, AccountStatus::Pending);
        let a = reg.reject(AccountId(2), "duplicate", now()).unwrap();
        assert_eq!(a.status, AccountStatus::Rejected);
        assert_eq!(a.rejection_reason.as_deref(), Some("duplicate"));
        assert!(reg.reject(AccountId(2), "again", now()).is_ok());
    }

    #[test]
    fn cross_transitions_are_refused() {
        let reg = registry();
        reg.validate(AccountId(1), None, None, now()).unwrap();
        reg.reject(AccountId(2), "spam", now()).unwrap();
        assert!(matches!(
            reg.reject(AccountId(1), "late", now()),
            Err(CoreError::InvalidTransition { .. })
        ));
        assert!(matches!(
            reg.validate(AccountId(2), None, None, now()),
            Err(CoreError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn unknown_account_is_not_found() {
        let reg = registry();
        assert!(matches!(
            reg.validate(AccountId(77), None, None, now()),
            Err(CoreError::NotFound { .. })
        ));
    }

    #[test]
    fn list_filters_by_status() {
        let reg = registry();
        reg.validate(AccountId(2), None, None, now()).unwrap();
        let pending = reg.list(Some(AccountStatus::Pending));
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, AccountId(1));
        assert_eq!(reg.list(None).len(), 2);
    }
}
