//! # Account Store
//!
//! In-memory implementation of the account table: a `DashMap` keyed by
//! subscriber number. This is the reference implementation of the storage
//! collaborator's interface — a persistent backend would replace this type
//! without touching its callers.
//!
//! The one subtlety is [`AccountStore::with_mut`]: the security guard's
//! counter increments go through it so that the read-modify-write happens
//! under the entry lock. Two concurrent wrong-PIN attempts (a USSD retry
//! after a gateway timeout, say) must count as two, not one.

use dashmap::DashMap;

use super::Account;
use crate::error::SenteError;

/// Concurrent subscriber → account map.
#[derive(Debug, Default)]
pub struct AccountStore {
    accounts: DashMap<String, Account>,
}

impl AccountStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new account. Fails if the subscriber is already registered —
    /// registration is once per phone number.
    pub fn create(&self, account: Account) -> Result<(), SenteError> {
        match self.accounts.entry(account.msisdn.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(SenteError::validation(format!(
                "{} is already registered",
                account.msisdn
            ))),
            dashmap::mapref::entry::Entry::Vacant(v) => {
                v.insert(account);
                Ok(())
            }
        }
    }

    /// Fetches a copy of the subscriber's account.
    pub fn get(&self, msisdn: &str) -> Option<Account> {
        self.accounts.get(msisdn).map(|a| a.clone())
    }

    /// `true` if the subscriber is registered.
    pub fn exists(&self, msisdn: &str) -> bool {
        self.accounts.contains_key(msisdn)
    }

    /// Runs `f` against the account under the entry lock. Returns `None`
    /// if the subscriber is unknown. This is the only mutation path, which
    /// keeps counter updates atomic per subscriber.
    pub fn with_mut<R>(&self, msisdn: &str, f: impl FnOnce(&mut Account) -> R) -> Option<R> {
        self.accounts.get_mut(msisdn).map(|mut a| f(&mut a))
    }

    /// Number of registered accounts (for metrics).
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// `true` if nobody has registered yet.
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(msisdn: &str) -> Account {
        Account::new(msisdn, "Jane", "0xabc", vec![0; 16], "verifier")
    }

    #[test]
    fn create_then_get() {
        let store = AccountStore::new();
        store.create(account("+256700000001")).unwrap();

        let a = store.get("+256700000001").unwrap();
        assert_eq!(a.display_name, "Jane");
        assert!(store.exists("+256700000001"));
        assert!(!store.exists("+256700000002"));
    }

    #[test]
    fn duplicate_registration_rejected() {
        let store = AccountStore::new();
        store.create(account("+256700000001")).unwrap();

        let err = store.create(account("+256700000001")).unwrap_err();
        assert!(matches!(err, SenteError::Validation(_)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn with_mut_updates_in_place() {
        let store = AccountStore::new();
        store.create(account("+256700000001")).unwrap();

        let after = store
            .with_mut("+256700000001", |a| {
                a.failed_attempts += 1;
                a.failed_attempts
            })
            .unwrap();
        assert_eq!(after, 1);
        assert_eq!(store.get("+256700000001").unwrap().failed_attempts, 1);
    }

    #[test]
    fn with_mut_unknown_subscriber() {
        let store = AccountStore::new();
        assert!(store.with_mut("+256700000009", |_| ()).is_none());
    }
}
