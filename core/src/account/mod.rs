//! # Account Module
//!
//! A custodial account per subscriber: the display name they registered
//! with, the ledger address we hold keys for, the PIN verifier, and the
//! failed-attempt counter. The raw key material never appears here — only
//! an AES-sealed blob ([`crate::custody`]) and an opaque verifier hash
//! ([`crate::guard`]).
//!
//! Accounts are never deleted. Lockout is a state, not a removal; a locked
//! account keeps its funds and its history and waits for support.

pub mod store;

pub use store::AccountStore;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One subscriber's custodial account.
#[derive(Debug, Clone, Serialize)]
pub struct Account {
    /// Phone number in international format. Unique key.
    pub msisdn: String,
    /// Name the subscriber registered with.
    pub display_name: String,
    /// Ledger address of the custodial wallet.
    pub address: String,
    /// Wallet secret sealed with AES-256-GCM (`nonce || ciphertext`).
    /// Opaque here; only [`crate::custody`] can open it, and only with
    /// the subscriber's PIN.
    #[serde(skip_serializing)]
    pub encrypted_credential: Vec<u8>,
    /// Reference to a contract-backed balance object, when the account has
    /// an enhanced wallet. Enables the ledger's cheaper internal-transfer
    /// primitive.
    pub vault_ref: Option<String>,
    /// Salted PIN verifier hash. Never a raw PIN.
    #[serde(skip_serializing)]
    pub pin_verifier: String,
    /// Consecutive failed PIN attempts, `0..=MAX_FAILED_ATTEMPTS`.
    pub failed_attempts: u8,
    /// When the account was registered.
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Creates a new unlocked account.
    pub fn new(
        msisdn: impl Into<String>,
        display_name: impl Into<String>,
        address: impl Into<String>,
        encrypted_credential: Vec<u8>,
        pin_verifier: impl Into<String>,
    ) -> Self {
        Self {
            msisdn: msisdn.into(),
            display_name: display_name.into(),
            address: address.into(),
            encrypted_credential,
            vault_ref: None,
            pin_verifier: pin_verifier.into(),
            failed_attempts: 0,
            created_at: Utc::now(),
        }
    }

    /// `true` if this account holds an enhanced wallet and can take part
    /// in the internal-transfer path.
    pub fn has_vault(&self) -> bool {
        self.vault_ref.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_account_is_unlocked_and_plain() {
        let a = Account::new("+256700000001", "Jane", "0xabc", vec![1, 2, 3], "verifier");
        assert_eq!(a.failed_attempts, 0);
        assert!(!a.has_vault());
    }

    #[test]
    fn serialization_omits_secrets() {
        let a = Account::new("+256700000001", "Jane", "0xabc", vec![9; 32], "verifier");
        let json = serde_json::to_string(&a).unwrap();
        assert!(!json.contains("verifier"));
        assert!(!json.contains("encrypted_credential"));
        assert!(json.contains("0xabc"));
    }
}
