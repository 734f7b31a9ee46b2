//! # Mock Ledger
//!
//! In-memory implementation of [`LedgerClient`]. Doubles as the dev-mode
//! backend for a gateway running without chain access and as the test
//! double for everything in this crate.
//!
//! It is deliberately faithful to the real service's behavior at the
//! boundary: integer mist balances, ownership checks on internal transfers,
//! frozen vaults rejecting debits, and opaque transaction digests. It also
//! offers one thing the real chain can't — [`MockLedger::fail_next_transfer`]
//! — so the Failed-settlement path is testable without unplugging a network
//! cable.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::RngCore;
use rust_decimal::Decimal;

use super::client::{LedgerClient, LedgerError, LedgerReceipt, NewWallet};
use crate::custody::Credential;

/// State of one enhanced-wallet balance object.
#[derive(Debug, Clone)]
struct Vault {
    address: String,
    frozen: bool,
}

/// In-memory chain: addresses, mist balances, vault objects.
#[derive(Debug, Default)]
pub struct MockLedger {
    /// address → balance in mist.
    balances: DashMap<String, u64>,
    /// hex(secret) → owned address. How the mock "verifies signatures".
    owners: DashMap<String, String>,
    /// vault reference → vault state.
    vaults: DashMap<String, Vault>,
    /// When set, the next transfer (either flavor) fails with this reason.
    fail_next: Mutex<Option<String>>,
}

impl MockLedger {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms failure injection: the next `transfer`/`internal_transfer`
    /// call returns `Unavailable(reason)` instead of executing.
    pub fn fail_next_transfer(&self, reason: impl Into<String>) {
        *self.fail_next.lock() = Some(reason.into());
    }

    /// Creates a contract-backed balance object for an address and returns
    /// its reference. The real chain does this via a wallet-upgrade call;
    /// the mock just conjures the object.
    pub fn create_vault(&self, address: &str) -> String {
        let vault_ref = format!("vault-{}", random_hex(16));
        self.vaults.insert(
            vault_ref.clone(),
            Vault {
                address: address.to_string(),
                frozen: false,
            },
        );
        vault_ref
    }

    /// Raw mist balance, for assertions.
    pub fn balance_mist(&self, address: &str) -> u64 {
        self.balances.get(address).map(|b| *b).unwrap_or(0)
    }

    fn take_injected_failure(&self) -> Option<String> {
        self.fail_next.lock().take()
    }

    fn resolve_owner(&self, credential: &Credential) -> Result<String, LedgerError> {
        self.owners
            .get(&hex::encode(credential.expose()))
            .map(|a| a.clone())
            .ok_or_else(|| LedgerError::Rejected("credential does not own a wallet".into()))
    }

    fn debit(&self, address: &str, amount_mist: u64) -> Result<(), LedgerError> {
        let mut balance = self
            .balances
            .get_mut(address)
            .ok_or_else(|| LedgerError::Rejected(format!("unknown address {address}")))?;
        if *balance < amount_mist {
            return Err(LedgerError::Rejected("insufficient balance".into()));
        }
        *balance -= amount_mist;
        Ok(())
    }

    fn credit(&self, address: &str, amount_mist: u64) {
        *self.balances.entry(address.to_string()).or_insert(0) += amount_mist;
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn create_wallet(&self) -> Result<NewWallet, LedgerError> {
        let address = format!("0x{}", random_hex(32));
        let mut secret = vec![0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut secret);

        self.owners.insert(hex::encode(&secret), address.clone());
        self.balances.insert(address.clone(), 0);

        Ok(NewWallet { address, secret })
    }

    async fn get_balance(&self, address: &str) -> Result<Decimal, LedgerError> {
        let mist = self
            .balances
            .get(address)
            .map(|b| *b)
            .ok_or_else(|| LedgerError::Rejected(format!("unknown address {address}")))?;
        Ok(Decimal::from_i128_with_scale(mist as i128, 9).normalize())
    }

    async fn transfer(
        &self,
        credential: &Credential,
        to_address: &str,
        amount_mist: u64,
    ) -> Result<LedgerReceipt, LedgerError> {
        if let Some(reason) = self.take_injected_failure() {
            return Err(LedgerError::Unavailable(reason));
        }

        let from = self.resolve_owner(credential)?;
        self.debit(&from, amount_mist)?;
        self.credit(to_address, amount_mist);

        Ok(LedgerReceipt {
            reference: random_hex(32),
        })
    }

    async fn internal_transfer(
        &self,
        from_ref: &str,
        to_ref: &str,
        credential: &Credential,
        amount_mist: u64,
    ) -> Result<LedgerReceipt, LedgerError> {
        if let Some(reason) = self.take_injected_failure() {
            return Err(LedgerError::Unavailable(reason));
        }

        let from_vault = self
            .vaults
            .get(from_ref)
            .map(|v| v.clone())
            .ok_or_else(|| LedgerError::Rejected(format!("unknown vault {from_ref}")))?;
        let to_vault = self
            .vaults
            .get(to_ref)
            .map(|v| v.clone())
            .ok_or_else(|| LedgerError::Rejected(format!("unknown vault {to_ref}")))?;

        if from_vault.frozen {
            return Err(LedgerError::Rejected("vault is frozen".into()));
        }

        // Ownership check: the credential must own the source vault's address.
        let owner = self.resolve_owner(credential)?;
        if owner != from_vault.address {
            return Err(LedgerError::Rejected("credential does not own vault".into()));
        }

        self.debit(&from_vault.address, amount_mist)?;
        self.credit(&to_vault.address, amount_mist);

        Ok(LedgerReceipt {
            reference: random_hex(32),
        })
    }

    async fn freeze(&self, vault_ref: &str) -> Result<(), LedgerError> {
        self.vaults
            .get_mut(vault_ref)
            .map(|mut v| v.frozen = true)
            .ok_or_else(|| LedgerError::Rejected(format!("unknown vault {vault_ref}")))
    }

    async fn unfreeze(&self, vault_ref: &str) -> Result<(), LedgerError> {
        self.vaults
            .get_mut(vault_ref)
            .map(|mut v| v.frozen = false)
            .ok_or_else(|| LedgerError::Rejected(format!("unknown vault {vault_ref}")))
    }

    async fn request_faucet(&self, address: &str, amount_mist: u64) -> Result<(), LedgerError> {
        self.credit(address, amount_mist);
        Ok(())
    }
}

/// `n` random bytes, hex-encoded.
fn random_hex(n: usize) -> String {
    let mut bytes = vec![0u8; n];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
