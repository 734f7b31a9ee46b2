//! # Ledger Client Boundary
//!
//! The trait every chain backend implements. The gateway only ever calls
//! outward through this seam; the chain never calls us. Amounts cross the
//! boundary as integer mist (1e9 minor units) — decimals stop at the trait.
//!
//! The external service performs its own ownership and frozen-state checks;
//! we surface whatever it rejects as [`LedgerError::Rejected`] and treat
//! transport-level trouble as [`LedgerError::Unavailable`]. Callers don't
//! get to distinguish further, because the chain doesn't let *us*
//! distinguish further.

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::custody::Credential;

/// Errors from the external ledger service.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The ledger processed the request and said no (insufficient gas,
    /// frozen object, ownership mismatch, ...).
    #[error("ledger rejected the operation: {0}")]
    Rejected(String),

    /// The ledger could not be reached or did not answer sensibly.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// A freshly created custodial wallet, straight from the ledger.
///
/// The `secret` is raw key material — seal it with [`crate::custody`]
/// immediately and drop this value.
pub struct NewWallet {
    /// On-chain address of the new wallet.
    pub address: String,
    /// Raw signing secret. Handle like the loaded weapon it is.
    pub secret: Vec<u8>,
}

/// Result of a successfully submitted transfer.
#[derive(Debug, Clone)]
pub struct LedgerReceipt {
    /// Chain-side reference (transaction digest) for the transfer.
    pub reference: String,
}

/// The external ledger service: balances, transfers, and wallet lifecycle.
///
/// Implementations must be safe to share across request handlers and the
/// settlement tasks ([`Send`] + [`Sync`], behind an `Arc`).
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Creates a new wallet and returns its address and signing secret.
    async fn create_wallet(&self) -> Result<NewWallet, LedgerError>;

    /// Fetches the live balance of an address, in coins.
    async fn get_balance(&self, address: &str) -> Result<Decimal, LedgerError>;

    /// Direct coin transfer, authorized by the sender's credential.
    async fn transfer(
        &self,
        credential: &Credential,
        to_address: &str,
        amount_mist: u64,
    ) -> Result<LedgerReceipt, LedgerError>;

    /// Contract-backed internal transfer between two enhanced wallets.
    /// Cheaper than [`transfer`](Self::transfer); requires both parties to
    /// hold a vault reference.
    async fn internal_transfer(
        &self,
        from_ref: &str,
        to_ref: &str,
        credential: &Credential,
        amount_mist: u64,
    ) -> Result<LedgerReceipt, LedgerError>;

    /// Freezes an enhanced wallet's balance object. Outgoing internal
    /// transfers from it fail until unfrozen.
    async fn freeze(&self, vault_ref: &str) -> Result<(), LedgerError>;

    /// Lifts a freeze.
    async fn unfreeze(&self, vault_ref: &str) -> Result<(), LedgerError>;

    /// Devnet faucet: credits an address from the network's tap. Used to
    /// fund freshly registered wallets so the first balance check isn't a
    /// zero.
    async fn request_faucet(&self, address: &str, amount_mist: u64) -> Result<(), LedgerError>;
}
