//! # Ledger Module — External Chain Boundary & Transfer Bookkeeping
//!
//! Everything that touches the blockchain goes through here, and nothing
//! here pretends to *be* the blockchain. The split:
//!
//! - [`client`] — the [`client::LedgerClient`] trait: the six primitives the
//!   external ledger service offers (wallet creation, balance, two transfer
//!   flavors, freeze/unfreeze) plus a devnet faucet. The only shipped
//!   implementation is [`mock::MockLedger`].
//! - [`record`] — [`record::TransferRecord`]: our local, append-only ledger
//!   of what we *asked* the chain to do, and how it turned out.
//! - [`engine`] — [`engine::TransferEngine`]: the two-phase bookkeeping.
//!   Create a Pending record synchronously, dispatch the external call, and
//!   settle the record out-of-band when the call resolves. The USSD reply
//!   never waits for settlement.
//!
//! The invariant the whole module defends: every record starts Pending and
//! receives **exactly one** terminal outcome. An external call that blows up
//! still settles its record as Failed; a second settlement attempt is a
//! no-op.

pub mod client;
pub mod engine;
pub mod mock;
pub mod record;

pub use client::{LedgerClient, LedgerError, LedgerReceipt, NewWallet};
pub use engine::{to_mist, TransferEngine};
pub use mock::MockLedger;
pub use record::{TransferOutcome, TransferRecord, TransferStore};
