//! # Transfer Engine — Orchestration & Two-Phase Bookkeeping
//!
//! The engine is the only place a transfer is born. Its job, in order:
//!
//! 1. Re-validate the amount bounds and fetch a **fresh** balance — never a
//!    cached one; the subscriber may have spent money since the menu step
//!    that collected the amount.
//! 2. Create the `Pending` [`TransferRecord`] synchronously, before any
//!    chain traffic.
//! 3. Pick the route *per transfer*: both parties enhanced → the ledger's
//!    cheaper internal-transfer primitive; anyone plain → direct coin
//!    transfer. The choice is re-evaluated every time, never cached on a
//!    session, so a vault created mid-session is picked up by the very next
//!    send.
//! 4. Dispatch the external call on a background task and return. The USSD
//!    reply goes out the instant the transfer is dispatched; settlement is
//!    applied to the record out-of-band. Once dispatched there is no
//!    cancellation path — the chain doesn't take it back.
//!
//! A failure anywhere after step 2 settles the record as `Failed` with the
//! captured reason. The one gap we cannot close without a write-ahead
//! journal: a process crash between record creation and settlement leaves a
//! `Pending` row that a restart cannot resolve. That at-least-once window
//! is accepted and documented rather than papered over.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;

use super::client::{LedgerClient, LedgerError};
use super::record::{TransferOutcome, TransferRecord, TransferStore};
use crate::account::Account;
use crate::config::{MAX_AMOUNT, MIN_AMOUNT, MIST_PER_SUI};
use crate::custody::Credential;
use crate::error::SenteError;
use crate::telemetry::{NoopTelemetry, SharedTelemetry};

/// Converts a coin amount to integer mist with floor truncation. Fractions
/// of a mist never cross the external boundary.
pub fn to_mist(amount: Decimal) -> u64 {
    (amount * Decimal::from(MIST_PER_SUI))
        .floor()
        .to_u64()
        .unwrap_or(0)
}

/// How a given transfer will cross the chain. Recomputed per transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Route {
    /// Both parties hold vault references: contract-backed internal move.
    Internal { from_ref: String, to_ref: String },
    /// At least one party is a plain wallet: direct coin transfer.
    Direct { to_address: String },
}

fn route(sender: &Account, receiver: &Account) -> Route {
    match (&sender.vault_ref, &receiver.vault_ref) {
        (Some(from_ref), Some(to_ref)) => Route::Internal {
            from_ref: from_ref.clone(),
            to_ref: to_ref.clone(),
        },
        _ => Route::Direct {
            to_address: receiver.address.clone(),
        },
    }
}

/// Transfer orchestration over the external ledger.
pub struct TransferEngine {
    ledger: Arc<dyn LedgerClient>,
    records: Arc<TransferStore>,
    telemetry: SharedTelemetry,
}

impl TransferEngine {
    /// Creates an engine over the given chain client and record store.
    pub fn new(ledger: Arc<dyn LedgerClient>, records: Arc<TransferStore>) -> Self {
        Self {
            ledger,
            records,
            telemetry: Arc::new(NoopTelemetry),
        }
    }

    /// Routes dispatch and settlement events to the given sink.
    pub fn with_telemetry(mut self, telemetry: SharedTelemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// The record store, shared with the HTTP read surface.
    pub fn records(&self) -> &Arc<TransferStore> {
        &self.records
    }

    /// Validates, books, and dispatches a transfer.
    ///
    /// On success the returned record is `Pending` and the external call is
    /// in flight on a background task; the caller must not wait for it.
    /// Validation and balance failures return before any record exists.
    ///
    /// The `credential` moves into the dispatch task and is zeroized when
    /// the external call resolves, whatever the outcome.
    pub async fn initiate(
        &self,
        sender: &Account,
        receiver: &Account,
        amount: Decimal,
        credential: Credential,
    ) -> Result<TransferRecord, SenteError> {
        if amount < MIN_AMOUNT || amount > MAX_AMOUNT {
            return Err(SenteError::validation(format!(
                "amount {amount} outside [{MIN_AMOUNT}, {MAX_AMOUNT}]"
            )));
        }

        let available = self
            .ledger
            .get_balance(&sender.address)
            .await
            .map_err(|e| SenteError::External(e.to_string()))?;
        if available < amount {
            return Err(SenteError::InsufficientFunds {
                available,
                requested: amount,
            });
        }

        let record = TransferRecord::pending(&sender.msisdn, &receiver.msisdn, amount);
        self.records.insert(record.clone());

        let chosen = route(sender, receiver);
        tracing::info!(
            id = %record.id,
            sender = %sender.msisdn,
            receiver = %receiver.msisdn,
            %amount,
            internal = matches!(chosen, Route::Internal { .. }),
            "transfer dispatched"
        );

        self.telemetry.transfer_initiated();

        let ledger = Arc::clone(&self.ledger);
        let records = Arc::clone(&self.records);
        let telemetry = Arc::clone(&self.telemetry);
        let id = record.id;
        let amount_mist = to_mist(amount);
        tokio::spawn(async move {
            let result = match chosen {
                Route::Internal { from_ref, to_ref } => {
                    ledger
                        .internal_transfer(&from_ref, &to_ref, &credential, amount_mist)
                        .await
                }
                Route::Direct { to_address } => {
                    ledger.transfer(&credential, &to_address, amount_mist).await
                }
            };
            // Credential drops (and zeroizes) here on every path.
            drop(credential);

            match result {
                Ok(receipt) => {
                    records.settle(id, TransferOutcome::Success, Some(receipt.reference), None);
                    telemetry.transfer_settled();
                    tracing::info!(%id, "transfer settled");
                }
                Err(e) => {
                    let reason = match &e {
                        LedgerError::Rejected(r) | LedgerError::Unavailable(r) => r.clone(),
                    };
                    records.settle(id, TransferOutcome::Failed, None, Some(reason));
                    telemetry.transfer_failed();
                    tracing::warn!(%id, error = %e, "transfer failed");
                }
            }
        });

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custody::{open_credential, seal_credential, MasterKey};
    use crate::ledger::mock::MockLedger;
    use std::str::FromStr;
    use std::time::Duration;
    use uuid::Uuid;

    const PIN: &str = "1234";

    struct Harness {
        ledger: Arc<MockLedger>,
        records: Arc<TransferStore>,
        engine: TransferEngine,
        master: MasterKey,
    }

    impl Harness {
        fn new() -> Self {
            let ledger = Arc::new(MockLedger::new());
            let records = Arc::new(TransferStore::new());
            let engine = TransferEngine::new(
                Arc::clone(&ledger) as Arc<dyn LedgerClient>,
                Arc::clone(&records),
            );
            Self {
                ledger,
                records,
                engine,
                master: MasterKey::generate(),
            }
        }

        /// Registers a funded account the way production does: wallet from
        /// the ledger, secret sealed through custody.
        async fn account(&self, msisdn: &str, funding_mist: u64) -> Account {
            let wallet = self.ledger.create_wallet().await.unwrap();
            self.ledger
                .request_faucet(&wallet.address, funding_mist)
                .await
                .unwrap();
            let sealed = seal_credential(&self.master, msisdn, PIN, &wallet.secret).unwrap();
            Account::new(msisdn, "Tester", wallet.address, sealed, "verifier")
        }

        fn credential(&self, account: &Account) -> Credential {
            open_credential(&self.master, &account.msisdn, PIN, &account.encrypted_credential)
                .unwrap()
        }

        async fn wait_settled(&self, id: Uuid) -> TransferRecord {
            for _ in 0..200 {
                if let Some(r) = self.records.get(id) {
                    if r.outcome.is_terminal() {
                        return r;
                    }
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            panic!("transfer {id} never settled");
        }
    }

    #[test]
    fn to_mist_floors() {
        assert_eq!(to_mist(Decimal::ONE), 1_000_000_000);
        assert_eq!(to_mist(Decimal::from_str("1.9999999999").unwrap()), 1_999_999_999);
        assert_eq!(to_mist(Decimal::from_str("0.000001").unwrap()), 1_000);
        assert_eq!(to_mist(Decimal::from_str("0.0000000009").unwrap()), 0);
    }

    #[tokio::test]
    async fn successful_transfer_settles_with_digest() {
        let h = Harness::new();
        let sender = h.account("+1", 2_000_000_000).await;
        let receiver = h.account("+2", 0).await;
        let cred = h.credential(&sender);

        let record = h
            .engine
            .initiate(&sender, &receiver, Decimal::ONE, cred)
            .await
            .unwrap();
        assert_eq!(record.outcome, TransferOutcome::Pending);

        let settled = h.wait_settled(record.id).await;
        assert_eq!(settled.outcome, TransferOutcome::Success);
        assert!(settled.external_ref.is_some());
        assert_eq!(h.ledger.balance_mist(&receiver.address), 1_000_000_000);
    }

    #[tokio::test]
    async fn failed_external_call_settles_failed_with_reason() {
        let h = Harness::new();
        let sender = h.account("+1", 2_000_000_000).await;
        let receiver = h.account("+2", 0).await;
        let cred = h.credential(&sender);

        h.ledger.fail_next_transfer("rpc timeout");
        let record = h
            .engine
            .initiate(&sender, &receiver, Decimal::ONE, cred)
            .await
            .unwrap();

        let settled = h.wait_settled(record.id).await;
        assert_eq!(settled.outcome, TransferOutcome::Failed);
        assert_eq!(settled.failure_reason.as_deref(), Some("rpc timeout"));
        assert!(settled.external_ref.is_none());
    }

    #[tokio::test]
    async fn insufficient_balance_creates_no_record() {
        let h = Harness::new();
        let sender = h.account("+1", 500_000_000).await; // 0.5 coin
        let receiver = h.account("+2", 0).await;
        let cred = h.credential(&sender);

        let err = h
            .engine
            .initiate(&sender, &receiver, Decimal::ONE, cred)
            .await
            .unwrap_err();
        assert!(matches!(err, SenteError::InsufficientFunds { .. }));
        assert!(h.records.is_empty());
    }

    #[tokio::test]
    async fn out_of_bounds_amount_rejected_before_balance_check() {
        let h = Harness::new();
        let sender = h.account("+1", 0).await;
        let receiver = h.account("+2", 0).await;
        let cred = h.credential(&sender);

        let err = h
            .engine
            .initiate(&sender, &receiver, Decimal::from(2_000_000), cred)
            .await
            .unwrap_err();
        assert!(matches!(err, SenteError::Validation(_)));
        assert!(h.records.is_empty());
    }

    #[tokio::test]
    async fn telemetry_tracks_dispatch_and_both_settlement_outcomes() {
        use crate::telemetry::Telemetry;
        use std::sync::atomic::{AtomicUsize, Ordering};

        #[derive(Default)]
        struct Counting {
            initiated: AtomicUsize,
            settled: AtomicUsize,
            failed: AtomicUsize,
        }
        impl Telemetry for Counting {
            fn transfer_initiated(&self) {
                self.initiated.fetch_add(1, Ordering::Relaxed);
            }
            fn transfer_settled(&self) {
                self.settled.fetch_add(1, Ordering::Relaxed);
            }
            fn transfer_failed(&self) {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
        }

        let mut h = Harness::new();
        let sink = Arc::new(Counting::default());
        h.engine = TransferEngine::new(
            Arc::clone(&h.ledger) as Arc<dyn LedgerClient>,
            Arc::clone(&h.records),
        )
        .with_telemetry(Arc::clone(&sink) as _);

        let sender = h.account("+1", 4_000_000_000).await;
        let receiver = h.account("+2", 0).await;

        let cred = h.credential(&sender);
        let ok = h
            .engine
            .initiate(&sender, &receiver, Decimal::ONE, cred)
            .await
            .unwrap();
        h.wait_settled(ok.id).await;

        h.ledger.fail_next_transfer("rpc timeout");
        let cred = h.credential(&sender);
        let bad = h
            .engine
            .initiate(&sender, &receiver, Decimal::ONE, cred)
            .await
            .unwrap();
        h.wait_settled(bad.id).await;

        // A rejected initiation (insufficient funds) counts nothing.
        let cred = h.credential(&sender);
        let _ = h
            .engine
            .initiate(&sender, &receiver, Decimal::from(1_000), cred)
            .await
            .unwrap_err();

        assert_eq!(sink.initiated.load(Ordering::Relaxed), 2);
        assert_eq!(sink.settled.load(Ordering::Relaxed), 1);
        assert_eq!(sink.failed.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn both_vaults_take_the_internal_route() {
        let h = Harness::new();
        let mut sender = h.account("+1", 2_000_000_000).await;
        let mut receiver = h.account("+2", 0).await;
        sender.vault_ref = Some(h.ledger.create_vault(&sender.address));
        receiver.vault_ref = Some(h.ledger.create_vault(&receiver.address));
        let cred = h.credential(&sender);

        let record = h
            .engine
            .initiate(&sender, &receiver, Decimal::ONE, cred)
            .await
            .unwrap();
        let settled = h.wait_settled(record.id).await;
        assert_eq!(settled.outcome, TransferOutcome::Success);
        assert_eq!(h.ledger.balance_mist(&receiver.address), 1_000_000_000);
    }

    #[tokio::test]
    async fn one_plain_wallet_falls_back_to_direct() {
        let h = Harness::new();
        let mut sender = h.account("+1", 2_000_000_000).await;
        sender.vault_ref = Some(h.ledger.create_vault(&sender.address));
        let receiver = h.account("+2", 0).await; // no vault
        let cred = h.credential(&sender);

        let record = h
            .engine
            .initiate(&sender, &receiver, Decimal::ONE, cred)
            .await
            .unwrap();
        let settled = h.wait_settled(record.id).await;
        assert_eq!(settled.outcome, TransferOutcome::Success);
    }
}
