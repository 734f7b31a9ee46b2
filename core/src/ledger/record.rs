//! # Transfer Records
//!
//! Our local, append-only ledger of every transfer we dispatched to the
//! chain. A record is born `Pending` *before* the external call goes out and
//! receives exactly one terminal outcome afterwards — `Success` with the
//! chain's digest, or `Failed` with the captured reason. Records are never
//! deleted and never re-opened; settlement is idempotent, so a late or
//! duplicate completion is a logged no-op instead of a corrupted row.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

/// Lifecycle of a transfer record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferOutcome {
    /// Dispatched, external call not yet resolved.
    Pending,
    /// Chain accepted the transfer.
    Success,
    /// External call failed; `failure_reason` says why.
    Failed,
}

impl TransferOutcome {
    /// `true` for `Success` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransferOutcome::Pending)
    }
}

/// One dispatched transfer.
#[derive(Debug, Clone, Serialize)]
pub struct TransferRecord {
    /// Unique record id, minted locally.
    pub id: Uuid,
    /// Sending subscriber.
    pub sender: String,
    /// Receiving subscriber.
    pub receiver: String,
    /// Amount in coins, as validated at dispatch time.
    pub amount: Decimal,
    /// Chain-side reference (transaction digest). `None` until settled
    /// successfully.
    pub external_ref: Option<String>,
    /// Current lifecycle state.
    pub outcome: TransferOutcome,
    /// Why the transfer failed, when it did.
    pub failure_reason: Option<String>,
    /// When the record was created (i.e. when dispatch was decided).
    pub created_at: DateTime<Utc>,
}

impl TransferRecord {
    /// Creates a new record in the `Pending` state.
    pub fn pending(sender: impl Into<String>, receiver: impl Into<String>, amount: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender: sender.into(),
            receiver: receiver.into(),
            amount,
            external_ref: None,
            outcome: TransferOutcome::Pending,
            failure_reason: None,
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Append-only store of transfer records with paginated per-subscriber
/// history. In-memory reference implementation of the storage
/// collaborator's transfer table.
#[derive(Debug, Default)]
pub struct TransferStore {
    records: RwLock<Vec<TransferRecord>>,
}

impl TransferStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a freshly created record. Must be called before the external
    /// transfer call is dispatched.
    pub fn insert(&self, record: TransferRecord) {
        self.records.write().push(record);
    }

    /// Fetches a copy of a record by id.
    pub fn get(&self, id: Uuid) -> Option<TransferRecord> {
        self.records.read().iter().find(|r| r.id == id).cloned()
    }

    /// Applies a terminal outcome to a record, at most once.
    ///
    /// Returns `true` if the settlement was applied, `false` if the record
    /// is unknown or already terminal. The second terminal write being a
    /// no-op is what makes out-of-band completion safe to race.
    pub fn settle(
        &self,
        id: Uuid,
        outcome: TransferOutcome,
        external_ref: Option<String>,
        failure_reason: Option<String>,
    ) -> bool {
        debug_assert!(outcome.is_terminal(), "settle() takes terminal outcomes only");

        let mut records = self.records.write();
        let Some(record) = records.iter_mut().find(|r| r.id == id) else {
            tracing::warn!(%id, "settlement for unknown transfer record");
            return false;
        };
        if record.outcome.is_terminal() {
            tracing::debug!(%id, "duplicate settlement ignored");
            return false;
        }

        record.outcome = outcome;
        record.external_ref = external_ref;
        record.failure_reason = failure_reason;
        true
    }

    /// The subscriber's transfer history (sent and received), newest first,
    /// with `limit`/`offset` pagination.
    pub fn history_for(&self, msisdn: &str, limit: usize, offset: usize) -> Vec<TransferRecord> {
        self.records
            .read()
            .iter()
            .rev()
            .filter(|r| r.sender == msisdn || r.receiver == msisdn)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Total number of records (for metrics).
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// `true` if nothing has ever been dispatched.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(sender: &str, receiver: &str) -> TransferRecord {
        TransferRecord::pending(sender, receiver, Decimal::ONE)
    }

    #[test]
    fn records_start_pending() {
        let r = record("+1", "+2");
        assert_eq!(r.outcome, TransferOutcome::Pending);
        assert!(r.external_ref.is_none());
        assert!(r.failure_reason.is_none());
    }

    #[test]
    fn settle_success_applies_once() {
        let store = TransferStore::new();
        let r = record("+1", "+2");
        let id = r.id;
        store.insert(r);

        assert!(store.settle(id, TransferOutcome::Success, Some("digest1".into()), None));
        let settled = store.get(id).unwrap();
        assert_eq!(settled.outcome, TransferOutcome::Success);
        assert_eq!(settled.external_ref.as_deref(), Some("digest1"));

        // Second terminal write is a no-op, not a mutation.
        assert!(!store.settle(id, TransferOutcome::Failed, None, Some("late".into())));
        let still = store.get(id).unwrap();
        assert_eq!(still.outcome, TransferOutcome::Success);
        assert!(still.failure_reason.is_none());
    }

    #[test]
    fn settle_failed_captures_reason() {
        let store = TransferStore::new();
        let r = record("+1", "+2");
        let id = r.id;
        store.insert(r);

        assert!(store.settle(id, TransferOutcome::Failed, None, Some("rpc timeout".into())));
        let settled = store.get(id).unwrap();
        assert_eq!(settled.outcome, TransferOutcome::Failed);
        assert_eq!(settled.failure_reason.as_deref(), Some("rpc timeout"));
    }

    #[test]
    fn settle_unknown_record_is_noop() {
        let store = TransferStore::new();
        assert!(!store.settle(Uuid::new_v4(), TransferOutcome::Success, None, None));
    }

    #[test]
    fn history_is_newest_first_and_paginated() {
        let store = TransferStore::new();
        for i in 0..7 {
            let mut r = record("+1", "+2");
            r.amount = Decimal::from(i);
            store.insert(r);
        }
        // A row where +1 is the receiver also belongs to +1's history.
        store.insert(record("+3", "+1"));
        // And an unrelated row does not.
        store.insert(record("+8", "+9"));

        let page = store.history_for("+1", 3, 0);
        assert_eq!(page.len(), 3);
        assert_eq!(page[0].sender, "+3"); // newest

        let next = store.history_for("+1", 3, 3);
        assert_eq!(next.len(), 3);
        assert_eq!(next[0].amount, Decimal::from(4));

        let tail = store.history_for("+1", 10, 6);
        assert_eq!(tail.len(), 2);
    }
}
