//! # Error Taxonomy
//!
//! One enum for everything that can go wrong between a keypress on a feature
//! phone and a settled transfer. The variants split along the only axis the
//! state machine cares about: does this error **re-prompt** the current menu
//! step, or does it **terminate** the session?
//!
//! - Re-prompt: [`Validation`](SenteError::Validation) and
//!   [`Authentication`](SenteError::Authentication) — the subscriber gets
//!   another chance at the same state.
//! - Terminate: everything else. The session is cleared and the response is
//!   an `END`.
//!
//! Nothing in this enum is ever shown verbatim to a subscriber for the
//! terminal categories that might carry internals ([`External`](SenteError::External),
//! [`Internal`](SenteError::Internal)); the dispatcher logs the cause and
//! renders a generic message instead. Stack traces over USSD would be a
//! memorable user experience, but not the kind we're going for.

use rust_decimal::Decimal;
use thiserror::Error;

/// Everything that can fail in the core.
#[derive(Debug, Error)]
pub enum SenteError {
    /// Malformed input for the current menu state. Re-prompts the same
    /// state with the message inline; never touches the attempt counter.
    #[error("{0}")]
    Validation(String),

    /// PIN mismatch. The failed-attempt counter has already been
    /// incremented by the time this error exists; `remaining` is what the
    /// subscriber has left before lockout.
    #[error("incorrect PIN, {remaining} attempt(s) remaining")]
    Authentication {
        /// Attempts left before the account locks.
        remaining: u8,
    },

    /// The account has exhausted its PIN attempts. Terminal, and sticky:
    /// every subsequent authentication attempt fails with this, correct
    /// PIN or not, until support resets the counter.
    #[error("account is locked")]
    Lockout,

    /// No account exists for the given subscriber.
    #[error("no account found for {0}")]
    NotFound(String),

    /// The live ledger balance cannot cover the requested amount.
    #[error("insufficient balance: have {available}, need {requested}")]
    InsufficientFunds {
        /// Balance fetched from the ledger at decision time.
        available: Decimal,
        /// Amount the subscriber asked to send.
        requested: Decimal,
    },

    /// The external ledger call failed. The cause stays in the logs and on
    /// the transfer record; the subscriber sees a generic failure.
    #[error("ledger service error: {0}")]
    External(String),

    /// Anything unexpected: poisoned invariants, impossible states, bugs.
    /// Aborts the session.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SenteError {
    /// `true` if the state machine should re-prompt the current state
    /// rather than terminate the session.
    pub fn is_reprompt(&self) -> bool {
        matches!(
            self,
            SenteError::Validation(_) | SenteError::Authentication { .. }
        )
    }

    /// Shorthand for a validation error from anything displayable.
    pub fn validation(msg: impl Into<String>) -> Self {
        SenteError::Validation(msg.into())
    }

    /// Shorthand for an internal fault from anything displayable.
    pub fn internal(msg: impl Into<String>) -> Self {
        SenteError::Internal(msg.into())
    }
}
