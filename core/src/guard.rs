//! # Security Guard — PIN Verification & Lockout
//!
//! The guard owns two things: turning a raw PIN into a stored verifier, and
//! the failed-attempt counter that turns repeated mismatches into a lockout.
//!
//! ## Verifier derivation
//!
//! We never compare raw PINs and never store one. The verifier is a SHA-256
//! digest over a domain tag, the subscriber's number, and the PIN — the
//! number acts as a per-subscriber salt, so two subscribers with PIN `1234`
//! store different verifiers and a leaked table doesn't fall to a 10,000-row
//! rainbow lookup. The security boundary is the derivation plus the attempt
//! counter, not comparison timing: an attacker gets three guesses over a
//! telecom bearer channel, not a million over a LAN.
//!
//! ## Atomicity
//!
//! Increment and reset both run under the account map's entry lock
//! ([`AccountStore::with_mut`]). A USSD retry that lands twice counts twice.

use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::account::AccountStore;
use crate::config::MAX_FAILED_ATTEMPTS;
use crate::error::SenteError;
use crate::telemetry::{NoopTelemetry, SharedTelemetry};

/// Domain separator for verifier derivation. Changing this invalidates
/// every stored verifier, which is a full-population PIN reset.
const VERIFIER_DOMAIN: &[u8] = b"sente-pin-verifier-v1";

/// Derives the stored verifier for a (pin, subscriber) pair.
///
/// Deterministic on purpose — verification recomputes it and compares
/// digest strings.
pub fn derive_pin_verifier(pin: &str, msisdn: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(VERIFIER_DOMAIN);
    hasher.update([0u8]);
    hasher.update(msisdn.as_bytes());
    hasher.update([0u8]);
    hasher.update(pin.as_bytes());
    hex::encode(hasher.finalize())
}

/// PIN verification and lockout policy over the account store.
pub struct SecurityGuard {
    accounts: Arc<AccountStore>,
    telemetry: SharedTelemetry,
}

impl SecurityGuard {
    /// Creates a guard over the given account store. Security events go
    /// nowhere until [`with_telemetry`](Self::with_telemetry) says otherwise.
    pub fn new(accounts: Arc<AccountStore>) -> Self {
        Self {
            accounts,
            telemetry: Arc::new(NoopTelemetry),
        }
    }

    /// Routes PIN-failure and lockout events to the given sink.
    pub fn with_telemetry(mut self, telemetry: SharedTelemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Verifies a submitted PIN for a subscriber.
    ///
    /// - Locked account: [`SenteError::Lockout`], regardless of the PIN.
    ///   Lockout is sticky until [`reset_lockout`](Self::reset_lockout).
    /// - Mismatch: atomically increments the counter; returns
    ///   [`SenteError::Authentication`] with the remaining attempts, or
    ///   [`SenteError::Lockout`] when this miss was the last one.
    /// - Match: resets a nonzero counter to zero and returns `Ok(())`.
    pub fn verify(&self, msisdn: &str, submitted_pin: &str) -> Result<(), SenteError> {
        let expected = derive_pin_verifier(submitted_pin, msisdn);

        let outcome = self.accounts.with_mut(msisdn, |account| {
            if account.failed_attempts >= MAX_FAILED_ATTEMPTS {
                return Err(SenteError::Lockout);
            }
            if account.pin_verifier == expected {
                // Idempotent reset: already-zero stays zero.
                account.failed_attempts = 0;
                return Ok(());
            }
            account.failed_attempts += 1;
            self.telemetry.pin_failure();
            if account.failed_attempts >= MAX_FAILED_ATTEMPTS {
                tracing::warn!(msisdn, "account locked after repeated PIN failures");
                self.telemetry.lockout();
                Err(SenteError::Lockout)
            } else {
                Err(SenteError::Authentication {
                    remaining: MAX_FAILED_ATTEMPTS - account.failed_attempts,
                })
            }
        });

        outcome.unwrap_or_else(|| Err(SenteError::NotFound(msisdn.to_string())))
    }

    /// `true` if the account has exhausted its attempts. Unknown
    /// subscribers are not locked — they're unregistered.
    pub fn is_locked(&self, msisdn: &str) -> bool {
        self.accounts
            .get(msisdn)
            .map(|a| a.failed_attempts >= MAX_FAILED_ATTEMPTS)
            .unwrap_or(false)
    }

    /// Support intervention: zeroes the counter on a locked (or any)
    /// account. The only way back in after a lockout.
    pub fn reset_lockout(&self, msisdn: &str) -> Result<(), SenteError> {
        self.accounts
            .with_mut(msisdn, |a| a.failed_attempts = 0)
            .ok_or_else(|| SenteError::NotFound(msisdn.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Account;

    const MSISDN: &str = "+256700000001";

    fn guard_with_pin(pin: &str) -> SecurityGuard {
        let accounts = Arc::new(AccountStore::new());
        accounts
            .create(Account::new(
                MSISDN,
                "Jane",
                "0xabc",
                vec![0; 16],
                derive_pin_verifier(pin, MSISDN),
            ))
            .unwrap();
        SecurityGuard::new(accounts)
    }

    #[test]
    fn verifier_is_deterministic_and_salted() {
        let a = derive_pin_verifier("1234", "+256700000001");
        let b = derive_pin_verifier("1234", "+256700000001");
        assert_eq!(a, b);

        // Same PIN, different subscriber → different verifier.
        let c = derive_pin_verifier("1234", "+256700000002");
        assert_ne!(a, c);

        // The raw PIN never appears in the verifier.
        assert!(!a.contains("1234"));
    }

    #[test]
    fn correct_pin_verifies() {
        let guard = guard_with_pin("1234");
        assert!(guard.verify(MSISDN, "1234").is_ok());
        assert!(!guard.is_locked(MSISDN));
    }

    #[test]
    fn failures_increment_monotonically_until_lockout() {
        let guard = guard_with_pin("1234");

        match guard.verify(MSISDN, "0000") {
            Err(SenteError::Authentication { remaining }) => assert_eq!(remaining, 2),
            other => panic!("unexpected: {other:?}"),
        }
        match guard.verify(MSISDN, "0000") {
            Err(SenteError::Authentication { remaining }) => assert_eq!(remaining, 1),
            other => panic!("unexpected: {other:?}"),
        }
        // Third miss is the lockout itself.
        assert!(matches!(guard.verify(MSISDN, "0000"), Err(SenteError::Lockout)));
        assert!(guard.is_locked(MSISDN));
    }

    #[test]
    fn lockout_is_sticky_even_for_correct_pin() {
        let guard = guard_with_pin("1234");
        for _ in 0..3 {
            let _ = guard.verify(MSISDN, "0000");
        }
        assert!(matches!(guard.verify(MSISDN, "1234"), Err(SenteError::Lockout)));
        assert!(matches!(guard.verify(MSISDN, "0000"), Err(SenteError::Lockout)));
    }

    #[test]
    fn success_resets_nonzero_counter() {
        let guard = guard_with_pin("1234");
        let _ = guard.verify(MSISDN, "0000");
        let _ = guard.verify(MSISDN, "0000");

        assert!(guard.verify(MSISDN, "1234").is_ok());

        // Counter is back to zero: three fresh attempts before lockout.
        let _ = guard.verify(MSISDN, "0000");
        match guard.verify(MSISDN, "0000") {
            Err(SenteError::Authentication { remaining }) => assert_eq!(remaining, 1),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn reset_lockout_restores_access() {
        let guard = guard_with_pin("1234");
        for _ in 0..3 {
            let _ = guard.verify(MSISDN, "0000");
        }
        assert!(guard.is_locked(MSISDN));

        guard.reset_lockout(MSISDN).unwrap();
        assert!(!guard.is_locked(MSISDN));
        assert!(guard.verify(MSISDN, "1234").is_ok());
    }

    #[test]
    fn telemetry_counts_every_miss_and_the_lockout_once() {
        use crate::telemetry::Telemetry;
        use std::sync::atomic::{AtomicUsize, Ordering};

        #[derive(Default)]
        struct Counting {
            failures: AtomicUsize,
            lockouts: AtomicUsize,
        }
        impl Telemetry for Counting {
            fn pin_failure(&self) {
                self.failures.fetch_add(1, Ordering::Relaxed);
            }
            fn lockout(&self) {
                self.lockouts.fetch_add(1, Ordering::Relaxed);
            }
        }

        let sink = Arc::new(Counting::default());
        let guard = guard_with_pin("1234").with_telemetry(Arc::clone(&sink) as _);

        // Three misses: three failures, one lockout transition.
        for _ in 0..3 {
            let _ = guard.verify(MSISDN, "0000");
        }
        assert_eq!(sink.failures.load(Ordering::Relaxed), 3);
        assert_eq!(sink.lockouts.load(Ordering::Relaxed), 1);

        // Attempts against an already-locked account count nothing further.
        let _ = guard.verify(MSISDN, "0000");
        let _ = guard.verify(MSISDN, "1234");
        assert_eq!(sink.failures.load(Ordering::Relaxed), 3);
        assert_eq!(sink.lockouts.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn unknown_subscriber_is_not_found() {
        let guard = guard_with_pin("1234");
        assert!(matches!(
            guard.verify("+256700000099", "1234"),
            Err(SenteError::NotFound(_))
        ));
        assert!(!guard.is_locked("+256700000099"));
        assert!(matches!(
            guard.reset_lockout("+256700000099"),
            Err(SenteError::NotFound(_))
        ));
    }
}
