//! # Telemetry Hooks
//!
//! A narrow observer seam between the domain logic and whatever counts
//! things in production. The guard and the transfer engine report security
//! and settlement events through [`Telemetry`]; the gateway plugs its
//! Prometheus counters in behind it, and this crate stays free of any
//! metrics dependency.
//!
//! Every hook is a no-op by default, so library users and tests that don't
//! care pay nothing and wire nothing.

use std::sync::Arc;

/// Observer for security and transfer events. Implementations must be
/// cheap and non-blocking — these fire on hot paths and inside spawned
/// settlement tasks.
pub trait Telemetry: Send + Sync {
    /// A submitted PIN did not match the stored verifier.
    fn pin_failure(&self) {}
    /// An account crossed the failed-attempt threshold and locked.
    fn lockout(&self) {}
    /// A transfer was booked and its external call dispatched.
    fn transfer_initiated(&self) {}
    /// A dispatched transfer settled successfully.
    fn transfer_settled(&self) {}
    /// A dispatched transfer settled as failed.
    fn transfer_failed(&self) {}
}

/// The default sink: counts nothing, observes nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {}

/// Shared telemetry handle threaded through the guard and engine.
pub type SharedTelemetry = Arc<dyn Telemetry>;

#[cfg(test)]
mod tests {
    use super::*;
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

    #[test]
    fn default_hooks_are_noops() {
        // NoopTelemetry implements nothing and must still satisfy the trait.
        let sink: SharedTelemetry = Arc::new(NoopTelemetry);
        sink.pin_failure();
        sink.lockout();
        sink.transfer_initiated();
        sink.transfer_settled();
        sink.transfer_failed();
    }

    #[test]
    fn partial_implementations_only_see_their_events() {
        let sink = Arc::new(Counting::default());
        let shared: SharedTelemetry = Arc::clone(&sink) as SharedTelemetry;

        shared.pin_failure();
        shared.pin_failure();
        shared.lockout();
        shared.transfer_settled(); // default no-op

        assert_eq!(sink.failures.load(Ordering::Relaxed), 2);
        assert_eq!(sink.lockouts.load(Ordering::Relaxed), 1);
    }
}
