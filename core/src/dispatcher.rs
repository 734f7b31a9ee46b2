//! # Request Dispatcher
//!
//! The glue between the webhook surface and the state machine: load the
//! session, extract the newest token from the aggregator's `*`-joined input
//! history, run one [`MenuMachine::step`], then commit or clear.
//!
//! The commit/clear decision is the session lifecycle in its entirety: a
//! `CON` reply writes the mutated session back (re-arming the idle clock), an
//! `END` reply deletes it, and an internal fault deletes it too — a session
//! that produced an impossible state is not one worth resuming.

use std::sync::Arc;

use crate::menu::machine::MenuMachine;
use crate::menu::UssdReply;
use crate::session::SessionStore;

/// Screen shown when a step hits an internal fault. The cause is logged;
/// the handset gets this and a fresh start on the next dial.
const FAULT_MSG: &str = "Something went wrong. Please dial again.";

/// Drives one USSD webhook request through the state machine.
pub struct Dispatcher {
    sessions: Arc<SessionStore>,
    machine: MenuMachine,
}

impl Dispatcher {
    /// Wires the dispatcher to its session store and machine.
    pub fn new(sessions: Arc<SessionStore>, machine: MenuMachine) -> Self {
        Self { sessions, machine }
    }

    /// The session store, shared with the sweeper and the metrics surface.
    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// The underlying machine, exposed for support tooling.
    pub fn machine(&self) -> &MenuMachine {
        &self.machine
    }

    /// Handles one webhook request and returns the rendered reply
    /// (`CON ...` / `END ...`).
    ///
    /// `raw_text` is the aggregator's accumulated input: every token the
    /// subscriber has entered this session, joined with `*`. Only the last
    /// token is news; the session remembers the rest.
    pub async fn handle(&self, msisdn: &str, raw_text: &str) -> String {
        let token = latest_token(raw_text);
        let mut session = self.sessions.get_or_create(msisdn);

        match self.machine.step(&mut session, token).await {
            Ok(reply) => {
                if reply.is_terminal() {
                    self.sessions.clear(msisdn);
                } else {
                    self.sessions.commit(session);
                }
                reply.render()
            }
            Err(e) => {
                tracing::error!(%msisdn, error = %e, "session aborted on internal fault");
                self.sessions.clear(msisdn);
                UssdReply::End(FAULT_MSG.into()).render()
            }
        }
    }
}

/// Extracts the newest input token from the `*`-joined history.
///
/// `""` → `""` (first dial), `"1"` → `"1"`, `"1*+2567..*0.5"` → `"0.5"`.
/// Tokens are trimmed; surrounding whitespace from aggregator quirks is not
/// the subscriber's problem.
fn latest_token(raw_text: &str) -> &str {
    raw_text.rsplit('*').next().unwrap_or("").trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountStore;
    use crate::custody::MasterKey;
    use crate::ledger::{LedgerClient, MockLedger, TransferStore};

    fn dispatcher() -> Dispatcher {
        let accounts = Arc::new(AccountStore::new());
        let ledger = Arc::new(MockLedger::new()) as Arc<dyn LedgerClient>;
        let records = Arc::new(TransferStore::new());
        let machine = MenuMachine::new(accounts, ledger, records, MasterKey::generate());
        Dispatcher::new(Arc::new(SessionStore::new()), machine)
    }

    #[test]
    fn latest_token_takes_the_tail() {
        assert_eq!(latest_token(""), "");
        assert_eq!(latest_token("1"), "1");
        assert_eq!(latest_token("1*+256700000002*0.5"), "0.5");
        assert_eq!(latest_token(" 1 * 2 "), "2");
    }

    #[tokio::test]
    async fn first_dial_creates_a_session_and_shows_the_menu() {
        let d = dispatcher();
        let reply = d.handle("+256700000001", "").await;

        assert!(reply.starts_with("CON "));
        assert_eq!(d.sessions().len(), 1);
    }

    #[tokio::test]
    async fn terminal_reply_clears_the_session() {
        let d = dispatcher();
        // Full registration: final reply is an END.
        for text in ["", "1", "1*Jane Doe", "1*Jane Doe*1234"] {
            d.handle("+256700000001", text).await;
        }
        let last = d.handle("+256700000001", "1*Jane Doe*1234*1234").await;

        assert!(last.starts_with("END "));
        assert!(d.sessions().is_empty());
    }

    #[tokio::test]
    async fn continue_reply_keeps_the_session() {
        let d = dispatcher();
        d.handle("+256700000001", "").await;
        let reply = d.handle("+256700000001", "1").await;

        assert!(reply.starts_with("CON "));
        assert_eq!(d.sessions().len(), 1);
    }
}
