//! # Menu Transition Machine
//!
//! One request, one step: the dispatcher hands us the session and the newest
//! input token, and we return the next screen. Each state validates its
//! token against its own grammar, consults whichever collaborator the
//! protocol step requires, and either advances the session or re-prompts it.
//!
//! Propagation policy (spec'd in [`crate::error`]): validation and
//! authentication problems become `CON` re-prompts at the same state;
//! lockout, unknown recipients at terminal positions, insufficient funds and
//! external failures become `END` screens; only genuine internal faults
//! escape as `Err` — the dispatcher aborts the session for those.
//!
//! Nothing in this module awaits a transfer's settlement. The `SendPin`
//! success path books the transfer, fires the external call, and says
//! goodbye; the chain's answer lands on the [`TransferRecord`] later.

use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;

use super::input;
use super::{MenuState, UssdReply};
use crate::account::{Account, AccountStore};
use crate::config::{
    truncate_address, COIN_SYMBOL, HISTORY_PAGE_SIZE, WELCOME_FUNDING_SUI,
};
use crate::custody::{open_credential, seal_credential, MasterKey};
use crate::error::SenteError;
use crate::guard::{derive_pin_verifier, SecurityGuard};
use crate::ledger::{to_mist, LedgerClient, TransferEngine, TransferOutcome, TransferStore};
use crate::session::{FieldKey, Session};

/// Terminal screen for a locked account. Shown from any PIN state.
const LOCKED_MSG: &str =
    "Your account is locked after too many incorrect PIN attempts. Please contact support.";

/// Terminal screen when the ledger is unreachable or misbehaving. The real
/// cause goes to the logs, never to the handset.
const SERVICE_DOWN_MSG: &str = "Service temporarily unavailable. Please try again later.";

/// The USSD menu state machine and its collaborators.
pub struct MenuMachine {
    accounts: Arc<AccountStore>,
    guard: SecurityGuard,
    ledger: Arc<dyn LedgerClient>,
    engine: TransferEngine,
    master: MasterKey,
}

impl MenuMachine {
    /// Wires the machine to its collaborators.
    pub fn new(
        accounts: Arc<AccountStore>,
        ledger: Arc<dyn LedgerClient>,
        records: Arc<TransferStore>,
        master: MasterKey,
    ) -> Self {
        let guard = SecurityGuard::new(Arc::clone(&accounts));
        let engine = TransferEngine::new(Arc::clone(&ledger), records);
        Self {
            accounts,
            guard,
            ledger,
            engine,
            master,
        }
    }

    /// Routes guard and engine events (PIN failures, lockouts, transfer
    /// dispatch and settlement) to the given sink.
    pub fn with_telemetry(mut self, telemetry: crate::telemetry::SharedTelemetry) -> Self {
        self.guard = self.guard.with_telemetry(Arc::clone(&telemetry));
        self.engine = self.engine.with_telemetry(telemetry);
        self
    }

    /// The security guard, exposed for support tooling (lockout reset).
    pub fn guard(&self) -> &SecurityGuard {
        &self.guard
    }

    /// Runs one transition: `(state, token)` → next screen, mutating the
    /// session in place. `Err` means an internal fault; the caller must
    /// abort the session.
    pub async fn step(
        &self,
        session: &mut Session,
        token: &str,
    ) -> Result<UssdReply, SenteError> {
        match session.state {
            MenuState::MainMenu => self.on_main_menu(session, token).await,
            MenuState::RegisterName => self.on_register_name(session, token),
            MenuState::RegisterPin => self.on_register_pin(session, token),
            MenuState::RegisterConfirmPin => self.on_register_confirm(session, token).await,
            MenuState::SendRecipient => self.on_send_recipient(session, token),
            MenuState::SendAmount => self.on_send_amount(session, token),
            MenuState::SendPin => self.on_send_pin(session, token).await,
            MenuState::BalancePin => self.on_balance_pin(session, token).await,
            // Terminal state; a session here should already be gone. Render
            // the page again rather than guessing at intent.
            MenuState::HistoryDisplay => Ok(self.history_reply(&session.msisdn)),
        }
    }

    // -----------------------------------------------------------------------
    // Main menu
    // -----------------------------------------------------------------------

    async fn on_main_menu(
        &self,
        session: &mut Session,
        token: &str,
    ) -> Result<UssdReply, SenteError> {
        let account = self.accounts.get(&session.msisdn);

        // First dial of the session: just show the menu.
        if token.is_empty() {
            return Ok(UssdReply::Continue(main_screen(account.as_ref())));
        }

        match (&account, token) {
            (None, "1") => {
                session.state = MenuState::RegisterName;
                Ok(UssdReply::Continue("Enter your name:".into()))
            }
            (Some(_), "1") => {
                session.state = MenuState::SendRecipient;
                Ok(UssdReply::Continue("Enter recipient phone number:".into()))
            }
            (Some(_), "2") => {
                session.state = MenuState::BalancePin;
                Ok(UssdReply::Continue("Enter your PIN:".into()))
            }
            (Some(a), "3") => {
                session.state = MenuState::HistoryDisplay;
                Ok(self.history_reply(&a.msisdn))
            }
            _ => Ok(UssdReply::Continue(format!(
                "Invalid choice.\n{}",
                main_screen(account.as_ref())
            ))),
        }
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    fn on_register_name(
        &self,
        session: &mut Session,
        token: &str,
    ) -> Result<UssdReply, SenteError> {
        let name = match input::parse_name(token) {
            Ok(name) => name,
            Err(e) => return Ok(reprompt(&e, "Enter your name:")),
        };
        session.set_field(FieldKey::Name, name);
        session.state = MenuState::RegisterPin;
        Ok(UssdReply::Continue("Choose a 4-digit PIN:".into()))
    }

    fn on_register_pin(
        &self,
        session: &mut Session,
        token: &str,
    ) -> Result<UssdReply, SenteError> {
        let pin = match input::parse_pin(token) {
            Ok(pin) => pin,
            Err(e) => return Ok(reprompt(&e, "Choose a 4-digit PIN:")),
        };
        // The first entry lives only in session memory until confirmed.
        session.set_field(FieldKey::Pin, pin);
        session.state = MenuState::RegisterConfirmPin;
        Ok(UssdReply::Continue("Confirm your PIN:".into()))
    }

    async fn on_register_confirm(
        &self,
        session: &mut Session,
        token: &str,
    ) -> Result<UssdReply, SenteError> {
        let confirmation = match input::parse_pin(token) {
            Ok(pin) => pin,
            Err(e) => return Ok(reprompt(&e, "Confirm your PIN:")),
        };
        let first = session
            .field(FieldKey::Pin)
            .ok_or_else(|| SenteError::internal("confirm state without stored PIN"))?
            .to_string();

        if confirmation != first {
            // Discard the first entry entirely: the subscriber re-chooses,
            // not re-confirms.
            session.clear_field(FieldKey::Pin);
            session.state = MenuState::RegisterPin;
            return Ok(UssdReply::Continue(
                "PINs did not match. Choose a 4-digit PIN:".into(),
            ));
        }

        self.complete_registration(session, &first).await
    }

    async fn complete_registration(
        &self,
        session: &mut Session,
        pin: &str,
    ) -> Result<UssdReply, SenteError> {
        let name = session
            .field(FieldKey::Name)
            .ok_or_else(|| SenteError::internal("registration without stored name"))?
            .to_string();
        let msisdn = session.msisdn.clone();

        if self.accounts.exists(&msisdn) {
            return Ok(UssdReply::End("This number is already registered.".into()));
        }

        let wallet = match self.ledger.create_wallet().await {
            Ok(w) => w,
            Err(e) => {
                tracing::error!(%msisdn, error = %e, "wallet creation failed");
                return Ok(UssdReply::End(SERVICE_DOWN_MSG.into()));
            }
        };

        let sealed = seal_credential(&self.master, &msisdn, pin, &wallet.secret)
            .map_err(|e| SenteError::internal(format!("credential sealing: {e}")))?;
        let verifier = derive_pin_verifier(pin, &msisdn);
        let account = Account::new(&msisdn, &name, &wallet.address, sealed, verifier);
        let address = account.address.clone();

        if let Err(e) = self.accounts.create(account) {
            // Lost a race with a concurrent registration for the same number.
            tracing::warn!(%msisdn, error = %e, "registration race");
            return Ok(UssdReply::End("This number is already registered.".into()));
        }

        // Welcome funding is best-effort: the wallet exists either way.
        let funded = match self
            .ledger
            .request_faucet(&address, to_mist(WELCOME_FUNDING_SUI))
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(%msisdn, error = %e, "welcome funding failed");
                false
            }
        };

        tracing::info!(%msisdn, address = %truncate_address(&address), "subscriber registered");

        let body = if funded {
            format!(
                "Welcome {name}! Your wallet {} is ready and funded with {WELCOME_FUNDING_SUI} {COIN_SYMBOL}.",
                truncate_address(&address)
            )
        } else {
            format!(
                "Welcome {name}! Your wallet {} is ready.",
                truncate_address(&address)
            )
        };
        Ok(UssdReply::End(body))
    }

    // -----------------------------------------------------------------------
    // Send money
    // -----------------------------------------------------------------------

    fn on_send_recipient(
        &self,
        session: &mut Session,
        token: &str,
    ) -> Result<UssdReply, SenteError> {
        let recipient = match input::parse_msisdn(token) {
            Ok(r) => r,
            Err(e) => return Ok(reprompt(&e, "Enter recipient phone number:")),
        };

        if recipient == session.msisdn {
            return Ok(UssdReply::Continue(
                "You cannot send to yourself.\nEnter recipient phone number:".into(),
            ));
        }
        if !self.accounts.exists(&recipient) {
            return Ok(UssdReply::Continue(format!(
                "{recipient} is not registered.\nEnter recipient phone number:"
            )));
        }

        session.set_field(FieldKey::Recipient, recipient);
        session.state = MenuState::SendAmount;
        Ok(UssdReply::Continue(format!(
            "Enter amount in {COIN_SYMBOL}:"
        )))
    }

    fn on_send_amount(
        &self,
        session: &mut Session,
        token: &str,
    ) -> Result<UssdReply, SenteError> {
        let amount = match input::parse_amount(token) {
            Ok(a) => a,
            Err(e) => return Ok(reprompt(&e, &format!("Enter amount in {COIN_SYMBOL}:"))),
        };
        let recipient = session
            .field(FieldKey::Recipient)
            .ok_or_else(|| SenteError::internal("amount state without recipient"))?
            .to_string();

        session.set_field(FieldKey::Amount, amount.to_string());
        session.state = MenuState::SendPin;
        Ok(UssdReply::Continue(format!(
            "Enter your PIN to send {amount} {COIN_SYMBOL} to {recipient}:"
        )))
    }

    async fn on_send_pin(
        &self,
        session: &mut Session,
        token: &str,
    ) -> Result<UssdReply, SenteError> {
        let pin = match input::parse_pin(token) {
            Ok(p) => p,
            Err(e) => return Ok(reprompt(&e, "Enter your PIN to confirm:")),
        };
        if let Some(reply) = self.pin_gate(&session.msisdn, &pin, "Enter your PIN to confirm:")? {
            return Ok(reply);
        }

        let sender = self
            .accounts
            .get(&session.msisdn)
            .ok_or_else(|| SenteError::internal("verified PIN for missing account"))?;
        let recipient_msisdn = session
            .field(FieldKey::Recipient)
            .ok_or_else(|| SenteError::internal("send confirmation without recipient"))?;
        let receiver = self
            .accounts
            .get(recipient_msisdn)
            .ok_or_else(|| SenteError::internal("recipient vanished mid-flow"))?;
        let amount = session
            .field(FieldKey::Amount)
            .and_then(|a| Decimal::from_str(a).ok())
            .ok_or_else(|| SenteError::internal("send confirmation without amount"))?;

        // PIN just verified, so an unsealing failure is corruption, not a
        // typo — that's an internal fault.
        let credential = open_credential(
            &self.master,
            &sender.msisdn,
            &pin,
            &sender.encrypted_credential,
        )
        .map_err(|e| SenteError::internal(format!("credential unsealing: {e}")))?;

        match self.engine.initiate(&sender, &receiver, amount, credential).await {
            Ok(record) => Ok(UssdReply::End(format!(
                "Sending {amount} {COIN_SYMBOL} to {} ({}).\nRef {}. You will receive a confirmation shortly.",
                receiver.display_name,
                receiver.msisdn,
                short_ref(&record.id),
            ))),
            Err(SenteError::InsufficientFunds {
                available,
                requested,
            }) => Ok(UssdReply::End(format!(
                "Insufficient balance. Available: {available} {COIN_SYMBOL}, requested: {requested} {COIN_SYMBOL}."
            ))),
            Err(SenteError::External(e)) => {
                tracing::error!(msisdn = %sender.msisdn, error = %e, "transfer dispatch failed");
                Ok(UssdReply::End(SERVICE_DOWN_MSG.into()))
            }
            Err(other) => Err(other),
        }
    }

    // -----------------------------------------------------------------------
    // Balance
    // -----------------------------------------------------------------------

    async fn on_balance_pin(
        &self,
        session: &mut Session,
        token: &str,
    ) -> Result<UssdReply, SenteError> {
        let pin = match input::parse_pin(token) {
            Ok(p) => p,
            Err(e) => return Ok(reprompt(&e, "Enter your PIN:")),
        };
        if let Some(reply) = self.pin_gate(&session.msisdn, &pin, "Enter your PIN:")? {
            return Ok(reply);
        }

        let account = self
            .accounts
            .get(&session.msisdn)
            .ok_or_else(|| SenteError::internal("verified PIN for missing account"))?;

        match self.ledger.get_balance(&account.address).await {
            Ok(balance) => Ok(UssdReply::End(format!(
                "Balance: {balance} {COIN_SYMBOL}\nWallet: {}",
                truncate_address(&account.address)
            ))),
            Err(e) => {
                tracing::error!(msisdn = %account.msisdn, error = %e, "balance fetch failed");
                Ok(UssdReply::End(SERVICE_DOWN_MSG.into()))
            }
        }
    }

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    fn history_reply(&self, msisdn: &str) -> UssdReply {
        let rows = self
            .engine
            .records()
            .history_for(msisdn, HISTORY_PAGE_SIZE, 0);
        if rows.is_empty() {
            return UssdReply::End("No transactions yet.".into());
        }

        let mut body = String::from("Recent transactions:");
        for r in rows {
            let direction = if r.sender == msisdn {
                format!("To {}", r.receiver)
            } else {
                format!("From {}", r.sender)
            };
            let status = match r.outcome {
                TransferOutcome::Pending => "pending",
                TransferOutcome::Success => "ok",
                TransferOutcome::Failed => "failed",
            };
            body.push_str(&format!(
                "\n{direction}: {} {COIN_SYMBOL} ({status})",
                r.amount
            ));
        }
        UssdReply::End(body)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Runs the security guard for a PIN state. `Ok(None)` means verified;
    /// `Ok(Some(reply))` is the screen to send instead (re-prompt or
    /// lockout END).
    fn pin_gate(
        &self,
        msisdn: &str,
        pin: &str,
        prompt: &str,
    ) -> Result<Option<UssdReply>, SenteError> {
        match self.guard.verify(msisdn, pin) {
            Ok(()) => Ok(None),
            Err(e @ SenteError::Authentication { .. }) => Ok(Some(reprompt(&e, prompt))),
            Err(SenteError::Lockout) => Ok(Some(UssdReply::End(LOCKED_MSG.into()))),
            // A PIN state for an unregistered number is a routing bug.
            Err(SenteError::NotFound(m)) => {
                Err(SenteError::internal(format!("PIN check for unknown {m}")))
            }
            Err(other) => Err(other),
        }
    }
}

/// Root menu text, depending on registration status.
fn main_screen(account: Option<&Account>) -> String {
    match account {
        Some(a) => format!(
            "Hello {}.\n1. Send money\n2. Check balance\n3. Transactions",
            a.display_name
        ),
        None => "Welcome to SENTE.\n1. Create wallet".to_string(),
    }
}

/// Re-prompt screen: the error inline, then the state's prompt again.
fn reprompt(err: &SenteError, prompt: &str) -> UssdReply {
    UssdReply::Continue(format!("{err}\n{prompt}"))
}

/// Short human-pasteable form of a record id for the confirmation screen.
fn short_ref(id: &uuid::Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}
