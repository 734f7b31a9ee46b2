//! # Menu Module — USSD State Machine
//!
//! The USSD protocol is stateless request/response: every webhook call
//! carries the subscriber's number and their accumulated keypresses, and the
//! reply is a single screen of text prefixed with `CON` (keep the session
//! open, expect more input) or `END` (terminate). Anything resembling a
//! conversation has to be reconstructed server-side.
//!
//! This module owns that reconstruction:
//!
//! - [`MenuState`] — where the subscriber is in a flow.
//! - [`UssdReply`] — the screen we send back, and whether it closes the
//!   session.
//! - [`input`] — per-state grammars for the raw tokens.
//! - [`machine`] — the transition function itself, plus the side-effecting
//!   calls (account lookup, PIN check, balance fetch, transfer dispatch)
//!   the protocol forces into the same request.
//!
//! The transition function is the core of the whole gateway. Everything else
//! in this crate exists so that [`machine::MenuMachine::step`] can be written
//! as: validate the token, consult a collaborator, pick the next state,
//! render a screen.

pub mod input;
pub mod machine;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Menu States
// ---------------------------------------------------------------------------

/// Where a subscriber is within the menu tree.
///
/// `MainMenu` is both the entry state (a session is created in it) and the
/// state a completed or aborted flow conceptually returns to — in practice a
/// finished flow ends the session, and the next dial starts fresh at
/// `MainMenu`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MenuState {
    /// Root menu. Offers registration to new subscribers, the wallet menu
    /// to registered ones.
    MainMenu,
    /// Registration: waiting for a display name.
    RegisterName,
    /// Registration: waiting for the chosen PIN.
    RegisterPin,
    /// Registration: waiting for the PIN again. The first entry lives only
    /// in session memory until this state confirms it.
    RegisterConfirmPin,
    /// Send-money: waiting for the recipient's phone number.
    SendRecipient,
    /// Send-money: waiting for the amount.
    SendAmount,
    /// Send-money: waiting for the PIN that authorizes the transfer.
    SendPin,
    /// Balance check: waiting for the PIN.
    BalancePin,
    /// Transfer history page. Terminal — rendering it ends the session.
    HistoryDisplay,
}

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

/// A single USSD screen, plus the protocol's continue/terminate marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UssdReply {
    /// Keep the session open and wait for more input (`CON` prefix).
    Continue(String),
    /// Terminate the session (`END` prefix).
    End(String),
}

impl UssdReply {
    /// Renders the reply in wire format: `CON <body>` or `END <body>`.
    pub fn render(&self) -> String {
        match self {
            UssdReply::Continue(body) => format!("CON {body}"),
            UssdReply::End(body) => format!("END {body}"),
        }
    }

    /// `true` if this reply terminates the session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, UssdReply::End(_))
    }

    /// The display body without the protocol marker.
    pub fn body(&self) -> &str {
        match self {
            UssdReply::Continue(body) | UssdReply::End(body) => body,
        }
    }
}
