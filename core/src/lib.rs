// Copyright (c) 2026 SENTE Contributors. MIT License.
// See LICENSE for details.

//! # SENTE Core — USSD Wallet Library
//!
//! Everything the gateway binary needs to turn `*XXX#` keypresses on a
//! feature phone into custodial blockchain transfers. No smartphone, no app,
//! no seed phrase — the subscriber's phone number is the account and a
//! 4-digit PIN is the key to it.
//!
//! ## Architecture
//!
//! The modules mirror the actual concerns of a USSD money service:
//!
//! - **menu** — The USSD state machine: states, per-state input grammars,
//!   and the transition function that everything else exists to serve.
//! - **session** — Server-side conversation state and the idle sweeper.
//! - **dispatcher** — The load → step → commit cycle driving one request.
//! - **account** — Subscriber records and the concurrent account store.
//! - **guard** — PIN verification and the three-strikes lockout.
//! - **custody** — Sealing wallet secrets under a PIN-derived key. The
//!   custodial part of "custodial wallet".
//! - **ledger** — The chain boundary: client trait, transfer engine,
//!   two-phase records, and the in-memory mock.
//! - **telemetry** — No-op-by-default hooks the binary's metrics plug into.
//! - **config** — Service constants and display helpers.
//! - **error** — One error taxonomy, split along the re-prompt/terminate
//!   axis the state machine cares about.
//!
//! ## Design Philosophy
//!
//! 1. A USSD reply never waits on the chain. Dispatch now, settle later.
//! 2. Raw secrets exist for as short a window as we can manage, and never
//!    in a log line.
//! 3. If it touches money, it has tests. Plural.

pub mod account;
pub mod config;
pub mod custody;
pub mod dispatcher;
pub mod error;
pub mod guard;
pub mod ledger;
pub mod menu;
pub mod session;
pub mod telemetry;
