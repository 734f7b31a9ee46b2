//! # Input Grammars
//!
//! Each menu state expects exactly one kind of token, and each kind has its
//! own grammar. Everything a subscriber types arrives as an untrusted string
//! off a telecom bearer channel; these parsers are the only way raw input
//! becomes a typed value.
//!
//! A rejected token is a [`SenteError::Validation`] — the state machine
//! re-prompts, nothing advances, no counters move. Validation failures are
//! not security events.

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::config::{COIN_SYMBOL, MAX_AMOUNT, MIN_AMOUNT, PIN_LENGTH};
use crate::error::SenteError;

/// Parses a display name: letters, digits, and single spaces, at least two
/// characters after trimming. "Jane Doe" is fine; "J" and "💸" are not.
pub fn parse_name(raw: &str) -> Result<String, SenteError> {
    let name = raw.trim();
    if name.len() < 2 {
        return Err(SenteError::validation(
            "Name must be at least 2 characters",
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == ' ')
    {
        return Err(SenteError::validation(
            "Name may only contain letters, digits and spaces",
        ));
    }
    Ok(name.to_string())
}

/// Parses a PIN: exactly [`PIN_LENGTH`] ASCII digits, nothing else.
///
/// The returned value is still the raw PIN — callers hand it straight to the
/// security guard or custody layer and never store it.
pub fn parse_pin(raw: &str) -> Result<String, SenteError> {
    let pin = raw.trim();
    if pin.len() != PIN_LENGTH || !pin.chars().all(|c| c.is_ascii_digit()) {
        return Err(SenteError::validation(format!(
            "PIN must be exactly {PIN_LENGTH} digits"
        )));
    }
    Ok(pin.to_string())
}

/// Parses a subscriber phone number in E.164-like form: a leading `+`
/// followed by 8 to 15 digits. We normalize nothing beyond trimming — the
/// gateway delivers numbers in international format and the account table
/// is keyed on the exact string.
pub fn parse_msisdn(raw: &str) -> Result<String, SenteError> {
    let msisdn = raw.trim();
    let digits = match msisdn.strip_prefix('+') {
        Some(d) => d,
        None => {
            return Err(SenteError::validation(
                "Phone number must start with + and country code",
            ))
        }
    };
    if digits.len() < 8 || digits.len() > 15 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(SenteError::validation("Invalid phone number"));
    }
    Ok(msisdn.to_string())
}

/// Parses a transfer amount: a positive decimal within
/// `[MIN_AMOUNT, MAX_AMOUNT]`, both bounds inclusive.
pub fn parse_amount(raw: &str) -> Result<Decimal, SenteError> {
    let amount = Decimal::from_str(raw.trim())
        .map_err(|_| SenteError::validation("Enter a numeric amount, e.g. 1.5"))?;

    if amount <= Decimal::ZERO {
        return Err(SenteError::validation("Amount must be greater than zero"));
    }
    if amount < MIN_AMOUNT {
        return Err(SenteError::validation(format!(
            "Minimum amount is {MIN_AMOUNT} {COIN_SYMBOL}"
        )));
    }
    if amount > MAX_AMOUNT {
        return Err(SenteError::validation(format!(
            "Maximum amount is {MAX_AMOUNT} {COIN_SYMBOL}"
        )));
    }
    Ok(amount)
}
