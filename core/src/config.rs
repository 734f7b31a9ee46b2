//! # Gateway Configuration & Constants
//!
//! Every magic number in SENTE lives here. If you're hardcoding a constant
//! somewhere else, you're doing it wrong and you owe the team coffee.
//!
//! Most of these values are part of the subscriber-facing contract: the PIN
//! policy, the amount bounds, the session timeout. Changing them after launch
//! changes what millions of feature phones see on their screens, so think
//! twice and read the support tickets first.

use rust_decimal::Decimal;
use std::time::Duration;

// ---------------------------------------------------------------------------
// PIN & Lockout Policy
// ---------------------------------------------------------------------------

/// A PIN is exactly four ASCII digits. Feature-phone keypads don't do
/// passphrases, and four digits typed over USSD is already an ergonomic
/// stretch for many subscribers.
pub const PIN_LENGTH: usize = 4;

/// Consecutive failed PIN attempts before the account locks. Three strikes.
/// Reaching this count disables authentication until support intervenes —
/// there is no cool-down timer, because the attacker with the stolen phone
/// has all the time in the world.
pub const MAX_FAILED_ATTEMPTS: u8 = 3;

// ---------------------------------------------------------------------------
// Amounts
// ---------------------------------------------------------------------------

/// Ticker shown to subscribers. One symbol, one currency — multi-currency
/// menus on a 160-character screen are a usability crime we decline to commit.
pub const COIN_SYMBOL: &str = "SUI";

/// Minor units per coin. The ledger speaks integers at 1e9 scale ("mist");
/// every amount crossing the external boundary is floored to this scale so we
/// never transmit fractional minor units.
pub const MIST_PER_SUI: u64 = 1_000_000_000;

/// Smallest transferable amount, in coins. One micro-coin (1,000 mist):
/// small enough for airtime-sized payments, large enough that the display
/// never has to render more than six decimal places.
pub const MIN_AMOUNT: Decimal = Decimal::from_parts(1, 0, 0, false, 6);

/// Largest transferable amount per transaction. A cap this size is not a
/// security boundary — it's a fat-finger boundary.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// Coins granted to a freshly registered wallet from the gateway treasury,
/// so the first thing a new subscriber sees is not a zero balance.
pub const WELCOME_FUNDING_SUI: Decimal = Decimal::from_parts(1, 0, 0, false, 0);

// ---------------------------------------------------------------------------
// Session Timing
// ---------------------------------------------------------------------------

/// Idle lifetime of a USSD session. Gateways typically kill the bearer
/// channel after 90-180 seconds; ten minutes on our side is generous slack
/// for retries while still bounding memory and preventing a stale half-typed
/// transfer from being resumed tomorrow.
pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// How often the background sweep evicts idle sessions. Runs on a fixed
/// interval, independent of request traffic.
pub const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

/// USSD responses render on screens that wrap at ~40 characters and truncate
/// somewhere around 160. Addresses are 66 hex characters; we show this many
/// from each end with an ellipsis in between.
pub const ADDRESS_DISPLAY_CHARS: usize = 6;

/// Transfer rows shown on the USSD history page. More than this and the
/// response body risks truncation on older handsets.
pub const HISTORY_PAGE_SIZE: usize = 5;

// ---------------------------------------------------------------------------
// Network Defaults
// ---------------------------------------------------------------------------

/// Default port for the HTTP surface (USSD webhook + read routes + metrics).
pub const DEFAULT_HTTP_PORT: u16 = 8642;

// ---------------------------------------------------------------------------
// Utility
// ---------------------------------------------------------------------------

/// Truncates a ledger address for display: `0x1a2b3c...d4e5f6`.
/// Short addresses (nothing to elide) are returned unchanged.
pub fn truncate_address(address: &str) -> String {
    let body = address.strip_prefix("0x").unwrap_or(address);
    if body.len() <= ADDRESS_DISPLAY_CHARS * 2 {
        return address.to_string();
    }
    format!(
        "0x{}...{}",
        &body[..ADDRESS_DISPLAY_CHARS],
        &body[body.len() - ADDRESS_DISPLAY_CHARS..]
    )
}
