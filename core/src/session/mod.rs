//! # Session Module
//!
//! USSD has no persistent connection — the gateway replays the subscriber's
//! accumulated input on every webhook call, and the bearer channel can drop
//! at any point without notice. We keep server-side state anyway (the
//! "stateful" form of the protocol), because re-parsing the `*`-joined
//! history on every request makes half-finished flows fragile against lost
//! or re-ordered history.
//!
//! A [`Session`] is the unit of that state: one per subscriber mid-flow,
//! created on the first dial, destroyed on a terminal reply or by the idle
//! sweep. The [`store::SessionStore`] owns all of them.

pub mod store;

pub use store::SessionStore;

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::menu::MenuState;

// ---------------------------------------------------------------------------
// Collected Fields
// ---------------------------------------------------------------------------

/// Keys for the values a flow collects across steps.
///
/// A typed key instead of free-form strings so a typo in one state can't
/// silently read another state's field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKey {
    /// Display name entered during registration.
    Name,
    /// First PIN entry during registration, held only until confirmation.
    /// Never persisted beyond the session.
    Pin,
    /// Recipient phone number in the send flow.
    Recipient,
    /// Amount (canonical decimal string) in the send flow.
    Amount,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One subscriber's in-flight USSD conversation.
///
/// Owned exclusively by the [`SessionStore`]; mutated only through the
/// dispatcher's load → step → commit cycle. The USSD gateway serializes
/// requests per subscriber, so a session never sees two concurrent writers —
/// but different subscribers' sessions are touched in parallel, which is why
/// the store is a concurrent map and not a plain `HashMap`.
#[derive(Debug, Clone)]
pub struct Session {
    /// The subscriber this session belongs to.
    pub msisdn: String,
    /// Current position in the menu tree.
    pub state: MenuState,
    /// Values collected so far. Each state appends its own field;
    /// transitions never retroactively edit earlier ones.
    fields: HashMap<FieldKey, String>,
    /// Last time this session saw a request. Drives idle eviction.
    pub last_activity: DateTime<Utc>,
}

impl Session {
    /// Creates a fresh session at the main menu.
    pub fn new(msisdn: impl Into<String>) -> Self {
        Self {
            msisdn: msisdn.into(),
            state: MenuState::MainMenu,
            fields: HashMap::new(),
            last_activity: Utc::now(),
        }
    }

    /// Stores a collected field for the current flow.
    pub fn set_field(&mut self, key: FieldKey, value: impl Into<String>) {
        self.fields.insert(key, value.into());
    }

    /// Reads a previously collected field.
    pub fn field(&self, key: FieldKey) -> Option<&str> {
        self.fields.get(&key).map(String::as_str)
    }

    /// Removes a collected field. Used when a flow has to discard input,
    /// e.g. a failed PIN confirmation throwing away the first entry.
    pub fn clear_field(&mut self, key: FieldKey) {
        self.fields.remove(&key);
    }

    /// Marks the session as active now.
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// `true` if the session has been idle past the given cutoff.
    pub fn is_idle_since(&self, cutoff: DateTime<Utc>) -> bool {
        self.last_activity < cutoff
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn new_session_starts_at_main_menu() {
        let s = Session::new("+256700000001");
        assert_eq!(s.state, MenuState::MainMenu);
        assert_eq!(s.field(FieldKey::Name), None);
    }

    #[test]
    fn fields_accumulate_without_clobbering() {
        let mut s = Session::new("+256700000001");
        s.set_field(FieldKey::Recipient, "+256700000002");
        s.set_field(FieldKey::Amount, "1.5");

        assert_eq!(s.field(FieldKey::Recipient), Some("+256700000002"));
        assert_eq!(s.field(FieldKey::Amount), Some("1.5"));
    }

    #[test]
    fn clear_field_discards_one_value() {
        let mut s = Session::new("+256700000001");
        s.set_field(FieldKey::Pin, "1234");
        s.set_field(FieldKey::Name, "Jane");
        s.clear_field(FieldKey::Pin);

        assert_eq!(s.field(FieldKey::Pin), None);
        assert_eq!(s.field(FieldKey::Name), Some("Jane"));
    }

    #[test]
    fn idle_detection_uses_cutoff() {
        let mut s = Session::new("+256700000001");
        s.last_activity = Utc::now() - Duration::minutes(11);

        let cutoff = Utc::now() - Duration::minutes(10);
        assert!(s.is_idle_since(cutoff));

        s.touch();
        assert!(!s.is_idle_since(cutoff));
    }
}
