//! # Custodial Credential Handling
//!
//! Subscribers on feature phones can't hold their own keys, so we do —
//! which makes this file the most dangerous one in the crate. The rules:
//!
//! - At rest, a wallet secret exists only as an AES-256-GCM blob
//!   (`nonce || ciphertext`, random 96-bit nonce — GCM is unforgiving about
//!   nonce reuse, so every seal draws a fresh one from the OS CSPRNG).
//! - The encryption key is derived from the gateway master key **plus the
//!   subscriber's number and PIN**. The PIN is part of the key derivation:
//!   without it, the gateway alone cannot open the blob.
//! - Decrypted material lives in a [`Credential`] that zeroizes its bytes
//!   on drop, so the secret is wiped on every exit path — success, failure,
//!   or panic unwind.
//!
//! Error variants are intentionally vague. The difference between "wrong
//! key" and "corrupted ciphertext" is none of an attacker's business.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// AES-256 key length in bytes.
const KEY_LENGTH: usize = 32;

/// AES-GCM nonce length. 96 bits, the standard size. Not 16. Not 8. Twelve.
const NONCE_LENGTH: usize = 12;

/// Domain separator for key-encryption-key derivation.
const KEK_DOMAIN: &[u8] = b"sente-credential-kek-v1";

/// Errors from sealing and opening credentials. Kept vague on purpose.
#[derive(Debug, Error)]
pub enum CustodyError {
    #[error("credential sealing failed")]
    SealFailed,

    #[error("credential unsealing failed -- wrong key material or corrupted blob")]
    OpenFailed,

    #[error("sealed blob too short: must be at least {NONCE_LENGTH} bytes")]
    BlobTooShort,

    #[error("invalid master key: expected {KEY_LENGTH} hex-encoded bytes")]
    InvalidMasterKey,
}

// ---------------------------------------------------------------------------
// Master Key
// ---------------------------------------------------------------------------

/// The gateway-wide custody master key. One per deployment, loaded from a
/// key file at startup. On its own it opens nothing — every per-account
/// key also folds in the subscriber's PIN.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey([u8; KEY_LENGTH]);

impl MasterKey {
    /// Generates a fresh random master key. Used by `init` when setting up
    /// a deployment.
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_LENGTH];
        rand::rngs::OsRng.fill_bytes(&mut key);
        Self(key)
    }

    /// Parses a hex-encoded master key (as written by `init`).
    pub fn from_hex(s: &str) -> Result<Self, CustodyError> {
        let bytes = hex::decode(s.trim()).map_err(|_| CustodyError::InvalidMasterKey)?;
        let key: [u8; KEY_LENGTH] = bytes
            .try_into()
            .map_err(|_| CustodyError::InvalidMasterKey)?;
        Ok(Self(key))
    }

    /// Hex encoding for the key file. Handle with the care you'd give the
    /// key itself.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Derives the per-account key-encryption-key from (master, msisdn, pin).
    fn derive_kek(&self, msisdn: &str, pin: &str) -> [u8; KEY_LENGTH] {
        let mut hasher = Sha256::new();
        hasher.update(KEK_DOMAIN);
        hasher.update([0u8]);
        hasher.update(self.0);
        hasher.update([0u8]);
        hasher.update(msisdn.as_bytes());
        hasher.update([0u8]);
        hasher.update(pin.as_bytes());
        hasher.finalize().into()
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // A Debug impl that prints key bytes is a log-file incident
        // waiting to happen.
        f.write_str("MasterKey(..)")
    }
}

// ---------------------------------------------------------------------------
// Credential
// ---------------------------------------------------------------------------

/// A decrypted wallet secret, alive only for the duration of one external
/// ledger call. The bytes are zeroized when this value drops.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Credential(Vec<u8>);

impl Credential {
    /// Borrows the secret bytes. Do not copy them anywhere that outlives
    /// this value.
    pub fn expose(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(..)")
    }
}

// ---------------------------------------------------------------------------
// Seal / Open
// ---------------------------------------------------------------------------

/// Seals a wallet secret for storage: AES-256-GCM under the KEK derived
/// from (master key, subscriber, PIN). Returns `nonce || ciphertext`.
pub fn seal_credential(
    master: &MasterKey,
    msisdn: &str,
    pin: &str,
    secret: &[u8],
) -> Result<Vec<u8>, CustodyError> {
    let mut kek = master.derive_kek(msisdn, pin);
    let cipher = Aes256Gcm::new_from_slice(&kek).map_err(|_| CustodyError::SealFailed)?;

    let mut nonce_bytes = [0u8; NONCE_LENGTH];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, secret)
        .map_err(|_| CustodyError::SealFailed)?;
    kek.zeroize();

    let mut out = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Opens a sealed credential. The same (master, msisdn, pin) triple used to
/// seal must be supplied, or authentication fails.
///
/// The returned [`Credential`] wipes itself on drop; keep its scope as
/// tight as the ledger call that needs it.
pub fn open_credential(
    master: &MasterKey,
    msisdn: &str,
    pin: &str,
    blob: &[u8],
) -> Result<Credential, CustodyError> {
    if blob.len() < NONCE_LENGTH {
        return Err(CustodyError::BlobTooShort);
    }

    let mut kek = master.derive_kek(msisdn, pin);
    let cipher = Aes256Gcm::new_from_slice(&kek).map_err(|_| CustodyError::OpenFailed)?;
    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LENGTH);

    let result = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| CustodyError::OpenFailed);
    kek.zeroize();

    result.map(Credential)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MSISDN: &str = "+256700000001";
    const PIN: &str = "1234";

    #[test]
    fn seal_open_roundtrip() {
        let master = MasterKey::generate();
        let secret = b"suiprivkey-material-0123456789ab";

        let blob = seal_credential(&master, MSISDN, PIN, secret).unwrap();
        let cred = open_credential(&master, MSISDN, PIN, &blob).unwrap();
        assert_eq!(cred.expose(), secret);
    }

    #[test]
    fn wrong_pin_fails_to_open() {
        let master = MasterKey::generate();
        let blob = seal_credential(&master, MSISDN, PIN, b"secret").unwrap();
        assert!(open_credential(&master, MSISDN, "4321", &blob).is_err());
    }

    #[test]
    fn wrong_subscriber_fails_to_open() {
        let master = MasterKey::generate();
        let blob = seal_credential(&master, MSISDN, PIN, b"secret").unwrap();
        assert!(open_credential(&master, "+256700000002", PIN, &blob).is_err());
    }

    #[test]
    fn wrong_master_key_fails_to_open() {
        let master = MasterKey::generate();
        let blob = seal_credential(&master, MSISDN, PIN, b"secret").unwrap();
        let other = MasterKey::generate();
        assert!(open_credential(&other, MSISDN, PIN, &blob).is_err());
    }

    #[test]
    fn tampered_blob_fails_to_open() {
        let master = MasterKey::generate();
        let mut blob = seal_credential(&master, MSISDN, PIN, b"secret").unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0xFF;
        assert!(open_credential(&master, MSISDN, PIN, &blob).is_err());
    }

    #[test]
    fn truncated_blob_rejected() {
        let master = MasterKey::generate();
        assert!(matches!(
            open_credential(&master, MSISDN, PIN, &[0u8; 4]),
            Err(CustodyError::BlobTooShort)
        ));
    }

    #[test]
    fn nonces_are_unique_per_seal() {
        // Same inputs twice must not reuse a nonce. If this fails, the RNG
        // is broken and we need to burn everything down.
        let master = MasterKey::generate();
        let a = seal_credential(&master, MSISDN, PIN, b"secret").unwrap();
        let b = seal_credential(&master, MSISDN, PIN, b"secret").unwrap();
        assert_ne!(&a[..NONCE_LENGTH], &b[..NONCE_LENGTH]);
    }

    #[test]
    fn master_key_hex_roundtrip() {
        let master = MasterKey::generate();
        let restored = MasterKey::from_hex(&master.to_hex()).unwrap();
        assert_eq!(master.0, restored.0);
    }

    #[test]
    fn master_key_rejects_garbage_hex() {
        assert!(MasterKey::from_hex("not-hex").is_err());
        assert!(MasterKey::from_hex("abcd").is_err()); // too short
    }

    #[test]
    fn debug_never_prints_key_material() {
        let master = MasterKey::generate();
        assert_eq!(format!("{master:?}"), "MasterKey(..)");

        let blob = seal_credential(&master, MSISDN, PIN, b"secret").unwrap();
        let cred = open_credential(&master, MSISDN, PIN, &blob).unwrap();
        assert_eq!(format!("{cred:?}"), "Credential(..)");
    }
}
