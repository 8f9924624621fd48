//! Per-card key derivation
//!
//! `KeyA = HMAC-SHA256(key = UTF8(master_secret), msg = UTF8(label) ‖ uid)[..6]`
//!
//! Backends issuing cards compute the same value independently, so the
//! UTF-8 encoding of the secret and the label-then-UID message order are
//! part of the contract.

use hmac::{Hmac, Mac};
use mifare_common::{parse_uid_hex, InputError, SectorKey, KEY_LEN};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Label used when the caller does not pick one
pub const DEFAULT_LABEL: &str = "KEYA";

/// Derive a card-specific key from raw UID bytes
pub fn derive_key(uid: &[u8], master_secret: &str, label: &str) -> Result<SectorKey, InputError> {
    if master_secret.is_empty() {
        return Err(InputError::Invalid("master secret must not be empty".into()));
    }

    let mut mac = HmacSha256::new_from_slice(master_secret.as_bytes())
        .map_err(|e| InputError::Invalid(e.to_string()))?;
    mac.update(label.as_bytes());
    mac.update(uid);
    let digest = mac.finalize().into_bytes();

    SectorKey::from_slice(&digest[..KEY_LEN])
}

/// Derive Key A for the card whose UID is given as hex
///
/// # Arguments
/// * `uid_hex` - UID as even-length hex, any case
/// * `master_secret` - shared secret, used as its UTF-8 bytes
/// * `label` - domain separation label, e.g. [`DEFAULT_LABEL`]
///
/// # Returns
/// The first 6 bytes of the digest. `Display` renders it as uppercase hex.
pub fn derive_key_a(uid_hex: &str, master_secret: &str, label: &str) -> Result<SectorKey, InputError> {
    let uid = parse_uid_hex(uid_hex)?;
    derive_key(&uid, master_secret, label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_vector() {
        // HMAC-SHA256(b"secret", b"KEYA" + 04 11 22 33), first 6 bytes
        let key = derive_key_a("04112233", "secret", "KEYA").unwrap();
        assert_eq!(key.to_string(), "530104A367AC");
    }

    #[test]
    fn test_utf8_secret_and_seven_byte_uid() {
        let key = derive_key_a("04A1B2C3D4E5F6", "clé-maître", DEFAULT_LABEL).unwrap();
        assert_eq!(key.to_string(), "BBC603D1BB51");
    }

    #[test]
    fn test_uid_case_insensitive() {
        let upper = derive_key_a("04A1B2C3D4E5F6", "secret", "KEYA").unwrap();
        let lower = derive_key_a("04a1b2c3d4e5f6", "secret", "KEYA").unwrap();
        assert_eq!(upper, lower);
    }

    #[test]
    fn test_each_input_changes_output() {
        let base = derive_key_a("04112233", "secret", "KEYA").unwrap();
        assert_eq!(base, derive_key_a("04112233", "secret", "KEYA").unwrap());

        let other_label = derive_key_a("04112233", "secret", "KEYB").unwrap();
        assert_eq!(other_label.to_string(), "FEBBC408FA92");
        assert_ne!(base, derive_key_a("04112234", "secret", "KEYA").unwrap());
        assert_ne!(base, derive_key_a("04112233", "Secret", "KEYA").unwrap());
    }

    #[test]
    fn test_rejects_bad_input() {
        assert_eq!(derive_key_a("0411223", "secret", "KEYA"), Err(InputError::OddLength(7)));
        assert_eq!(derive_key_a("", "secret", "KEYA"), Err(InputError::EmptyUid));
        assert!(matches!(
            derive_key_a("04112233", "", "KEYA"),
            Err(InputError::Invalid(_))
        ));
    }
}
