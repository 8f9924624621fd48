//! Card issuing: compact identity record and fresh sector keys

use mifare_common::{InputError, SectorKey, BLOCK_SIZE, KEY_LEN};
use rand::RngCore;

/// Characters of the UID kept in the record
pub const UID_FIELD_LEN: usize = 11;
/// Trailing digits appended after the UID field
pub const LAST_DIGITS_LEN: usize = 5;

/// Where the new Key A comes from when a card is encoded
#[derive(Clone, Default)]
pub enum KeyASource {
    #[default]
    Random,
    /// HMAC-derived from the card UID, see [`crate::kdf`]
    Derived { master_secret: String, label: String },
}

/// Outcome of a successful encode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedCard {
    /// The 16-character record written to the data block
    pub record: String,
    pub key_a: SectorKey,
    pub key_b: SectorKey,
}

/// Build the 16-character record `uid[..11] ‖ last_digits`
///
/// A UID shorter than 11 characters is right-padded with `'0'`.
pub fn compact_record(uid: &str, last_digits: &str) -> Result<String, InputError> {
    if uid.is_empty() {
        return Err(InputError::EmptyUid);
    }
    if last_digits.chars().count() != LAST_DIGITS_LEN {
        return Err(InputError::Invalid(format!(
            "expected {} last digits, got {:?}",
            LAST_DIGITS_LEN, last_digits
        )));
    }

    let mut record: String = uid.chars().take(UID_FIELD_LEN).collect();
    let uid_chars = record.chars().count();
    record.extend(std::iter::repeat('0').take(UID_FIELD_LEN - uid_chars));
    record.push_str(last_digits);

    if record.len() > BLOCK_SIZE {
        return Err(InputError::PayloadTooLong(record.len()));
    }
    Ok(record)
}

/// Key from the OS-seeded thread RNG
pub fn random_key() -> SectorKey {
    let mut bytes = [0u8; KEY_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    SectorKey::new(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_uid_is_padded() {
        assert_eq!(compact_record("04112233", "12345").unwrap(), "0411223300012345");
    }

    #[test]
    fn test_long_uid_is_truncated() {
        assert_eq!(
            compact_record("04A1B2C3D4E5F6", "98765").unwrap(),
            "04A1B2C3D4E98765"
        );
    }

    #[test]
    fn test_exact_uid_kept() {
        assert_eq!(compact_record("ABCDEFGHIJK", "00001").unwrap(), "ABCDEFGHIJK00001");
    }

    #[test]
    fn test_last_digits_length() {
        assert!(matches!(
            compact_record("04112233", "1234"),
            Err(InputError::Invalid(_))
        ));
        assert!(matches!(
            compact_record("04112233", "123456"),
            Err(InputError::Invalid(_))
        ));
    }

    #[test]
    fn test_empty_uid() {
        assert_eq!(compact_record("", "12345"), Err(InputError::EmptyUid));
    }

    #[test]
    fn test_multibyte_record_too_long() {
        assert!(matches!(
            compact_record("ééééé", "12345"),
            Err(InputError::PayloadTooLong(_))
        ));
    }

    #[test]
    fn test_random_keys_differ() {
        assert_ne!(random_key(), random_key());
    }
}
