use mifare_card::{AccessOption, CardError, KeyASource, Sector, SectorKey};

use super::derive_key::require_secret;
use super::{open_session, ReaderOptions};

/// Key A source for `encode --derive`
pub fn derived_source(secret: Option<String>, label: String) -> Result<KeyASource, CardError> {
    let master_secret = require_secret(secret.as_deref())?.to_string();
    Ok(KeyASource::Derived {
        master_secret,
        label,
    })
}

/// Issue the card on the reader
///
/// The record uses the UID read from the card. The new keys are printed
/// once and not stored anywhere else.
pub fn cmd_encode(
    opts: &ReaderOptions,
    sector: Sector,
    last_digits: &str,
    key: &SectorKey,
    access: AccessOption,
    key_a: &KeyASource,
) -> Result<(), CardError> {
    let session = open_session(opts)?;
    let uid = session.get_uid()?;
    let encoded = session.encode_card(&uid, last_digits, sector, key, access, key_a)?;

    println!("UID:         {}", uid);
    println!("Sector:      {}", sector);
    println!("Encoding:    {}", encoded.record);
    println!("Key A:       {}", encoded.key_a);
    println!("Key B:       {}", encoded.key_b);
    println!("Access:      option {}", access);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_source_requires_secret() {
        let err = derived_source(None, "KEYA".into()).err().unwrap();
        assert_eq!(err.kind(), mifare_card::ErrorKind::InvalidInput);

        let source = derived_source(Some("secret".into()), "KEYB".into()).unwrap();
        assert!(matches!(
            source,
            KeyASource::Derived { ref master_secret, ref label }
                if master_secret == "secret" && label == "KEYB"
        ));
    }
}
