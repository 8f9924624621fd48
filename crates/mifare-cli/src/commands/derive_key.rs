use mifare_card::{derive_key_a, CardError, InputError};

use super::{open_session, ReaderOptions};

/// Derive Key A for a UID, reading the UID from the card when none is given
pub fn cmd_derive_key(
    opts: &ReaderOptions,
    uid: Option<&str>,
    secret: Option<&str>,
    label: &str,
) -> Result<(), CardError> {
    let secret = require_secret(secret)?;
    let uid = match uid {
        Some(uid) => uid.to_string(),
        None => open_session(opts)?.get_uid()?,
    };

    let key = derive_key_a(&uid, secret, label)?;
    println!("UID:   {}", uid.to_uppercase());
    println!("Key A: {}", key);
    Ok(())
}

pub(crate) fn require_secret(secret: Option<&str>) -> Result<&str, InputError> {
    secret.ok_or_else(|| {
        InputError::Invalid("master secret required (--secret or MIFARE_MASTER_SECRET)".into())
    })
}
