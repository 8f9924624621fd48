use mifare_card::{CardError, ErrorKind, SessionState};

use super::{open_session, ReaderOptions};

/// Report reader binding and whether a card answers
pub fn cmd_status(opts: &ReaderOptions) -> Result<(), CardError> {
    let session = open_session(opts)?;

    let reader = match session.discover() {
        Ok(reader) => reader,
        Err(err) if err.kind() == ErrorKind::ReaderUnavailable => {
            println!("State: {:?}", SessionState::NoReader);
            println!("Reader: none ({})", err);
            return Ok(());
        }
        Err(err) => return Err(err),
    };
    println!("Reader: {}", reader);
    println!("Available: {}", if session.is_available() { "yes" } else { "no" });

    match session.get_uid() {
        Ok(uid) => println!("Card: {}", uid),
        Err(err) => println!("Card: none ({})", err),
    }
    println!("State: {:?}", session.state());
    Ok(())
}
