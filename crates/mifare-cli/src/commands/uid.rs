use mifare_card::CardError;

use super::{open_session, ReaderOptions};

pub fn cmd_uid(opts: &ReaderOptions) -> Result<(), CardError> {
    let session = open_session(opts)?;
    println!("{}", session.get_uid()?);
    Ok(())
}
