use mifare_card::CardError;

use super::{open_session, ReaderOptions};

pub fn cmd_readers(opts: &ReaderOptions) -> Result<(), CardError> {
    let session = open_session(opts)?;
    let readers = session.list_readers()?;

    if readers.is_empty() {
        println!("No readers found");
        return Ok(());
    }
    for reader in &readers {
        let marker = if opts.reader.as_deref() == Some(reader.as_str()) {
            " (selected)"
        } else {
            ""
        };
        println!("{}{}", reader, marker);
    }
    Ok(())
}
