use std::io::Write;

use mifare_card::{CardError, Sector, SectorKey};

use super::{open_session, ReaderOptions};
use crate::formatters::{format_block, FormatMode};

pub fn cmd_read(
    opts: &ReaderOptions,
    sector: Sector,
    key: &SectorKey,
    mode: FormatMode,
) -> Result<(), CardError> {
    let session = open_session(opts)?;
    let block = session.read_sector(sector, key)?;

    if mode == FormatMode::Raw {
        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(&block)
            .and_then(|_| stdout.flush())
            .map_err(|e| CardError::TransmitFailure(format!("writing to stdout: {}", e)))?;
    } else {
        println!("{}", format_block(&block, mode));
    }
    Ok(())
}
