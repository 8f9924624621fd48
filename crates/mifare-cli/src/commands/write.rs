use mifare_card::{CardError, Sector, SectorKey};

use super::{open_session, ReaderOptions};

pub fn cmd_write(
    opts: &ReaderOptions,
    sector: Sector,
    key: &SectorKey,
    text: &str,
) -> Result<(), CardError> {
    let session = open_session(opts)?;
    session.write_sector(sector, key, text)?;
    println!("Wrote {} bytes to sector {} block {}", text.len(), sector, sector.data_block());
    Ok(())
}
