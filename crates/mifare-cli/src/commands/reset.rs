use mifare_card::{CardError, Sector, SectorKey};

use super::{open_session, ReaderOptions};

pub fn cmd_reset(opts: &ReaderOptions, sector: Sector, key: &SectorKey) -> Result<(), CardError> {
    let session = open_session(opts)?;
    session.reset_sector(sector, key)?;
    println!(
        "Sector {} reset to factory keys ({})",
        sector,
        SectorKey::FACTORY_DEFAULT
    );
    Ok(())
}
