use mifare_card::{AccessOption, CardError, Sector, SectorKey};

use super::{open_session, ReaderOptions};

pub fn cmd_change_keys(
    opts: &ReaderOptions,
    sector: Sector,
    key: &SectorKey,
    new_key_a: &SectorKey,
    new_key_b: &SectorKey,
    access: AccessOption,
) -> Result<(), CardError> {
    let session = open_session(opts)?;
    session.change_keys(sector, key, new_key_a, new_key_b, access)?;

    println!("Sector {} trailer updated", sector);
    println!("  Key A:  {}", new_key_a);
    println!("  Key B:  {}", new_key_b);
    println!("  Access: option {}", access);
    Ok(())
}
