pub mod change_keys;
pub mod derive_key;
pub mod encode;
pub mod read;
pub mod readers;
pub mod reset;
pub mod status;
pub mod uid;
pub mod watch;
pub mod write;

use mifare_card::{
    AccessOption, CardError, MifareSession, PcscBackend, Sector, SectorKey, SessionConfig,
};
use tracing::debug;

/// Reader selection shared by every subcommand
pub struct ReaderOptions {
    pub reader: Option<String>,
    pub exclusive: bool,
}

/// Establish a PC/SC context and build a session on it
pub(crate) fn open_session(opts: &ReaderOptions) -> Result<MifareSession<PcscBackend>, CardError> {
    let backend = PcscBackend::new()
        .map_err(|e| CardError::ReaderUnavailable(format!("failed to establish PC/SC context: {}", e)))?;
    let backend = if opts.exclusive {
        backend.exclusive()
    } else {
        backend
    };
    debug!(reader = ?opts.reader, exclusive = opts.exclusive, "Opening session");
    let config = SessionConfig {
        preferred_reader: opts.reader.clone(),
    };
    Ok(MifareSession::new(backend, config))
}

pub fn parse_sector(s: &str) -> Result<Sector, String> {
    let n: u32 = s.parse().map_err(|_| format!("not a sector number: {}", s))?;
    Sector::new(n).map_err(|e| e.to_string())
}

pub fn parse_key(s: &str) -> Result<SectorKey, String> {
    s.parse().map_err(|e: mifare_card::InputError| e.to_string())
}

pub fn parse_access(s: &str) -> Result<AccessOption, String> {
    let n: u32 = s.parse().map_err(|_| format!("not an access option: {}", s))?;
    AccessOption::new(n).map_err(|e| e.to_string())
}
