//! MIFARE Common - Shared value types and hex helpers for MIFARE Classic 1K
//!
//! Nothing in this crate touches a reader. It holds the sector/block
//! arithmetic, the 6-byte key type and the text conventions used at every
//! boundary: keys are 12 hex characters (case-insensitive on input,
//! uppercase on output) and UIDs are separator-free uppercase hex.

use std::fmt;
use std::str::FromStr;

/// Number of sectors on a MIFARE Classic 1K card
pub const SECTOR_COUNT: u8 = 16;

/// Blocks per sector; the last one is the sector trailer
pub const BLOCKS_PER_SECTOR: u8 = 4;

/// Size of one block in bytes
pub const BLOCK_SIZE: usize = 16;

/// Size of a Key A / Key B in bytes
pub const KEY_LEN: usize = 6;

/// One 16-byte block
pub type Block = [u8; BLOCK_SIZE];

/// Rejected caller input. Raised before anything is sent to a card.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("hex string has odd length ({0} characters)")]
    OddLength(usize),

    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("key must be 12 hex characters (6 bytes), got {0} characters")]
    KeyLength(usize),

    #[error("UID must not be empty")]
    EmptyUid,

    #[error("sector {0} is out of range (0-15)")]
    SectorOutOfRange(u32),

    #[error("access option {0} is out of range (0-7)")]
    AccessOptionOutOfRange(u32),

    #[error("text is too long: {0} UTF-8 bytes, maximum is 16")]
    PayloadTooLong(usize),

    #[error("{0}")]
    Invalid(String),
}

/// Decode a hex string (case-insensitive, surrounding whitespace ignored)
pub fn parse_hex(hex_str: &str) -> Result<Vec<u8>, InputError> {
    let trimmed = hex_str.trim();
    if trimmed.len() % 2 != 0 {
        return Err(InputError::OddLength(trimmed.len()));
    }
    hex::decode(trimmed).map_err(|e| InputError::InvalidHex(e.to_string()))
}

/// Decode a card UID given as hex
///
/// UIDs are variable length (4, 7 or 10 bytes in practice); only emptiness
/// and odd length are rejected here.
pub fn parse_uid_hex(uid_hex: &str) -> Result<Vec<u8>, InputError> {
    if uid_hex.trim().is_empty() {
        return Err(InputError::EmptyUid);
    }
    parse_hex(uid_hex)
}

/// Format bytes as uppercase hex without separators
pub fn format_hex(bytes: &[u8]) -> String {
    hex::encode_upper(bytes)
}

/// Encode text as a single data block
///
/// The text is UTF-8 encoded and right-padded with zero bytes to exactly
/// 16 bytes. More than 16 encoded bytes is an error; nothing is truncated.
pub fn encode_text_block(text: &str) -> Result<Block, InputError> {
    let bytes = text.as_bytes();
    if bytes.len() > BLOCK_SIZE {
        return Err(InputError::PayloadTooLong(bytes.len()));
    }
    let mut block = [0u8; BLOCK_SIZE];
    block[..bytes.len()].copy_from_slice(bytes);
    Ok(block)
}

/// Which of the two sector keys a key plays the role of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    A,
    B,
}

impl KeyType {
    /// Key type byte used in the reader's GENERAL AUTHENTICATE data field
    pub fn auth_code(self) -> u8 {
        match self {
            KeyType::A => 0x60,
            KeyType::B => 0x61,
        }
    }
}

/// A 6-byte MIFARE Classic sector key
///
/// `Debug` never prints the key bytes; use `Display` (uppercase hex) when
/// the key has to be shown to its owner.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SectorKey([u8; KEY_LEN]);

impl SectorKey {
    /// Transport key every blank card ships with
    pub const FACTORY_DEFAULT: SectorKey = SectorKey([0xFF; KEY_LEN]);

    pub const fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Build a key from a slice that must be exactly 6 bytes long
    pub fn from_slice(bytes: &[u8]) -> Result<Self, InputError> {
        let key: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| InputError::KeyLength(bytes.len() * 2))?;
        Ok(Self(key))
    }
}

impl FromStr for SectorKey {
    type Err = InputError;

    /// Parse 12 hex characters. `:` and space separators are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s.trim().chars().filter(|c| *c != ':' && *c != ' ').collect();
        if compact.len() % 2 != 0 {
            return Err(InputError::OddLength(compact.len()));
        }
        if compact.len() != KEY_LEN * 2 {
            return Err(InputError::KeyLength(compact.len()));
        }
        let bytes = parse_hex(&compact)?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Display for SectorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_hex(&self.0))
    }
}

impl fmt::Debug for SectorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SectorKey(..)")
    }
}

/// A validated sector number on a 1K card
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Sector(u8);

impl Sector {
    pub fn new(sector: u32) -> Result<Self, InputError> {
        if sector >= SECTOR_COUNT as u32 {
            return Err(InputError::SectorOutOfRange(sector));
        }
        Ok(Self(sector as u8))
    }

    pub fn index(self) -> u8 {
        self.0
    }

    /// First data block of the sector (absolute block number)
    pub fn data_block(self) -> u8 {
        self.0 * BLOCKS_PER_SECTOR
    }

    /// Sector trailer block (absolute block number)
    pub fn trailer_block(self) -> u8 {
        self.data_block() + BLOCKS_PER_SECTOR - 1
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
