//! MIFARE Card - MIFARE Classic 1K access-control protocol engine
//!
//! This crate talks to MIFARE Classic cards through PC/SC contactless
//! readers: UID read, sector read/write, key rotation with access-bit
//! encoding, card issuing, and deterministic per-card key derivation.

pub mod access;
pub mod apdu;
pub mod error;
pub mod issue;
pub mod kdf;
pub mod monitor;
pub mod reader;
pub mod session;
pub mod transport;

pub use access::{access_bits, AccessOption, SectorTrailer};
pub use error::{CardError, ErrorKind};
pub use issue::{compact_record, EncodedCard, KeyASource};
pub use kdf::{derive_key_a, DEFAULT_LABEL};
pub use monitor::{CardMonitor, MonitorEvent, MonitorHandle};
pub use reader::PcscBackend;
pub use session::{MifareSession, ReaderEvent, SessionConfig, SessionState};
pub use transport::{ReaderBackend, Transport, TransportError};

/// Re-export commonly used types
pub use mifare_common::{Block, InputError, KeyType, Sector, SectorKey};
pub use pcsc::Error as PcscError;
