//! Transport and reader-lifecycle boundaries
//!
//! The session engine only ever talks to a card through these two traits.
//! [`crate::reader::PcscBackend`] implements them over PC/SC; tests plug in
//! in-memory doubles.

/// Failure below the APDU layer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("timed out waiting for the card")]
    Timeout,

    #[error("card was removed or reset")]
    CardLost,

    #[error("no card present")]
    NoCard,

    #[error("reader unavailable: {0}")]
    ReaderUnavailable(String),

    #[error("{0}")]
    Other(String),
}

/// A live connection to the card on one reader
pub trait Transport: Send {
    /// Send a command APDU and return the raw response, status word included.
    ///
    /// Blocking, one shot, no retries.
    fn transmit(&mut self, command: &[u8]) -> Result<Vec<u8>, TransportError>;
}

/// Reader enumeration and connection establishment
pub trait ReaderBackend: Send + Sync {
    type Connection: Transport;

    /// Names of the readers currently attached
    fn list_readers(&self) -> Result<Vec<String>, TransportError>;

    /// Connect to the card sitting on the named reader
    fn connect(&self, reader: &str) -> Result<Self::Connection, TransportError>;
}
