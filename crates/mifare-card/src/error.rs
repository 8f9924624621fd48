//! Error taxonomy for card operations
//!
//! Every failure maps to exactly one [`ErrorKind`]; branch on that rather
//! than on message text. No variant carries key material.

use mifare_common::{InputError, Sector};

use crate::apdu::StatusWord;
use crate::transport::TransportError;

/// Coarse failure class a caller can act on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed hex, wrong length, oversized payload. Nothing was sent.
    InvalidInput,
    /// No reader enumerated, or the named reader vanished
    ReaderUnavailable,
    /// Physical connect failed; re-present the card and retry
    ConnectFailure,
    /// Key load or authentication was refused by the card
    AuthenticationFailure,
    /// Short or garbled response, timeout, or card lost mid-exchange
    TransmitFailure,
    /// A data block write was refused
    WriteFailure,
    /// A trailer write failed after authentication; the live keys are unknown
    IndeterminateState,
}

#[derive(Debug, thiserror::Error)]
pub enum CardError {
    #[error(transparent)]
    InvalidInput(#[from] InputError),

    #[error("reader unavailable: {0}")]
    ReaderUnavailable(String),

    #[error("failed to connect to card on reader {reader}: {reason}")]
    ConnectFailure { reader: String, reason: String },

    #[error("reader not connected: {0}")]
    ReaderNotConnected(String),

    #[error("loading key into reader failed (SW {0})")]
    KeyLoadFailure(StatusWord),

    #[error("authentication of block {block} failed (SW {status})")]
    AuthenticationFailure { block: u8, status: StatusWord },

    #[error("transmit failed: {0}")]
    TransmitFailure(String),

    #[error("writing block {block} failed (SW {status})")]
    WriteFailure { block: u8, status: StatusWord },

    #[error(
        "sector {sector} trailer write failed after authentication ({reason}); \
         trailer state is indeterminate, re-authenticate with both the old and the \
         candidate keys before further use"
    )]
    IndeterminateTrailer { sector: Sector, reason: String },
}

impl CardError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CardError::InvalidInput(_) => ErrorKind::InvalidInput,
            CardError::ReaderUnavailable(_) => ErrorKind::ReaderUnavailable,
            CardError::ConnectFailure { .. } | CardError::ReaderNotConnected(_) => {
                ErrorKind::ConnectFailure
            }
            CardError::KeyLoadFailure(_) | CardError::AuthenticationFailure { .. } => {
                ErrorKind::AuthenticationFailure
            }
            CardError::TransmitFailure(_) => ErrorKind::TransmitFailure,
            CardError::WriteFailure { .. } => ErrorKind::WriteFailure,
            CardError::IndeterminateTrailer { .. } => ErrorKind::IndeterminateState,
        }
    }
}

impl From<TransportError> for CardError {
    fn from(err: TransportError) -> Self {
        CardError::TransmitFailure(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CardError>;
