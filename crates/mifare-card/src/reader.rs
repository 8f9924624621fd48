//! PC/SC card reader management

use std::ffi::CString;

use pcsc::{Card, Context, Protocols, Scope, ShareMode, MAX_BUFFER_SIZE};

use crate::transport::{ReaderBackend, Transport, TransportError};

/// Card reader wrapper for managing PC/SC connections
pub struct PcscBackend {
    context: Context,
    share_mode: ShareMode,
}

impl PcscBackend {
    /// Create a new backend by establishing a PC/SC context
    pub fn new() -> Result<Self, pcsc::Error> {
        let context = Context::establish(Scope::User)?;
        Ok(Self {
            context,
            share_mode: ShareMode::Shared,
        })
    }

    /// Use exclusive access instead of the default shared mode
    pub fn exclusive(mut self) -> Self {
        self.share_mode = ShareMode::Exclusive;
        self
    }
}

impl ReaderBackend for PcscBackend {
    type Connection = PcscConnection;

    fn list_readers(&self) -> Result<Vec<String>, TransportError> {
        let mut readers_buf = [0; 2048];
        match self.context.list_readers(&mut readers_buf) {
            Ok(readers) => Ok(readers
                .map(|r| r.to_string_lossy().into_owned())
                .collect()),
            Err(pcsc::Error::NoReadersAvailable) => Ok(Vec::new()),
            Err(e) => Err(map_error(e)),
        }
    }

    fn connect(&self, reader: &str) -> Result<PcscConnection, TransportError> {
        let name = CString::new(reader)
            .map_err(|_| TransportError::ReaderUnavailable(format!("invalid reader name {:?}", reader)))?;
        let card = self
            .context
            .connect(&name, self.share_mode, Protocols::ANY)
            .map_err(map_error)?;
        Ok(PcscConnection { card })
    }
}

/// A connected card
pub struct PcscConnection {
    card: Card,
}

impl Transport for PcscConnection {
    fn transmit(&mut self, command: &[u8]) -> Result<Vec<u8>, TransportError> {
        let mut rapdu_buf = [0; MAX_BUFFER_SIZE];
        let rapdu = self.card.transmit(command, &mut rapdu_buf).map_err(map_error)?;
        Ok(rapdu.to_vec())
    }
}

/// Sort PC/SC errors into the transport failure classes
pub fn map_error(err: pcsc::Error) -> TransportError {
    match err {
        pcsc::Error::Timeout => TransportError::Timeout,
        pcsc::Error::RemovedCard | pcsc::Error::ResetCard => TransportError::CardLost,
        pcsc::Error::NoSmartcard => TransportError::NoCard,
        pcsc::Error::UnknownReader
        | pcsc::Error::ReaderUnavailable
        | pcsc::Error::NoReadersAvailable
        | pcsc::Error::NoService
        | pcsc::Error::ServiceStopped => TransportError::ReaderUnavailable(err.to_string()),
        other => TransportError::Other(other.to_string()),
    }
}
