//! MIFARE Classic session engine
//!
//! One [`MifareSession`] owns the single connection to one physical reader.
//! Every operation that touches that connection, and every insert/remove
//! notification, runs under the same mutex, so at most one command/response
//! cycle is in flight against the reader at any time.
//!
//! Each sector operation authenticates the sector trailer in key-A mode
//! first. Nothing is cached between calls: every call authenticates again.

use std::sync::{Mutex, MutexGuard, PoisonError};

use mifare_common::{encode_text_block, format_hex, Block, Sector, SectorKey};
use tracing::{debug, info, warn};

use crate::access::{AccessOption, SectorTrailer};
use crate::apdu;
use crate::error::{CardError, Result};
use crate::issue::{compact_record, random_key, EncodedCard, KeyASource};
use crate::kdf::derive_key_a;
use crate::transport::{ReaderBackend, Transport, TransportError};

/// Session settings
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Reader to bind to; the first enumerated reader when `None`
    pub preferred_reader: Option<String>,
}

/// Observable state of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoReader,
    /// Reader present, no card
    ReaderIdle,
    /// A card was reported but the connection could not be established
    CardPresentDisconnected,
    CardPresentConnected,
}

/// Notifications from the reader monitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderEvent {
    ReaderFound(String),
    ReaderLost,
    CardInserted,
    CardRemoved,
}

enum Slot<C> {
    NoReader,
    Idle {
        reader: String,
    },
    Disconnected {
        reader: String,
    },
    Connected {
        reader: String,
        connection: C,
        uid: Option<String>,
    },
}

impl<C> Slot<C> {
    fn reader(&self) -> Option<&str> {
        match self {
            Slot::NoReader => None,
            Slot::Idle { reader }
            | Slot::Disconnected { reader }
            | Slot::Connected { reader, .. } => Some(reader),
        }
    }

    fn state(&self) -> SessionState {
        match self {
            Slot::NoReader => SessionState::NoReader,
            Slot::Idle { .. } => SessionState::ReaderIdle,
            Slot::Disconnected { .. } => SessionState::CardPresentDisconnected,
            Slot::Connected { .. } => SessionState::CardPresentConnected,
        }
    }

    /// Drop any connection and fall back to `Idle` on the same reader
    fn release(&mut self) {
        if let Some(reader) = self.reader().map(str::to_owned) {
            *self = Slot::Idle { reader };
        }
    }
}

/// Write a trailer on an already authenticated sector
fn commit_trailer<T: Transport + ?Sized>(
    card: &mut T,
    sector: Sector,
    trailer: &SectorTrailer,
) -> Result<()> {
    apdu::write_block(card, sector.trailer_block(), &trailer.to_block()).map_err(|e| {
        warn!(sector = %sector, error = %e, "Trailer write failed after authentication");
        CardError::IndeterminateTrailer {
            sector,
            reason: e.to_string(),
        }
    })
}

/// Forwards to the live connection and remembers whether the handle died
struct Exchange<'a, C> {
    inner: &'a mut C,
    /// First failure that invalidates the connection
    lost: Option<TransportError>,
}

impl<C: Transport> Transport for Exchange<'_, C> {
    fn transmit(&mut self, command: &[u8]) -> std::result::Result<Vec<u8>, TransportError> {
        let result = self.inner.transmit(command);
        if let Err(
            e @ (TransportError::CardLost
            | TransportError::NoCard
            | TransportError::ReaderUnavailable(_)),
        ) = &result
        {
            self.lost.get_or_insert_with(|| e.clone());
        }
        result
    }
}

/// The single active session against one reader
pub struct MifareSession<B: ReaderBackend> {
    backend: B,
    config: SessionConfig,
    slot: Mutex<Slot<B::Connection>>,
}

impl<B: ReaderBackend> MifareSession<B> {
    /// Create a session. No reader I/O happens until first use.
    pub fn new(backend: B, config: SessionConfig) -> Self {
        Self {
            backend,
            config,
            slot: Mutex::new(Slot::NoReader),
        }
    }

    // A panic in one operation must not wedge the session for later callers.
    fn lock(&self) -> MutexGuard<'_, Slot<B::Connection>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> SessionState {
        self.lock().state()
    }

    pub fn reader_name(&self) -> Option<String> {
        self.lock().reader().map(str::to_owned)
    }

    /// UID read when the current card was attached, if any
    pub fn current_uid(&self) -> Option<String> {
        match &*self.lock() {
            Slot::Connected { uid, .. } => uid.clone(),
            _ => None,
        }
    }

    pub fn list_readers(&self) -> Result<Vec<String>> {
        let _slot = self.lock();
        self.backend
            .list_readers()
            .map_err(|e| CardError::ReaderUnavailable(e.to_string()))
    }

    /// Whether the session's reader is still enumerated
    pub fn is_available(&self) -> bool {
        let slot = self.lock();
        let Some(reader) = slot.reader() else {
            return false;
        };
        match self.backend.list_readers() {
            Ok(readers) => readers.iter().any(|r| r == reader),
            Err(e) => {
                debug!(error = %e, "Reader enumeration failed");
                false
            }
        }
    }

    /// Bind to a reader if none is bound yet and return its name
    pub fn discover(&self) -> Result<String> {
        let mut slot = self.lock();
        if let Some(reader) = slot.reader() {
            return Ok(reader.to_owned());
        }
        let reader = self.pick_reader()?;
        info!(reader = %reader, "Reader available");
        *slot = Slot::Idle {
            reader: reader.clone(),
        };
        Ok(reader)
    }

    /// Apply a reader/card notification
    ///
    /// Returns the UID for a successful `CardInserted`. A failed attach leaves
    /// the session in [`SessionState::CardPresentDisconnected`].
    pub fn handle_event(&self, event: ReaderEvent) -> Result<Option<String>> {
        let mut slot = self.lock();
        match event {
            ReaderEvent::ReaderFound(name) => {
                match slot.reader() {
                    None => {
                        info!(reader = %name, "Reader available");
                        *slot = Slot::Idle { reader: name };
                    }
                    Some(current) if current != name => {
                        debug!(reader = %name, bound = %current, "Ignoring additional reader");
                    }
                    Some(_) => {}
                }
                Ok(None)
            }
            ReaderEvent::ReaderLost => {
                if let Some(reader) = slot.reader() {
                    info!(reader = %reader, "Reader lost");
                }
                *slot = Slot::NoReader;
                Ok(None)
            }
            ReaderEvent::CardRemoved => {
                if matches!(*slot, Slot::Connected { .. } | Slot::Disconnected { .. }) {
                    info!("Card removed");
                    slot.release();
                }
                Ok(None)
            }
            ReaderEvent::CardInserted => self.attach(&mut slot).map(Some),
        }
    }

    /// Read the UID of the card on the reader as uppercase hex
    pub fn get_uid(&self) -> Result<String> {
        let mut slot = self.lock();
        let uid = format_hex(&self.exchange(&mut slot, |card| apdu::get_uid(card))?);
        if let Slot::Connected { uid: current, .. } = &mut *slot {
            *current = Some(uid.clone());
        }
        Ok(uid)
    }

    /// Authenticate the sector with `auth_key` and read its first data block
    pub fn read_sector(&self, sector: Sector, auth_key: &SectorKey) -> Result<Block> {
        self.exchange(&mut self.lock(), |card| {
            apdu::authenticate(card, sector.trailer_block(), auth_key)?;
            apdu::read_block(card, sector.data_block())
        })
    }

    /// Write `text` to the sector's first data block, zero-padded to 16 bytes
    ///
    /// Text longer than 16 UTF-8 bytes is rejected before anything is sent.
    pub fn write_sector(&self, sector: Sector, auth_key: &SectorKey, text: &str) -> Result<()> {
        let block = encode_text_block(text)?;
        self.write_sector_bytes(sector, auth_key, &block)
    }

    /// Write a raw 16-byte block to the sector's first data block
    pub fn write_sector_bytes(
        &self,
        sector: Sector,
        auth_key: &SectorKey,
        block: &Block,
    ) -> Result<()> {
        self.exchange(&mut self.lock(), |card| {
            apdu::authenticate(card, sector.trailer_block(), auth_key)?;
            apdu::write_block(card, sector.data_block(), block)
        })
    }

    /// Replace the sector trailer with new keys and access conditions
    ///
    /// Authenticates with the current key, then writes the whole trailer.
    /// There is no rollback: a failed write after authentication is reported
    /// as [`CardError::IndeterminateTrailer`].
    pub fn change_keys(
        &self,
        sector: Sector,
        auth_key: &SectorKey,
        new_key_a: &SectorKey,
        new_key_b: &SectorKey,
        access: AccessOption,
    ) -> Result<()> {
        let trailer = SectorTrailer::new(*new_key_a, *new_key_b, access);
        self.write_trailer(sector, auth_key, &trailer)
    }

    /// Restore factory keys and access option 0 on the sector
    pub fn reset_sector(&self, sector: Sector, auth_key: &SectorKey) -> Result<()> {
        self.write_trailer(sector, auth_key, &SectorTrailer::factory())
    }

    fn write_trailer(
        &self,
        sector: Sector,
        auth_key: &SectorKey,
        trailer: &SectorTrailer,
    ) -> Result<()> {
        let result = self.exchange(&mut self.lock(), |card| {
            apdu::authenticate(card, sector.trailer_block(), auth_key)?;
            commit_trailer(card, sector, trailer)
        });
        if result.is_ok() {
            info!(sector = %sector, access = %trailer.access, "Sector trailer written");
        }
        result
    }

    /// Issue a card: write the compact record, then rotate both keys
    ///
    /// One authentication covers both writes. Key B is always random; Key A
    /// is random or derived from the card UID depending on `key_a`.
    pub fn encode_card(
        &self,
        uid: &str,
        last_digits: &str,
        sector: Sector,
        auth_key: &SectorKey,
        access: AccessOption,
        key_a: &KeyASource,
    ) -> Result<EncodedCard> {
        let record = compact_record(uid, last_digits)?;
        let block = encode_text_block(&record)?;
        let new_key_a = match key_a {
            KeyASource::Random => random_key(),
            KeyASource::Derived {
                master_secret,
                label,
            } => derive_key_a(uid, master_secret, label)?,
        };
        let trailer = SectorTrailer::new(new_key_a, random_key(), access);

        self.exchange(&mut self.lock(), |card| {
            apdu::authenticate(card, sector.trailer_block(), auth_key)?;
            apdu::write_block(card, sector.data_block(), &block)?;
            commit_trailer(card, sector, &trailer)
        })?;
        info!(sector = %sector, access = %access, "Card encoded");

        Ok(EncodedCard {
            record,
            key_a: trailer.key_a,
            key_b: trailer.key_b,
        })
    }

    fn pick_reader(&self) -> Result<String> {
        let readers = self
            .backend
            .list_readers()
            .map_err(|e| CardError::ReaderUnavailable(e.to_string()))?;
        match &self.config.preferred_reader {
            Some(name) => readers
                .into_iter()
                .find(|r| r == name)
                .ok_or_else(|| CardError::ReaderUnavailable(format!("reader {} not found", name))),
            None => readers
                .into_iter()
                .next()
                .ok_or_else(|| CardError::ReaderUnavailable("no readers available".into())),
        }
    }

    /// Connect afresh on card insertion and read the UID
    fn attach(&self, slot: &mut Slot<B::Connection>) -> Result<String> {
        let reader = match slot.reader() {
            Some(reader) => reader.to_owned(),
            None => self.pick_reader()?,
        };

        // Release any stale handle before reconnecting
        *slot = Slot::Disconnected {
            reader: reader.clone(),
        };
        match self.backend.connect(&reader) {
            Ok(connection) => {
                *slot = Slot::Connected {
                    reader,
                    connection,
                    uid: None,
                };
            }
            Err(e) => {
                warn!(reader = %reader, error = %e, "Card attach failed");
                return Err(CardError::ConnectFailure {
                    reader,
                    reason: e.to_string(),
                });
            }
        }

        let uid = format_hex(&self.exchange(slot, |card| apdu::get_uid(card))?);
        if let Slot::Connected { uid: current, .. } = slot {
            *current = Some(uid.clone());
        }
        info!(uid = %uid, "Card attached");
        Ok(uid)
    }

    /// Connect lazily if needed and hand out the live connection
    fn ensure_connected<'a>(
        &self,
        slot: &'a mut Slot<B::Connection>,
    ) -> Result<&'a mut B::Connection> {
        let reader = match &*slot {
            Slot::Connected { .. } => None,
            Slot::NoReader => Some(self.pick_reader()?),
            Slot::Idle { reader } | Slot::Disconnected { reader } => Some(reader.clone()),
        };

        if let Some(reader) = reader {
            match self.backend.connect(&reader) {
                Ok(connection) => {
                    info!(reader = %reader, "Card connected");
                    *slot = Slot::Connected {
                        reader,
                        connection,
                        uid: None,
                    };
                }
                Err(TransportError::ReaderUnavailable(reason)) => {
                    *slot = Slot::NoReader;
                    return Err(CardError::ReaderUnavailable(reason));
                }
                Err(e) => {
                    debug!(reader = %reader, error = %e, "Lazy connect failed");
                    *slot = match e {
                        TransportError::NoCard => Slot::Idle { reader },
                        _ => Slot::Disconnected { reader },
                    };
                    return Err(CardError::ReaderNotConnected(e.to_string()));
                }
            }
        }

        match slot {
            Slot::Connected { connection, .. } => Ok(connection),
            _ => Err(CardError::ReaderNotConnected(
                "connection not established".into(),
            )),
        }
    }

    /// Run one logical operation against the live connection
    ///
    /// If the transport reports the card gone, the connection is dropped so
    /// the next call reconnects. If the reader itself vanished, the session
    /// falls back to `NoReader` and a plain transmit error is reported as
    /// [`CardError::ReaderUnavailable`].
    fn exchange<R>(
        &self,
        slot: &mut Slot<B::Connection>,
        op: impl FnOnce(&mut Exchange<'_, B::Connection>) -> Result<R>,
    ) -> Result<R> {
        let connection = self.ensure_connected(slot)?;
        let mut exchange = Exchange {
            inner: connection,
            lost: None,
        };
        let result = op(&mut exchange);

        match exchange.lost {
            None => result,
            Some(TransportError::ReaderUnavailable(reason)) => {
                warn!(reason = %reason, "Reader lost during exchange");
                *slot = Slot::NoReader;
                match result {
                    Err(CardError::TransmitFailure(_)) => Err(CardError::ReaderUnavailable(reason)),
                    other => other,
                }
            }
            Some(e) => {
                warn!(error = %e, "Card lost during exchange, dropping connection");
                slot.release();
                result
            }
        }
    }
}
