//! APDU (Application Protocol Data Unit) command handling
//!
//! MIFARE Classic cards are driven through the PC/SC pseudo-APDUs that
//! contactless readers expose under class byte `FF`. Each exchange here is a
//! single shot: a status word other than `9000` fails the call, nothing is
//! retried.

use std::fmt;

use mifare_common::{Block, KeyType, SectorKey, BLOCK_SIZE};
use tracing::debug;

use crate::error::{CardError, Result};
use crate::transport::Transport;

/// Two-byte command outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusWord {
    pub sw1: u8,
    pub sw2: u8,
}

impl StatusWord {
    pub const SUCCESS: StatusWord = StatusWord::new(0x90, 0x00);

    pub const fn new(sw1: u8, sw2: u8) -> Self {
        Self { sw1, sw2 }
    }

    pub fn is_success(&self) -> bool {
        *self == Self::SUCCESS
    }

    /// Get the full status word as a 16-bit value
    pub fn value(&self) -> u16 {
        ((self.sw1 as u16) << 8) | (self.sw2 as u16)
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}{:02X}", self.sw1, self.sw2)
    }
}

/// APDU response containing data and status word
#[derive(Debug, Clone)]
pub struct ApduResponse {
    /// Response data (without status word)
    pub data: Vec<u8>,
    pub status: StatusWord,
}

impl ApduResponse {
    /// Split a raw response into data and trailing status word
    pub fn parse(raw: &[u8]) -> Result<Self> {
        if raw.len() < 2 {
            return Err(CardError::TransmitFailure(format!(
                "response too short ({} bytes)",
                raw.len()
            )));
        }
        let (data, sw) = raw.split_at(raw.len() - 2);
        Ok(Self {
            data: data.to_vec(),
            status: StatusWord::new(sw[0], sw[1]),
        })
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Send an APDU command to the card and return the response
///
/// Only the 4-byte header is logged; command data may hold key bytes.
pub fn send_apdu<T: Transport + ?Sized>(transport: &mut T, apdu: &[u8]) -> Result<ApduResponse> {
    let header = hex::encode_upper(&apdu[..apdu.len().min(4)]);
    let raw = transport.transmit(apdu)?;
    let response = ApduResponse::parse(&raw);
    match &response {
        Ok(r) => debug!(%header, status = %r.status, len = r.data.len(), "APDU exchanged"),
        Err(e) => debug!(%header, error = %e, "APDU exchange failed"),
    }
    response
}

/// APDU command builder
#[derive(Debug, Clone)]
pub struct ApduCommand {
    cla: u8,
    ins: u8,
    p1: u8,
    p2: u8,
    data: Vec<u8>,
    le: Option<u8>,
}

impl ApduCommand {
    pub fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: Vec::new(),
            le: None,
        }
    }

    /// Set command data
    pub fn data(mut self, data: &[u8]) -> Self {
        self.data = data.to_vec();
        self
    }

    /// Set expected response length
    pub fn le(mut self, le: u8) -> Self {
        self.le = Some(le);
        self
    }

    /// Build the APDU command bytes
    pub fn build(&self) -> Vec<u8> {
        let mut apdu = vec![self.cla, self.ins, self.p1, self.p2];

        if !self.data.is_empty() {
            apdu.push(self.data.len() as u8);
            apdu.extend_from_slice(&self.data);
        }

        if let Some(le) = self.le {
            apdu.push(le);
        }

        apdu
    }

    /// Send this command to the card
    pub fn send<T: Transport + ?Sized>(&self, transport: &mut T) -> Result<ApduResponse> {
        send_apdu(transport, &self.build())
    }
}

/// PC/SC reader pseudo-APDUs for MIFARE Classic
pub mod commands {
    use super::ApduCommand;
    use mifare_common::{Block, KeyType, SectorKey};

    /// Class byte of reader-interpreted commands
    pub const CLA_READER: u8 = 0xFF;

    /// GET DATA (UID): `FF CA 00 00 00`
    pub fn get_uid() -> ApduCommand {
        ApduCommand::new(CLA_READER, 0xCA, 0x00, 0x00).le(0x00)
    }

    /// LOAD KEYS into volatile key slot 0: `FF 82 00 00 06 <key>`
    pub fn load_key(key: &SectorKey) -> ApduCommand {
        ApduCommand::new(CLA_READER, 0x82, 0x00, 0x00).data(key.as_bytes())
    }

    /// GENERAL AUTHENTICATE with key slot 0: `FF 86 00 00 05 01 00 <block> <type> 00`
    pub fn authenticate(block: u8, key_type: KeyType) -> ApduCommand {
        ApduCommand::new(CLA_READER, 0x86, 0x00, 0x00)
            .data(&[0x01, 0x00, block, key_type.auth_code(), 0x00])
    }

    /// READ BINARY of one block: `FF B0 00 <block> 10`
    pub fn read_block(block: u8) -> ApduCommand {
        ApduCommand::new(CLA_READER, 0xB0, 0x00, block).le(0x10)
    }

    /// UPDATE BINARY of one block: `FF D6 00 <block> 10 <payload>`
    pub fn write_block(block: u8, payload: &Block) -> ApduCommand {
        ApduCommand::new(CLA_READER, 0xD6, 0x00, block).data(payload)
    }
}

/// Read the card UID
pub fn get_uid<T: Transport + ?Sized>(transport: &mut T) -> Result<Vec<u8>> {
    let response = commands::get_uid().send(transport)?;
    if !response.is_success() {
        return Err(CardError::TransmitFailure(format!(
            "UID read returned SW {}",
            response.status
        )));
    }
    Ok(response.data)
}

/// Load a key into the reader's volatile key slot
pub fn load_key<T: Transport + ?Sized>(transport: &mut T, key: &SectorKey) -> Result<()> {
    let response = commands::load_key(key).send(transport)?;
    if !response.is_success() {
        return Err(CardError::KeyLoadFailure(response.status));
    }
    Ok(())
}

/// Load `key` and authenticate `block` with it in key-A mode
///
/// If the key load fails, no authenticate command is sent.
pub fn authenticate<T: Transport + ?Sized>(
    transport: &mut T,
    block: u8,
    key: &SectorKey,
) -> Result<()> {
    load_key(transport, key)?;
    let response = commands::authenticate(block, KeyType::A).send(transport)?;
    if !response.is_success() {
        return Err(CardError::AuthenticationFailure {
            block,
            status: response.status,
        });
    }
    Ok(())
}

/// Read one 16-byte block; the sector must already be authenticated
pub fn read_block<T: Transport + ?Sized>(transport: &mut T, block: u8) -> Result<Block> {
    let response = commands::read_block(block).send(transport)?;
    if !response.is_success() {
        return Err(CardError::TransmitFailure(format!(
            "read of block {} returned SW {}",
            block, response.status
        )));
    }
    <Block>::try_from(response.data.as_slice()).map_err(|_| {
        CardError::TransmitFailure(format!(
            "read of block {} returned {} bytes, expected {}",
            block,
            response.data.len(),
            BLOCK_SIZE
        ))
    })
}

/// Write one 16-byte block; the sector must already be authenticated
pub fn write_block<T: Transport + ?Sized>(
    transport: &mut T,
    block: u8,
    payload: &Block,
) -> Result<()> {
    let response = commands::write_block(block, payload).send(transport)?;
    if !response.is_success() {
        return Err(CardError::WriteFailure {
            block,
            status: response.status,
        });
    }
    Ok(())
}
