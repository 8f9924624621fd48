//! In-memory MIFARE Classic 1K card behind a PC/SC-style reader
//!
//! Understands the five reader pseudo-APDUs the engine sends, enforces
//! key-A authentication per sector, and records every command. A transmit
//! that starts while another is still running sets the `overlap` flag.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use mifare_card::{ReaderBackend, Transport, TransportError};

pub const READER: &str = "Simulated PICC Reader 00";
pub const UID: [u8; 4] = [0x04, 0x11, 0x22, 0x33];

/// Trailer as shipped from the factory: FFFFFFFFFFFF FF078069 FFFFFFFFFFFF
pub const SHIPPED_TRAILER: [u8; 16] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x07, 0x80, 0x69, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF,
];

const OK: [u8; 2] = [0x90, 0x00];
const AUTH_FAILED: [u8; 2] = [0x63, 0x00];
const NOT_AUTHENTICATED: [u8; 2] = [0x69, 0x82];
const MEMORY_FAILURE: [u8; 2] = [0x65, 0x81];
const UNKNOWN_INS: [u8; 2] = [0x6D, 0x00];

pub struct CardState {
    pub blocks: [[u8; 16]; 64],
    pub uid: Vec<u8>,
    pub present: bool,
    /// Commands in the order received
    pub log: Vec<Vec<u8>>,
    /// Refuse writes to this block with 6581
    pub fail_write_block: Option<u8>,
    /// Delay inside each transmit, widens the window for overlap detection
    pub latency: Duration,
    loaded_key: Option<[u8; 6]>,
    authenticated_sector: Option<u8>,
}

impl CardState {
    fn blank() -> Self {
        let mut blocks = [[0u8; 16]; 64];
        for sector in 0..16 {
            blocks[sector * 4 + 3] = SHIPPED_TRAILER;
        }
        Self {
            blocks,
            uid: UID.to_vec(),
            present: true,
            log: Vec::new(),
            fail_write_block: None,
            latency: Duration::ZERO,
            loaded_key: None,
            authenticated_sector: None,
        }
    }

    /// Instruction bytes of the logged commands
    pub fn instructions(&self) -> Vec<u8> {
        self.log.iter().map(|c| c[1]).collect()
    }

    fn respond(&mut self, command: &[u8]) -> Vec<u8> {
        self.log.push(command.to_vec());
        match (command[0], command[1]) {
            (0xFF, 0xCA) => [self.uid.as_slice(), OK.as_slice()].concat(),
            (0xFF, 0x82) => {
                let mut key = [0u8; 6];
                key.copy_from_slice(&command[5..11]);
                self.loaded_key = Some(key);
                OK.to_vec()
            }
            (0xFF, 0x86) => {
                let block = command[7] as usize;
                let mut key_a = [0u8; 6];
                key_a.copy_from_slice(&self.blocks[block / 4 * 4 + 3][..6]);
                let key_a_matches = command[8] == 0x60 && self.loaded_key == Some(key_a);
                if key_a_matches {
                    self.authenticated_sector = Some((block / 4) as u8);
                    OK.to_vec()
                } else {
                    self.authenticated_sector = None;
                    AUTH_FAILED.to_vec()
                }
            }
            (0xFF, 0xB0) => {
                let block = command[3];
                if self.authenticated_sector != Some(block / 4) {
                    return NOT_AUTHENTICATED.to_vec();
                }
                [self.blocks[block as usize].as_slice(), OK.as_slice()].concat()
            }
            (0xFF, 0xD6) => {
                let block = command[3];
                if self.authenticated_sector != Some(block / 4) {
                    return NOT_AUTHENTICATED.to_vec();
                }
                if self.fail_write_block == Some(block) {
                    return MEMORY_FAILURE.to_vec();
                }
                self.blocks[block as usize].copy_from_slice(&command[5..21]);
                OK.to_vec()
            }
            _ => UNKNOWN_INS.to_vec(),
        }
    }
}

/// Reader backend exposing one simulated card
#[derive(Clone)]
pub struct SimulatedReader {
    pub card: Arc<Mutex<CardState>>,
    pub overlap: Arc<AtomicBool>,
    busy: Arc<AtomicBool>,
}

impl SimulatedReader {
    pub fn new() -> Self {
        Self {
            card: Arc::new(Mutex::new(CardState::blank())),
            overlap: Arc::new(AtomicBool::new(false)),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_card<R>(&self, f: impl FnOnce(&mut CardState) -> R) -> R {
        f(&mut self.card.lock().unwrap())
    }
}

impl ReaderBackend for SimulatedReader {
    type Connection = SimulatedConnection;

    fn list_readers(&self) -> Result<Vec<String>, TransportError> {
        Ok(vec![READER.to_string()])
    }

    fn connect(&self, reader: &str) -> Result<SimulatedConnection, TransportError> {
        if reader != READER {
            return Err(TransportError::ReaderUnavailable(reader.to_string()));
        }
        if !self.card.lock().unwrap().present {
            return Err(TransportError::NoCard);
        }
        Ok(SimulatedConnection {
            reader: self.clone(),
        })
    }
}

pub struct SimulatedConnection {
    reader: SimulatedReader,
}

impl Transport for SimulatedConnection {
    fn transmit(&mut self, command: &[u8]) -> Result<Vec<u8>, TransportError> {
        if self.reader.busy.swap(true, Ordering::SeqCst) {
            self.reader.overlap.store(true, Ordering::SeqCst);
        }

        let latency = self.reader.card.lock().unwrap().latency;
        if !latency.is_zero() {
            thread::sleep(latency);
        }

        let response = {
            let mut card = self.reader.card.lock().unwrap();
            if card.present {
                Ok(card.respond(command))
            } else {
                Err(TransportError::CardLost)
            }
        };

        self.reader.busy.store(false, Ordering::SeqCst);
        response
    }
}
