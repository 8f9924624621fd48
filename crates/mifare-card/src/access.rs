//! Sector trailer access conditions
//!
//! A trailer is `KeyA(6) ‖ AccessBits(4) ‖ KeyB(6)`. The access field is
//! driven by a 3-bit option applied identically to the three data blocks of
//! the sector; the trailer's own condition bits are always `000`.
//!
//! Bytes 6-8 follow the standard MIFARE Classic layout (each C1/C2/C3
//! nibble stored once inverted and once plain). Byte 9 is not a free user
//! byte here: it is computed from the complements of bytes 6 and 7, and
//! cards already issued expect exactly that value.

use std::fmt;

use mifare_common::{Block, InputError, SectorKey, BLOCK_SIZE, KEY_LEN};

/// Access condition option, 0 through 7
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AccessOption(u8);

impl AccessOption {
    /// Option written by a sector reset
    pub const FACTORY: AccessOption = AccessOption(0);

    pub fn new(option: u32) -> Result<Self, InputError> {
        if option > 7 {
            return Err(InputError::AccessOptionOutOfRange(option));
        }
        Ok(Self(option as u8))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// (C1, C2, C3) taken MSB-first from the option
    pub fn condition_bits(self) -> [u8; 3] {
        [(self.0 >> 2) & 1, (self.0 >> 1) & 1, self.0 & 1]
    }
}

impl fmt::Display for AccessOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-group (C1, C2, C3) table
///
/// Groups 0-2 are the data blocks, group 3 the trailer.
pub fn condition_table(option: AccessOption) -> [[u8; 3]; 4] {
    let bits = option.condition_bits();
    [bits, bits, bits, [0, 0, 0]]
}

/// Encode the 4-byte access field (trailer bytes 6-9)
pub fn access_bits(option: AccessOption) -> [u8; 4] {
    let cfg = condition_table(option);

    // One nibble per condition bit, group 3 in the MSB
    let column = |bit: usize| -> u8 {
        (cfg[3][bit] << 3) | (cfg[2][bit] << 2) | (cfg[1][bit] << 1) | cfg[0][bit]
    };
    let c1 = column(0);
    let c2 = column(1);
    let c3 = column(2);

    let byte6 = ((!c2 & 0x0F) << 4) | (!c1 & 0x0F);
    let byte7 = (c1 << 4) | (!c3 & 0x0F);
    let byte8 = (c3 << 4) | (c2 & 0x0F);
    let byte9 = ((!byte6 & 0xF0) >> 4) | ((!byte7 & 0x0F) << 4);

    [byte6, byte7, byte8, byte9]
}

/// A complete sector trailer block
///
/// Trailers are only ever written whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorTrailer {
    pub key_a: SectorKey,
    pub access: AccessOption,
    pub key_b: SectorKey,
}

impl SectorTrailer {
    pub fn new(key_a: SectorKey, key_b: SectorKey, access: AccessOption) -> Self {
        Self {
            key_a,
            access,
            key_b,
        }
    }

    /// Transport configuration: both keys `FFFFFFFFFFFF`, option 0
    pub fn factory() -> Self {
        Self::new(
            SectorKey::FACTORY_DEFAULT,
            SectorKey::FACTORY_DEFAULT,
            AccessOption::FACTORY,
        )
    }

    pub fn to_block(&self) -> Block {
        let mut block = [0u8; BLOCK_SIZE];
        block[..KEY_LEN].copy_from_slice(self.key_a.as_bytes());
        block[KEY_LEN..KEY_LEN + 4].copy_from_slice(&access_bits(self.access));
        block[KEY_LEN + 4..].copy_from_slice(self.key_b.as_bytes());
        block
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(n: u32) -> AccessOption {
        AccessOption::new(n).unwrap()
    }

    #[test]
    fn test_factory_access_bits() {
        assert_eq!(access_bits(AccessOption::FACTORY), [0xFF, 0x0F, 0x00, 0x00]);
    }

    #[test]
    fn test_known_vectors() {
        let expected: [[u8; 4]; 8] = [
            [0xFF, 0x0F, 0x00, 0x00],
            [0xFF, 0x08, 0x70, 0x70],
            [0x8F, 0x0F, 0x07, 0x07],
            [0x8F, 0x08, 0x77, 0x77],
            [0xF8, 0x7F, 0x00, 0x00],
            [0xF8, 0x78, 0x70, 0x70],
            [0x88, 0x7F, 0x07, 0x07],
            [0x88, 0x78, 0x77, 0x77],
        ];
        for (n, bytes) in expected.iter().enumerate() {
            assert_eq!(&access_bits(option(n as u32)), bytes, "option {}", n);
        }
    }

    #[test]
    fn test_condition_table_groups() {
        for n in 0..8u32 {
            let table = condition_table(option(n));
            let bits = [((n >> 2) & 1) as u8, ((n >> 1) & 1) as u8, (n & 1) as u8];
            assert_eq!(table[0], bits);
            assert_eq!(table[1], bits);
            assert_eq!(table[2], bits);
            assert_eq!(table[3], [0, 0, 0]);
        }
    }

    #[test]
    fn test_inverted_nibbles_are_consistent() {
        for n in 0..8u32 {
            let [b6, b7, b8, _] = access_bits(option(n));
            // ~C1 | C1
            assert_eq!(b6 & 0x0F, !(b7 >> 4) & 0x0F);
            // ~C2 | C2
            assert_eq!(b6 >> 4, !b8 & 0x0F);
            // ~C3 | C3
            assert_eq!(b7 & 0x0F, !(b8 >> 4) & 0x0F);
            // Trailer group never set
            assert_eq!(b7 & 0x80, 0);
            assert_eq!(b8 & 0x88, 0);
        }
    }

    #[test]
    fn test_option_range() {
        assert!(AccessOption::new(7).is_ok());
        assert_eq!(AccessOption::new(8), Err(InputError::AccessOptionOutOfRange(8)));
    }

    #[test]
    fn test_trailer_layout() {
        let key_a: SectorKey = "A0A1A2A3A4A5".parse().unwrap();
        let key_b: SectorKey = "B0B1B2B3B4B5".parse().unwrap();
        let block = SectorTrailer::new(key_a, key_b, option(4)).to_block();
        assert_eq!(&block[..6], key_a.as_bytes());
        assert_eq!(&block[6..10], &[0xF8, 0x7F, 0x00, 0x00]);
        assert_eq!(&block[10..], key_b.as_bytes());
    }

    #[test]
    fn test_factory_trailer() {
        let block = SectorTrailer::factory().to_block();
        assert_eq!(
            block,
            [
                0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x0F, 0x00, 0x00, 0xFF, 0xFF, 0xFF,
                0xFF, 0xFF, 0xFF
            ]
        );
    }
}
