//! Block formatters for command output

use clap::ValueEnum;
use mifare_card::Block;

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatMode {
    /// Uppercase hex, no separators
    Hex,
    /// UTF-8 text with the zero padding removed
    Text,
    /// The 16 bytes unmodified
    Raw,
}

/// Render a block for display (`Raw` is written as bytes by the caller)
pub fn format_block(block: &Block, mode: FormatMode) -> String {
    match mode {
        FormatMode::Hex | FormatMode::Raw => hex::encode_upper(block),
        FormatMode::Text => block_text(block),
    }
}

/// Text stored in a block, up to the first zero byte
pub fn block_text(block: &Block) -> String {
    let end = block.iter().position(|&b| b == 0).unwrap_or(block.len());
    String::from_utf8_lossy(&block[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(text: &str) -> Block {
        let mut block = [0u8; 16];
        block[..text.len()].copy_from_slice(text.as_bytes());
        block
    }

    #[test]
    fn test_format_hex() {
        assert_eq!(
            format_block(&block("hi"), FormatMode::Hex),
            "68690000000000000000000000000000"
        );
    }

    #[test]
    fn test_format_text_strips_padding() {
        assert_eq!(format_block(&block("hello"), FormatMode::Text), "hello");
        assert_eq!(block_text(&block("0411223300012345")), "0411223300012345");
    }
}
