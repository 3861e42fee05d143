//! Utility module
//!
//! This module provides common utilities and helper functions used
//! throughout the library.

use tracing::Level;

/// Converts a packed BCD byte (one decimal digit per nibble) to its value
pub fn bcd_to_dec(bcd: u8) -> u8 {
    (bcd >> 4) * 10 + (bcd & 0x0F)
}

/// Converts a value in 0..=99 to packed BCD
pub fn dec_to_bcd(dec: u8) -> u8 {
    ((dec / 10) << 4) | (dec % 10)
}

/// Installs a formatting subscriber at the given level
///
/// Returns false if a global subscriber was already installed, which
/// makes repeated calls (tests, embedding applications) harmless.
pub fn init_tracing(level: Level) -> bool {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(true)
        .try_init()
        .is_ok()
}

/// Formats bytes as grouped hex words for diagnostic logs
pub fn hex_words(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2 + bytes.len() / 4);
    for (i, chunk) in bytes.chunks(4).enumerate() {
        if i > 0 {
            out.push(' ');
        }
        for b in chunk {
            out.push_str(&format!("{:02X}", b));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bcd_conversion() {
        assert_eq!(bcd_to_dec(0x25), 25);
        assert_eq!(bcd_to_dec(0x59), 59);
        assert_eq!(dec_to_bcd(31), 0x31);

        for n in 0..=99u8 {
            assert_eq!(bcd_to_dec(dec_to_bcd(n)), n);
        }
    }

    #[test]
    fn test_hex_words() {
        assert_eq!(hex_words(&[0x24, 0x01, 0x00, 0xF6, 0xAB]), "240100F6 AB");
        assert_eq!(hex_words(&[]), "");
    }

    #[test]
    fn test_init_tracing_idempotent() {
        init_tracing(Level::DEBUG);
        assert!(!init_tracing(Level::DEBUG));
    }
}
