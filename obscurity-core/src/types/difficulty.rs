//! Grind difficulty.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_DIFFICULTY_BITS, MAX_DIFFICULTY_BITS, MIN_DIFFICULTY_BITS};
use crate::error::{ObscurityError, Result};

/// Number of leading public-key bits each ground key must match.
///
/// Always a multiple of 8 in `[16, 256]`, so every key carries a whole
/// number of payload bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Difficulty(u16);

impl Difficulty {
    /// Validates and wraps a difficulty in bits.
    pub fn new(bits: u16) -> Result<Self> {
        if bits % 8 != 0 || !(MIN_DIFFICULTY_BITS..=MAX_DIFFICULTY_BITS).contains(&bits) {
            return Err(ObscurityError::InvalidDifficulty(bits));
        }
        Ok(Self(bits))
    }

    /// Difficulty in bits.
    pub fn bits(self) -> u16 {
        self.0
    }

    /// Payload bytes carried per key.
    pub fn chunk_bytes(self) -> usize {
        usize::from(self.0 / 8)
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Self(DEFAULT_DIFFICULTY_BITS)
    }
}

impl TryFrom<u16> for Difficulty {
    type Error = ObscurityError;

    fn try_from(bits: u16) -> Result<Self> {
        Self::new(bits)
    }
}

impl From<Difficulty> for u16 {
    fn from(d: Difficulty) -> u16 {
        d.0
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bits", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case(16, 2)]
    #[test_case(24, 3)]
    #[test_case(32, 4)]
    #[test_case(64, 8)]
    #[test_case(256, 32)]
    fn test_valid_difficulty(bits: u16, chunk: usize) {
        let d = Difficulty::new(bits).unwrap();
        assert_eq!(d.bits(), bits);
        assert_eq!(d.chunk_bytes(), chunk);
    }

    #[test_case(0)]
    #[test_case(8)]
    #[test_case(20)]
    #[test_case(33)]
    #[test_case(264)]
    fn test_invalid_difficulty(bits: u16) {
        assert!(matches!(
            Difficulty::new(bits),
            Err(ObscurityError::InvalidDifficulty(b)) if b == bits
        ));
    }

    #[test]
    fn test_default_is_32_bits() {
        assert_eq!(Difficulty::default().bits(), 32);
    }

    #[test]
    fn test_serde_as_number() {
        let d = Difficulty::new(24).unwrap();
        assert_eq!(serde_json::to_string(&d).unwrap(), "24");
        let back: Difficulty = serde_json::from_str("24").unwrap();
        assert_eq!(back, d);
        assert!(serde_json::from_str::<Difficulty>("12").is_err());
    }

    proptest! {
        #[test]
        fn prop_accepts_exactly_whole_byte_widths(bits in 0u16..512) {
            let valid = bits % 8 == 0 && (16..=256).contains(&bits);
            prop_assert_eq!(Difficulty::new(bits).is_ok(), valid);
            if valid {
                prop_assert_eq!(Difficulty::new(bits).unwrap().chunk_bytes() * 8, bits as usize);
            }
        }
    }
}
