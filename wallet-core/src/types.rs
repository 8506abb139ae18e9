//! Core types and constants for the wallet
//!
//! All balances are narrow signed integers (`i16`), matching the 16-bit
//! arithmetic of the secure element. Bounds are enforced with checked
//! arithmetic before anything is committed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum currency balance (smallest currency unit)
pub const MAX_CURRENCY: i16 = 4000;

/// Maximum volume balance (smallest volume unit)
pub const MAX_VOLUME: i16 = 500;

/// Per-transaction credit bound, applied to each resource
pub const MAX_TRANSACTION_AMOUNT: i16 = 250;

/// Per-transaction debit bound (volume units)
pub const MAX_DEBIT_VOLUME: i16 = 50;

/// Currency units charged per volume unit of shortfall
pub const VOLUME_TO_CURRENCY_RATE: i16 = 8;

/// Currency spent per bonus volume unit granted
pub const BONUS_RATE: i16 = 100;

/// Failed PIN attempts before the PIN blocks
pub const PIN_TRY_LIMIT: u8 = 3;

/// Maximum PIN length in bytes
pub const MAX_SECRET_LEN: usize = 8;

/// Recovery code (PUK) length in bytes
pub const RECOVERY_CODE_LEN: usize = 8;

/// Recovery code (PUK) provisioned by default
pub const DEFAULT_RECOVERY_CODE: [u8; RECOVERY_CODE_LEN] = [0x09; RECOVERY_CODE_LEN];

/// A balance-carrying resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    /// Monetary balance
    Currency,
    /// Fuel volume balance
    Volume,
}

impl Resource {
    /// Balance cap for this resource
    pub fn max_balance(&self) -> i16 {
        match self {
            Resource::Currency => MAX_CURRENCY,
            Resource::Volume => MAX_VOLUME,
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Currency => write!(f, "currency"),
            Resource::Volume => write!(f, "volume"),
        }
    }
}

/// Mode selector carried in P1 of CREDIT and GET_BALANCE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Mode {
    /// Currency only
    Currency = 0x01,
    /// Volume only
    Volume = 0x02,
    /// Currency then volume
    Both = 0x03,
}

impl Mode {
    /// Parse from the P1 byte
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Mode::Currency),
            0x02 => Some(Mode::Volume),
            0x03 => Some(Mode::Both),
            _ => None,
        }
    }

    /// Number of resources this mode addresses
    pub fn field_count(&self) -> usize {
        match self {
            Mode::Currency | Mode::Volume => 1,
            Mode::Both => 2,
        }
    }
}

/// Credit request addressed to one or both resources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditTarget {
    /// Credit the currency balance
    Currency(i16),
    /// Credit the volume balance
    Volume(i16),
    /// Credit both, currency first
    Both {
        /// Currency amount
        currency: i16,
        /// Volume amount
        volume: i16,
    },
}

/// Point-in-time view of the ledger
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balances {
    /// Currency balance
    pub currency: i16,
    /// Volume balance
    pub volume: i16,
    /// Currency carried toward the next bonus volume unit
    pub bonus_accumulator: i16,
}

/// ISO-7816 status word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusWord(u16);

impl StatusWord {
    /// Normal processing
    pub const OK: StatusWord = StatusWord(0x9000);
    /// PIN verification failed / wrong recovery code
    pub const VERIFICATION_FAILED: StatusWord = StatusWord(0x6300);
    /// PIN verification required
    pub const PIN_VERIFICATION_REQUIRED: StatusWord = StatusWord(0x6301);
    /// Wrong length
    pub const WRONG_LENGTH: StatusWord = StatusWord(0x6700);
    /// Security status not satisfied
    pub const SECURITY_STATUS_NOT_SATISFIED: StatusWord = StatusWord(0x6982);
    /// Applet selection failed
    pub const APPLET_SELECT_FAILED: StatusWord = StatusWord(0x6999);
    /// Invalid transaction amount
    pub const INVALID_TRANSACTION_AMOUNT: StatusWord = StatusWord(0x6A83);
    /// Balance would exceed its maximum
    pub const EXCEED_MAXIMUM_BALANCE: StatusWord = StatusWord(0x6A84);
    /// Balance would become negative
    pub const NEGATIVE_BALANCE: StatusWord = StatusWord(0x6A85);
    /// Incorrect P1/P2
    pub const INCORRECT_P1P2: StatusWord = StatusWord(0x6B00);
    /// Instruction not supported
    pub const INS_NOT_SUPPORTED: StatusWord = StatusWord(0x6D00);
    /// Class not supported
    pub const CLA_NOT_SUPPORTED: StatusWord = StatusWord(0x6E00);
    /// No precise diagnosis
    pub const UNKNOWN: StatusWord = StatusWord(0x6F00);

    /// Raw 16-bit value
    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// Big-endian SW1 SW2 trailer
    pub fn to_bytes(&self) -> [u8; 2] {
        self.0.to_be_bytes()
    }

    /// Whether this word signals success
    pub fn is_success(&self) -> bool {
        *self == StatusWord::OK
    }
}

impl From<u16> for StatusWord {
    fn from(sw: u16) -> Self {
        Self(sw)
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_byte() {
        assert_eq!(Mode::from_byte(1), Some(Mode::Currency));
        assert_eq!(Mode::from_byte(2), Some(Mode::Volume));
        assert_eq!(Mode::from_byte(3), Some(Mode::Both));
        assert_eq!(Mode::from_byte(0), None);
        assert_eq!(Mode::from_byte(4), None);
    }

    #[test]
    fn test_status_word_bytes() {
        assert_eq!(StatusWord::OK.to_bytes(), [0x90, 0x00]);
        assert_eq!(StatusWord::NEGATIVE_BALANCE.to_bytes(), [0x6A, 0x85]);
        assert_eq!(StatusWord::PIN_VERIFICATION_REQUIRED.to_string(), "6301");
        assert!(StatusWord::OK.is_success());
        assert!(!StatusWord::UNKNOWN.is_success());
    }

    #[test]
    fn test_resource_caps() {
        assert_eq!(Resource::Currency.max_balance(), 4000);
        assert_eq!(Resource::Volume.max_balance(), 500);
    }
}
