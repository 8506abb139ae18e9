//! Error types for the wallet
//!
//! Every command-level failure maps onto an ISO-7816 status word through
//! [`Error::status_word`]. Host-side failures (configuration, snapshot IO)
//! share the same enum and surface as `SW_UNKNOWN` if they ever reach the
//! command channel.

use crate::types::{Resource, StatusWord};
use thiserror::Error;

/// Result type for wallet operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wallet errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // Structural
    /// CLA byte is not the application class
    #[error("Class not supported: 0x{0:02X}")]
    ClassNotSupported(u8),

    /// INS byte is not a known instruction
    #[error("Instruction not supported: 0x{0:02X}")]
    InstructionNotSupported(u8),

    /// Declared or received length does not fit the command
    #[error("Wrong length: expected {expected}, got {actual}")]
    WrongLength {
        /// Length the command requires
        expected: usize,
        /// Length that was declared or received
        actual: usize,
    },

    /// P1/P2 carry an unknown mode selector
    #[error("Incorrect parameters: P1=0x{p1:02X} P2=0x{p2:02X}")]
    IncorrectParameters {
        /// P1 byte
        p1: u8,
        /// P2 byte
        p2: u8,
    },

    // Authentication
    /// Operation requires a verified PIN
    #[error("PIN verification required")]
    PinRequired,

    /// Presented PIN did not match; one attempt consumed
    #[error("Verification failed: {tries_remaining} tries remaining")]
    VerificationFailed {
        /// Attempts left after this failure
        tries_remaining: u8,
    },

    /// PIN is blocked
    #[error("Security status not satisfied: PIN blocked")]
    SecurityNotSatisfied,

    /// Presented recovery code did not match
    #[error("Wrong recovery code")]
    WrongRecoveryCode,

    /// Component declines selection while blocked
    #[error("Selection refused: PIN blocked")]
    SelectionRefused,

    /// Secret does not satisfy the length constraint
    #[error("Invalid secret: length {len} exceeds {max}")]
    InvalidSecret {
        /// Presented length
        len: usize,
        /// Maximum accepted length
        max: usize,
    },

    // Ledger
    /// Amount outside the per-transaction bound
    #[error("Invalid transaction amount {amount}: allowed range 0..={limit}")]
    InvalidAmount {
        /// Requested amount
        amount: i16,
        /// Per-transaction limit
        limit: i16,
    },

    /// Credit would push a balance over its cap
    #[error("{resource} balance {balance} + {amount} exceeds maximum {max}")]
    ExceedsMaximum {
        /// Resource being credited
        resource: Resource,
        /// Balance before the credit
        balance: i16,
        /// Requested amount
        amount: i16,
        /// Balance cap
        max: i16,
    },

    /// Debit would leave the currency balance negative
    #[error("Insufficient currency: need {required}, have {available}")]
    NegativeBalance {
        /// Currency needed to cover the volume shortfall
        required: i16,
        /// Currency available
        available: i16,
    },

    // Host side
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Snapshot storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(String),
}

impl Error {
    /// Status word signalled on the command channel for this failure
    pub fn status_word(&self) -> StatusWord {
        match self {
            Error::ClassNotSupported(_) => StatusWord::CLA_NOT_SUPPORTED,
            Error::InstructionNotSupported(_) => StatusWord::INS_NOT_SUPPORTED,
            Error::WrongLength { .. } => StatusWord::WRONG_LENGTH,
            Error::IncorrectParameters { .. } => StatusWord::INCORRECT_P1P2,
            Error::PinRequired => StatusWord::PIN_VERIFICATION_REQUIRED,
            Error::VerificationFailed { .. } | Error::WrongRecoveryCode => {
                StatusWord::VERIFICATION_FAILED
            }
            Error::SecurityNotSatisfied => StatusWord::SECURITY_STATUS_NOT_SATISFIED,
            Error::SelectionRefused => StatusWord::APPLET_SELECT_FAILED,
            Error::InvalidAmount { .. } => StatusWord::INVALID_TRANSACTION_AMOUNT,
            Error::ExceedsMaximum { .. } => StatusWord::EXCEED_MAXIMUM_BALANCE,
            Error::NegativeBalance { .. } => StatusWord::NEGATIVE_BALANCE,
            Error::InvalidSecret { .. }
            | Error::Config(_)
            | Error::Storage(_)
            | Error::Serialization(_)
            | Error::Io(_) => StatusWord::UNKNOWN,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<hex::FromHexError> for Error {
    fn from(err: hex::FromHexError) -> Self {
        Error::Config(format!("Invalid hex: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_word_mapping() {
        assert_eq!(Error::ClassNotSupported(0x00).status_word().as_u16(), 0x6E00);
        assert_eq!(Error::InstructionNotSupported(0x99).status_word().as_u16(), 0x6D00);
        assert_eq!(
            Error::WrongLength { expected: 1, actual: 2 }.status_word().as_u16(),
            0x6700
        );
        assert_eq!(Error::PinRequired.status_word().as_u16(), 0x6301);
        assert_eq!(Error::SecurityNotSatisfied.status_word().as_u16(), 0x6982);
        assert_eq!(
            Error::NegativeBalance { required: 40, available: 20 }
                .status_word()
                .as_u16(),
            0x6A85
        );
        assert_eq!(Error::Config("x".into()).status_word().as_u16(), 0x6F00);
    }

    #[test]
    fn test_error_display_carries_context() {
        let err = Error::ExceedsMaximum {
            resource: Resource::Currency,
            balance: 300,
            amount: 4000,
            max: 4000,
        };
        assert_eq!(err.to_string(), "currency balance 300 + 4000 exceeds maximum 4000");
    }
}
