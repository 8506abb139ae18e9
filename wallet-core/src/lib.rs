//! Wallet Core
//!
//! PIN-protected stored-value wallet modelled on a smart-card applet: a
//! currency balance, a volume balance and a bonus accumulator, driven by
//! ISO-7816 style command APDUs.
//!
//! # Architecture
//!
//! - **Authenticator**: PIN with try counter, lockout and recovery-code unblock
//! - **Ledger**: bounded credit, volume debit with currency conversion and bonus carry
//! - **Command Processor**: single-threaded APDU dispatch with status-word mapping
//! - **Snapshot Store**: persistent state outside the session
//!
//! # Invariants
//!
//! - `0 <= currency <= 4000` and `0 <= volume <= 500` at all times
//! - `0 <= bonus_accumulator < 100`
//! - A failed command never changes balances
//! - CREDIT and GET_BALANCE require a verified PIN; DEBIT does not

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod apdu;
pub mod auth;
pub mod config;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod processor;
pub mod storage;
pub mod types;

// Re-exports
pub use apdu::{Command, Instruction, Response};
pub use auth::{Authenticator, RecoveryCode, Secret};
pub use config::{Config, InstallParams, Provisioning};
pub use error::{Error, Result};
pub use ledger::{BalanceReport, DebitReceipt, Ledger};
pub use metrics::Metrics;
pub use processor::{CommandOutcome, CommandProcessor};
pub use storage::{SnapshotStore, WalletSnapshot};
pub use types::{Balances, CreditTarget, Mode, Resource, StatusWord};
