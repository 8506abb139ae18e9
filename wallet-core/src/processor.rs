//! Command processor
//!
//! Top-level state machine of the wallet. It owns the [`Authenticator`] and
//! the [`Ledger`] exclusively and handles one command at a time:
//!
//! ```text
//! Idle ──process()──┬──► Responded
//!   ▲               └──► Failed(SW)
//!   └─── deselect() ◄───────┘
//! ```
//!
//! Dispatch runs synchronously inside [`CommandProcessor::process`], so it
//! is never observable from outside. When `process` returns the processor
//! accepts the next command whatever the outcome; [`CommandProcessor::outcome`]
//! keeps reporting the last result until the next command or `deselect()`.
//!
//! # Example
//!
//! ```
//! use wallet_core::{CommandProcessor, Config};
//!
//! let provisioning = Config::default().provisioning().unwrap();
//! let mut wallet = CommandProcessor::new(provisioning);
//!
//! // VERIFY with the default PIN, then read the currency balance
//! assert_eq!(wallet.transmit(&[0x80, 0x20, 0x00, 0x00, 0x05, 1, 2, 3, 4, 5]), vec![0x90, 0x00]);
//! assert_eq!(wallet.transmit(&[0x80, 0x50, 0x01, 0x00, 0x02]), vec![0x00, 0x00, 0x90, 0x00]);
//! ```

use crate::{
    apdu::{Command, Instruction, Response, INS_SELECT, WALLET_CLA},
    auth::{Authenticator, Secret},
    config::Provisioning,
    ledger::Ledger,
    metrics::Metrics,
    storage::WalletSnapshot,
    types::{CreditTarget, Mode, StatusWord, MAX_SECRET_LEN, RECOVERY_CODE_LEN},
    Error, Result,
};

/// Outcome of the most recent command in the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// No command processed in this session
    Idle,
    /// Last command succeeded
    Responded,
    /// Last command failed with this status word
    Failed(StatusWord),
}

/// Wallet command processor
#[derive(Debug)]
pub struct CommandProcessor {
    auth: Authenticator,
    ledger: Ledger,
    outcome: CommandOutcome,
    metrics: Option<Metrics>,
}

impl CommandProcessor {
    /// Freshly provisioned wallet: empty ledger, full try counter
    pub fn new(provisioning: Provisioning) -> Self {
        tracing::info!("Provisioning wallet");
        Self {
            auth: Authenticator::new(provisioning.secret, provisioning.recovery_code),
            ledger: Ledger::new(),
            outcome: CommandOutcome::Idle,
            metrics: None,
        }
    }

    /// Wallet resumed from persisted state
    pub fn restore(snapshot: WalletSnapshot) -> Result<Self> {
        let ledger = Ledger::restore(snapshot.balances)?;
        let auth = Authenticator::restore(
            snapshot.secret,
            snapshot.recovery_code,
            snapshot.tries_remaining,
        );

        Ok(Self {
            auth,
            ledger,
            outcome: CommandOutcome::Idle,
            metrics: None,
        })
    }

    /// Attach a metrics collector
    pub fn with_metrics(self, metrics: Metrics) -> Self {
        metrics.update_balances(&self.ledger.balances());
        Self {
            metrics: Some(metrics),
            ..self
        }
    }

    /// Persistent state
    pub fn snapshot(&self) -> WalletSnapshot {
        WalletSnapshot::new(
            self.ledger.balances(),
            self.auth.tries_remaining(),
            self.auth.secret().clone(),
            self.auth.recovery_code().clone(),
        )
    }

    /// Selection hook: refused while the PIN is blocked
    pub fn select(&mut self) -> Result<()> {
        if self.auth.is_blocked() {
            tracing::warn!("Selection refused: PIN blocked");
            return Err(Error::SelectionRefused);
        }
        Ok(())
    }

    /// Deselection hook: ends the session
    pub fn deselect(&mut self) {
        self.auth.reset();
        self.outcome = CommandOutcome::Idle;
        tracing::debug!("Session ended");
    }

    /// Handle one command buffer
    pub fn process(&mut self, buffer: &[u8]) -> Result<Response> {
        if let Some(ref metrics) = self.metrics {
            metrics.record_command();
        }

        let result = Command::parse(buffer).and_then(|command| self.dispatch(&command));

        self.outcome = match &result {
            Ok(_) => CommandOutcome::Responded,
            Err(e) => {
                tracing::debug!("Command failed with {}: {}", e.status_word(), e);
                CommandOutcome::Failed(e.status_word())
            }
        };

        if let Some(ref metrics) = self.metrics {
            match &result {
                Err(Error::VerificationFailed { tries_remaining }) => {
                    metrics.record_failure(StatusWord::VERIFICATION_FAILED);
                    metrics.record_pin_failure(*tries_remaining);
                }
                Err(e) => metrics.record_failure(e.status_word()),
                Ok(_) => {}
            }
            metrics.update_balances(&self.ledger.balances());
        }

        result
    }

    /// Handle one command buffer and frame the answer as `data ‖ SW1 SW2`
    pub fn transmit(&mut self, buffer: &[u8]) -> Vec<u8> {
        match self.process(buffer) {
            Ok(response) => response.to_bytes(),
            Err(e) => Response::from(&e).to_bytes(),
        }
    }

    /// Outcome of the most recent command; `Idle` until the first one
    pub fn outcome(&self) -> CommandOutcome {
        self.outcome
    }

    /// Read access to the authenticator
    pub fn authenticator(&self) -> &Authenticator {
        &self.auth
    }

    /// Read access to the ledger
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    fn dispatch(&mut self, command: &Command<'_>) -> Result<Response> {
        if command.is_interindustry() {
            if command.ins == INS_SELECT {
                self.select()?;
                return Ok(Response::empty());
            }
            return Err(Error::ClassNotSupported(command.cla));
        }

        if command.cla != WALLET_CLA {
            return Err(Error::ClassNotSupported(command.cla));
        }

        let instruction = Instruction::try_from(command.ins)?;
        tracing::debug!(
            "Dispatching {:?} P1=0x{:02X} P2=0x{:02X} P3={}",
            instruction,
            command.p1,
            command.p2,
            command.p3
        );

        match instruction {
            Instruction::Verify => self.verify(command),
            Instruction::Credit => self.credit(command),
            Instruction::Debit => self.debit(command),
            Instruction::GetBalance => self.get_balance(command),
            Instruction::ResetPinCounter => self.reset_pin_counter(command),
        }
    }

    fn verify(&mut self, command: &Command<'_>) -> Result<Response> {
        if self.auth.is_blocked() {
            return Err(Error::SecurityNotSatisfied);
        }

        let code = command.payload()?;
        self.auth.verify(code)?;
        Ok(Response::empty())
    }

    fn credit(&mut self, command: &Command<'_>) -> Result<Response> {
        self.require_validated()?;

        let mode = parse_mode(command)?;
        let data = command.data_exact(mode.field_count())?;
        let target = match mode {
            Mode::Currency => CreditTarget::Currency(i16::from(data[0])),
            Mode::Volume => CreditTarget::Volume(i16::from(data[0])),
            Mode::Both => CreditTarget::Both {
                currency: i16::from(data[0]),
                volume: i16::from(data[1]),
            },
        };

        self.ledger.credit(target)?;
        Ok(Response::empty())
    }

    // Debit is deliberately not PIN-gated
    fn debit(&mut self, command: &Command<'_>) -> Result<Response> {
        let data = command.data_exact(1)?;
        self.ledger.debit(i16::from(data[0]))?;
        Ok(Response::empty())
    }

    // Mode is checked before the PIN
    fn get_balance(&mut self, command: &Command<'_>) -> Result<Response> {
        let mode = parse_mode(command)?;
        self.require_validated()?;

        let data = self.ledger.query_balance(mode).to_bytes();
        if command.le() < data.len() {
            return Err(Error::WrongLength {
                expected: data.len(),
                actual: command.le(),
            });
        }

        Ok(Response::ok(data))
    }

    fn reset_pin_counter(&mut self, command: &Command<'_>) -> Result<Response> {
        if !self.auth.is_blocked() {
            tracing::debug!("PIN not blocked, reset ignored");
            return Ok(Response::empty());
        }

        let data =
            command.data_within(RECOVERY_CODE_LEN, RECOVERY_CODE_LEN + MAX_SECRET_LEN)?;
        let (code, new_pin) = data.split_at(RECOVERY_CODE_LEN);
        let new_secret = if new_pin.is_empty() {
            None
        } else {
            Some(Secret::new(new_pin)?)
        };

        self.auth.unblock_with_recovery_code(code, new_secret)?;
        Ok(Response::empty())
    }

    fn require_validated(&self) -> Result<()> {
        if !self.auth.is_validated() {
            return Err(Error::PinRequired);
        }
        Ok(())
    }
}

fn parse_mode(command: &Command<'_>) -> Result<Mode> {
    Mode::from_byte(command.p1).ok_or(Error::IncorrectParameters {
        p1: command.p1,
        p2: command.p2,
    })
}
