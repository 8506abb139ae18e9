//! Dual-resource balance ledger
//!
//! Holds a currency balance, a volume balance and the bonus accumulator.
//! Every operation validates fully before it commits, so a failed call
//! leaves the ledger untouched.
//!
//! # Invariants
//!
//! - `0 <= currency <= MAX_CURRENCY`
//! - `0 <= volume <= MAX_VOLUME`
//! - `0 <= bonus_accumulator < BONUS_RATE`
//!
//! # Debit conversion
//!
//! A volume debit larger than the volume balance is covered in two steps:
//! the whole volume balance is consumed and the shortfall is charged to the
//! currency balance at `VOLUME_TO_CURRENCY_RATE`. Currency charged this way
//! feeds the bonus accumulator; each full `BONUS_RATE` grants one volume
//! unit and the remainder carries forward.

use crate::{
    types::{
        Balances, CreditTarget, Mode, Resource, BONUS_RATE, MAX_CURRENCY, MAX_DEBIT_VOLUME,
        MAX_TRANSACTION_AMOUNT, MAX_VOLUME, VOLUME_TO_CURRENCY_RATE,
    },
    Error, Result,
};

/// Outcome of a successful debit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebitReceipt {
    /// Volume taken from the volume balance
    pub volume_used: i16,
    /// Currency charged for the shortfall
    pub currency_charged: i16,
    /// Bonus volume granted
    pub bonus_granted: i16,
}

/// Balance query result; fields not selected by the mode are `None`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceReport {
    /// Currency balance, if requested
    pub currency: Option<i16>,
    /// Volume balance, if requested
    pub volume: Option<i16>,
}

impl BalanceReport {
    /// Big-endian encoding, currency first
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4);
        if let Some(currency) = self.currency {
            out.extend_from_slice(&currency.to_be_bytes());
        }
        if let Some(volume) = self.volume {
            out.extend_from_slice(&volume.to_be_bytes());
        }
        out
    }
}

/// Wallet ledger
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    currency: i16,
    volume: i16,
    bonus_accumulator: i16,
}

impl Ledger {
    /// Empty ledger, as provisioned
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from persisted balances, rejecting out-of-range state
    pub fn restore(balances: Balances) -> Result<Self> {
        let in_range = (0..=MAX_CURRENCY).contains(&balances.currency)
            && (0..=MAX_VOLUME).contains(&balances.volume)
            && (0..BONUS_RATE).contains(&balances.bonus_accumulator);
        if !in_range {
            return Err(Error::Storage(format!(
                "Persisted balances out of range: {:?}",
                balances
            )));
        }

        Ok(Self {
            currency: balances.currency,
            volume: balances.volume,
            bonus_accumulator: balances.bonus_accumulator,
        })
    }

    /// Credit one or both resources
    ///
    /// `Both` validates currency then volume and commits only when both
    /// pass, so the reported failure is the first one in that order.
    pub fn credit(&mut self, target: CreditTarget) -> Result<()> {
        match target {
            CreditTarget::Currency(amount) => {
                self.currency = self.checked_credit(Resource::Currency, amount)?;
            }
            CreditTarget::Volume(amount) => {
                self.volume = self.checked_credit(Resource::Volume, amount)?;
            }
            CreditTarget::Both { currency, volume } => {
                let new_currency = self.checked_credit(Resource::Currency, currency)?;
                let new_volume = self.checked_credit(Resource::Volume, volume)?;
                self.currency = new_currency;
                self.volume = new_volume;
            }
        }

        tracing::debug!(
            "Credit {:?} applied: currency={} volume={}",
            target,
            self.currency,
            self.volume
        );
        Ok(())
    }

    /// Debit volume, converting any shortfall to currency
    pub fn debit(&mut self, amount: i16) -> Result<DebitReceipt> {
        check_amount(amount, MAX_DEBIT_VOLUME)?;

        if amount <= self.volume {
            self.volume -= amount;
            tracing::debug!("Debit {} from volume, volume={}", amount, self.volume);
            return Ok(DebitReceipt {
                volume_used: amount,
                ..Default::default()
            });
        }

        let volume_used = self.volume;
        let shortfall = amount - volume_used;
        let cost = shortfall
            .checked_mul(VOLUME_TO_CURRENCY_RATE)
            .ok_or(Error::InvalidAmount {
                amount,
                limit: MAX_DEBIT_VOLUME,
            })?;

        let remaining = self
            .currency
            .checked_sub(cost)
            .filter(|balance| *balance >= 0)
            .ok_or(Error::NegativeBalance {
                required: cost,
                available: self.currency,
            })?;

        // bonus_accumulator < 100 and cost <= 400, no overflow possible
        let accumulated = self.bonus_accumulator + cost;
        let bonus_granted = accumulated / BONUS_RATE;

        self.currency = remaining;
        self.volume = bonus_granted;
        self.bonus_accumulator = accumulated % BONUS_RATE;

        tracing::debug!(
            "Debit {} with shortfall {}: charged {} currency, granted {} bonus volume, carry {}",
            amount,
            shortfall,
            cost,
            bonus_granted,
            self.bonus_accumulator
        );

        Ok(DebitReceipt {
            volume_used,
            currency_charged: cost,
            bonus_granted,
        })
    }

    /// Read the balances selected by `mode`
    pub fn query_balance(&self, mode: Mode) -> BalanceReport {
        match mode {
            Mode::Currency => BalanceReport {
                currency: Some(self.currency),
                volume: None,
            },
            Mode::Volume => BalanceReport {
                currency: None,
                volume: Some(self.volume),
            },
            Mode::Both => BalanceReport {
                currency: Some(self.currency),
                volume: Some(self.volume),
            },
        }
    }

    /// Full snapshot of the balances
    pub fn balances(&self) -> Balances {
        Balances {
            currency: self.currency,
            volume: self.volume,
            bonus_accumulator: self.bonus_accumulator,
        }
    }

    /// Currency balance
    pub fn currency(&self) -> i16 {
        self.currency
    }

    /// Volume balance
    pub fn volume(&self) -> i16 {
        self.volume
    }

    /// Bonus accumulator
    pub fn bonus_accumulator(&self) -> i16 {
        self.bonus_accumulator
    }

    fn balance_of(&self, resource: Resource) -> i16 {
        match resource {
            Resource::Currency => self.currency,
            Resource::Volume => self.volume,
        }
    }

    /// New balance after crediting `amount`, without committing it
    fn checked_credit(&self, resource: Resource, amount: i16) -> Result<i16> {
        check_amount(amount, MAX_TRANSACTION_AMOUNT)?;

        let balance = self.balance_of(resource);
        let max = resource.max_balance();
        balance
            .checked_add(amount)
            .filter(|new_balance| *new_balance <= max)
            .ok_or(Error::ExceedsMaximum {
                resource,
                balance,
                amount,
                max,
            })
    }
}

fn check_amount(amount: i16, limit: i16) -> Result<()> {
    if !(0..=limit).contains(&amount) {
        return Err(Error::InvalidAmount { amount, limit });
    }
    Ok(())
}
