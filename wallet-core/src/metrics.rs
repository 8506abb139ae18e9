//! Metrics collection for observability
//!
//! Prometheus metrics for the command processor, registered on a private
//! registry so several processors can coexist in one process.
//!
//! # Metrics
//!
//! - `wallet_commands_total` - Commands received
//! - `wallet_command_failures_total` - Failed commands, labelled by status word
//! - `wallet_pin_failures_total` - Failed PIN presentations
//! - `wallet_lockouts_total` - Transitions into the blocked state
//! - `wallet_currency_balance` - Current currency balance
//! - `wallet_volume_balance` - Current volume balance

use crate::types::{Balances, StatusWord};
use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Commands received
    pub commands_total: IntCounter,

    /// Failed commands by status word
    pub command_failures: IntCounterVec,

    /// Failed PIN presentations
    pub pin_failures: IntCounter,

    /// Lockouts
    pub lockouts: IntCounter,

    /// Currency balance
    pub currency_balance: IntGauge,

    /// Volume balance
    pub volume_balance: IntGauge,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let commands_total = IntCounter::new("wallet_commands_total", "Commands received")?;
        registry.register(Box::new(commands_total.clone()))?;

        let command_failures = IntCounterVec::new(
            Opts::new(
                "wallet_command_failures_total",
                "Failed commands by status word",
            ),
            &["status"],
        )?;
        registry.register(Box::new(command_failures.clone()))?;

        let pin_failures =
            IntCounter::new("wallet_pin_failures_total", "Failed PIN presentations")?;
        registry.register(Box::new(pin_failures.clone()))?;

        let lockouts = IntCounter::new("wallet_lockouts_total", "Transitions into PIN lockout")?;
        registry.register(Box::new(lockouts.clone()))?;

        let currency_balance = IntGauge::new("wallet_currency_balance", "Current currency balance")?;
        registry.register(Box::new(currency_balance.clone()))?;

        let volume_balance = IntGauge::new("wallet_volume_balance", "Current volume balance")?;
        registry.register(Box::new(volume_balance.clone()))?;

        Ok(Self {
            commands_total,
            command_failures,
            pin_failures,
            lockouts,
            currency_balance,
            volume_balance,
            registry,
        })
    }

    /// Record a received command
    pub fn record_command(&self) {
        self.commands_total.inc();
    }

    /// Record a failed command
    pub fn record_failure(&self, status: StatusWord) {
        let label = status.to_string();
        self.command_failures
            .with_label_values(&[label.as_str()])
            .inc();
    }

    /// Record a failed PIN presentation, and the lockout it may cause
    pub fn record_pin_failure(&self, tries_remaining: u8) {
        self.pin_failures.inc();
        if tries_remaining == 0 {
            self.lockouts.inc();
        }
    }

    /// Update balance gauges
    pub fn update_balances(&self, balances: &Balances) {
        self.currency_balance.set(i64::from(balances.currency));
        self.volume_balance.set(i64::from(balances.volume));
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Text exposition of every registered metric
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("commands_total", &self.commands_total.get())
            .field("pin_failures", &self.pin_failures.get())
            .finish()
    }
}
