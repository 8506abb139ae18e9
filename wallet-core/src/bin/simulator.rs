//! Wallet simulator binary
//!
//! Reads one command per line from stdin and writes the hex response
//! (`data ‖ SW1 SW2`) to stdout. Besides hex APDUs it understands:
//!
//! - `select` / `deselect` - session boundaries
//! - `state` - print balances and try counter
//!
//! Usage: `wallet-sim [config.toml]`

use anyhow::Context;
use std::io::{BufRead, Write};
use wallet_core::{CommandProcessor, Config, Metrics, SnapshotStore};

fn main() -> anyhow::Result<()> {
    // Initialize tracing; stdout carries responses only
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => Config::from_env()?,
    };

    tracing::info!(
        "Starting {} v{}",
        config.service_name,
        config.service_version
    );

    let store = config.state_file.clone().map(SnapshotStore::new);
    let mut wallet = match store.as_ref().map(SnapshotStore::load).transpose()?.flatten() {
        Some(snapshot) => CommandProcessor::restore(snapshot)?,
        None => CommandProcessor::new(config.provisioning()?),
    };

    let metrics = if config.metrics_enabled {
        let metrics = Metrics::new()?;
        wallet = wallet.with_metrics(metrics.clone());
        Some(metrics)
    } else {
        None
    };

    if let Err(e) = wallet.select() {
        tracing::warn!("Initial selection failed: {}", e);
    }

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout().lock();

    for line in stdin.lock().lines() {
        let line = line?;
        let input = line.trim();
        if input.is_empty() || input.starts_with('#') {
            continue;
        }

        match input {
            "select" => match wallet.select() {
                Ok(()) => writeln!(stdout, "selected")?,
                Err(e) => writeln!(stdout, "{}", e.status_word())?,
            },
            "deselect" => {
                wallet.deselect();
                writeln!(stdout, "deselected")?;
            }
            "state" => {
                let balances = wallet.ledger().balances();
                writeln!(
                    stdout,
                    "currency={} volume={} bonus={} tries={} validated={}",
                    balances.currency,
                    balances.volume,
                    balances.bonus_accumulator,
                    wallet.authenticator().tries_remaining(),
                    wallet.authenticator().is_validated()
                )?;
            }
            hex_apdu => {
                let compact: String = hex_apdu.split_whitespace().collect();
                let buffer = match hex::decode(&compact) {
                    Ok(buffer) => buffer,
                    Err(e) => {
                        tracing::error!("Invalid hex input: {}", e);
                        continue;
                    }
                };

                let response = wallet.transmit(&buffer);
                writeln!(stdout, "{}", hex::encode_upper(&response))?;

                if let Some(ref store) = store {
                    store.save(&wallet.snapshot())?;
                }
            }
        }
    }

    if let Some(metrics) = metrics {
        eprintln!("{}", metrics.render()?);
    }

    tracing::info!("Shutting down wallet simulator");
    Ok(())
}
