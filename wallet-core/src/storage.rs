//! Snapshot persistence
//!
//! The persistent state of the wallet (balances, bonus accumulator, try
//! counter, secrets) is written as a single bincode record. Writes go to a
//! sibling temp file first and are renamed into place, so a crash never
//! leaves a half-written snapshot behind.
//!
//! The `validated` flag is session state and is never persisted.

use crate::{
    auth::{RecoveryCode, Secret},
    error::{Error, Result},
    types::Balances,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Snapshot format version
const SNAPSHOT_VERSION: u16 = 1;

/// Persistent wallet state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletSnapshot {
    /// Format version
    pub version: u16,
    /// Ledger balances
    pub balances: Balances,
    /// PIN attempts left
    pub tries_remaining: u8,
    /// Current PIN
    pub secret: Secret,
    /// Recovery code
    pub recovery_code: RecoveryCode,
}

impl WalletSnapshot {
    /// Create a snapshot at the current format version
    pub fn new(
        balances: Balances,
        tries_remaining: u8,
        secret: Secret,
        recovery_code: impl Into<RecoveryCode>,
    ) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            balances,
            tries_remaining,
            secret,
            recovery_code: recovery_code.into(),
        }
    }
}

/// File-backed snapshot store
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    /// Store backed by `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the snapshot; `None` when nothing has been saved yet
    pub fn load(&self) -> Result<Option<WalletSnapshot>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let snapshot: WalletSnapshot = bincode::deserialize(&bytes)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(Error::Storage(format!(
                "Unsupported snapshot version {} in {:?}",
                snapshot.version, self.path
            )));
        }

        tracing::info!("Loaded wallet snapshot from {:?}", self.path);
        Ok(Some(snapshot))
    }

    /// Atomically replace the snapshot
    pub fn save(&self, snapshot: &WalletSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let bytes = bincode::serialize(snapshot)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, &bytes)?;
        std::fs::rename(&tmp, &self.path)?;

        tracing::debug!("Saved wallet snapshot ({} bytes) to {:?}", bytes.len(), self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DEFAULT_RECOVERY_CODE;

    fn snapshot() -> WalletSnapshot {
        WalletSnapshot::new(
            Balances {
                currency: 1200,
                volume: 35,
                bonus_accumulator: 40,
            },
            2,
            Secret::new(&[1, 2, 3, 4]).unwrap(),
            DEFAULT_RECOVERY_CODE,
        )
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("wallet.bin"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("state").join("wallet.bin"));
        store.save(&snapshot()).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.balances.currency, 1200);
        assert_eq!(loaded.balances.bonus_accumulator, 40);
        assert_eq!(loaded.tries_remaining, 2);
        assert!(loaded.secret.matches(&[1, 2, 3, 4]));
        assert!(loaded.recovery_code.matches(&DEFAULT_RECOVERY_CODE));
        assert!(!store.path().with_extension("tmp").exists());
    }

    #[test]
    fn test_corrupt_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.bin");
        std::fs::write(&path, [0xFF, 0xFF]).unwrap();
        let store = SnapshotStore::new(&path);
        assert!(matches!(store.load(), Err(Error::Serialization(_))));
    }

    #[test]
    fn test_unknown_version() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("wallet.bin"));
        let mut snap = snapshot();
        snap.version = 99;
        store.save(&snap).unwrap();
        assert!(matches!(store.load(), Err(Error::Storage(_))));
    }
}
