//! Configuration and provisioning for the wallet

use crate::{
    auth::{RecoveryCode, Secret},
    types::{DEFAULT_RECOVERY_CODE, RECOVERY_CODE_LEN},
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Wallet configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Initial PIN, hex encoded
    pub initial_pin: String,

    /// Recovery code (PUK), hex encoded
    pub recovery_code: String,

    /// Snapshot file; state is not persisted when unset
    pub state_file: Option<PathBuf>,

    /// Collect Prometheus metrics
    pub metrics_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "wallet-core".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            initial_pin: "0102030405".to_string(),
            recovery_code: hex::encode(DEFAULT_RECOVERY_CODE),
            state_file: None,
            metrics_enabled: false,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(pin) = std::env::var("WALLET_PIN") {
            config.initial_pin = pin;
        }

        if let Ok(code) = std::env::var("WALLET_RECOVERY_CODE") {
            config.recovery_code = code;
        }

        if let Ok(path) = std::env::var("WALLET_STATE_FILE") {
            config.state_file = Some(PathBuf::from(path));
        }

        if let Ok(flag) = std::env::var("WALLET_METRICS") {
            config.metrics_enabled = matches!(flag.as_str(), "1" | "true" | "yes");
        }

        Ok(config)
    }

    /// Decode and validate the provisioning secrets
    pub fn provisioning(&self) -> Result<Provisioning> {
        let pin = hex::decode(&self.initial_pin)?;
        let secret = Secret::new(&pin)?;

        let code = hex::decode(&self.recovery_code)?;
        let recovery_code: [u8; RECOVERY_CODE_LEN] = code.as_slice().try_into().map_err(|_| {
            Error::Config(format!(
                "Recovery code must be {} bytes, got {}",
                RECOVERY_CODE_LEN,
                code.len()
            ))
        })?;

        Ok(Provisioning {
            secret,
            recovery_code: RecoveryCode::new(recovery_code),
        })
    }
}

/// Secrets handed to the wallet at installation
#[derive(Debug, Clone)]
pub struct Provisioning {
    /// Initial PIN
    pub secret: Secret,
    /// Recovery code (PUK)
    pub recovery_code: RecoveryCode,
}

impl Provisioning {
    /// Provision with an install-parameter PIN and the default recovery code
    pub fn from_install_params(params: &[u8]) -> Result<Self> {
        let install = InstallParams::parse(params)?;
        Ok(Self {
            secret: install.pin,
            recovery_code: RecoveryCode::new(DEFAULT_RECOVERY_CODE),
        })
    }
}

/// Installation parameters: `[aidLen, aid.., infoLen, info.., dataLen, data..]`
///
/// The application data field carries the initial PIN.
#[derive(Debug, Clone)]
pub struct InstallParams {
    /// Instance AID
    pub aid: Vec<u8>,
    /// Control info
    pub info: Vec<u8>,
    /// Initial PIN
    pub pin: Secret,
}

impl InstallParams {
    /// Parse an install buffer
    pub fn parse(params: &[u8]) -> Result<Self> {
        let mut offset = 0;
        let aid = read_lv(params, &mut offset)?;
        let info = read_lv(params, &mut offset)?;
        let data = read_lv(params, &mut offset)?;

        Ok(Self {
            aid: aid.to_vec(),
            info: info.to_vec(),
            pin: Secret::new(data)?,
        })
    }
}

/// Read one length-prefixed field and advance `offset`
fn read_lv<'a>(buf: &'a [u8], offset: &mut usize) -> Result<&'a [u8]> {
    let len = *buf.get(*offset).ok_or(Error::WrongLength {
        expected: *offset + 1,
        actual: buf.len(),
    })? as usize;
    let start = *offset + 1;
    let end = start + len;
    let field = buf.get(start..end).ok_or(Error::WrongLength {
        expected: end,
        actual: buf.len(),
    })?;
    *offset = end;
    Ok(field)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "wallet-core");
        assert_eq!(config.recovery_code, "0909090909090909");
        assert!(config.state_file.is_none());
        assert!(!config.metrics_enabled);
    }

    #[test]
    fn test_default_provisioning() {
        let provisioning = Config::default().provisioning().unwrap();
        assert!(provisioning.secret.matches(&[1, 2, 3, 4, 5]));
        assert!(provisioning.recovery_code.matches(&DEFAULT_RECOVERY_CODE));
        assert!(!format!("{:?}", provisioning).contains("9, 9"));
    }

    #[test]
    fn test_provisioning_rejects_bad_secrets() {
        let config = Config {
            initial_pin: "010203040506070809".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.provisioning(),
            Err(Error::InvalidSecret { len: 9, max: 8 })
        ));

        let config = Config {
            recovery_code: "0909".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.provisioning(), Err(Error::Config(_))));

        let config = Config {
            initial_pin: "zz".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.provisioning(), Err(Error::Config(_))));
    }

    #[test]
    fn test_from_file_partial_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.toml");
        std::fs::write(&path, "initial_pin = \"11223344\"\nmetrics_enabled = true\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.initial_pin, "11223344");
        assert!(config.metrics_enabled);
        assert_eq!(config.service_name, "wallet-core");
    }

    #[test]
    fn test_install_params() {
        // aid (3 bytes), info (1 byte), data = PIN (4 bytes)
        let params = [3, 0xA0, 0x00, 0x01, 1, 0x00, 4, 1, 2, 3, 4];
        let install = InstallParams::parse(&params).unwrap();
        assert_eq!(install.aid, vec![0xA0, 0x00, 0x01]);
        assert_eq!(install.info, vec![0x00]);
        assert!(install.pin.matches(&[1, 2, 3, 4]));

        let provisioning = Provisioning::from_install_params(&params).unwrap();
        assert!(provisioning.recovery_code.matches(&DEFAULT_RECOVERY_CODE));
    }

    #[test]
    fn test_install_params_truncated() {
        let params = [3, 0xA0, 0x00, 0x01, 1, 0x00, 4, 1, 2];
        assert!(matches!(
            InstallParams::parse(&params),
            Err(Error::WrongLength { .. })
        ));
        assert!(InstallParams::parse(&[]).is_err());
    }
}
