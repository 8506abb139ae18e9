//! PIN authenticator with try limiting and recovery-code unblock
//!
//! # State machine
//!
//! ```text
//!            verify(ok)                      verify(bad) x3
//!   ┌──────────────────────┐        ┌──────────────────────────┐
//!   ▼                      │        │                          ▼
//! Validated ◄──── Unvalidated ──────┘                       Blocked
//!   │   deselect/reset ▲     ▲                                 │
//!   └──────────────────┘     └──── unblock(recovery code) ─────┘
//! ```
//!
//! Invariant: `validated` implies `tries_remaining == PIN_TRY_LIMIT`.

use crate::{
    types::{MAX_SECRET_LEN, PIN_TRY_LIMIT, RECOVERY_CODE_LEN},
    Error, Result,
};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Stored secret, wiped on drop
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Secret(Vec<u8>);

impl Secret {
    /// Create a secret, enforcing the maximum length
    pub fn new(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > MAX_SECRET_LEN {
            return Err(Error::InvalidSecret {
                len: bytes.len(),
                max: MAX_SECRET_LEN,
            });
        }
        Ok(Self(bytes.to_vec()))
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the secret is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Constant-time comparison against a presented code
    pub fn matches(&self, candidate: &[u8]) -> bool {
        if candidate.len() != self.0.len() {
            return false;
        }
        self.0.as_slice().ct_eq(candidate).into()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret(<{} bytes>)", self.0.len())
    }
}

/// Recovery code (PUK), wiped on drop
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct RecoveryCode([u8; RECOVERY_CODE_LEN]);

impl RecoveryCode {
    /// Wrap raw code bytes
    pub fn new(bytes: [u8; RECOVERY_CODE_LEN]) -> Self {
        Self(bytes)
    }

    /// Constant-time comparison; every byte is inspected
    pub fn matches(&self, candidate: &[u8]) -> bool {
        candidate.len() == RECOVERY_CODE_LEN && bool::from(self.0[..].ct_eq(candidate))
    }
}

impl From<[u8; RECOVERY_CODE_LEN]> for RecoveryCode {
    fn from(bytes: [u8; RECOVERY_CODE_LEN]) -> Self {
        Self::new(bytes)
    }
}

impl std::fmt::Debug for RecoveryCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RecoveryCode(<redacted>)")
    }
}

/// PIN authenticator
#[derive(Debug, Clone)]
pub struct Authenticator {
    secret: Secret,
    recovery_code: RecoveryCode,
    tries_remaining: u8,
    validated: bool,
}

impl Authenticator {
    /// Create an authenticator with the provisioned secret and recovery code
    pub fn new(secret: Secret, recovery_code: impl Into<RecoveryCode>) -> Self {
        Self {
            secret,
            recovery_code: recovery_code.into(),
            tries_remaining: PIN_TRY_LIMIT,
            validated: false,
        }
    }

    /// Restore persisted state. Validation is session-scoped and always starts cleared.
    pub fn restore(
        secret: Secret,
        recovery_code: impl Into<RecoveryCode>,
        tries_remaining: u8,
    ) -> Self {
        Self {
            secret,
            recovery_code: recovery_code.into(),
            tries_remaining: tries_remaining.min(PIN_TRY_LIMIT),
            validated: false,
        }
    }

    /// Check a presented code
    ///
    /// A blocked PIN fails with [`Error::SecurityNotSatisfied`] without
    /// consuming an attempt. Every other attempt first clears validation;
    /// a mismatch consumes one attempt.
    pub fn verify(&mut self, code: &[u8]) -> Result<()> {
        if self.tries_remaining == 0 {
            tracing::warn!("PIN verify rejected: PIN blocked");
            return Err(Error::SecurityNotSatisfied);
        }

        self.validated = false;

        if !self.secret.matches(code) {
            self.tries_remaining -= 1;
            if self.tries_remaining == 0 {
                tracing::warn!("PIN blocked after {} failed attempts", PIN_TRY_LIMIT);
            } else {
                tracing::warn!("PIN verify failed, {} tries remaining", self.tries_remaining);
            }
            return Err(Error::VerificationFailed {
                tries_remaining: self.tries_remaining,
            });
        }

        self.tries_remaining = PIN_TRY_LIMIT;
        self.validated = true;
        tracing::info!("PIN verified");
        Ok(())
    }

    /// End of session: drop validation, keep tries and secret
    pub fn reset(&mut self) {
        self.validated = false;
    }

    /// Clear a lockout with the recovery code
    ///
    /// All recovery-code bytes are compared before a verdict is reached; a
    /// partial match never resets the counter. When `new_secret` is given
    /// it replaces the PIN on success.
    pub fn unblock_with_recovery_code(
        &mut self,
        code: &[u8],
        new_secret: Option<Secret>,
    ) -> Result<()> {
        if !self.recovery_code.matches(code) {
            tracing::warn!("Recovery code rejected");
            return Err(Error::WrongRecoveryCode);
        }

        if let Some(secret) = new_secret {
            self.secret = secret;
            tracing::info!("PIN replaced via recovery code");
        }

        self.tries_remaining = PIN_TRY_LIMIT;
        self.validated = false;
        tracing::info!("PIN unblocked");
        Ok(())
    }

    /// Whether the current session holds a verified PIN
    pub fn is_validated(&self) -> bool {
        self.validated
    }

    /// Attempts left before the PIN blocks
    pub fn tries_remaining(&self) -> u8 {
        self.tries_remaining
    }

    /// Whether the PIN is blocked
    pub fn is_blocked(&self) -> bool {
        self.tries_remaining == 0
    }

    pub(crate) fn secret(&self) -> &Secret {
        &self.secret
    }

    pub(crate) fn recovery_code(&self) -> &RecoveryCode {
        &self.recovery_code
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DEFAULT_RECOVERY_CODE;

    const PIN: &[u8] = &[1, 2, 3, 4, 5];

    fn authenticator() -> Authenticator {
        Authenticator::new(Secret::new(PIN).unwrap(), DEFAULT_RECOVERY_CODE)
    }

    fn block(auth: &mut Authenticator) {
        for _ in 0..PIN_TRY_LIMIT {
            let _ = auth.verify(&[0, 0, 0, 0]);
        }
        assert!(auth.is_blocked());
    }

    #[test]
    fn test_secret_length_limit() {
        assert!(Secret::new(&[0u8; 8]).is_ok());
        assert_eq!(
            Secret::new(&[0u8; 9]).unwrap_err(),
            Error::InvalidSecret { len: 9, max: 8 }
        );
    }

    #[test]
    fn test_verify_success() {
        let mut auth = authenticator();
        auth.verify(PIN).unwrap();
        assert!(auth.is_validated());
        assert_eq!(auth.tries_remaining(), PIN_TRY_LIMIT);
    }

    #[test]
    fn test_verify_failure_consumes_attempt() {
        let mut auth = authenticator();
        let err = auth.verify(&[9, 9]).unwrap_err();
        assert_eq!(err, Error::VerificationFailed { tries_remaining: 2 });
        assert!(!auth.is_validated());
    }

    #[test]
    fn test_prefix_and_overlong_codes_do_not_match() {
        let mut auth = authenticator();
        assert!(auth.verify(&[1, 2, 3, 4]).is_err());
        assert!(auth.verify(&[1, 2, 3, 4, 5, 6, 7, 8, 9]).is_err());
        assert_eq!(auth.tries_remaining(), 1);
    }

    #[test]
    fn test_success_restores_tries() {
        let mut auth = authenticator();
        let _ = auth.verify(&[0]);
        let _ = auth.verify(&[0]);
        assert_eq!(auth.tries_remaining(), 1);
        auth.verify(PIN).unwrap();
        assert_eq!(auth.tries_remaining(), PIN_TRY_LIMIT);
    }

    #[test]
    fn test_failed_attempt_clears_validation() {
        let mut auth = authenticator();
        auth.verify(PIN).unwrap();
        let _ = auth.verify(&[0]);
        assert!(!auth.is_validated());
        assert_eq!(auth.tries_remaining(), 2);
    }

    #[test]
    fn test_blocked_pin_rejects_correct_code_without_consuming() {
        let mut auth = authenticator();
        block(&mut auth);
        assert_eq!(auth.verify(PIN).unwrap_err(), Error::SecurityNotSatisfied);
        assert_eq!(auth.tries_remaining(), 0);
        assert!(!auth.is_validated());
    }

    #[test]
    fn test_reset_keeps_tries() {
        let mut auth = authenticator();
        let _ = auth.verify(&[0]);
        auth.verify(PIN).unwrap();
        let _ = auth.verify(&[0]);
        auth.reset();
        assert!(!auth.is_validated());
        assert_eq!(auth.tries_remaining(), 2);
    }

    #[test]
    fn test_unblock_requires_every_byte() {
        let mut auth = authenticator();
        block(&mut auth);

        // Only the last byte differs
        let mut code = DEFAULT_RECOVERY_CODE;
        code[7] = 0x08;
        assert_eq!(
            auth.unblock_with_recovery_code(&code, None).unwrap_err(),
            Error::WrongRecoveryCode
        );
        assert!(auth.is_blocked());

        // Truncated code
        assert!(auth
            .unblock_with_recovery_code(&DEFAULT_RECOVERY_CODE[..7], None)
            .is_err());
        assert!(auth.is_blocked());

        auth.unblock_with_recovery_code(&DEFAULT_RECOVERY_CODE, None)
            .unwrap();
        assert_eq!(auth.tries_remaining(), PIN_TRY_LIMIT);
        auth.verify(PIN).unwrap();
    }

    #[test]
    fn test_unblock_replaces_secret() {
        let mut auth = authenticator();
        block(&mut auth);
        let new_pin = Secret::new(&[7, 7, 7, 7]).unwrap();
        auth.unblock_with_recovery_code(&DEFAULT_RECOVERY_CODE, Some(new_pin))
            .unwrap();
        assert!(auth.verify(PIN).is_err());
        auth.verify(&[7, 7, 7, 7]).unwrap();
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = Secret::new(PIN).unwrap();
        assert_eq!(format!("{:?}", secret), "Secret(<5 bytes>)");
    }

    #[test]
    fn test_recovery_code_debug_is_redacted() {
        let auth = authenticator();
        let rendered = format!("{:?}", auth);
        assert!(rendered.contains("RecoveryCode(<redacted>)"));
        assert!(!rendered.contains("9, 9"));
    }

    #[test]
    fn test_recovery_code_matches() {
        let code = RecoveryCode::new(DEFAULT_RECOVERY_CODE);
        assert!(code.matches(&DEFAULT_RECOVERY_CODE));
        assert!(!code.matches(&DEFAULT_RECOVERY_CODE[..7]));
        assert!(!code.matches(&[0x09; 9]));
    }
}
