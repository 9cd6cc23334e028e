//! Cookie cipher error types.
//!
//! These errors never leave the cipher: [`crate::CookieCipher`] logs them
//! and reports "no value" to the caller.

use thiserror::Error;

/// Errors raised while encrypting or decrypting a cookie token.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// No encryption secret is configured.
    #[error("encryption key not defined (property xwiki.authentication.encryptionKey)")]
    KeyUnavailable,

    /// The configured secret is too short for a triple-DES key.
    #[error("encryption key must be at least {expected} bytes, got {actual}")]
    InvalidKeyLength {
        /// Required length in bytes.
        expected: usize,
        /// Length of the configured secret in bytes.
        actual: usize,
    },

    /// The token is not valid base64.
    #[error("token decoding failed: {0}")]
    Decode(String),

    /// The decrypted block padding is invalid (wrong key or tampered token).
    #[error("invalid padding in decrypted token")]
    Padding,

    /// The decrypted bytes are not UTF-8.
    #[error("decrypted token is not valid UTF-8")]
    Utf8,
}

/// Result type for cookie cipher operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
