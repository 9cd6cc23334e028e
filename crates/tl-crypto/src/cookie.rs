//! Triple-DES cookie token cipher.
//!
//! **WARNING**: this scheme does NOT meet current cryptographic practice.
//! It is kept byte-for-byte compatible with cookies issued by existing
//! deployments:
//!
//! - the key is the first 24 bytes of the configured secret, with no key
//!   derivation or stretching;
//! - DES-EDE3 in ECB mode with PKCS#7 padding (identical plaintexts give
//!   identical tokens);
//! - no integrity tag, so a token is only as trustworthy as the secret.
//!
//! A failed decryption is reported as "no cached session", which sends the
//! caller back through the directory; it never yields a principal.
//!
//! ## Token format
//!
//! `base64(3des(plaintext))` with every `=` replaced by `_` so the token is
//! safe in a cookie value.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine};
use des::TdesEde3;
use ecb::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyInit};
use tl_core::ConfigProvider;

use crate::error::{CryptoError, CryptoResult};

type TdesEcbEnc = ecb::Encryptor<TdesEde3>;
type TdesEcbDec = ecb::Decryptor<TdesEde3>;

/// Length of a 3-key triple-DES key in bytes.
pub const KEY_LENGTH: usize = 24;

/// Static configuration key holding the system-wide secret.
pub const ENCRYPTION_KEY_PARAM: &str = "xwiki.authentication.encryptionKey";

/// Encrypts and decrypts SSO cookie tokens.
#[derive(Clone)]
pub struct CookieCipher {
    key: Option<[u8; KEY_LENGTH]>,
}

impl CookieCipher {
    /// Creates a cipher from the administrator-supplied secret.
    ///
    /// The cipher is unavailable when no secret is given or when the secret
    /// is shorter than [`KEY_LENGTH`] bytes.
    #[must_use]
    pub fn new(secret: Option<&str>) -> Self {
        match derive_key(secret) {
            Ok(key) => Self { key: Some(key) },
            Err(e) => {
                tracing::error!(error = %e, "Cookie encryption is unavailable");
                Self { key: None }
            }
        }
    }

    /// Creates a cipher from the system-wide `xwiki.authentication.encryptionKey`.
    #[must_use]
    pub fn from_config(config: &ConfigProvider) -> Self {
        Self::new(config.static_param(ENCRYPTION_KEY_PARAM))
    }

    /// Returns true if a usable key is configured.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.key.is_some()
    }

    /// Encrypts `plaintext` into a cookie-safe token.
    ///
    /// Returns `None` when the cipher is unavailable.
    #[must_use]
    pub fn encrypt(&self, plaintext: &str) -> Option<String> {
        match self.try_encrypt(plaintext) {
            Ok(token) => Some(token),
            Err(e) => {
                tracing::error!(error = %e, "Failed to encrypt text");
                None
            }
        }
    }

    /// Decrypts a token produced by [`Self::encrypt`].
    ///
    /// Returns `None` when the cipher is unavailable or the token cannot be
    /// decoded, decrypted or unpadded.
    #[must_use]
    pub fn decrypt(&self, token: &str) -> Option<String> {
        match self.try_decrypt(token) {
            Ok(plaintext) => Some(plaintext),
            Err(e) => {
                tracing::error!(error = %e, "Failed to decrypt text");
                None
            }
        }
    }

    fn try_encrypt(&self, plaintext: &str) -> CryptoResult<String> {
        let key = self.key.as_ref().ok_or(CryptoError::KeyUnavailable)?;
        let cipher = TdesEcbEnc::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength {
            expected: KEY_LENGTH,
            actual: key.len(),
        })?;

        let encrypted = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
        Ok(STANDARD.encode(encrypted).replace('=', "_"))
    }

    fn try_decrypt(&self, token: &str) -> CryptoResult<String> {
        let key = self.key.as_ref().ok_or(CryptoError::KeyUnavailable)?;

        // One byte per character; anything outside ASCII cannot be base64.
        if !token.is_ascii() {
            return Err(CryptoError::Decode("non-ASCII character in token".to_string()));
        }
        let encrypted = STANDARD
            .decode(token.replace('_', "="))
            .map_err(|e| CryptoError::Decode(e.to_string()))?;

        let cipher = TdesEcbDec::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength {
            expected: KEY_LENGTH,
            actual: key.len(),
        })?;
        let decrypted = cipher
            .decrypt_padded_vec_mut::<Pkcs7>(&encrypted)
            .map_err(|_| CryptoError::Padding)?;

        String::from_utf8(decrypted).map_err(|_| CryptoError::Utf8)
    }
}

impl fmt::Debug for CookieCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieCipher")
            .field("available", &self.is_available())
            .finish()
    }
}

fn derive_key(secret: Option<&str>) -> CryptoResult<[u8; KEY_LENGTH]> {
    let bytes = secret.ok_or(CryptoError::KeyUnavailable)?.as_bytes();
    if bytes.len() < KEY_LENGTH {
        return Err(CryptoError::InvalidKeyLength {
            expected: KEY_LENGTH,
            actual: bytes.len(),
        });
    }

    let mut key = [0u8; KEY_LENGTH];
    key.copy_from_slice(&bytes[..KEY_LENGTH]);
    Ok(key)
}
