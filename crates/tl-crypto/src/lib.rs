//! # tl-crypto
//!
//! Encryption of the SSO cookie that caches an authenticated identity.
//!
//! ## Security Note
//!
//! The cookie scheme is a legacy, wire-compatible format. See
//! [`cookie`] for the review items it carries.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cookie;
pub mod error;

pub use cookie::{CookieCipher, ENCRYPTION_KEY_PARAM, KEY_LENGTH};
pub use error::{CryptoError, CryptoResult};
