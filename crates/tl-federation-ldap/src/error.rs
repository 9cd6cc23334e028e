//! LDAP-specific error types.
//!
//! ## Security Note
//!
//! Error messages must not leak sensitive information like
//! passwords or bind credentials.

use thiserror::Error;
use tl_federation::FederationError;

/// LDAP result code for rejected credentials.
pub(crate) const INVALID_CREDENTIALS: u32 = 49;

/// LDAP-specific errors.
#[derive(Debug, Error)]
pub enum LdapError {
    /// Connection failed.
    #[error("LDAP connection failed: {0}")]
    Connection(String),

    /// TLS/SSL error.
    #[error("LDAP TLS error: {0}")]
    Tls(String),

    /// Service account bind failed.
    #[error("LDAP bind failed: {0}")]
    Bind(String),

    /// The server rejected a user's credentials.
    #[error("Invalid credentials for {0}")]
    InvalidCredentials(String),

    /// Search operation failed.
    #[error("LDAP search failed: {0}")]
    Search(String),

    /// Compare operation failed.
    #[error("LDAP compare failed: {0}")]
    Compare(String),

    /// Timeout error.
    #[error("LDAP operation timed out")]
    Timeout,
}

impl LdapError {
    /// Creates a TLS error.
    #[must_use]
    pub fn tls(msg: impl Into<String>) -> Self {
        Self::Tls(msg.into())
    }

    /// Wraps an `ldap3` error with `kind`, keeping timeouts distinct.
    pub(crate) fn from_ldap3(err: ldap3::LdapError, kind: impl FnOnce(String) -> Self) -> Self {
        match err {
            ldap3::LdapError::Timeout { .. } => Self::Timeout,
            other => kind(other.to_string()),
        }
    }

    /// Checks if this error prevents opening a session.
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Tls(_) | Self::Bind(_) | Self::Timeout
        )
    }
}

/// Result type for LDAP operations.
pub type LdapResult<T> = Result<T, LdapError>;

impl From<LdapError> for FederationError {
    fn from(err: LdapError) -> Self {
        let msg = err.to_string();
        if err.is_connection_error() {
            FederationError::DirectoryBind(msg)
        } else if matches!(err, LdapError::InvalidCredentials(_)) {
            FederationError::CredentialValidation(msg)
        } else {
            FederationError::Directory(msg)
        }
    }
}
