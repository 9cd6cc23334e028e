//! Authentication error types.

use std::fmt;

use tl_core::ConfigError;
use tl_federation::FederationError;

/// SSO authentication errors.
///
/// Only [`AuthError::CredentialValidation`] denies access outright; every
/// other error makes the authenticator fall back to conventional
/// authentication.
#[derive(Debug)]
pub enum AuthError {
    /// Configuration could not be interpreted.
    Configuration(String),
    /// The remote identity could not be resolved.
    IdentityResolution(String),
    /// Opening or binding the directory connection failed.
    DirectoryBind(String),
    /// The submitted password was rejected.
    CredentialValidation(String),
    /// A directory operation failed.
    Directory(String),
    /// The profile store failed.
    Profile(String),
    /// Internal error.
    Internal(String),
}

impl AuthError {
    /// Creates an identity resolution error.
    #[must_use]
    pub fn identity(msg: impl Into<String>) -> Self {
        Self::IdentityResolution(msg.into())
    }

    /// Creates a credential validation error.
    #[must_use]
    pub fn credentials(msg: impl Into<String>) -> Self {
        Self::CredentialValidation(msg.into())
    }

    /// Checks if this error denies access instead of falling back.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::CredentialValidation(_))
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "configuration error: {msg}"),
            Self::IdentityResolution(msg) => write!(f, "cannot resolve remote identity: {msg}"),
            Self::DirectoryBind(msg) => write!(f, "bind to LDAP server failed: {msg}"),
            Self::CredentialValidation(msg) => write!(f, "LDAP authentication failed: {msg}"),
            Self::Directory(msg) => write!(f, "directory error: {msg}"),
            Self::Profile(msg) => write!(f, "profile error: {msg}"),
            Self::Internal(msg) => write!(f, "internal authentication error: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<ConfigError> for AuthError {
    fn from(err: ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<FederationError> for AuthError {
    fn from(err: FederationError) -> Self {
        match err {
            FederationError::DirectoryBind(msg) => Self::DirectoryBind(msg),
            FederationError::CredentialValidation(msg) => Self::CredentialValidation(msg),
            FederationError::Directory(msg) => Self::Directory(msg),
            FederationError::Profile(msg) => Self::Profile(msg),
            FederationError::Group(_) => Self::Internal(err.to_string()),
        }
    }
}

/// Result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;
