//! Federation error types.
//!
//! Each variant maps to one failure class of an authentication attempt.
//! The category predicates let the authenticator decide between falling
//! back to conventional authentication and rejecting the attempt.

use thiserror::Error;

/// Errors raised by directory, profile and group collaborators.
#[derive(Debug, Error)]
pub enum FederationError {
    /// Opening or binding the directory connection failed.
    #[error("Bind to LDAP server failed: {0}")]
    DirectoryBind(String),

    /// The submitted credentials do not match the directory entry.
    #[error("LDAP authentication failed: {0}")]
    CredentialValidation(String),

    /// A directory operation other than bind failed.
    #[error("Directory error: {0}")]
    Directory(String),

    /// The profile store failed.
    #[error("Profile store error: {0}")]
    Profile(String),

    /// The group store failed.
    #[error("Group store error: {0}")]
    Group(String),
}

impl FederationError {
    /// Creates a directory bind error.
    #[must_use]
    pub fn bind(msg: impl Into<String>) -> Self {
        Self::DirectoryBind(msg.into())
    }

    /// Creates a credential validation error.
    #[must_use]
    pub fn credentials(msg: impl Into<String>) -> Self {
        Self::CredentialValidation(msg.into())
    }

    /// Creates a directory error.
    #[must_use]
    pub fn directory(msg: impl Into<String>) -> Self {
        Self::Directory(msg.into())
    }

    /// Creates a profile store error.
    #[must_use]
    pub fn profile(msg: impl Into<String>) -> Self {
        Self::Profile(msg.into())
    }

    /// Creates a group store error.
    #[must_use]
    pub fn group(msg: impl Into<String>) -> Self {
        Self::Group(msg.into())
    }

    /// Checks if this is a directory bind error.
    #[must_use]
    pub const fn is_bind_error(&self) -> bool {
        matches!(self, Self::DirectoryBind(_))
    }

    /// Checks if this is a credential validation error.
    #[must_use]
    pub const fn is_credential_error(&self) -> bool {
        matches!(self, Self::CredentialValidation(_))
    }
}

/// Result type for federation operations.
pub type FederationResult<T> = Result<T, FederationError>;
