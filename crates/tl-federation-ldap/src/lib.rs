//! # tl-federation-ldap
//!
//! Directory client for the trusted LDAP bridge, built on `ldap3`.
//!
//! [`LdapDirectoryClient`] opens one connection per authentication
//! attempt, binds as the configured service account and hands back an
//! [`LdapSession`] implementing the federation directory contract.
//!
//! ## Security
//!
//! - `ldaps://` is used whenever TLS is configured; an optional PEM trust
//!   anchor replaces the platform roots
//! - passwords are never logged
//! - filter values are escaped before substitution

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod connection;
pub mod error;
pub mod search;

pub use connection::{LdapDirectoryClient, LdapSession};
pub use error::{LdapError, LdapResult};
pub use search::{group_filter, ldap_escape, user_filter, LdapEntry};
