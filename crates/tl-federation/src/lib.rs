//! # tl-federation
//!
//! Contracts for the external stores the trusted LDAP bridge talks to,
//! plus the group mapping and group synchronization logic built on them.
//!
//! ## Collaborators
//!
//! - [`DirectoryClient`] / [`DirectorySession`]: the LDAP directory
//! - [`ProfileStore`]: local user profiles, keyed by a stable external id
//! - [`GroupStore`]: local group membership
//!
//! Implementations are supplied by the embedding application. The
//! `tl-federation-ldap` crate provides an `ldap3` directory client.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod directory;
pub mod error;
pub mod group;
pub mod mapping;
pub mod profile;
pub mod sync;

pub use directory::{
    escape_dn_value, find_dn, format_template, DirectoryAttribute, DirectoryClient,
    DirectoryConnectionConfig, DirectorySearchSettings, DirectorySession, TlsSettings,
    DEFAULT_LDAP_PORT,
};
pub use error::{FederationError, FederationResult};
pub use group::GroupStore;
pub use mapping::GroupMapping;
pub use profile::{ProfileHandle, ProfileStore, ProfileUpdate};
pub use sync::{should_sync, GroupSyncMode, GroupSyncReport, GroupSynchronizer};
