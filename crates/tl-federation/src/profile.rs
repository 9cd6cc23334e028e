//! Local user profile contract.
//!
//! Profiles are keyed by the raw remote-user string (the external id)
//! rather than by the directory uid, so a reassigned uid never resolves to
//! someone else's profile.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::directory::DirectoryAttribute;
use crate::error::FederationResult;

/// Handle on a local user profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileHandle {
    /// Realm the profile belongs to.
    pub realm: String,

    /// Profile name within the realm.
    pub name: String,

    /// True if the profile does not exist yet and will be created by the
    /// next attribute synchronization.
    pub is_new: bool,
}

impl ProfileHandle {
    /// Creates a handle on an existing profile.
    #[must_use]
    pub fn existing(realm: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            realm: realm.into(),
            name: name.into(),
            is_new: false,
        }
    }

    /// Creates a handle on a profile that does not exist yet.
    #[must_use]
    pub fn new_profile(realm: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            realm: realm.into(),
            name: name.into(),
            is_new: true,
        }
    }

    /// Returns `realm:name`.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.realm, self.name)
    }

    /// Returns the profile name without its realm.
    #[must_use]
    pub fn unqualified_name(&self) -> &str {
        &self.name
    }
}

/// Attribute refresh applied to a profile after a directory lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    /// Stable external id stored on the profile (the raw remote user).
    pub external_id: String,

    /// DN of the directory entry.
    pub dn: String,

    /// Profile fields mapped from directory attributes.
    pub fields: BTreeMap<String, String>,

    /// Every attribute fetched from the directory.
    pub attributes: Vec<DirectoryAttribute>,
}

/// Local profile store.
///
/// Find-or-create must be safe under concurrent requests for the same new
/// identity; the store owns that guarantee.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Finds the profile carrying `external_id`.
    async fn find_by_external_id(
        &self,
        realm: &str,
        external_id: &str,
    ) -> FederationResult<Option<ProfileHandle>>;

    /// Finds the profile whose stored id is the plain directory `uid`.
    async fn find_by_uid(&self, realm: &str, uid: &str) -> FederationResult<Option<ProfileHandle>>;

    /// Resolves the profile for `external_id`, allocating a new handle
    /// named after `page_name` when none exists.
    async fn profile_by_uid(
        &self,
        realm: &str,
        page_name: &str,
        external_id: &str,
    ) -> FederationResult<ProfileHandle>;

    /// Refreshes the profile from directory attributes, creating it if new.
    async fn sync_attributes(
        &self,
        profile: &ProfileHandle,
        update: &ProfileUpdate,
    ) -> FederationResult<()>;
}
