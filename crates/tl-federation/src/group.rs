//! Local group membership contract.

use async_trait::async_trait;

use crate::error::FederationResult;
use crate::profile::ProfileHandle;

/// Local group store.
#[async_trait]
pub trait GroupStore: Send + Sync {
    /// Returns true if `profile` is a member of `group`.
    async fn is_member(&self, group: &str, profile: &ProfileHandle) -> FederationResult<bool>;

    /// Adds `profile` to `group`.
    async fn add_member(&self, group: &str, profile: &ProfileHandle) -> FederationResult<()>;

    /// Removes `profile` from `group`.
    async fn remove_member(&self, group: &str, profile: &ProfileHandle) -> FederationResult<()>;
}
