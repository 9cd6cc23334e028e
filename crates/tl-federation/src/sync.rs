//! Group membership synchronization.
//!
//! Membership is convergent: every mapped local group ends up holding the
//! profile exactly when the directory lists the user in one of the group's
//! mapped directory groups. Running a sync twice against an unchanged
//! directory makes no further change.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::directory::DirectorySession;
use crate::error::FederationResult;
use crate::group::GroupStore;
use crate::mapping::GroupMapping;
use crate::profile::ProfileHandle;

// ============================================================================
// Sync Mode
// ============================================================================

/// When group membership is synchronized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupSyncMode {
    /// On every successful authentication.
    #[default]
    Always,

    /// Only when the profile is created.
    Create,
}

impl GroupSyncMode {
    /// Parses a configured mode, case-insensitively.
    ///
    /// Only `create` is special; anything else means [`Self::Always`].
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("create") {
            Self::Create
        } else {
            Self::Always
        }
    }
}

/// Returns true if groups must be synchronized for this profile.
#[must_use]
pub const fn should_sync(mode: GroupSyncMode, is_new: bool) -> bool {
    !matches!(mode, GroupSyncMode::Create) || is_new
}

// ============================================================================
// Sync Report
// ============================================================================

/// Outcome of one group synchronization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSyncReport {
    /// Local groups the profile was added to.
    pub added: Vec<String>,

    /// Local groups the profile was removed from.
    pub removed: Vec<String>,

    /// Number of local groups already in the expected state.
    pub unchanged: usize,

    /// Local groups whose store update failed.
    pub failed: Vec<String>,

    /// When the sync started.
    pub started_at: DateTime<Utc>,

    /// When the sync completed.
    pub completed_at: DateTime<Utc>,
}

impl GroupSyncReport {
    /// Creates an empty report.
    #[must_use]
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            added: Vec::new(),
            removed: Vec::new(),
            unchanged: 0,
            failed: Vec::new(),
            started_at,
            completed_at: started_at,
        }
    }

    /// Marks the sync as complete.
    #[must_use]
    pub fn complete(mut self) -> Self {
        self.completed_at = Utc::now();
        self
    }

    /// Returns true if any membership changed.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }

    /// Returns true if any store update failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

// ============================================================================
// Synchronizer
// ============================================================================

/// Converges local group membership with directory membership.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupSynchronizer;

impl GroupSynchronizer {
    /// Synchronizes the groups of `profile`, whose directory entry is `dn`.
    ///
    /// Directory group membership is fetched once. Group DNs are compared
    /// case-insensitively. The store is only written when membership must
    /// change; a failed write is logged, recorded and does not stop the
    /// remaining groups.
    ///
    /// ## Errors
    ///
    /// Returns an error if the directory group lookup fails.
    pub async fn sync(
        &self,
        profile: &ProfileHandle,
        dn: &str,
        mapping: &GroupMapping,
        session: &mut dyn DirectorySession,
        groups: &dyn GroupStore,
    ) -> FederationResult<GroupSyncReport> {
        let mut report = GroupSyncReport::new(Utc::now());

        let user_groups: HashSet<String> = session
            .groups_for_user_dn(dn)
            .await?
            .iter()
            .map(|g| g.to_lowercase())
            .collect();

        tracing::debug!(
            profile = %profile.name,
            dn,
            directory_groups = user_groups.len(),
            "Synchronizing group membership"
        );

        for (local, directory_groups) in mapping.iter() {
            let expected = directory_groups
                .iter()
                .any(|g| user_groups.contains(&g.to_lowercase()));

            match self.converge(profile, local, expected, groups).await {
                Ok(Some(true)) => report.added.push(local.to_string()),
                Ok(Some(false)) => report.removed.push(local.to_string()),
                Ok(None) => report.unchanged += 1,
                Err(e) => {
                    tracing::warn!(group = local, error = %e, "Failed to update group membership");
                    report.failed.push(local.to_string());
                }
            }
        }

        let report = report.complete();
        tracing::debug!(
            added = report.added.len(),
            removed = report.removed.len(),
            unchanged = report.unchanged,
            failed = report.failed.len(),
            "Group synchronization completed"
        );

        Ok(report)
    }

    /// Returns `Some(true)` when added, `Some(false)` when removed and
    /// `None` when nothing changed.
    async fn converge(
        &self,
        profile: &ProfileHandle,
        group: &str,
        expected: bool,
        groups: &dyn GroupStore,
    ) -> FederationResult<Option<bool>> {
        let current = groups.is_member(group, profile).await?;

        match (current, expected) {
            (false, true) => {
                groups.add_member(group, profile).await?;
                tracing::debug!(group, profile = %profile.name, "Added user to group");
                Ok(Some(true))
            }
            (true, false) => {
                groups.remove_member(group, profile).await?;
                tracing::debug!(group, profile = %profile.name, "Removed user from group");
                Ok(Some(false))
            }
            _ => Ok(None),
        }
    }
}
