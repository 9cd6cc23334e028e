//! Group membership synchronization tests.

use tl_auth::Principal;

use crate::common::{
    request, InMemoryGroups, InMemoryProfiles, TestEnv, ADMIN_GROUP, MAIN_REALM, USERS_GROUP,
};

const VIEW: &str = "/xwiki/bin/view/Main/WebHome";
const MODE_GROUP_SYNC: &str = "xwiki.authentication.trustedldap.ldap_mode_group_sync";

/// Tests that directory groups grant the mapped local groups.
#[tokio::test]
async fn test_groups_granted_on_login() -> anyhow::Result<()> {
    let env = TestEnv::new()?;

    let served = env.serve(&request(VIEW, Some("asmith@example"), None)?, MAIN_REALM).await?;

    assert_eq!(served.principal, Some(Principal::new("asmith")));
    assert!(env.groups.has_member(ADMIN_GROUP, "asmith"), "DN comparison ignores case");
    assert!(env.groups.has_member(USERS_GROUP, "asmith"));

    Ok(())
}

/// Tests that a membership the directory no longer grants is removed.
#[tokio::test]
async fn test_stale_membership_removed() -> anyhow::Result<()> {
    let profiles = InMemoryProfiles::default();
    profiles.add_existing("jdoe@example", "jdoe");
    let groups = InMemoryGroups::default();
    groups.add(ADMIN_GROUP, "jdoe");
    let env = TestEnv::build(&[], profiles, groups)?;

    env.serve(&request(VIEW, Some("jdoe@example"), None)?, MAIN_REALM).await?;

    assert!(!env.groups.has_member(ADMIN_GROUP, "jdoe"));
    assert!(env.groups.has_member(USERS_GROUP, "jdoe"));

    Ok(())
}

/// Tests that a converged membership is not written again.
#[tokio::test]
async fn test_sync_is_idempotent() -> anyhow::Result<()> {
    let env = TestEnv::new()?;

    env.serve(&request(VIEW, Some("asmith@example"), None)?, MAIN_REALM).await?;
    let writes = env.groups.write_count();
    assert_eq!(writes, 2);

    env.serve(&request(VIEW, Some("asmith@example"), None)?, MAIN_REALM).await?;
    assert_eq!(env.groups.write_count(), writes);

    Ok(())
}

/// Tests that "create" mode leaves existing profiles untouched.
#[tokio::test]
async fn test_create_mode_skips_existing_profile() -> anyhow::Result<()> {
    let profiles = InMemoryProfiles::default();
    profiles.add_existing("jdoe@example", "jdoe");
    let groups = InMemoryGroups::default();
    groups.add(ADMIN_GROUP, "jdoe");
    let env = TestEnv::build(&[(MODE_GROUP_SYNC, "create")], profiles, groups)?;

    env.serve(&request(VIEW, Some("jdoe@example"), None)?, MAIN_REALM).await?;

    assert!(env.groups.has_member(ADMIN_GROUP, "jdoe"));
    assert!(!env.groups.has_member(USERS_GROUP, "jdoe"));
    assert_eq!(env.groups.write_count(), 0);

    Ok(())
}

/// Tests that "create" mode synchronizes a new profile.
#[tokio::test]
async fn test_create_mode_syncs_new_profile() -> anyhow::Result<()> {
    let env = TestEnv::with_overrides(&[(MODE_GROUP_SYNC, "Create")])?;

    env.serve(&request(VIEW, Some("jdoe@example"), None)?, MAIN_REALM).await?;

    assert!(env.groups.has_member(USERS_GROUP, "jdoe"));
    assert!(!env.groups.has_member(ADMIN_GROUP, "jdoe"));

    Ok(())
}

/// Tests a per-domain group mapping extracted from the remote user.
#[tokio::test]
async fn test_request_group_mapping_override() -> anyhow::Result<()> {
    let env = TestEnv::with_overrides(&[
        (
            "xwiki.authentication.trustedldap.remoteUserMapping.2",
            "ldap_server,ldap_base_DN,ldap_group_mapping",
        ),
        (
            "xwiki.authentication.trustedldap.remoteUserMapping.ldap_group_mapping",
            "corp=XWiki.CorpAdmins=cn=admins,ou=groups,dc=example,dc=com",
        ),
    ])?;

    let served = env.serve(&request(VIEW, Some("jdoe@corp"), None)?, MAIN_REALM).await?;

    assert_eq!(served.principal, Some(Principal::new("jdoe")));
    assert!(env.groups.has_member("XWiki.CorpAdmins", "jdoe"));
    assert!(
        !env.groups.has_member(ADMIN_GROUP, "jdoe"),
        "The override replaces the realm mapping"
    );

    Ok(())
}
