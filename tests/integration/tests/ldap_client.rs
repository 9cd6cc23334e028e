//! SSO over the `ldap3` directory client.

use std::sync::Arc;
use std::time::Duration;

use tl_auth::{RequestExchange, SsoAuthenticator};
use tl_core::{ConfigProvider, StaticConfig};
use tl_crypto::CookieCipher;
use tl_federation::{DirectoryClient, DirectoryConnectionConfig, TlsSettings};
use tl_federation_ldap::LdapDirectoryClient;

use crate::common::{init_tracing, InMemoryGroups, InMemoryProfiles, RecordingBase, MAIN_REALM};

fn client() -> LdapDirectoryClient {
    LdapDirectoryClient::new()
        .with_connection_timeout(Duration::from_secs(2))
        .with_operation_timeout(Duration::from_secs(2))
}

/// Tests that a refused connection makes SSO fall back.
#[tokio::test]
async fn test_refused_connection_falls_back() -> anyhow::Result<()> {
    init_tracing();

    let config = StaticConfig::new()
        .with("xwiki.authentication.encryptionKey", "kx3Qp8vN2mZr7Lw4Ts9Yb6Hd1Gf5Jc0E")
        .with("xwiki.authentication.ldap.server", "127.0.0.1")
        .with("xwiki.authentication.ldap.port", "1");
    let provider = ConfigProvider::from_static(config);
    let cipher = CookieCipher::from_config(&provider);
    let base = Arc::new(RecordingBase::default());

    let auth = SsoAuthenticator::new(
        provider,
        cipher,
        Arc::new(client()),
        Arc::new(InMemoryProfiles::default()),
        Arc::new(InMemoryGroups::default()),
        base.clone(),
    );

    let mut exchange = RequestExchange::new(MAIN_REALM, MAIN_REALM).with_remote_user("jdoe");
    let principal = auth.check_auth(&mut exchange).await?;

    assert_eq!(principal, None);
    assert_eq!(base.calls(), 1);
    assert!(exchange.outgoing_cookies().is_empty());

    Ok(())
}

/// Tests that an unreadable trust store fails before connecting.
#[tokio::test]
async fn test_missing_trust_store_is_a_bind_error() -> anyhow::Result<()> {
    init_tracing();

    let config = DirectoryConnectionConfig::new("127.0.0.1", 1).with_tls(TlsSettings {
        keystore: Some("/nonexistent/ca.pem".to_string()),
    });

    let err = match client().open(&config).await {
        Ok(_) => anyhow::bail!("open must fail without a trust store"),
        Err(e) => e,
    };
    assert!(err.is_bind_error());
    assert!(err.to_string().contains("/nonexistent/ca.pem"));

    Ok(())
}
