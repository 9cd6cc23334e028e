//! LDAP connection and session management.
//!
//! Each [`LdapDirectoryClient::open`] call creates a fresh connection,
//! spawns its driver and binds as the service account. There is no pool:
//! the session lives for a single authentication attempt.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry};
use tl_federation::{
    DirectoryAttribute, DirectoryClient, DirectoryConnectionConfig, DirectorySession,
    FederationResult, TlsSettings,
};

use crate::error::{LdapError, LdapResult, INVALID_CREDENTIALS};
use crate::search::{group_filter, user_filter, LdapEntry};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Directory client opening one `ldap3` connection per attempt.
#[derive(Debug, Clone)]
pub struct LdapDirectoryClient {
    connection_timeout: Duration,
    operation_timeout: Duration,
}

impl Default for LdapDirectoryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl LdapDirectoryClient {
    /// Creates a client with default timeouts.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connection_timeout: DEFAULT_TIMEOUT,
            operation_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the connection timeout.
    #[must_use]
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Sets the per-operation timeout.
    #[must_use]
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Connects and binds as the configured account.
    async fn connect(&self, config: &DirectoryConnectionConfig) -> LdapResult<LdapSession> {
        let mut settings = LdapConnSettings::new().set_conn_timeout(self.connection_timeout);
        if let Some(tls) = &config.tls {
            settings = settings.set_connector(tls_connector(tls)?);
        }

        let url = config.url();
        tracing::debug!(url = %url, bind_dn = %config.bind_dn, "Connecting to LDAP");

        let (conn, ldap) = LdapConnAsync::with_settings(settings, &url)
            .await
            .map_err(|e| {
                LdapError::from_ldap3(e, |msg| LdapError::Connection(format!("{url}: {msg}")))
            })?;

        // Spawn connection driver
        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                tracing::warn!("LDAP connection driver error: {}", e);
            }
        });

        let mut session = LdapSession {
            ldap,
            config: config.clone(),
            timeout: self.operation_timeout,
        };

        session
            .ldap
            .with_timeout(self.operation_timeout)
            .simple_bind(&config.bind_dn, &config.bind_password)
            .await
            .map_err(|e| LdapError::from_ldap3(e, LdapError::Bind))?
            .success()
            .map_err(|e| LdapError::Bind(format!("{}: {e}", config.bind_dn)))?;

        Ok(session)
    }
}

#[async_trait]
impl DirectoryClient for LdapDirectoryClient {
    async fn open(
        &self,
        config: &DirectoryConnectionConfig,
    ) -> FederationResult<Box<dyn DirectorySession>> {
        match self.connect(config).await {
            Ok(session) => Ok(Box::new(session)),
            Err(e) => {
                tracing::warn!(url = %config.url(), error = %e, "Failed to open LDAP connection");
                Err(e.into())
            }
        }
    }
}

/// Builds a TLS connector trusting the configured PEM certificate.
fn tls_connector(tls: &TlsSettings) -> LdapResult<native_tls::TlsConnector> {
    let mut builder = native_tls::TlsConnector::builder();

    if let Some(path) = tls.keystore.as_deref().filter(|p| !p.is_empty()) {
        let pem = std::fs::read(path)
            .map_err(|e| LdapError::tls(format!("cannot read keystore {path}: {e}")))?;
        let cert = native_tls::Certificate::from_pem(&pem)
            .map_err(|e| LdapError::tls(format!("invalid certificate in {path}: {e}")))?;
        builder.add_root_certificate(cert);
    }

    builder.build().map_err(|e| LdapError::tls(e.to_string()))
}

/// An open, bound `ldap3` session.
pub struct LdapSession {
    ldap: Ldap,
    config: DirectoryConnectionConfig,
    timeout: Duration,
}

impl LdapSession {
    async fn search(&mut self, filter: &str, attributes: Vec<String>) -> LdapResult<Vec<LdapEntry>> {
        let (rs, _result) = self
            .ldap
            .with_timeout(self.timeout)
            .search(&self.config.base_dn, Scope::Subtree, filter, attributes)
            .await
            .map_err(|e| LdapError::from_ldap3(e, LdapError::Search))?
            .success()
            .map_err(|e| LdapError::Search(format!("{filter}: {e}")))?;

        Ok(rs
            .into_iter()
            .map(SearchEntry::construct)
            .map(LdapEntry::from_search_entry)
            .collect())
    }
}

#[async_trait]
impl DirectorySession for LdapSession {
    async fn bind(&mut self, dn: &str, password: &str) -> FederationResult<()> {
        let result = self
            .ldap
            .with_timeout(self.timeout)
            .simple_bind(dn, password)
            .await
            .map_err(|e| LdapError::from_ldap3(e, LdapError::Bind))?;

        match result.rc {
            0 => Ok(()),
            INVALID_CREDENTIALS => Err(LdapError::InvalidCredentials(dn.to_string()).into()),
            rc => Err(LdapError::Bind(format!("{dn}: rc={rc} {}", result.text)).into()),
        }
    }

    async fn check_password(
        &mut self,
        dn: &str,
        password: &str,
        attribute: &str,
    ) -> FederationResult<bool> {
        let result = self
            .ldap
            .with_timeout(self.timeout)
            .compare(dn, attribute, password)
            .await
            .map_err(|e| LdapError::from_ldap3(e, LdapError::Compare))?;

        match result.equal() {
            Ok(equal) => Ok(equal),
            Err(e) => {
                tracing::debug!(dn, attribute, error = %e, "Password comparison failed");
                Ok(false)
            }
        }
    }

    async fn search_attributes_by_uid(
        &mut self,
        uid: &str,
        attribute_names: &[String],
    ) -> FederationResult<Vec<DirectoryAttribute>> {
        let filter = user_filter(&self.config.search, uid);
        let attributes = if attribute_names.is_empty() {
            vec!["*".to_string()]
        } else {
            attribute_names.to_vec()
        };

        tracing::debug!(filter = %filter, base_dn = %self.config.base_dn, "Searching user");

        let entry = self.search(&filter, attributes).await?.into_iter().next();
        Ok(entry.map(LdapEntry::into_attributes).unwrap_or_default())
    }

    async fn groups_for_user_dn(&mut self, dn: &str) -> FederationResult<HashSet<String>> {
        let filter = group_filter(&self.config.search, dn);
        let entries = self.search(&filter, vec!["dn".to_string()]).await?;

        Ok(entries.into_iter().map(|entry| entry.dn).collect())
    }

    async fn close(&mut self) -> FederationResult<()> {
        self.ldap
            .unbind()
            .await
            .map_err(|e| LdapError::from_ldap3(e, LdapError::Connection))?;
        Ok(())
    }
}
