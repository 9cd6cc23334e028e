//! Common test utilities and fixtures.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cookie::Cookie;
use http::header::{COOKIE, SET_COOKIE};
use http::{HeaderMap, Request};

use tl_auth::{
    AuthResult, BaseAuthenticator, HttpExchange, Principal, RequestExchange, SsoAuthenticator,
    REMOTE_USER_HEADER, SSO_COOKIE_NAME,
};
use tl_core::{ConfigProvider, StaticConfig};
use tl_crypto::CookieCipher;
use tl_federation::{
    DirectoryAttribute, DirectoryClient, DirectoryConnectionConfig, DirectorySession,
    FederationError, FederationResult, GroupStore, ProfileHandle, ProfileStore, ProfileUpdate,
};

/// Realm where SSO profiles live.
pub const MAIN_REALM: &str = "xwiki";

pub const ADMIN_GROUP: &str = "XWiki.XWikiAdminGroup";
pub const USERS_GROUP: &str = "XWiki.LdapUsers";

pub const EXAMPLE_HOST: &str = "ldap.example.com";
pub const CORP_HOST: &str = "ldap.corp.example.com";

const SERVICE_DN: &str = "cn=admin,dc=example,dc=com";
const SERVICE_PASSWORD: &str = "secret";

pub const CONFIG: &str = r#"
[xwiki.authentication]
encryptionKey = "kx3Qp8vN2mZr7Lw4Ts9Yb6Hd1Gf5Jc0E"

[xwiki.authentication.ldap]
server = "ldap.default.example.com"
port = 389
base_DN = "dc=example,dc=com"
bind_DN = "cn=admin,dc=example,dc=com"
bind_pass = "secret"
UID_attr = "uid"
group_mapping = "XWiki.XWikiAdminGroup=cn=admins,ou=groups,dc=example,dc=com|XWiki.LdapUsers=cn=users,ou=groups,dc=example,dc=com"

[xwiki.authentication.trustedldap]
remoteUserParser = "(.+)@(.+)"
"remoteUserMapping.1" = "login"
"remoteUserMapping.2" = "ldap_server,ldap_base_DN"
"remoteUserMapping.ldap_server" = "example=ldap.example.com|corp=ldap.corp.example.com"
"remoteUserMapping.ldap_base_DN" = "example=dc=example,dc=com|corp=dc=corp,dc=example,dc=com"
"#;

/// Initializes tracing once for the whole test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("tl_auth=debug,tl_federation=debug")
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Directory
// ============================================================================

/// A user entry of the in-memory directory.
#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    pub dn: String,
    pub password: String,
    pub attributes: Vec<(String, String)>,
    pub groups: HashSet<String>,
}

/// In-memory directory keyed by server host and uid.
#[derive(Default)]
pub struct InMemoryDirectory {
    entries: HashMap<(String, String), DirectoryEntry>,
    opens: Mutex<Vec<DirectoryConnectionConfig>>,
    binds: Mutex<Vec<String>>,
    closes: AtomicUsize,
}

impl InMemoryDirectory {
    /// Two servers, each with its own `jdoe`, plus `asmith` in both groups.
    pub fn standard() -> Self {
        let mut directory = Self::default();
        directory.add(
            EXAMPLE_HOST,
            "jdoe",
            "uid=jdoe,ou=people,dc=example,dc=com",
            "jdoe-pw",
            &[("givenName", "John"), ("sn", "Doe"), ("mail", "jdoe@example.com")],
            &["cn=users,ou=groups,dc=example,dc=com"],
        );
        directory.add(
            EXAMPLE_HOST,
            "asmith",
            "uid=asmith,ou=people,dc=example,dc=com",
            "asmith-pw",
            &[("givenName", "Alice"), ("sn", "Smith"), ("mail", "asmith@example.com")],
            &[
                "CN=Admins,OU=Groups,DC=example,DC=com",
                "cn=users,ou=groups,dc=example,dc=com",
            ],
        );
        directory.add(
            CORP_HOST,
            "jdoe",
            "uid=jdoe,ou=people,dc=corp,dc=example,dc=com",
            "corp-pw",
            &[("givenName", "Jane"), ("sn", "Doe"), ("mail", "jane.doe@corp.example.com")],
            &["cn=admins,ou=groups,dc=example,dc=com"],
        );
        directory
    }

    pub fn add(
        &mut self,
        host: &str,
        uid: &str,
        dn: &str,
        password: &str,
        attributes: &[(&str, &str)],
        groups: &[&str],
    ) {
        self.entries.insert(
            (host.to_string(), uid.to_string()),
            DirectoryEntry {
                dn: dn.to_string(),
                password: password.to_string(),
                attributes: attributes
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
                groups: groups.iter().map(|g| (*g).to_string()).collect(),
            },
        );
    }

    /// Hosts of every opened connection, in order.
    pub fn opened_hosts(&self) -> Vec<String> {
        self.opens
            .lock()
            .unwrap()
            .iter()
            .map(|config| config.host.clone())
            .collect()
    }

    pub fn open_count(&self) -> usize {
        self.opens.lock().unwrap().len()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// DNs of every bind after the service bind.
    pub fn binds(&self) -> Vec<String> {
        self.binds.lock().unwrap().clone()
    }

    fn has_host(&self, host: &str) -> bool {
        self.entries.keys().any(|(h, _)| h == host)
    }

    fn entry_by_dn(&self, host: &str, dn: &str) -> Option<&DirectoryEntry> {
        self.entries
            .iter()
            .find(|((h, _), entry)| h == host && entry.dn.eq_ignore_ascii_case(dn))
            .map(|(_, entry)| entry)
    }
}

/// [`DirectoryClient`] over a shared [`InMemoryDirectory`].
pub struct InMemoryDirectoryClient(pub Arc<InMemoryDirectory>);

#[async_trait]
impl DirectoryClient for InMemoryDirectoryClient {
    async fn open(
        &self,
        config: &DirectoryConnectionConfig,
    ) -> FederationResult<Box<dyn DirectorySession>> {
        let directory = &self.0;
        directory.opens.lock().unwrap().push(config.clone());

        if !directory.has_host(&config.host) {
            return Err(FederationError::bind(format!(
                "{}: connection refused",
                config.url()
            )));
        }
        if config.bind_dn != SERVICE_DN || config.bind_password != SERVICE_PASSWORD {
            return Err(FederationError::bind(format!("{}: rc=49", config.bind_dn)));
        }

        Ok(Box::new(InMemorySession {
            directory: Arc::clone(directory),
            host: config.host.clone(),
            uid_attribute: config.search.uid_attribute.clone(),
        }))
    }
}

struct InMemorySession {
    directory: Arc<InMemoryDirectory>,
    host: String,
    uid_attribute: String,
}

#[async_trait]
impl DirectorySession for InMemorySession {
    async fn bind(&mut self, dn: &str, password: &str) -> FederationResult<()> {
        self.directory.binds.lock().unwrap().push(dn.to_string());

        if dn == SERVICE_DN && password == SERVICE_PASSWORD {
            return Ok(());
        }
        match self.directory.entry_by_dn(&self.host, dn) {
            Some(entry) if entry.password == password => Ok(()),
            _ => Err(FederationError::credentials(format!("{dn}: rc=49"))),
        }
    }

    async fn check_password(
        &mut self,
        dn: &str,
        password: &str,
        _attribute: &str,
    ) -> FederationResult<bool> {
        Ok(self
            .directory
            .entry_by_dn(&self.host, dn)
            .is_some_and(|entry| entry.password == password))
    }

    async fn search_attributes_by_uid(
        &mut self,
        uid: &str,
        attribute_names: &[String],
    ) -> FederationResult<Vec<DirectoryAttribute>> {
        let key = (self.host.clone(), uid.to_string());
        let Some(entry) = self.directory.entries.get(&key) else {
            return Ok(Vec::new());
        };

        let mut attributes = vec![
            DirectoryAttribute::new("dn", entry.dn.clone()),
            DirectoryAttribute::new(self.uid_attribute.clone(), uid),
        ];
        attributes.extend(
            entry
                .attributes
                .iter()
                .filter(|(name, _)| attribute_names.iter().any(|n| n.eq_ignore_ascii_case(name)))
                .map(|(name, value)| DirectoryAttribute::new(name.clone(), value.clone())),
        );
        Ok(attributes)
    }

    async fn groups_for_user_dn(&mut self, dn: &str) -> FederationResult<HashSet<String>> {
        Ok(self
            .directory
            .entry_by_dn(&self.host, dn)
            .map(|entry| entry.groups.clone())
            .unwrap_or_default())
    }

    async fn close(&mut self) -> FederationResult<()> {
        self.directory.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Profiles and Groups
// ============================================================================

/// In-memory profile store; a taken page name gets a numeric suffix.
#[derive(Default)]
pub struct InMemoryProfiles {
    by_external_id: Mutex<HashMap<String, String>>,
    by_uid: Mutex<HashMap<String, String>>,
    fields: Mutex<HashMap<String, BTreeMap<String, String>>>,
}

impl InMemoryProfiles {
    /// Registers a profile created before external ids were stored.
    pub fn add_legacy(&self, uid: &str, name: &str) {
        self.by_uid
            .lock()
            .unwrap()
            .insert(uid.to_string(), name.to_string());
        self.fields
            .lock()
            .unwrap()
            .insert(name.to_string(), BTreeMap::new());
    }

    /// Registers an existing profile for `external_id`.
    pub fn add_existing(&self, external_id: &str, name: &str) {
        self.by_external_id
            .lock()
            .unwrap()
            .insert(external_id.to_string(), name.to_string());
        self.fields
            .lock()
            .unwrap()
            .insert(name.to_string(), BTreeMap::new());
    }

    /// Stored profile field.
    pub fn field(&self, name: &str, field: &str) -> Option<String> {
        self.fields
            .lock()
            .unwrap()
            .get(name)
            .and_then(|fields| fields.get(field).cloned())
    }

    pub fn count(&self) -> usize {
        self.fields.lock().unwrap().len()
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfiles {
    async fn find_by_external_id(
        &self,
        realm: &str,
        external_id: &str,
    ) -> FederationResult<Option<ProfileHandle>> {
        Ok(self
            .by_external_id
            .lock()
            .unwrap()
            .get(external_id)
            .map(|name| ProfileHandle::existing(realm, name)))
    }

    async fn find_by_uid(&self, realm: &str, uid: &str) -> FederationResult<Option<ProfileHandle>> {
        Ok(self
            .by_uid
            .lock()
            .unwrap()
            .get(uid)
            .map(|name| ProfileHandle::existing(realm, name)))
    }

    async fn profile_by_uid(
        &self,
        realm: &str,
        page_name: &str,
        external_id: &str,
    ) -> FederationResult<ProfileHandle> {
        if let Some(existing) = self.find_by_external_id(realm, external_id).await? {
            return Ok(existing);
        }

        let fields = self.fields.lock().unwrap();
        let name = (0..)
            .map(|n| {
                if n == 0 {
                    page_name.to_string()
                } else {
                    format!("{page_name}_{n}")
                }
            })
            .find(|candidate| !fields.contains_key(candidate))
            .ok_or_else(|| FederationError::profile("no free profile name"))?;

        Ok(ProfileHandle::new_profile(realm, name))
    }

    async fn sync_attributes(
        &self,
        profile: &ProfileHandle,
        update: &ProfileUpdate,
    ) -> FederationResult<()> {
        self.by_external_id
            .lock()
            .unwrap()
            .insert(update.external_id.clone(), profile.name.clone());
        self.fields
            .lock()
            .unwrap()
            .insert(profile.name.clone(), update.fields.clone());
        Ok(())
    }
}

/// In-memory group store.
#[derive(Default)]
pub struct InMemoryGroups {
    members: Mutex<HashMap<String, HashSet<String>>>,
    writes: AtomicUsize,
}

impl InMemoryGroups {
    pub fn add(&self, group: &str, profile: &str) {
        self.members
            .lock()
            .unwrap()
            .entry(group.to_string())
            .or_default()
            .insert(profile.to_string());
    }

    pub fn has_member(&self, group: &str, profile: &str) -> bool {
        self.members
            .lock()
            .unwrap()
            .get(group)
            .is_some_and(|members| members.contains(profile))
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GroupStore for InMemoryGroups {
    async fn is_member(&self, group: &str, profile: &ProfileHandle) -> FederationResult<bool> {
        Ok(self.has_member(group, &profile.name))
    }

    async fn add_member(&self, group: &str, profile: &ProfileHandle) -> FederationResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.add(group, &profile.name);
        Ok(())
    }

    async fn remove_member(&self, group: &str, profile: &ProfileHandle) -> FederationResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if let Some(members) = self.members.lock().unwrap().get_mut(group) {
            members.remove(&profile.name);
        }
        Ok(())
    }
}

// ============================================================================
// Base Authenticator
// ============================================================================

/// Conventional authenticator that counts its calls and never succeeds.
#[derive(Default)]
pub struct RecordingBase {
    calls: AtomicUsize,
}

impl RecordingBase {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BaseAuthenticator for RecordingBase {
    async fn check_auth(&self, _exchange: &mut dyn HttpExchange) -> AuthResult<Option<Principal>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }

    async fn check_auth_with_credentials(
        &self,
        _exchange: &mut dyn HttpExchange,
        _username: Option<&str>,
        _password: Option<&str>,
        _remember_me: Option<&str>,
    ) -> AuthResult<Option<Principal>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }

    async fn authenticate(
        &self,
        _login: Option<&str>,
        _password: Option<&str>,
        _exchange: &mut dyn HttpExchange,
    ) -> AuthResult<Option<Principal>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }
}

// ============================================================================
// Test Environment
// ============================================================================

/// Result of serving one request.
pub struct Served {
    pub principal: Option<Principal>,
    pub headers: HeaderMap,
}

impl Served {
    /// Value of the SSO cookie set on the response, if any.
    pub fn sso_cookie(&self) -> Option<String> {
        self.set_cookies()
            .into_iter()
            .filter_map(|header| Cookie::parse(header).ok())
            .find(|cookie| cookie.name() == SSO_COOKIE_NAME)
            .map(|cookie| cookie.value().to_string())
    }

    /// Every `Set-Cookie` header value.
    pub fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(String::from)
            .collect()
    }
}

/// SSO authenticator wired to in-memory collaborators.
pub struct TestEnv {
    pub directory: Arc<InMemoryDirectory>,
    pub profiles: Arc<InMemoryProfiles>,
    pub groups: Arc<InMemoryGroups>,
    pub base: Arc<RecordingBase>,
    pub auth: SsoAuthenticator,
}

impl TestEnv {
    /// Creates an environment from the standard configuration.
    pub fn new() -> anyhow::Result<Self> {
        Self::with_overrides(&[])
    }

    /// Creates an environment from the standard configuration with extra
    /// static parameters.
    pub fn with_overrides(overrides: &[(&str, &str)]) -> anyhow::Result<Self> {
        Self::build(overrides, InMemoryProfiles::default(), InMemoryGroups::default())
    }

    /// Creates an environment with pre-populated stores.
    pub fn build(
        overrides: &[(&str, &str)],
        profiles: InMemoryProfiles,
        groups: InMemoryGroups,
    ) -> anyhow::Result<Self> {
        init_tracing();

        let config = overrides
            .iter()
            .fold(StaticConfig::from_toml_str(CONFIG)?, |config, (key, value)| {
                config.with(*key, *value)
            });
        let provider = ConfigProvider::from_static(config);
        let cipher = CookieCipher::from_config(&provider);
        anyhow::ensure!(cipher.is_available(), "test cipher must be available");

        let directory = Arc::new(InMemoryDirectory::standard());
        let profiles = Arc::new(profiles);
        let groups = Arc::new(groups);
        let base = Arc::new(RecordingBase::default());

        let auth = SsoAuthenticator::new(
            provider,
            cipher,
            Arc::new(InMemoryDirectoryClient(Arc::clone(&directory))),
            profiles.clone(),
            groups.clone(),
            base.clone(),
        );

        Ok(Self {
            directory,
            profiles,
            groups,
            base,
            auth,
        })
    }

    /// Serves `request` in `realm` through `check_auth`.
    pub async fn serve(&self, request: &Request<()>, realm: &str) -> anyhow::Result<Served> {
        let mut exchange = RequestExchange::from_request(request, realm, MAIN_REALM);
        let principal = self.auth.check_auth(&mut exchange).await?;

        let mut headers = HeaderMap::new();
        exchange.apply_cookies(&mut headers);

        Ok(Served { principal, headers })
    }
}

/// Builds a `GET` request with an optional remote user and SSO cookie.
pub fn request(
    path: &str,
    remote_user: Option<&str>,
    sso_cookie: Option<&str>,
) -> anyhow::Result<Request<()>> {
    let mut builder = Request::builder().uri(path);
    if let Some(remote_user) = remote_user {
        builder = builder.header(REMOTE_USER_HEADER, remote_user);
    }
    if let Some(token) = sso_cookie {
        builder = builder.header(COOKIE, format!("JSESSIONID=abc; {SSO_COOKIE_NAME}={token}"));
    }
    Ok(builder.body(())?)
}
