//! Trusted remote-user SSO authenticator.
//!
//! ## Flow
//!
//! ```text
//! START ──logout──────────────────────────────────────► LoggedOut
//!   │
//!   ▼
//! COOKIE_CHECK ──decrypts──────────────────────────────► Authenticated
//!   │
//!   ▼
//! DIRECTORY_PATH ─► BOUND ─► PROFILE_RESOLVED ─► GROUP_SYNCED ─► Authenticated
//!   │                 │            │
//!   └─────────────────┴────────────┴──────────► Fallback | Rejected
//! ```
//!
//! A cached cookie is trusted without contacting the directory until it
//! expires or the secret rotates. Only a credential mismatch rejects the
//! attempt; every other failure hands over to the [`BaseAuthenticator`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tl_core::ConfigProvider;
use tl_crypto::CookieCipher;
use tl_federation::{
    find_dn, should_sync, DirectoryClient, DirectorySession, FederationError, GroupStore,
    GroupSynchronizer, ProfileHandle, ProfileStore,
};

use crate::context::RemoteUserContext;
use crate::error::{AuthError, AuthResult};
use crate::exchange::{HttpExchange, SsoCookie, SSO_COOKIE_NAME};
use crate::parser::RemoteUserParser;
use crate::settings::TrustedLdapConfig;

// ============================================================================
// Results
// ============================================================================

/// An authenticated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    name: String,
}

impl Principal {
    /// Creates a principal.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Returns the principal name, realm-qualified when it belongs to
    /// another realm.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Outcome of an SSO attempt.
#[derive(Debug)]
pub enum SsoOutcome {
    /// The user is authenticated.
    Authenticated(Principal),
    /// The request is a logout; the SSO cookie was cleared.
    LoggedOut,
    /// SSO does not apply; use conventional authentication.
    Fallback(String),
    /// Access is denied.
    Rejected(AuthError),
}

impl SsoOutcome {
    /// Classifies an SSO error.
    #[must_use]
    pub fn from_error(err: AuthError) -> Self {
        if err.is_rejection() {
            Self::Rejected(err)
        } else {
            Self::Fallback(err.to_string())
        }
    }

    /// Returns the principal, if authenticated.
    #[must_use]
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Self::Authenticated(principal) => Some(principal),
            _ => None,
        }
    }

    /// Converts the outcome into an authentication result; `None` means
    /// conventional authentication must decide.
    ///
    /// ## Errors
    ///
    /// Returns the rejection error for [`SsoOutcome::Rejected`].
    pub fn into_principal(self) -> AuthResult<Option<Principal>> {
        match self {
            Self::Authenticated(principal) => Ok(Some(principal)),
            Self::Rejected(err) => Err(err),
            Self::LoggedOut => Ok(None),
            Self::Fallback(reason) => {
                tracing::debug!(reason = %reason, "SSO fallback");
                Ok(None)
            }
        }
    }

    /// Checks if this is an authenticated outcome.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// Checks if this is a fallback outcome.
    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }

    /// Checks if this is a rejected outcome.
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

// ============================================================================
// Base Authenticator
// ============================================================================

/// Conventional authenticator used when SSO does not apply.
#[async_trait]
pub trait BaseAuthenticator: Send + Sync {
    /// Authenticates the current request from its session.
    async fn check_auth(&self, exchange: &mut dyn HttpExchange) -> AuthResult<Option<Principal>>;

    /// Authenticates the current request with submitted credentials.
    async fn check_auth_with_credentials(
        &self,
        exchange: &mut dyn HttpExchange,
        username: Option<&str>,
        password: Option<&str>,
        remember_me: Option<&str>,
    ) -> AuthResult<Option<Principal>>;

    /// Authenticates a login and password.
    async fn authenticate(
        &self,
        login: Option<&str>,
        password: Option<&str>,
        exchange: &mut dyn HttpExchange,
    ) -> AuthResult<Option<Principal>>;
}

// ============================================================================
// SSO Authenticator
// ============================================================================

/// Resolved identity of one directory-path attempt.
struct Attempt<'a> {
    realm: &'a str,
    remote_user: String,
    check_auth: bool,
    local: bool,
    context: RemoteUserContext,
    settings: TrustedLdapConfig<'a>,
}

/// SSO authenticator trusting an upstream remote user.
pub struct SsoAuthenticator {
    config: ConfigProvider,
    cipher: CookieCipher,
    directory: Arc<dyn DirectoryClient>,
    profiles: Arc<dyn ProfileStore>,
    groups: Arc<dyn GroupStore>,
    base: Arc<dyn BaseAuthenticator>,
    synchronizer: GroupSynchronizer,
}

impl SsoAuthenticator {
    /// Creates an authenticator.
    #[must_use]
    pub fn new(
        config: ConfigProvider,
        cipher: CookieCipher,
        directory: Arc<dyn DirectoryClient>,
        profiles: Arc<dyn ProfileStore>,
        groups: Arc<dyn GroupStore>,
        base: Arc<dyn BaseAuthenticator>,
    ) -> Self {
        Self {
            config,
            cipher,
            directory,
            profiles,
            groups,
            base,
            synchronizer: GroupSynchronizer,
        }
    }

    /// Authenticates the current request.
    ///
    /// When SSO yields no principal the base authenticator decides.
    ///
    /// ## Errors
    ///
    /// Returns an error if credentials are rejected or the base
    /// authenticator fails.
    pub async fn check_auth(&self, exchange: &mut dyn HttpExchange) -> AuthResult<Option<Principal>> {
        let outcome = self.check_auth_sso(None, None, exchange).await;
        if let Some(principal) = outcome.into_principal()? {
            tracing::debug!(principal = %principal, "Authenticated with SSO");
            return Ok(Some(principal));
        }

        tracing::debug!("Fallback on standard authenticator");
        self.base.check_auth(exchange).await
    }

    /// Authenticates the current request with submitted credentials.
    ///
    /// ## Errors
    ///
    /// Returns an error if credentials are rejected or the base
    /// authenticator fails.
    pub async fn check_auth_with_credentials(
        &self,
        exchange: &mut dyn HttpExchange,
        username: Option<&str>,
        password: Option<&str>,
        remember_me: Option<&str>,
    ) -> AuthResult<Option<Principal>> {
        let outcome = self.check_auth_sso(username, password, exchange).await;
        if let Some(principal) = outcome.into_principal()? {
            tracing::debug!(principal = %principal, "Authenticated with SSO");
            return Ok(Some(principal));
        }

        tracing::debug!("Fallback on standard authenticator");
        self.base
            .check_auth_with_credentials(exchange, username, password, remember_me)
            .await
    }

    /// Authenticates `login` against the directory in the main realm,
    /// falling back to the base authenticator.
    ///
    /// ## Errors
    ///
    /// Returns an error if credentials are rejected or the base
    /// authenticator fails.
    pub async fn authenticate(
        &self,
        login: Option<&str>,
        password: Option<&str>,
        exchange: &mut dyn HttpExchange,
    ) -> AuthResult<Option<Principal>> {
        match self.attempt(login, password, exchange).await {
            SsoOutcome::Authenticated(principal) => Ok(Some(principal)),
            SsoOutcome::Rejected(err) => Err(err),
            SsoOutcome::Fallback(_) | SsoOutcome::LoggedOut => {
                self.base.authenticate(login, password, exchange).await
            }
        }
    }

    /// Runs the SSO state machine for the current request.
    ///
    /// A logout clears the SSO cookie. A decryptable cookie authenticates
    /// without contacting the directory. Otherwise the directory path runs
    /// and, on success, a session cookie carrying the realm-qualified name
    /// is issued.
    pub async fn check_auth_sso(
        &self,
        username: Option<&str>,
        password: Option<&str>,
        exchange: &mut dyn HttpExchange,
    ) -> SsoOutcome {
        tracing::debug!(action = %exchange.action(), "checkAuth");

        if exchange.action().starts_with("logout") {
            if exchange.cookie(SSO_COOKIE_NAME).is_some() {
                exchange.set_cookie(SsoCookie::expire());
            }
            return SsoOutcome::LoggedOut;
        }

        if let Some(principal) = self.cached_principal(exchange) {
            return SsoOutcome::Authenticated(principal);
        }

        let outcome = self.attempt(username, password, exchange).await;
        if let SsoOutcome::Authenticated(principal) = &outcome {
            let qualified = if principal.name().contains(':') {
                principal.name().to_string()
            } else {
                format!("{}:{}", exchange.realm(), principal.name())
            };

            tracing::debug!("Saving auth cookie");
            match self.cipher.encrypt(&qualified) {
                Some(token) => exchange.set_cookie(SsoCookie::issue(token)),
                None => tracing::warn!("SSO cookie not issued; the next request re-authenticates"),
            }
        }

        outcome
    }

    /// Runs the directory path.
    ///
    /// The remote user comes from the request, or from `login` when none is
    /// asserted, in which case `password` is also validated. `local` selects
    /// an unqualified principal name.
    ///
    /// ## Errors
    ///
    /// - [`AuthError::IdentityResolution`] when no identity is available,
    ///   the remote user does not parse or has no directory DN
    /// - [`AuthError::DirectoryBind`] when the directory cannot be opened
    /// - [`AuthError::CredentialValidation`] when the password is wrong
    pub async fn authenticate_sso(
        &self,
        login: Option<&str>,
        password: Option<&str>,
        local: bool,
        exchange: &dyn HttpExchange,
    ) -> AuthResult<Principal> {
        tracing::debug!("Authenticate SSO");

        let (remote_user, check_auth) = match (exchange.remote_user(), login) {
            (Some(remote_user), _) => (remote_user.to_string(), false),
            (None, Some(login)) => (login.to_string(), true),
            (None, None) => {
                tracing::warn!(
                    "Failed to resolve remote user. It usually means that no SSO information has been provided."
                );
                return Err(AuthError::identity("no remote user or login provided"));
            }
        };
        tracing::debug!(remote_user = %remote_user, "request remote user");

        let realm = exchange.main_realm();
        let settings = TrustedLdapConfig::new(&self.config, realm);

        let context = RemoteUserParser::new(settings.trusted())
            .parse(&remote_user)?
            .with_submitted_password(password);
        tracing::debug!(context = ?context, "remoteUserLDAPConfiguration");

        let directory_config = settings.directory_config(&context);
        let mut session = self
            .directory
            .open(&directory_config)
            .await
            .map_err(bind_error)?;

        let attempt = Attempt {
            realm,
            remote_user,
            check_auth,
            local,
            context,
            settings,
        };
        let result = self.run_directory_path(&attempt, session.as_mut()).await;

        if let Err(e) = session.close().await {
            tracing::debug!(error = %e, "Failed to close LDAP connection");
        }

        result
    }

    /// Decrypts the SSO cookie, stripping the current realm prefix.
    fn cached_principal(&self, exchange: &dyn HttpExchange) -> Option<Principal> {
        let token = exchange.cookie(SSO_COOKIE_NAME)?;
        tracing::debug!("Found Cookie");

        let name = self.cipher.decrypt(token)?;
        let prefix = format!("{}:", exchange.realm());

        Some(match name.strip_prefix(&prefix) {
            Some(local) => Principal::new(local),
            None => Principal::new(name),
        })
    }

    /// Runs the directory path in the main realm.
    async fn attempt(
        &self,
        login: Option<&str>,
        password: Option<&str>,
        exchange: &dyn HttpExchange,
    ) -> SsoOutcome {
        let local = exchange.realm() == exchange.main_realm();

        match self.authenticate_sso(login, password, local, exchange).await {
            Ok(principal) => SsoOutcome::Authenticated(principal),
            Err(err) => {
                if err.is_rejection() {
                    tracing::warn!(error = %err, "SSO authentication rejected");
                } else {
                    tracing::debug!(error = %err, "Failed to authenticate with SSO");
                }
                SsoOutcome::from_error(err)
            }
        }
    }

    async fn run_directory_path(
        &self,
        attempt: &Attempt<'_>,
        session: &mut dyn DirectorySession,
    ) -> AuthResult<Principal> {
        let settings = &attempt.settings;
        let context = &attempt.context;
        let uid = context.login();

        let profile = self.resolve_profile(attempt).await?;

        let attributes = session
            .search_attributes_by_uid(uid, &settings.attribute_names())
            .await?;
        let dn = find_dn(&attributes)
            .map(String::from)
            .ok_or_else(|| {
                AuthError::identity(format!("Can't find LDAP user DN for [{}]", attempt.remote_user))
            })?;
        tracing::debug!(dn = %dn, "Found LDAP user");

        if attempt.check_auth {
            self.validate_credentials(attempt, session, &dn).await?;
        }

        let is_new = profile.is_new;
        let update = settings.profile_update(&attempt.remote_user, &dn, attributes);
        self.profiles.sync_attributes(&profile, &update).await?;

        let principal = if attempt.local {
            Principal::new(profile.unqualified_name())
        } else {
            Principal::new(profile.qualified_name())
        };

        let mapping = settings.group_mappings(context);
        if !mapping.is_empty() && should_sync(settings.group_sync_mode(), is_new) {
            match self
                .synchronizer
                .sync(&profile, &dn, &mapping, session, self.groups.as_ref())
                .await
            {
                Ok(report) if report.has_failures() => {
                    tracing::error!(failed = ?report.failed, "Failed to synchronise some group memberships");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(error = %e, "Failed to synchronise user's groups membership");
                }
            }
        }

        tracing::debug!(principal = %principal, "Principal");
        Ok(principal)
    }

    /// Finds the profile by external id, then by legacy uid for test
    /// logins, else resolves a new one.
    async fn resolve_profile(&self, attempt: &Attempt<'_>) -> AuthResult<ProfileHandle> {
        let realm = attempt.realm;
        let remote_user = attempt.remote_user.as_str();

        if let Some(profile) = self.profiles.find_by_external_id(realm, remote_user).await? {
            return Ok(profile);
        }

        if attempt
            .settings
            .test_login_for(&attempt.context)
            .contains(remote_user)
        {
            if let Some(profile) = self.profiles.find_by_uid(realm, attempt.context.login()).await? {
                tracing::debug!(profile = %profile.name, "Reusing legacy profile");
                return Ok(profile);
            }
        }

        let page_name = attempt.settings.user_page_name(&attempt.context);
        Ok(self
            .profiles
            .profile_by_uid(realm, &page_name, remote_user)
            .await?)
    }

    async fn validate_credentials(
        &self,
        attempt: &Attempt<'_>,
        session: &mut dyn DirectorySession,
        dn: &str,
    ) -> AuthResult<()> {
        let settings = &attempt.settings;
        let context = &attempt.context;
        let password = context.password().unwrap_or_default();

        if password.is_empty() {
            return Err(AuthError::credentials(format!("empty password for {dn}")));
        }

        if settings.validate_password() {
            let field = settings.password_field();
            if !session.check_password(dn, password, &field).await? {
                tracing::debug!(
                    "Password comparison failed, are you really sure you need validate_password? \
                     Disabling it does not skip credential validation: a bind is performed instead."
                );
                return Err(AuthError::credentials(format!(
                    "could not validate the password: wrong password for {dn}"
                )));
            }
            return Ok(());
        }

        let bind_dn = settings.bind_dn(context);
        if settings.bind_dn_format(context) == bind_dn {
            session.bind(dn, password).await?;

            session
                .bind(&bind_dn, &settings.bind_password(context))
                .await
                .map_err(bind_error)?;
        }

        Ok(())
    }
}

/// Any failure to open or re-bind the service connection is a bind failure.
fn bind_error(err: FederationError) -> AuthError {
    match err {
        FederationError::DirectoryBind(msg) => AuthError::DirectoryBind(msg),
        other => AuthError::DirectoryBind(other.to_string()),
    }
}

impl fmt::Debug for SsoAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SsoAuthenticator")
            .field("config", &self.config)
            .field("cipher", &self.cipher)
            .finish_non_exhaustive()
    }
}
