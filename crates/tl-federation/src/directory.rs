//! Directory (LDAP) client contract.
//!
//! A [`DirectoryClient`] opens one [`DirectorySession`] per authentication
//! attempt. Sessions are not pooled at this layer and are closed before the
//! attempt completes.
//!
//! ## Security
//!
//! Bind passwords are never included in `Debug` output or log fields.

use std::collections::HashSet;
use std::fmt;

use async_trait::async_trait;

use crate::error::FederationResult;

/// Port used when neither the request nor the configuration names one.
pub const DEFAULT_LDAP_PORT: u16 = 389;

// ============================================================================
// Connection Settings
// ============================================================================

/// TLS settings for a directory connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsSettings {
    /// Path to a trust store (PEM certificate) for the directory server.
    ///
    /// `None` uses the platform trust roots.
    pub keystore: Option<String>,
}

/// Search settings used to locate user entries and their groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectorySearchSettings {
    /// Attribute holding the user id.
    pub uid_attribute: String,

    /// Filter template: `{0}` is the uid attribute, `{1}` the escaped uid.
    pub user_search_format: String,

    /// Object classes identifying group entries.
    pub group_classes: Vec<String>,

    /// Attributes of a group entry listing its members.
    pub group_member_fields: Vec<String>,
}

impl Default for DirectorySearchSettings {
    fn default() -> Self {
        Self {
            uid_attribute: "cn".to_string(),
            user_search_format: "({0}={1})".to_string(),
            group_classes: vec![
                "group".to_string(),
                "groupOfNames".to_string(),
                "groupOfUniqueNames".to_string(),
                "dynamicGroup".to_string(),
                "dynamicGroupAux".to_string(),
                "groupWiseDistributionList".to_string(),
                "posixGroup".to_string(),
            ],
            group_member_fields: vec![
                "member".to_string(),
                "uniqueMember".to_string(),
                "memberUid".to_string(),
            ],
        }
    }
}

/// Resolved connection settings for one directory session.
#[derive(Clone, PartialEq, Eq)]
pub struct DirectoryConnectionConfig {
    /// Directory host name.
    pub host: String,

    /// Directory port.
    pub port: u16,

    /// Base DN for user and group searches.
    pub base_dn: String,

    /// DN of the account the session binds as.
    pub bind_dn: String,

    /// Password of the bind account.
    pub bind_password: String,

    /// TLS settings, `None` for a plain connection.
    pub tls: Option<TlsSettings>,

    /// Search settings.
    pub search: DirectorySearchSettings,
}

impl DirectoryConnectionConfig {
    /// Creates settings for `host:port` with an anonymous bind.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            base_dn: String::new(),
            bind_dn: String::new(),
            bind_password: String::new(),
            tls: None,
            search: DirectorySearchSettings::default(),
        }
    }

    /// Sets the base DN.
    #[must_use]
    pub fn with_base_dn(mut self, base_dn: impl Into<String>) -> Self {
        self.base_dn = base_dn.into();
        self
    }

    /// Sets the bind account.
    #[must_use]
    pub fn with_bind(mut self, dn: impl Into<String>, password: impl Into<String>) -> Self {
        self.bind_dn = dn.into();
        self.bind_password = password.into();
        self
    }

    /// Enables TLS.
    #[must_use]
    pub fn with_tls(mut self, tls: TlsSettings) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Sets the search settings.
    #[must_use]
    pub fn with_search(mut self, search: DirectorySearchSettings) -> Self {
        self.search = search;
        self
    }

    /// Returns the connection URL (`ldaps://` when TLS is enabled).
    #[must_use]
    pub fn url(&self) -> String {
        let scheme = if self.tls.is_some() { "ldaps" } else { "ldap" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for DirectoryConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("base_dn", &self.base_dn)
            .field("bind_dn", &self.bind_dn)
            .field("bind_password", &"[REDACTED]")
            .field("tls", &self.tls)
            .field("search", &self.search)
            .finish()
    }
}

// ============================================================================
// Attributes
// ============================================================================

/// One attribute value of a directory entry.
///
/// Multi-valued attributes appear once per value. The entry DN is reported
/// as a pseudo-attribute named `dn`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryAttribute {
    /// Attribute name.
    pub name: String,

    /// Attribute value.
    pub value: String,
}

impl DirectoryAttribute {
    /// Creates an attribute value.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Returns the value of the `dn` pseudo-attribute, if present.
#[must_use]
pub fn find_dn(attributes: &[DirectoryAttribute]) -> Option<&str> {
    attributes
        .iter()
        .find(|attr| attr.name == "dn")
        .map(|attr| attr.value.as_str())
}

// ============================================================================
// Client Traits
// ============================================================================

/// Opens directory sessions.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Connects to the directory and binds as the configured account.
    ///
    /// Fails with [`crate::FederationError::DirectoryBind`] when the server
    /// cannot be reached or refuses the bind.
    async fn open(&self, config: &DirectoryConnectionConfig)
        -> FederationResult<Box<dyn DirectorySession>>;
}

/// An open, bound directory session.
#[async_trait]
pub trait DirectorySession: Send {
    /// Re-binds the session as `dn`.
    ///
    /// Fails with [`crate::FederationError::CredentialValidation`] when the
    /// server rejects the credentials.
    async fn bind(&mut self, dn: &str, password: &str) -> FederationResult<()>;

    /// Compares `password` with the `attribute` value of the entry `dn`.
    async fn check_password(
        &mut self,
        dn: &str,
        password: &str,
        attribute: &str,
    ) -> FederationResult<bool>;

    /// Returns the attributes of the entry whose uid attribute is `uid`.
    ///
    /// The result includes the `dn` pseudo-attribute and is empty when no
    /// entry matches.
    async fn search_attributes_by_uid(
        &mut self,
        uid: &str,
        attribute_names: &[String],
    ) -> FederationResult<Vec<DirectoryAttribute>>;

    /// Returns the DNs of the groups `dn` is a member of.
    async fn groups_for_user_dn(&mut self, dn: &str) -> FederationResult<HashSet<String>>;

    /// Closes the session.
    async fn close(&mut self) -> FederationResult<()>;
}

// ============================================================================
// Templates
// ============================================================================

/// Escapes a value for use inside a DN attribute value (RFC 4514).
#[must_use]
pub fn escape_dn_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 8);
    let last = value.chars().count().saturating_sub(1);

    for (i, c) in value.chars().enumerate() {
        match c {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '#' if i == 0 => escaped.push_str("\\#"),
            ' ' if i == 0 || i == last => escaped.push_str("\\ "),
            '\0' => escaped.push_str("\\00"),
            _ => escaped.push(c),
        }
    }

    escaped
}

/// Expands `{n}` placeholders in `template` with `args[n]`.
///
/// Follows the message format conventions used by existing configuration:
/// text between single quotes is literal, `''` is a single quote and an
/// index without a matching argument is left as-is.
#[must_use]
pub fn format_template(template: &str, args: &[&str]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    let mut quoted = false;

    while let Some(c) = chars.next() {
        match c {
            '\'' if chars.peek() == Some(&'\'') => {
                chars.next();
                out.push('\'');
            }
            '\'' => quoted = !quoted,
            '{' if !quoted => {
                let mut index = String::new();
                let mut closed = false;
                for d in chars.by_ref() {
                    if d == '}' {
                        closed = true;
                        break;
                    }
                    index.push(d);
                }

                let arg = index.trim().parse::<usize>().ok().and_then(|i| args.get(i));
                match arg {
                    Some(arg) if closed => out.push_str(arg),
                    _ => {
                        out.push('{');
                        out.push_str(&index);
                        if closed {
                            out.push('}');
                        }
                    }
                }
            }
            _ => out.push(c),
        }
    }

    out
}
