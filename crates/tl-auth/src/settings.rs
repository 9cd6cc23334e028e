//! Typed trusted LDAP settings.
//!
//! Per-request overrides carried by the [`RemoteUserContext`] take
//! precedence over the realm's LDAP configuration.

use std::collections::{BTreeMap, HashSet};

use tl_core::{ConfigAccessor, ConfigPrefix, ConfigProvider};
use tl_federation::{
    escape_dn_value, format_template, DirectoryAttribute, DirectoryConnectionConfig,
    DirectorySearchSettings, GroupMapping, GroupSyncMode, ProfileUpdate, TlsSettings,
    DEFAULT_LDAP_PORT,
};

use crate::context::{
    RemoteUserContext, LDAP_BASE_DN, LDAP_BIND_DN, LDAP_BIND_PASS, LDAP_GROUP_MAPPING, LDAP_PORT,
    LDAP_SERVER,
};

const DEFAULT_FIELDS_MAPPING: [(&str, &str); 3] =
    [("last_name", "sn"), ("first_name", "givenName"), ("email", "mail")];

/// Trusted LDAP settings for one realm.
#[derive(Debug, Clone, Copy)]
pub struct TrustedLdapConfig<'a> {
    trusted: ConfigAccessor<'a>,
    ldap: ConfigAccessor<'a>,
}

impl<'a> TrustedLdapConfig<'a> {
    /// Creates the settings view for `realm`.
    #[must_use]
    pub fn new(provider: &'a ConfigProvider, realm: &'a str) -> Self {
        Self {
            trusted: provider.accessor(realm, ConfigPrefix::TRUSTED_LDAP),
            ldap: provider.accessor(realm, ConfigPrefix::LDAP),
        }
    }

    /// Returns the trusted LDAP accessor (`trustedldap_*` parameters).
    #[must_use]
    pub const fn trusted(&self) -> ConfigAccessor<'a> {
        self.trusted
    }

    /// Returns the system LDAP accessor (`ldap_*` parameters).
    #[must_use]
    pub const fn ldap(&self) -> ConfigAccessor<'a> {
        self.ldap
    }

    // ========================================================================
    // Connection
    // ========================================================================

    /// Directory host.
    #[must_use]
    pub fn ldap_server(&self, context: &RemoteUserContext) -> String {
        context
            .get(LDAP_SERVER)
            .map_or_else(|| self.ldap.param_or("server", "localhost"), String::from)
    }

    /// Directory port; unparsable values fall back to 389.
    #[must_use]
    pub fn ldap_port(&self, context: &RemoteUserContext) -> u16 {
        let raw = context
            .get(LDAP_PORT)
            .map(String::from)
            .or_else(|| self.ldap.param("port"));

        raw.and_then(|port| port.trim().parse().ok())
            .unwrap_or(DEFAULT_LDAP_PORT)
    }

    /// Base DN, empty by default.
    #[must_use]
    pub fn ldap_base_dn(&self, context: &RemoteUserContext) -> String {
        context
            .get(LDAP_BASE_DN)
            .map_or_else(|| self.ldap.param_or("base_DN", ""), String::from)
    }

    /// Unexpanded bind DN template.
    #[must_use]
    pub fn bind_dn_format(&self, context: &RemoteUserContext) -> String {
        context
            .get(LDAP_BIND_DN)
            .map_or_else(|| self.ldap.param_or("bind_DN", ""), String::from)
    }

    /// Bind DN, with `{0}` the DN-escaped login and `{1}` the DN-escaped
    /// password.
    #[must_use]
    pub fn bind_dn(&self, context: &RemoteUserContext) -> String {
        let login = escape_dn_value(context.login());
        let password = escape_dn_value(context.password().unwrap_or_default());

        format_template(&self.bind_dn_format(context), &[&login, &password])
    }

    /// Bind password, with `{0}` the login and `{1}` the password.
    #[must_use]
    pub fn bind_password(&self, context: &RemoteUserContext) -> String {
        let template = context
            .get(LDAP_BIND_PASS)
            .map_or_else(|| self.ldap.param_or("bind_pass", ""), String::from);

        format_template(
            &template,
            &[context.login(), context.password().unwrap_or_default()],
        )
    }

    /// True if the connection uses TLS (`ldap_ssl = 1`).
    #[must_use]
    pub fn use_ssl(&self) -> bool {
        self.ldap.param_or("ssl", "0") == "1"
    }

    /// Trust store path for TLS connections.
    #[must_use]
    pub fn ssl_keystore(&self) -> Option<String> {
        self.ldap.param("ssl.keystore").filter(|path| !path.is_empty())
    }

    /// User and group search settings.
    #[must_use]
    pub fn search_settings(&self) -> DirectorySearchSettings {
        let defaults = DirectorySearchSettings::default();

        DirectorySearchSettings {
            uid_attribute: self.uid_attribute(),
            user_search_format: self.ldap.param_or("user_search_fmt", &defaults.user_search_format),
            group_classes: self
                .ldap
                .list_param_or("group_classes", ',', defaults.group_classes),
            group_member_fields: self
                .ldap
                .list_param_or("group_memberfields", ',', defaults.group_member_fields),
        }
    }

    /// Attribute holding the directory uid.
    #[must_use]
    pub fn uid_attribute(&self) -> String {
        self.ldap.param_or("UID_attr", "cn")
    }

    /// Resolves the connection settings for this attempt.
    #[must_use]
    pub fn directory_config(&self, context: &RemoteUserContext) -> DirectoryConnectionConfig {
        let mut config = DirectoryConnectionConfig::new(self.ldap_server(context), self.ldap_port(context))
            .with_base_dn(self.ldap_base_dn(context))
            .with_bind(self.bind_dn(context), self.bind_password(context))
            .with_search(self.search_settings());

        if self.use_ssl() {
            tracing::debug!("Connecting to LDAP using SSL");
            config = config.with_tls(TlsSettings {
                keystore: self.ssl_keystore(),
            });
        }

        config
    }

    // ========================================================================
    // Credentials
    // ========================================================================

    /// True if passwords are validated by attribute comparison.
    #[must_use]
    pub fn validate_password(&self) -> bool {
        self.ldap.param_or("validate_password", "0") == "1"
    }

    /// Attribute compared when validating passwords.
    #[must_use]
    pub fn password_field(&self) -> String {
        self.ldap.param_or("password_field", "userPassword")
    }

    // ========================================================================
    // Profile
    // ========================================================================

    /// Profile field to directory attribute mapping.
    #[must_use]
    pub fn fields_mapping(&self) -> BTreeMap<String, String> {
        match self.ldap.map_param("fields_mapping", ',', false) {
            Some(mapping) => mapping.into_iter().collect(),
            None => DEFAULT_FIELDS_MAPPING
                .iter()
                .map(|(field, attr)| ((*field).to_string(), (*attr).to_string()))
                .collect(),
        }
    }

    /// Directory attributes fetched for a user.
    #[must_use]
    pub fn attribute_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.fields_mapping().into_values().collect();
        names.push(self.uid_attribute());
        names.sort();
        names.dedup();
        names
    }

    /// Builds the profile refresh for a directory entry.
    #[must_use]
    pub fn profile_update(
        &self,
        external_id: &str,
        dn: &str,
        attributes: Vec<DirectoryAttribute>,
    ) -> ProfileUpdate {
        let fields = self
            .fields_mapping()
            .into_iter()
            .filter_map(|(field, attr)| {
                attributes
                    .iter()
                    .find(|a| a.name.eq_ignore_ascii_case(&attr))
                    .map(|a| (field, a.value.clone()))
            })
            .collect();

        ProfileUpdate {
            external_id: external_id.to_string(),
            dn: dn.to_string(),
            fields,
            attributes,
        }
    }

    /// Profile name: `userPageName` expanded from the context, with `.`,
    /// spaces and `/` removed.
    #[must_use]
    pub fn user_page_name(&self, context: &RemoteUserContext) -> String {
        let template = self.trusted.param_or("userPageName", "${login}");
        let page_name: String = context
            .expand(&template)
            .chars()
            .filter(|c| !matches!(c, '.' | ' ' | '/'))
            .collect();

        tracing::debug!(page_name = %page_name, "UserPageName");
        page_name
    }

    /// Remote users allowed to reuse a profile keyed by their plain uid.
    #[must_use]
    pub fn test_login_for(&self, context: &RemoteUserContext) -> HashSet<String> {
        let set: HashSet<String> = self
            .trusted
            .list_param_or("testLoginFor", ',', Vec::new())
            .iter()
            .map(|uid| context.expand(uid))
            .collect();

        tracing::debug!(test_login_for = ?set, "TestLoginFor");
        set
    }

    // ========================================================================
    // Groups
    // ========================================================================

    /// Group mapping: the per-request override, else the realm's mapping.
    #[must_use]
    pub fn group_mappings(&self, context: &RemoteUserContext) -> GroupMapping {
        match context.get(LDAP_GROUP_MAPPING) {
            Some(raw) => GroupMapping::parse(raw),
            None => self
                .ldap
                .one_to_many_param("group_mapping", '|', true)
                .map(GroupMapping::from_one_to_many)
                .unwrap_or_default(),
        }
    }

    /// When group membership is synchronized.
    #[must_use]
    pub fn group_sync_mode(&self) -> GroupSyncMode {
        GroupSyncMode::parse(&self.trusted.param_or("ldap_mode_group_sync", "always"))
    }
}
