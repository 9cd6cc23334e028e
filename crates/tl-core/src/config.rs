//! Two-tier configuration access.
//!
//! A parameter `name` read through a [`ConfigAccessor`] is resolved as:
//!
//! 1. the realm preference `<pref>_<name>`, when present and non-empty;
//! 2. the static configuration key `<conf>.<name>`, which may be present
//!    but empty;
//! 3. the caller-supplied default.
//!
//! Collection variants distinguish "absent" (use the default) from
//! "present but empty" (an empty collection).

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::error::{ConfigError, ConfigResult};

// ============================================================================
// Sources
// ============================================================================

/// Realm-scoped administrator preferences.
///
/// Implementations must be thread-safe; the same store is shared by every
/// concurrent authentication attempt.
pub trait PreferenceStore: Send + Sync {
    /// Returns the preference `key` for `realm`, if set.
    fn preference(&self, realm: &str, key: &str) -> ConfigResult<Option<String>>;
}

/// In-memory preference store keyed by realm.
#[derive(Debug, Clone, Default)]
pub struct MemoryPreferences {
    realms: HashMap<String, HashMap<String, String>>,
}

impl MemoryPreferences {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a preference value.
    #[must_use]
    pub fn with(
        mut self,
        realm: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.set(realm, key, value);
        self
    }

    /// Sets a preference value.
    pub fn set(&mut self, realm: impl Into<String>, key: impl Into<String>, value: impl Into<String>) {
        self.realms
            .entry(realm.into())
            .or_default()
            .insert(key.into(), value.into());
    }
}

impl PreferenceStore for MemoryPreferences {
    fn preference(&self, realm: &str, key: &str) -> ConfigResult<Option<String>> {
        Ok(self
            .realms
            .get(realm)
            .and_then(|prefs| prefs.get(key))
            .cloned())
    }
}

/// Static fallback configuration, shared by every realm.
///
/// Loaded from a TOML file whose tables are flattened into dotted keys:
///
/// ```toml
/// [xwiki.authentication]
/// encryptionKey = "a secret of at least 24 bytes"
///
/// [xwiki.authentication.trustedldap]
/// remoteUserParser = "(.+)@(.+)"
/// "remoteUserMapping.1" = "login"
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticConfig {
    values: HashMap<String, String>,
}

impl StaticConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the configuration from a TOML file.
    ///
    /// ## Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "Loading static configuration");
        Self::from_toml_str(&content)
    }

    /// Parses the configuration from a TOML document.
    ///
    /// ## Errors
    ///
    /// Returns an error if the document is not valid TOML.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let table: toml::Table = content
            .parse()
            .map_err(|e: toml::de::Error| ConfigError::Parse(e.to_string()))?;

        let mut values = HashMap::new();
        for (key, value) in &table {
            flatten(key, value, &mut values);
        }

        Ok(Self { values })
    }

    /// Adds a value.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Gets a value by its full dotted key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

fn flatten(prefix: &str, value: &toml::Value, out: &mut HashMap<String, String>) {
    match value {
        toml::Value::Table(table) => {
            for (key, value) in table {
                flatten(&format!("{prefix}.{key}"), value, out);
            }
        }
        toml::Value::Array(items) => {
            let joined = items.iter().map(render_scalar).collect::<Vec<_>>().join(",");
            out.insert(prefix.to_string(), joined);
        }
        scalar => {
            out.insert(prefix.to_string(), render_scalar(scalar));
        }
    }
}

fn render_scalar(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ============================================================================
// Provider
// ============================================================================

/// Pair of key prefixes identifying one configuration namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigPrefix {
    /// Preference prefix, joined to the name with `_`.
    pub pref: &'static str,
    /// Static configuration prefix, joined to the name with `.`.
    pub conf: &'static str,
}

impl ConfigPrefix {
    /// Trusted LDAP authenticator parameters.
    pub const TRUSTED_LDAP: Self = Self {
        pref: "trustedldap",
        conf: "xwiki.authentication.trustedldap",
    };

    /// System-wide LDAP parameters.
    pub const LDAP: Self = Self {
        pref: "ldap",
        conf: "xwiki.authentication.ldap",
    };
}

/// Configuration sources passed explicitly to every component.
#[derive(Clone)]
pub struct ConfigProvider {
    preferences: Arc<dyn PreferenceStore>,
    fallback: Arc<StaticConfig>,
}

impl ConfigProvider {
    /// Creates a provider from a preference store and a static configuration.
    #[must_use]
    pub fn new(preferences: Arc<dyn PreferenceStore>, fallback: StaticConfig) -> Self {
        Self {
            preferences,
            fallback: Arc::new(fallback),
        }
    }

    /// Creates a provider with no realm preferences.
    #[must_use]
    pub fn from_static(fallback: StaticConfig) -> Self {
        Self::new(Arc::new(MemoryPreferences::new()), fallback)
    }

    /// Reads a static (not realm-scoped) value by its full key.
    #[must_use]
    pub fn static_param(&self, key: &str) -> Option<&str> {
        self.fallback.get(key)
    }

    /// Returns an accessor bound to `realm` and `prefix`.
    #[must_use]
    pub fn accessor<'a>(&'a self, realm: &'a str, prefix: ConfigPrefix) -> ConfigAccessor<'a> {
        ConfigAccessor {
            provider: self,
            realm,
            prefix,
        }
    }
}

impl fmt::Debug for ConfigProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigProvider")
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Accessor
// ============================================================================

/// Typed access to one configuration namespace within one realm.
#[derive(Debug, Clone, Copy)]
pub struct ConfigAccessor<'a> {
    provider: &'a ConfigProvider,
    realm: &'a str,
    prefix: ConfigPrefix,
}

impl<'a> ConfigAccessor<'a> {
    /// Returns the realm this accessor reads preferences from.
    #[must_use]
    pub const fn realm(&self) -> &'a str {
        self.realm
    }

    /// Returns the raw parameter, or `None` when it is absent from both tiers.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<String> {
        let pref_key = format!("{}_{name}", self.prefix.pref);

        let preference = match self.provider.preferences.preference(self.realm, &pref_key) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(key = %pref_key, error = %e, "Failed to get preference");
                None
            }
        };

        let param = match preference {
            Some(value) if !value.is_empty() => Some(value),
            _ => {
                let conf_key = format!("{}.{name}", self.prefix.conf);
                self.provider.fallback.get(&conf_key).map(String::from)
            }
        };

        if is_secret(name) {
            tracing::debug!(name, present = param.is_some(), "Param");
        } else {
            tracing::debug!(name, value = ?param, "Param");
        }

        param
    }

    /// Returns the parameter or `default` when absent.
    #[must_use]
    pub fn param_or(&self, name: &str, default: &str) -> String {
        self.param(name).unwrap_or_else(|| default.to_string())
    }

    /// Splits the parameter on `separator`.
    ///
    /// Returns `None` when the parameter is absent and an empty list when it
    /// is present but empty. Empty tokens are dropped and `\<separator>`
    /// yields a literal separator inside a token.
    #[must_use]
    pub fn list_param(&self, name: &str, separator: char) -> Option<Vec<String>> {
        self.param(name).map(|raw| split_escaped(&raw, separator))
    }

    /// Like [`Self::list_param`] with a default for the absent case.
    #[must_use]
    pub fn list_param_or(&self, name: &str, separator: char, default: Vec<String>) -> Vec<String> {
        self.list_param(name, separator).unwrap_or(default)
    }

    /// Splits the parameter on `separator` into a set.
    #[must_use]
    pub fn set_param(&self, name: &str, separator: char) -> Option<HashSet<String>> {
        self.list_param(name, separator)
            .map(|list| list.into_iter().collect())
    }

    /// Parses the parameter as a list of `key=value` entries.
    ///
    /// Entries without `=` are logged and skipped. Keys are lower-cased when
    /// `lowercase_keys` is set.
    #[must_use]
    pub fn map_param(
        &self,
        name: &str,
        separator: char,
        lowercase_keys: bool,
    ) -> Option<HashMap<String, String>> {
        let list = self.list_param(name, separator)?;

        let mut mappings = HashMap::with_capacity(list.len());
        for entry in list {
            match entry.split_once('=') {
                Some((key, value)) => {
                    let key = if lowercase_keys {
                        key.to_lowercase()
                    } else {
                        key.to_string()
                    };
                    mappings.insert(key, value.to_string());
                }
                None => {
                    tracing::warn!(name, entry = %entry, "Error parsing map parameter entry");
                }
            }
        }

        Some(mappings)
    }

    /// Parses the parameter as a one-to-many mapping.
    ///
    /// With `left` set, `a=b` maps `a` to `b`; otherwise it maps `b` to `a`.
    /// Values for the same key accumulate. Entries whose `=` is missing or
    /// leading are logged and skipped.
    #[must_use]
    pub fn one_to_many_param(
        &self,
        name: &str,
        separator: char,
        left: bool,
    ) -> Option<BTreeMap<String, BTreeSet<String>>> {
        let list = self.list_param(name, separator)?;

        let mut mappings: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for entry in list {
            let Some((lhs, rhs)) = entry.split_once('=').filter(|(lhs, _)| !lhs.is_empty()) else {
                tracing::error!(name, entry = %entry, "Error parsing one-to-many parameter entry");
                continue;
            };

            let (key, value) = if left { (lhs, rhs) } else { (rhs, lhs) };
            mappings
                .entry(key.to_string())
                .or_default()
                .insert(value.to_string());

            tracing::debug!(name, key, value, "Mapping found");
        }

        Some(mappings)
    }
}

fn is_secret(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.contains("pass") || lower.contains("key")
}

/// Splits `raw` on `separator`, dropping empty tokens.
///
/// A backslash directly before the separator escapes it; any other
/// backslash is kept as-is.
#[must_use]
pub fn split_escaped(raw: &str, separator: char) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\\' && chars.peek() == Some(&separator) {
            current.push(separator);
            chars.next();
        } else if c == separator {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        } else {
            current.push(c);
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}
