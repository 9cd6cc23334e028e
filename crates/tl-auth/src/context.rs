//! Per-attempt remote user context.
//!
//! The context is built once by [`crate::RemoteUserParser`] and is
//! read-only afterwards. It always holds a `login`.

use std::fmt;

/// Directory uid of the remote user.
pub const LOGIN: &str = "login";
/// Submitted or extracted password.
pub const PASSWORD: &str = "password";
/// Directory host override.
pub const LDAP_SERVER: &str = "ldap_server";
/// Directory port override.
pub const LDAP_PORT: &str = "ldap_port";
/// Base DN override.
pub const LDAP_BASE_DN: &str = "ldap_base_DN";
/// Bind DN template override.
pub const LDAP_BIND_DN: &str = "ldap_bind_DN";
/// Bind password template override.
pub const LDAP_BIND_PASS: &str = "ldap_bind_pass";
/// Group mapping override.
pub const LDAP_GROUP_MAPPING: &str = "ldap_group_mapping";

const SECRET_KEYS: [&str; 2] = [PASSWORD, LDAP_BIND_PASS];

/// Ordered key/value settings extracted from one remote user.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteUserContext {
    entries: Vec<(String, String)>,
}

impl RemoteUserContext {
    /// Creates a context holding only `login`.
    #[must_use]
    pub fn new(login: impl Into<String>) -> Self {
        Self {
            entries: vec![(LOGIN.to_string(), login.into())],
        }
    }

    /// Sets `key`, keeping its original position when already present.
    pub(crate) fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();

        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Adds the submitted form password unless one was extracted.
    #[must_use]
    pub fn with_submitted_password(mut self, password: Option<&str>) -> Self {
        if let Some(password) = password {
            if !self.contains(PASSWORD) {
                self.insert(PASSWORD, password);
            }
        }
        self
    }

    /// Returns the value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns true if `key` is set.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Returns the directory uid.
    #[must_use]
    pub fn login(&self) -> &str {
        self.get(LOGIN).unwrap_or_default()
    }

    /// Returns the password, if any.
    #[must_use]
    pub fn password(&self) -> Option<&str> {
        self.get(PASSWORD)
    }

    /// Iterates over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false: a context holds at least `login`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replaces `${key}` placeholders in `template` with context values.
    ///
    /// Unknown placeholders are left untouched.
    #[must_use]
    pub fn expand(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];

            match after.find('}') {
                Some(end) => {
                    let key = &after[..end];
                    match self.get(key) {
                        Some(value) => out.push_str(value),
                        None => {
                            out.push_str("${");
                            out.push_str(key);
                            out.push('}');
                        }
                    }
                    rest = &after[end + 1..];
                }
                None => {
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }

        out.push_str(rest);
        out
    }
}

impl fmt::Debug for RemoteUserContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in &self.entries {
            if SECRET_KEYS.contains(&key.as_str()) {
                map.entry(key, &"[REDACTED]");
            } else {
                map.entry(key, value);
            }
        }
        map.finish()
    }
}
