//! Remote user parsing.
//!
//! The raw remote user (for example `jdoe@example`) is matched against the
//! `remoteUserParser` pattern. Each capture group `g` is written to every
//! key listed in `remoteUserMapping.<g>`, after passing through the
//! optional `remoteUserMapping.<key>` conversion table:
//!
//! ```toml
//! [xwiki.authentication.trustedldap]
//! remoteUserParser = "(.+)@(.+)"
//! "remoteUserMapping.1" = "login"
//! "remoteUserMapping.2" = "ldap_server,ldap_base_DN"
//! "remoteUserMapping.ldap_server" = "example=ldap.example.com|corp=ldap.corp.example.com"
//! ```

use regex::Regex;
use tl_core::{ConfigAccessor, ConfigError};

use crate::context::{RemoteUserContext, LOGIN};
use crate::error::{AuthError, AuthResult};

const PATTERN_PARAM: &str = "remoteUserParser";

/// Extracts a [`RemoteUserContext`] from a raw remote user.
#[derive(Debug, Clone, Copy)]
pub struct RemoteUserParser<'a> {
    config: ConfigAccessor<'a>,
}

impl<'a> RemoteUserParser<'a> {
    /// Creates a parser reading the trusted LDAP configuration.
    #[must_use]
    pub const fn new(config: ConfigAccessor<'a>) -> Self {
        Self { config }
    }

    /// Compiles the configured pattern, if any.
    ///
    /// ## Errors
    ///
    /// Returns [`ConfigError::InvalidPattern`] if the pattern does not
    /// compile.
    pub fn pattern(&self) -> Result<Option<Regex>, ConfigError> {
        let Some(raw) = self.config.param(PATTERN_PARAM) else {
            return Ok(None);
        };

        Regex::new(&raw)
            .map(Some)
            .map_err(|e| ConfigError::invalid_pattern(PATTERN_PARAM, e.to_string()))
    }

    /// Parses `remote_user` into a context.
    ///
    /// Without a pattern the context only holds `login = remote_user`.
    /// The first match is used. With no capture group the whole match is
    /// the login. Groups are applied in order, so a later group overwrites
    /// a key set by an earlier one. Groups that did not participate in the
    /// match are skipped.
    ///
    /// ## Errors
    ///
    /// Returns an error if the pattern is invalid, does not match, or
    /// leaves the login empty.
    pub fn parse(&self, remote_user: &str) -> AuthResult<RemoteUserContext> {
        let mut context = RemoteUserContext::new(remote_user);

        let pattern = self.pattern()?;
        tracing::debug!(pattern = ?pattern.as_ref().map(Regex::as_str), "remoteUserParser");

        let Some(pattern) = pattern else {
            return Ok(context);
        };

        let captures = pattern.captures(remote_user).ok_or_else(|| {
            AuthError::identity(format!(
                "remote user [{remote_user}] does not match [{}]",
                pattern.as_str()
            ))
        })?;

        let group_count = captures.len() - 1;
        if group_count == 0 {
            if let Some(whole) = captures.get(0) {
                context.insert(LOGIN, whole.as_str());
            }
        }

        for g in 1..=group_count {
            let Some(value) = captures.get(g) else {
                tracing::debug!(group = g, "Capture group did not participate in the match");
                continue;
            };

            let keys = self
                .config
                .list_param_or(&format!("remoteUserMapping.{g}"), ',', Vec::new());
            for key in keys {
                let converted = self.convert(&key, value.as_str());
                context.insert(key, converted);
            }
        }

        if context.login().is_empty() {
            return Err(AuthError::identity(format!(
                "remote user [{remote_user}] resolves to an empty login"
            )));
        }

        Ok(context)
    }

    /// Looks `value` up, case-insensitively, in the conversion table of `key`.
    fn convert(&self, key: &str, value: &str) -> String {
        let table = self
            .config
            .map_param(&format!("remoteUserMapping.{key}"), '|', true)
            .unwrap_or_default();

        table
            .get(&value.to_lowercase())
            .cloned()
            .unwrap_or_else(|| value.to_string())
    }
}
