//! LDAP search helpers.
//!
//! Filter construction and conversion of search entries into directory
//! attributes.

use std::collections::HashMap;

use ldap3::SearchEntry;
use tl_federation::{format_template, DirectoryAttribute, DirectorySearchSettings};

/// Represents an LDAP entry with parsed attributes.
#[derive(Debug, Clone)]
pub struct LdapEntry {
    /// Distinguished Name.
    pub dn: String,

    /// Attributes (all values are multi-valued).
    pub attributes: HashMap<String, Vec<String>>,
}

impl LdapEntry {
    /// Creates a new LDAP entry from search result.
    #[must_use]
    pub fn from_search_entry(entry: SearchEntry) -> Self {
        Self {
            dn: entry.dn,
            attributes: entry.attrs,
        }
    }

    /// Flattens the entry into one attribute per value, `dn` first.
    ///
    /// Attribute names are sorted so the output is stable.
    #[must_use]
    pub fn into_attributes(self) -> Vec<DirectoryAttribute> {
        let mut names: Vec<_> = self.attributes.keys().cloned().collect();
        names.sort();

        let mut out = vec![DirectoryAttribute::new("dn", self.dn)];
        for name in names {
            if let Some(values) = self.attributes.get(&name) {
                for value in values {
                    out.push(DirectoryAttribute::new(name.clone(), value.clone()));
                }
            }
        }
        out
    }
}

/// Builds the user search filter for `uid`.
#[must_use]
pub fn user_filter(search: &DirectorySearchSettings, uid: &str) -> String {
    format_template(
        &search.user_search_format,
        &[&search.uid_attribute, &ldap_escape(uid)],
    )
}

/// Builds the filter matching groups that list `member` in a member field.
#[must_use]
pub fn group_filter(search: &DirectorySearchSettings, member: &str) -> String {
    let member = ldap_escape(member);

    let classes: String = search
        .group_classes
        .iter()
        .map(|class| format!("(objectClass={})", ldap_escape(class)))
        .collect();
    let fields: String = search
        .group_member_fields
        .iter()
        .map(|field| format!("({field}={member})"))
        .collect();

    format!("(&(|{classes})(|{fields}))")
}

/// Escapes special characters in LDAP filter values.
#[must_use]
pub fn ldap_escape(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\5c"),
            '*' => result.push_str("\\2a"),
            '(' => result.push_str("\\28"),
            ')' => result.push_str("\\29"),
            '\0' => result.push_str("\\00"),
            _ => result.push(c),
        }
    }
    result
}
