//! Local group to directory group mapping.

use std::collections::{BTreeMap, BTreeSet};

/// Maps each local group to the directory groups granting it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupMapping {
    groups: BTreeMap<String, BTreeSet<String>>,
}

impl GroupMapping {
    /// Creates an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `local=directory` entries separated by `|`.
    ///
    /// The input is trimmed. A backslash makes the next character literal,
    /// so `\|` keeps a pipe inside an entry. Each entry is split on its
    /// first `=`; entries with no local group name are logged and skipped.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let mut mapping = Self::new();
        let mut entry = String::with_capacity(raw.len());
        let mut escaped = false;

        for c in raw.trim().chars() {
            if escaped {
                entry.push(c);
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '|' {
                mapping.add_entry(&entry);
                entry.clear();
            } else {
                entry.push(c);
            }
        }

        if !entry.is_empty() {
            mapping.add_entry(&entry);
        }

        mapping
    }

    /// Builds a mapping from an already parsed one-to-many table.
    #[must_use]
    pub fn from_one_to_many(groups: BTreeMap<String, BTreeSet<String>>) -> Self {
        Self { groups }
    }

    /// Adds a directory group to a local group.
    pub fn insert(&mut self, local: impl Into<String>, directory: impl Into<String>) {
        self.groups
            .entry(local.into())
            .or_default()
            .insert(directory.into());
    }

    fn add_entry(&mut self, entry: &str) {
        match entry.split_once('=') {
            Some((local, directory)) if !local.is_empty() => {
                self.insert(local, directory);
                tracing::debug!(local, directory, "Group mapping found");
            }
            _ => {
                tracing::error!(entry, "Error parsing ldap_group_mapping attribute");
            }
        }
    }

    /// Returns the directory groups mapped to `local`.
    #[must_use]
    pub fn get(&self, local: &str) -> Option<&BTreeSet<String>> {
        self.groups.get(local)
    }

    /// Iterates over local groups and their directory groups.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.groups.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of local groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Returns true if no local group is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
