//! # tl-core
//!
//! Configuration access for the trusted LDAP bridge.
//!
//! Values are looked up in two tiers: a realm-scoped preference store
//! first, then a static configuration file shared by every realm. The
//! [`ConfigProvider`] value is passed explicitly to every component that
//! needs configuration; there is no process-wide configuration state.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;

pub use config::{
    split_escaped, ConfigAccessor, ConfigPrefix, ConfigProvider, MemoryPreferences,
    PreferenceStore, StaticConfig,
};
pub use error::{ConfigError, ConfigResult};
