//! # tl-auth
//!
//! Single sign-on authenticator that trusts a remote-user identity asserted
//! by an upstream layer (typically a reverse proxy), resolves it against an
//! LDAP directory and maps it to a local profile.
//!
//! ## Features
//!
//! - Remote-user parsing into per-request directory overrides
//! - Encrypted SSO cookie caching the authenticated identity
//! - Profile resolution keyed by a collision-safe external id
//! - Best-effort group membership synchronization
//! - Explicit fallback to a conventional authenticator
//!
//! ## Example
//!
//! ```ignore
//! use tl_auth::{RequestExchange, SsoAuthenticator};
//!
//! let auth = SsoAuthenticator::new(config, cipher, directory, profiles, groups, base);
//! let mut exchange = RequestExchange::from_request(&request, "xwiki", "xwiki");
//! let principal = auth.check_auth(&mut exchange).await?;
//! exchange.apply_cookies(response.headers_mut());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod authenticator;
pub mod context;
pub mod error;
pub mod exchange;
pub mod parser;
pub mod settings;

pub use authenticator::{BaseAuthenticator, Principal, SsoAuthenticator, SsoOutcome};
pub use context::RemoteUserContext;
pub use error::{AuthError, AuthResult};
pub use exchange::{HttpExchange, RequestExchange, SsoCookie, REMOTE_USER_HEADER, SSO_COOKIE_NAME};
pub use parser::RemoteUserParser;
pub use settings::TrustedLdapConfig;
