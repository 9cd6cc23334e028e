//! Web transport seen by the authenticator.
//!
//! [`HttpExchange`] is what the authenticator needs from the hosting
//! framework: the asserted remote user, the current action, request
//! cookies and a way to emit response cookies. [`RequestExchange`] is a
//! ready-made implementation over `http` request headers.

use cookie::time::{Duration, OffsetDateTime};
use cookie::Cookie;
use http::header::{COOKIE, SET_COOKIE};
use http::{HeaderMap, HeaderValue, Request};

/// Name of the cookie caching the authenticated identity.
pub const SSO_COOKIE_NAME: &str = "XWIKISSOAUTHINFO";

/// Default header carrying the remote user set by the upstream proxy.
pub const REMOTE_USER_HEADER: &str = "REMOTE_USER";

const DEFAULT_ACTION: &str = "view";

// ============================================================================
// Cookie
// ============================================================================

/// A cookie to set on the response.
#[derive(Debug, Clone, PartialEq)]
pub struct SsoCookie(Cookie<'static>);

impl SsoCookie {
    /// Session-scoped SSO cookie holding `token`.
    #[must_use]
    pub fn issue(token: impl Into<String>) -> Self {
        Self(Cookie::build((SSO_COOKIE_NAME, token.into())).path("/").build())
    }

    /// SSO cookie deletion.
    #[must_use]
    pub fn expire() -> Self {
        Self(
            Cookie::build((SSO_COOKIE_NAME, ""))
                .path("/")
                .max_age(Duration::ZERO)
                .expires(OffsetDateTime::UNIX_EPOCH)
                .build(),
        )
    }

    /// Cookie name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.name()
    }

    /// Cookie value.
    #[must_use]
    pub fn value(&self) -> &str {
        self.0.value()
    }

    /// Returns true if the cookie lives until the browser closes.
    #[must_use]
    pub fn is_session(&self) -> bool {
        self.0.max_age().is_none() && self.0.expires().is_none()
    }

    /// Returns true if this cookie deletes the client copy.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.0.max_age() == Some(Duration::ZERO)
    }

    /// Renders the `Set-Cookie` header value.
    #[must_use]
    pub fn render(&self) -> String {
        self.0.to_string()
    }
}

// ============================================================================
// Exchange
// ============================================================================

/// Request/response access needed by the authenticator.
pub trait HttpExchange: Send + Sync {
    /// Remote user asserted by the upstream layer.
    fn remote_user(&self) -> Option<&str>;

    /// Current action (for example `view` or `logout`).
    fn action(&self) -> &str;

    /// Value of the request cookie `name`.
    fn cookie(&self, name: &str) -> Option<&str>;

    /// Adds a cookie to the response.
    fn set_cookie(&mut self, cookie: SsoCookie);

    /// Realm the request is served in.
    fn realm(&self) -> &str;

    /// Main realm, where SSO profiles live.
    fn main_realm(&self) -> &str;
}

/// [`HttpExchange`] over `http` request headers.
#[derive(Debug, Clone, Default)]
pub struct RequestExchange {
    remote_user: Option<String>,
    action: String,
    cookies: Vec<(String, String)>,
    realm: String,
    main_realm: String,
    outgoing: Vec<SsoCookie>,
}

impl RequestExchange {
    /// Creates an exchange with no remote user and no cookies.
    #[must_use]
    pub fn new(realm: impl Into<String>, main_realm: impl Into<String>) -> Self {
        Self {
            action: DEFAULT_ACTION.to_string(),
            realm: realm.into(),
            main_realm: main_realm.into(),
            ..Self::default()
        }
    }

    /// Builds an exchange from a request.
    ///
    /// The remote user is read from the `REMOTE_USER` header, cookies from
    /// `Cookie` headers and the action from the path segment following
    /// `/bin/` or `/wiki/<realm>/`.
    #[must_use]
    pub fn from_request<B>(
        request: &Request<B>,
        realm: impl Into<String>,
        main_realm: impl Into<String>,
    ) -> Self {
        Self::new(realm, main_realm)
            .with_headers(request.headers(), REMOTE_USER_HEADER)
            .with_action(action_from_path(request.uri().path()))
    }

    /// Reads the remote user from `remote_user_header` and the request
    /// cookies from `headers`.
    #[must_use]
    pub fn with_headers(mut self, headers: &HeaderMap, remote_user_header: &str) -> Self {
        self.remote_user = headers
            .get(remote_user_header)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from);

        for value in headers.get_all(COOKIE) {
            let Ok(value) = value.to_str() else {
                continue;
            };
            for cookie in Cookie::split_parse(value).flatten() {
                self.cookies
                    .push((cookie.name().to_string(), cookie.value_trimmed().to_string()));
            }
        }

        self
    }

    /// Sets the remote user.
    #[must_use]
    pub fn with_remote_user(mut self, remote_user: impl Into<String>) -> Self {
        self.remote_user = Some(remote_user.into());
        self
    }

    /// Sets the action.
    #[must_use]
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }

    /// Adds a request cookie.
    #[must_use]
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push((name.into(), value.into()));
        self
    }

    /// Cookies added to the response so far.
    #[must_use]
    pub fn outgoing_cookies(&self) -> &[SsoCookie] {
        &self.outgoing
    }

    /// Appends `Set-Cookie` headers for every response cookie.
    pub fn apply_cookies(&self, headers: &mut HeaderMap) {
        for cookie in &self.outgoing {
            match HeaderValue::from_str(&cookie.render()) {
                Ok(value) => {
                    headers.append(SET_COOKIE, value);
                }
                Err(e) => {
                    tracing::warn!(cookie = %cookie.name(), error = %e, "Invalid cookie value");
                }
            }
        }
    }
}

impl HttpExchange for RequestExchange {
    fn remote_user(&self) -> Option<&str> {
        self.remote_user.as_deref()
    }

    fn action(&self) -> &str {
        &self.action
    }

    fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    fn set_cookie(&mut self, cookie: SsoCookie) {
        self.outgoing.push(cookie);
    }

    fn realm(&self) -> &str {
        &self.realm
    }

    fn main_realm(&self) -> &str {
        &self.main_realm
    }
}

/// Action segment of an XWiki URL: the one after `/bin/`, or the one after
/// `/wiki/<realm>/` for path-based realms.
fn action_from_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let after = |marker: &str, skip: usize| {
        segments
            .iter()
            .position(|s| *s == marker)
            .and_then(|i| segments.get(i + 1 + skip))
            .copied()
    };

    after("bin", 0)
        .or_else(|| after("wiki", 1))
        .unwrap_or(DEFAULT_ACTION)
        .to_string()
}
