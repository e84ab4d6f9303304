//! Session state owned by one client instance.
//!
//! [`Session`] is plain data plus the transitions of the login state machine.
//! It performs no I/O; the client drives it and funnels every mutation through
//! the methods below.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;
use url::Url;
use zeroize::Zeroizing;

use super::cookies::CookieJar;
use crate::constants::SESSION_EXPIRY_MARGIN;
use crate::parser::{AppContext, SubjectEntry};
use crate::transport::FetchError;
use crate::validation::StudyYear;

/// Login credentials supplied at construction.
#[derive(Clone)]
pub struct Credentials {
    login: String,
    password: Zeroizing<String>,
    secondary: String,
}

impl Credentials {
    /// Creates credentials.
    ///
    /// `secondary` is the opaque school-selection payload (e.g.
    /// `cid=2&sid=1&pid=-1&cn=1&sft=2&scid=23`) copied verbatim into the login form.
    #[must_use]
    pub fn new(login: impl Into<String>, password: impl Into<String>, secondary: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: Zeroizing::new(password.into()),
            secondary: secondary.into(),
        }
    }

    /// Login name.
    #[must_use]
    pub fn login(&self) -> &str {
        &self.login
    }

    /// Raw password. Never log the return value.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Secondary-login payload.
    #[must_use]
    pub fn secondary(&self) -> &str {
        &self.secondary
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"[REDACTED]")
            .field("secondary", &self.secondary)
            .finish()
    }
}

/// Auth token together with its expiry; one cannot exist without the other.
#[derive(Clone)]
pub struct AuthToken {
    token: String,
    expires_at: Instant,
}

impl AuthToken {
    /// Token value. Never log the return value.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Instant the server will drop the session.
    #[must_use]
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Identity derived from the default report filters during the first login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountIdentity {
    /// Student (user) id.
    pub user_id: i64,
    /// Class id.
    pub class_id: i64,
    /// Subjects of the class, in catalog order.
    pub subjects: Vec<SubjectEntry>,
    /// School-year window.
    pub study_year: StudyYear,
}

/// Observable state of the login state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No token.
    Anonymous,
    /// A login sequence is in flight.
    Authenticating,
    /// Valid token outside the expiry margin.
    Authenticated,
    /// Token present but expired or within the expiry margin.
    Expired,
}

/// Mutable state of one portal session.
#[derive(Debug)]
pub struct Session {
    host: String,
    credentials: Credentials,
    secure: bool,
    auth: Option<AuthToken>,
    version: Option<String>,
    cookies: CookieJar,
    context: AppContext,
    identity: Option<AccountIdentity>,
    logins_in_flight: u32,
}

impl Session {
    /// Creates an empty session.
    ///
    /// `host` may carry a scheme (`https://sgo.example.org`); without one the
    /// first request goes over plain HTTP and scheme detection upgrades it.
    #[must_use]
    pub fn new(host: &str, credentials: Credentials) -> Self {
        let trimmed = host.trim().trim_end_matches('/');
        let (secure, bare) = if let Some(rest) = trimmed.strip_prefix("https://") {
            (true, rest)
        } else if let Some(rest) = trimmed.strip_prefix("http://") {
            (false, rest)
        } else {
            (false, trimmed)
        };
        Self {
            host: bare.to_string(),
            credentials,
            secure,
            auth: None,
            version: None,
            cookies: CookieJar::new(),
            context: AppContext::default(),
            identity: None,
            logins_in_flight: 0,
        }
    }

    /// Host (and port) without scheme.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Credentials.
    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Whether requests go over HTTPS.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Records the scheme the host root finally answered on.
    pub fn set_secure(&mut self, secure: bool) {
        if self.secure != secure {
            debug!(secure, "session scheme changed");
        }
        self.secure = secure;
    }

    /// Builds an absolute URL for `path_and_query` on the session host.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidUrl`] when the host/path do not form a URL.
    pub fn url(&self, path_and_query: &str) -> Result<Url, FetchError> {
        let scheme = if self.secure { "https" } else { "http" };
        let raw = format!("{scheme}://{}{path_and_query}", self.host);
        Url::parse(&raw).map_err(|_| FetchError::invalid_url(raw))
    }

    /// True when the token or version is missing, or less than
    /// [`SESSION_EXPIRY_MARGIN`] of the session lifetime remains at `now`.
    #[must_use]
    pub fn needs_authentication(&self, now: Instant) -> bool {
        let Some(auth) = &self.auth else {
            return true;
        };
        if self.version.is_none() {
            return true;
        }
        auth.expires_at.saturating_duration_since(now) < SESSION_EXPIRY_MARGIN
    }

    /// State of the login state machine at `now`.
    #[must_use]
    pub fn state(&self, now: Instant) -> SessionState {
        if self.logins_in_flight > 0 {
            SessionState::Authenticating
        } else if self.auth.is_none() {
            SessionState::Anonymous
        } else if self.needs_authentication(now) {
            SessionState::Expired
        } else {
            SessionState::Authenticated
        }
    }

    /// Marks a login sequence as started.
    pub fn begin_login(&mut self) {
        self.logins_in_flight += 1;
    }

    /// Marks a login sequence as settled.
    pub fn end_login(&mut self) {
        self.logins_in_flight = self.logins_in_flight.saturating_sub(1);
    }

    /// Current token, if any.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.auth.as_ref().map(AuthToken::token)
    }

    /// Current token with its expiry.
    #[must_use]
    pub fn auth(&self) -> Option<&AuthToken> {
        self.auth.as_ref()
    }

    /// Current protocol version, if any.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Stores the protocol version announced by the login seed.
    pub fn apply_version(&mut self, version: impl Into<String>) {
        self.version = Some(version.into());
    }

    /// Stores a fresh token expiring `lifetime` after `now`.
    pub fn apply_login(&mut self, token: impl Into<String>, lifetime: Duration, now: Instant) {
        self.auth = Some(AuthToken {
            token: token.into(),
            expires_at: now + lifetime,
        });
    }

    /// Applies a parsed account context.
    ///
    /// A refreshed token replaces the current one but keeps its expiry; it is
    /// ignored when no token is held so the token/expiry pairing holds.
    pub fn apply_context(&mut self, context: AppContext) {
        if let (Some(at), Some(auth)) = (&context.at, self.auth.as_mut()) {
            at.clone_into(&mut auth.token);
        }
        if let Some(ver) = &context.ver {
            self.version = Some(ver.clone());
        }
        let stored = &mut self.context;
        stored.year_id = context.year_id.or(stored.year_id);
        stored.school_id = context.school_id.or(stored.school_id);
        stored.current_year = context.current_year.or(stored.current_year.take());
        stored.school_name = context.school_name.or(stored.school_name.take());
        stored.date_format = context.date_format.or(stored.date_format.take());
        stored.time_format = context.time_format.or(stored.time_format.take());
        stored.server_time_zone = context.server_time_zone.or(stored.server_time_zone);
    }

    /// Account context fields (the token/version fields are always `None` here).
    #[must_use]
    pub fn context(&self) -> &AppContext {
        &self.context
    }

    /// Stores the account identity unless one is already cached.
    ///
    /// Returns whether the identity was applied.
    pub fn apply_identity(&mut self, identity: AccountIdentity) -> bool {
        if self.identity.is_some() {
            return false;
        }
        self.identity = Some(identity);
        true
    }

    /// Cached account identity.
    #[must_use]
    pub fn identity(&self) -> Option<&AccountIdentity> {
        self.identity.as_ref()
    }

    /// Whether the one-time bootstrap has completed.
    #[must_use]
    pub fn has_identity(&self) -> bool {
        self.identity.is_some()
    }

    /// Drops token, version and expiry. Cookies and identity are kept.
    pub fn clear_auth(&mut self) {
        self.auth = None;
        self.version = None;
    }

    /// Absorbs `Set-Cookie` values from a response.
    pub fn absorb_cookies<'a>(&mut self, set_cookie_values: impl IntoIterator<Item = &'a str>) {
        self.cookies.absorb(set_cookie_values);
    }

    /// Rendered `Cookie` header.
    #[must_use]
    pub fn cookie_header(&self) -> Option<String> {
        self.cookies.render()
    }

    /// Cookie jar.
    #[must_use]
    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }
}
