//! The public operation surface of the portal client.
//!
//! [`NetSchool`] owns one portal session. Every authenticated operation first
//! makes sure the session is valid (logging in again when the token is close
//! to expiry), validates its input, then performs its request through the
//! configured [`Transport`].
//!
//! # Example
//!
//! ```no_run
//! use chrono::NaiveDate;
//! use netschool_core::{Credentials, NetSchool};
//!
//! # async fn example() -> Result<(), netschool_core::Error> {
//! let credentials = Credentials::new("ivan", "secret", "cid=2&sid=1&pid=-1&cn=1&sft=2&scid=23");
//! let client = NetSchool::new("https://sgo.example.org", credentials)?;
//! client.log_in().await?;
//! let diary = client
//!     .diary(
//!         NaiveDate::from_ymd_opt(2023, 9, 4).unwrap(),
//!         NaiveDate::from_ymd_opt(2023, 9, 10).unwrap(),
//!     )
//!     .await?;
//! println!("{} days", diary.week_days.len());
//! client.log_out().await?;
//! # Ok(())
//! # }
//! ```

mod auth;
mod operations;
mod options;

pub use options::ClientOptions;

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;
use tracing::trace;
use url::Url;

use crate::Error;
use crate::parser::{AppContext, SubjectEntry};
use crate::protect::InFlightRegistry;
use crate::report::ReportExchange;
use crate::session::{AccountIdentity, BootstrapError, Credentials, Session, SessionState};
use crate::transport::{FetchError, HttpTransport, Request, Response, Transport};
use crate::validation::StudyYear;

struct ClientInner {
    transport: Arc<dyn Transport>,
    session: RwLock<Session>,
    options: ClientOptions,
}

/// Client for one portal account.
///
/// Cheap to clone; clones share the session.
#[derive(Clone)]
pub struct NetSchool {
    inner: Arc<ClientInner>,
    login_gate: Option<Arc<InFlightRegistry>>,
}

impl std::fmt::Debug for NetSchool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetSchool")
            .field("transport", &self.inner.transport)
            .field("options", &self.inner.options)
            .field("coalesced_login", &self.login_gate.is_some())
            .finish_non_exhaustive()
    }
}

impl NetSchool {
    /// Creates a client over HTTP with default options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fetch`] when the HTTP client cannot be built.
    pub fn new(host: &str, credentials: Credentials) -> Result<Self, Error> {
        Self::with_options(host, credentials, ClientOptions::default())
    }

    /// Creates a client over HTTP.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fetch`] when the HTTP client cannot be built.
    pub fn with_options(host: &str, credentials: Credentials, options: ClientOptions) -> Result<Self, Error> {
        let transport =
            HttpTransport::with_timeouts(options.connect_timeout_secs, options.read_timeout_secs)?;
        Ok(Self::with_transport(host, credentials, Arc::new(transport), options))
    }

    /// Creates a client over an arbitrary transport.
    #[must_use]
    pub fn with_transport(
        host: &str,
        credentials: Credentials,
        transport: Arc<dyn Transport>,
        options: ClientOptions,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                transport,
                session: RwLock::new(Session::new(host, credentials)),
                options,
            }),
            login_gate: None,
        }
    }

    /// Clone whose logins (explicit or implicit) coalesce through `registry`.
    pub(crate) fn with_login_gate(&self, registry: Arc<InFlightRegistry>) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            login_gate: Some(registry),
        }
    }

    /// Options the client was built with.
    #[must_use]
    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    /// Host without scheme.
    #[must_use]
    pub fn host(&self) -> String {
        self.read(|s| s.host().to_string())
    }

    /// Whether requests currently go over HTTPS.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.read(Session::is_secure)
    }

    /// State of the login state machine right now.
    #[must_use]
    pub fn session_state(&self) -> SessionState {
        let now = Instant::now();
        self.read(|s| s.state(now))
    }

    /// Whether the next authenticated call will log in first.
    #[must_use]
    pub fn needs_authentication(&self) -> bool {
        let now = Instant::now();
        self.read(|s| s.needs_authentication(now))
    }

    /// School-year window, once known.
    #[must_use]
    pub fn study_year(&self) -> Option<StudyYear> {
        self.read(|s| s.identity().map(|identity| identity.study_year))
    }

    /// Subject catalog, empty until the first login.
    #[must_use]
    pub fn subjects(&self) -> Vec<SubjectEntry> {
        self.read(|s| s.identity().map(|identity| identity.subjects.clone()).unwrap_or_default())
    }

    /// Account context from the settings page.
    #[must_use]
    pub fn context(&self) -> AppContext {
        self.read(|s| s.context().clone())
    }

    /// Cached account identity.
    #[must_use]
    pub fn identity(&self) -> Option<AccountIdentity> {
        self.read(|s| s.identity().cloned())
    }

    fn read<R>(&self, f: impl FnOnce(&Session) -> R) -> R {
        let session = self.inner.session.read().unwrap_or_else(PoisonError::into_inner);
        f(&session)
    }

    fn write<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut session = self.inner.session.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut session)
    }

    fn url(&self, path_and_query: &str) -> Result<Url, FetchError> {
        self.read(|s| s.url(path_and_query))
    }

    fn require_identity(&self) -> Result<AccountIdentity, Error> {
        self.identity()
            .ok_or_else(|| BootstrapError::MissingIdentity.into())
    }

    /// Token and version, when both are held.
    fn auth_pair(&self) -> Option<(String, String)> {
        self.read(|s| Some((s.token()?.to_string(), s.version()?.to_string())))
    }

    /// Performs one exchange: attaches the cookie header, absorbs `Set-Cookie`.
    async fn exchange(&self, request: Request) -> Result<Response, FetchError> {
        let request = match self.read(Session::cookie_header) {
            Some(cookie) => request.header("Cookie", cookie),
            None => request,
        };
        trace!(method = request.method.as_str(), url = %request.url, "exchange");
        let response = self.inner.transport.perform(request).await?;
        self.write(|s| s.absorb_cookies(response.header_values("set-cookie")));
        Ok(response)
    }

    /// Attaches the `at` token header for `webapi` endpoints.
    fn authorize(&self, request: Request) -> Request {
        match self.read(|s| s.token().map(str::to_string)) {
            Some(token) => request.header("at", token),
            None => request,
        }
    }

    async fn authed_get(&self, url: Url) -> Result<Response, Error> {
        let request = self.authorize(Request::get(url));
        Ok(self.exchange(request).await?)
    }

    /// Legacy `.asp` form post carrying `at` and `ver` in the body.
    async fn authed_form(&self, path: &str, extra: &[(&str, String)]) -> Result<Response, Error> {
        let (at, ver) = self.auth_pair().unwrap_or_default();
        let mut pairs = vec![("at", at), ("ver", ver)];
        pairs.extend(extra.iter().cloned());
        let request = Request::post(self.url(path)?).form(&pairs);
        Ok(self.exchange(request).await?)
    }
}

/// Report exchanges on top of an already authenticated session.
struct SessionExchange<'a>(&'a NetSchool);

#[async_trait]
impl ReportExchange for SessionExchange<'_> {
    async fn get(&self, path: &str) -> Result<Response, Error> {
        self.0.authed_get(self.0.url(path)?).await
    }

    async fn post_json(&self, path: &str, body: Value) -> Result<Response, Error> {
        let request = self.0.authorize(Request::post(self.0.url(path)?).json(body));
        Ok(self.0.exchange(request).await?)
    }
}
