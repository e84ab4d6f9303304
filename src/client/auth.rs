//! Login sequence, account bootstrap, logout and session renewal.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::NetSchool;
use crate::Error;
use crate::parser::{parse_app_context, parse_filter_catalog, parse_login_data, parse_login_response};
use crate::protect::{CoalescingKey, OP_LOG_IN};
use crate::report::ReportKind;
use crate::session::{
    AuthError, BootstrapError, LoginStep, Session, identity_from_catalog, login_form, password_digest,
};
use crate::transport::Request;

const SEED_PATH: &str = "/webapi/auth/getdata";
const LOGIN_PATH: &str = "/webapi/login";
const LOGOUT_PATH: &str = "/asp/logout.asp";
pub(super) const SETTINGS_PATH: &str = "/asp/MySettings/MySettings.asp";

/// Keeps the `Authenticating` state accurate even when a login is cancelled.
struct LoginInFlight<'a>(&'a NetSchool);

impl<'a> LoginInFlight<'a> {
    fn enter(client: &'a NetSchool) -> Self {
        client.write(Session::begin_login);
        Self(client)
    }
}

impl Drop for LoginInFlight<'_> {
    fn drop(&mut self) {
        self.0.write(Session::end_login);
    }
}

impl NetSchool {
    /// Logs in, bootstrapping the account context on the first success.
    ///
    /// On a client obtained from [`crate::Protected`], concurrent logins
    /// (explicit, or implicit renewals inside other operations) share one
    /// execution. On a bare client overlapping logins race and the last one
    /// to complete wins.
    ///
    /// # Errors
    ///
    /// - [`Error::Authentication`] naming the failed [`LoginStep`]
    /// - [`Error::Bootstrap`] when the first-login context bootstrap fails
    pub async fn log_in(&self) -> Result<(), Error> {
        match &self.login_gate {
            Some(registry) => {
                let client = self.without_gate();
                registry
                    .run(CoalescingKey::new(OP_LOG_IN), move || async move {
                        client.log_in_once().await
                    })
                    .await
            }
            None => self.log_in_once().await,
        }
    }

    fn without_gate(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            login_gate: None,
        }
    }

    #[instrument(skip(self), fields(host = %self.host()))]
    async fn log_in_once(&self) -> Result<(), Error> {
        let _in_flight = LoginInFlight::enter(self);

        let root = self.url("/").map_err(|e| AuthError::new(LoginStep::DetectScheme, e))?;
        let landing = self
            .exchange(Request::get(root))
            .await
            .map_err(|e| AuthError::new(LoginStep::DetectScheme, e))?;
        let secure = landing.url.scheme() == "https";
        self.write(|s| s.set_secure(secure));

        let seed_url = self.url(SEED_PATH).map_err(|e| AuthError::new(LoginStep::Seed, e))?;
        let seed = self
            .exchange(Request::post(seed_url))
            .await
            .map_err(|e| AuthError::new(LoginStep::Seed, e))?;
        let seed = parse_login_data(&seed.text()).map_err(|e| AuthError::new(LoginStep::Seed, e))?;

        let (login, secondary, digest) = self.read(|s| {
            let credentials = s.credentials();
            (
                credentials.login().to_string(),
                credentials.secondary().to_string(),
                password_digest(&seed.salt, credentials.password()),
            )
        });
        let body = login_form(&seed, &login, &digest, &secondary);

        let login_url = self.url(LOGIN_PATH).map_err(|e| AuthError::new(LoginStep::Submit, e))?;
        let answer = self
            .exchange(Request::post(login_url).raw_form(body))
            .await
            .map_err(|e| AuthError::new(LoginStep::Submit, e))?;
        let answer =
            parse_login_response(&answer.text()).map_err(|e| AuthError::new(LoginStep::Submit, e))?;

        let lifetime = Duration::from_millis(answer.time_out);
        self.write(|s| {
            s.apply_version(seed.ver.clone());
            s.apply_login(answer.at, lifetime, Instant::now());
        });
        info!(lifetime_secs = lifetime.as_secs(), "logged in");

        if !self.read(Session::has_identity) {
            self.bootstrap().await?;
        }
        Ok(())
    }

    /// Reads the account context and derives the account identity.
    #[instrument(skip(self))]
    async fn bootstrap(&self) -> Result<(), Error> {
        let settings = self
            .authed_form(SETTINGS_PATH, &[])
            .await
            .map_err(into_bootstrap)?;
        let context = parse_app_context(&settings.text()).map_err(BootstrapError::from)?;
        debug!(year_id = ?context.year_id, school_id = ?context.school_id, "account context parsed");
        self.write(|s| s.apply_context(context));

        let url = self
            .url(&ReportKind::StudentGrades.init_filters_path())
            .map_err(BootstrapError::from)?;
        let filters = self.authed_get(url).await.map_err(into_bootstrap)?;
        let catalog = parse_filter_catalog(&filters.text()).map_err(BootstrapError::from)?;
        let identity = identity_from_catalog(&catalog)?;
        let (user_id, subjects) = (identity.user_id, identity.subjects.len());

        if self.write(|s| s.apply_identity(identity)) {
            info!(user_id, subjects, "account bootstrapped");
        }
        Ok(())
    }

    /// Logs out. Token, version and expiry are cleared locally whether or not
    /// the server call succeeds; cookies and the account identity are kept.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fetch`] when the logout request fails.
    #[instrument(skip(self))]
    pub async fn log_out(&self) -> Result<(), Error> {
        if self.auth_pair().is_none() {
            self.write(Session::clear_auth);
            debug!("no session to log out of");
            return Ok(());
        }
        let result = self.authed_form(LOGOUT_PATH, &[]).await;
        self.write(Session::clear_auth);
        match result {
            Ok(_) => {
                info!("logged out");
                Ok(())
            }
            Err(error) => {
                warn!(error = %error, "logout request failed; session cleared locally");
                Err(error)
            }
        }
    }

    /// Logs in when the token is missing, about to expire, or the account was
    /// never bootstrapped.
    pub(super) async fn ensure_session(&self) -> Result<(), Error> {
        let now = Instant::now();
        let (stale, bootstrapped) = self.read(|s| (s.needs_authentication(now), s.has_identity()));
        if stale || !bootstrapped {
            debug!(stale, bootstrapped, "renewing session");
            self.log_in().await?;
        }
        Ok(())
    }
}

fn into_bootstrap(error: Error) -> Error {
    match error {
        Error::Fetch(fetch) => BootstrapError::from(fetch).into(),
        other => other,
    }
}
