//! Portal session: cookies, token lifetime, login sequence pieces.
//!
//! # Overview
//!
//! - [`Session`] - mutable state of one logged-in (or not yet) account
//! - [`CookieJar`] - `Set-Cookie` accumulation and `Cookie` rendering
//! - [`password_digest`], [`login_form`] - the pure halves of the login sequence
//! - [`identity_from_catalog`] - account identity from the default report filters
//!
//! The network side of logging in lives in [`crate::client`].

mod cookies;
mod error;
mod login;
mod state;

pub use cookies::CookieJar;
pub use error::{AuthError, AuthFailure, BootstrapError, LoginStep};
pub use login::{
    FILTER_CLASS, FILTER_PERIOD, FILTER_STUDENT, FILTER_SUBJECT, LoginDigest,
    identity_from_catalog, login_form, password_digest,
};
pub use state::{AccountIdentity, AuthToken, Credentials, Session, SessionState};
