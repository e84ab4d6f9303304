//! NetSchool Core Library
//!
//! Session-aware client for the NetSchool school portal: it logs in, keeps the
//! session token fresh, issues typed queries, and drives the portal's
//! asynchronous report jobs to completion.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`transport`] - one-shot HTTP exchanges behind the [`Transport`] trait
//! - [`session`] - cookie jar, token lifetime, login digest and identity
//! - [`validation`] - date guards run before date-scoped requests
//! - [`parser`] - typed records from JSON and HTML payloads
//! - [`report`] - submit, poll and fetch of report jobs
//! - [`client`] - the [`NetSchool`] operation surface
//! - [`protect`] - [`Protected`], coalescing concurrent identical calls

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod constants;
mod error;
pub mod parser;
pub mod protect;
pub mod report;
pub mod session;
pub mod transport;
mod user_agent;
pub mod validation;

// Re-export commonly used types
pub use client::{ClientOptions, NetSchool};
pub use error::Error;
pub use parser::ParseError;
pub use protect::{ArgValue, CoalescingKey, InFlightRegistry, Protected, Sentinel};
pub use report::{PollPolicy, ReportError, ReportKind};
pub use session::{AuthError, BootstrapError, Credentials, LoginStep, SessionState};
pub use transport::{FetchError, HttpTransport, Request, Response, Transport};
pub use validation::{StudyYear, ValidationError};
