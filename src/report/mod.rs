//! Asynchronous report protocol: submit a filtered request, poll the job,
//! fetch the artifact.
//!
//! # Overview
//!
//! - [`ReportJob`] - one request with its filters, handle and status
//! - [`PollPolicy`] - poll cadence and total wait budget
//! - [`run_report`] - the submit, poll and fetch driver
//!
//! Artifacts are HTML and go to [`crate::parser::html`] afterwards.

mod error;
mod job;
mod pipeline;
mod policy;

pub use error::ReportError;
pub use job::{JobStatus, ReportFilter, ReportJob, ReportKind, result_path, status_path};
pub use pipeline::{ReportExchange, run_report};
pub use policy::PollPolicy;
