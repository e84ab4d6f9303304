//! Report flavors and the per-request job record.

use std::fmt;

use chrono::NaiveDate;
use serde_json::{Value, json};

use crate::parser::{ParseError, ReportTaskStatus};
use crate::session::{FILTER_CLASS, FILTER_PERIOD, FILTER_STUDENT, FILTER_SUBJECT};
use crate::validation::canonical_date;

/// Report flavors the portal queues asynchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    /// Per-subject grade report.
    StudentGrades,
    /// Class journal with period totals.
    StudentTotal,
}

impl ReportKind {
    /// Path segment naming the report.
    #[must_use]
    pub fn slug(self) -> &'static str {
        match self {
            Self::StudentGrades => "studentgrades",
            Self::StudentTotal => "studenttotal",
        }
    }

    /// Submission endpoint.
    #[must_use]
    pub fn queue_path(self) -> String {
        format!("/webapi/reports/{}/queue", self.slug())
    }

    /// Default filter catalog endpoint.
    #[must_use]
    pub fn init_filters_path(self) -> String {
        format!("/webapi/reports/{}/initfilters", self.slug())
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// One `{filterId, filterValue}` pair of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFilter {
    /// Filter id, e.g. `SID`.
    pub filter_id: &'static str,
    /// Filter value as the portal expects it.
    pub filter_value: String,
}

impl ReportFilter {
    fn new(filter_id: &'static str, filter_value: impl ToString) -> Self {
        Self {
            filter_id,
            filter_value: filter_value.to_string(),
        }
    }
}

/// Lifecycle of a report job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// Built locally, not yet accepted by the server.
    Created,
    /// Accepted; the server returned a job handle.
    Submitted,
    /// Server is still producing the artifact.
    Pending,
    /// Artifact can be fetched.
    Ready,
    /// Server gave up on the job.
    Failed(Option<String>),
}

impl JobStatus {
    /// Interprets a status snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidValue`] for an unknown status word.
    pub fn from_snapshot(snapshot: ReportTaskStatus) -> Result<Self, ParseError> {
        match snapshot.status.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "ready" => Ok(Self::Ready),
            "failed" => Ok(Self::Failed(snapshot.message)),
            _ => Err(ParseError::invalid("report status", "status", snapshot.status)),
        }
    }
}

/// One report request, from submission to artifact. Never reused.
#[derive(Debug, Clone)]
pub struct ReportJob {
    kind: ReportKind,
    filters: Vec<ReportFilter>,
    task_id: Option<String>,
    status: JobStatus,
    artifact: Option<Vec<u8>>,
}

impl ReportJob {
    /// Creates a job with explicit filters.
    #[must_use]
    pub fn new(kind: ReportKind, filters: Vec<ReportFilter>) -> Self {
        Self {
            kind,
            filters,
            task_id: None,
            status: JobStatus::Created,
            artifact: None,
        }
    }

    /// Grade report for one subject over `start..=end`.
    #[must_use]
    pub fn student_grades(user_id: i64, class_id: i64, subject_id: i64, start: NaiveDate, end: NaiveDate) -> Self {
        Self::new(
            ReportKind::StudentGrades,
            vec![
                ReportFilter::new(FILTER_STUDENT, user_id),
                ReportFilter::new(FILTER_CLASS, class_id),
                ReportFilter::new(FILTER_SUBJECT, subject_id),
                ReportFilter::new(FILTER_PERIOD, period(start, end)),
            ],
        )
    }

    /// Class journal over `start..=end`.
    #[must_use]
    pub fn student_total(user_id: i64, class_id: i64, start: NaiveDate, end: NaiveDate) -> Self {
        Self::new(
            ReportKind::StudentTotal,
            vec![
                ReportFilter::new(FILTER_STUDENT, user_id),
                ReportFilter::new(FILTER_CLASS, class_id),
                ReportFilter::new(FILTER_PERIOD, period(start, end)),
            ],
        )
    }

    /// Report flavor.
    #[must_use]
    pub fn kind(&self) -> ReportKind {
        self.kind
    }

    /// Filters in submission order.
    #[must_use]
    pub fn filters(&self) -> &[ReportFilter] {
        &self.filters
    }

    /// Job handle once submitted.
    #[must_use]
    pub fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref()
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> &JobStatus {
        &self.status
    }

    /// Downloaded artifact.
    #[must_use]
    pub fn artifact(&self) -> Option<&[u8]> {
        self.artifact.as_deref()
    }

    /// Submission JSON: `{"selectedData": [{"filterId", "filterValue"}, ...]}`.
    #[must_use]
    pub fn submission_body(&self) -> Value {
        let selected: Vec<Value> = self
            .filters
            .iter()
            .map(|f| json!({ "filterId": f.filter_id, "filterValue": f.filter_value }))
            .collect();
        json!({ "selectedData": selected })
    }

    pub(crate) fn mark_submitted(&mut self, task_id: String) {
        self.task_id = Some(task_id);
        self.status = JobStatus::Submitted;
    }

    pub(crate) fn observe(&mut self, status: JobStatus) {
        self.status = status;
    }

    pub(crate) fn store_artifact(&mut self, artifact: Vec<u8>) {
        self.artifact = Some(artifact);
    }
}

/// Status endpoint of a job.
#[must_use]
pub fn status_path(task_id: &str) -> String {
    format!("/webapi/reports/tasks/{}", urlencoding::encode(task_id))
}

/// Artifact endpoint of a job.
#[must_use]
pub fn result_path(task_id: &str) -> String {
    format!("/webapi/reports/tasks/{}/result", urlencoding::encode(task_id))
}

fn period(start: NaiveDate, end: NaiveDate) -> String {
    format!("{}-{}", canonical_date(start), canonical_date(end))
}
