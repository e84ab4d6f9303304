//! Submit, poll and fetch driver for report jobs.

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, instrument, warn};

use super::error::ReportError;
use super::job::{JobStatus, ReportJob, result_path, status_path};
use super::policy::PollPolicy;
use crate::Error;
use crate::parser::{parse_report_status, parse_report_ticket};
use crate::transport::Response;

/// Authenticated exchanges the report pipeline needs.
///
/// The client implements this on top of its session so cookies and the auth
/// token ride along with every request.
#[async_trait]
pub trait ReportExchange: Send + Sync {
    /// Authenticated `GET` of `path`.
    async fn get(&self, path: &str) -> Result<Response, Error>;

    /// Authenticated `POST` of a JSON body to `path`.
    async fn post_json(&self, path: &str, body: Value) -> Result<Response, Error>;
}

/// Runs `job` to completion and returns its artifact.
///
/// The artifact is requested only after a `ready` status has been observed.
///
/// # Errors
///
/// - [`ReportError::Failed`] when the server reports the job as failed
/// - [`ReportError::Timeout`] when the poll budget runs out
/// - any exchange or parse failure along the way
#[instrument(skip(exchange, policy, job), fields(kind = %job.kind()))]
pub async fn run_report(
    exchange: &dyn ReportExchange,
    policy: &PollPolicy,
    job: &mut ReportJob,
) -> Result<Vec<u8>, Error> {
    let response = exchange
        .post_json(&job.kind().queue_path(), job.submission_body())
        .await?;
    let ticket = parse_report_ticket(&response.text())?;
    info!(task_id = %ticket.task_id, "report job submitted");
    job.mark_submitted(ticket.task_id.clone());

    wait_until_ready(exchange, policy, job, &ticket.task_id).await?;

    let artifact = exchange.get(&result_path(&ticket.task_id)).await?.body;
    debug!(task_id = %ticket.task_id, bytes = artifact.len(), "report artifact fetched");
    job.store_artifact(artifact.clone());
    Ok(artifact)
}

async fn wait_until_ready(
    exchange: &dyn ReportExchange,
    policy: &PollPolicy,
    job: &mut ReportJob,
    task_id: &str,
) -> Result<(), Error> {
    let started = Instant::now();
    let mut interval = policy.initial_interval();
    let mut polls = 0_u32;

    loop {
        let waited = started.elapsed();
        let Some(remaining) = policy.timeout().checked_sub(waited).filter(|r| !r.is_zero()) else {
            warn!(task_id, polls, waited_ms = waited.as_millis(), "report poll budget exhausted");
            return Err(ReportError::timeout(task_id, waited).into());
        };
        sleep(interval.min(remaining)).await;

        let budget = policy.timeout().saturating_sub(started.elapsed());
        let Ok(response) = timeout(budget, exchange.get(&status_path(task_id))).await else {
            let waited = started.elapsed();
            warn!(
                task_id,
                polls,
                waited_ms = waited.as_millis(),
                "report status request outlived poll budget"
            );
            return Err(ReportError::timeout(task_id, waited).into());
        };
        let response = response?;
        let status = JobStatus::from_snapshot(parse_report_status(&response.text())?)?;
        polls += 1;
        debug!(task_id, polls, ?status, "report job polled");
        job.observe(status.clone());

        match status {
            JobStatus::Ready => return Ok(()),
            JobStatus::Failed(message) => return Err(ReportError::failed(task_id, message).into()),
            JobStatus::Created | JobStatus::Submitted | JobStatus::Pending => {
                interval = policy.next_interval(interval);
            }
        }
    }
}
