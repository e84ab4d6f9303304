//! Request coalescing: concurrent identical calls share one execution.
//!
//! [`Protected`] wraps a [`NetSchool`] and exposes the same operations. Each
//! call is fingerprinted as a [`CoalescingKey`]; while an execution for that
//! key is in flight, further calls await it instead of issuing their own
//! requests. Results are not cached: once an execution settles, the next call
//! runs afresh.
//!
//! # Example
//!
//! ```no_run
//! use netschool_core::{Credentials, NetSchool, Protected};
//!
//! # async fn example() -> Result<(), netschool_core::Error> {
//! let client = NetSchool::new("sgo.example.org", Credentials::new("ivan", "secret", "cid=2"))?;
//! let protected = Protected::new(client);
//! // One announcements request goes out; both callers get its result.
//! let (a, b) = tokio::join!(protected.announcements(), protected.announcements());
//! assert_eq!(a?.len(), b?.len());
//! # Ok(())
//! # }
//! ```

mod key;
mod registry;

pub use key::{ArgValue, CoalescingKey, Sentinel};
pub use registry::InFlightRegistry;

use std::future::Future;
use std::sync::Arc;

use chrono::{Month, NaiveDate};

use crate::Error;
use crate::client::NetSchool;
use crate::parser::{
    Announcement, AppContext, Assignment, AssignmentType, Birthday, Diary, Journal, Subject,
    SubjectEntry, UserInfo,
};
use crate::session::SessionState;
use crate::validation::StudyYear;

/// Operation id shared by explicit logins and implicit session renewals.
pub const OP_LOG_IN: &str = "log_in";

/// Coalescing proxy over a [`NetSchool`] client.
///
/// Clones share the registry, so calls through any clone coalesce together.
#[derive(Debug, Clone)]
pub struct Protected {
    client: NetSchool,
    registry: Arc<InFlightRegistry>,
    sentinel: Option<Sentinel>,
}

impl Protected {
    /// Wraps `client`. Its implicit re-logins coalesce with explicit
    /// [`Protected::log_in`] calls.
    #[must_use]
    pub fn new(client: NetSchool) -> Self {
        let registry = Arc::new(InFlightRegistry::new());
        Self {
            client: client.with_login_gate(Arc::clone(&registry)),
            registry,
            sentinel: None,
        }
    }

    /// View whose calls carry `sentinel` as an extra argument.
    ///
    /// Calls through the view never join calls made without it (or with a
    /// different sentinel). Logins are exempt: they always share one key.
    #[must_use]
    pub fn distinct(&self, sentinel: Sentinel) -> Self {
        Self {
            client: self.client.clone(),
            registry: Arc::clone(&self.registry),
            sentinel: Some(sentinel),
        }
    }

    /// Underlying client.
    #[must_use]
    pub fn client(&self) -> &NetSchool {
        &self.client
    }

    /// Registry of in-flight executions.
    #[must_use]
    pub fn registry(&self) -> &InFlightRegistry {
        &self.registry
    }

    async fn call<T, F, Fut>(&self, key: CoalescingKey, op: F) -> Result<T, Error>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(NetSchool) -> Fut,
        Fut: Future<Output = Result<T, Error>> + Send + 'static,
    {
        let key = match self.sentinel {
            Some(sentinel) => key.arg(sentinel),
            None => key,
        };
        let client = self.client.clone();
        self.registry.run(key, move || op(client)).await
    }

    /// Coalesced [`NetSchool::log_in`].
    ///
    /// # Errors
    ///
    /// See [`NetSchool::log_in`].
    pub async fn log_in(&self) -> Result<(), Error> {
        self.client.log_in().await
    }

    /// Coalesced [`NetSchool::log_out`].
    ///
    /// # Errors
    ///
    /// See [`NetSchool::log_out`].
    pub async fn log_out(&self) -> Result<(), Error> {
        self.call(CoalescingKey::new("log_out"), |c| async move { c.log_out().await })
            .await
    }

    /// Coalesced [`NetSchool::user_info`].
    ///
    /// # Errors
    ///
    /// See [`NetSchool::user_info`].
    pub async fn user_info(&self) -> Result<UserInfo, Error> {
        self.call(CoalescingKey::new("user_info"), |c| async move { c.user_info().await })
            .await
    }

    /// Coalesced [`NetSchool::user_photo`].
    ///
    /// # Errors
    ///
    /// See [`NetSchool::user_photo`].
    pub async fn user_photo(&self) -> Result<Vec<u8>, Error> {
        self.call(CoalescingKey::new("user_photo"), |c| async move { c.user_photo().await })
            .await
    }

    /// Coalesced [`NetSchool::diary`].
    ///
    /// # Errors
    ///
    /// See [`NetSchool::diary`].
    pub async fn diary(&self, start: NaiveDate, end: NaiveDate) -> Result<Diary, Error> {
        let key = CoalescingKey::new("diary").arg(start).arg(end);
        self.call(key, move |c| async move { c.diary(start, end).await })
            .await
    }

    /// Coalesced [`NetSchool::subject`].
    ///
    /// # Errors
    ///
    /// See [`NetSchool::subject`].
    pub async fn subject(&self, subject_id: i64, start: NaiveDate, end: NaiveDate) -> Result<Subject, Error> {
        let key = CoalescingKey::new("subject").arg(subject_id).arg(start).arg(end);
        self.call(key, move |c| async move { c.subject(subject_id, start, end).await })
            .await
    }

    /// Coalesced [`NetSchool::journal`].
    ///
    /// # Errors
    ///
    /// See [`NetSchool::journal`].
    pub async fn journal(&self, start: NaiveDate, end: NaiveDate) -> Result<Journal, Error> {
        let key = CoalescingKey::new("journal").arg(start).arg(end);
        self.call(key, move |c| async move { c.journal(start, end).await })
            .await
    }

    /// Coalesced [`NetSchool::birthdays`].
    ///
    /// # Errors
    ///
    /// See [`NetSchool::birthdays`].
    pub async fn birthdays(&self, month: Month, without_parents: bool) -> Result<Vec<Birthday>, Error> {
        let key = CoalescingKey::new("birthdays").arg(month).arg(without_parents);
        self.call(key, move |c| async move { c.birthdays(month, without_parents).await })
            .await
    }

    /// Coalesced [`NetSchool::assignment`].
    ///
    /// # Errors
    ///
    /// See [`NetSchool::assignment`].
    pub async fn assignment(&self, assignment_id: i64) -> Result<Assignment, Error> {
        let key = CoalescingKey::new("assignment").arg(assignment_id);
        self.call(key, move |c| async move { c.assignment(assignment_id).await })
            .await
    }

    /// Coalesced [`NetSchool::announcements`].
    ///
    /// # Errors
    ///
    /// See [`NetSchool::announcements`].
    pub async fn announcements(&self) -> Result<Vec<Announcement>, Error> {
        self.call(CoalescingKey::new("announcements"), |c| async move { c.announcements().await })
            .await
    }

    /// Coalesced [`NetSchool::assignment_types`].
    ///
    /// # Errors
    ///
    /// See [`NetSchool::assignment_types`].
    pub async fn assignment_types(&self) -> Result<Vec<AssignmentType>, Error> {
        self.call(CoalescingKey::new("assignment_types"), |c| async move { c.assignment_types().await })
            .await
    }

    /// Coalesced [`NetSchool::unread_message_count`].
    ///
    /// # Errors
    ///
    /// See [`NetSchool::unread_message_count`].
    pub async fn unread_message_count(&self) -> Result<u32, Error> {
        self.call(CoalescingKey::new("unread_message_count"), |c| async move {
            c.unread_message_count().await
        })
        .await
    }

    /// See [`NetSchool::session_state`].
    #[must_use]
    pub fn session_state(&self) -> SessionState {
        self.client.session_state()
    }

    /// See [`NetSchool::needs_authentication`].
    #[must_use]
    pub fn needs_authentication(&self) -> bool {
        self.client.needs_authentication()
    }

    /// See [`NetSchool::study_year`].
    #[must_use]
    pub fn study_year(&self) -> Option<StudyYear> {
        self.client.study_year()
    }

    /// See [`NetSchool::subjects`].
    #[must_use]
    pub fn subjects(&self) -> Vec<SubjectEntry> {
        self.client.subjects()
    }

    /// See [`NetSchool::context`].
    #[must_use]
    pub fn context(&self) -> AppContext {
        self.client.context()
    }
}
