//! Portal operations: diary, reports, profile, calendar, mail counter.

use chrono::{Month, NaiveDate};
use tracing::{debug, instrument, warn};

use super::auth::SETTINGS_PATH;
use super::{NetSchool, SessionExchange};
use crate::Error;
use crate::parser::{
    Announcement, Assignment, AssignmentType, Birthday, Diary, Journal, Subject, UserInfo,
    parse_announcements, parse_app_context, parse_assignment, parse_assignment_types,
    parse_birthdays, parse_diary, parse_journal_report, parse_subject_report, parse_unread_count,
    parse_user_info,
};
use crate::report::{ReportJob, run_report};
use crate::validation::{StudyYear, ValidationError, check_dates, check_interval};

const PHOTO_PATH: &str = "/webapi/users/photo";
const DIARY_PATH: &str = "/webapi/student/diary";
const ANNOUNCEMENTS_PATH: &str = "/webapi/announcements";
const ASSIGNMENT_TYPES_PATH: &str = "/webapi/grade/assignment/types";
const UNREAD_COUNT_PATH: &str = "/webapi/mail/messages/unreadcount";
const BIRTHDAYS_PATH: &str = "/asp/Calendar/MonthBirth.asp";

impl NetSchool {
    /// School-year window, logging in first when it is not known yet.
    async fn known_study_year(&self) -> Result<StudyYear, Error> {
        if let Some(year) = self.study_year() {
            return Ok(year);
        }
        self.ensure_session().await?;
        Ok(self.require_identity()?.study_year)
    }

    /// Profile of the logged-in user.
    ///
    /// # Errors
    ///
    /// Returns [`Error`] when the session cannot be established, the settings
    /// page cannot be fetched, or its profile form is incomplete.
    #[instrument(skip(self))]
    pub async fn user_info(&self) -> Result<UserInfo, Error> {
        self.ensure_session().await?;
        let page = self.authed_form(SETTINGS_PATH, &[]).await?.text();
        match parse_app_context(&page) {
            Ok(context) => self.write(|s| s.apply_context(context)),
            Err(e) => warn!(error = %e, "settings page without app context, keeping session identity"),
        }
        Ok(parse_user_info(&page)?)
    }

    /// Profile photo bytes of the logged-in user.
    ///
    /// # Errors
    ///
    /// Returns [`Error`] when the session cannot be established or the photo
    /// request fails.
    #[instrument(skip(self))]
    pub async fn user_photo(&self) -> Result<Vec<u8>, Error> {
        self.ensure_session().await?;
        let identity = self.require_identity()?;
        let (at, ver) = self.auth_pair().unwrap_or_default();
        let mut url = self.url(PHOTO_PATH)?;
        url.query_pairs_mut()
            .append_pair("AT", &at)
            .append_pair("VER", &ver)
            .append_pair("userId", &identity.user_id.to_string());
        let photo = self.authed_get(url).await?.body;
        debug!(bytes = photo.len(), "photo fetched");
        Ok(photo)
    }

    /// Diary for `start..=end`.
    ///
    /// Both dates must lie in the school year and span at least 24 hours.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] before any diary request for bad dates,
    /// otherwise any session, fetch or parse failure.
    #[instrument(skip(self))]
    pub async fn diary(&self, start: NaiveDate, end: NaiveDate) -> Result<Diary, Error> {
        let year = self.known_study_year().await?;
        check_dates(&year, &[start, end])?;
        check_interval(start, end)?;
        self.ensure_session().await?;

        let identity = self.require_identity()?;
        let year_id = self.read(|s| s.context().year_id);
        let mut url = self.url(DIARY_PATH)?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("studentId", &identity.user_id.to_string())
                .append_pair("weekStart", &start.format("%Y-%m-%d").to_string())
                .append_pair("weekEnd", &end.format("%Y-%m-%d").to_string());
            if let Some(year_id) = year_id {
                query.append_pair("yearId", &year_id.to_string());
            }
            query.append_pair("withLaAssigns", "true");
        }
        let response = self.authed_get(url).await?;
        Ok(parse_diary(&response.text())?)
    }

    /// Grade report for one subject over `start..=end`.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::OutOfRange`] for dates outside the school year
    /// - [`ValidationError::UnknownSubject`] when `subject_id` is not in the catalog
    /// - [`Error::Report`] when the report job fails or times out
    #[instrument(skip(self))]
    pub async fn subject(&self, subject_id: i64, start: NaiveDate, end: NaiveDate) -> Result<Subject, Error> {
        let year = self.known_study_year().await?;
        check_dates(&year, &[start, end])?;
        let identity = self.require_identity()?;
        if !identity.subjects.iter().any(|s| s.id == subject_id) {
            return Err(ValidationError::UnknownSubject { id: subject_id }.into());
        }
        self.ensure_session().await?;

        let mut job = ReportJob::student_grades(identity.user_id, identity.class_id, subject_id, start, end);
        let artifact = run_report(&SessionExchange(self), &self.inner.options.poll, &mut job).await?;
        Ok(parse_subject_report(&String::from_utf8_lossy(&artifact))?)
    }

    /// Class journal (totals) over `start..=end`.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::OutOfRange`] for dates outside the school year
    /// - [`Error::Report`] when the report job fails or times out
    #[instrument(skip(self))]
    pub async fn journal(&self, start: NaiveDate, end: NaiveDate) -> Result<Journal, Error> {
        let year = self.known_study_year().await?;
        check_dates(&year, &[start, end])?;
        self.ensure_session().await?;

        let identity = self.require_identity()?;
        let mut job = ReportJob::student_total(identity.user_id, identity.class_id, start, end);
        let artifact = run_report(&SessionExchange(self), &self.inner.options.poll, &mut job).await?;
        Ok(parse_journal_report(&String::from_utf8_lossy(&artifact))?)
    }

    /// Birthdays of `month`, optionally leaving parents out.
    ///
    /// # Errors
    ///
    /// Returns [`Error`] when the session cannot be established, the calendar
    /// page cannot be fetched, or its table is malformed.
    #[instrument(skip(self))]
    pub async fn birthdays(&self, month: Month, without_parents: bool) -> Result<Vec<Birthday>, Error> {
        self.ensure_session().await?;
        let mut roles = vec![("RPTypes", "2".to_string()), ("RPTypes", "3".to_string())];
        if !without_parents {
            roles.push(("RPTypes", "4".to_string()));
        }
        let mut extra = vec![
            ("AT", self.auth_pair().unwrap_or_default().0),
            ("BIRTH_MONTH", month.number_from_month().to_string()),
            ("ViewType", "1".to_string()),
        ];
        extra.extend(roles);
        let page = self.authed_form(BIRTHDAYS_PATH, &extra).await?;
        Ok(parse_birthdays(&page.text())?)
    }

    /// Full details of one assignment.
    ///
    /// # Errors
    ///
    /// Returns [`Error`] when the session cannot be established or the
    /// assignment cannot be fetched or parsed.
    #[instrument(skip(self))]
    pub async fn assignment(&self, assignment_id: i64) -> Result<Assignment, Error> {
        self.ensure_session().await?;
        let identity = self.require_identity()?;
        let mut url = self.url(&format!("{DIARY_PATH}/assigns/{assignment_id}"))?;
        url.query_pairs_mut()
            .append_pair("studentId", &identity.user_id.to_string());
        let response = self.authed_get(url).await?;
        Ok(parse_assignment(&response.text())?)
    }

    /// All current school announcements.
    ///
    /// # Errors
    ///
    /// Returns [`Error`] when the session cannot be established or the list
    /// cannot be fetched or parsed.
    #[instrument(skip(self))]
    pub async fn announcements(&self) -> Result<Vec<Announcement>, Error> {
        self.ensure_session().await?;
        let mut url = self.url(ANNOUNCEMENTS_PATH)?;
        url.query_pairs_mut().append_pair("take", "-1");
        let response = self.authed_get(url).await?;
        Ok(parse_announcements(&response.text())?)
    }

    /// Assignment types used by the school.
    ///
    /// # Errors
    ///
    /// Returns [`Error`] when the session cannot be established or the list
    /// cannot be fetched or parsed.
    #[instrument(skip(self))]
    pub async fn assignment_types(&self) -> Result<Vec<AssignmentType>, Error> {
        self.ensure_session().await?;
        let mut url = self.url(ASSIGNMENT_TYPES_PATH)?;
        url.query_pairs_mut().append_pair("all", "false");
        let response = self.authed_get(url).await?;
        Ok(parse_assignment_types(&response.text())?)
    }

    /// Number of unread mail messages.
    ///
    /// # Errors
    ///
    /// Returns [`Error`] when the session cannot be established or the counter
    /// cannot be fetched or parsed.
    #[instrument(skip(self))]
    pub async fn unread_message_count(&self) -> Result<u32, Error> {
        self.ensure_session().await?;
        let identity = self.require_identity()?;
        let mut url = self.url(UNREAD_COUNT_PATH)?;
        url.query_pairs_mut()
            .append_pair("userId", &identity.user_id.to_string());
        let response = self.authed_get(url).await?;
        Ok(parse_unread_count(&response.text())?)
    }
}
