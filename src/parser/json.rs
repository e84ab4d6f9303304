//! Parsers for the JSON `webapi` endpoints.

use serde::de::DeserializeOwned;

use super::ParseError;
use super::records::{
    Announcement, Assignment, AssignmentType, Diary, FilterCatalog, LoginData, LoginResponse,
    ReportTaskStatus, ReportTicket,
};

fn parse<T: DeserializeOwned>(what: &'static str, body: &str) -> Result<T, ParseError> {
    serde_json::from_str(body).map_err(|e| ParseError::json(what, &e))
}

/// Parses `/webapi/auth/getdata`.
///
/// # Errors
///
/// Returns [`ParseError`] when `lt`, `ver` or `salt` is absent.
pub fn parse_login_data(body: &str) -> Result<LoginData, ParseError> {
    parse("login data", body)
}

/// Parses the `/webapi/login` answer.
///
/// # Errors
///
/// Returns [`ParseError`] when `at` or `timeOut` is absent or the token is empty.
pub fn parse_login_response(body: &str) -> Result<LoginResponse, ParseError> {
    let response: LoginResponse = parse("login response", body)?;
    if response.at.is_empty() {
        return Err(ParseError::missing("login response", "at"));
    }
    Ok(response)
}

/// Parses a report's default filter catalog.
///
/// # Errors
///
/// Returns [`ParseError`] when `filterSources` is absent or malformed.
pub fn parse_filter_catalog(body: &str) -> Result<FilterCatalog, ParseError> {
    parse("filter catalog", body)
}

/// Parses `/webapi/student/diary`.
///
/// # Errors
///
/// Returns [`ParseError`] on a malformed diary payload.
pub fn parse_diary(body: &str) -> Result<Diary, ParseError> {
    parse("diary", body)
}

/// Parses `/webapi/student/diary/assigns/{id}`.
///
/// # Errors
///
/// Returns [`ParseError`] on a malformed assignment payload.
pub fn parse_assignment(body: &str) -> Result<Assignment, ParseError> {
    parse("assignment", body)
}

/// Parses `/webapi/announcements`.
///
/// # Errors
///
/// Returns [`ParseError`] on a malformed announcement list.
pub fn parse_announcements(body: &str) -> Result<Vec<Announcement>, ParseError> {
    parse("announcements", body)
}

/// Parses `/webapi/grade/assignment/types`.
///
/// # Errors
///
/// Returns [`ParseError`] on a malformed type list.
pub fn parse_assignment_types(body: &str) -> Result<Vec<AssignmentType>, ParseError> {
    parse("assignment types", body)
}

/// Parses the unread message counter (a bare JSON number).
///
/// # Errors
///
/// Returns [`ParseError`] when the body is not a non-negative integer.
pub fn parse_unread_count(body: &str) -> Result<u32, ParseError> {
    parse("unread message count", body.trim())
}

/// Parses a report submission answer.
///
/// # Errors
///
/// Returns [`ParseError`] when `taskId` is absent or empty.
pub fn parse_report_ticket(body: &str) -> Result<ReportTicket, ParseError> {
    let ticket: ReportTicket = parse("report ticket", body)?;
    if ticket.task_id.is_empty() {
        return Err(ParseError::missing("report ticket", "taskId"));
    }
    Ok(ticket)
}

/// Parses a report job status snapshot.
///
/// # Errors
///
/// Returns [`ParseError`] when `status` is absent.
pub fn parse_report_status(body: &str) -> Result<ReportTaskStatus, ParseError> {
    parse("report status", body)
}
