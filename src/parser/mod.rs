//! Response parsers turning portal payloads into typed records.
//!
//! # Overview
//!
//! - [`json`] - serde-backed parsers for the `webapi` endpoints
//! - [`html`] - `scraper`-backed parsers for `.asp` pages and report artifacts
//! - [`context`] - the loosely structured account context of the settings page
//!
//! Every parser returns either a complete record or a [`ParseError`].

pub mod context;
mod error;
pub mod html;
pub mod json;
mod records;

pub use context::parse_app_context;
pub use error::ParseError;
pub use html::{parse_birthdays, parse_journal_report, parse_subject_report, parse_user_info};
pub use json::{
    parse_announcements, parse_assignment, parse_assignment_types, parse_diary,
    parse_filter_catalog, parse_login_data, parse_login_response, parse_report_status,
    parse_report_ticket, parse_unread_count,
};
pub use records::{
    Announcement, AppContext, Assignment, AssignmentType, Attachment, Birthday, Diary, DiaryDay,
    FilterCatalog, FilterItem, FilterRange, FilterSource, Journal, JournalRow, Lesson,
    LessonAssignment, LoginData, LoginResponse, Mark, NamedRef, ReportTaskStatus, ReportTicket,
    Subject, SubjectEntry, SubjectMark, UserInfo,
};
