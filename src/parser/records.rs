//! Typed records produced by the portal parsers.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// Login seed material from `/webapi/auth/getdata`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginData {
    /// One-time login ticket.
    #[serde(deserialize_with = "string_or_number")]
    pub lt: String,
    /// Protocol version.
    #[serde(deserialize_with = "string_or_number")]
    pub ver: String,
    /// Salt for the password digest.
    #[serde(deserialize_with = "string_or_number")]
    pub salt: String,
}

/// Successful login answer from `/webapi/login`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginResponse {
    /// Auth token.
    pub at: String,
    /// Session lifetime in milliseconds.
    #[serde(rename = "timeOut")]
    pub time_out: u64,
}

/// Account context embedded in the settings page.
///
/// Every field is optional: the page is loosely structured and different
/// portal versions emit different subsets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AppContext {
    /// Refreshed auth token.
    pub at: Option<String>,
    /// Refreshed protocol version.
    pub ver: Option<String>,
    /// Current school-year id.
    pub year_id: Option<i64>,
    /// School id.
    pub school_id: Option<i64>,
    /// Human label of the current year, e.g. `2023/2024`.
    pub current_year: Option<String>,
    /// School display name.
    pub school_name: Option<String>,
    /// Server date format pattern.
    pub date_format: Option<String>,
    /// Server time format pattern.
    pub time_format: Option<String>,
    /// Server time-zone offset from UTC, in minutes.
    pub server_time_zone: Option<i32>,
}

/// One entry of a report filter source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FilterItem {
    /// Filter value sent back to the server.
    #[serde(deserialize_with = "string_or_number")]
    pub value: String,
    /// Display title.
    #[serde(default)]
    pub title: String,
}

/// Date range attached to the `period` filter source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct FilterRange {
    /// First day.
    #[serde(deserialize_with = "portal_date")]
    pub start: NaiveDate,
    /// Last day.
    #[serde(deserialize_with = "portal_date")]
    pub end: NaiveDate,
}

/// One filter source of a report's default filter catalog.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSource {
    /// Filter identifier, e.g. `SID`, `PCLID`, `SGID`, `period`.
    pub filter_id: String,
    /// Selectable values.
    #[serde(default)]
    pub items: Vec<FilterItem>,
    /// Preselected value.
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub default_value: Option<String>,
    /// Allowed range for date filters.
    #[serde(default)]
    pub range: Option<FilterRange>,
}

/// Default filter catalog of a report.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCatalog {
    /// Filter sources in server order.
    pub filter_sources: Vec<FilterSource>,
}

impl FilterCatalog {
    /// Returns the source with the given id.
    #[must_use]
    pub fn source(&self, filter_id: &str) -> Option<&FilterSource> {
        self.filter_sources.iter().find(|s| s.filter_id == filter_id)
    }
}

/// Subject of the account's class, from the subject catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectEntry {
    /// Subject id used in report filters.
    pub id: i64,
    /// Display name.
    pub name: String,
}

/// Profile fields from the settings page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserInfo {
    /// Family name.
    pub last_name: String,
    /// Given name.
    pub first_name: String,
    /// Patronymic.
    pub middle_name: Option<String>,
    /// Login name.
    pub login: Option<String>,
    /// Date of birth.
    pub birth_date: Option<NaiveDate>,
    /// Email address.
    pub email: Option<String>,
    /// Mobile phone.
    pub mobile_phone: Option<String>,
}

/// Mark attached to a diary assignment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Mark {
    /// Numeric mark, absent for pass/fail entries.
    pub mark: Option<i64>,
    /// Whether the mark is a debt marker.
    #[serde(default)]
    pub duty_mark: bool,
}

/// Assignment as listed in the diary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonAssignment {
    /// Assignment id.
    pub id: i64,
    /// Assignment type id.
    pub type_id: i64,
    /// Title.
    pub assignment_name: String,
    /// Due date.
    #[serde(deserialize_with = "portal_date")]
    pub due_date: NaiveDate,
    /// Mark, when graded.
    #[serde(default)]
    pub mark: Option<Mark>,
}

/// Lesson of a diary day.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    /// Position in the day's timetable.
    pub number: u32,
    /// Subject name.
    pub subject_name: String,
    /// Room label.
    #[serde(default)]
    pub room: Option<String>,
    /// Start time, `HH:MM`.
    #[serde(default)]
    pub start_time: Option<String>,
    /// End time, `HH:MM`.
    #[serde(default)]
    pub end_time: Option<String>,
    /// Assignments of the lesson.
    #[serde(default)]
    pub assignments: Vec<LessonAssignment>,
}

/// One day of the diary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DiaryDay {
    /// Day.
    #[serde(deserialize_with = "portal_date")]
    pub date: NaiveDate,
    /// Lessons in timetable order.
    #[serde(default)]
    pub lessons: Vec<Lesson>,
}

/// Diary for a date window.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diary {
    /// First day of the window.
    #[serde(deserialize_with = "portal_date")]
    pub week_start: NaiveDate,
    /// Last day of the window.
    #[serde(deserialize_with = "portal_date")]
    pub week_end: NaiveDate,
    /// Term label.
    #[serde(default)]
    pub term_name: Option<String>,
    /// Class label.
    #[serde(default)]
    pub class_name: Option<String>,
    /// Days in order.
    #[serde(default)]
    pub week_days: Vec<DiaryDay>,
}

/// Named reference used by several payloads.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NamedRef {
    /// Id.
    pub id: i64,
    /// Display name.
    #[serde(alias = "fio")]
    pub name: String,
}

/// File attached to an assignment or announcement.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Attachment id.
    pub id: i64,
    /// Stored name.
    pub name: Option<String>,
    /// Name at upload time.
    pub original_file_name: Option<String>,
}

/// Full assignment details.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    /// Assignment id.
    pub id: i64,
    /// Title.
    pub assignment_name: String,
    /// Long description.
    #[serde(default)]
    pub description: Option<String>,
    /// Due date.
    #[serde(deserialize_with = "portal_date")]
    pub date: NaiveDate,
    /// Weight in the average.
    #[serde(default)]
    pub weight: Option<u32>,
    /// Subject group.
    pub subject_group: NamedRef,
    /// Teachers.
    #[serde(default)]
    pub teachers: Vec<NamedRef>,
    /// Attachments.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// School announcement.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    /// Announcement id.
    pub id: i64,
    /// Title.
    pub name: String,
    /// HTML body.
    #[serde(default)]
    pub description: String,
    /// Publication date.
    #[serde(deserialize_with = "portal_date")]
    pub post_date: NaiveDate,
    /// Author.
    #[serde(default)]
    pub author: Option<NamedRef>,
    /// Attachments.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// Kind of assignment (homework, test, ...).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AssignmentType {
    /// Type id.
    pub id: i64,
    /// Full name.
    pub name: String,
    /// Short label.
    #[serde(default)]
    pub abbr: Option<String>,
    /// Display order.
    #[serde(default)]
    pub order: Option<i32>,
}

/// Birthday entry from the month calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Birthday {
    /// Person's name.
    pub name: String,
    /// Role label (student, parent, staff).
    pub role: String,
    /// Date of birth.
    pub date: NaiveDate,
}

/// Mark row of a subject report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectMark {
    /// Lesson date.
    pub date: NaiveDate,
    /// Assignment kind label.
    pub kind: String,
    /// Mark as printed.
    pub value: String,
}

/// Per-subject grade report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subject {
    /// Subject name.
    pub name: String,
    /// Marks in report order.
    pub marks: Vec<SubjectMark>,
    /// Printed average, when present.
    pub average: Option<f64>,
}

/// Row of the class journal (totals) report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JournalRow {
    /// Subject name.
    pub subject: String,
    /// Marks as printed.
    pub marks: Vec<String>,
    /// Average, when present.
    pub average: Option<f64>,
    /// Period total, when present.
    pub total: Option<String>,
}

/// Class journal (totals) report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Journal {
    /// Rows in report order.
    pub rows: Vec<JournalRow>,
}

/// Answer to a report submission.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReportTicket {
    /// Job handle used for polling and fetching.
    #[serde(rename = "taskId", deserialize_with = "string_or_number")]
    pub task_id: String,
}

/// Status snapshot of a report job.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReportTaskStatus {
    /// `pending`, `ready` or `failed`.
    pub status: String,
    /// Server explanation, usually only present on failure.
    #[serde(default)]
    pub message: Option<String>,
}

/// Parses the portal's `YYYY-MM-DD[THH:MM:SS...]` timestamps into a date.
pub(crate) fn parse_portal_date(raw: &str) -> Option<NaiveDate> {
    let day = raw.get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn portal_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_portal_date(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid portal date {raw:?}")))
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

fn optional_string_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) => Ok(Some(s)),
        serde_json::Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_portal_date_accepts_timestamp_suffix() {
        assert_eq!(
            parse_portal_date("2023-09-04T00:00:00"),
            NaiveDate::from_ymd_opt(2023, 9, 4)
        );
        assert_eq!(
            parse_portal_date("2023-09-04"),
            NaiveDate::from_ymd_opt(2023, 9, 4)
        );
        assert_eq!(parse_portal_date("04.09.2023"), None);
        assert_eq!(parse_portal_date("2023-02-30"), None);
    }

    #[test]
    fn test_login_data_accepts_numeric_fields() {
        let data: LoginData =
            serde_json::from_str(r#"{"lt": 123456, "ver": 987, "salt": "s4lt"}"#).unwrap();
        assert_eq!(data.lt, "123456");
        assert_eq!(data.ver, "987");
        assert_eq!(data.salt, "s4lt");
    }

    #[test]
    fn test_filter_catalog_source_lookup() {
        let catalog: FilterCatalog = serde_json::from_str(
            r#"{"filterSources": [
                {"filterId": "SID", "items": [{"value": 7, "title": "Ivan"}], "defaultValue": 7},
                {"filterId": "period", "range": {"start": "2023-09-01T00:00:00", "end": "2024-05-25T00:00:00"}}
            ]}"#,
        )
        .unwrap();
        let sid = catalog.source("SID").unwrap();
        assert_eq!(sid.default_value.as_deref(), Some("7"));
        assert_eq!(sid.items[0].value, "7");
        let period = catalog.source("period").unwrap().range.unwrap();
        assert_eq!(period.end, NaiveDate::from_ymd_opt(2024, 5, 25).unwrap());
        assert!(catalog.source("SGID").is_none());
    }
}
