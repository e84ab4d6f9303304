//! Portal payloads shared by the integration tests.

use chrono::NaiveDate;

pub const TOKEN: &str = "TOKEN-1";
pub const SESSION_LIFETIME_MS: u64 = 60_000;

pub const SEED: &str = r#"{"lt": "LT-1", "ver": "1700", "salt": "SALT-42"}"#;

pub const SETTINGS: &str = r#"<html><body>
    <form>
      <input type="hidden" name="at" value="TOKEN-1">
      <input type="hidden" name="ver" value="1700">
      <input name="LastName" value="Petrov">
      <input name="FirstName" value="Ivan">
      <input name="UserName" value="ivan">
      <input name="BirthDate" value="12.03.2010">
    </form>
    <script>
      var appContext = { yearId: '2023', schoolId: 45, schoolName: 'School No. 1' };
    </script>
</body></html>"#;

pub const FILTERS: &str = r#"{"filterSources": [
    {"filterId": "SID", "items": [{"value": "7", "title": "Ivan"}], "defaultValue": "7"},
    {"filterId": "PCLID", "items": [{"value": "10", "title": "7A"}], "defaultValue": "10"},
    {"filterId": "SGID", "items": [{"value": "1", "title": "Algebra"}, {"value": "2", "title": "History"}]},
    {"filterId": "period", "range": {"start": "2023-09-01T00:00:00", "end": "2024-05-25T00:00:00"}}
]}"#;

pub const DIARY: &str = r#"{
    "weekStart": "2023-09-04T00:00:00",
    "weekEnd": "2023-09-10T00:00:00",
    "weekDays": [{
        "date": "2023-09-05T00:00:00",
        "lessons": [{"number": 1, "subjectName": "Algebra"}]
    }]
}"#;

pub const ANNOUNCEMENTS: &str = r#"[{"id": 1, "name": "Holiday", "description": "No school",
    "postDate": "2023-10-30T12:00:00"}]"#;

pub const JOURNAL_REPORT: &str = r#"<html><body><table class="table-print">
    <tr><th>Subject</th><th>Marks</th><th>Average</th><th>Total</th></tr>
    <tr><td>Algebra</td><td>5 4 5</td><td>4,67</td><td>5</td></tr>
    <tr><td>History</td><td></td><td></td><td></td></tr>
</table></body></html>"#;

#[must_use]
pub fn login_ok(token: &str, lifetime_ms: u64) -> String {
    format!(r#"{{"at": "{token}", "timeOut": {lifetime_ms}}}"#)
}

#[must_use]
pub fn report_status(status: &str) -> String {
    format!(r#"{{"status": "{status}"}}"#)
}

#[must_use]
pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}
