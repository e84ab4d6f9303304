//! Parsers for HTML pages and report artifacts.
//!
//! Legacy `.asp` pages and finished report jobs come back as HTML. Tables use
//! the portal's `table-print` class; dates are printed as `DD.MM.YYYY` and
//! decimals with a comma.

use std::sync::LazyLock;

use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};

use super::ParseError;
use super::records::{Birthday, Journal, JournalRow, Subject, SubjectMark, UserInfo};

#[allow(clippy::expect_used)]
static PRINT_TABLE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("table.table-print").expect("table selector is valid") // Static pattern, safe to panic
});
#[allow(clippy::expect_used)]
static ROW: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr").expect("row selector is valid"));
#[allow(clippy::expect_used)]
static CELL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td").expect("cell selector is valid"));
#[allow(clippy::expect_used)]
static INPUT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("input[name]").expect("input selector is valid"));
#[allow(clippy::expect_used)]
static SUBJECT_NAME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".subject-name").expect("subject selector is valid"));
#[allow(clippy::expect_used)]
static AVERAGE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".average").expect("average selector is valid"));

/// Parses the profile form of the settings page.
///
/// # Errors
///
/// Returns [`ParseError::MissingField`] when the last or first name input is
/// absent, and [`ParseError::InvalidValue`] for an unreadable birth date.
pub fn parse_user_info(html: &str) -> Result<UserInfo, ParseError> {
    const WHAT: &str = "user info";
    let document = Html::parse_document(html);
    let input = |name: &str| -> Option<String> {
        document
            .select(&INPUT)
            .find(|el| el.value().attr("name") == Some(name))
            .and_then(|el| el.value().attr("value"))
            .map(|v| v.trim().to_string())
    };
    let non_empty = |value: Option<String>| value.filter(|v| !v.is_empty());

    let last_name = non_empty(input("LastName")).ok_or(ParseError::missing(WHAT, "LastName"))?;
    let first_name = non_empty(input("FirstName")).ok_or(ParseError::missing(WHAT, "FirstName"))?;
    let birth_date = match non_empty(input("BirthDate")) {
        Some(raw) => Some(parse_print_date(&raw).ok_or(ParseError::invalid(WHAT, "BirthDate", raw))?),
        None => None,
    };

    Ok(UserInfo {
        last_name,
        first_name,
        middle_name: non_empty(input("MiddleName")),
        login: non_empty(input("UserName")),
        birth_date,
        email: non_empty(input("EMail")),
        mobile_phone: non_empty(input("MobilePhone")),
    })
}

/// Parses the month birthday calendar.
///
/// Rows are `name | role | DD.MM.YYYY`; header rows are skipped.
///
/// # Errors
///
/// Returns [`ParseError`] when the table is absent or a row is malformed.
pub fn parse_birthdays(html: &str) -> Result<Vec<Birthday>, ParseError> {
    const WHAT: &str = "birthdays";
    let document = Html::parse_document(html);
    let table = document
        .select(&PRINT_TABLE)
        .next()
        .ok_or(ParseError::missing(WHAT, "table.table-print"))?;

    data_rows(table)
        .map(|cells| {
            let [name, role, date] = cells.as_slice() else {
                return Err(ParseError::invalid(WHAT, "row", cells.join(" | ")));
            };
            let parsed = parse_print_date(date).ok_or(ParseError::invalid(WHAT, "date", date.clone()))?;
            Ok(Birthday {
                name: name.clone(),
                role: role.clone(),
                date: parsed,
            })
        })
        .collect()
}

/// Parses a finished per-subject grade report.
///
/// # Errors
///
/// Returns [`ParseError`] when the subject heading or mark table is absent or
/// a row is malformed.
pub fn parse_subject_report(html: &str) -> Result<Subject, ParseError> {
    const WHAT: &str = "subject report";
    let document = Html::parse_document(html);
    let name = document
        .select(&SUBJECT_NAME)
        .next()
        .map(element_text)
        .filter(|n| !n.is_empty())
        .ok_or(ParseError::missing(WHAT, "subject-name"))?;
    let table = document
        .select(&PRINT_TABLE)
        .next()
        .ok_or(ParseError::missing(WHAT, "table.table-print"))?;

    let marks = data_rows(table)
        .map(|cells| {
            let [date, kind, value] = cells.as_slice() else {
                return Err(ParseError::invalid(WHAT, "row", cells.join(" | ")));
            };
            let parsed = parse_print_date(date).ok_or(ParseError::invalid(WHAT, "date", date.clone()))?;
            Ok(SubjectMark {
                date: parsed,
                kind: kind.clone(),
                value: value.clone(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let average = match document.select(&AVERAGE).next().map(element_text) {
        Some(raw) if !raw.is_empty() => {
            Some(parse_decimal(&raw).ok_or(ParseError::invalid(WHAT, "average", raw))?)
        }
        _ => None,
    };

    Ok(Subject {
        name,
        marks,
        average,
    })
}

/// Parses a finished class journal (totals) report.
///
/// Rows are `subject | marks | average | total`; marks are whitespace separated.
///
/// # Errors
///
/// Returns [`ParseError`] when the table is absent or a row is malformed.
pub fn parse_journal_report(html: &str) -> Result<Journal, ParseError> {
    const WHAT: &str = "journal report";
    let document = Html::parse_document(html);
    let table = document
        .select(&PRINT_TABLE)
        .next()
        .ok_or(ParseError::missing(WHAT, "table.table-print"))?;

    let rows = data_rows(table)
        .map(|cells| {
            let [subject, marks, average, total] = cells.as_slice() else {
                return Err(ParseError::invalid(WHAT, "row", cells.join(" | ")));
            };
            let average = if average.is_empty() {
                None
            } else {
                Some(parse_decimal(average).ok_or(ParseError::invalid(WHAT, "average", average.clone()))?)
            };
            Ok(JournalRow {
                subject: subject.clone(),
                marks: marks.split_whitespace().map(str::to_string).collect(),
                average,
                total: Some(total.clone()).filter(|t| !t.is_empty()),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Journal { rows })
}

/// Yields trimmed cell texts of every row that has `td` cells.
fn data_rows(table: ElementRef<'_>) -> impl Iterator<Item = Vec<String>> + '_ {
    table
        .select(&ROW)
        .map(|row| row.select(&CELL).map(element_text).collect::<Vec<_>>())
        .filter(|cells| !cells.is_empty())
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_print_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%d.%m.%Y").ok()
}

fn parse_decimal(raw: &str) -> Option<f64> {
    raw.trim().replace(',', ".").parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user_info_reads_inputs() {
        let html = r#"<form>
            <input name="LastName" value="Petrov">
            <input name="FirstName" value="Ivan">
            <input name="MiddleName" value="">
            <input name="UserName" value="ipetrov">
            <input name="BirthDate" value="12.03.2010">
            <input name="EMail" value="ivan@example.org">
        </form>"#;
        let info = parse_user_info(html).unwrap();
        assert_eq!(info.last_name, "Petrov");
        assert_eq!(info.middle_name, None);
        assert_eq!(info.login.as_deref(), Some("ipetrov"));
        assert_eq!(info.birth_date, NaiveDate::from_ymd_opt(2010, 3, 12));
        assert_eq!(info.mobile_phone, None);
    }

    #[test]
    fn test_parse_user_info_missing_name_fails() {
        let err = parse_user_info(r#"<input name="FirstName" value="Ivan">"#).unwrap_err();
        assert_eq!(err, ParseError::missing("user info", "LastName"));
    }

    #[test]
    fn test_parse_birthdays_skips_header_row() {
        let html = r#"<table class="table-print">
            <tr><th>Name</th><th>Role</th><th>Date</th></tr>
            <tr><td>Ivan Petrov</td><td>Student</td><td>12.03.2010</td></tr>
            <tr><td> Anna  Petrova </td><td>Parent</td><td>01.03.1985</td></tr>
        </table>"#;
        let birthdays = parse_birthdays(html).unwrap();
        assert_eq!(birthdays.len(), 2);
        assert_eq!(birthdays[1].name, "Anna Petrova");
        assert_eq!(birthdays[1].date, NaiveDate::from_ymd_opt(1985, 3, 1).unwrap());
    }

    #[test]
    fn test_parse_birthdays_without_table_fails() {
        assert!(matches!(
            parse_birthdays("<p>nothing</p>"),
            Err(ParseError::MissingField { .. })
        ));
    }

    #[test]
    fn test_parse_subject_report() {
        let html = r#"<h2 class="subject-name">Algebra</h2>
            <table class="table-print">
              <tr><th>Date</th><th>Kind</th><th>Mark</th></tr>
              <tr><td>05.09.2023</td><td>Homework</td><td>5</td></tr>
              <tr><td>12.09.2023</td><td>Test</td><td>4</td></tr>
            </table>
            <span class="average">4,50</span>"#;
        let subject = parse_subject_report(html).unwrap();
        assert_eq!(subject.name, "Algebra");
        assert_eq!(subject.marks.len(), 2);
        assert_eq!(subject.marks[1].kind, "Test");
        assert_eq!(subject.average, Some(4.5));
    }

    #[test]
    fn test_parse_subject_report_bad_row_fails() {
        let html = r#"<h2 class="subject-name">Algebra</h2>
            <table class="table-print"><tr><td>05.09.2023</td><td>5</td></tr></table>"#;
        assert!(matches!(
            parse_subject_report(html),
            Err(ParseError::InvalidValue { field: "row", .. })
        ));
    }

    #[test]
    fn test_parse_journal_report() {
        let html = r#"<table class="table-print">
            <tr><th>Subject</th><th>Marks</th><th>Average</th><th>Total</th></tr>
            <tr><td>Algebra</td><td>5 4 5</td><td>4,67</td><td>5</td></tr>
            <tr><td>History</td><td></td><td></td><td></td></tr>
        </table>"#;
        let journal = parse_journal_report(html).unwrap();
        assert_eq!(journal.rows.len(), 2);
        assert_eq!(journal.rows[0].marks, vec!["5", "4", "5"]);
        assert_eq!(journal.rows[0].average, Some(4.67));
        assert_eq!(journal.rows[1].average, None);
        assert_eq!(journal.rows[1].total, None);
    }
}
