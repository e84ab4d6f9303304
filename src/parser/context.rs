//! Parser for the account context embedded in the settings page.
//!
//! The page carries refreshed `at`/`ver` hidden inputs and a script block of the
//! form `appContext = { key: 'value', ... }`.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use super::ParseError;
use super::records::AppContext;

const WHAT: &str = "account context";

#[allow(clippy::expect_used)]
static CONTEXT_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)appContext\s*=\s*\{(.*?)\}").expect("context block regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static CONTEXT_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\w+)\s*:\s*(?:'([^']*)'|"([^"]*)"|(-?\d+))"#)
        .expect("context entry regex is valid")
});

#[allow(clippy::expect_used)]
static HIDDEN_INPUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<input[^>]*\bname\s*=\s*["'](at|ver)["'][^>]*\bvalue\s*=\s*["']([^"']*)["']"#)
        .expect("hidden input regex is valid")
});

/// Parses the account context of the settings page.
///
/// # Errors
///
/// Returns [`ParseError::MissingField`] when the page has no `appContext`
/// block, and [`ParseError::InvalidValue`] for non-numeric ids or an
/// unreadable time-zone offset.
pub fn parse_app_context(html: &str) -> Result<AppContext, ParseError> {
    let block = CONTEXT_BLOCK
        .captures(html)
        .and_then(|caps| caps.get(1))
        .ok_or(ParseError::missing(WHAT, "appContext"))?
        .as_str();

    let entries: HashMap<&str, &str> = CONTEXT_ENTRY
        .captures_iter(block)
        .filter_map(|caps| {
            let key = caps.get(1)?.as_str();
            let value = caps.get(2).or(caps.get(3)).or(caps.get(4))?.as_str();
            Some((key, value))
        })
        .collect();

    let mut hidden: HashMap<&str, &str> = HashMap::new();
    for caps in HIDDEN_INPUT.captures_iter(html) {
        if let (Some(name), Some(value)) = (caps.get(1), caps.get(2)) {
            hidden.entry(name.as_str()).or_insert(value.as_str());
        }
    }

    let text = |key: &str| -> Option<String> {
        entries
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    Ok(AppContext {
        at: hidden.get("at").filter(|v| !v.is_empty()).map(|v| (*v).to_string()),
        ver: hidden.get("ver").filter(|v| !v.is_empty()).map(|v| (*v).to_string()),
        year_id: parse_id(&entries, "yearId")?,
        school_id: parse_id(&entries, "schoolId")?,
        current_year: text("currentYear"),
        school_name: text("schoolName"),
        date_format: text("dateFormat"),
        time_format: text("timeFormat"),
        server_time_zone: match text("serverTimeZone") {
            Some(raw) => Some(
                parse_offset_minutes(&raw)
                    .ok_or(ParseError::invalid(WHAT, "serverTimeZone", raw))?,
            ),
            None => None,
        },
    })
}

fn parse_id(entries: &HashMap<&str, &str>, field: &'static str) -> Result<Option<i64>, ParseError> {
    match entries.get(field).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ParseError::invalid(WHAT, field, raw)),
        None => Ok(None),
    }
}

/// Accepts minutes (`180`, `-300`) or `±HH:MM`.
fn parse_offset_minutes(raw: &str) -> Option<i32> {
    if let Ok(minutes) = raw.parse::<i32>() {
        return Some(minutes);
    }
    let (sign, rest) = match raw.as_bytes().first()? {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => (1, raw),
    };
    let (hours, minutes) = rest.split_once(':')?;
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if minutes >= 60 {
        return None;
    }
    Some(sign * (hours * 60 + minutes))
}
