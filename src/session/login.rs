//! Pure pieces of the login sequence: password digest, form body, identity extraction.

use md5::{Digest, Md5};

use super::error::BootstrapError;
use super::state::AccountIdentity;
use crate::constants::LOGIN_TYPE;
use crate::parser::{FilterCatalog, FilterSource, LoginData, SubjectEntry};
use crate::transport::encode_form;
use crate::validation::StudyYear;

/// Filter id carrying the student (user) id.
pub const FILTER_STUDENT: &str = "SID";
/// Filter id carrying the class id.
pub const FILTER_CLASS: &str = "PCLID";
/// Filter id carrying the subject catalog.
pub const FILTER_SUBJECT: &str = "SGID";
/// Filter id carrying the report period.
pub const FILTER_PERIOD: &str = "period";

/// Two-stage password digest sent with the login form.
#[derive(Clone, PartialEq, Eq)]
pub struct LoginDigest {
    /// `md5(salt + md5(password))`, lowercase hex.
    pub pw2: String,
    /// `pw2` truncated to the password's character count.
    pub pw: String,
}

impl std::fmt::Debug for LoginDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginDigest").finish_non_exhaustive()
    }
}

fn md5_hex(input: &[u8]) -> String {
    format!("{:x}", Md5::digest(input))
}

/// Computes the login digest for `password` with the server `salt`.
///
/// The truncated form is capped at the 32 hex characters of the digest.
#[must_use]
pub fn password_digest(salt: &str, password: &str) -> LoginDigest {
    let inner = md5_hex(password.as_bytes());
    let pw2 = md5_hex(format!("{salt}{inner}").as_bytes());
    let pw = pw2.chars().take(password.chars().count()).collect();
    LoginDigest { pw2, pw }
}

/// Builds the urlencoded login form body.
///
/// The secondary payload is inserted verbatim after the login type marker.
#[must_use]
pub fn login_form(seed: &LoginData, login: &str, digest: &LoginDigest, secondary: &str) -> String {
    let mut parts = vec![format!("LoginType={LOGIN_TYPE}")];
    let secondary = secondary.trim_matches('&');
    if !secondary.is_empty() {
        parts.push(secondary.to_string());
    }
    parts.push(encode_form(&[
        ("UN", login),
        ("PW", digest.pw.as_str()),
        ("lt", seed.lt.as_str()),
        ("pw2", digest.pw2.as_str()),
        ("ver", seed.ver.as_str()),
    ]));
    parts.join("&")
}

/// Derives the account identity from a report's default filter catalog.
///
/// # Errors
///
/// Returns [`BootstrapError::MissingFilterSource`] when `SID`, `PCLID`, `SGID`
/// or `period` is absent, and [`BootstrapError::InvalidFilterSource`] when one
/// has no usable value.
pub fn identity_from_catalog(catalog: &FilterCatalog) -> Result<AccountIdentity, BootstrapError> {
    let source = |filter_id: &'static str| {
        catalog
            .source(filter_id)
            .ok_or(BootstrapError::MissingFilterSource { filter_id })
    };

    let user_id = selected_id(source(FILTER_STUDENT)?, FILTER_STUDENT)?;
    let class_id = selected_id(source(FILTER_CLASS)?, FILTER_CLASS)?;

    let subjects = source(FILTER_SUBJECT)?
        .items
        .iter()
        .map(|item| {
            let id = item.value.parse().map_err(|_| {
                BootstrapError::invalid_source(FILTER_SUBJECT, format!("non-numeric id {:?}", item.value))
            })?;
            Ok(SubjectEntry {
                id,
                name: item.title.clone(),
            })
        })
        .collect::<Result<Vec<_>, BootstrapError>>()?;

    let range = source(FILTER_PERIOD)?
        .range
        .ok_or_else(|| BootstrapError::invalid_source(FILTER_PERIOD, "no date range"))?;
    if range.end < range.start {
        return Err(BootstrapError::invalid_source(
            FILTER_PERIOD,
            format!("range ends before it starts ({}..{})", range.start, range.end),
        ));
    }

    Ok(AccountIdentity {
        user_id,
        class_id,
        subjects,
        study_year: StudyYear::new(range.start, range.end),
    })
}

/// Default value of a source, falling back to its first item.
fn selected_id(source: &FilterSource, filter_id: &'static str) -> Result<i64, BootstrapError> {
    let raw = source
        .default_value
        .as_deref()
        .or_else(|| source.items.first().map(|item| item.value.as_str()))
        .ok_or_else(|| BootstrapError::invalid_source(filter_id, "no default value or items"))?;
    raw.parse()
        .map_err(|_| BootstrapError::invalid_source(filter_id, format!("non-numeric id {raw:?}")))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::parser::parse_filter_catalog;

    #[test]
    fn test_password_digest_is_deterministic() {
        let first = password_digest("salt123", "secret");
        let second = password_digest("salt123", "secret");
        assert_eq!(first, second);
        assert_eq!(first.pw2.len(), 32);
        assert!(first.pw2.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_password_digest_known_vector() {
        // md5("") = d41d8cd98f00b204e9800998ecf8427e
        let digest = password_digest("", "");
        assert_eq!(digest.pw2, md5_hex(b"d41d8cd98f00b204e9800998ecf8427e"));
        assert_eq!(digest.pw, "");
    }

    #[test]
    fn test_truncated_digest_matches_password_char_count() {
        for password in ["a", "secret", "пароль12", "x".repeat(20).as_str()] {
            let digest = password_digest("s", password);
            assert_eq!(digest.pw.chars().count(), password.chars().count());
            assert!(digest.pw2.starts_with(&digest.pw));
        }
    }

    #[test]
    fn test_salt_changes_digest() {
        assert_ne!(password_digest("a", "secret").pw2, password_digest("b", "secret").pw2);
    }

    #[test]
    fn test_login_form_carries_all_fields() {
        let seed = LoginData {
            lt: "111".to_string(),
            ver: "222".to_string(),
            salt: "333".to_string(),
        };
        let digest = password_digest(&seed.salt, "secret");
        let body = login_form(&seed, "ivan petrov", &digest, "&cid=2&sid=1&scid=23&");
        assert!(body.starts_with("LoginType=1&cid=2&sid=1&scid=23&UN=ivan%20petrov&PW="));
        assert!(body.contains(&format!("&pw2={}", digest.pw2)));
        assert!(body.contains(&format!("&PW={}&", digest.pw)));
        assert!(body.contains("&lt=111&"));
        assert!(body.ends_with("&ver=222"));
    }

    #[test]
    fn test_identity_from_catalog() {
        let catalog = parse_filter_catalog(
            r#"{"filterSources": [
                {"filterId": "SID", "items": [{"value": "7", "title": "Ivan"}], "defaultValue": "7"},
                {"filterId": "PCLID", "items": [{"value": "10", "title": "7A"}]},
                {"filterId": "SGID", "items": [{"value": "1", "title": "Algebra"}, {"value": "2", "title": "History"}]},
                {"filterId": "period", "range": {"start": "2023-09-01T00:00:00", "end": "2024-05-25T00:00:00"}}
            ]}"#,
        )
        .unwrap();
        let identity = identity_from_catalog(&catalog).unwrap();
        assert_eq!(identity.user_id, 7);
        assert_eq!(identity.class_id, 10);
        assert_eq!(identity.subjects[1].name, "History");
        assert_eq!(identity.study_year.start, NaiveDate::from_ymd_opt(2023, 9, 1).unwrap());
    }

    #[test]
    fn test_identity_from_catalog_missing_class_source() {
        let catalog = parse_filter_catalog(
            r#"{"filterSources": [
                {"filterId": "SID", "defaultValue": "7"},
                {"filterId": "SGID", "items": []},
                {"filterId": "period", "range": {"start": "2023-09-01", "end": "2024-05-25"}}
            ]}"#,
        )
        .unwrap();
        assert!(matches!(
            identity_from_catalog(&catalog),
            Err(BootstrapError::MissingFilterSource { filter_id: "PCLID" })
        ));
    }

    #[test]
    fn test_identity_from_catalog_period_without_range() {
        let catalog = parse_filter_catalog(
            r#"{"filterSources": [
                {"filterId": "SID", "defaultValue": "7"},
                {"filterId": "PCLID", "defaultValue": "10"},
                {"filterId": "SGID", "items": []},
                {"filterId": "period"}
            ]}"#,
        )
        .unwrap();
        assert!(matches!(
            identity_from_catalog(&catalog),
            Err(BootstrapError::InvalidFilterSource { filter_id: "period", .. })
        ));
    }
}
