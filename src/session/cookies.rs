//! Session cookie jar fed from `Set-Cookie` response headers.
//!
//! The portal identifies the session by a handful of cookies set during the
//! login sequence. The jar keeps them by name in first-seen order and renders
//! them into a single `Cookie` request header.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

#[allow(clippy::expect_used)]
static EXPIRES_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)expires=(?:[A-Za-z]{3},)?[^;,]*;?").expect("expires regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static NAME_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^=;\s]*)=([^;]*)").expect("name=value regex is valid")
});

/// Name/value cookie store in insertion order.
///
/// Values are sensitive and are redacted from `Debug` output.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    entries: Vec<(String, String)>,
}

impl CookieJar {
    /// Creates an empty jar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorbs `Set-Cookie` header values.
    ///
    /// `expires=...` attributes are stripped first (an RFC 1123 date carries a
    /// comma after the weekday), then each value is split on `,` into candidate cookies. Candidates with
    /// an empty name or value are ignored; existing names are overwritten in place.
    pub fn absorb<'a>(&mut self, set_cookie_values: impl IntoIterator<Item = &'a str>) {
        for header in set_cookie_values {
            let stripped = EXPIRES_ATTRIBUTE.replace_all(header, "");
            for candidate in stripped.split(',') {
                let Some(caps) = NAME_VALUE.captures(candidate.trim_start()) else {
                    continue;
                };
                let (Some(name), Some(value)) = (caps.get(1), caps.get(2)) else {
                    continue;
                };
                let (name, value) = (name.as_str(), value.as_str().trim());
                if name.is_empty() || value.is_empty() {
                    continue;
                }
                trace!(name, "cookie stored");
                self.insert(name, value);
            }
        }
    }

    fn insert(&mut self, name: &str, value: &str) {
        match self.entries.iter_mut().find(|(existing, _)| existing == name) {
            Some((_, stored)) => value.clone_into(stored),
            None => self.entries.push((name.to_string(), value.to_string())),
        }
    }

    /// Renders the `Cookie` request header, or `None` when nothing is stored.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        let rendered = self
            .entries
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        if rendered.is_empty() { None } else { Some(rendered) }
    }

    /// Returns the stored value for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.as_str())
    }

    /// Number of stored cookies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no cookie is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for CookieJar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(name, _)| (name, "[REDACTED]")))
            .finish()
    }
}
