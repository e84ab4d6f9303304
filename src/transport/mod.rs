//! One-shot HTTP exchanges with the portal.
//!
//! The client never talks to reqwest directly: every request goes through the
//! [`Transport`] trait so the session layer can absorb cookies from every
//! response and tests can script exchanges without a socket.
//!
//! # Example
//!
//! ```no_run
//! use netschool_core::transport::{HttpTransport, Request, Transport};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = HttpTransport::new()?;
//! let url = url::Url::parse("https://sgo.example.org/")?;
//! let response = transport.perform(Request::get(url)).await?;
//! println!("landed on {}", response.url);
//! # Ok(())
//! # }
//! ```

mod error;
mod http;

pub use error::FetchError;
pub use http::HttpTransport;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use url::Url;

/// HTTP methods the portal API needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
}

impl Method {
    /// Returns the method token.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// Request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// `application/x-www-form-urlencoded` body, already encoded.
    Form(String),
    /// JSON body.
    Json(serde_json::Value),
}

/// A single request to perform.
#[derive(Debug, Clone)]
pub struct Request {
    /// Request method.
    pub method: Method,
    /// Absolute request URL.
    pub url: Url,
    /// Extra headers, in order.
    pub headers: Vec<(String, String)>,
    /// Optional body.
    pub body: Option<Body>,
}

impl Request {
    /// Creates a `GET` request.
    #[must_use]
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::Get,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    /// Creates a `POST` request without a body.
    #[must_use]
    pub fn post(url: Url) -> Self {
        Self {
            method: Method::Post,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    /// Adds a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets a urlencoded form body from key/value pairs.
    #[must_use]
    pub fn form<K, V>(mut self, pairs: &[(K, V)]) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.body = Some(Body::Form(encode_form(pairs)));
        self
    }

    /// Sets a pre-encoded form body.
    #[must_use]
    pub fn raw_form(mut self, encoded: String) -> Self {
        self.body = Some(Body::Form(encoded));
        self
    }

    /// Sets a JSON body.
    #[must_use]
    pub fn json(mut self, value: serde_json::Value) -> Self {
        self.body = Some(Body::Json(value));
        self
    }

    /// Returns the first value of a header, matched case-insensitively.
    #[must_use]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// A successful (2xx) response.
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// Final URL after redirects.
    pub url: Url,
    /// Response headers; repeated headers appear once per value.
    pub headers: Vec<(String, String)>,
    /// Raw body.
    pub body: Vec<u8>,
}

impl Response {
    /// Returns all values of a header, matched case-insensitively.
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns the body decoded as UTF-8, replacing invalid sequences.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserializes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns the serde error when the body is not the expected shape.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Performs one HTTP exchange.
///
/// Implementations must convert non-2xx statuses into [`FetchError::Status`].
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Performs the request and returns the successful response.
    async fn perform(&self, request: Request) -> Result<Response, FetchError>;
}

/// Encodes key/value pairs as an urlencoded form body.
pub(crate) fn encode_form<K, V>(pairs: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    pairs
        .iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                urlencoding::encode(key.as_ref()),
                urlencoding::encode(value.as_ref())
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_form_escapes_reserved_characters() {
        let body = encode_form(&[("UN", "ivan petrov"), ("PW", "a&b=c")]);
        assert_eq!(body, "UN=ivan%20petrov&PW=a%26b%3Dc");
    }

    #[test]
    fn test_response_header_values_case_insensitive() {
        let response = Response {
            status: 200,
            url: Url::parse("https://sgo.example.org/").unwrap(),
            headers: vec![
                ("Set-Cookie".to_string(), "a=1".to_string()),
                ("set-cookie".to_string(), "b=2".to_string()),
                ("Content-Type".to_string(), "text/html".to_string()),
            ],
            body: Vec::new(),
        };
        let values: Vec<&str> = response.header_values("SET-COOKIE").collect();
        assert_eq!(values, vec!["a=1", "b=2"]);
    }

    #[test]
    fn test_request_builder_keeps_headers_in_order() {
        let request = Request::post(Url::parse("https://sgo.example.org/x").unwrap())
            .header("at", "token")
            .header("Cookie", "a=1")
            .form(&[("ver", "42")]);
        assert_eq!(request.header_value("AT"), Some("token"));
        assert_eq!(request.headers[1].0, "Cookie");
        assert_eq!(request.body, Some(Body::Form("ver=42".to_string())));
    }
}
