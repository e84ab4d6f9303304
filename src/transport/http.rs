//! reqwest-backed [`Transport`].
//!
//! Cookies are not handled here: the session keeps its own jar and
//! renders the `Cookie` header into each request.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, ClientBuilder, Proxy};
use tracing::{debug, instrument, warn};

use super::{Body, FetchError, Method, Request, Response, Transport};
use crate::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use crate::user_agent;

/// HTTP transport over a shared reqwest client.
///
/// Create once and reuse; the underlying client keeps its connection pool.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Creates a transport with default timeouts (10s connect, 30s read).
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientInit`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a transport with explicit timeout values.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientInit`] if the HTTP client cannot be built.
    pub fn with_timeouts(connect_timeout_secs: u64, read_timeout_secs: u64) -> Result<Self, FetchError> {
        let client = build_client(connect_timeout_secs, read_timeout_secs)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(level = "debug", skip(self, request), fields(method = request.method.as_str(), url = %request.url))]
    async fn perform(&self, request: Request) -> Result<Response, FetchError> {
        let method = request.method;
        let url = request.url.to_string();

        let mut builder = match method {
            Method::Get => self.client.get(request.url),
            Method::Post => self.client.post(request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body {
            Some(Body::Form(encoded)) => builder
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(encoded),
            Some(Body::Json(value)) => builder.json(&value),
            None => builder,
        };

        let response = builder
            .send()
            .await
            .map_err(|e| FetchError::network(&url, e))?;

        let status = response.status();
        let final_url = response.url().clone();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::network(final_url.as_str(), e))?
            .to_vec();

        debug!(status = status.as_u16(), bytes = body.len(), "response received");

        if !status.is_success() {
            return Err(FetchError::status(
                method.as_str(),
                final_url.as_str(),
                status.as_u16(),
                &String::from_utf8_lossy(&body),
            ));
        }

        Ok(Response {
            status: status.as_u16(),
            url: final_url,
            headers,
            body,
        })
    }
}

enum BuildClientFailure {
    Panic,
    Build(reqwest::Error),
}

fn build_client(connect_timeout_secs: u64, read_timeout_secs: u64) -> Result<Client, FetchError> {
    match try_build_client(connect_timeout_secs, read_timeout_secs, false) {
        Ok(client) => Ok(client),
        Err(BuildClientFailure::Panic) => {
            // Some sandboxed environments panic when reading system proxy settings.
            warn!("HTTP client builder panicked loading system proxy settings; using env-proxy fallback");
            match try_build_client(connect_timeout_secs, read_timeout_secs, true) {
                Ok(client) => Ok(client),
                Err(BuildClientFailure::Panic) => Err(FetchError::ClientInit(
                    "client construction panicked while applying env-proxy fallback".to_string(),
                )),
                Err(BuildClientFailure::Build(error)) => Err(FetchError::ClientInit(error.to_string())),
            }
        }
        Err(BuildClientFailure::Build(error)) => Err(FetchError::ClientInit(error.to_string())),
    }
}

fn try_build_client(
    connect_timeout_secs: u64,
    read_timeout_secs: u64,
    disable_system_proxy_lookup: bool,
) -> Result<Client, BuildClientFailure> {
    catch_unwind(AssertUnwindSafe(move || {
        let mut builder = base_builder(connect_timeout_secs, read_timeout_secs);
        if disable_system_proxy_lookup {
            builder = apply_env_proxy_fallback(builder.no_proxy());
        }
        builder.build().map_err(BuildClientFailure::Build)
    }))
    .map_err(|_| BuildClientFailure::Panic)?
}

fn base_builder(connect_timeout_secs: u64, read_timeout_secs: u64) -> ClientBuilder {
    Client::builder()
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        .timeout(Duration::from_secs(read_timeout_secs))
        .user_agent(user_agent::default_user_agent())
        .gzip(true)
}

fn apply_env_proxy_fallback(mut builder: ClientBuilder) -> ClientBuilder {
    let https = first_env(&["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"]);
    if let Some(proxy) = https
        && let Ok(resolved) = Proxy::https(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    let http = first_env(&["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"]);
    if let Some(proxy) = http
        && let Ok(resolved) = Proxy::http(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    builder
}

fn first_env(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_transport_builds_with_defaults() {
        assert!(HttpTransport::new().is_ok());
    }

    #[test]
    fn test_http_transport_builds_with_custom_timeouts() {
        assert!(HttpTransport::with_timeouts(1, 2).is_ok());
    }
}
