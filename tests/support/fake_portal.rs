//! Scripted in-process [`Transport`] for timing-sensitive client tests.
//!
//! Routes are keyed by method and path; each route answers with a fixed
//! script of responses (the last one repeats) after an optional delay, so
//! tests can run under paused tokio time.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use netschool_core::transport::Body;
use netschool_core::{Credentials, FetchError, NetSchool, Request, Response, Transport};
use netschool_core::{ClientOptions, PollPolicy};

use super::fixtures::{FILTERS, SEED, SESSION_LIFETIME_MS, SETTINGS, TOKEN, login_ok};

pub const HOST: &str = "https://sgo.example.org";

/// One request as the portal saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: &'static str,
    pub path: String,
    pub query: Option<String>,
    pub body: Option<String>,
    pub headers: Vec<(String, String)>,
}

impl Recorded {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
struct Reply {
    status: u16,
    body: String,
    headers: Vec<(String, String)>,
}

#[derive(Debug)]
struct Route {
    replies: Vec<Reply>,
    served: usize,
    delay: Duration,
}

#[derive(Debug, Default)]
pub struct FakePortal {
    routes: Mutex<HashMap<(&'static str, String), Route>>,
    log: Mutex<Vec<Recorded>>,
}

impl FakePortal {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Portal with the whole login sequence mounted.
    #[must_use]
    pub fn with_login() -> Arc<Self> {
        let portal = Self::new();
        portal.mount_login(Duration::ZERO);
        portal
    }

    pub fn mount_login(&self, delay: Duration) {
        self.respond("GET", "/", 200, "<html></html>");
        self.script_with(
            "POST",
            "/webapi/auth/getdata",
            delay,
            vec![(200, SEED.to_string(), vec![("Set-Cookie", "ESRNSec=abc; path=/; HttpOnly")])],
        );
        self.respond("POST", "/webapi/login", 200, &login_ok(TOKEN, SESSION_LIFETIME_MS));
        self.respond("POST", "/asp/MySettings/MySettings.asp", 200, SETTINGS);
        self.respond("GET", "/webapi/reports/studentgrades/initfilters", 200, FILTERS);
    }

    pub fn respond(&self, method: &'static str, path: &str, status: u16, body: &str) {
        self.script(method, path, Duration::ZERO, &[(status, body)]);
    }

    pub fn respond_after(&self, method: &'static str, path: &str, delay: Duration, status: u16, body: &str) {
        self.script(method, path, delay, &[(status, body)]);
    }

    pub fn script(&self, method: &'static str, path: &str, delay: Duration, replies: &[(u16, &str)]) {
        let replies = replies
            .iter()
            .map(|(status, body)| (*status, (*body).to_string(), Vec::new()))
            .collect();
        self.script_with(method, path, delay, replies);
    }

    fn script_with(
        &self,
        method: &'static str,
        path: &str,
        delay: Duration,
        replies: Vec<(u16, String, Vec<(&str, &str)>)>,
    ) {
        let replies = replies
            .into_iter()
            .map(|(status, body, headers)| Reply {
                status,
                body,
                headers: headers
                    .into_iter()
                    .map(|(n, v)| (n.to_string(), v.to_string()))
                    .collect(),
            })
            .collect();
        self.routes.lock().unwrap().insert(
            (method, path.to_string()),
            Route {
                replies,
                served: 0,
                delay,
            },
        );
    }

    #[must_use]
    pub fn requests(&self) -> Vec<Recorded> {
        self.log.lock().unwrap().clone()
    }

    #[must_use]
    pub fn requests_to(&self, path: &str) -> Vec<Recorded> {
        self.requests().into_iter().filter(|r| r.path == path).collect()
    }

    #[must_use]
    pub fn count(&self, path: &str) -> usize {
        self.requests_to(path).len()
    }
}

#[async_trait]
impl Transport for FakePortal {
    async fn perform(&self, request: Request) -> Result<Response, FetchError> {
        let method = request.method.as_str();
        let path = request.url.path().to_string();
        self.log.lock().unwrap().push(Recorded {
            method,
            path: path.clone(),
            query: request.url.query().map(str::to_string),
            body: request.body.as_ref().map(|body| match body {
                Body::Form(encoded) => encoded.clone(),
                Body::Json(value) => value.to_string(),
            }),
            headers: request.headers.clone(),
        });

        let key = (method, path.clone());
        let (reply, delay) = {
            let mut routes = self.routes.lock().unwrap();
            let Some(route) = routes.get_mut(&key) else {
                return Err(FetchError::status(method, request.url.as_str(), 404, "no route"));
            };
            let index = route.served.min(route.replies.len() - 1);
            route.served += 1;
            (route.replies[index].clone(), route.delay)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if !(200..300).contains(&reply.status) {
            return Err(FetchError::status(method, request.url.as_str(), reply.status, &reply.body));
        }
        Ok(Response {
            status: reply.status,
            url: request.url,
            headers: reply.headers,
            body: reply.body.into_bytes(),
        })
    }
}

#[must_use]
pub fn credentials() -> Credentials {
    Credentials::new("ivan", "secret", "cid=2&sid=1&pid=-1&cn=1&sft=2&scid=23")
}

/// Client over `portal` with a short poll budget.
#[must_use]
pub fn client(portal: &Arc<FakePortal>) -> NetSchool {
    let poll = PollPolicy::new(
        Duration::from_millis(500),
        1.5,
        Duration::from_secs(2),
        Duration::from_secs(10),
    );
    NetSchool::with_transport(
        HOST,
        credentials(),
        Arc::clone(portal) as Arc<dyn Transport>,
        ClientOptions::default().with_poll(poll),
    )
}
