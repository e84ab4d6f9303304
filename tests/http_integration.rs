//! End-to-end client tests over the real HTTP transport against wiremock.

use netschool_core::{Credentials, NetSchool};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod support;
use support::fixtures::{ANNOUNCEMENTS, DIARY, FILTERS, SEED, SETTINGS, TOKEN, date, login_ok};
use support::socket_guard::{socket_skip_return, start_mock_server_or_skip};

macro_rules! require_mock_server {
    () => {{
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return socket_skip_return();
        };
        mock_server
    }};
}

async fn mount_portal(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/webapi/auth/getdata"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Set-Cookie", "ESRNSec=abc; path=/; HttpOnly")
                .set_body_string(SEED),
        )
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/webapi/login"))
        .and(header("Cookie", "ESRNSec=abc"))
        .and(header("Content-Type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("UN=ivan"))
        .and(body_string_contains("lt=LT-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(login_ok(TOKEN, 2_400_000)))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/asp/MySettings/MySettings.asp"))
        .and(body_string_contains("at=TOKEN-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SETTINGS))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/webapi/reports/studentgrades/initfilters"))
        .and(header("at", TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_string(FILTERS))
        .mount(server)
        .await;
}

fn client_for(server: &MockServer) -> NetSchool {
    let credentials = Credentials::new("ivan", "secret", "cid=2&sid=1&pid=-1&cn=1&sft=2&scid=23");
    NetSchool::new(&server.uri(), credentials).unwrap()
}

#[tokio::test]
async fn test_login_over_http_keeps_cookie_and_token() {
    let server = require_mock_server!();
    mount_portal(&server).await;
    Mock::given(method("GET"))
        .and(path("/webapi/announcements"))
        .and(query_param("take", "-1"))
        .and(header("at", TOKEN))
        .and(header("Cookie", "ESRNSec=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ANNOUNCEMENTS))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let announcements = client.announcements().await.unwrap();

    assert_eq!(announcements.len(), 1);
    assert_eq!(announcements[0].name, "Holiday");
    assert!(!client.is_secure());
    assert_eq!(client.subjects().len(), 2);
}

#[tokio::test]
async fn test_diary_over_http_sends_week_query() {
    let server = require_mock_server!();
    mount_portal(&server).await;
    Mock::given(method("GET"))
        .and(path("/webapi/student/diary"))
        .and(query_param("studentId", "7"))
        .and(query_param("weekStart", "2023-09-04"))
        .and(query_param("weekEnd", "2023-09-10"))
        .and(query_param("withLaAssigns", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_string(DIARY))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let diary = client.diary(date(2023, 9, 4), date(2023, 9, 10)).await.unwrap();

    assert_eq!(diary.week_start, date(2023, 9, 4));
}

#[tokio::test]
async fn test_http_status_error_surfaces_code() {
    let server = require_mock_server!();
    mount_portal(&server).await;
    Mock::given(method("GET"))
        .and(path("/webapi/grade/assignment/types"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.assignment_types().await.unwrap_err();

    assert_eq!(err.status_code(), Some(503));
    assert!(err.to_string().contains("503"));
}

#[tokio::test]
async fn test_photo_over_http_returns_bytes() {
    let server = require_mock_server!();
    mount_portal(&server).await;
    Mock::given(method("GET"))
        .and(path("/webapi/users/photo"))
        .and(query_param("AT", TOKEN))
        .and(query_param("VER", "1700"))
        .and(query_param("userId", "7"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x89, b'P', b'N', b'G']))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let photo = client.user_photo().await.unwrap();

    assert_eq!(photo, [0x89, b'P', b'N', b'G']);
}
