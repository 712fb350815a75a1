#![allow(clippy::unwrap_used)]
// Integration tests for `NotifyClient` transports using wiremock.

use serde_json::json;
use wiremock::matchers::{basic_auth, body_json, body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use meshwatch_api::{Endpoint, Error, Message, MessageKind, NotifyClient};

fn message() -> Message {
    Message::new(
        MessageKind::Success,
        "Device online",
        "laptop is now online",
    )
}

#[tokio::test]
async fn test_json_webhook_posts_payload() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/hooks/mesh"))
        .and(body_json(json!({
            "title": "Device online",
            "body": "laptop is now online",
            "type": "success"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let endpoint = Endpoint::parse(&format!("json://{}/hooks/mesh", server.address())).unwrap();
    let client = NotifyClient::with_client(reqwest::Client::new());

    client.send(&endpoint, &message()).await.unwrap();
}

#[tokio::test]
async fn test_plain_http_endpoint_uses_basic_auth() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/notify"))
        .and(basic_auth("ops", "s3cret"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let addr = server.address();
    let endpoint = Endpoint::parse(&format!("http://ops:s3cret@{addr}/notify")).unwrap();
    let client = NotifyClient::with_client(reqwest::Client::new());

    client.send(&endpoint, &message()).await.unwrap();
}

#[tokio::test]
async fn test_ntfy_posts_body_with_title_header() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/mesh-alerts"))
        .and(header("title", "Device online"))
        .and(body_string("laptop is now online"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let endpoint = Endpoint::parse(&format!("ntfy://{}/mesh-alerts", server.address())).unwrap();
    let client = NotifyClient::with_client(reqwest::Client::new());

    client.send(&endpoint, &message()).await.unwrap();
}

#[tokio::test]
async fn test_rejected_delivery_is_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("try later"))
        .mount(&server)
        .await;

    let endpoint = Endpoint::parse(&format!("json://{}/hook", server.address())).unwrap();
    let client = NotifyClient::with_client(reqwest::Client::new());

    let err = client.send(&endpoint, &message()).await.unwrap_err();
    match err {
        Error::Delivery {
            status,
            ref message,
            ref endpoint,
        } => {
            assert_eq!(status, 503);
            assert_eq!(message, "try later");
            assert!(endpoint.starts_with("json://"));
        }
        other => panic!("expected Delivery error, got: {other:?}"),
    }
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_log_endpoint_never_touches_network() {
    let endpoint = Endpoint::parse("log://").unwrap();
    let client = NotifyClient::with_client(reqwest::Client::new());
    client.send(&endpoint, &message()).await.unwrap();
}

#[tokio::test]
async fn test_connect_failure_hides_target_path_and_query() {
    let endpoint =
        Endpoint::parse("json://127.0.0.1:9/services/T000/SECRETTOKEN?key=hunter2").unwrap();
    let client = NotifyClient::with_client(reqwest::Client::new());

    let err = client.send(&endpoint, &message()).await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)), "got: {err:?}");
    for rendered in [err.to_string(), format!("{err:?}")] {
        assert!(!rendered.contains("SECRETTOKEN"), "{rendered}");
        assert!(!rendered.contains("key="), "{rendered}");
        assert!(!rendered.contains("hunter2"), "{rendered}");
    }
}
