use mockito::{Matcher, Server};
use reqwest::StatusCode;
use rstest::rstest;
use secrecy::SecretString;
use tokio::io::AsyncReadExt;

use super::*;

async fn read_body(envelope: StreamEnvelope) -> String {
    let mut body = envelope.body;
    let mut text = String::new();
    body.read_to_string(&mut text).await.unwrap();
    text
}

#[rstest]
#[case("http://daemon:22318/", "http://daemon:22318")]
#[case("https://daemon", "https://daemon")]
#[case("tcp://10.0.0.1:22318", "http://10.0.0.1:22318")]
#[case("127.0.0.1:22318", "http://127.0.0.1:22318")]
fn normalizes_host(#[case] host: &str, #[case] expected: &str) {
    assert_eq!(normalize_host(host).unwrap(), expected);
}

#[rstest]
#[case("unix:///var/run/hyper.sock")]
#[case("  ")]
fn rejects_unusable_host(#[case] host: &str) {
    assert!(matches!(normalize_host(host), Err(SessionError::Config(_))));
}

#[tokio::test]
async fn pull_sends_registry_auth() {
    let mut server = Server::new_async().await;
    let auth = AuthConfig::with_password(
        "alice",
        SecretString::new("pw".to_string()),
        "https://index.docker.io/v1/",
    );
    let mock = server
        .mock("POST", "/image/create")
        .match_query(Matcher::UrlEncoded("imageName".into(), "busybox".into()))
        .match_header(REGISTRY_AUTH_HEADER, auth.encode_header().unwrap().as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"status":"Pulling busybox"}"#)
        .create_async()
        .await;

    let client = DaemonClient::new(&server.url(), None).unwrap();
    let envelope = client.pull_image("busybox", &auth).await.unwrap();

    assert_eq!(envelope.status, StatusCode::OK);
    assert_eq!(envelope.content_type, "application/json");
    assert_eq!(read_body(envelope).await, r#"{"status":"Pulling busybox"}"#);
    mock.assert_async().await;
}

#[tokio::test]
async fn unauthorized_push_is_status_error() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/image/push")
        .match_query(Matcher::UrlEncoded("remote".into(), "me/app".into()))
        .with_status(401)
        .with_body("authentication required\n")
        .create_async()
        .await;

    let client = DaemonClient::new(&server.url(), None).unwrap();
    let err = client
        .push_image("me/app", &AuthConfig::anonymous("docker.io"))
        .await
        .unwrap_err();

    assert!(err.is_unauthorized());
    assert!(matches!(
        err,
        SessionError::Status { ref message, .. } if message == "authentication required"
    ));
    mock.assert_async().await;
}

#[tokio::test]
async fn logs_pass_options_as_query() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/container/logs")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("container".into(), "pod-1".into()),
            Matcher::UrlEncoded("follow".into(), "true".into()),
            Matcher::UrlEncoded("stdout".into(), "true".into()),
            Matcher::UrlEncoded("stderr".into(), "false".into()),
            Matcher::UrlEncoded("timestamps".into(), "false".into()),
            Matcher::UrlEncoded("tail".into(), "10".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/vnd.docker.raw-stream")
        .with_body("hello\n")
        .create_async()
        .await;

    let client = DaemonClient::new(&server.url(), None).unwrap();
    let options = LogsOptions {
        follow: true,
        stderr: false,
        tail: "10".to_string(),
        ..LogsOptions::default()
    };
    let envelope = client.container_logs("pod-1", &options).await.unwrap();

    assert_eq!(read_body(envelope).await, "hello\n");
    mock.assert_async().await;
}

#[tokio::test]
async fn resize_targets_session() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/tty/resize")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("id".into(), "pod-1".into()),
            Matcher::UrlEncoded("tag".into(), "abcd1234".into()),
            Matcher::UrlEncoded("h".into(), "40".into()),
            Matcher::UrlEncoded("w".into(), "120".into()),
        ]))
        .with_status(200)
        .create_async()
        .await;

    let client = DaemonClient::new(&server.url(), None).unwrap();
    client.resize("pod-1", "abcd1234", 40, 120).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn failed_resize_maps_to_resize_error() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/tty/resize")
        .match_query(Matcher::Any)
        .with_status(500)
        .with_body("no such exec")
        .create_async()
        .await;

    let client = DaemonClient::new(&server.url(), None).unwrap();
    let err = client.resize("pod-1", "gone", 24, 80).await.unwrap_err();
    assert!(matches!(err, SessionError::Resize(ref msg) if msg.contains("no such exec")));
}
