//! Integration tests for the HTTP transport.
//!
//! These tests run a one-shot HTTP responder on a local socket so the real
//! `reqwest` stack is exercised without a backend.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use emailace_api::{ApiClient, Endpoint, HttpTransport, Transport, TransportError};

/// Accepts one connection, answers it with `response` and returns the raw
/// request that was received.
async fn respond_once(response: String) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}/api/v1", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        request
    });

    (base_url, handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0_u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn http_response(status_line: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    )
}

#[tokio::test]
async fn test_success_decodes_json_and_sends_headers() {
    let (base_url, server) = respond_once(http_response("200 OK", r#"{"message":"ok"}"#)).await;
    let transport = HttpTransport::with_base_url(&base_url).unwrap();

    let value = transport
        .send(&Endpoint::SendReply(3), Some(json!({"reply_content": "Hi"})))
        .await
        .unwrap();

    assert_eq!(value, json!({"message": "ok"}));
    let request = server.await.unwrap();
    assert!(request.starts_with("POST /api/v1/emails/3/send-reply HTTP/1.1"));
    assert!(
        request
            .to_ascii_lowercase()
            .contains("content-type: application/json")
    );
    assert!(request.ends_with(r#"{"reply_content":"Hi"}"#));
}

#[tokio::test]
async fn test_server_reason_phrase_is_replaced_by_canonical_one() {
    let (base_url, server) =
        respond_once(http_response("404 Nothing Here Mate", r#"{"detail":"gone"}"#)).await;
    let transport = HttpTransport::with_base_url(&base_url).unwrap();

    let err = transport
        .send(&Endpoint::EmailDetail(77), None)
        .await
        .unwrap_err();

    assert_eq!(err, TransportError::status(404));
    assert_eq!(err.to_string(), "API Error: 404 Not Found");
    server.await.unwrap();
}

#[tokio::test]
async fn test_non_success_status_is_reported_without_body() {
    let (base_url, server) = respond_once(http_response(
        "500 Internal Server Error",
        "this body is never parsed",
    ))
    .await;
    let transport = HttpTransport::with_base_url(&base_url).unwrap();

    let err = transport
        .send(&Endpoint::GenerateReply(1), None)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        TransportError::Status {
            status: 500,
            status_text: "Internal Server Error".to_string(),
        }
    );
    server.await.unwrap();
}

#[tokio::test]
async fn test_invalid_json_is_malformed() {
    let (base_url, server) = respond_once(http_response("200 OK", "<html>oops</html>")).await;
    let transport = HttpTransport::with_base_url(&base_url).unwrap();

    let err = transport.send(&Endpoint::ListEmails, None).await.unwrap_err();

    assert!(err.is_malformed_response());
    server.await.unwrap();
}

#[tokio::test]
async fn test_connection_refused_is_network_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}/api/v1", listener.local_addr().unwrap());
    drop(listener);
    let transport = HttpTransport::with_base_url(&base_url).unwrap();

    let err = transport.send(&Endpoint::Analytics, None).await.unwrap_err();

    assert!(err.is_network_failure(), "unexpected error: {err:?}");
}

#[tokio::test]
async fn test_timeout_is_network_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}/api/v1", listener.local_addr().unwrap());
    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(socket);
    });
    let transport = HttpTransport::new(&base_url, Duration::from_millis(200)).unwrap();

    let err = transport.send(&Endpoint::ListEmails, None).await.unwrap_err();

    assert!(err.is_network_failure(), "unexpected error: {err:?}");
    server.abort();
}

#[tokio::test]
async fn test_search_query_is_one_encoded_segment() {
    let (base_url, server) = respond_once(http_response("200 OK", "[]")).await;
    let client = ApiClient::http(&base_url, Duration::from_secs(5)).unwrap();

    let results = client.search("late delivery/refund").await.unwrap();

    assert!(results.is_empty());
    let request = server.await.unwrap();
    assert!(request.starts_with("GET /api/v1/emails/search/late%20delivery%2Frefund HTTP/1.1"));
}
