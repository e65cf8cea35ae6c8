//! Outbound calls against a one-shot listener speaking canned HTTP

use std::io::{BufReader, Write};
use std::net::TcpListener;
use std::sync::mpsc;
use std::thread;
use trustnode_client::{HttpDirectorySource, NodeClient};
use trustnode_core::auth::{Jwt, JwkSet, KeyDirectorySource, WELL_KNOWN_JWKS_PATH};
use trustnode_core::test_utils::{shared_key_arc, shared_key_pair};
use trustnode_core::TrustError;
use trustnode_net::{parse_request, HttpRequest};

/// Serve exactly one response, handing back the request that arrived
fn one_shot(status_line: &'static str, body: String) -> (String, mpsc::Receiver<HttpRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let request = parse_request(&mut reader).unwrap();

        let mut stream = stream;
        write!(
            stream,
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        )
        .unwrap();
        stream.flush().unwrap();
        tx.send(request).unwrap();
    });

    (base, rx)
}

#[test]
fn fetches_published_directory() {
    let jwks = JwkSet::for_key(shared_key_pair());
    let (base, requests) = one_shot("200 OK", jwks.to_json().unwrap());

    let fetched = HttpDirectorySource::new().fetch(&base).unwrap();
    assert_eq!(fetched, jwks);

    let request = requests.recv().unwrap();
    assert_eq!(request.uri, WELL_KNOWN_JWKS_PATH);
    assert!(request.header("Authorization").is_none());
}

#[test]
fn missing_directory_is_unavailable() {
    let (base, _requests) = one_shot("404 Not Found", "{}".to_string());

    let result = HttpDirectorySource::new().fetch(&base);
    assert!(matches!(result, Err(TrustError::DirectoryUnavailable(_))));
}

#[test]
fn malformed_directory_is_unavailable() {
    let (base, _requests) = one_shot("200 OK", "not json".to_string());

    let result = HttpDirectorySource::new().fetch(&base);
    assert!(matches!(result, Err(TrustError::DirectoryUnavailable(_))));
}

#[test]
fn unreachable_issuer_is_unavailable() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let result = HttpDirectorySource::new().fetch(&base);
    assert!(matches!(result, Err(TrustError::DirectoryUnavailable(_))));
}

#[test]
fn authorized_call_presents_bearer_token_for_target() {
    let (target, requests) = one_shot("200 OK", "{\"ok\":true}".to_string());
    let client = NodeClient::new("http://node-a:9000", shared_key_arc());

    let response = client.get_authorized(&target, "/secure").unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.text(), "{\"ok\":true}");

    let request = requests.recv().unwrap();
    assert_eq!(request.uri, "/secure");

    // Title-case on the wire so exact-match header lookups succeed
    let authorization = request.headers.get("Authorization").unwrap();
    let compact = authorization.strip_prefix("Bearer ").unwrap();

    let parsed = Jwt::parse(compact).unwrap();
    assert!(parsed.verify_with(shared_key_pair()));
    assert_eq!(parsed.payload.iss, "http://node-a:9000");
    assert_eq!(parsed.payload.aud, target);
    assert_eq!(parsed.header.kid, shared_key_pair().key_id().to_string());
}
