//! Blocking HTTP/1.1 client
//!
//! Each call builds a current-thread tokio runtime, opens one connection,
//! sends one GET and reads the whole body. The calling thread blocks for the
//! duration; there is no pooling, retry or timeout beyond the OS defaults.

use crate::{ClientError, Result};
use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::header::{AUTHORIZATION, CONTENT_TYPE, HOST};
use hyper::{Method, Request, Uri};
use hyper_util::rt::TokioIo;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpStream;
use tracing::debug;
use trustnode_core::auth::{Jwt, KeyPair};
use trustnode_core::unix_now;

/// Status and body of a completed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Blocking GET client
#[derive(Debug, Clone, Copy, Default)]
pub struct Client;

impl Client {
    pub fn new() -> Self {
        Client
    }

    /// GET `url`
    pub fn get(&self, url: &str) -> Result<HttpResponse> {
        let uri = parse_http_uri(url)?;
        block_on(send_get(uri, None))?
    }

    /// GET `url` presenting `token` as a bearer credential
    pub fn get_with_bearer(&self, url: &str, token: &str) -> Result<HttpResponse> {
        let uri = parse_http_uri(url)?;
        block_on(send_get(uri, Some(format!("Bearer {}", token))))?
    }
}

/// Client that authenticates as a node when calling other nodes
#[derive(Debug, Clone)]
pub struct NodeClient {
    client: Client,
    self_url: String,
    key: Arc<KeyPair>,
}

impl NodeClient {
    pub fn new(self_url: impl Into<String>, key: Arc<KeyPair>) -> Self {
        NodeClient {
            client: Client::new(),
            self_url: self_url.into(),
            key,
        }
    }

    pub fn self_url(&self) -> &str {
        &self.self_url
    }

    /// Packed token asserting this node's identity to `target_base_url`
    pub fn token_for(&self, target_base_url: &str) -> Result<String> {
        let token = Jwt::for_target(&self.self_url, target_base_url, self.key.clone(), unix_now());
        Ok(token.pack()?)
    }

    /// GET `path` on the node at `target_base_url` with a fresh bearer token
    pub fn get_authorized(&self, target_base_url: &str, path: &str) -> Result<HttpResponse> {
        let token = self.token_for(target_base_url)?;
        let url = format!("{}{}", target_base_url.trim_end_matches('/'), path);
        debug!("Calling {} as {}", url, self.self_url);
        self.client.get_with_bearer(&url, &token)
    }
}

fn parse_http_uri(url: &str) -> Result<Uri> {
    let uri: Uri = url
        .parse()
        .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", url, e)))?;

    match uri.scheme_str() {
        Some("http") => {}
        Some(other) => return Err(ClientError::UnsupportedScheme(other.to_string())),
        None => return Err(ClientError::InvalidUrl(format!("{}: missing scheme", url))),
    }
    if uri.host().is_none() {
        return Err(ClientError::InvalidUrl(format!("{}: missing host", url)));
    }
    Ok(uri)
}

fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(future))
}

async fn send_get(uri: Uri, authorization: Option<String>) -> Result<HttpResponse> {
    let host = uri
        .host()
        .ok_or_else(|| ClientError::InvalidUrl(uri.to_string()))?
        .to_string();
    let port = uri.port_u16().unwrap_or(80);
    let authority = uri
        .authority()
        .map(|a| a.as_str().to_string())
        .unwrap_or_else(|| host.clone());
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");

    let stream = TcpStream::connect((host.as_str(), port)).await?;
    let (mut sender, connection) = hyper::client::conn::http1::Builder::new()
        .title_case_headers(true)
        .handshake(TokioIo::new(stream))
        .await?;

    tokio::spawn(async move {
        if let Err(err) = connection.await {
            debug!("Connection ended with error: {}", err);
        }
    });

    let mut builder = Request::builder()
        .method(Method::GET)
        .uri(path)
        .header(HOST, authority);
    if let Some(value) = authorization {
        builder = builder.header(AUTHORIZATION, value);
    }
    let request = builder.body(Empty::<Bytes>::new())?;

    let response = sender.send_request(request).await?;
    let status = response.status().as_u16();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let body = response.into_body().collect().await?.to_bytes();

    Ok(HttpResponse {
        status,
        content_type,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_validation() {
        assert!(parse_http_uri("http://127.0.0.1:8080/x").is_ok());
        assert!(matches!(
            parse_http_uri("https://node-a/.well-known/jwks.json"),
            Err(ClientError::UnsupportedScheme(_))
        ));
        assert!(matches!(parse_http_uri("/relative"), Err(ClientError::InvalidUrl(_))));
        assert!(matches!(parse_http_uri("http://exa mple"), Err(ClientError::InvalidUrl(_))));
    }

    #[test]
    fn test_connection_refused_is_an_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = Client::new().get(&format!("http://{}/", addr));
        assert!(matches!(result, Err(ClientError::Io(_))));
    }

    #[test]
    fn test_response_helpers() {
        let response = HttpResponse {
            status: 204,
            content_type: None,
            body: Bytes::from_static(b"ok"),
        };
        assert!(response.is_success());
        assert_eq!(response.text(), "ok");
    }
}
