//! HTTP/1.x request parsing
//!
//! Only the request line and headers are read; bodies, chunked encoding and
//! keep-alive are not supported.

use crate::protocol::{ProtocolError, HEADER_SEPARATOR, MAX_HEADER_COUNT, MAX_LINE_LENGTH};
use std::collections::HashMap;
use std::io::{BufRead, Read};
use tracing::warn;
use trustnode_core::HttpMethod;

/// A parsed request line plus headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub uri: String,
    pub version: String,
    /// Header names as received; a repeated name keeps the last value
    pub headers: HashMap<String, String>,
}

impl HttpRequest {
    /// Stand-in for an unparseable request line; routes as unmatched
    pub fn degenerate() -> Self {
        HttpRequest {
            method: HttpMethod::GET,
            uri: String::new(),
            version: String::new(),
            headers: HashMap::new(),
        }
    }

    /// Header value by name: exact match first, then ASCII case-insensitive
    pub fn header(&self, name: &str) -> Option<&str> {
        if let Some(value) = self.headers.get(name) {
            return Some(value);
        }
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// URI without its query string
    pub fn path(&self) -> &str {
        self.uri.split_once('?').map_or(self.uri.as_str(), |(path, _)| path)
    }

    /// First value of a query parameter, undecoded
    pub fn query_param(&self, name: &str) -> Option<&str> {
        let (_, query) = self.uri.split_once('?')?;
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }
}

/// Read one line, returning it without its terminator, or `None` at end of stream
fn read_line<R: BufRead>(reader: &mut R) -> Result<Option<String>, ProtocolError> {
    let mut buffer = Vec::new();
    let read = reader
        .by_ref()
        .take(MAX_LINE_LENGTH as u64 + 1)
        .read_until(b'\n', &mut buffer)?;

    if read == 0 {
        return Ok(None);
    }
    if buffer.len() > MAX_LINE_LENGTH {
        return Err(ProtocolError::LineTooLong(MAX_LINE_LENGTH));
    }

    let line = String::from_utf8_lossy(&buffer);
    let line = line.strip_suffix('\n').unwrap_or(&line);
    let line = line.strip_suffix('\r').unwrap_or(line);
    Ok(Some(line.to_string()))
}

/// Parse one request from the start of a connection
///
/// A request line that does not split into exactly three space-separated
/// tokens yields [`HttpRequest::degenerate`]. Header lines without `": "`
/// are skipped. Reading stops at the first empty line or end of stream.
pub fn parse_request<R: BufRead>(reader: &mut R) -> Result<HttpRequest, ProtocolError> {
    let request_line = read_line(reader)?.unwrap_or_default();

    let tokens: Vec<&str> = request_line.split(' ').collect();
    if tokens.len() != 3 {
        warn!("Invalid request line: {:?}", request_line);
        return Ok(HttpRequest::degenerate());
    }

    let mut headers = HashMap::new();
    let mut count = 0;
    while let Some(line) = read_line(reader)? {
        if line.is_empty() {
            break;
        }

        count += 1;
        if count > MAX_HEADER_COUNT {
            return Err(ProtocolError::TooManyHeaders(MAX_HEADER_COUNT));
        }

        match line.split_once(HEADER_SEPARATOR) {
            Some((name, value)) => {
                headers.insert(name.to_string(), value.to_string());
            }
            None => warn!("Invalid header line: {:?}", line),
        }
    }

    Ok(HttpRequest {
        method: HttpMethod::parse(tokens[0]),
        uri: tokens[1].to_string(),
        version: tokens[2].to_string(),
        headers,
    })
}
