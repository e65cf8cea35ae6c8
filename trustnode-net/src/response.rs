//! Response framing
//!
//! A [`ResponseBuilder`] is bound to exactly one request and the stream it
//! arrived on. Every response carries a status line, `Content-Type` and
//! `Content-Length`, then the body; the connection is closed afterwards.

use crate::protocol::CRLF;
use crate::wire::HttpRequest;
use serde::Serialize;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use tracing::debug;
use trustnode_core::HttpStatus;

/// Routing function invoked once per request
pub trait Handler: Send + Sync {
    fn handle(&self, response: &mut ResponseBuilder<'_>) -> io::Result<()>;
}

impl<F> Handler for F
where
    F: Fn(&mut ResponseBuilder<'_>) -> io::Result<()> + Send + Sync,
{
    fn handle(&self, response: &mut ResponseBuilder<'_>) -> io::Result<()> {
        self(response)
    }
}

pub struct ResponseBuilder<'a> {
    request: &'a HttpRequest,
    stream: &'a mut dyn Write,
    status: Option<HttpStatus>,
}

impl<'a> ResponseBuilder<'a> {
    pub fn new(request: &'a HttpRequest, stream: &'a mut dyn Write) -> Self {
        ResponseBuilder {
            request,
            stream,
            status: None,
        }
    }

    /// The request being answered; borrowed for the builder's whole lifetime
    pub fn request(&self) -> &'a HttpRequest {
        self.request
    }

    /// Status of the response written so far, if any
    pub fn status(&self) -> Option<HttpStatus> {
        self.status
    }

    /// Write the status line and headers
    pub fn header(&mut self, status: HttpStatus, content_type: &str, content_length: u64) -> io::Result<()> {
        self.status = Some(status);
        write!(
            self.stream,
            "HTTP/1.1 {} {}{crlf}Content-Type: {}{crlf}Content-Length: {}{crlf}{crlf}",
            status.code(),
            status.short_message(),
            content_type,
            content_length,
            crlf = CRLF
        )
    }

    pub fn ok_header(&mut self, content_type: &str, content_length: u64) -> io::Result<()> {
        self.header(HttpStatus::Ok, content_type, content_length)
    }

    /// Minimal HTML page describing `status` and `cause`
    pub fn error_page(&mut self, cause: &str, status: HttpStatus) -> io::Result<()> {
        let html = format!(
            "<html>\n  <head><title>Error</title></head>\n  <body>{}: {}<p>{}: {}</p></body>\n</html>",
            status.code(),
            status.short_message(),
            status.long_message(),
            escape_html(cause)
        );
        self.header(status, "text/html", html.len() as u64)?;
        self.stream.write_all(html.as_bytes())
    }

    pub fn html(&mut self, html: &str) -> io::Result<()> {
        self.generic(html, "text/html")
    }

    pub fn json(&mut self, json: &str) -> io::Result<()> {
        self.generic(json, "application/json")
    }

    /// Serialize `data` as the JSON body of a 200 response
    pub fn json_data<T: Serialize + ?Sized>(&mut self, data: &T) -> io::Result<()> {
        let body = serde_json::to_string(data)?;
        self.json(&body)
    }

    /// 200 response with an arbitrary body
    pub fn generic(&mut self, body: &str, content_type: &str) -> io::Result<()> {
        self.body(HttpStatus::Ok, content_type, body.as_bytes())
    }

    /// Complete response with any status and raw body bytes
    pub fn body(&mut self, status: HttpStatus, content_type: &str, body: &[u8]) -> io::Result<()> {
        self.header(status, content_type, body.len() as u64)?;
        self.stream.write_all(body)
    }

    /// Stream a file verbatim, or answer 404 when it cannot be opened
    pub fn static_file(&mut self, path: impl AsRef<Path>, content_type: &str) -> io::Result<()> {
        let path = path.as_ref();
        let opened = File::open(path).and_then(|file| {
            let metadata = file.metadata()?;
            if metadata.is_file() {
                Ok((file, metadata.len()))
            } else {
                Err(io::Error::new(io::ErrorKind::NotFound, "not a regular file"))
            }
        });

        match opened {
            Ok((file, size)) => {
                self.ok_header(content_type, size)?;
                let copied = io::copy(&mut file.take(size), &mut self.stream)?;
                if copied != size {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("{} shrank while being served", path.display()),
                    ));
                }
                Ok(())
            }
            Err(e) => {
                debug!("Static file {} unavailable: {}", path.display(), e);
                self.error_page("Requested file was not found on the server", HttpStatus::NotFound)
            }
        }
    }
}

/// Escape text for inclusion in an HTML body
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Content type for a file name, by extension
pub fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase).as_deref() {
        Some("html") | Some("htm") => "text/html",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}
