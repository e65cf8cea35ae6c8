//! Protocol limits and errors

/// Line terminator on the request line, header lines and the response
pub const CRLF: &str = "\r\n";

/// Separator between a header name and its value
pub const HEADER_SEPARATOR: &str = ": ";

/// Maximum length of the request line or a single header line (prevents DoS)
pub const MAX_LINE_LENGTH: usize = 8 * 1024;

/// Maximum number of header lines read per request
pub const MAX_HEADER_COUNT: usize = 100;

/// Protocol error types
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Line too long: more than {0} bytes")]
    LineTooLong(usize),

    #[error("Too many header lines: more than {0}")]
    TooManyHeaders(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Whether the client is still owed an error response
    pub fn is_client_error(&self) -> bool {
        !matches!(self, ProtocolError::Io(_))
    }
}
