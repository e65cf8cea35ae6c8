//! Blocking HTTP/1 server with a fixed worker pool
//!
//! One listening socket is shared by `workers` OS threads. Each thread loops
//! accepting a connection, reading one request, running the handler and
//! closing the connection.

use socket2::{Domain, Protocol, Socket, Type};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use trustnode_core::HttpStatus;
use trustnode_net::{parse_request, Handler, HttpRequest, ResponseBuilder};

pub const EXIT_USAGE: i32 = 1;
pub const EXIT_SOCKET_OPEN: i32 = 30;
pub const EXIT_BIND: i32 = 31;
pub const EXIT_LISTEN: i32 = 32;
pub const EXIT_WORKER_SPAWN: i32 = 33;
/// Any other failure before serving starts, such as key generation
pub const EXIT_STARTUP: i32 = 34;
pub const EXIT_ACCEPT: i32 = 50;
pub const EXIT_CLIENT_INFO: i32 = 51;
pub const EXIT_STREAM_OPEN: i32 = 52;

/// Upper bound on unread request bytes discarded before closing
const MAX_DRAIN_BYTES: u64 = 4 * 1024 * 1024;

/// Longest wait for more unread input while draining
const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Server needs at least one worker")]
    NoWorkers,

    #[error("Listen backlog must be positive, got {0}")]
    InvalidBacklog(i32),

    #[error("Unable to open socket: {0}")]
    SocketOpen(#[source] io::Error),

    #[error("Unable to bind to port {port}: {source}")]
    Bind { port: u16, source: io::Error },

    #[error("Unable to listen: {0}")]
    Listen(#[source] io::Error),

    #[error("Unable to spawn worker {index}: {source}")]
    WorkerSpawn { index: usize, source: io::Error },

    #[error("Unable to accept connection: {0}")]
    Accept(#[source] io::Error),

    #[error("Unable to get client info: {0}")]
    ClientInfo(#[source] io::Error),

    #[error("Unable to open stream: {0}")]
    StreamOpen(#[source] io::Error),
}

impl ServerError {
    /// Process exit code reported for this failure
    pub fn exit_code(&self) -> i32 {
        match self {
            ServerError::NoWorkers | ServerError::InvalidBacklog(_) => EXIT_USAGE,
            ServerError::SocketOpen(_) => EXIT_SOCKET_OPEN,
            ServerError::Bind { .. } => EXIT_BIND,
            ServerError::Listen(_) => EXIT_LISTEN,
            ServerError::WorkerSpawn { .. } => EXIT_WORKER_SPAWN,
            ServerError::Accept(_) => EXIT_ACCEPT,
            ServerError::ClientInfo(_) => EXIT_CLIENT_INFO,
            ServerError::StreamOpen(_) => EXIT_STREAM_OPEN,
        }
    }
}

/// Exit code for a failure surfaced at the binary edge
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<ServerError>()
        .map_or(EXIT_STARTUP, ServerError::exit_code)
}

/// What a worker does when a connection fails at the OS level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionErrorPolicy {
    /// Log and move on to the next connection
    #[default]
    Isolate,
    /// Terminate the process with the failure's exit code
    Exit,
}

pub struct Server {
    port: u16,
    workers: usize,
    backlog: i32,
    handler: Arc<dyn Handler>,
    connection_errors: ConnectionErrorPolicy,
}

impl Server {
    pub fn new(port: u16, workers: usize, backlog: i32, handler: Arc<dyn Handler>) -> Self {
        Server {
            port,
            workers,
            backlog,
            handler,
            connection_errors: ConnectionErrorPolicy::default(),
        }
    }

    pub fn with_connection_error_policy(mut self, policy: ConnectionErrorPolicy) -> Self {
        self.connection_errors = policy;
        self
    }

    /// Open, bind and listen on `0.0.0.0:port` with `SO_REUSEADDR`
    ///
    /// Fails without touching the network when there are no workers or the
    /// backlog is not positive.
    pub fn bind(self) -> Result<BoundServer, ServerError> {
        if self.workers == 0 {
            return Err(ServerError::NoWorkers);
        }
        if self.backlog <= 0 {
            return Err(ServerError::InvalidBacklog(self.backlog));
        }

        let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP)).map_err(ServerError::SocketOpen)?;
        socket.set_reuse_address(true).map_err(ServerError::SocketOpen)?;

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        socket
            .bind(&addr.into())
            .map_err(|source| ServerError::Bind { port: self.port, source })?;
        socket.listen(self.backlog).map_err(ServerError::Listen)?;

        let listener: TcpListener = socket.into();
        let local_addr = listener.local_addr().map_err(ServerError::Listen)?;
        info!("Listening on {} (backlog {})", local_addr, self.backlog);

        Ok(BoundServer {
            listener: Arc::new(listener),
            local_addr,
            workers: self.workers,
            handler: self.handler,
            connection_errors: self.connection_errors,
        })
    }
}

/// A server whose socket is listening but whose workers have not started
pub struct BoundServer {
    listener: Arc<TcpListener>,
    local_addr: SocketAddr,
    workers: usize,
    handler: Arc<dyn Handler>,
    connection_errors: ConnectionErrorPolicy,
}

impl BoundServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Start the workers and return their handles
    pub fn spawn(self) -> Result<Vec<JoinHandle<()>>, ServerError> {
        let mut handles = Vec::with_capacity(self.workers);
        for index in 0..self.workers {
            let listener = Arc::clone(&self.listener);
            let handler = Arc::clone(&self.handler);
            let policy = self.connection_errors;

            let handle = thread::Builder::new()
                .name(format!("worker-{}", index))
                .spawn(move || worker_loop(&listener, handler.as_ref(), policy))
                .map_err(|source| ServerError::WorkerSpawn { index, source })?;
            handles.push(handle);
        }
        info!("Started {} workers", handles.len());
        Ok(handles)
    }

    /// Start the workers and block until they all exit
    pub fn serve(self) -> Result<(), ServerError> {
        for handle in self.spawn()? {
            if handle.join().is_err() {
                error!("Worker panicked");
            }
        }
        Ok(())
    }
}

fn worker_loop(listener: &TcpListener, handler: &dyn Handler, policy: ConnectionErrorPolicy) {
    loop {
        if let Err(err) = handle_connection(listener, handler) {
            match policy {
                ConnectionErrorPolicy::Isolate => warn!("{}", err),
                ConnectionErrorPolicy::Exit => {
                    error!("{}", err);
                    std::process::exit(err.exit_code());
                }
            }
        }
    }
}

/// Accept one connection and serve exactly one request on it
fn handle_connection(listener: &TcpListener, handler: &dyn Handler) -> Result<(), ServerError> {
    let (stream, _) = listener.accept().map_err(ServerError::Accept)?;
    let peer = stream.peer_addr().map_err(ServerError::ClientInfo)?;
    let read_half = stream.try_clone().map_err(ServerError::StreamOpen)?;

    let mut reader = BufReader::new(read_half);
    let mut writer = BufWriter::new(stream);

    let request = match parse_request(&mut reader) {
        Ok(request) => request,
        Err(err) if err.is_client_error() => {
            warn!("Rejecting request from {}: {}", peer, err);
            let request = HttpRequest::degenerate();
            let mut response = ResponseBuilder::new(&request, &mut writer);
            if let Err(e) = response.error_page(&err.to_string(), HttpStatus::BadRequest) {
                debug!("Unable to answer {}: {}", peer, e);
            }
            close_connection(&mut writer, &mut reader, peer);
            return Ok(());
        }
        Err(err) => {
            debug!("Dropping connection from {}: {}", peer, err);
            return Ok(());
        }
    };

    {
        let mut response = ResponseBuilder::new(&request, &mut writer);
        if let Err(e) = handler.handle(&mut response) {
            warn!("Handler failed for {} {} from {}: {}", request.method, request.uri, peer, e);
        }
        match response.status() {
            Some(status) => info!("{} {} {} -> {}", peer, request.method, request.uri, status.code()),
            None => warn!("{} {} {} -> no response", peer, request.method, request.uri),
        }
    }

    close_connection(&mut writer, &mut reader, peer);
    Ok(())
}

/// Flush, half-close, then discard unread input
///
/// Closing a socket with unread input makes the kernel send a reset, which
/// can destroy the response before the peer reads it.
fn close_connection(writer: &mut BufWriter<TcpStream>, reader: &mut BufReader<TcpStream>, peer: SocketAddr) {
    if let Err(e) = writer.flush() {
        debug!("Unable to flush response to {}: {}", peer, e);
        return;
    }
    if let Err(e) = writer.get_ref().shutdown(Shutdown::Write) {
        debug!("Unable to half-close {}: {}", peer, e);
        return;
    }
    if let Err(e) = reader.get_ref().set_read_timeout(Some(DRAIN_TIMEOUT)) {
        debug!("Unable to drain {}: {}", peer, e);
        return;
    }

    match io::copy(&mut reader.by_ref().take(MAX_DRAIN_BYTES), &mut io::sink()) {
        Ok(0) => {}
        Ok(discarded) => debug!("Discarded {} unread bytes from {}", discarded, peer),
        Err(e) => debug!("Stopped draining {}: {}", peer, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hello(response: &mut ResponseBuilder<'_>) -> io::Result<()> {
        let body = format!("hello {}", response.request().path());
        response.generic(&body, "text/plain")
    }

    fn roundtrip(addr: SocketAddr, raw: &[u8]) -> String {
        let mut stream = TcpStream::connect(("127.0.0.1", addr.port())).unwrap();
        stream.write_all(raw).unwrap();
        stream.shutdown(Shutdown::Write).unwrap();
        let mut out = String::new();
        stream.read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn test_exit_codes() {
        let io = || io::Error::new(io::ErrorKind::Other, "boom");

        assert_eq!(ServerError::SocketOpen(io()).exit_code(), 30);
        assert_eq!(ServerError::Bind { port: 1, source: io() }.exit_code(), 31);
        assert_eq!(ServerError::Listen(io()).exit_code(), 32);
        assert_eq!(ServerError::WorkerSpawn { index: 0, source: io() }.exit_code(), 33);
        assert_eq!(ServerError::Accept(io()).exit_code(), 50);
        assert_eq!(ServerError::ClientInfo(io()).exit_code(), 51);
        assert_eq!(ServerError::StreamOpen(io()).exit_code(), 52);

        assert_eq!(ServerError::NoWorkers.exit_code(), EXIT_USAGE);
        assert_eq!(ServerError::InvalidBacklog(0).exit_code(), EXIT_USAGE);
    }

    #[test]
    fn test_binary_edge_exit_codes() {
        let listen = anyhow::Error::from(ServerError::Listen(io::Error::new(io::ErrorKind::Other, "boom")));
        assert_eq!(exit_code_for(&listen), EXIT_LISTEN);

        let keygen = anyhow::anyhow!("Failed to generate node key");
        assert_eq!(exit_code_for(&keygen), EXIT_STARTUP);
        assert_ne!(EXIT_STARTUP, EXIT_USAGE);
    }

    #[test]
    fn test_unusable_pool_settings_are_rejected_before_binding() {
        assert!(matches!(
            Server::new(0, 0, 10, Arc::new(hello)).bind(),
            Err(ServerError::NoWorkers)
        ));
        assert!(matches!(
            Server::new(0, 2, -5, Arc::new(hello)).bind(),
            Err(ServerError::InvalidBacklog(-5))
        ));
        assert!(matches!(
            Server::new(0, 2, 0, Arc::new(hello)).bind(),
            Err(ServerError::InvalidBacklog(0))
        ));
    }

    #[test]
    fn test_serves_one_request_per_connection() {
        let server = Server::new(0, 2, 10, Arc::new(hello)).bind().unwrap();
        let addr = server.local_addr();
        server.spawn().unwrap();

        let out = roundtrip(addr, b"GET /world HTTP/1.1\r\nHost: x\r\n\r\n");
        assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(out.ends_with("hello /world"));

        // Connection closed by the server; a second request needs a new one
        let again = roundtrip(addr, b"GET /again HTTP/1.1\r\n\r\n");
        assert!(again.ends_with("hello /again"));
    }

    #[test]
    fn test_oversized_line_is_a_bad_request() {
        let server = Server::new(0, 1, 10, Arc::new(hello)).bind().unwrap();
        let addr = server.local_addr();
        server.spawn().unwrap();

        // Input continues past the rejected line and must be drained, not reset
        let mut raw = b"GET /".to_vec();
        raw.resize(trustnode_net::MAX_LINE_LENGTH + 1, b'a');
        raw.extend_from_slice(b" HTTP/1.1\r\nHost: x\r\n\r\n");

        let out = roundtrip(addr, &raw);
        assert!(out.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    }

    #[test]
    fn test_port_in_use_is_a_bind_error() {
        let taken = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        match Server::new(port, 1, 10, Arc::new(hello)).bind() {
            Err(err) => assert_eq!(err.exit_code(), EXIT_BIND),
            Ok(_) => panic!("bound a port that is already listening"),
        }
    }
}
