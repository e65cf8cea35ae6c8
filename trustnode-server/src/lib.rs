//! trustnode server: configuration, worker-pool server and routing

pub mod config;
pub mod handlers;
pub mod logging;
pub mod server;

pub use config::{ConfigError, ServerConfig};
pub use handlers::{default_metadata, NodeIdentity, Router};
pub use logging::init_logging;
pub use server::{BoundServer, ConnectionErrorPolicy, Server, ServerError};
