//! trustnode server binary

use anyhow::Context;
use std::process;
use std::sync::Arc;
use tracing::{debug, error, info};
use trustnode_core::auth::{ExpiryPolicy, KeyPair};
use trustnode_server::server::{exit_code_for, EXIT_USAGE};
use trustnode_server::{
    default_metadata, init_logging, ConnectionErrorPolicy, NodeIdentity, Router, Server, ServerConfig,
};

fn main() {
    let config = match ServerConfig::from_args() {
        Ok(config) => config,
        Err(e) => {
            let _ = e.print();
            process::exit(if e.use_stderr() { EXIT_USAGE } else { 0 });
        }
    };

    if let Err(e) = init_logging(config.log_json) {
        eprintln!("Unable to initialise logging: {:#}", e);
    }

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        process::exit(EXIT_USAGE);
    }

    if let Err(e) = run(config) {
        error!("{:#}", e);
        process::exit(exit_code_for(&e));
    }
}

fn run(config: ServerConfig) -> anyhow::Result<()> {
    info!("Starting trustnode {} on port {}", config.node_name, config.port);
    info!("Public URL: {}", config.public_url);
    info!("Static root: {}", config.static_root.display());

    let key = KeyPair::generate().context("Failed to generate node key")?;
    info!("Generated node key {}", key.key_id());
    debug!("Node public key:\n{}", key.public_key_pem()?);

    let identity = NodeIdentity::new(Arc::new(key), config.public_url.clone(), default_metadata(&config.node_name))?;

    let expiry = if config.ignore_token_expiry {
        ExpiryPolicy::Ignore
    } else {
        ExpiryPolicy::default()
    };
    let router = Router::new(Arc::new(identity), config.static_root.clone(), expiry);

    let policy = if config.fatal_connection_errors {
        ConnectionErrorPolicy::Exit
    } else {
        ConnectionErrorPolicy::Isolate
    };

    Server::new(config.port, config.workers, config.backlog, Arc::new(router))
        .with_connection_error_policy(policy)
        .bind()?
        .serve()?;

    info!("Server shutdown");
    Ok(())
}
