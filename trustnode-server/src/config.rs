//! Command line configuration

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::ffi::OsString;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_WORKERS: usize = 10;
pub const DEFAULT_BACKLOG: i32 = 10;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("worker count must be at least 1")]
    NoWorkers,

    #[error("listen backlog must be positive, got {0}")]
    InvalidBacklog(i32),

    #[error("public URL must start with http://, got {0}")]
    InvalidPublicUrl(String),
}

/// Everything a node needs to start serving
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub workers: usize,
    pub backlog: i32,
    /// Base URL peers use to reach this node; also the token issuer
    pub public_url: String,
    pub static_root: PathBuf,
    pub node_name: String,
    pub fatal_connection_errors: bool,
    pub ignore_token_expiry: bool,
    pub log_json: bool,
}

impl ServerConfig {
    /// Defaults for a node on `port`
    pub fn new(port: u16) -> Self {
        ServerConfig {
            port,
            workers: DEFAULT_WORKERS,
            backlog: DEFAULT_BACKLOG,
            public_url: default_public_url(port),
            static_root: PathBuf::from("."),
            node_name: "trustnode".to_string(),
            fatal_connection_errors: false,
            ignore_token_expiry: false,
            log_json: false,
        }
    }

    /// Parse the process arguments
    pub fn from_args() -> Result<Self, clap::Error> {
        Self::try_parse_from(std::env::args_os())
    }

    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = command().try_get_matches_from(args)?;
        Ok(Self::from_matches(&matches))
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        let port = matches.get_one::<u16>("port").copied().unwrap_or_default();
        let mut config = ServerConfig::new(port);

        if let Some(workers) = matches.get_one::<usize>("workers") {
            config.workers = *workers;
        }
        if let Some(backlog) = matches.get_one::<i32>("backlog") {
            config.backlog = *backlog;
        }
        if let Some(url) = matches.get_one::<String>("public-url") {
            config.public_url = url.trim_end_matches('/').to_string();
        }
        if let Some(root) = matches.get_one::<PathBuf>("static-root") {
            config.static_root = root.clone();
        }
        if let Some(name) = matches.get_one::<String>("node-name") {
            config.node_name = name.clone();
        }
        config.fatal_connection_errors = matches.get_flag("fatal-connection-errors");
        config.ignore_token_expiry = matches.get_flag("ignore-token-expiry");
        config.log_json = matches.get_flag("log-json");
        config
    }

    /// Reject settings a server cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.backlog <= 0 {
            return Err(ConfigError::InvalidBacklog(self.backlog));
        }
        if !self.public_url.starts_with("http://") {
            return Err(ConfigError::InvalidPublicUrl(self.public_url.clone()));
        }
        Ok(())
    }
}

fn default_public_url(port: u16) -> String {
    format!("http://127.0.0.1:{}", port)
}

fn command() -> Command {
    Command::new("trustnode-server")
        .version(env!("CARGO_PKG_VERSION"))
        .about("HTTP node that authenticates peers with RS256 bearer tokens")
        .arg(
            Arg::new("port")
                .value_name("PORT")
                .help("TCP port to listen on (all interfaces)")
                .required(true)
                .value_parser(value_parser!(u16)),
        )
        .arg(
            Arg::new("workers")
                .long("workers")
                .value_name("N")
                .help("Number of worker threads")
                .default_value("10")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("backlog")
                .long("backlog")
                .value_name("N")
                .help("Listen backlog")
                .default_value("10")
                .allow_negative_numbers(true)
                .value_parser(value_parser!(i32)),
        )
        .arg(
            Arg::new("public-url")
                .long("public-url")
                .value_name("URL")
                .help("Base URL peers reach this node at [default: http://127.0.0.1:<PORT>]"),
        )
        .arg(
            Arg::new("static-root")
                .long("static-root")
                .value_name("PATH")
                .help("Directory served under /static/")
                .default_value(".")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("node-name")
                .long("node-name")
                .value_name("NAME")
                .help("Name reported at /metadata")
                .default_value("trustnode"),
        )
        .arg(
            Arg::new("fatal-connection-errors")
                .long("fatal-connection-errors")
                .help("Exit the process when accepting or opening a connection fails")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("ignore-token-expiry")
                .long("ignore-token-expiry")
                .help("Accept bearer tokens past their exp claim")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .help("Emit logs as JSON lines")
                .action(ArgAction::SetTrue),
        )
}
