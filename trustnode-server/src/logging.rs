//! Tracing subscriber setup

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Level used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber
///
/// Thread names are always recorded so each worker's lines can be told apart.
pub fn init_logging(json: bool) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))?;
    let registry = tracing_subscriber::registry().with(env_filter);

    if json {
        registry
            .with(fmt::layer().json().with_thread_names(true).with_current_span(true))
            .try_init()?;
    } else {
        registry
            .with(fmt::layer().with_thread_names(true).with_target(false))
            .try_init()?;
    }
    Ok(())
}
