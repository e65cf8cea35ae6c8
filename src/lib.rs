//! trustnode umbrella crate
//!
//! Re-exports the token/key machinery and the HTTP wire layer so benchmarks
//! and downstream tools can depend on a single crate.

pub use trustnode_core::{auth, HttpMethod, HttpStatus, NodeHealth, NodeMetadata, TrustError};
pub use trustnode_net as net;
