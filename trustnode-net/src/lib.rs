//! HTTP/1.x wire layer for trustnode
//!
//! Hand-rolled request-line and header parsing over any `BufRead`, and
//! response framing over any `Write`. One request per connection.

pub mod protocol;
pub mod response;
pub mod wire;

pub use protocol::*;
pub use response::*;
pub use wire::*;
