//! Command/response transports.
//!
//! A transport sends one serialized request as a single text frame, blocks
//! until exactly one reply frame arrives, and deserializes it. There is no
//! pipelining: requests and replies strictly alternate on a connection, and
//! the `&mut self` receiver enforces the one-outstanding-request rule at the
//! type level. There is deliberately no reply timeout; a silent instrument
//! hangs the caller.

use crate::error::AppResult;
use crate::protocol::{Request, Response};
use async_trait::async_trait;

pub mod mock;
pub mod tcp;

pub use mock::ScriptedTransport;
pub use tcp::TcpTransport;

/// One request/reply exchange with an instrument's control server.
#[async_trait]
pub trait Transport: Send {
    /// Sends the request and blocks until the single reply arrives.
    ///
    /// Fails with `TransportUnavailable` on a socket-level error and
    /// `MalformedReply` when the reply frame is not a valid envelope.
    async fn roundtrip(&mut self, request: &Request) -> AppResult<Response>;
}
