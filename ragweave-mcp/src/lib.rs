//! # ragweave-mcp
//!
//! Tool subprocess multiplexer speaking a line-delimited JSON protocol
//! over stdio. Sessions are long-lived: one serialized writer, one reader
//! fanning responses out to per-request waiters by correlation id.
//! Deadlines detach only the affected call (a cancellation notice is sent
//! to the server); transport failures tear the session down, respawn it
//! with the original launch parameters, and retry the call once.

#![warn(missing_docs)]

/// Error classification
pub mod error;

/// Session multiplexer
pub mod multiplexer;

/// Wire protocol
pub mod protocol;

/// Live sessions
pub mod session;

/// Scripted in-memory server for tests
pub mod testing;

/// Transport seam
pub mod transport;

pub use error::{McpError, Result};
pub use multiplexer::McpMultiplexer;
pub use protocol::ToolInfo;
pub use session::McpSession;
pub use transport::{StdioTransportFactory, Transport, TransportFactory};
