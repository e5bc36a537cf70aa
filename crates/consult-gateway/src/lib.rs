//! Web transport for consulting sessions: an index page, `/health`, and a `/ws`
//! WebSocket that runs one single-shot session per inbound message and streams its
//! output back to the connection that asked.

pub mod connection;
pub mod router;
pub mod server;

pub use connection::{Connection, ConnectionRegistry};
pub use router::{InboundMessage, MessageRouter, OutboundFrame, WsSink};
pub use server::{GatewayConfig, GatewayServer};
