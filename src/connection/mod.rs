//! The `connection` module owns the broker session.
//!
//! `Transport` and `Connection` are the boundary to the broker client;
//! `ConnectionManager` gates reconciliation behind a single successful
//! connect.

pub mod manager;
pub mod transport;

pub use manager::{ConnectionManager, ConnectionState};
pub use transport::{ConnectedHook, Connection, NatsConnection, NatsTransport, Transport};
