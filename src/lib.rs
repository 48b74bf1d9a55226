//! # streamsync
//!
//! `streamsync` keeps the durable topology of a persistent pub/sub broker
//! (NATS JetStream) in line with a declared set of streams and consumers.
//! Missing streams and consumers are created, drifted ones are updated, and
//! nothing is ever deleted by reconciliation, so consumer cursors and ack
//! state survive every run.
//!
//! ## Core Modules
//!
//! - `topology`: desired-state descriptors for streams and consumers.
//! - `management`: the broker administration boundary and its JetStream adapter.
//! - `reconcile`: the create-or-update engine, inspection and delete calls.
//! - `connection`: the single broker session and the connect-then-reconcile lifecycle.
//! - `config`: loading settings and topology from file and environment.
//! - `utils`: error types and logging setup.

pub mod config;
pub mod connection;
pub mod management;
pub mod reconcile;
pub mod topology;
pub mod utils;

pub use connection::{ConnectionManager, ConnectionState};
pub use reconcile::Reconciler;
pub use utils::error::{Error, Result};
