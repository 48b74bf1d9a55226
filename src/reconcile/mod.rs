//! The `reconcile` module makes the broker match a desired topology.
//!
//! It owns the create-or-update decisions for streams and consumers, the
//! read-only inspection calls, and the explicit delete operations.

pub mod engine;

pub use engine::{ConsumerPass, Reconciler, StreamCreateMode, StreamPass, find_consumer};

#[cfg(test)]
mod tests;
