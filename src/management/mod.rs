//! The `management` module is the boundary to the broker's stream and
//! consumer administration API.
//!
//! `Management` is the seam the reconciler works against. `NatsManagement`
//! implements it on top of a JetStream context; tests use an in-memory broker.

pub mod nats;

use async_trait::async_trait;

use crate::topology::{ConsumerInfo, ConsumerSpec, StreamInfo, StreamSpec};
use crate::utils::error::ManagementError;

pub use nats::NatsManagement;

/// Stream and consumer CRUD on a broker.
///
/// Every method is one broker round-trip and reflects live state; nothing is
/// cached.
#[async_trait]
pub trait Management: Send + Sync {
    async fn list_streams(&self) -> Result<Vec<StreamInfo>, ManagementError>;

    async fn create_stream(&self, spec: &StreamSpec) -> Result<(), ManagementError>;

    /// Replaces the configuration of stream `name` with `config`.
    async fn update_stream(&self, name: &str, config: &StreamSpec) -> Result<(), ManagementError>;

    async fn delete_stream(&self, name: &str) -> Result<(), ManagementError>;

    async fn list_consumers(&self, stream: &str) -> Result<Vec<ConsumerInfo>, ManagementError>;

    async fn create_consumer(&self, stream: &str, spec: &ConsumerSpec) -> Result<(), ManagementError>;

    /// Overwrites the configuration of consumer `durable` on `stream`.
    async fn update_consumer(
        &self,
        stream: &str,
        durable: &str,
        spec: &ConsumerSpec,
    ) -> Result<(), ManagementError>;

    async fn delete_consumer(&self, stream: &str, durable: &str) -> Result<(), ManagementError>;

    async fn consumer_info(&self, stream: &str, durable: &str) -> Result<ConsumerInfo, ManagementError>;
}
