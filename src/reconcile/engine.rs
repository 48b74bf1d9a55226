//! Reconciliation engine
//!
//! Drives the broker towards a desired `Topology`:
//! - streams are matched by name; missing ones are created, present ones are
//!   updated with the desired fields laid over the broker's configuration
//! - consumers are matched by durable name (or name when no durable name is
//!   set); missing ones are created, present ones are overwritten
//!
//! Specs are handled one at a time, in the order given, each one running its
//! own list/compare/write round-trips before the next starts. A failing broker
//! call stops the loop it happens in; earlier writes stay applied.

use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::management::Management;
use crate::topology::{ConsumerInfo, ConsumerSpec, StreamInfo, StreamSpec, Topology};
use crate::utils::error::ManagementError;

/// What `reconcile_streams` does after it creates a missing stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamCreateMode {
    /// End the pass after the first create. Later specs wait for the next pass.
    #[default]
    StopAfterCreate,
    /// Keep going through every spec.
    ContinueAll,
}

/// Outcome of one stream pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamPass {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    /// Specs not looked at because the pass stopped after a create.
    pub skipped: Vec<String>,
}

/// Outcome of one consumer pass over a single stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumerPass {
    pub created: Vec<String>,
    pub updated: Vec<String>,
}

/// Reconciles topology through a management handle.
#[derive(Debug, Clone)]
pub struct Reconciler<M> {
    management: M,
    create_mode: StreamCreateMode,
}

impl<M: Management> Reconciler<M> {
    pub fn new(management: M) -> Self {
        Self {
            management,
            create_mode: StreamCreateMode::default(),
        }
    }

    pub fn with_create_mode(mut self, create_mode: StreamCreateMode) -> Self {
        self.create_mode = create_mode;
        self
    }

    pub fn management(&self) -> &M {
        &self.management
    }

    /// Reconciles every stream in `topology`, then the consumers of each.
    ///
    /// Consumers of a stream the stream pass skipped are left for the next
    /// run, since their stream does not exist yet.
    pub async fn apply(&self, topology: &Topology) -> Result<(), ManagementError> {
        let streams = self.reconcile_streams(&topology.stream_specs()).await?;

        for entry in &topology.streams {
            let name = entry.stream.name.as_str();
            if streams.skipped.iter().any(|skipped| skipped == name) {
                warn!(stream = name, "stream not created yet, leaving its consumers for the next pass");
                continue;
            }
            if entry.consumers.is_empty() {
                continue;
            }
            self.reconcile_consumers(name, &entry.consumers).await?;
        }

        Ok(())
    }

    /// Creates or updates each stream in `specs`, in order.
    pub async fn reconcile_streams(&self, specs: &[StreamSpec]) -> Result<StreamPass, ManagementError> {
        let mut pass = StreamPass::default();

        for (index, spec) in specs.iter().enumerate() {
            let existing = self.management.list_streams().await.inspect_err(|e| {
                error!(stream = %spec.name, error = %e, "listing streams failed, topology partially applied");
            })?;

            match existing.iter().find(|info| info.name() == spec.name) {
                None => {
                    self.management.create_stream(spec).await.inspect_err(|e| {
                        error!(stream = %spec.name, error = %e, "creating stream failed");
                    })?;
                    info!(stream = %spec.name, subjects = ?spec.subjects, "created stream");
                    pass.created.push(spec.name.clone());

                    if self.create_mode == StreamCreateMode::StopAfterCreate {
                        pass.skipped = specs[index + 1..].iter().map(|s| s.name.clone()).collect();
                        if !pass.skipped.is_empty() {
                            info!(remaining = ?pass.skipped, "stopping stream pass after create");
                        }
                        return Ok(pass);
                    }
                }
                Some(found) => {
                    let merged = spec.overlay_onto(&found.config);
                    self.management
                        .update_stream(&found.config.name, &merged)
                        .await
                        .inspect_err(|e| {
                            error!(stream = %spec.name, error = %e, "updating stream failed");
                        })?;
                    debug!(stream = %spec.name, "updated stream");
                    pass.updated.push(spec.name.clone());
                }
            }
        }

        Ok(pass)
    }

    /// Creates or overwrites each consumer in `specs` on `stream`, in order.
    pub async fn reconcile_consumers(
        &self,
        stream: &str,
        specs: &[ConsumerSpec],
    ) -> Result<ConsumerPass, ManagementError> {
        let mut pass = ConsumerPass::default();

        for spec in specs {
            let existing = self.management.list_consumers(stream).await.inspect_err(|e| {
                error!(stream, error = %e, "listing consumers failed, topology partially applied");
            })?;

            match (spec.key(), find_consumer(&existing, spec)) {
                (Some(key), Some(_)) => {
                    self.management
                        .update_consumer(stream, key, spec)
                        .await
                        .inspect_err(|e| {
                            error!(stream, consumer = key, error = %e, "updating consumer failed");
                        })?;
                    debug!(stream, consumer = key, "updated consumer");
                    pass.updated.push(key.to_string());
                }
                (key, _) => {
                    let label = key.unwrap_or("<ephemeral>");
                    self.management
                        .create_consumer(stream, spec)
                        .await
                        .inspect_err(|e| {
                            error!(stream, consumer = label, error = %e, "creating consumer failed");
                        })?;
                    info!(stream, consumer = label, filter = ?spec.filter_subject, "created consumer");
                    pass.created.push(label.to_string());
                }
            }
        }

        Ok(pass)
    }

    pub async fn streams(&self) -> Result<Vec<StreamInfo>, ManagementError> {
        self.management.list_streams().await
    }

    pub async fn consumer(&self, stream: &str, durable: &str) -> Result<ConsumerInfo, ManagementError> {
        self.management.consumer_info(stream, durable).await
    }

    pub async fn consumers(&self, stream: &str) -> Result<Vec<ConsumerInfo>, ManagementError> {
        self.management.list_consumers(stream).await
    }

    /// Deletes a stream. Never called by reconciliation.
    pub async fn delete_stream(&self, name: &str) -> Result<(), ManagementError> {
        self.management.delete_stream(name).await?;
        info!(stream = name, "deleted stream");
        Ok(())
    }

    /// Deletes a consumer. Never called by reconciliation.
    pub async fn delete_consumer(&self, stream: &str, consumer: &str) -> Result<(), ManagementError> {
        self.management.delete_consumer(stream, consumer).await?;
        info!(stream, consumer, "deleted consumer");
        Ok(())
    }
}

/// Looks up the broker-side consumer `spec` refers to.
///
/// The durable name decides when it is set; `name` is only a fallback for
/// specs without one. Specs with neither never match.
pub fn find_consumer<'a>(existing: &'a [ConsumerInfo], spec: &ConsumerSpec) -> Option<&'a ConsumerInfo> {
    let key = spec.key()?;
    existing.iter().find(|info| info.is_keyed_by(key))
}
