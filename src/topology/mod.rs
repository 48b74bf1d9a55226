//! The `topology` module describes what the broker should look like.
//!
//! Streams and consumers are plain values supplied by configuration. Nothing
//! here talks to a broker; the `reconcile` module turns these descriptors into
//! create and update calls.

pub mod consumer;
pub mod stream;

use std::collections::HashSet;

use serde::Deserialize;

use crate::utils::error::TopologyError;

pub use consumer::{AckPolicy, ConsumerInfo, ConsumerSpec, DeliverPolicy};
pub use stream::{RetentionPolicy, StorageType, StreamInfo, StreamSpec, StreamState};

/// A stream together with the consumers that should be attached to it.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct StreamTopology {
    #[serde(flatten)]
    pub stream: StreamSpec,

    #[serde(default)]
    pub consumers: Vec<ConsumerSpec>,
}

impl StreamTopology {
    pub fn new(stream: StreamSpec) -> Self {
        Self {
            stream,
            consumers: Vec::new(),
        }
    }

    pub fn with_consumer(mut self, consumer: ConsumerSpec) -> Self {
        self.consumers.push(consumer);
        self
    }
}

/// The full desired state, in reconciliation order.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Topology {
    #[serde(default)]
    pub streams: Vec<StreamTopology>,
}

impl Topology {
    pub fn new(streams: Vec<StreamTopology>) -> Self {
        Self { streams }
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn stream_specs(&self) -> Vec<StreamSpec> {
        self.streams.iter().map(|s| s.stream.clone()).collect()
    }

    /// Checks the descriptors for mistakes the broker would only report one
    /// call at a time. Whether a filter subject falls inside its stream's
    /// subjects is left to the broker.
    pub fn validate(&self) -> Result<(), TopologyError> {
        let mut stream_names = HashSet::new();

        for entry in &self.streams {
            let stream = &entry.stream;
            if stream.name.trim().is_empty() {
                return Err(TopologyError::EmptyStreamName);
            }
            if stream.subjects.is_empty() {
                return Err(TopologyError::NoSubjects(stream.name.clone()));
            }
            if !stream_names.insert(stream.name.as_str()) {
                return Err(TopologyError::DuplicateStream(stream.name.clone()));
            }

            let mut keys = HashSet::new();
            for consumer in &entry.consumers {
                if let Some(key) = consumer.key() {
                    if !keys.insert(key) {
                        return Err(TopologyError::DuplicateConsumer {
                            stream: stream.name.clone(),
                            consumer: key.to_string(),
                        });
                    }
                }
                validate_start_position(&stream.name, consumer)?;
            }
        }

        Ok(())
    }
}

fn validate_start_position(stream: &str, consumer: &ConsumerSpec) -> Result<(), TopologyError> {
    let missing = match consumer.deliver_policy {
        Some(DeliverPolicy::ByStartSequence) if consumer.opt_start_seq.is_none() => {
            Some("opt_start_seq")
        }
        Some(DeliverPolicy::ByStartTime) if consumer.opt_start_time.is_none() => {
            Some("opt_start_time")
        }
        _ => None,
    };

    match missing {
        Some(field) => Err(TopologyError::MissingStartPosition {
            stream: stream.to_string(),
            consumer: consumer.key().unwrap_or("<ephemeral>").to_string(),
            field,
        }),
        None => Ok(()),
    }
}
