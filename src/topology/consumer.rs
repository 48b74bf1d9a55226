use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Whether and how a consumer must acknowledge messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckPolicy {
    None,
    All,
    Explicit,
}

/// Where in the stream a new consumer starts reading.
///
/// `ByStartSequence` and `ByStartTime` take their position from
/// `ConsumerSpec::opt_start_seq` and `ConsumerSpec::opt_start_time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliverPolicy {
    All,
    Last,
    New,
    ByStartSequence,
    ByStartTime,
    LastPerSubject,
}

/// Desired definition of a durable consumer.
///
/// A consumer is identified by `durable_name`; `name` is only consulted when
/// no durable name is given. Updates overwrite the broker's configuration
/// with this value as a whole.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConsumerSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub durable_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_subject: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack_policy: Option<AckPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deliver_policy: Option<DeliverPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opt_start_seq: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opt_start_time: Option<DateTime<Utc>>,

    /// Redelivery timeout in nanoseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack_wait: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_deliver: Option<i64>,

    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

impl ConsumerSpec {
    pub fn durable(durable_name: impl Into<String>) -> Self {
        Self {
            durable_name: Some(durable_name.into()),
            ..Default::default()
        }
    }

    pub fn filter_subject(mut self, subject: impl Into<String>) -> Self {
        self.filter_subject = Some(subject.into());
        self
    }

    pub fn ack_policy(mut self, policy: AckPolicy) -> Self {
        self.ack_policy = Some(policy);
        self
    }

    pub fn deliver_policy(mut self, policy: DeliverPolicy) -> Self {
        self.deliver_policy = Some(policy);
        self
    }

    pub fn ack_wait(mut self, nanos: u64) -> Self {
        self.ack_wait = Some(nanos);
        self
    }

    /// The key the broker files this consumer under: the durable name, or the
    /// plain name when no durable name is set. Ephemeral specs have neither.
    pub fn key(&self) -> Option<&str> {
        self.durable_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .or_else(|| self.name.as_deref().filter(|name| !name.is_empty()))
    }
}

/// A consumer as the broker currently sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumerInfo {
    pub stream_name: String,
    pub name: String,
    pub created: DateTime<Utc>,
    pub config: ConsumerSpec,
    #[serde(default)]
    pub num_pending: u64,
    #[serde(default)]
    pub num_ack_pending: usize,
}

impl ConsumerInfo {
    /// True if the broker files this consumer under `key`, either as its
    /// persisted name or as its configured durable name.
    pub fn is_keyed_by(&self, key: &str) -> bool {
        self.name == key || self.config.durable_name.as_deref() == Some(key)
    }
}
