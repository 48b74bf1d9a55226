use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How long a stream keeps messages around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Messages are kept until a size, count or age limit is hit.
    Limits,
    /// Messages are kept until every interested consumer has acknowledged them.
    Interest,
    /// Messages are removed as soon as one consumer acknowledges them.
    #[serde(rename = "workqueue")]
    WorkQueue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageType {
    File,
    Memory,
}

/// Desired definition of a stream.
///
/// Only `name` and `subjects` are required. Every other field is optional and,
/// when left unset, keeps whatever value the broker already holds. Fields the
/// crate does not model explicitly go through `other` using the broker's own
/// JSON field names (for example `duplicate_window` or `discard`).
///
/// The same type is used for the configuration a broker reports back, in which
/// case `other` carries the broker-managed fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StreamSpec {
    pub name: String,

    #[serde(default)]
    pub subjects: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention: Option<RetentionPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageType>,

    /// Maximum message age in nanoseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_msgs: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_bytes: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_replicas: Option<usize>,

    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

impl StreamSpec {
    pub fn new(name: impl Into<String>, subjects: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            subjects: subjects.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = Some(retention);
        self
    }

    /// Lays this spec over `current`, the configuration the broker already
    /// holds. Set fields win; unset fields and unknown broker keys survive.
    pub fn overlay_onto(&self, current: &StreamSpec) -> StreamSpec {
        let mut merged = current.clone();

        merged.name = self.name.clone();
        if !self.subjects.is_empty() {
            merged.subjects = self.subjects.clone();
        }
        overlay(&mut merged.retention, self.retention);
        overlay(&mut merged.description, self.description.clone());
        overlay(&mut merged.storage, self.storage);
        overlay(&mut merged.max_age, self.max_age);
        overlay(&mut merged.max_msgs, self.max_msgs);
        overlay(&mut merged.max_bytes, self.max_bytes);
        overlay(&mut merged.num_replicas, self.num_replicas);

        for (key, value) in &self.other {
            merged.other.insert(key.clone(), value.clone());
        }

        merged
    }
}

fn overlay<T>(target: &mut Option<T>, desired: Option<T>) {
    if desired.is_some() {
        *target = desired;
    }
}

/// Counters the broker reports for a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreamState {
    pub messages: u64,
    pub bytes: u64,
    pub first_seq: u64,
    pub last_seq: u64,
    pub consumer_count: usize,
}

/// A stream as the broker currently sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub config: StreamSpec,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub state: StreamState,
}

impl StreamInfo {
    pub fn name(&self) -> &str {
        &self.config.name
    }
}
