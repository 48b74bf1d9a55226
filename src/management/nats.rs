//! JetStream implementation of the management surface.
//!
//! Desired specs are translated into `async_nats` configuration by laying
//! their JSON over the client's default configuration, so fields left unset
//! keep the client's defaults and any extra broker field named in a spec is
//! passed through untouched. Broker replies go the other way.

use std::future::Future;
use std::time::Duration;

use async_nats::jetstream::{self, consumer, stream};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::Management;
use crate::topology::{ConsumerInfo, ConsumerSpec, StreamInfo, StreamSpec, StreamState};
use crate::utils::error::{BoxError, ManagementError};

/// Management handle backed by a JetStream context.
///
/// Every broker round-trip is bounded by `request_timeout`.
#[derive(Clone)]
pub struct NatsManagement {
    context: jetstream::Context,
    request_timeout: Duration,
}

impl NatsManagement {
    pub fn new(context: jetstream::Context, request_timeout: Duration) -> Self {
        Self {
            context,
            request_timeout,
        }
    }

    async fn call<T, E, F>(&self, operation: &'static str, fut: F) -> Result<T, ManagementError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<BoxError>,
    {
        debug!(operation, "jetstream request");
        bounded(operation, self.request_timeout, fut).await
    }
}

/// Awaits one broker request for at most `timeout`.
pub(crate) async fn bounded<T, E, F>(
    operation: &'static str,
    timeout: Duration,
    fut: F,
) -> Result<T, ManagementError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<BoxError>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result.map_err(|e| ManagementError::broker(operation, e)),
        Err(_) => Err(ManagementError::Timeout { operation, timeout }),
    }
}

#[async_trait]
impl Management for NatsManagement {
    async fn list_streams(&self) -> Result<Vec<StreamInfo>, ManagementError> {
        let infos = self
            .call(
                "list streams",
                self.context.streams().try_collect::<Vec<stream::Info>>(),
            )
            .await?;

        infos.iter().map(stream_info).collect()
    }

    async fn create_stream(&self, spec: &StreamSpec) -> Result<(), ManagementError> {
        let config: stream::Config = to_wire(spec, "stream config")?;
        self.call("create stream", self.context.create_stream(config))
            .await?;
        Ok(())
    }

    async fn update_stream(&self, name: &str, config: &StreamSpec) -> Result<(), ManagementError> {
        let mut wire: stream::Config = to_wire(config, "stream config")?;
        wire.name = name.to_string();
        self.call("update stream", self.context.update_stream(wire))
            .await?;
        Ok(())
    }

    async fn delete_stream(&self, name: &str) -> Result<(), ManagementError> {
        self.call("delete stream", self.context.delete_stream(name))
            .await?;
        Ok(())
    }

    async fn list_consumers(&self, stream: &str) -> Result<Vec<ConsumerInfo>, ManagementError> {
        let handle = self.call("get stream", self.context.get_stream(stream)).await?;
        let infos = self
            .call(
                "list consumers",
                handle.consumers().try_collect::<Vec<consumer::Info>>(),
            )
            .await?;

        infos.iter().map(consumer_info).collect()
    }

    async fn create_consumer(&self, stream: &str, spec: &ConsumerSpec) -> Result<(), ManagementError> {
        let config: consumer::Config = to_wire(spec, "consumer config")?;
        let handle = self.call("get stream", self.context.get_stream(stream)).await?;
        self.call("create consumer", handle.create_consumer(config))
            .await?;
        Ok(())
    }

    async fn update_consumer(
        &self,
        stream: &str,
        durable: &str,
        spec: &ConsumerSpec,
    ) -> Result<(), ManagementError> {
        let mut config: consumer::Config = to_wire(spec, "consumer config")?;
        if config.durable_name.is_none() && config.name.is_none() {
            config.durable_name = Some(durable.to_string());
        }
        let handle = self.call("get stream", self.context.get_stream(stream)).await?;
        self.call("update consumer", handle.update_consumer(config))
            .await?;
        Ok(())
    }

    async fn delete_consumer(&self, stream: &str, durable: &str) -> Result<(), ManagementError> {
        let handle = self.call("get stream", self.context.get_stream(stream)).await?;
        self.call("delete consumer", handle.delete_consumer(durable))
            .await?;
        Ok(())
    }

    async fn consumer_info(&self, stream: &str, durable: &str) -> Result<ConsumerInfo, ManagementError> {
        let handle = self.call("get stream", self.context.get_stream(stream)).await?;
        let info = self
            .call("consumer info", handle.consumer_info(durable))
            .await?;
        consumer_info(&info)
    }
}

/// Builds a client configuration from `desired` laid over `T::default()`.
pub(crate) fn to_wire<T>(desired: &impl Serialize, what: &'static str) -> Result<T, ManagementError>
where
    T: Serialize + DeserializeOwned + Default,
{
    let codec = |source| ManagementError::Codec { what, source };

    let mut base = serde_json::to_value(T::default()).map_err(codec)?;
    let overlay = serde_json::to_value(desired).map_err(codec)?;
    if let (Value::Object(base), Value::Object(overlay)) = (&mut base, overlay) {
        base.extend(overlay);
    }

    serde_json::from_value(base).map_err(codec)
}

pub(crate) fn from_wire<T>(wire: &impl Serialize, what: &'static str) -> Result<T, ManagementError>
where
    T: DeserializeOwned,
{
    serde_json::to_value(wire)
        .and_then(serde_json::from_value)
        .map_err(|source| ManagementError::Codec { what, source })
}

fn stream_info(info: &stream::Info) -> Result<StreamInfo, ManagementError> {
    Ok(StreamInfo {
        config: from_wire(&info.config, "stream info")?,
        created: DateTime::<Utc>::from_timestamp(
            info.created.unix_timestamp(),
            info.created.nanosecond(),
        )
        .unwrap_or_default(),
        state: StreamState {
            messages: info.state.messages,
            bytes: info.state.bytes,
            first_seq: info.state.first_sequence,
            last_seq: info.state.last_sequence,
            consumer_count: info.state.consumer_count,
        },
    })
}

fn consumer_info(info: &consumer::Info) -> Result<ConsumerInfo, ManagementError> {
    Ok(ConsumerInfo {
        stream_name: info.stream_name.clone(),
        name: info.name.clone(),
        created: DateTime::<Utc>::from_timestamp(
            info.created.unix_timestamp(),
            info.created.nanosecond(),
        )
        .unwrap_or_default(),
        config: from_wire(&info.config, "consumer info")?,
        num_pending: info.num_pending,
        num_ack_pending: info.num_ack_pending,
    })
}
