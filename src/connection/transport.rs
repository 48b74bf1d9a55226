use std::sync::Arc;

use async_nats::jetstream;
use async_trait::async_trait;
use tracing::debug;

use crate::config::ConnectionSettings;
use crate::management::{Management, NatsManagement};
use crate::utils::error::BoxError;

/// Opens connections to a broker.
#[async_trait]
pub trait Transport: Send + Sync {
    type Connection: Connection;

    async fn connect(&self, settings: &ConnectionSettings) -> Result<Self::Connection, BoxError>;
}

/// A live broker session and the handles derived from it.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    type Management: Management + Clone + 'static;
    type DataPlane: Clone + Send + Sync + 'static;

    fn management(&self) -> Self::Management;

    fn data_plane(&self) -> Self::DataPlane;

    /// Flushes pending traffic and releases the session.
    async fn close(&self) -> Result<(), BoxError>;
}

/// Callback run once, right after a connection opens.
pub type ConnectedHook<C> = Arc<dyn Fn(&C) -> Result<(), BoxError> + Send + Sync>;

/// Connects to NATS servers with JetStream enabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NatsTransport;

pub struct NatsConnection {
    client: async_nats::Client,
    jetstream: jetstream::Context,
    settings: ConnectionSettings,
}

impl NatsConnection {
    pub fn client(&self) -> &async_nats::Client {
        &self.client
    }
}

#[async_trait]
impl Transport for NatsTransport {
    type Connection = NatsConnection;

    async fn connect(&self, settings: &ConnectionSettings) -> Result<NatsConnection, BoxError> {
        let mut options = async_nats::ConnectOptions::new()
            .name(&settings.client_name())
            .connection_timeout(settings.connect_timeout())
            .request_timeout(Some(settings.request_timeout()));

        if let (Some(user), Some(password)) = (&settings.user, &settings.password) {
            options = options.user_and_password(user.clone(), password.clone());
        }
        if let Some(token) = &settings.token {
            options = options.token(token.clone());
        }
        if let Some(path) = &settings.credentials_file {
            options = options.credentials_file(path).await?;
        }

        let servers = settings.servers.join(",");
        let client = options.connect(servers.as_str()).await?;
        debug!(servers = %servers, "nats client connected");

        let jetstream = match &settings.jetstream_domain {
            Some(domain) => jetstream::with_domain(client.clone(), domain),
            None => jetstream::new(client.clone()),
        };

        Ok(NatsConnection {
            client,
            jetstream,
            settings: settings.clone(),
        })
    }
}

#[async_trait]
impl Connection for NatsConnection {
    type Management = NatsManagement;
    type DataPlane = jetstream::Context;

    fn management(&self) -> NatsManagement {
        NatsManagement::new(self.jetstream.clone(), self.settings.request_timeout())
    }

    fn data_plane(&self) -> jetstream::Context {
        self.jetstream.clone()
    }

    async fn close(&self) -> Result<(), BoxError> {
        self.client.flush().await?;
        Ok(())
    }
}
