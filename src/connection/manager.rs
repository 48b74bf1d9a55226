//! Connection lifecycle
//!
//! `ConnectionManager` owns the single broker session of the process. The
//! first successful `connect` opens the session, runs the connected hook,
//! stores the management and data-plane handles, and reconciles the
//! configured topology. Every later `connect` is a no-op until `shutdown`.
//!
//! `connect`, `reconcile` and `shutdown` share one async lock, so concurrent
//! triggers run one after the other instead of racing topology writes.

use tokio::sync::{Mutex, watch};
use tracing::{debug, error, info, warn};

use super::transport::{ConnectedHook, Connection, Transport};
use crate::config::ConnectionSettings;
use crate::reconcile::{Reconciler, StreamCreateMode};
use crate::topology::Topology;
use crate::utils::error::{BoxError, ConnectionError, Result, TopologyError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unconnected,
    Connecting,
    Connected,
}

struct Session<C: Connection> {
    connection: C,
    management: C::Management,
    data_plane: C::DataPlane,
}

/// Publishes `Connecting` for one connect attempt. Unless the attempt
/// finishes, dropping it (error return or a cancelled future) puts the state
/// back to `Unconnected`.
struct Connecting<'a> {
    state: &'a watch::Sender<ConnectionState>,
    done: bool,
}

impl<'a> Connecting<'a> {
    fn begin(state: &'a watch::Sender<ConnectionState>) -> Self {
        state.send_replace(ConnectionState::Connecting);
        Self { state, done: false }
    }

    fn finish(mut self) {
        self.state.send_replace(ConnectionState::Connected);
        self.done = true;
    }
}

impl Drop for Connecting<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.state.send_replace(ConnectionState::Unconnected);
        }
    }
}

pub type ManagementOf<T> = <<T as Transport>::Connection as Connection>::Management;
pub type DataPlaneOf<T> = <<T as Transport>::Connection as Connection>::DataPlane;

pub struct ConnectionManager<T: Transport> {
    transport: T,
    settings: ConnectionSettings,
    topology: Topology,
    create_mode: StreamCreateMode,
    connected_hook: Option<ConnectedHook<T::Connection>>,
    session: Mutex<Option<Session<T::Connection>>>,
    state: watch::Sender<ConnectionState>,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: T, settings: ConnectionSettings, topology: Topology) -> Self {
        Self {
            transport,
            settings,
            topology,
            create_mode: StreamCreateMode::default(),
            connected_hook: None,
            session: Mutex::new(None),
            state: watch::Sender::new(ConnectionState::Unconnected),
        }
    }

    /// Like `new`, but rejects a topology that fails `Topology::validate`.
    pub fn validated(
        transport: T,
        settings: ConnectionSettings,
        topology: Topology,
    ) -> Result<Self, TopologyError> {
        topology.validate()?;
        Ok(Self::new(transport, settings, topology))
    }

    pub fn with_create_mode(mut self, create_mode: StreamCreateMode) -> Self {
        self.create_mode = create_mode;
        self
    }

    /// Registers a callback run once with the fresh connection, before any
    /// reconciliation. An error from it fails `connect`.
    pub fn with_connected_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&T::Connection) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    {
        self.connected_hook = Some(std::sync::Arc::new(hook));
        self
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Opens the broker session and reconciles the topology.
    ///
    /// Returns immediately when a session already exists. A failed or
    /// cancelled connection attempt leaves the manager `Unconnected` and
    /// issues no management calls. A failed reconciliation leaves the session
    /// `Connected`.
    ///
    /// The topology is used as given; validate it first with
    /// `Topology::validate` or build the manager with `ConnectionManager::validated`.
    pub async fn connect(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        if session.is_some() {
            debug!("already connected, skipping connect");
            return Ok(());
        }

        let connecting = Connecting::begin(&self.state);
        let servers = self.settings.servers.join(",");
        info!(servers = %servers, "connecting to broker");

        let connection = match self.transport.connect(&self.settings).await {
            Ok(connection) => connection,
            Err(source) => {
                error!(servers = %servers, error = %source, "broker connection failed");
                return Err(ConnectionError::Transport { servers, source }.into());
            }
        };

        if let Some(hook) = &self.connected_hook {
            if let Err(e) = hook(&connection) {
                if let Err(close_err) = connection.close().await {
                    warn!(error = %close_err, "closing connection after hook failure");
                }
                error!(error = %e, "connected hook failed");
                return Err(ConnectionError::Hook(e).into());
            }
        }

        let current = session.insert(Session {
            management: connection.management(),
            data_plane: connection.data_plane(),
            connection,
        });
        connecting.finish();
        info!(servers = %servers, "connected to broker");

        self.reconciler_for(&current.management)
            .apply(&self.topology)
            .await?;
        info!(streams = self.topology.streams.len(), "topology reconciled");

        Ok(())
    }

    /// Runs another full reconciliation pass over the open session.
    pub async fn reconcile(&self) -> Result<()> {
        let session = self.session.lock().await;
        let current = session.as_ref().ok_or(ConnectionError::NotConnected)?;

        self.reconciler_for(&current.management)
            .apply(&self.topology)
            .await?;
        Ok(())
    }

    /// A reconciler over the open session, for inspection and deletes.
    pub async fn reconciler(&self) -> Result<Reconciler<ManagementOf<T>>, ConnectionError> {
        let session = self.session.lock().await;
        let current = session.as_ref().ok_or(ConnectionError::NotConnected)?;
        Ok(self.reconciler_for(&current.management))
    }

    pub async fn management(&self) -> Option<ManagementOf<T>> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|s| s.management.clone())
    }

    pub async fn data_plane(&self) -> Option<DataPlaneOf<T>> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|s| s.data_plane.clone())
    }

    /// Closes the session, if any, and returns to `Unconnected`.
    pub async fn shutdown(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        let Some(current) = session.take() else {
            return Ok(());
        };

        let closed = current.connection.close().await;
        self.state.send_replace(ConnectionState::Unconnected);

        match closed {
            Ok(()) => {
                info!("broker connection closed");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "broker connection closed with error");
                Err(ConnectionError::Transport {
                    servers: self.settings.servers.join(","),
                    source: e,
                }
                .into())
            }
        }
    }

    /// Shuts down after a unit of work, whatever its outcome. The work's own
    /// error wins over a shutdown error.
    pub async fn shutdown_after<R>(&self, outcome: Result<R>) -> Result<R> {
        let closed = self.shutdown().await;
        match outcome {
            Ok(value) => closed.map(|()| value),
            Err(e) => {
                if let Err(close_err) = closed {
                    warn!(error = %close_err, "shutdown after failure also failed");
                }
                Err(e)
            }
        }
    }

    fn reconciler_for(&self, management: &ManagementOf<T>) -> Reconciler<ManagementOf<T>> {
        Reconciler::new(management.clone()).with_create_mode(self.create_mode)
    }
}
