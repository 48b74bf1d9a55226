use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use uuid::Uuid;

use crate::reconcile::StreamCreateMode;
use crate::topology::Topology;

/// Top-level configuration settings for the application.
///
/// Includes the broker connection, reconciliation behaviour, logging, and the
/// desired topology.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub connection: ConnectionSettings,
    pub reconcile: ReconcileSettings,
    pub logging: LoggingSettings,
    pub topology: Topology,
}

/// How to reach the broker.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ConnectionSettings {
    /// Client name reported to the broker. Empty means generate one.
    pub name: String,
    pub servers: Vec<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
    pub credentials_file: Option<PathBuf>,
    pub connect_timeout_secs: u64,
    /// Upper bound for every management round-trip.
    pub request_timeout_secs: u64,
    pub jetstream_domain: Option<String>,
}

impl ConnectionSettings {
    pub fn client_name(&self) -> String {
        if self.name.trim().is_empty() {
            format!("streamsync-{}", Uuid::new_v4())
        } else {
            self.name.clone()
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ReconcileSettings {
    pub stream_create_mode: StreamCreateMode,
    /// Consumer fetched and logged after reconciliation.
    pub probe_consumer: Option<ConsumerProbe>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ConsumerProbe {
    pub stream: String,
    pub consumer: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggingSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Missing values are filled from `Settings::default()`.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub connection: Option<PartialConnectionSettings>,
    pub reconcile: Option<PartialReconcileSettings>,
    pub logging: Option<PartialLoggingSettings>,
    pub topology: Option<Topology>,
}

#[derive(Debug, Deserialize)]
pub struct PartialConnectionSettings {
    pub name: Option<String>,
    pub servers: Option<Vec<String>>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
    pub credentials_file: Option<PathBuf>,
    pub connect_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub jetstream_domain: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialReconcileSettings {
    pub stream_create_mode: Option<StreamCreateMode>,
    pub probe_consumer: Option<ConsumerProbe>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            connection: ConnectionSettings {
                name: String::new(),
                servers: vec!["localhost:4222".to_string()],
                user: None,
                password: None,
                token: None,
                credentials_file: None,
                connect_timeout_secs: 5,
                request_timeout_secs: 10,
                jetstream_domain: None,
            },
            reconcile: ReconcileSettings {
                stream_create_mode: StreamCreateMode::StopAfterCreate,
                probe_consumer: None,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
            },
            topology: Topology::default(),
        }
    }
}

impl PartialSettings {
    /// Fills every missing value from `default`.
    pub fn merge_onto(self, default: Settings) -> Settings {
        let connection = match self.connection {
            Some(c) => ConnectionSettings {
                name: c.name.unwrap_or(default.connection.name),
                servers: c.servers.unwrap_or(default.connection.servers),
                user: c.user.or(default.connection.user),
                password: c.password.or(default.connection.password),
                token: c.token.or(default.connection.token),
                credentials_file: c.credentials_file.or(default.connection.credentials_file),
                connect_timeout_secs: c
                    .connect_timeout_secs
                    .unwrap_or(default.connection.connect_timeout_secs),
                request_timeout_secs: c
                    .request_timeout_secs
                    .unwrap_or(default.connection.request_timeout_secs),
                jetstream_domain: c.jetstream_domain.or(default.connection.jetstream_domain),
            },
            None => default.connection,
        };

        let reconcile = match self.reconcile {
            Some(r) => ReconcileSettings {
                stream_create_mode: r
                    .stream_create_mode
                    .unwrap_or(default.reconcile.stream_create_mode),
                probe_consumer: r.probe_consumer.or(default.reconcile.probe_consumer),
            },
            None => default.reconcile,
        };

        let logging = LoggingSettings {
            level: self
                .logging
                .and_then(|l| l.level)
                .unwrap_or(default.logging.level),
        };

        Settings {
            connection,
            reconcile,
            logging,
            topology: self.topology.unwrap_or(default.topology),
        }
    }
}
