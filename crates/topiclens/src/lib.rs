pub mod admin;
pub mod cancel;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod metadata;
pub mod publisher;
pub mod reader;
pub mod telemetry;
pub mod types;

pub use admin::TopicAdmin;
pub use cancel::{CancelHandle, CancelSignal, cancel_pair};
pub use config::{ConfigError, Settings, SettingsBuilder};
pub use connection::Connection;
pub use error::{ClientError, ClientErrorKind, ErrorKind, LensError};
pub use metadata::MetadataAggregator;
pub use publisher::Publisher;
pub use reader::{MessageWindow, StopReason, WindowError, WindowReader, WindowRequest};
pub use types::*;

// Re-export logging macros for consistent usage across the crate
pub use log::{debug, error, info, trace, warn};

use client::ClusterClient;
use std::sync::Arc;
use std::time::Duration;

/// Every operation of the facade, sharing one cluster connection.
#[derive(Clone)]
pub struct TopicLens {
    pub metadata: MetadataAggregator,
    pub admin: TopicAdmin,
    pub reader: WindowReader,
    pub publisher: Publisher,
    connection: Connection,
}

impl TopicLens {
    pub fn new(connection: Connection) -> Self {
        Self {
            metadata: MetadataAggregator::new(connection.clone()),
            admin: TopicAdmin::new(connection.clone()),
            reader: WindowReader::new(connection.clone()),
            publisher: Publisher::new(connection.clone()),
            connection,
        }
    }

    /// Connects to the brokers named in `settings`.
    pub fn connect(settings: &Settings) -> Result<Self, LensError> {
        let connection = Connection::connect(settings.brokers.clone(), settings.kafka_timeout)?;
        Ok(Self::new(connection))
    }

    pub fn with_client(client: Arc<dyn ClusterClient>, timeout: Duration) -> Self {
        Self::new(Connection::with_client(client, timeout))
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }
}
