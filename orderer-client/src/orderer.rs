//! Client handle for one orderer endpoint.

use {
    crate::{
        broadcast::BroadcastInvoker,
        config::NetworkConfig,
        connection::{ConnectionManager, Connector, GrpcConnector},
        deliver::{DeliverSession, DeliverStreamer},
        descriptor::{EndpointConfig, EndpointDescriptor},
        error::{ConfigError, Result},
        logging::Logger,
        message::{BroadcastResult, SignedEnvelope},
    },
    std::fmt,
};

/// Broadcasts envelopes to, and delivers blocks from, a single orderer.
///
/// Every call dials its own connection and releases it before returning (or,
/// for deliver, when the session ends), so an `Orderer` can be shared freely
/// between tasks.
pub struct Orderer<C: Connector = GrpcConnector> {
    descriptor: EndpointDescriptor,
    connections: ConnectionManager<C>,
}

impl Orderer {
    pub fn new(descriptor: EndpointDescriptor) -> Self {
        Self::with_connector(descriptor, GrpcConnector)
    }

    pub fn from_config(config: EndpointConfig) -> std::result::Result<Self, ConfigError> {
        Ok(Self::new(EndpointDescriptor::new(config)?))
    }

    /// The orderer called `name` in `network`.
    pub fn from_network_config(
        network: &NetworkConfig,
        name: &str,
    ) -> std::result::Result<Self, ConfigError> {
        Ok(Self::new(network.endpoint(name)?))
    }
}

impl<C: Connector> Orderer<C> {
    pub fn with_connector(descriptor: EndpointDescriptor, connector: C) -> Self {
        Self {
            descriptor,
            connections: ConnectionManager::new(connector),
        }
    }

    /// Send client diagnostics to `logger` instead of the global `log`
    /// backend.
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.connections = self.connections.with_logger(logger);
        self
    }

    /// The `host:port` address this client dials.
    pub fn url(&self) -> &str {
        self.descriptor.address()
    }

    pub fn descriptor(&self) -> &EndpointDescriptor {
        &self.descriptor
    }

    /// Submit a signed envelope for ordering.
    ///
    /// Returns once the orderer answered with a status.  A non-success status
    /// is an [`OrdererError::ServerStatus`](crate::error::OrdererError::ServerStatus).
    pub async fn send_broadcast(&self, envelope: &SignedEnvelope) -> Result<BroadcastResult> {
        BroadcastInvoker::new(&self.connections, &self.descriptor)
            .invoke(envelope)
            .await
    }

    /// Request the blocks selected by a signed seek envelope.
    pub async fn send_deliver(&self, envelope: &SignedEnvelope) -> DeliverSession {
        DeliverStreamer::new(&self.connections, &self.descriptor)
            .invoke(envelope)
            .await
    }
}

impl<C: Connector> fmt::Debug for Orderer<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orderer")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}
