//! Dialing orderer connections and opening `AtomicBroadcast` streams on them.
//!
//! The transport sits behind the [`Connector`] trait.  [`GrpcConnector`] is
//! the production implementation and dials a tonic [`Channel`]; tests plug in
//! a scripted connector instead.
//!
//! Every successful dial hands out a [`ConnectionGuard`].  The guard releases
//! its connection back to the connector exactly once, either explicitly via
//! [`ConnectionGuard::release`] or when it is dropped, which covers error
//! returns and cancelled futures alike.
//!
//! ## Streams
//!
//! Both RPCs are bidirectional.  Opening one yields a [`DuplexStream`]: a
//! capacity-one envelope sender and a stream of responses.  Dropping the
//! sender half-closes the request side.

use {
    crate::{
        descriptor::EndpointDescriptor,
        error::{DialError, OrdererError, Result},
        logging::Logger,
    },
    async_trait::async_trait,
    futures::{stream::BoxStream, StreamExt, TryFutureExt},
    orderer_proto::{AtomicBroadcastClient, BroadcastResponse, DeliverResponse, Envelope},
    std::{fmt, sync::Arc, time::Duration},
    tokio::sync::mpsc,
    tokio_stream::wrappers::ReceiverStream,
    tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint, Identity},
};

/// Inbound half of an open stream.
pub type ResponseStream<T> = BoxStream<'static, std::result::Result<T, tonic::Status>>;

/// An open bidirectional stream.
pub struct DuplexStream<T> {
    /// Outbound envelopes.  Holds at most one unsent envelope.
    pub sender: mpsc::Sender<Envelope>,
    pub responses: ResponseStream<T>,
}

impl<T> fmt::Debug for DuplexStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DuplexStream")
            .field("sender", &self.sender)
            .finish_non_exhaustive()
    }
}

/// A dialed connection to an orderer.
#[async_trait]
pub trait OrdererConnection: Send + 'static {
    async fn open_broadcast(
        &mut self,
    ) -> std::result::Result<DuplexStream<BroadcastResponse>, tonic::Status>;

    async fn open_deliver(
        &mut self,
    ) -> std::result::Result<DuplexStream<DeliverResponse>, tonic::Status>;
}

/// Dials and releases connections.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Connection: OrdererConnection;

    /// Dial `descriptor`, with TLS when `secured` is true and in the clear
    /// otherwise.
    async fn dial(
        &self,
        descriptor: &EndpointDescriptor,
        secured: bool,
    ) -> std::result::Result<Self::Connection, DialError>;

    /// Close a connection obtained from [`Connector::dial`].
    fn release(&self, connection: Self::Connection);
}

/// Dials orderers through tonic.
#[derive(Debug, Clone, Copy, Default)]
pub struct GrpcConnector;

impl GrpcConnector {
    /// The tonic endpoint for `descriptor` in the given security mode.
    pub fn endpoint(
        descriptor: &EndpointDescriptor,
        secured: bool,
    ) -> std::result::Result<Endpoint, tonic::transport::Error> {
        let scheme = if secured { "https" } else { "http" };
        let mut endpoint = Endpoint::from_shared(format!("{scheme}://{}", descriptor.address()))?
            .connect_timeout(descriptor.dial_timeout());

        let keep_alive = descriptor.keep_alive();
        if keep_alive.is_enabled() {
            endpoint = endpoint
                .http2_keep_alive_interval(keep_alive.time)
                .keep_alive_while_idle(keep_alive.permit_without_stream);
            if !keep_alive.timeout.is_zero() {
                endpoint = endpoint.keep_alive_timeout(keep_alive.timeout);
            }
        }

        if secured {
            endpoint = endpoint.tls_config(Self::tls_config(descriptor))?;
        }
        Ok(endpoint)
    }

    fn tls_config(descriptor: &EndpointDescriptor) -> ClientTlsConfig {
        let mut tls = ClientTlsConfig::new();
        if let Some(ca_cert) = descriptor.tls_ca_cert() {
            tls = tls.ca_certificate(Certificate::from_pem(ca_cert));
        }
        if let Some(identity) = descriptor.client_identity() {
            tls = tls.identity(Identity::from_pem(&identity.cert_pem, &identity.key_pem));
        }
        if let Some(server_name) = descriptor.server_name_override() {
            tls = tls.domain_name(server_name);
        }
        tls
    }
}

#[async_trait]
impl Connector for GrpcConnector {
    type Connection = GrpcConnection;

    async fn dial(
        &self,
        descriptor: &EndpointDescriptor,
        secured: bool,
    ) -> std::result::Result<GrpcConnection, DialError> {
        // Connect eagerly whatever `fail_fast` says: handshake failures are
        // dial errors.  Tonic calls have no wait-for-ready mode.
        let channel = Self::endpoint(descriptor, secured)?.connect().await?;
        Ok(GrpcConnection {
            client: AtomicBroadcastClient::new(channel),
        })
    }

    fn release(&self, connection: GrpcConnection) {
        // The channel closes once its last handle is gone.
        drop(connection);
    }
}

/// A tonic channel to one orderer.
#[derive(Debug, Clone)]
pub struct GrpcConnection {
    client: AtomicBroadcastClient<Channel>,
}

#[async_trait]
impl OrdererConnection for GrpcConnection {
    async fn open_broadcast(
        &mut self,
    ) -> std::result::Result<DuplexStream<BroadcastResponse>, tonic::Status> {
        let (sender, receiver) = mpsc::channel(1);
        let mut client = self.client.clone();
        // The call starts on the first poll of `responses`.  Some servers
        // hold back response headers until the first envelope arrives, so the
        // envelope has to be queued before the call is awaited.
        let responses = async move {
            client
                .broadcast(ReceiverStream::new(receiver))
                .await
                .map(tonic::Response::into_inner)
        }
        .try_flatten_stream()
        .boxed();
        Ok(DuplexStream { sender, responses })
    }

    async fn open_deliver(
        &mut self,
    ) -> std::result::Result<DuplexStream<DeliverResponse>, tonic::Status> {
        let (sender, receiver) = mpsc::channel(1);
        let mut client = self.client.clone();
        let responses = async move {
            client
                .deliver(ReceiverStream::new(receiver))
                .await
                .map(tonic::Response::into_inner)
        }
        .try_flatten_stream()
        .boxed();
        Ok(DuplexStream { sender, responses })
    }
}

/// Dials connections with a bounded timeout and wraps them in guards.
pub struct ConnectionManager<C> {
    connector: Arc<C>,
    logger: Logger,
}

impl<C> Clone for ConnectionManager<C> {
    fn clone(&self) -> Self {
        Self {
            connector: Arc::clone(&self.connector),
            logger: self.logger.clone(),
        }
    }
}

impl<C> fmt::Debug for ConnectionManager<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("logger", &self.logger)
            .finish_non_exhaustive()
    }
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector: Arc::new(connector),
            logger: Logger::default(),
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    pub(crate) fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Dial `descriptor`, failing with a connection error if the dial does not
    /// finish within `timeout`.
    pub async fn dial(
        &self,
        descriptor: &EndpointDescriptor,
        secured: bool,
        timeout: Duration,
    ) -> Result<ConnectionGuard<C>> {
        let address = descriptor.address();
        self.logger.debug(format_args!(
            "dialing orderer {address} (secured: {secured}, timeout: {timeout:?})"
        ));

        let dialed = tokio::time::timeout(timeout, self.connector.dial(descriptor, secured)).await;
        let connection = match dialed {
            Ok(Ok(connection)) => connection,
            Ok(Err(err)) => {
                let err = OrdererError::connection_failed(address, &*err);
                self.logger.error(format_args!("{err}"));
                return Err(err);
            }
            Err(_) => {
                let err = OrdererError::dial_timeout(address, timeout);
                self.logger.error(format_args!("{err}"));
                return Err(err);
            }
        };

        Ok(ConnectionGuard {
            connector: Arc::clone(&self.connector),
            connection: Some(connection),
            address: address.to_string(),
            logger: self.logger.clone(),
        })
    }
}

/// Releases its connection back to the connector exactly once.
pub struct ConnectionGuard<C: Connector> {
    connector: Arc<C>,
    connection: Option<C::Connection>,
    address: String,
    logger: Logger,
}

impl<C: Connector> ConnectionGuard<C> {
    pub fn address(&self) -> &str {
        &self.address
    }

    pub async fn open_broadcast(
        &mut self,
    ) -> std::result::Result<DuplexStream<BroadcastResponse>, tonic::Status> {
        match self.connection.as_mut() {
            Some(connection) => connection.open_broadcast().await,
            None => Err(released()),
        }
    }

    pub async fn open_deliver(
        &mut self,
    ) -> std::result::Result<DuplexStream<DeliverResponse>, tonic::Status> {
        match self.connection.as_mut() {
            Some(connection) => connection.open_deliver().await,
            None => Err(released()),
        }
    }

    /// Release the connection now rather than at end of scope.
    pub fn release(self) {
        drop(self);
    }
}

impl<C: Connector> Drop for ConnectionGuard<C> {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.logger
                .debug(format_args!("releasing connection to {}", self.address));
            self.connector.release(connection);
        }
    }
}

impl<C: Connector> fmt::Debug for ConnectionGuard<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionGuard")
            .field("address", &self.address)
            .field("released", &self.connection.is_none())
            .finish_non_exhaustive()
    }
}

fn released() -> tonic::Status {
    tonic::Status::unavailable("connection already released")
}
