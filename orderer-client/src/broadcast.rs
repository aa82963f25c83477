//! Submitting a signed envelope over the `Broadcast` RPC.
//!
//! A call dials, opens the stream, hands the response side to a receiver task
//! and sends the envelope.  The receiver reports the first status it reads;
//! every status the orderer sends is terminal, so the call completes after
//! at most one response.  The connection is released on every exit path,
//! including cancellation of the calling future.

use {
    crate::{
        connection::{ConnectionManager, Connector, ResponseStream},
        descriptor::EndpointDescriptor,
        error::{OrdererError, Result},
        fallback::SecureFallbackPolicy,
        logging::Logger,
        message::{BroadcastResult, SignedEnvelope},
        worker::WorkerHandle,
    },
    futures::StreamExt,
    orderer_proto::{BroadcastResponse, Status},
    tokio::sync::oneshot,
};

pub struct BroadcastInvoker<'a, C> {
    connections: &'a ConnectionManager<C>,
    descriptor: &'a EndpointDescriptor,
}

impl<'a, C: Connector> BroadcastInvoker<'a, C> {
    pub fn new(connections: &'a ConnectionManager<C>, descriptor: &'a EndpointDescriptor) -> Self {
        Self {
            connections,
            descriptor,
        }
    }

    /// Submit `envelope` and wait for the orderer's verdict.
    pub async fn invoke(&self, envelope: &SignedEnvelope) -> Result<BroadcastResult> {
        SecureFallbackPolicy::for_endpoint(self.descriptor)
            .run(self.logger(), |secured| self.attempt(envelope, secured))
            .await
    }

    async fn attempt(&self, envelope: &SignedEnvelope, secured: bool) -> Result<BroadcastResult> {
        let mut connection = self
            .connections
            .dial(self.descriptor, secured, self.descriptor.dial_timeout())
            .await?;

        let stream = connection
            .open_broadcast()
            .await
            .map_err(|status| self.stream_failure(&status))?;

        let (done_tx, done_rx) = oneshot::channel();
        let _receiver =
            WorkerHandle::spawn(receive_status(stream.responses, done_tx, self.logger().clone()));

        let sender = stream.sender;
        if let Err(err) = sender.send(envelope.to_wire()).await {
            return Err(OrdererError::SendFailed(err.to_string()));
        }
        // Close the request side; a single envelope is sent per call.
        drop(sender);

        let outcome = done_rx.await.unwrap_or_else(|_| {
            Err(OrdererError::StreamFailure {
                code: None,
                message: "broadcast receiver stopped without a result".to_string(),
            })
        });
        connection.release();
        outcome
    }

    fn stream_failure(&self, status: &tonic::Status) -> OrdererError {
        let err = OrdererError::stream_failure(status);
        self.logger().warn(format_args!(
            "broadcast stream to {} failed: {err}",
            self.descriptor.address()
        ));
        err
    }

    fn logger(&self) -> &Logger {
        self.connections.logger()
    }
}

/// Read one response and report it through `done`.
async fn receive_status(
    mut responses: ResponseStream<BroadcastResponse>,
    done: oneshot::Sender<Result<BroadcastResult>>,
    logger: Logger,
) {
    let outcome = match responses.next().await {
        Some(Ok(response)) => {
            logger.debug(format_args!(
                "broadcast response: status {} info {:?}",
                response.status, response.info
            ));
            if Status::from_i32(response.status).is_some_and(Status::is_success) {
                Ok(BroadcastResult::accepted(response.info))
            } else {
                Err(OrdererError::server_status(response.status, response.info))
            }
        }
        Some(Err(status)) => {
            let err = OrdererError::stream_failure(&status);
            logger.warn(format_args!("broadcast stream failed: {err}"));
            Err(err)
        }
        None => Err(OrdererError::ProtocolViolation(
            "broadcast stream closed without a status".to_string(),
        )),
    };
    // The caller may have gone away; nothing left to do then.
    let _ = done.send(outcome);
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            descriptor::EndpointConfig,
            test_utils::{init_test_logger, DialOutcome, MockConnector, StreamEnd},
        },
        assert_matches::assert_matches,
        std::time::Duration,
        tonic::Code,
    };

    fn descriptor(url: &str, allow_insecure: bool) -> EndpointDescriptor {
        let config = EndpointConfig {
            allow_insecure,
            ..EndpointConfig::new(url)
        };
        EndpointDescriptor::new(config).unwrap()
    }

    fn envelope() -> SignedEnvelope {
        SignedEnvelope::new(b"tx".to_vec(), b"sig".to_vec())
    }

    async fn broadcast(
        connector: MockConnector,
        descriptor: &EndpointDescriptor,
    ) -> Result<BroadcastResult> {
        let connections = ConnectionManager::new(connector);
        let outcome = BroadcastInvoker::new(&connections, descriptor)
            .invoke(&envelope())
            .await;
        outcome
    }

    #[tokio::test]
    async fn test_success() {
        init_test_logger();
        let connector = MockConnector::new()
            .with_broadcast_responses([Ok(BroadcastResponse::new(Status::Success, "ok"))]);
        let stats = connector.stats();

        let result = broadcast(connector, &descriptor("orderer:7050", false))
            .await
            .unwrap();
        assert_eq!(result.status, Status::Success);
        assert_eq!(result.info.as_deref(), Some("ok"));
        assert_eq!(stats.releases(), 1);
        let sent = stats.envelopes();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].payload, b"tx");
        assert_eq!(sent[0].signature, b"sig");
    }

    #[tokio::test]
    async fn test_rejection_is_server_status() {
        let connector = MockConnector::new().with_broadcast_responses([Ok(
            BroadcastResponse::new(Status::Forbidden, "policy violated"),
        )]);
        let stats = connector.stats();

        let err = broadcast(connector, &descriptor("orderer:7050", false))
            .await
            .unwrap_err();
        assert_matches!(
            &err,
            OrdererError::ServerStatus { code: 403, info } if info == "policy violated"
        );
        assert_eq!(stats.releases(), 1);
    }

    #[tokio::test]
    async fn test_first_status_wins() {
        let connector = MockConnector::new().with_broadcast_responses([
            Ok(BroadcastResponse::new(Status::ServiceUnavailable, "")),
            Ok(BroadcastResponse::new(Status::Success, "")),
        ]);
        let err = broadcast(connector, &descriptor("orderer:7050", false))
            .await
            .unwrap_err();
        assert_eq!(err.server_status_code(), Some(Status::ServiceUnavailable));
    }

    #[tokio::test]
    async fn test_unknown_status_is_not_success() {
        let connector = MockConnector::new().with_broadcast_responses([Ok(BroadcastResponse {
            status: 201,
            info: "created".to_string(),
        })]);
        let err = broadcast(connector, &descriptor("orderer:7050", false))
            .await
            .unwrap_err();
        assert_matches!(err, OrdererError::ServerStatus { code: 201, .. });
        assert_eq!(err.server_status_code(), None);
    }

    #[tokio::test]
    async fn test_stream_error() {
        let connector = MockConnector::new()
            .with_broadcast_responses([Err(tonic::Status::internal("stream reset"))]);
        let stats = connector.stats();

        let err = broadcast(connector, &descriptor("orderer:7050", true))
            .await
            .unwrap_err();
        assert_matches!(err, OrdererError::StreamFailure { code: Some(Code::Internal), .. });
        // Stream failures never trigger the insecure retry.
        assert_eq!(stats.dials(), vec![true]);
        assert_eq!(stats.releases(), 1);
    }

    #[tokio::test]
    async fn test_stream_closed_without_status() {
        let err = broadcast(MockConnector::new(), &descriptor("orderer:7050", false))
            .await
            .unwrap_err();
        assert_matches!(err, OrdererError::ProtocolViolation(_));
    }

    #[tokio::test]
    async fn test_open_failure() {
        let connector =
            MockConnector::new().with_open_error(tonic::Status::unimplemented("no broadcast"));
        let stats = connector.stats();
        let err = broadcast(connector, &descriptor("orderer:7050", false))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(Code::Unimplemented));
        assert_eq!(stats.releases(), 1);
    }

    #[tokio::test]
    async fn test_send_failure() {
        let connector = MockConnector::new()
            .rejecting_send()
            .with_stream_end(StreamEnd::Hang);
        let stats = connector.stats();
        let err = broadcast(connector, &descriptor("orderer:7050", false))
            .await
            .unwrap_err();
        assert_matches!(err, OrdererError::SendFailed(_));
        assert_eq!(stats.releases(), 1);
    }

    #[tokio::test]
    async fn test_insecure_fallback() {
        let connector = MockConnector::new()
            .with_secured_dial(DialOutcome::Refuse)
            .with_broadcast_responses([Ok(BroadcastResponse::new(Status::Success, ""))]);
        let stats = connector.stats();

        let result = broadcast(connector, &descriptor("orderer:7050", true))
            .await
            .unwrap();
        assert_eq!(result.info, None);
        assert_eq!(stats.dials(), vec![true, false]);
        assert_eq!(stats.releases(), 1);
    }

    #[tokio::test]
    async fn test_dial_failure_without_fallback() {
        let connector = MockConnector::new().with_dial(DialOutcome::Refuse);
        let stats = connector.stats();
        let err = broadcast(connector, &descriptor("grpcs://orderer:7050", true))
            .await
            .unwrap_err();
        assert!(err.is_connection_failure());
        assert_eq!(stats.dials(), vec![true]);
        assert_eq!(stats.releases(), 0);
    }

    #[tokio::test]
    async fn test_cancellation_releases_connection() {
        let connector = MockConnector::new().with_stream_end(StreamEnd::Hang);
        let stats = connector.stats();
        let descriptor = descriptor("orderer:7050", false);
        let connections = ConnectionManager::new(connector);
        let invoker = BroadcastInvoker::new(&connections, &descriptor);

        let timed_out =
            tokio::time::timeout(Duration::from_millis(50), invoker.invoke(&envelope())).await;
        assert!(timed_out.is_err());
        assert_eq!(stats.releases(), 1);
    }
}
