//! Streaming blocks over the `Deliver` RPC.
//!
//! A call dials, opens the stream and sends the seek envelope.  If all of
//! that succeeds a worker task takes over the connection and forwards each
//! block to the [`DeliverSession`] through a capacity-one channel, so the
//! worker reads no further ahead than one block the consumer has not taken.
//!
//! A session yields blocks in the order the orderer sent them, then at most
//! one error, then ends.  Dropping the session stops the worker and releases
//! the connection.

use {
    crate::{
        connection::{ConnectionGuard, ConnectionManager, Connector, ResponseStream},
        descriptor::EndpointDescriptor,
        error::{OrdererError, Result},
        fallback::SecureFallbackPolicy,
        logging::Logger,
        message::{Block, SignedEnvelope},
        worker::WorkerHandle,
    },
    futures::{Stream, StreamExt},
    orderer_proto::{deliver_response::Type, DeliverResponse, Envelope, Status},
    std::{
        pin::Pin,
        task::{Context, Poll},
    },
    tokio::sync::mpsc,
};

/// The blocks of one deliver call.
#[derive(Debug)]
pub struct DeliverSession {
    blocks: mpsc::Receiver<Result<Block>>,
    _worker: Option<WorkerHandle>,
}

impl DeliverSession {
    /// A session that ends with `err` without yielding any block.
    pub(crate) fn failed(err: OrdererError) -> Self {
        let (sender, blocks) = mpsc::channel(1);
        // Capacity one and nothing queued yet, so this cannot fail.
        let _ = sender.try_send(Err(err));
        Self {
            blocks,
            _worker: None,
        }
    }

    /// The next block, the terminal error, or `None` once the session ended.
    pub async fn next_block(&mut self) -> Option<Result<Block>> {
        self.blocks.recv().await
    }
}

impl Stream for DeliverSession {
    type Item = Result<Block>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.blocks.poll_recv(cx)
    }
}

pub struct DeliverStreamer<'a, C> {
    connections: &'a ConnectionManager<C>,
    descriptor: &'a EndpointDescriptor,
}

impl<'a, C: Connector> DeliverStreamer<'a, C> {
    pub fn new(connections: &'a ConnectionManager<C>, descriptor: &'a EndpointDescriptor) -> Self {
        Self {
            connections,
            descriptor,
        }
    }

    /// Send the seek envelope and stream the blocks it selects.  Failures
    /// before the first block surface as the session's only item.
    pub async fn invoke(&self, envelope: &SignedEnvelope) -> DeliverSession {
        SecureFallbackPolicy::for_endpoint(self.descriptor)
            .run(self.logger(), |secured| self.start(envelope, secured))
            .await
            .unwrap_or_else(DeliverSession::failed)
    }

    async fn start(&self, envelope: &SignedEnvelope, secured: bool) -> Result<DeliverSession> {
        let mut connection = self
            .connections
            .dial(self.descriptor, secured, self.descriptor.dial_timeout())
            .await?;

        let stream = connection.open_deliver().await.map_err(|status| {
            let err = OrdererError::stream_failure(&status);
            self.logger().warn(format_args!(
                "deliver stream to {} failed: {err}",
                self.descriptor.address()
            ));
            err
        })?;

        if let Err(err) = stream.sender.send(envelope.to_wire()).await {
            let err = OrdererError::SendFailed(err.to_string());
            self.logger().warn(format_args!(
                "sending seek to {} failed: {err}",
                self.descriptor.address()
            ));
            return Err(err);
        }

        let (blocks_tx, blocks) = mpsc::channel(1);
        let worker = WorkerHandle::spawn(stream_blocks(
            connection,
            stream.sender,
            stream.responses,
            blocks_tx,
            self.logger().clone(),
        ));
        Ok(DeliverSession {
            blocks,
            _worker: Some(worker),
        })
    }

    fn logger(&self) -> &Logger {
        self.connections.logger()
    }
}

enum Step {
    Emit(Block),
    Close,
    Fail(OrdererError),
}

fn classify(next: Option<std::result::Result<DeliverResponse, tonic::Status>>) -> Step {
    let response = match next {
        Some(Ok(response)) => response,
        Some(Err(status)) => return Step::Fail(OrdererError::stream_failure(&status)),
        None => {
            return Step::Fail(OrdererError::ProtocolViolation(
                "deliver stream closed without a status".to_string(),
            ))
        }
    };
    match response.r#type {
        Some(Type::Block(bytes)) => Step::Emit(Block::from(bytes)),
        Some(Type::Status(code)) if Status::from_i32(code).is_some_and(Status::is_success) => {
            Step::Close
        }
        Some(Type::Status(code)) => Step::Fail(OrdererError::server_status(code, "")),
        None => Step::Fail(OrdererError::ProtocolViolation(
            "deliver response carries neither a block nor a status".to_string(),
        )),
    }
}

/// Forward responses to `blocks` until the orderer finishes, something fails
/// or the consumer goes away.  `request` keeps the request side open for the
/// life of the stream.
async fn stream_blocks<C: Connector>(
    connection: ConnectionGuard<C>,
    request: mpsc::Sender<Envelope>,
    mut responses: ResponseStream<DeliverResponse>,
    blocks: mpsc::Sender<Result<Block>>,
    logger: Logger,
) {
    loop {
        let next = tokio::select! {
            () = blocks.closed() => {
                logger.debug(format_args!("deliver session dropped, stopping"));
                break;
            }
            next = responses.next() => next,
        };
        match classify(next) {
            Step::Emit(block) => {
                logger.debug(format_args!("received block ({} bytes)", block.len()));
                if blocks.send(Ok(block)).await.is_err() {
                    break;
                }
            }
            Step::Close => {
                logger.debug(format_args!("deliver finished with {:?}", Status::Success));
                break;
            }
            Step::Fail(err) => {
                logger.warn(format_args!(
                    "deliver from {} failed: {err}",
                    connection.address()
                ));
                let _ = blocks.send(Err(err)).await;
                break;
            }
        }
    }
    drop(request);
    connection.release();
}
