//! In-process stand-ins for the transport and the log backend.
//!
//! [`MockConnector`] plays back a fixed script of responses on every stream it
//! opens and records what the client did with it: which security modes were
//! dialed, how many connections were released, which envelopes were sent and
//! how far the response script was consumed.

use {
    crate::{
        connection::{Connector, DuplexStream, OrdererConnection, ResponseStream},
        descriptor::EndpointDescriptor,
        error::DialError,
    },
    async_trait::async_trait,
    futures::{future, stream, StreamExt},
    log::{Level, Log, Metadata, Record},
    orderer_proto::{BroadcastResponse, DeliverResponse, Envelope},
    std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    tokio::sync::mpsc,
};

/// How a dial attempt resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialOutcome {
    Connect,
    /// Fails with `UNAVAILABLE`.
    Refuse,
    /// Never completes.
    Hang,
}

/// What a response stream does once its script is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    Close,
    Hang,
}

#[derive(Debug, Default)]
pub struct MockStats {
    dials: Mutex<Vec<bool>>,
    releases: AtomicUsize,
    envelopes: Mutex<Vec<Envelope>>,
    responses_polled: AtomicUsize,
}

impl MockStats {
    /// Security mode of every dial attempt, in order.
    pub fn dials(&self) -> Vec<bool> {
        self.dials.lock().unwrap().clone()
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    /// Envelopes the client sent, across all streams.
    pub fn envelopes(&self) -> Vec<Envelope> {
        self.envelopes.lock().unwrap().clone()
    }

    /// Scripted responses handed to the client so far.
    pub fn responses_polled(&self) -> usize {
        self.responses_polled.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
struct Script {
    secured_dial: DialOutcome,
    insecure_dial: DialOutcome,
    open_error: Option<tonic::Status>,
    reject_send: bool,
    broadcast: Vec<Result<BroadcastResponse, tonic::Status>>,
    deliver: Vec<Result<DeliverResponse, tonic::Status>>,
    end: StreamEnd,
}

#[derive(Debug, Clone)]
pub struct MockConnector {
    script: Script,
    stats: Arc<MockStats>,
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConnector {
    pub fn new() -> Self {
        Self {
            script: Script {
                secured_dial: DialOutcome::Connect,
                insecure_dial: DialOutcome::Connect,
                open_error: None,
                reject_send: false,
                broadcast: Vec::new(),
                deliver: Vec::new(),
                end: StreamEnd::Close,
            },
            stats: Arc::new(MockStats::default()),
        }
    }

    /// Resolve dials in both security modes with `outcome`.
    pub fn with_dial(self, outcome: DialOutcome) -> Self {
        self.with_secured_dial(outcome).with_insecure_dial(outcome)
    }

    pub fn with_secured_dial(mut self, outcome: DialOutcome) -> Self {
        self.script.secured_dial = outcome;
        self
    }

    pub fn with_insecure_dial(mut self, outcome: DialOutcome) -> Self {
        self.script.insecure_dial = outcome;
        self
    }

    /// Fail opening a stream with `status`.
    pub fn with_open_error(mut self, status: tonic::Status) -> Self {
        self.script.open_error = Some(status);
        self
    }

    /// Close the request side before anything can be sent.
    pub fn rejecting_send(mut self) -> Self {
        self.script.reject_send = true;
        self
    }

    pub fn with_broadcast_responses(
        mut self,
        responses: impl IntoIterator<Item = Result<BroadcastResponse, tonic::Status>>,
    ) -> Self {
        self.script.broadcast = responses.into_iter().collect();
        self
    }

    pub fn with_deliver_responses(
        mut self,
        responses: impl IntoIterator<Item = Result<DeliverResponse, tonic::Status>>,
    ) -> Self {
        self.script.deliver = responses.into_iter().collect();
        self
    }

    pub fn with_stream_end(mut self, end: StreamEnd) -> Self {
        self.script.end = end;
        self
    }

    pub fn stats(&self) -> Arc<MockStats> {
        Arc::clone(&self.stats)
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Connection = MockConnection;

    async fn dial(
        &self,
        _descriptor: &EndpointDescriptor,
        secured: bool,
    ) -> Result<MockConnection, DialError> {
        self.stats.dials.lock().unwrap().push(secured);
        let outcome = if secured {
            self.script.secured_dial
        } else {
            self.script.insecure_dial
        };
        match outcome {
            DialOutcome::Connect => Ok(MockConnection {
                script: self.script.clone(),
                stats: self.stats(),
            }),
            DialOutcome::Refuse => Err(Box::new(tonic::Status::unavailable("connection refused"))),
            DialOutcome::Hang => future::pending().await,
        }
    }

    fn release(&self, _connection: MockConnection) {
        self.stats.releases.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug)]
pub struct MockConnection {
    script: Script,
    stats: Arc<MockStats>,
}

impl MockConnection {
    fn open<T: Send + 'static>(
        &self,
        responses: Vec<Result<T, tonic::Status>>,
    ) -> Result<DuplexStream<T>, tonic::Status> {
        if let Some(status) = &self.script.open_error {
            return Err(status.clone());
        }
        let (sender, receiver) = mpsc::channel(1);
        let receiver = (!self.script.reject_send).then_some(receiver);
        Ok(DuplexStream {
            sender,
            responses: scripted(
                receiver,
                responses,
                self.script.end,
                Arc::clone(&self.stats),
            ),
        })
    }
}

#[async_trait]
impl OrdererConnection for MockConnection {
    async fn open_broadcast(&mut self) -> Result<DuplexStream<BroadcastResponse>, tonic::Status> {
        self.open(self.script.broadcast.clone())
    }

    async fn open_deliver(&mut self) -> Result<DuplexStream<DeliverResponse>, tonic::Status> {
        self.open(self.script.deliver.clone())
    }
}

/// Waits for the client's envelope (as a server would), then plays back
/// `responses` followed by `end`.
fn scripted<T: Send + 'static>(
    receiver: Option<mpsc::Receiver<Envelope>>,
    responses: Vec<Result<T, tonic::Status>>,
    end: StreamEnd,
    stats: Arc<MockStats>,
) -> ResponseStream<T> {
    let received = {
        let stats = Arc::clone(&stats);
        async move {
            if let Some(mut receiver) = receiver {
                if let Some(envelope) = receiver.recv().await {
                    stats.envelopes.lock().unwrap().push(envelope);
                }
            }
        }
    };
    let script = stream::iter(responses).inspect(move |_| {
        stats.responses_polled.fetch_add(1, Ordering::SeqCst);
    });
    let tail: ResponseStream<T> = match end {
        StreamEnd::Close => stream::empty().boxed(),
        StreamEnd::Hang => stream::pending().boxed(),
    };
    stream::once(received)
        .filter_map(|()| future::ready(None::<Result<T, tonic::Status>>))
        .chain(script)
        .chain(tail)
        .boxed()
}

/// A log record as captured by [`CapturingLog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedRecord {
    pub level: Level,
    pub target: String,
    pub message: String,
    pub file: String,
}

/// Keeps every record at or above `max_level` in memory.
#[derive(Debug)]
pub struct CapturingLog {
    max_level: Level,
    records: Mutex<Vec<CapturedRecord>>,
}

impl CapturingLog {
    pub fn new(max_level: Level) -> Self {
        Self {
            max_level,
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn records(&self) -> Vec<CapturedRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Messages logged at exactly `level`.
    pub fn messages(&self, level: Level) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|record| record.level == level)
            .map(|record| record.message)
            .collect()
    }
}

impl Log for CapturingLog {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.records.lock().unwrap().push(CapturedRecord {
            level: record.level(),
            target: record.target().to_string(),
            message: record.args().to_string(),
            file: record.file().unwrap_or_default().to_string(),
        });
    }

    fn flush(&self) {}
}

/// Route `log` output to the test harness.
pub fn init_test_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
