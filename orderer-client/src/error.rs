//! Error types for the orderer client.
//!
//! Every failure a broadcast or deliver call can observe is folded into
//! [`OrdererError`].  The constructors on that type are the translation layer
//! between transport-level failures (`tonic` statuses, dial errors, timeouts)
//! and the taxonomy callers match on.

use {
    orderer_proto::Status,
    std::{error::Error as StdError, path::PathBuf, time::Duration},
    thiserror::Error,
    tonic::Code,
};

/// Error produced by a [`Connector`](crate::connection::Connector) dial.
pub type DialError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors surfaced by broadcast and deliver calls.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrdererError {
    /// The transport channel to the orderer could not be established.
    #[error("connection to {address} failed: {message}")]
    ConnectionFailed {
        /// Address that was dialed.
        address: String,
        /// Structured status code, when the transport reported one.
        code: Option<Code>,
        /// Raw failure text.
        message: String,
    },

    /// The stream broke after it was established.
    #[error("stream failure: {message}")]
    StreamFailure {
        /// Structured status code, when the transport reported one.
        code: Option<Code>,
        /// Raw failure text.
        message: String,
    },

    /// The ordering service answered with a non-success status.
    #[error("ordering service returned {} ({code}): {info}", status_label(.code))]
    ServerStatus {
        /// Raw `common.Status` value.
        code: i32,
        /// Diagnostic text sent alongside the status, possibly empty.
        info: String,
    },

    /// A response matched none of the expected shapes.
    #[error("unexpected response from ordering service: {0}")]
    ProtocolViolation(String),

    /// The envelope could not be written to the stream.
    #[error("failed to send envelope to ordering service: {0}")]
    SendFailed(String),
}

impl OrdererError {
    /// Translate a dial failure.
    ///
    /// A `tonic::Status` anywhere in the error's source chain keeps its code;
    /// anything else is carried as text.
    pub fn connection_failed(address: &str, err: &(dyn StdError + 'static)) -> Self {
        let (code, message) = match find_status(err) {
            Some(status) => (Some(status.code()), status.message().to_string()),
            None => (None, error_chain(err)),
        };
        Self::ConnectionFailed {
            address: address.to_string(),
            code,
            message,
        }
    }

    /// The dial did not complete within `timeout`.
    pub fn dial_timeout(address: &str, timeout: Duration) -> Self {
        Self::ConnectionFailed {
            address: address.to_string(),
            code: Some(Code::DeadlineExceeded),
            message: format!("dial timed out after {timeout:?}"),
        }
    }

    /// Translate a status read from (or returned while opening) a stream.
    pub fn stream_failure(status: &tonic::Status) -> Self {
        Self::StreamFailure {
            code: Some(status.code()),
            message: status.message().to_string(),
        }
    }

    /// A non-success application status from the orderer.
    pub fn server_status(code: i32, info: impl Into<String>) -> Self {
        Self::ServerStatus {
            code,
            info: info.into(),
        }
    }

    /// Whether this failure happened while establishing the connection.
    /// Only these are eligible for the insecure downgrade.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, Self::ConnectionFailed { .. })
    }

    /// The transport status code preserved from the underlying failure.
    pub fn code(&self) -> Option<Code> {
        match self {
            Self::ConnectionFailed { code, .. } | Self::StreamFailure { code, .. } => *code,
            Self::ServerStatus { .. } | Self::ProtocolViolation(_) | Self::SendFailed(_) => None,
        }
    }

    /// The orderer status for a [`ServerStatus`](Self::ServerStatus) error,
    /// if the code is one the wire contract defines.
    pub fn server_status_code(&self) -> Option<Status> {
        match self {
            Self::ServerStatus { code, .. } => Status::from_i32(*code),
            _ => None,
        }
    }
}

/// Errors raised while building an endpoint from configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The orderer URL is empty or not a `host:port` authority.
    #[error("invalid orderer url {url:?}: {reason}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A dial timeout of zero would fail every call.
    #[error("dial timeout must be greater than zero")]
    ZeroDialTimeout,

    /// A certificate or key file could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The network configuration document is malformed.
    #[error("failed to parse network config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// No orderer with this name is configured.
    #[error("unknown orderer: {0}")]
    UnknownOrderer(String),

    /// Only one half of a client certificate/key pair was configured.
    #[error("client TLS identity needs both a certificate and a key")]
    IncompleteIdentity,
}

/// Convenience result type for orderer calls.
pub type Result<T> = std::result::Result<T, OrdererError>;

fn status_label(code: &i32) -> &'static str {
    Status::from_i32(*code).map_or("UNRECOGNIZED", |status| status.as_str_name())
}

fn find_status<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a tonic::Status> {
    let mut current = Some(err);
    while let Some(err) = current {
        if let Some(status) = err.downcast_ref::<tonic::Status>() {
            return Some(status);
        }
        current = err.source();
    }
    None
}

fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(err) = source {
        message.push_str(": ");
        message.push_str(&err.to_string());
        source = err.source();
    }
    message
}
