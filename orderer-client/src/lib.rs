//! Orderer client
//!
//! This crate talks to an ordering service over its `AtomicBroadcast` gRPC
//! contract.  It handles:
//!
//! - **Broadcast**: submitting one signed envelope and reporting the
//!   orderer's verdict.
//! - **Deliver**: sending a signed seek request and streaming back the
//!   selected blocks, in order, with back-pressure.
//! - **Transport security**: TLS by default, with a single plaintext retry
//!   for bare `host:port` endpoints that explicitly allow it.
//!
//! Envelopes and blocks are opaque: the caller signs and decodes them.
//!
//! ## Architecture
//!
//! ```text
//!  Orderer (send_broadcast / send_deliver)
//!     |
//!     +-- BroadcastInvoker ---+
//!     |                       +-- SecureFallbackPolicy
//!     +-- DeliverStreamer ----+         |
//!                                ConnectionManager (dial timeout, guards)
//!                                       |
//!                                Connector (GrpcConnector / tonic)
//! ```
//!
//! ## Crate modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`orderer`]    | `Orderer` facade |
//! | [`broadcast`]  | Single-envelope submission |
//! | [`deliver`]    | Block streaming and `DeliverSession` |
//! | [`fallback`]   | TLS-to-plaintext retry policy |
//! | [`connection`] | `Connector` trait, tonic connector, connection guards |
//! | [`descriptor`] | Validated endpoint options and URL rules |
//! | [`config`]     | YAML network configuration |
//! | [`message`]    | Envelope, block and result types |
//! | [`logging`]    | Injectable `Logger` |
//! | [`error`]      | Crate-wide error enums |

pub mod broadcast;
pub mod config;
pub mod connection;
pub mod deliver;
pub mod descriptor;
pub mod error;
pub mod fallback;
pub mod logging;
pub mod message;
pub mod orderer;
#[cfg(any(test, feature = "dev-context-only-utils"))]
pub mod test_utils;
mod worker;

pub use {
    deliver::DeliverSession,
    descriptor::{EndpointConfig, EndpointDescriptor},
    error::{ConfigError, OrdererError},
    logging::Logger,
    message::{Block, BroadcastResult, SignedEnvelope},
    orderer::Orderer,
    orderer_proto::Status,
};
