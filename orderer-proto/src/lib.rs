//! Wire types for the ordering service's `AtomicBroadcast` RPC contract.
//!
//! The Rust sources under `proto/` are the prost/tonic renderings of the
//! `.proto` files next to them and are checked in, so building this crate
//! does not require `protoc`.

#[allow(clippy::all)]
pub mod common {
    include!(concat!(env!("CARGO_MANIFEST_DIR"), "/proto/common.rs"));
}

#[allow(clippy::all)]
pub mod orderer {
    include!(concat!(env!("CARGO_MANIFEST_DIR"), "/proto/orderer.rs"));
}

pub use {
    common::{Envelope, Status},
    orderer::{
        atomic_broadcast_client::AtomicBroadcastClient, deliver_response, BroadcastResponse,
        DeliverResponse,
    },
};

impl Status {
    /// Whether this is the single success code of the ordering service.
    pub fn is_success(self) -> bool {
        self == Status::Success
    }
}

impl BroadcastResponse {
    /// Build a response carrying `status` and diagnostic `info`.
    pub fn new(status: Status, info: impl Into<String>) -> Self {
        Self {
            status: status as i32,
            info: info.into(),
        }
    }
}

impl DeliverResponse {
    /// A terminal status marker.
    pub fn status(status: Status) -> Self {
        Self {
            r#type: Some(deliver_response::Type::Status(status as i32)),
        }
    }

    /// A response carrying one encoded block.
    pub fn block(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            r#type: Some(deliver_response::Type::Block(bytes.into())),
        }
    }
}
