//! Values exchanged with callers: the envelope going out, and the blocks and
//! statuses coming back.
//!
//! None of these are interpreted by the client.  Envelope bytes are copied to
//! the wire as-is, and block bytes are handed back exactly as they arrived.

use {
    bytes::Bytes,
    orderer_proto::{Envelope, Status},
};

/// A caller-signed envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignedEnvelope {
    /// Serialized payload.
    pub payload: Vec<u8>,
    /// Signature over `payload`.
    pub signature: Vec<u8>,
}

impl SignedEnvelope {
    pub fn new(payload: impl Into<Vec<u8>>, signature: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            signature: signature.into(),
        }
    }

    pub(crate) fn to_wire(&self) -> Envelope {
        Envelope {
            payload: self.payload.clone(),
            signature: self.signature.clone(),
        }
    }
}

/// One ledger block, as the encoded bytes the orderer sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block(Bytes);

impl Block {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Block {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Bytes::from(bytes))
    }
}

impl AsRef<[u8]> for Block {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Terminal outcome of an accepted broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastResult {
    /// Always [`Status::Success`] for a result; rejections are errors.
    pub status: Status,
    /// Diagnostic text from the orderer, if it sent any.
    pub info: Option<String>,
}

impl BroadcastResult {
    pub(crate) fn accepted(info: String) -> Self {
        Self {
            status: Status::Success,
            info: (!info.is_empty()).then_some(info),
        }
    }
}
