//! Typed coherence messages and their wire form.
//!
//! A [`ShmemMsg`] is the unit of traffic between L2 controllers and
//! directories. The byte encoding is little-endian and stable within a run:
//!
//! ```text
//! kind:u8  sender:u8  receiver:u8  requester:i32  address:u64
//! modeled:u8  data_len:u32  data:[u8; data_len]
//! ```
//!
//! Messages without a payload carry `data_len = 0`.

use thiserror::Error;

use crate::common::types::{MemComponent, TileId};

/// Fixed part of the encoding, before the payload.
const HEADER_BYTES: usize = 1 + 1 + 1 + 4 + 8 + 1 + 4;

/// The twelve message kinds of the coherence protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum MsgKind {
    /// Request exclusive (write) ownership.
    ExReq = 0,
    /// Request a shared (read) copy.
    ShReq = 1,
    /// Grant exclusive ownership, with data.
    ExRep = 2,
    /// Grant a shared copy, with data.
    ShRep = 3,
    /// Invalidate a shared copy.
    InvReq = 4,
    /// Acknowledge an invalidation (or announce a self-downgrade).
    InvRep = 5,
    /// Surrender a dirty line, with data.
    FlushReq = 6,
    /// Dirty line surrendered, with data.
    FlushRep = 7,
    /// Downgrade a dirty line to shared, with data.
    WbReq = 8,
    /// Dirty data written back, line retained shared.
    WbRep = 9,
    /// Grant exclusive ownership without data (requester already holds the
    /// bytes). MOSI only.
    UpgradeRep = 10,
    /// Flush for the owner, invalidate for a sharer, in one message. MOSI
    /// only.
    InvFlushCombinedReq = 11,
}

impl MsgKind {
    /// Decodes a kind from its wire byte.
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::ExReq),
            1 => Some(Self::ShReq),
            2 => Some(Self::ExRep),
            3 => Some(Self::ShRep),
            4 => Some(Self::InvReq),
            5 => Some(Self::InvRep),
            6 => Some(Self::FlushReq),
            7 => Some(Self::FlushRep),
            8 => Some(Self::WbReq),
            9 => Some(Self::WbRep),
            10 => Some(Self::UpgradeRep),
            11 => Some(Self::InvFlushCombinedReq),
            _ => None,
        }
    }

    /// Whether this kind answers an L2's outstanding request.
    pub fn is_grant(self) -> bool {
        matches!(self, Self::ExRep | Self::ShRep | Self::UpgradeRep)
    }
}

impl std::fmt::Display for MsgKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ExReq => "EX_REQ",
            Self::ShReq => "SH_REQ",
            Self::ExRep => "EX_REP",
            Self::ShRep => "SH_REP",
            Self::InvReq => "INV_REQ",
            Self::InvRep => "INV_REP",
            Self::FlushReq => "FLUSH_REQ",
            Self::FlushRep => "FLUSH_REP",
            Self::WbReq => "WB_REQ",
            Self::WbRep => "WB_REP",
            Self::UpgradeRep => "UPGRADE_REP",
            Self::InvFlushCombinedReq => "INV_FLUSH_COMBINED_REQ",
        };
        write!(f, "{name}")
    }
}

/// A message that could not be decoded off the wire.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    /// Fewer bytes than the fixed header.
    #[error("message truncated: {0} bytes, header needs {HEADER_BYTES}")]
    Truncated(usize),

    /// The payload length field disagrees with the buffer.
    #[error("payload length {expected} disagrees with {actual} trailing bytes")]
    PayloadLength {
        /// Length announced by the header.
        expected: usize,
        /// Bytes actually present after the header.
        actual: usize,
    },

    /// Unknown message kind byte.
    #[error("unknown message kind {0:#x}")]
    UnknownKind(u8),

    /// Unknown component byte.
    #[error("unknown component {0:#x}")]
    UnknownComponent(u8),
}

/// One coherence message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShmemMsg {
    /// Message kind.
    pub kind: MsgKind,
    /// Component that produced the message.
    pub sender: MemComponent,
    /// Component the message is addressed to.
    pub receiver: MemComponent,
    /// Tile on whose behalf the transaction runs. Carried through
    /// directory-initiated requests and their replies.
    pub requester: TileId,
    /// Line address the message is about.
    pub addr: u64,
    /// Whether the message's timing is charged to the performance model.
    pub modeled: bool,
    /// Payload, one cache line or empty.
    pub data: Vec<u8>,
}

impl ShmemMsg {
    /// A payload-free message.
    pub fn control(
        kind: MsgKind,
        sender: MemComponent,
        receiver: MemComponent,
        requester: TileId,
        addr: u64,
        modeled: bool,
    ) -> Self {
        Self {
            kind,
            sender,
            receiver,
            requester,
            addr,
            modeled,
            data: Vec::new(),
        }
    }

    /// A message carrying one line of data.
    pub fn with_data(
        kind: MsgKind,
        sender: MemComponent,
        receiver: MemComponent,
        requester: TileId,
        addr: u64,
        modeled: bool,
        data: Vec<u8>,
    ) -> Self {
        Self {
            kind,
            sender,
            receiver,
            requester,
            addr,
            modeled,
            data,
        }
    }

    /// Serializes to the stable wire form.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_BYTES + self.data.len());
        out.push(self.kind as u8);
        out.push(self.sender as u8);
        out.push(self.receiver as u8);
        out.extend_from_slice(&self.requester.to_le_bytes());
        out.extend_from_slice(&self.addr.to_le_bytes());
        out.push(u8::from(self.modeled));
        out.extend_from_slice(&(self.data.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.data);
        out
    }

    /// Deserializes from the wire form.
    ///
    /// # Errors
    ///
    /// Returns [`WireError`] on truncation, a payload length mismatch, or
    /// unknown kind/component bytes.
    pub fn decode(raw: &[u8]) -> Result<Self, WireError> {
        if raw.len() < HEADER_BYTES {
            return Err(WireError::Truncated(raw.len()));
        }
        let kind = MsgKind::from_u8(raw[0]).ok_or(WireError::UnknownKind(raw[0]))?;
        let sender = MemComponent::from_u8(raw[1]).ok_or(WireError::UnknownComponent(raw[1]))?;
        let receiver = MemComponent::from_u8(raw[2]).ok_or(WireError::UnknownComponent(raw[2]))?;
        let requester = i32::from_le_bytes(raw[3..7].try_into().expect("4 bytes"));
        let addr = u64::from_le_bytes(raw[7..15].try_into().expect("8 bytes"));
        let modeled = raw[15] != 0;
        let data_len = u32::from_le_bytes(raw[16..20].try_into().expect("4 bytes")) as usize;
        let actual = raw.len() - HEADER_BYTES;
        if data_len != actual {
            return Err(WireError::PayloadLength {
                expected: data_len,
                actual,
            });
        }
        Ok(Self {
            kind,
            sender,
            receiver,
            requester,
            addr,
            modeled,
            data: raw[HEADER_BYTES..].to_vec(),
        })
    }
}
