//! `channel` class methods: per-channel lifecycle and flow control

use bytes::{Buf, BufMut};

use crate::codec::{self, Endianness};
use crate::error::Error;
use crate::value::ShortString;

/// Asks the peer to pause (`active = false`) or resume (`active = true`)
/// sending content. `channel.flow`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelFlow {
    /// Whether the peer may send content
    pub active: bool,
}

impl ChannelFlow {
    pub(crate) fn encode_args(&self, dst: &mut impl BufMut) {
        dst.put_u8(self.active as u8);
    }

    pub(crate) fn decode_args(src: &mut impl Buf) -> Result<Self, Error> {
        Ok(Self {
            active: codec::read_u8(src)? & 1 != 0,
        })
    }
}

/// Confirms a flow request. `channel.flow-ok`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelFlowOk {
    /// The flow state the sender settled on
    pub active: bool,
}

impl ChannelFlowOk {
    pub(crate) fn encode_args(&self, dst: &mut impl BufMut) {
        dst.put_u8(self.active as u8);
    }

    pub(crate) fn decode_args(src: &mut impl Buf) -> Result<Self, Error> {
        Ok(Self {
            active: codec::read_u8(src)? & 1 != 0,
        })
    }
}

/// Requests an orderly channel shutdown, carrying the cause.
/// `channel.close`
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelClose {
    /// Reply code, `REPLY_SUCCESS` for a graceful close
    pub reply_code: u16,
    /// Human-readable reason
    pub reply_text: ShortString,
    /// Class id of the method that caused the close, or 0
    pub class_id: u16,
    /// Method id of the method that caused the close, or 0
    pub method_id: u16,
}

impl ChannelClose {
    pub(crate) fn encode_args(&self, dst: &mut impl BufMut) {
        codec::write_u16(dst, self.reply_code, Endianness::Big);
        self.reply_text.encode(dst);
        codec::write_u16(dst, self.class_id, Endianness::Big);
        codec::write_u16(dst, self.method_id, Endianness::Big);
    }

    pub(crate) fn decode_args(src: &mut impl Buf) -> Result<Self, Error> {
        Ok(Self {
            reply_code: codec::read_u16(src, Endianness::Big)?,
            reply_text: ShortString::decode(src)?,
            class_id: codec::read_u16(src, Endianness::Big)?,
            method_id: codec::read_u16(src, Endianness::Big)?,
        })
    }
}
