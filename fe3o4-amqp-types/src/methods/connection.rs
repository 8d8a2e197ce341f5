//! `connection` class methods: handshake negotiation and lifecycle

use bytes::{Buf, BufMut};

use crate::codec::{self, Endianness};
use crate::error::Error;
use crate::value::{FieldTable, LongString, ShortString};

/// Opens the negotiation: the server announces its protocol version,
/// properties, SASL mechanisms and locales.
/// `connection.start`
#[derive(Debug, Clone, PartialEq)]
pub struct Start {
    /// Protocol major version the server speaks
    pub version_major: u8,
    /// Protocol minor version the server speaks
    pub version_minor: u8,
    /// Server properties (product, version, capabilities)
    pub server_properties: FieldTable,
    /// Space-separated list of SASL mechanisms
    pub mechanisms: LongString,
    /// Space-separated list of message locales
    pub locales: LongString,
}

impl Start {
    pub(crate) fn encode_args(&self, dst: &mut impl BufMut) {
        dst.put_u8(self.version_major);
        dst.put_u8(self.version_minor);
        self.server_properties.encode(dst);
        self.mechanisms.encode(dst);
        self.locales.encode(dst);
    }

    pub(crate) fn decode_args(src: &mut impl Buf) -> Result<Self, Error> {
        Ok(Self {
            version_major: codec::read_u8(src)?,
            version_minor: codec::read_u8(src)?,
            server_properties: FieldTable::decode(src)?,
            mechanisms: LongString::decode(src)?,
            locales: LongString::decode(src)?,
        })
    }
}

/// Selects a SASL mechanism and carries the initial security response.
/// `connection.start-ok`
#[derive(Debug, Clone, PartialEq)]
pub struct StartOk {
    /// Client properties (product, version, capabilities)
    pub client_properties: FieldTable,
    /// The chosen SASL mechanism
    pub mechanism: ShortString,
    /// Opaque SASL response; `\0user\0password` for PLAIN
    pub response: LongString,
    /// The chosen message locale
    pub locale: ShortString,
}

impl StartOk {
    pub(crate) fn encode_args(&self, dst: &mut impl BufMut) {
        self.client_properties.encode(dst);
        self.mechanism.encode(dst);
        self.response.encode(dst);
        self.locale.encode(dst);
    }

    pub(crate) fn decode_args(src: &mut impl Buf) -> Result<Self, Error> {
        Ok(Self {
            client_properties: FieldTable::decode(src)?,
            mechanism: ShortString::decode(src)?,
            response: LongString::decode(src)?,
            locale: ShortString::decode(src)?,
        })
    }
}

/// A SASL challenge from the server. `connection.secure`
#[derive(Debug, Clone, PartialEq)]
pub struct Secure {
    /// Opaque challenge data
    pub challenge: LongString,
}

impl Secure {
    pub(crate) fn encode_args(&self, dst: &mut impl BufMut) {
        self.challenge.encode(dst);
    }

    pub(crate) fn decode_args(src: &mut impl Buf) -> Result<Self, Error> {
        Ok(Self {
            challenge: LongString::decode(src)?,
        })
    }
}

/// The client's answer to a SASL challenge. `connection.secure-ok`
#[derive(Debug, Clone, PartialEq)]
pub struct SecureOk {
    /// Opaque response data
    pub response: LongString,
}

impl SecureOk {
    pub(crate) fn encode_args(&self, dst: &mut impl BufMut) {
        self.response.encode(dst);
    }

    pub(crate) fn decode_args(src: &mut impl Buf) -> Result<Self, Error> {
        Ok(Self {
            response: LongString::decode(src)?,
        })
    }
}

/// The server's proposed connection limits. `connection.tune`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tune {
    /// Proposed highest channel number; 0 means no limit
    pub channel_max: u16,
    /// Proposed largest frame size in bytes; 0 means no limit
    pub frame_max: u32,
    /// Desired heartbeat delay in seconds; 0 disables heartbeats
    pub heartbeat: u16,
}

impl Tune {
    pub(crate) fn encode_args(&self, dst: &mut impl BufMut) {
        codec::write_u16(dst, self.channel_max, Endianness::Big);
        codec::write_u32(dst, self.frame_max, Endianness::Big);
        codec::write_u16(dst, self.heartbeat, Endianness::Big);
    }

    pub(crate) fn decode_args(src: &mut impl Buf) -> Result<Self, Error> {
        Ok(Self {
            channel_max: codec::read_u16(src, Endianness::Big)?,
            frame_max: codec::read_u32(src, Endianness::Big)?,
            heartbeat: codec::read_u16(src, Endianness::Big)?,
        })
    }
}

/// The negotiated connection limits the client commits to.
/// `connection.tune-ok`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TuneOk {
    /// Negotiated highest channel number
    pub channel_max: u16,
    /// Negotiated largest frame size in bytes
    pub frame_max: u32,
    /// Negotiated heartbeat delay in seconds; 0 disables heartbeats
    pub heartbeat: u16,
}

impl TuneOk {
    pub(crate) fn encode_args(&self, dst: &mut impl BufMut) {
        codec::write_u16(dst, self.channel_max, Endianness::Big);
        codec::write_u32(dst, self.frame_max, Endianness::Big);
        codec::write_u16(dst, self.heartbeat, Endianness::Big);
    }

    pub(crate) fn decode_args(src: &mut impl Buf) -> Result<Self, Error> {
        Ok(Self {
            channel_max: codec::read_u16(src, Endianness::Big)?,
            frame_max: codec::read_u32(src, Endianness::Big)?,
            heartbeat: codec::read_u16(src, Endianness::Big)?,
        })
    }
}

/// Opens the connection to a virtual host. `connection.open`
#[derive(Debug, Clone, PartialEq)]
pub struct Open {
    /// Virtual host path, `/` by default
    pub vhost: ShortString,
}

impl Open {
    pub(crate) fn encode_args(&self, dst: &mut impl BufMut) {
        self.vhost.encode(dst);
        // reserved capabilities shortstr + reserved insist bit
        dst.put_u8(0);
        dst.put_u8(0);
    }

    pub(crate) fn decode_args(src: &mut impl Buf) -> Result<Self, Error> {
        let vhost = ShortString::decode(src)?;
        let _reserved_capabilities = codec::read_short_str(src)?;
        let _reserved_insist = codec::read_u8(src)?;
        Ok(Self { vhost })
    }
}

/// Requests an orderly connection shutdown, carrying the cause.
/// `connection.close`
#[derive(Debug, Clone, PartialEq)]
pub struct Close {
    /// Reply code, `REPLY_SUCCESS` for a graceful close
    pub reply_code: u16,
    /// Human-readable reason
    pub reply_text: ShortString,
    /// Class id of the method that caused the close, or 0
    pub class_id: u16,
    /// Method id of the method that caused the close, or 0
    pub method_id: u16,
}

impl Close {
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

/// The broker has stopped accepting new work on this connection
/// (RabbitMQ extension). `connection.blocked`
#[derive(Debug, Clone, PartialEq)]
pub struct Blocked {
    /// Why the connection is blocked, e.g. a resource alarm
    pub reason: ShortString,
}

impl Blocked {
    pub(crate) fn encode_args(&self, dst: &mut impl BufMut) {
        self.reason.encode(dst);
    }

    pub(crate) fn decode_args(src: &mut impl Buf) -> Result<Self, Error> {
        Ok(Self {
            reason: ShortString::decode(src)?,
        })
    }
}
