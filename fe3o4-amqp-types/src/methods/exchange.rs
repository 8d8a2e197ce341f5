//! `exchange` class methods

use bytes::{Buf, BufMut};

use crate::codec::{self, Endianness};
use crate::error::Error;
use crate::value::{FieldTable, ShortString};

/// Creates an exchange, or verifies an existing one when `passive` is set.
/// `exchange.declare`
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeDeclare {
    /// Exchange name
    pub exchange: ShortString,
    /// Exchange type: `direct`, `fanout`, `topic`, `headers`, or a custom
    /// type the broker knows
    pub kind: ShortString,
    /// Only check that the exchange exists with the same type
    pub passive: bool,
    /// Survive a broker restart
    pub durable: bool,
    /// Delete when the last binding is removed
    pub auto_delete: bool,
    /// Only reachable through exchange-to-exchange bindings
    pub internal: bool,
    /// Do not wait for a declare-ok reply
    pub no_wait: bool,
    /// Optional broker-specific arguments
    pub arguments: FieldTable,
}

impl ExchangeDeclare {
    pub(crate) fn encode_args(&self, dst: &mut impl BufMut) {
        codec::write_u16(dst, 0, Endianness::Big); // reserved ticket
        self.exchange.encode(dst);
        self.kind.encode(dst);
        let bits = self.passive as u8
            | (self.durable as u8) << 1
            | (self.auto_delete as u8) << 2
            | (self.internal as u8) << 3
            | (self.no_wait as u8) << 4;
        dst.put_u8(bits);
        self.arguments.encode(dst);
    }

    pub(crate) fn decode_args(src: &mut impl Buf) -> Result<Self, Error> {
        let _ticket = codec::read_u16(src, Endianness::Big)?;
        let exchange = ShortString::decode(src)?;
        let kind = ShortString::decode(src)?;
        let bits = codec::read_u8(src)?;
        let arguments = FieldTable::decode(src)?;
        Ok(Self {
            exchange,
            kind,
            passive: bits & 1 != 0,
            durable: bits & (1 << 1) != 0,
            auto_delete: bits & (1 << 2) != 0,
            internal: bits & (1 << 3) != 0,
            no_wait: bits & (1 << 4) != 0,
            arguments,
        })
    }
}

/// Deletes an exchange. `exchange.delete`
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeDelete {
    /// Exchange name
    pub exchange: ShortString,
    /// Fail if the exchange still has bindings
    pub if_unused: bool,
    /// Do not wait for a delete-ok reply
    pub no_wait: bool,
}

impl ExchangeDelete {
    pub(crate) fn encode_args(&self, dst: &mut impl BufMut) {
        codec::write_u16(dst, 0, Endianness::Big); // reserved ticket
        self.exchange.encode(dst);
        let bits = self.if_unused as u8 | (self.no_wait as u8) << 1;
        dst.put_u8(bits);
    }

    pub(crate) fn decode_args(src: &mut impl Buf) -> Result<Self, Error> {
        let _ticket = codec::read_u16(src, Endianness::Big)?;
        let exchange = ShortString::decode(src)?;
        let bits = codec::read_u8(src)?;
        Ok(Self {
            exchange,
            if_unused: bits & 1 != 0,
            no_wait: bits & (1 << 1) != 0,
        })
    }
}

/// Binds an exchange to another exchange (RabbitMQ extension).
/// `exchange.bind`
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeBind {
    /// Exchange that receives the messages
    pub destination: ShortString,
    /// Exchange the messages are routed from
    pub source: ShortString,
    /// Routing key for the binding
    pub routing_key: ShortString,
    /// Do not wait for a bind-ok reply
    pub no_wait: bool,
    /// Optional binding arguments
    pub arguments: FieldTable,
}

impl ExchangeBind {
    pub(crate) fn encode_args(&self, dst: &mut impl BufMut) {
        codec::write_u16(dst, 0, Endianness::Big); // reserved ticket
        self.destination.encode(dst);
        self.source.encode(dst);
        self.routing_key.encode(dst);
        dst.put_u8(self.no_wait as u8);
        self.arguments.encode(dst);
    }

    pub(crate) fn decode_args(src: &mut impl Buf) -> Result<Self, Error> {
        let _ticket = codec::read_u16(src, Endianness::Big)?;
        Ok(Self {
            destination: ShortString::decode(src)?,
            source: ShortString::decode(src)?,
            routing_key: ShortString::decode(src)?,
            no_wait: codec::read_u8(src)? & 1 != 0,
            arguments: FieldTable::decode(src)?,
        })
    }
}

/// Removes an exchange-to-exchange binding (RabbitMQ extension).
/// `exchange.unbind`
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeUnbind {
    /// Exchange that was receiving the messages
    pub destination: ShortString,
    /// Exchange the messages were routed from
    pub source: ShortString,
    /// Routing key of the binding
    pub routing_key: ShortString,
    /// Do not wait for an unbind-ok reply
    pub no_wait: bool,
    /// Arguments of the binding
    pub arguments: FieldTable,
}

impl ExchangeUnbind {
    pub(crate) fn encode_args(&self, dst: &mut impl BufMut) {
        codec::write_u16(dst, 0, Endianness::Big); // reserved ticket
        self.destination.encode(dst);
        self.source.encode(dst);
        self.routing_key.encode(dst);
        dst.put_u8(self.no_wait as u8);
        self.arguments.encode(dst);
    }

    pub(crate) fn decode_args(src: &mut impl Buf) -> Result<Self, Error> {
        let _ticket = codec::read_u16(src, Endianness::Big)?;
        Ok(Self {
            destination: ShortString::decode(src)?,
            source: ShortString::decode(src)?,
            routing_key: ShortString::decode(src)?,
            no_wait: codec::read_u8(src)? & 1 != 0,
            arguments: FieldTable::decode(src)?,
        })
    }
}
