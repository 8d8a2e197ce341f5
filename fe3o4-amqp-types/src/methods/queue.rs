//! `queue` class methods

use bytes::{Buf, BufMut};

use crate::codec::{self, Endianness};
use crate::error::Error;
use crate::value::{FieldTable, ShortString};

/// Creates a queue, or verifies an existing one when `passive` is set.
/// An empty name asks the server to generate one. `queue.declare`
#[derive(Debug, Clone, PartialEq)]
pub struct QueueDeclare {
    /// Queue name; empty for a server-generated name
    pub queue: ShortString,
    /// Only check that the queue exists
    pub passive: bool,
    /// Survive a broker restart
    pub durable: bool,
    /// Only accessible by this connection, deleted when it closes
    pub exclusive: bool,
    /// Delete when the last consumer cancels
    pub auto_delete: bool,
    /// Do not wait for a declare-ok reply
    pub no_wait: bool,
    /// Optional broker-specific arguments
    pub arguments: FieldTable,
}

impl QueueDeclare {
    pub(crate) fn encode_args(&self, dst: &mut impl BufMut) {
        codec::write_u16(dst, 0, Endianness::Big); // reserved ticket
        self.queue.encode(dst);
        let bits = self.passive as u8
            | (self.durable as u8) << 1
            | (self.exclusive as u8) << 2
            | (self.auto_delete as u8) << 3
            | (self.no_wait as u8) << 4;
        dst.put_u8(bits);
        self.arguments.encode(dst);
    }

    pub(crate) fn decode_args(src: &mut impl Buf) -> Result<Self, Error> {
        let _ticket = codec::read_u16(src, Endianness::Big)?;
        let queue = ShortString::decode(src)?;
        let bits = codec::read_u8(src)?;
        let arguments = FieldTable::decode(src)?;
        Ok(Self {
            queue,
            passive: bits & 1 != 0,
            durable: bits & (1 << 1) != 0,
            exclusive: bits & (1 << 2) != 0,
            auto_delete: bits & (1 << 3) != 0,
            no_wait: bits & (1 << 4) != 0,
            arguments,
        })
    }
}

/// Confirms a declare, echoing the (possibly server-generated) queue name.
/// `queue.declare-ok`
#[derive(Debug, Clone, PartialEq)]
pub struct QueueDeclareOk {
    /// The declared queue's name
    pub queue: ShortString,
    /// Messages currently in the queue
    pub message_count: u32,
    /// Active consumers on the queue
    pub consumer_count: u32,
}

impl QueueDeclareOk {
    pub(crate) fn encode_args(&self, dst: &mut impl BufMut) {
        self.queue.encode(dst);
        codec::write_u32(dst, self.message_count, Endianness::Big);
        codec::write_u32(dst, self.consumer_count, Endianness::Big);
    }

    pub(crate) fn decode_args(src: &mut impl Buf) -> Result<Self, Error> {
        Ok(Self {
            queue: ShortString::decode(src)?,
            message_count: codec::read_u32(src, Endianness::Big)?,
            consumer_count: codec::read_u32(src, Endianness::Big)?,
        })
    }
}

/// Binds a queue to an exchange. `queue.bind`
#[derive(Debug, Clone, PartialEq)]
pub struct QueueBind {
    /// Queue to bind
    pub queue: ShortString,
    /// Exchange to bind to
    pub exchange: ShortString,
    /// Routing key for the binding
    pub routing_key: ShortString,
    /// Do not wait for a bind-ok reply
    pub no_wait: bool,
    /// Optional binding arguments
    pub arguments: FieldTable,
}

impl QueueBind {
    pub(crate) fn encode_args(&self, dst: &mut impl BufMut) {
        codec::write_u16(dst, 0, Endianness::Big); // reserved ticket
        self.queue.encode(dst);
        self.exchange.encode(dst);
        self.routing_key.encode(dst);
        dst.put_u8(self.no_wait as u8);
        self.arguments.encode(dst);
    }

    pub(crate) fn decode_args(src: &mut impl Buf) -> Result<Self, Error> {
        let _ticket = codec::read_u16(src, Endianness::Big)?;
        Ok(Self {
            queue: ShortString::decode(src)?,
            exchange: ShortString::decode(src)?,
            routing_key: ShortString::decode(src)?,
            no_wait: codec::read_u8(src)? & 1 != 0,
            arguments: FieldTable::decode(src)?,
        })
    }
}

/// Removes a binding. Unlike `queue.bind` there is no no-wait flag.
/// `queue.unbind`
#[derive(Debug, Clone, PartialEq)]
pub struct QueueUnbind {
    /// Queue to unbind
    pub queue: ShortString,
    /// Exchange it was bound to
    pub exchange: ShortString,
    /// Routing key of the binding
    pub routing_key: ShortString,
    /// Arguments of the binding
    pub arguments: FieldTable,
}

impl QueueUnbind {
    pub(crate) fn encode_args(&self, dst: &mut impl BufMut) {
        codec::write_u16(dst, 0, Endianness::Big); // reserved ticket
        self.queue.encode(dst);
        self.exchange.encode(dst);
        self.routing_key.encode(dst);
        self.arguments.encode(dst);
    }

    pub(crate) fn decode_args(src: &mut impl Buf) -> Result<Self, Error> {
        let _ticket = codec::read_u16(src, Endianness::Big)?;
        Ok(Self {
            queue: ShortString::decode(src)?,
            exchange: ShortString::decode(src)?,
            routing_key: ShortString::decode(src)?,
            arguments: FieldTable::decode(src)?,
        })
    }
}

/// Discards all messages in a queue that are not awaiting acknowledgment.
/// `queue.purge`
#[derive(Debug, Clone, PartialEq)]
pub struct QueuePurge {
    /// Queue to purge
    pub queue: ShortString,
    /// Do not wait for a purge-ok reply
    pub no_wait: bool,
}

impl QueuePurge {
    pub(crate) fn encode_args(&self, dst: &mut impl BufMut) {
        codec::write_u16(dst, 0, Endianness::Big); // reserved ticket
        self.queue.encode(dst);
        dst.put_u8(self.no_wait as u8);
    }

    pub(crate) fn decode_args(src: &mut impl Buf) -> Result<Self, Error> {
        let _ticket = codec::read_u16(src, Endianness::Big)?;
        Ok(Self {
            queue: ShortString::decode(src)?,
            no_wait: codec::read_u8(src)? & 1 != 0,
        })
    }
}

/// Confirms a purge. `queue.purge-ok`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuePurgeOk {
    /// Messages discarded
    pub message_count: u32,
}

impl QueuePurgeOk {
    pub(crate) fn encode_args(&self, dst: &mut impl BufMut) {
        codec::write_u32(dst, self.message_count, Endianness::Big);
    }

    pub(crate) fn decode_args(src: &mut impl Buf) -> Result<Self, Error> {
        Ok(Self {
            message_count: codec::read_u32(src, Endianness::Big)?,
        })
    }
}

/// Deletes a queue. `queue.delete`
#[derive(Debug, Clone, PartialEq)]
pub struct QueueDelete {
    /// Queue to delete
    pub queue: ShortString,
    /// Fail if the queue still has consumers
    pub if_unused: bool,
    /// Fail if the queue still has messages
    pub if_empty: bool,
    /// Do not wait for a delete-ok reply
    pub no_wait: bool,
}

impl QueueDelete {
    pub(crate) fn encode_args(&self, dst: &mut impl BufMut) {
        codec::write_u16(dst, 0, Endianness::Big); // reserved ticket
        self.queue.encode(dst);
        let bits =
            self.if_unused as u8 | (self.if_empty as u8) << 1 | (self.no_wait as u8) << 2;
        dst.put_u8(bits);
    }

    pub(crate) fn decode_args(src: &mut impl Buf) -> Result<Self, Error> {
        let _ticket = codec::read_u16(src, Endianness::Big)?;
        let queue = ShortString::decode(src)?;
        let bits = codec::read_u8(src)?;
        Ok(Self {
            queue,
            if_unused: bits & 1 != 0,
            if_empty: bits & (1 << 1) != 0,
            no_wait: bits & (1 << 2) != 0,
        })
    }
}

/// Confirms a delete. `queue.delete-ok`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueDeleteOk {
    /// Messages discarded along with the queue
    pub message_count: u32,
}

impl QueueDeleteOk {
    pub(crate) fn encode_args(&self, dst: &mut impl BufMut) {
        codec::write_u32(dst, self.message_count, Endianness::Big);
    }

    pub(crate) fn decode_args(src: &mut impl Buf) -> Result<Self, Error> {
        Ok(Self {
            message_count: codec::read_u32(src, Endianness::Big)?,
        })
    }
}
