//! `basic` class methods: publishing, delivery and acknowledgment

use bytes::{Buf, BufMut};

use crate::codec::{self, Endianness};
use crate::error::Error;
use crate::value::{FieldTable, ShortString};

/// Bounds how many messages the server sends ahead of acknowledgment.
/// `basic.qos`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasicQos {
    /// Prefetch window in bytes; 0 means no byte limit
    pub prefetch_size: u32,
    /// Prefetch window in messages; 0 means no message limit
    pub prefetch_count: u16,
    /// Apply to the whole channel rather than each new consumer
    pub global: bool,
}

impl BasicQos {
    pub(crate) fn encode_args(&self, dst: &mut impl BufMut) {
        codec::write_u32(dst, self.prefetch_size, Endianness::Big);
        codec::write_u16(dst, self.prefetch_count, Endianness::Big);
        dst.put_u8(self.global as u8);
    }

    pub(crate) fn decode_args(src: &mut impl Buf) -> Result<Self, Error> {
        Ok(Self {
            prefetch_size: codec::read_u32(src, Endianness::Big)?,
            prefetch_count: codec::read_u16(src, Endianness::Big)?,
            global: codec::read_u8(src)? & 1 != 0,
        })
    }
}

/// Starts a consumer on a queue. `basic.consume`
#[derive(Debug, Clone, PartialEq)]
pub struct BasicConsume {
    /// Queue to consume from
    pub queue: ShortString,
    /// Consumer tag; empty asks the server to generate one
    pub consumer_tag: ShortString,
    /// Do not deliver messages published on this connection
    pub no_local: bool,
    /// The server considers messages acknowledged once delivered
    pub no_ack: bool,
    /// Only this consumer may access the queue
    pub exclusive: bool,
    /// Do not wait for a consume-ok reply
    pub no_wait: bool,
    /// Optional consumer arguments
    pub arguments: FieldTable,
}

impl BasicConsume {
    pub(crate) fn encode_args(&self, dst: &mut impl BufMut) {
        codec::write_u16(dst, 0, Endianness::Big); // reserved ticket
        self.queue.encode(dst);
        self.consumer_tag.encode(dst);
        let bits = self.no_local as u8
            | (self.no_ack as u8) << 1
            | (self.exclusive as u8) << 2
            | (self.no_wait as u8) << 3;
        dst.put_u8(bits);
        self.arguments.encode(dst);
    }

    pub(crate) fn decode_args(src: &mut impl Buf) -> Result<Self, Error> {
        let _ticket = codec::read_u16(src, Endianness::Big)?;
        let queue = ShortString::decode(src)?;
        let consumer_tag = ShortString::decode(src)?;
        let bits = codec::read_u8(src)?;
        let arguments = FieldTable::decode(src)?;
        Ok(Self {
            queue,
            consumer_tag,
            no_local: bits & 1 != 0,
            no_ack: bits & (1 << 1) != 0,
            exclusive: bits & (1 << 2) != 0,
            no_wait: bits & (1 << 3) != 0,
            arguments,
        })
    }
}

/// Confirms a consume, echoing the (possibly server-generated) tag.
/// `basic.consume-ok`
#[derive(Debug, Clone, PartialEq)]
pub struct BasicConsumeOk {
    /// The consumer's tag, unique within the channel
    pub consumer_tag: ShortString,
}

impl BasicConsumeOk {
    pub(crate) fn encode_args(&self, dst: &mut impl BufMut) {
        self.consumer_tag.encode(dst);
    }

    pub(crate) fn decode_args(src: &mut impl Buf) -> Result<Self, Error> {
        Ok(Self {
            consumer_tag: ShortString::decode(src)?,
        })
    }
}

/// Ends a consumer. Sent by the client to cancel, or by the server when the
/// consumed queue disappears. `basic.cancel`
#[derive(Debug, Clone, PartialEq)]
pub struct BasicCancel {
    /// Tag of the consumer to cancel
    pub consumer_tag: ShortString,
    /// Do not wait for a cancel-ok reply
    pub no_wait: bool,
}

impl BasicCancel {
    pub(crate) fn encode_args(&self, dst: &mut impl BufMut) {
        self.consumer_tag.encode(dst);
        dst.put_u8(self.no_wait as u8);
    }

    pub(crate) fn decode_args(src: &mut impl Buf) -> Result<Self, Error> {
        Ok(Self {
            consumer_tag: ShortString::decode(src)?,
            no_wait: codec::read_u8(src)? & 1 != 0,
        })
    }
}

/// Confirms a cancel. `basic.cancel-ok`
#[derive(Debug, Clone, PartialEq)]
pub struct BasicCancelOk {
    /// Tag of the cancelled consumer
    pub consumer_tag: ShortString,
}

impl BasicCancelOk {
    pub(crate) fn encode_args(&self, dst: &mut impl BufMut) {
        self.consumer_tag.encode(dst);
    }

    pub(crate) fn decode_args(src: &mut impl Buf) -> Result<Self, Error> {
        Ok(Self {
            consumer_tag: ShortString::decode(src)?,
        })
    }
}

/// Publishes a message; content header and body frames follow.
/// `basic.publish`
#[derive(Debug, Clone, PartialEq)]
pub struct BasicPublish {
    /// Exchange to publish to; empty for the default exchange
    pub exchange: ShortString,
    /// Routing key
    pub routing_key: ShortString,
    /// Return the message if it cannot be routed to any queue
    pub mandatory: bool,
    /// Return the message if it cannot be delivered to a consumer
    /// immediately (not implemented by RabbitMQ)
    pub immediate: bool,
}

impl BasicPublish {
    pub(crate) fn encode_args(&self, dst: &mut impl BufMut) {
        codec::write_u16(dst, 0, Endianness::Big); // reserved ticket
        self.exchange.encode(dst);
        self.routing_key.encode(dst);
        let bits = self.mandatory as u8 | (self.immediate as u8) << 1;
        dst.put_u8(bits);
    }

    pub(crate) fn decode_args(src: &mut impl Buf) -> Result<Self, Error> {
        let _ticket = codec::read_u16(src, Endianness::Big)?;
        let exchange = ShortString::decode(src)?;
        let routing_key = ShortString::decode(src)?;
        let bits = codec::read_u8(src)?;
        Ok(Self {
            exchange,
            routing_key,
            mandatory: bits & 1 != 0,
            immediate: bits & (1 << 1) != 0,
        })
    }
}

/// Hands back an undeliverable message; content frames follow.
/// `basic.return`
#[derive(Debug, Clone, PartialEq)]
pub struct BasicReturn {
    /// Why the message was returned
    pub reply_code: u16,
    /// Human-readable reason
    pub reply_text: ShortString,
    /// Exchange the message was published to
    pub exchange: ShortString,
    /// Routing key it was published with
    pub routing_key: ShortString,
}

impl BasicReturn {
    pub(crate) fn encode_args(&self, dst: &mut impl BufMut) {
        codec::write_u16(dst, self.reply_code, Endianness::Big);
        self.reply_text.encode(dst);
        self.exchange.encode(dst);
        self.routing_key.encode(dst);
    }

    pub(crate) fn decode_args(src: &mut impl Buf) -> Result<Self, Error> {
        Ok(Self {
            reply_code: codec::read_u16(src, Endianness::Big)?,
            reply_text: ShortString::decode(src)?,
            exchange: ShortString::decode(src)?,
            routing_key: ShortString::decode(src)?,
        })
    }
}

/// Delivers a message to a consumer; content frames follow.
/// `basic.deliver`
#[derive(Debug, Clone, PartialEq)]
pub struct BasicDeliver {
    /// Tag of the consumer receiving the message
    pub consumer_tag: ShortString,
    /// Server-assigned delivery tag, unique within the channel
    pub delivery_tag: u64,
    /// The message may have been delivered before
    pub redelivered: bool,
    /// Exchange the message was published to
    pub exchange: ShortString,
    /// Routing key it was published with
    pub routing_key: ShortString,
}

impl BasicDeliver {
    pub(crate) fn encode_args(&self, dst: &mut impl BufMut) {
        self.consumer_tag.encode(dst);
        codec::write_u64(dst, self.delivery_tag, Endianness::Big);
        dst.put_u8(self.redelivered as u8);
        self.exchange.encode(dst);
        self.routing_key.encode(dst);
    }

    pub(crate) fn decode_args(src: &mut impl Buf) -> Result<Self, Error> {
        Ok(Self {
            consumer_tag: ShortString::decode(src)?,
            delivery_tag: codec::read_u64(src, Endianness::Big)?,
            redelivered: codec::read_u8(src)? & 1 != 0,
            exchange: ShortString::decode(src)?,
            routing_key: ShortString::decode(src)?,
        })
    }
}

/// Synchronously fetches one message from a queue. `basic.get`
#[derive(Debug, Clone, PartialEq)]
pub struct BasicGet {
    /// Queue to fetch from
    pub queue: ShortString,
    /// The server considers the message acknowledged once sent
    pub no_ack: bool,
}

impl BasicGet {
    pub(crate) fn encode_args(&self, dst: &mut impl BufMut) {
        codec::write_u16(dst, 0, Endianness::Big); // reserved ticket
        self.queue.encode(dst);
        dst.put_u8(self.no_ack as u8);
    }

    pub(crate) fn decode_args(src: &mut impl Buf) -> Result<Self, Error> {
        let _ticket = codec::read_u16(src, Endianness::Big)?;
        Ok(Self {
            queue: ShortString::decode(src)?,
            no_ack: codec::read_u8(src)? & 1 != 0,
        })
    }
}

/// Answers a get with a message; content frames follow. `basic.get-ok`
#[derive(Debug, Clone, PartialEq)]
pub struct BasicGetOk {
    /// Server-assigned delivery tag, unique within the channel
    pub delivery_tag: u64,
    /// The message may have been delivered before
    pub redelivered: bool,
    /// Exchange the message was published to
    pub exchange: ShortString,
    /// Routing key it was published with
    pub routing_key: ShortString,
    /// Messages remaining in the queue
    pub message_count: u32,
}

impl BasicGetOk {
    pub(crate) fn encode_args(&self, dst: &mut impl BufMut) {
        codec::write_u64(dst, self.delivery_tag, Endianness::Big);
        dst.put_u8(self.redelivered as u8);
        self.exchange.encode(dst);
        self.routing_key.encode(dst);
        codec::write_u32(dst, self.message_count, Endianness::Big);
    }

    pub(crate) fn decode_args(src: &mut impl Buf) -> Result<Self, Error> {
        Ok(Self {
            delivery_tag: codec::read_u64(src, Endianness::Big)?,
            redelivered: codec::read_u8(src)? & 1 != 0,
            exchange: ShortString::decode(src)?,
            routing_key: ShortString::decode(src)?,
            message_count: codec::read_u32(src, Endianness::Big)?,
        })
    }
}

/// Acknowledges one or more deliveries. `basic.ack`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasicAck {
    /// Delivery tag being acknowledged; 0 with `multiple` means everything
    /// outstanding
    pub delivery_tag: u64,
    /// Also acknowledge every lower tag
    pub multiple: bool,
}

impl BasicAck {
    pub(crate) fn encode_args(&self, dst: &mut impl BufMut) {
        codec::write_u64(dst, self.delivery_tag, Endianness::Big);
        dst.put_u8(self.multiple as u8);
    }

    pub(crate) fn decode_args(src: &mut impl Buf) -> Result<Self, Error> {
        Ok(Self {
            delivery_tag: codec::read_u64(src, Endianness::Big)?,
            multiple: codec::read_u8(src)? & 1 != 0,
        })
    }
}

/// Rejects a single delivery. `basic.reject`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasicReject {
    /// Delivery tag being rejected
    pub delivery_tag: u64,
    /// Requeue rather than discard or dead-letter
    pub requeue: bool,
}

impl BasicReject {
    pub(crate) fn encode_args(&self, dst: &mut impl BufMut) {
        codec::write_u64(dst, self.delivery_tag, Endianness::Big);
        dst.put_u8(self.requeue as u8);
    }

    pub(crate) fn decode_args(src: &mut impl Buf) -> Result<Self, Error> {
        Ok(Self {
            delivery_tag: codec::read_u64(src, Endianness::Big)?,
            requeue: codec::read_u8(src)? & 1 != 0,
        })
    }
}

/// Redelivers every unacknowledged message on the channel. `basic.recover`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasicRecover {
    /// Requeue (possibly to other consumers) rather than redeliver to the
    /// original recipient
    pub requeue: bool,
}

impl BasicRecover {
    pub(crate) fn encode_args(&self, dst: &mut impl BufMut) {
        dst.put_u8(self.requeue as u8);
    }

    pub(crate) fn decode_args(src: &mut impl Buf) -> Result<Self, Error> {
        Ok(Self {
            requeue: codec::read_u8(src)? & 1 != 0,
        })
    }
}

/// Negatively acknowledges one or more deliveries, or rejects publishes in
/// confirm mode (RabbitMQ extension). `basic.nack`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasicNack {
    /// Delivery tag being rejected
    pub delivery_tag: u64,
    /// Also reject every lower tag
    pub multiple: bool,
    /// Requeue rather than discard or dead-letter
    pub requeue: bool,
}

impl BasicNack {
    pub(crate) fn encode_args(&self, dst: &mut impl BufMut) {
        codec::write_u64(dst, self.delivery_tag, Endianness::Big);
        let bits = self.multiple as u8 | (self.requeue as u8) << 1;
        dst.put_u8(bits);
    }

    pub(crate) fn decode_args(src: &mut impl Buf) -> Result<Self, Error> {
        let delivery_tag = codec::read_u64(src, Endianness::Big)?;
        let bits = codec::read_u8(src)?;
        Ok(Self {
            delivery_tag,
            multiple: bits & 1 != 0,
            requeue: bits & (1 << 1) != 0,
        })
    }
}
