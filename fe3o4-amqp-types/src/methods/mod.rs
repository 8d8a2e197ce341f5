//! One struct per AMQP 0-9-1 method, with argument encode/decode
//!
//! Every struct carries the arguments of one method as defined by the
//! protocol grammar; reserved fields (tickets and the like) are written as
//! zero and skipped on read rather than surfaced. [`Method`] is the dispatch
//! enum keyed by `(class-id, method-id)`.

use bytes::{Buf, BufMut};

use crate::codec::{self, Endianness};
use crate::definitions::{
    CLASS_BASIC, CLASS_CHANNEL, CLASS_CONFIRM, CLASS_CONNECTION, CLASS_EXCHANGE, CLASS_QUEUE,
    CLASS_TX,
};
use crate::error::Error;

mod basic;
mod channel;
mod confirm;
mod connection;
mod exchange;
mod queue;
mod tx;

pub use basic::*;
pub use channel::*;
pub use confirm::*;
pub use connection::*;
pub use exchange::*;
pub use queue::*;
pub use tx::*;

/// A decoded method frame payload
#[derive(Debug, Clone, PartialEq)]
pub enum Method {
    /// `connection.start`
    Start(Start),
    /// `connection.start-ok`
    StartOk(StartOk),
    /// `connection.secure`
    Secure(Secure),
    /// `connection.secure-ok`
    SecureOk(SecureOk),
    /// `connection.tune`
    Tune(Tune),
    /// `connection.tune-ok`
    TuneOk(TuneOk),
    /// `connection.open`
    Open(Open),
    /// `connection.open-ok`
    OpenOk,
    /// `connection.close`
    Close(Close),
    /// `connection.close-ok`
    CloseOk,
    /// `connection.blocked`
    Blocked(Blocked),
    /// `connection.unblocked`
    Unblocked,

    /// `channel.open`
    ChannelOpen,
    /// `channel.open-ok`
    ChannelOpenOk,
    /// `channel.flow`
    ChannelFlow(ChannelFlow),
    /// `channel.flow-ok`
    ChannelFlowOk(ChannelFlowOk),
    /// `channel.close`
    ChannelClose(ChannelClose),
    /// `channel.close-ok`
    ChannelCloseOk,

    /// `exchange.declare`
    ExchangeDeclare(ExchangeDeclare),
    /// `exchange.declare-ok`
    ExchangeDeclareOk,
    /// `exchange.delete`
    ExchangeDelete(ExchangeDelete),
    /// `exchange.delete-ok`
    ExchangeDeleteOk,
    /// `exchange.bind`
    ExchangeBind(ExchangeBind),
    /// `exchange.bind-ok`
    ExchangeBindOk,
    /// `exchange.unbind`
    ExchangeUnbind(ExchangeUnbind),
    /// `exchange.unbind-ok`
    ExchangeUnbindOk,

    /// `queue.declare`
    QueueDeclare(QueueDeclare),
    /// `queue.declare-ok`
    QueueDeclareOk(QueueDeclareOk),
    /// `queue.bind`
    QueueBind(QueueBind),
    /// `queue.bind-ok`
    QueueBindOk,
    /// `queue.purge`
    QueuePurge(QueuePurge),
    /// `queue.purge-ok`
    QueuePurgeOk(QueuePurgeOk),
    /// `queue.delete`
    QueueDelete(QueueDelete),
    /// `queue.delete-ok`
    QueueDeleteOk(QueueDeleteOk),
    /// `queue.unbind`
    QueueUnbind(QueueUnbind),
    /// `queue.unbind-ok`
    QueueUnbindOk,

    /// `basic.qos`
    BasicQos(BasicQos),
    /// `basic.qos-ok`
    BasicQosOk,
    /// `basic.consume`
    BasicConsume(BasicConsume),
    /// `basic.consume-ok`
    BasicConsumeOk(BasicConsumeOk),
    /// `basic.cancel`
    BasicCancel(BasicCancel),
    /// `basic.cancel-ok`
    BasicCancelOk(BasicCancelOk),
    /// `basic.publish`
    BasicPublish(BasicPublish),
    /// `basic.return`
    BasicReturn(BasicReturn),
    /// `basic.deliver`
    BasicDeliver(BasicDeliver),
    /// `basic.get`
    BasicGet(BasicGet),
    /// `basic.get-ok`
    BasicGetOk(BasicGetOk),
    /// `basic.get-empty`
    BasicGetEmpty,
    /// `basic.ack`
    BasicAck(BasicAck),
    /// `basic.reject`
    BasicReject(BasicReject),
    /// `basic.recover`
    BasicRecover(BasicRecover),
    /// `basic.recover-ok`
    BasicRecoverOk,
    /// `basic.nack`
    BasicNack(BasicNack),

    /// `confirm.select`
    ConfirmSelect(ConfirmSelect),
    /// `confirm.select-ok`
    ConfirmSelectOk,

    /// `tx.select`
    TxSelect,
    /// `tx.select-ok`
    TxSelectOk,
    /// `tx.commit`
    TxCommit,
    /// `tx.commit-ok`
    TxCommitOk,
    /// `tx.rollback`
    TxRollback,
    /// `tx.rollback-ok`
    TxRollbackOk,
}

impl Method {
    /// The `(class-id, method-id)` pair identifying this method on the wire
    pub fn ids(&self) -> (u16, u16) {
        match self {
            Method::Start(_) => (CLASS_CONNECTION, 10),
            Method::StartOk(_) => (CLASS_CONNECTION, 11),
            Method::Secure(_) => (CLASS_CONNECTION, 20),
            Method::SecureOk(_) => (CLASS_CONNECTION, 21),
            Method::Tune(_) => (CLASS_CONNECTION, 30),
            Method::TuneOk(_) => (CLASS_CONNECTION, 31),
            Method::Open(_) => (CLASS_CONNECTION, 40),
            Method::OpenOk => (CLASS_CONNECTION, 41),
            Method::Close(_) => (CLASS_CONNECTION, 50),
            Method::CloseOk => (CLASS_CONNECTION, 51),
            Method::Blocked(_) => (CLASS_CONNECTION, 60),
            Method::Unblocked => (CLASS_CONNECTION, 61),

            Method::ChannelOpen => (CLASS_CHANNEL, 10),
            Method::ChannelOpenOk => (CLASS_CHANNEL, 11),
            Method::ChannelFlow(_) => (CLASS_CHANNEL, 20),
            Method::ChannelFlowOk(_) => (CLASS_CHANNEL, 21),
            Method::ChannelClose(_) => (CLASS_CHANNEL, 40),
            Method::ChannelCloseOk => (CLASS_CHANNEL, 41),

            Method::ExchangeDeclare(_) => (CLASS_EXCHANGE, 10),
            Method::ExchangeDeclareOk => (CLASS_EXCHANGE, 11),
            Method::ExchangeDelete(_) => (CLASS_EXCHANGE, 20),
            Method::ExchangeDeleteOk => (CLASS_EXCHANGE, 21),
            Method::ExchangeBind(_) => (CLASS_EXCHANGE, 30),
            Method::ExchangeBindOk => (CLASS_EXCHANGE, 31),
            Method::ExchangeUnbind(_) => (CLASS_EXCHANGE, 40),
            // the one irregular reply id in the grammar
            Method::ExchangeUnbindOk => (CLASS_EXCHANGE, 51),

            Method::QueueDeclare(_) => (CLASS_QUEUE, 10),
            Method::QueueDeclareOk(_) => (CLASS_QUEUE, 11),
            Method::QueueBind(_) => (CLASS_QUEUE, 20),
            Method::QueueBindOk => (CLASS_QUEUE, 21),
            Method::QueuePurge(_) => (CLASS_QUEUE, 30),
            Method::QueuePurgeOk(_) => (CLASS_QUEUE, 31),
            Method::QueueDelete(_) => (CLASS_QUEUE, 40),
            Method::QueueDeleteOk(_) => (CLASS_QUEUE, 41),
            Method::QueueUnbind(_) => (CLASS_QUEUE, 50),
            Method::QueueUnbindOk => (CLASS_QUEUE, 51),

            Method::BasicQos(_) => (CLASS_BASIC, 10),
            Method::BasicQosOk => (CLASS_BASIC, 11),
            Method::BasicConsume(_) => (CLASS_BASIC, 20),
            Method::BasicConsumeOk(_) => (CLASS_BASIC, 21),
            Method::BasicCancel(_) => (CLASS_BASIC, 30),
            Method::BasicCancelOk(_) => (CLASS_BASIC, 31),
            Method::BasicPublish(_) => (CLASS_BASIC, 40),
            Method::BasicReturn(_) => (CLASS_BASIC, 50),
            Method::BasicDeliver(_) => (CLASS_BASIC, 60),
            Method::BasicGet(_) => (CLASS_BASIC, 70),
            Method::BasicGetOk(_) => (CLASS_BASIC, 71),
            Method::BasicGetEmpty => (CLASS_BASIC, 72),
            Method::BasicAck(_) => (CLASS_BASIC, 80),
            Method::BasicReject(_) => (CLASS_BASIC, 90),
            Method::BasicRecover(_) => (CLASS_BASIC, 110),
            Method::BasicRecoverOk => (CLASS_BASIC, 111),
            Method::BasicNack(_) => (CLASS_BASIC, 120),

            Method::ConfirmSelect(_) => (CLASS_CONFIRM, 10),
            Method::ConfirmSelectOk => (CLASS_CONFIRM, 11),

            Method::TxSelect => (CLASS_TX, 10),
            Method::TxSelectOk => (CLASS_TX, 11),
            Method::TxCommit => (CLASS_TX, 20),
            Method::TxCommitOk => (CLASS_TX, 21),
            Method::TxRollback => (CLASS_TX, 30),
            Method::TxRollbackOk => (CLASS_TX, 31),
        }
    }

    /// The `class.method` name, for diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            Method::Start(_) => "connection.start",
            Method::StartOk(_) => "connection.start-ok",
            Method::Secure(_) => "connection.secure",
            Method::SecureOk(_) => "connection.secure-ok",
            Method::Tune(_) => "connection.tune",
            Method::TuneOk(_) => "connection.tune-ok",
            Method::Open(_) => "connection.open",
            Method::OpenOk => "connection.open-ok",
            Method::Close(_) => "connection.close",
            Method::CloseOk => "connection.close-ok",
            Method::Blocked(_) => "connection.blocked",
            Method::Unblocked => "connection.unblocked",
            Method::ChannelOpen => "channel.open",
            Method::ChannelOpenOk => "channel.open-ok",
            Method::ChannelFlow(_) => "channel.flow",
            Method::ChannelFlowOk(_) => "channel.flow-ok",
            Method::ChannelClose(_) => "channel.close",
            Method::ChannelCloseOk => "channel.close-ok",
            Method::ExchangeDeclare(_) => "exchange.declare",
            Method::ExchangeDeclareOk => "exchange.declare-ok",
            Method::ExchangeDelete(_) => "exchange.delete",
            Method::ExchangeDeleteOk => "exchange.delete-ok",
            Method::ExchangeBind(_) => "exchange.bind",
            Method::ExchangeBindOk => "exchange.bind-ok",
            Method::ExchangeUnbind(_) => "exchange.unbind",
            Method::ExchangeUnbindOk => "exchange.unbind-ok",
            Method::QueueDeclare(_) => "queue.declare",
            Method::QueueDeclareOk(_) => "queue.declare-ok",
            Method::QueueBind(_) => "queue.bind",
            Method::QueueBindOk => "queue.bind-ok",
            Method::QueuePurge(_) => "queue.purge",
            Method::QueuePurgeOk(_) => "queue.purge-ok",
            Method::QueueDelete(_) => "queue.delete",
            Method::QueueDeleteOk(_) => "queue.delete-ok",
            Method::QueueUnbind(_) => "queue.unbind",
            Method::QueueUnbindOk => "queue.unbind-ok",
            Method::BasicQos(_) => "basic.qos",
            Method::BasicQosOk => "basic.qos-ok",
            Method::BasicConsume(_) => "basic.consume",
            Method::BasicConsumeOk(_) => "basic.consume-ok",
            Method::BasicCancel(_) => "basic.cancel",
            Method::BasicCancelOk(_) => "basic.cancel-ok",
            Method::BasicPublish(_) => "basic.publish",
            Method::BasicReturn(_) => "basic.return",
            Method::BasicDeliver(_) => "basic.deliver",
            Method::BasicGet(_) => "basic.get",
            Method::BasicGetOk(_) => "basic.get-ok",
            Method::BasicGetEmpty => "basic.get-empty",
            Method::BasicAck(_) => "basic.ack",
            Method::BasicReject(_) => "basic.reject",
            Method::BasicRecover(_) => "basic.recover",
            Method::BasicRecoverOk => "basic.recover-ok",
            Method::BasicNack(_) => "basic.nack",
            Method::ConfirmSelect(_) => "confirm.select",
            Method::ConfirmSelectOk => "confirm.select-ok",
            Method::TxSelect => "tx.select",
            Method::TxSelectOk => "tx.select-ok",
            Method::TxCommit => "tx.commit",
            Method::TxCommitOk => "tx.commit-ok",
            Method::TxRollback => "tx.rollback",
            Method::TxRollbackOk => "tx.rollback-ok",
        }
    }

    /// Whether this method announces content frames to follow
    pub fn carries_content(&self) -> bool {
        matches!(
            self,
            Method::BasicPublish(_)
                | Method::BasicReturn(_)
                | Method::BasicDeliver(_)
                | Method::BasicGetOk(_)
        )
    }

    /// Writes class id, method id and arguments
    pub fn encode(&self, dst: &mut impl BufMut) {
        let (class_id, method_id) = self.ids();
        codec::write_u16(dst, class_id, Endianness::Big);
        codec::write_u16(dst, method_id, Endianness::Big);
        match self {
            Method::Start(m) => m.encode_args(dst),
            Method::StartOk(m) => m.encode_args(dst),
            Method::Secure(m) => m.encode_args(dst),
            Method::SecureOk(m) => m.encode_args(dst),
            Method::Tune(m) => m.encode_args(dst),
            Method::TuneOk(m) => m.encode_args(dst),
            Method::Open(m) => m.encode_args(dst),
            Method::OpenOk => {
                // reserved known-hosts shortstr
                dst.put_u8(0);
            }
            Method::Close(m) => m.encode_args(dst),
            Method::Blocked(m) => m.encode_args(dst),
            Method::ChannelOpen => {
                // reserved out-of-band shortstr
                dst.put_u8(0);
            }
            Method::ChannelOpenOk => {
                // reserved channel-id longstr
                codec::write_u32(dst, 0, Endianness::Big);
            }
            Method::ChannelFlow(m) => m.encode_args(dst),
            Method::ChannelFlowOk(m) => m.encode_args(dst),
            Method::ChannelClose(m) => m.encode_args(dst),
            Method::ExchangeDeclare(m) => m.encode_args(dst),
            Method::ExchangeDelete(m) => m.encode_args(dst),
            Method::ExchangeBind(m) => m.encode_args(dst),
            Method::ExchangeUnbind(m) => m.encode_args(dst),
            Method::QueueDeclare(m) => m.encode_args(dst),
            Method::QueueDeclareOk(m) => m.encode_args(dst),
            Method::QueueBind(m) => m.encode_args(dst),
            Method::QueuePurge(m) => m.encode_args(dst),
            Method::QueuePurgeOk(m) => m.encode_args(dst),
            Method::QueueDelete(m) => m.encode_args(dst),
            Method::QueueDeleteOk(m) => m.encode_args(dst),
            Method::QueueUnbind(m) => m.encode_args(dst),
            Method::BasicQos(m) => m.encode_args(dst),
            Method::BasicConsume(m) => m.encode_args(dst),
            Method::BasicConsumeOk(m) => m.encode_args(dst),
            Method::BasicCancel(m) => m.encode_args(dst),
            Method::BasicCancelOk(m) => m.encode_args(dst),
            Method::BasicPublish(m) => m.encode_args(dst),
            Method::BasicReturn(m) => m.encode_args(dst),
            Method::BasicDeliver(m) => m.encode_args(dst),
            Method::BasicGet(m) => m.encode_args(dst),
            Method::BasicGetOk(m) => m.encode_args(dst),
            Method::BasicGetEmpty => {
                // reserved cluster-id shortstr
                dst.put_u8(0);
            }
            Method::BasicAck(m) => m.encode_args(dst),
            Method::BasicReject(m) => m.encode_args(dst),
            Method::BasicRecover(m) => m.encode_args(dst),
            Method::BasicNack(m) => m.encode_args(dst),
            Method::ConfirmSelect(m) => m.encode_args(dst),
            // no arguments
            Method::CloseOk
            | Method::Unblocked
            | Method::ChannelCloseOk
            | Method::ExchangeDeclareOk
            | Method::ExchangeDeleteOk
            | Method::ExchangeBindOk
            | Method::ExchangeUnbindOk
            | Method::QueueBindOk
            | Method::QueueUnbindOk
            | Method::BasicQosOk
            | Method::BasicRecoverOk
            | Method::ConfirmSelectOk
            | Method::TxSelect
            | Method::TxSelectOk
            | Method::TxCommit
            | Method::TxCommitOk
            | Method::TxRollback
            | Method::TxRollbackOk => {}
        }
    }

    /// Reads class id, method id and the arguments they announce
    pub fn decode(src: &mut impl Buf) -> Result<Self, Error> {
        let class_id = codec::read_u16(src, Endianness::Big)?;
        let method_id = codec::read_u16(src, Endianness::Big)?;
        let method = match (class_id, method_id) {
            (CLASS_CONNECTION, 10) => Method::Start(Start::decode_args(src)?),
            (CLASS_CONNECTION, 11) => Method::StartOk(StartOk::decode_args(src)?),
            (CLASS_CONNECTION, 20) => Method::Secure(Secure::decode_args(src)?),
            (CLASS_CONNECTION, 21) => Method::SecureOk(SecureOk::decode_args(src)?),
            (CLASS_CONNECTION, 30) => Method::Tune(Tune::decode_args(src)?),
            (CLASS_CONNECTION, 31) => Method::TuneOk(TuneOk::decode_args(src)?),
            (CLASS_CONNECTION, 40) => Method::Open(Open::decode_args(src)?),
            (CLASS_CONNECTION, 41) => {
                let _reserved = codec::read_short_str(src)?;
                Method::OpenOk
            }
            (CLASS_CONNECTION, 50) => Method::Close(Close::decode_args(src)?),
            (CLASS_CONNECTION, 51) => Method::CloseOk,
            (CLASS_CONNECTION, 60) => Method::Blocked(Blocked::decode_args(src)?),
            (CLASS_CONNECTION, 61) => Method::Unblocked,

            (CLASS_CHANNEL, 10) => {
                let _reserved = codec::read_short_str(src)?;
                Method::ChannelOpen
            }
            (CLASS_CHANNEL, 11) => {
                let _reserved = codec::read_long_str(src)?;
                Method::ChannelOpenOk
            }
            (CLASS_CHANNEL, 20) => Method::ChannelFlow(ChannelFlow::decode_args(src)?),
            (CLASS_CHANNEL, 21) => Method::ChannelFlowOk(ChannelFlowOk::decode_args(src)?),
            (CLASS_CHANNEL, 40) => Method::ChannelClose(ChannelClose::decode_args(src)?),
            (CLASS_CHANNEL, 41) => Method::ChannelCloseOk,

            (CLASS_EXCHANGE, 10) => Method::ExchangeDeclare(ExchangeDeclare::decode_args(src)?),
            (CLASS_EXCHANGE, 11) => Method::ExchangeDeclareOk,
            (CLASS_EXCHANGE, 20) => Method::ExchangeDelete(ExchangeDelete::decode_args(src)?),
            (CLASS_EXCHANGE, 21) => Method::ExchangeDeleteOk,
            (CLASS_EXCHANGE, 30) => Method::ExchangeBind(ExchangeBind::decode_args(src)?),
            (CLASS_EXCHANGE, 31) => Method::ExchangeBindOk,
            (CLASS_EXCHANGE, 40) => Method::ExchangeUnbind(ExchangeUnbind::decode_args(src)?),
            (CLASS_EXCHANGE, 51) => Method::ExchangeUnbindOk,

            (CLASS_QUEUE, 10) => Method::QueueDeclare(QueueDeclare::decode_args(src)?),
            (CLASS_QUEUE, 11) => Method::QueueDeclareOk(QueueDeclareOk::decode_args(src)?),
            (CLASS_QUEUE, 20) => Method::QueueBind(QueueBind::decode_args(src)?),
            (CLASS_QUEUE, 21) => Method::QueueBindOk,
            (CLASS_QUEUE, 30) => Method::QueuePurge(QueuePurge::decode_args(src)?),
            (CLASS_QUEUE, 31) => Method::QueuePurgeOk(QueuePurgeOk::decode_args(src)?),
            (CLASS_QUEUE, 40) => Method::QueueDelete(QueueDelete::decode_args(src)?),
            (CLASS_QUEUE, 41) => Method::QueueDeleteOk(QueueDeleteOk::decode_args(src)?),
            (CLASS_QUEUE, 50) => Method::QueueUnbind(QueueUnbind::decode_args(src)?),
            (CLASS_QUEUE, 51) => Method::QueueUnbindOk,

            (CLASS_BASIC, 10) => Method::BasicQos(BasicQos::decode_args(src)?),
            (CLASS_BASIC, 11) => Method::BasicQosOk,
            (CLASS_BASIC, 20) => Method::BasicConsume(BasicConsume::decode_args(src)?),
            (CLASS_BASIC, 21) => Method::BasicConsumeOk(BasicConsumeOk::decode_args(src)?),
            (CLASS_BASIC, 30) => Method::BasicCancel(BasicCancel::decode_args(src)?),
            (CLASS_BASIC, 31) => Method::BasicCancelOk(BasicCancelOk::decode_args(src)?),
            (CLASS_BASIC, 40) => Method::BasicPublish(BasicPublish::decode_args(src)?),
            (CLASS_BASIC, 50) => Method::BasicReturn(BasicReturn::decode_args(src)?),
            (CLASS_BASIC, 60) => Method::BasicDeliver(BasicDeliver::decode_args(src)?),
            (CLASS_BASIC, 70) => Method::BasicGet(BasicGet::decode_args(src)?),
            (CLASS_BASIC, 71) => Method::BasicGetOk(BasicGetOk::decode_args(src)?),
            (CLASS_BASIC, 72) => {
                let _reserved = codec::read_short_str(src)?;
                Method::BasicGetEmpty
            }
            (CLASS_BASIC, 80) => Method::BasicAck(BasicAck::decode_args(src)?),
            (CLASS_BASIC, 90) => Method::BasicReject(BasicReject::decode_args(src)?),
            (CLASS_BASIC, 110) => Method::BasicRecover(BasicRecover::decode_args(src)?),
            (CLASS_BASIC, 111) => Method::BasicRecoverOk,
            (CLASS_BASIC, 120) => Method::BasicNack(BasicNack::decode_args(src)?),

            (CLASS_CONFIRM, 10) => Method::ConfirmSelect(ConfirmSelect::decode_args(src)?),
            (CLASS_CONFIRM, 11) => Method::ConfirmSelectOk,

            (CLASS_TX, 10) => Method::TxSelect,
            (CLASS_TX, 11) => Method::TxSelectOk,
            (CLASS_TX, 20) => Method::TxCommit,
            (CLASS_TX, 21) => Method::TxCommitOk,
            (CLASS_TX, 30) => Method::TxRollback,
            (CLASS_TX, 31) => Method::TxRollbackOk,

            (class_id, method_id) => {
                return Err(Error::UnknownMethod {
                    class_id,
                    method_id,
                })
            }
        };
        Ok(method)
    }
}
