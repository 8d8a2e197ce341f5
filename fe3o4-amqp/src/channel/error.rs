//! Channel-level error types

use fe3o4_amqp_types::ShortString;

use crate::connection;

/// Why a channel operation failed or the channel stopped working.
///
/// Cloneable so the closing cause can settle every queued continuation and
/// still be stored for later calls on the handle.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The connection the channel was multiplexed on failed
    #[error("connection failure took the channel down: {0}")]
    Connection(#[from] connection::Error),

    /// The broker closed the channel with `channel.close`
    #[error("closed by the broker: {reply_code} {reply_text}")]
    ClosedByBroker {
        /// Broker-reported reply code
        reply_code: u16,
        /// Broker-reported reason
        reply_text: String,
        /// Class id of the method that caused the close, or 0
        class_id: u16,
        /// Method id of the method that caused the close, or 0
        method_id: u16,
    },

    /// The channel (or its connection) was closed locally
    #[error("channel is closed")]
    Closed,

    /// The broker rejected a publish in confirm mode
    #[error("publish with delivery tag {0} was nacked by the broker")]
    Nacked(u64),

    /// The broker cancelled a consumer, e.g. because its queue was deleted
    #[error("consumer {0} was cancelled by the broker")]
    CancelledByServer(ShortString),

    /// A locally supplied value cannot be represented on the wire; nothing
    /// was sent
    #[error(transparent)]
    Value(#[from] fe3o4_amqp_types::Error),
}
