/// Errors raised at the framing layer. All of them are fatal to the
/// connection that produced them.
#[derive(Debug, thiserror::Error)]
pub(crate) enum FrameError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The server answered the protocol header with its own header, which
    /// means it does not speak AMQP 0-9-1
    #[error("server does not support AMQP 0-9-1, header echo {0:?}")]
    ProtocolHeaderMismatch([u8; 8]),

    #[error("frame of {size} bytes exceeds the negotiated maximum of {max}")]
    FrameMaxExceeded { size: usize, max: usize },

    #[error("expected frame end octet 0xce, found {0:#04x}")]
    BadFrameEnd(u8),

    #[error("unknown frame type octet {0}")]
    UnknownFrameType(u8),

    #[error(transparent)]
    Value(#[from] fe3o4_amqp_types::Error),

    /// The peer went silent for longer than the dead-peer window
    #[error("no traffic from the peer within the heartbeat window")]
    IdleTimeout,
}
