//! Connection-level error types

use std::sync::Arc;

use fe3o4_amqp_types::definitions::{
    COMMAND_INVALID, FRAME_ERROR, INTERNAL_ERROR, SYNTAX_ERROR, UNEXPECTED_FRAME,
};

use crate::frames::FrameError;

/// Why a connection stopped working.
///
/// Cloneable so that one failure can be fanned out to every channel and
/// stored as the closing cause in each handle.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The underlying transport failed
    #[error("transport error: {0}")]
    Io(Arc<std::io::Error>),

    /// The server answered the protocol header with its own header
    #[error("server does not support AMQP 0-9-1, header echo {0:?}")]
    ProtocolHeaderMismatch([u8; 8]),

    /// A frame payload could not be parsed
    #[error("frame decode failed: {0}")]
    Decode(#[from] fe3o4_amqp_types::Error),

    /// The peer sent a frame larger than the negotiated frame-max
    #[error("frame of {size} bytes exceeds the negotiated maximum of {max}")]
    FrameMaxExceeded {
        /// Size of the offending frame
        size: usize,
        /// The negotiated maximum
        max: usize,
    },

    /// A frame did not end with the 0xCE octet
    #[error("expected frame end octet 0xce, found {0:#04x}")]
    BadFrameEnd(u8),

    /// A frame carried an unknown type octet
    #[error("unknown frame type octet {0}")]
    UnknownFrameType(u8),

    /// The server went silent for two heartbeat intervals
    #[error("no traffic from the server within the heartbeat window")]
    HeartbeatTimeout,

    /// The peer violated the protocol in a way that forces a close
    #[error("protocol violation ({reply_code}): {reason}")]
    Protocol {
        /// Reply code reported in the outgoing `connection.close`
        reply_code: u16,
        /// What went wrong
        reason: String,
    },

    /// The broker closed the connection with `connection.close`
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

    /// Every channel id up to the negotiated channel-max is in use
    #[error("all {0} channel ids are in use")]
    ChannelMaxReached(u16),

    /// The connection is already closed
    #[error("connection is closed")]
    Closed,
}

impl Error {
    pub(crate) fn protocol(reply_code: u16, reason: impl Into<String>) -> Self {
        Self::Protocol {
            reply_code,
            reason: reason.into(),
        }
    }

    /// The reply code to carry in the `connection.close` this error triggers
    pub(crate) fn reply_code(&self) -> u16 {
        match self {
            Error::FrameMaxExceeded { .. } | Error::BadFrameEnd(_) | Error::UnknownFrameType(_) => {
                FRAME_ERROR
            }
            Error::Decode(_) => SYNTAX_ERROR,
            Error::Protocol { reply_code, .. } => *reply_code,
            Error::HeartbeatTimeout => UNEXPECTED_FRAME,
            Error::Io(_) | Error::ProtocolHeaderMismatch(_) => COMMAND_INVALID,
            _ => INTERNAL_ERROR,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl From<FrameError> for Error {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Io(err) => Self::Io(Arc::new(err)),
            FrameError::ProtocolHeaderMismatch(echo) => Self::ProtocolHeaderMismatch(echo),
            FrameError::FrameMaxExceeded { size, max } => Self::FrameMaxExceeded { size, max },
            FrameError::BadFrameEnd(octet) => Self::BadFrameEnd(octet),
            FrameError::UnknownFrameType(octet) => Self::UnknownFrameType(octet),
            FrameError::Value(err) => Self::Decode(err),
            FrameError::IdleTimeout => Self::HeartbeatTimeout,
        }
    }
}

/// Errors reported while establishing a connection, before the handshake
/// completes
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    /// The URL could not be parsed
    #[error(transparent)]
    Url(#[from] url::ParseError),

    /// The URL scheme is not `amqp`
    #[error("unsupported URL scheme {0:?}")]
    InvalidScheme(String),

    /// The URL parsed but does not name a usable endpoint
    #[error("invalid AMQP URL: {0}")]
    InvalidUrl(String),

    /// TCP connect or socket setup failed
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The server offered no SASL mechanism this client speaks
    #[error("server offers no supported SASL mechanism: {0:?}")]
    MechanismNotSupported(String),

    /// The handshake failed
    #[error(transparent)]
    Connection(#[from] Error),
}

impl From<FrameError> for OpenError {
    fn from(err: FrameError) -> Self {
        Self::Connection(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_violations_map_to_their_reply_codes() {
        let cases = [
            (FrameError::BadFrameEnd(0x00), FRAME_ERROR),
            (FrameError::UnknownFrameType(9), FRAME_ERROR),
            (
                FrameError::FrameMaxExceeded {
                    size: 200_000,
                    max: 131_072,
                },
                FRAME_ERROR,
            ),
            (
                FrameError::Value(fe3o4_amqp_types::Error::UnknownFieldType(0x7a)),
                SYNTAX_ERROR,
            ),
            (FrameError::IdleTimeout, UNEXPECTED_FRAME),
        ];
        for (violation, code) in cases {
            assert_eq!(Error::from(violation).reply_code(), code);
        }
    }
}
