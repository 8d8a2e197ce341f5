//! Errors raised by the binary codec

/// Errors raised while encoding or decoding AMQP 0-9-1 wire types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The buffer does not hold enough bytes for the value being decoded.
    ///
    /// The frame decoder treats this as "wait for more bytes"; everywhere
    /// else it means a length prefix overran its enclosing buffer and the
    /// stream can no longer be trusted.
    #[error("not enough bytes in the buffer")]
    Incomplete,

    /// A short string may carry at most 255 bytes
    #[error("short string is {0} bytes long, the wire limit is 255")]
    ShortStringTooLong(usize),

    /// Short strings are required to be valid UTF-8
    #[error("invalid UTF-8 in short string")]
    Utf8(#[from] std::str::Utf8Error),

    /// An unrecognized field value type tag
    #[error("unknown field value type tag {0:#04x}")]
    UnknownFieldType(u8),

    /// A `(class-id, method-id)` pair this client does not speak
    #[error("unknown method {class_id}.{method_id}")]
    UnknownMethod {
        /// Class id of the offending method frame
        class_id: u16,
        /// Method id of the offending method frame
        method_id: u16,
    },

    /// Field tables carry signed 64-bit integers; larger values cannot
    /// round-trip and are rejected before any bytes are written
    #[error("u64 value {0} exceeds the signed 64-bit wire range")]
    U64OutOfRange(u64),
}
