//! Protocol constants defined by the AMQP 0-9-1 specification

/// The IANA assigned port number for AMQP over TCP
pub const PORT: u16 = 5672;

/// Major protocol version
pub const MAJOR: u8 = 0;

/// Minor protocol version
pub const MINOR: u8 = 9;

/// Protocol revision
pub const REVISION: u8 = 1;

/// The 8-byte protocol header sent by the client before any frame.
///
/// A server that does not speak this version responds by writing its own
/// header and closing the socket.
pub const PROTOCOL_HEADER: [u8; 8] = [b'A', b'M', b'Q', b'P', 0, MAJOR, MINOR, REVISION];

/// Number of bytes in a frame header (type, channel, payload length)
pub const FRAME_HEADER_SIZE: usize = 7;

/// Bytes of frame overhead around a payload: the 7-byte header plus the
/// frame-end octet. A content body may carry at most
/// `frame_max - FRAME_OVERHEAD` bytes per frame.
pub const FRAME_OVERHEAD: usize = FRAME_HEADER_SIZE + 1;

/// The largest frame size a peer may be required to accept before the
/// frame-max negotiation has completed
pub const FRAME_MIN_SIZE: u32 = 4096;

/// Frame type octet of a method frame
pub const FRAME_METHOD: u8 = 1;

/// Frame type octet of a content header frame
pub const FRAME_HEADER: u8 = 2;

/// Frame type octet of a content body frame
pub const FRAME_BODY: u8 = 3;

/// Frame type octet of a heartbeat frame
pub const FRAME_HEARTBEAT: u8 = 8;

/// The sentinel octet that terminates every frame
pub const FRAME_END: u8 = 0xCE;

/// `connection` class id
pub const CLASS_CONNECTION: u16 = 10;

/// `channel` class id
pub const CLASS_CHANNEL: u16 = 20;

/// `exchange` class id
pub const CLASS_EXCHANGE: u16 = 40;

/// `queue` class id
pub const CLASS_QUEUE: u16 = 50;

/// `basic` class id
pub const CLASS_BASIC: u16 = 60;

/// `confirm` class id (RabbitMQ extension)
pub const CLASS_CONFIRM: u16 = 85;

/// `tx` class id
pub const CLASS_TX: u16 = 90;

/// Indicates that the method completed successfully
pub const REPLY_SUCCESS: u16 = 200;

// Soft (channel) errors

/// The client attempted to transfer content larger than the server could
/// accept
pub const CONTENT_TOO_LARGE: u16 = 311;

/// A mandatory message could not be routed to any queue
pub const NO_ROUTE: u16 = 312;

/// An immediate message could not be delivered to any consumer
pub const NO_CONSUMERS: u16 = 313;

/// The client attempted to work with a server entity it has no access to
pub const ACCESS_REFUSED: u16 = 403;

/// The client attempted to work with a server entity that does not exist
pub const NOT_FOUND: u16 = 404;

/// The client attempted to work with a server entity that is exclusively
/// used by another connection
pub const RESOURCE_LOCKED: u16 = 405;

/// The client requested a method for which a precondition was not met
pub const PRECONDITION_FAILED: u16 = 406;

// Hard (connection) errors

/// An operator forced the connection closed
pub const CONNECTION_FORCED: u16 = 320;

/// The client tried to work with an unknown virtual host
pub const INVALID_PATH: u16 = 402;

/// The sender sent a malformed frame
pub const FRAME_ERROR: u16 = 501;

/// The sender sent a frame with illegal field values
pub const SYNTAX_ERROR: u16 = 502;

/// The client sent an invalid sequence of frames
pub const COMMAND_INVALID: u16 = 503;

/// The client used a channel in an invalid state, or a channel the server
/// does not know about
pub const CHANNEL_ERROR: u16 = 504;

/// The peer sent a frame that was not expected
pub const UNEXPECTED_FRAME: u16 = 505;

/// The server could not complete the method because it lacked a resource
pub const RESOURCE_ERROR: u16 = 506;

/// The client tried to work with an entity in a way that is not allowed
pub const NOT_ALLOWED: u16 = 530;

/// The client requested a method that is not implemented
pub const NOT_IMPLEMENTED: u16 = 540;

/// The server could not complete the method due to an internal error
pub const INTERNAL_ERROR: u16 = 541;
