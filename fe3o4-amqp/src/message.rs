//! Reassembled message types handed to the application

use fe3o4_amqp_types::{BasicProperties, ShortString};

/// A message pushed to a consumer by `basic.deliver`
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// Tag of the consumer the message was delivered to
    pub consumer_tag: ShortString,
    /// Delivery tag for acknowledgment, unique within the channel
    pub delivery_tag: u64,
    /// The message may have been delivered before
    pub redelivered: bool,
    /// Exchange the message was published to
    pub exchange: ShortString,
    /// Routing key it was published with
    pub routing_key: ShortString,
    /// Content properties
    pub properties: BasicProperties,
    /// Content body
    pub body: Vec<u8>,
}

/// A message pulled synchronously with `basic.get`
#[derive(Debug, Clone, PartialEq)]
pub struct GetMessage {
    /// Delivery tag for acknowledgment, unique within the channel
    pub delivery_tag: u64,
    /// The message may have been delivered before
    pub redelivered: bool,
    /// Exchange the message was published to
    pub exchange: ShortString,
    /// Routing key it was published with
    pub routing_key: ShortString,
    /// Messages remaining in the queue after this one
    pub message_count: u32,
    /// Content properties
    pub properties: BasicProperties,
    /// Content body
    pub body: Vec<u8>,
}

/// An unroutable message handed back by the broker via `basic.return`
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnedMessage {
    /// Why the message came back, e.g. 312 NO_ROUTE
    pub reply_code: u16,
    /// Human-readable reason
    pub reply_text: ShortString,
    /// Exchange the message was published to
    pub exchange: ShortString,
    /// Routing key it was published with
    pub routing_key: ShortString,
    /// Content properties
    pub properties: BasicProperties,
    /// Content body
    pub body: Vec<u8>,
}
