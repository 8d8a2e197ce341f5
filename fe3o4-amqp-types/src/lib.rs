//! AMQP 0-9-1 wire data model and binary codec
//!
//! This crate implements the data types defined by the AMQP 0-9-1
//! specification (and the RabbitMQ field-table dialect) together with their
//! binary encoding:
//!
//! - primitive read/write helpers over [`bytes::Buf`] / [`bytes::BufMut`]
//!   ([`codec`])
//! - the field value type system: field tables, field arrays, short and long
//!   strings, decimals and timestamps ([`value`])
//! - the `basic` class content header and its presence-bitmask property list
//!   ([`properties`])
//! - one struct per protocol method with argument encode/decode and a
//!   [`methods::Method`] dispatch enum ([`methods`])
//! - protocol constants ([`definitions`])
//!
//! The frame layer (framing, connection and channel state) lives in the
//! `fe3o4-amqp` crate.

#![deny(missing_docs, missing_debug_implementations)]

pub mod codec;
pub mod definitions;
pub mod error;
pub mod methods;
pub mod properties;
pub mod value;

pub use error::Error;
pub use properties::{BasicProperties, ContentHeader};
pub use value::{
    Decimal, FieldArray, FieldTable, FieldValue, LongString, ShortString, Timestamp,
};
