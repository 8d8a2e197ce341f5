//! Content header and the `basic` class property list
//!
//! Message properties travel in the content header frame as a 16-bit
//! presence bitmask followed by only the fields whose bit is set, in a fixed
//! order. A clear bit leaves the field absent; decoding never substitutes
//! defaults.

use bytes::{Buf, BufMut};

use crate::codec::{self, Endianness};
use crate::definitions::CLASS_BASIC;
use crate::error::Error;
use crate::value::{FieldTable, ShortString, Timestamp};

const FLAG_CONTENT_TYPE: u16 = 1 << 15;
const FLAG_CONTENT_ENCODING: u16 = 1 << 14;
const FLAG_HEADERS: u16 = 1 << 13;
const FLAG_DELIVERY_MODE: u16 = 1 << 12;
const FLAG_PRIORITY: u16 = 1 << 11;
const FLAG_CORRELATION_ID: u16 = 1 << 10;
const FLAG_REPLY_TO: u16 = 1 << 9;
const FLAG_EXPIRATION: u16 = 1 << 8;
const FLAG_MESSAGE_ID: u16 = 1 << 7;
const FLAG_TIMESTAMP: u16 = 1 << 6;
const FLAG_KIND: u16 = 1 << 5;
const FLAG_USER_ID: u16 = 1 << 4;
const FLAG_APP_ID: u16 = 1 << 3;
const FLAG_CLUSTER_ID: u16 = 1 << 2;

/// The optional properties of a `basic` class message
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BasicProperties {
    /// MIME content type
    pub content_type: Option<ShortString>,
    /// MIME content encoding
    pub content_encoding: Option<ShortString>,
    /// Application headers
    pub headers: Option<FieldTable>,
    /// 1 for non-persistent, 2 for persistent
    pub delivery_mode: Option<u8>,
    /// Message priority, 0 to 9
    pub priority: Option<u8>,
    /// Application correlation identifier
    pub correlation_id: Option<ShortString>,
    /// Address to reply to
    pub reply_to: Option<ShortString>,
    /// Message expiration, in milliseconds as a decimal string
    pub expiration: Option<ShortString>,
    /// Application message identifier
    pub message_id: Option<ShortString>,
    /// Message timestamp
    pub timestamp: Option<Timestamp>,
    /// Message type name (`type` in the grammar)
    pub kind: Option<ShortString>,
    /// Creating user id
    pub user_id: Option<ShortString>,
    /// Creating application id
    pub app_id: Option<ShortString>,
    /// Reserved, used by older intra-cluster protocols
    pub cluster_id: Option<ShortString>,
}

impl BasicProperties {
    /// The presence bitmask announcing which fields follow
    pub fn flags(&self) -> u16 {
        let mut flags = 0;
        let mut set = |present: bool, flag: u16| {
            if present {
                flags |= flag;
            }
        };
        set(self.content_type.is_some(), FLAG_CONTENT_TYPE);
        set(self.content_encoding.is_some(), FLAG_CONTENT_ENCODING);
        set(self.headers.is_some(), FLAG_HEADERS);
        set(self.delivery_mode.is_some(), FLAG_DELIVERY_MODE);
        set(self.priority.is_some(), FLAG_PRIORITY);
        set(self.correlation_id.is_some(), FLAG_CORRELATION_ID);
        set(self.reply_to.is_some(), FLAG_REPLY_TO);
        set(self.expiration.is_some(), FLAG_EXPIRATION);
        set(self.message_id.is_some(), FLAG_MESSAGE_ID);
        set(self.timestamp.is_some(), FLAG_TIMESTAMP);
        set(self.kind.is_some(), FLAG_KIND);
        set(self.user_id.is_some(), FLAG_USER_ID);
        set(self.app_id.is_some(), FLAG_APP_ID);
        set(self.cluster_id.is_some(), FLAG_CLUSTER_ID);
        flags
    }

    /// Number of bytes on the wire, bitmask included
    pub fn encoded_size(&self) -> usize {
        let shortstr = |s: &Option<ShortString>| s.as_ref().map_or(0, ShortString::encoded_size);
        2 + shortstr(&self.content_type)
            + shortstr(&self.content_encoding)
            + self.headers.as_ref().map_or(0, FieldTable::encoded_size)
            + self.delivery_mode.map_or(0, |_| 1)
            + self.priority.map_or(0, |_| 1)
            + shortstr(&self.correlation_id)
            + shortstr(&self.reply_to)
            + shortstr(&self.expiration)
            + shortstr(&self.message_id)
            + self.timestamp.map_or(0, |_| 8)
            + shortstr(&self.kind)
            + shortstr(&self.user_id)
            + shortstr(&self.app_id)
            + shortstr(&self.cluster_id)
    }

    /// Writes the presence bitmask and every present field in order
    pub fn encode(&self, dst: &mut impl BufMut) {
        codec::write_u16(dst, self.flags(), Endianness::Big);
        if let Some(v) = &self.content_type {
            v.encode(dst);
        }
        if let Some(v) = &self.content_encoding {
            v.encode(dst);
        }
        if let Some(v) = &self.headers {
            v.encode(dst);
        }
        if let Some(v) = self.delivery_mode {
            dst.put_u8(v);
        }
        if let Some(v) = self.priority {
            dst.put_u8(v);
        }
        if let Some(v) = &self.correlation_id {
            v.encode(dst);
        }
        if let Some(v) = &self.reply_to {
            v.encode(dst);
        }
        if let Some(v) = &self.expiration {
            v.encode(dst);
        }
        if let Some(v) = &self.message_id {
            v.encode(dst);
        }
        if let Some(v) = self.timestamp {
            codec::write_u64(dst, v.0, Endianness::Big);
        }
        if let Some(v) = &self.kind {
            v.encode(dst);
        }
        if let Some(v) = &self.user_id {
            v.encode(dst);
        }
        if let Some(v) = &self.app_id {
            v.encode(dst);
        }
        if let Some(v) = &self.cluster_id {
            v.encode(dst);
        }
    }

    /// Reads the presence bitmask and the fields it announces; clear bits
    /// leave the corresponding field `None`
    pub fn decode(src: &mut impl Buf) -> Result<Self, Error> {
        let flags = codec::read_u16(src, Endianness::Big)?;
        let shortstr = |mut src: &mut dyn Buf, flag: u16| -> Result<Option<ShortString>, Error> {
            if flags & flag != 0 {
                ShortString::decode(&mut src).map(Some)
            } else {
                Ok(None)
            }
        };

        let content_type = shortstr(src, FLAG_CONTENT_TYPE)?;
        let content_encoding = shortstr(src, FLAG_CONTENT_ENCODING)?;
        let headers = if flags & FLAG_HEADERS != 0 {
            Some(FieldTable::decode(src)?)
        } else {
            None
        };
        let delivery_mode = if flags & FLAG_DELIVERY_MODE != 0 {
            Some(codec::read_u8(src)?)
        } else {
            None
        };
        let priority = if flags & FLAG_PRIORITY != 0 {
            Some(codec::read_u8(src)?)
        } else {
            None
        };
        let correlation_id = shortstr(src, FLAG_CORRELATION_ID)?;
        let reply_to = shortstr(src, FLAG_REPLY_TO)?;
        let expiration = shortstr(src, FLAG_EXPIRATION)?;
        let message_id = shortstr(src, FLAG_MESSAGE_ID)?;
        let timestamp = if flags & FLAG_TIMESTAMP != 0 {
            Some(Timestamp(codec::read_u64(src, Endianness::Big)?))
        } else {
            None
        };
        let kind = shortstr(src, FLAG_KIND)?;
        let user_id = shortstr(src, FLAG_USER_ID)?;
        let app_id = shortstr(src, FLAG_APP_ID)?;
        let cluster_id = shortstr(src, FLAG_CLUSTER_ID)?;

        Ok(Self {
            content_type,
            content_encoding,
            headers,
            delivery_mode,
            priority,
            correlation_id,
            reply_to,
            expiration,
            message_id,
            timestamp,
            kind,
            user_id,
            app_id,
            cluster_id,
        })
    }
}

/// The payload of a content header frame: total body size plus the property
/// list.
///
/// The weight field of the grammar is reserved and always zero.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentHeader {
    /// Class of the content-bearing method, `basic` for everything this
    /// client speaks
    pub class_id: u16,
    /// Total size of the message body, summed over all body frames
    pub body_size: u64,
    /// Message properties
    pub properties: BasicProperties,
}

impl ContentHeader {
    /// A `basic` class content header
    pub fn basic(body_size: u64, properties: BasicProperties) -> Self {
        Self {
            class_id: CLASS_BASIC,
            body_size,
            properties,
        }
    }

    /// Number of bytes on the wire
    pub fn encoded_size(&self) -> usize {
        // class id + weight + body size
        12 + self.properties.encoded_size()
    }

    /// Writes class id, weight, body size and properties
    pub fn encode(&self, dst: &mut impl BufMut) {
        codec::write_u16(dst, self.class_id, Endianness::Big);
        codec::write_u16(dst, 0, Endianness::Big);
        codec::write_u64(dst, self.body_size, Endianness::Big);
        self.properties.encode(dst);
    }

    /// Reads class id, weight, body size and properties
    pub fn decode(src: &mut impl Buf) -> Result<Self, Error> {
        let class_id = codec::read_u16(src, Endianness::Big)?;
        let _weight = codec::read_u16(src, Endianness::Big)?;
        let body_size = codec::read_u64(src, Endianness::Big)?;
        let properties = BasicProperties::decode(src)?;
        Ok(Self {
            class_id,
            body_size,
            properties,
        })
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;

    fn round_trip(properties: BasicProperties) {
        let mut buf = BytesMut::new();
        properties.encode(&mut buf);
        assert_eq!(buf.len(), properties.encoded_size());
        let mut src = buf.freeze();
        let decoded = BasicProperties::decode(&mut src).unwrap();
        assert!(src.is_empty());
        assert_eq!(decoded, properties);
    }

    #[test]
    fn empty_properties_round_trip() {
        round_trip(BasicProperties::default());
    }

    #[test]
    fn full_properties_round_trip() {
        let mut headers = FieldTable::new();
        headers.insert("x-attempts".try_into().unwrap(), 2i32);

        round_trip(BasicProperties {
            content_type: Some("application/json".try_into().unwrap()),
            content_encoding: Some("gzip".try_into().unwrap()),
            headers: Some(headers),
            delivery_mode: Some(2),
            priority: Some(5),
            correlation_id: Some("corr-1".try_into().unwrap()),
            reply_to: Some("reply-q".try_into().unwrap()),
            expiration: Some("60000".try_into().unwrap()),
            message_id: Some("msg-1".try_into().unwrap()),
            timestamp: Some(Timestamp(1_700_000_000)),
            kind: Some("order.created".try_into().unwrap()),
            user_id: Some("guest".try_into().unwrap()),
            app_id: Some("billing".try_into().unwrap()),
            cluster_id: Some("c1".try_into().unwrap()),
        });
    }

    #[test]
    fn sparse_subsets_round_trip() {
        round_trip(BasicProperties {
            delivery_mode: Some(1),
            ..Default::default()
        });
        round_trip(BasicProperties {
            content_type: Some("text/plain".try_into().unwrap()),
            timestamp: Some(Timestamp(1)),
            app_id: Some("a".try_into().unwrap()),
            ..Default::default()
        });
        round_trip(BasicProperties {
            cluster_id: Some("last-bit".try_into().unwrap()),
            ..Default::default()
        });
    }

    #[test]
    fn clear_bits_stay_absent() {
        // bitmask with only delivery-mode set, followed by the field
        let mut src = &[0b0001_0000u8, 0b0000_0000, 2][..];
        let decoded = BasicProperties::decode(&mut src).unwrap();
        assert_eq!(decoded.delivery_mode, Some(2));
        assert_eq!(decoded.content_type, None);
        assert_eq!(decoded.headers, None);
        assert_eq!(decoded.priority, None);
    }

    #[test]
    fn content_header_round_trip() {
        let header = ContentHeader::basic(
            1_048_576,
            BasicProperties {
                delivery_mode: Some(2),
                ..Default::default()
            },
        );
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(buf.len(), header.encoded_size());
        let mut src = buf.freeze();
        assert_eq!(ContentHeader::decode(&mut src).unwrap(), header);
    }
}
