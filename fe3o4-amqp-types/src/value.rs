//! The AMQP 0-9-1 field value type system
//!
//! Field tables and field arrays are the self-describing containers used for
//! message headers and the optional-arguments table of most methods. The tag
//! set implemented here is the RabbitMQ field-table dialect (`s` is a signed
//! 16-bit integer, short strings never appear as table values), which is what
//! every broker this client is expected to talk to actually speaks. The
//! unsigned tags `B`/`u`/`i` are accepted on decode for interoperability.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{Buf, BufMut};

use crate::codec::{self, Endianness};
use crate::error::Error;

/// A string of at most 255 UTF-8 bytes, prefixed on the wire with a 1-byte
/// length.
///
/// Short strings carry method fields (queue names, consumer tags, reply
/// texts) and field table keys. The length limit is enforced at construction
/// so that encoding never fails.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShortString(String);

impl ShortString {
    /// An empty short string
    pub fn new() -> Self {
        Self(String::new())
    }

    /// View as a `&str`
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of bytes on the wire, excluding the length prefix
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the string is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn encoded_size(&self) -> usize {
        1 + self.0.len()
    }

    /// Writes the length prefix and bytes
    pub fn encode(&self, dst: &mut impl BufMut) {
        dst.put_u8(self.0.len() as u8);
        dst.put_slice(self.0.as_bytes());
    }

    /// Reads a length prefix and bytes
    pub fn decode(src: &mut impl Buf) -> Result<Self, Error> {
        codec::read_short_str(src).map(Self)
    }
}

impl TryFrom<String> for ShortString {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.len() > u8::MAX as usize {
            return Err(Error::ShortStringTooLong(value.len()));
        }
        Ok(Self(value))
    }
}

impl TryFrom<&str> for ShortString {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_from(value.to_owned())
    }
}

impl From<ShortString> for String {
    fn from(value: ShortString) -> Self {
        value.0
    }
}

impl std::ops::Deref for ShortString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for ShortString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An opaque byte sequence prefixed on the wire with a 4-byte length.
///
/// Long strings are not required to be UTF-8; SASL responses in particular
/// embed NUL bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct LongString(Vec<u8>);

impl LongString {
    /// View as raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume into the underlying bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Number of bytes on the wire, excluding the length prefix
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the string is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn encoded_size(&self) -> usize {
        4 + self.0.len()
    }

    /// Writes the length prefix and bytes
    pub fn encode(&self, dst: &mut impl BufMut) {
        codec::write_long_str(dst, &self.0);
    }

    /// Reads a length prefix and bytes
    pub fn decode(src: &mut impl Buf) -> Result<Self, Error> {
        codec::read_long_str(src).map(Self)
    }
}

impl From<Vec<u8>> for LongString {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl From<String> for LongString {
    fn from(value: String) -> Self {
        Self(value.into_bytes())
    }
}

impl From<&str> for LongString {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl From<&[u8]> for LongString {
    fn from(value: &[u8]) -> Self {
        Self(value.to_vec())
    }
}

impl fmt::Display for LongString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        String::from_utf8_lossy(&self.0).fmt(f)
    }
}

/// An exact decimal value: a scale octet (number of decimal digits after the
/// point) and a signed 32-bit mantissa
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal {
    /// Number of decimal digits to the right of the point
    pub scale: u8,
    /// Signed mantissa
    pub value: i32,
}

impl Decimal {
    /// Creates a decimal value `value * 10^(-scale)`
    pub fn new(scale: u8, value: i32) -> Self {
        Self { scale, value }
    }
}

/// A point in time, in seconds since the Unix epoch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// The current wall-clock time, truncated to seconds
    pub fn now() -> Self {
        SystemTime::now().into()
    }
}

impl From<u64> for Timestamp {
    fn from(secs: u64) -> Self {
        Self(secs)
    }
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        let secs = time
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self(secs)
    }
}

/// A value carried in a field table or field array
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// `t`: boolean
    Boolean(bool),
    /// `b`: signed 8-bit integer
    ShortShortInt(i8),
    /// `B`: unsigned 8-bit integer (accepted on decode)
    ShortShortUint(u8),
    /// `s`: signed 16-bit integer
    ShortInt(i16),
    /// `u`: unsigned 16-bit integer (accepted on decode)
    ShortUint(u16),
    /// `I`: signed 32-bit integer
    LongInt(i32),
    /// `i`: unsigned 32-bit integer (accepted on decode)
    LongUint(u32),
    /// `l`: signed 64-bit integer
    LongLongInt(i64),
    /// `f`: IEEE 754 single-precision float
    Float(f32),
    /// `d`: IEEE 754 double-precision float
    Double(f64),
    /// `D`: exact decimal
    Decimal(Decimal),
    /// `S`: long string
    LongString(LongString),
    /// `A`: ordered list of field values
    FieldArray(FieldArray),
    /// `T`: timestamp, seconds since the Unix epoch
    Timestamp(Timestamp),
    /// `F`: nested field table
    FieldTable(FieldTable),
    /// `x`: opaque byte array
    ByteArray(Vec<u8>),
    /// `V`: no value
    Void,
}

impl FieldValue {
    /// The wire type tag of this value
    pub fn tag(&self) -> u8 {
        match self {
            FieldValue::Boolean(_) => b't',
            FieldValue::ShortShortInt(_) => b'b',
            FieldValue::ShortShortUint(_) => b'B',
            FieldValue::ShortInt(_) => b's',
            FieldValue::ShortUint(_) => b'u',
            FieldValue::LongInt(_) => b'I',
            FieldValue::LongUint(_) => b'i',
            FieldValue::LongLongInt(_) => b'l',
            FieldValue::Float(_) => b'f',
            FieldValue::Double(_) => b'd',
            FieldValue::Decimal(_) => b'D',
            FieldValue::LongString(_) => b'S',
            FieldValue::FieldArray(_) => b'A',
            FieldValue::Timestamp(_) => b'T',
            FieldValue::FieldTable(_) => b'F',
            FieldValue::ByteArray(_) => b'x',
            FieldValue::Void => b'V',
        }
    }

    /// Number of bytes this value occupies on the wire, tag included
    pub fn encoded_size(&self) -> usize {
        1 + match self {
            FieldValue::Boolean(_)
            | FieldValue::ShortShortInt(_)
            | FieldValue::ShortShortUint(_) => 1,
            FieldValue::ShortInt(_) | FieldValue::ShortUint(_) => 2,
            FieldValue::LongInt(_) | FieldValue::LongUint(_) | FieldValue::Float(_) => 4,
            FieldValue::LongLongInt(_)
            | FieldValue::Double(_)
            | FieldValue::Timestamp(_) => 8,
            FieldValue::Decimal(_) => 5,
            FieldValue::LongString(s) => s.encoded_size(),
            FieldValue::FieldArray(a) => a.encoded_size(),
            FieldValue::FieldTable(t) => t.encoded_size(),
            FieldValue::ByteArray(b) => 4 + b.len(),
            FieldValue::Void => 0,
        }
    }

    /// Writes the tag octet followed by the value
    pub fn encode(&self, dst: &mut impl BufMut) {
        dst.put_u8(self.tag());
        match self {
            FieldValue::Boolean(v) => dst.put_u8(*v as u8),
            FieldValue::ShortShortInt(v) => dst.put_i8(*v),
            FieldValue::ShortShortUint(v) => dst.put_u8(*v),
            FieldValue::ShortInt(v) => codec::write_i16(dst, *v, Endianness::Big),
            FieldValue::ShortUint(v) => codec::write_u16(dst, *v, Endianness::Big),
            FieldValue::LongInt(v) => codec::write_i32(dst, *v, Endianness::Big),
            FieldValue::LongUint(v) => codec::write_u32(dst, *v, Endianness::Big),
            FieldValue::LongLongInt(v) => codec::write_i64(dst, *v, Endianness::Big),
            FieldValue::Float(v) => codec::write_f32(dst, *v, Endianness::Big),
            FieldValue::Double(v) => codec::write_f64(dst, *v, Endianness::Big),
            FieldValue::Decimal(v) => {
                dst.put_u8(v.scale);
                codec::write_i32(dst, v.value, Endianness::Big);
            }
            FieldValue::LongString(v) => v.encode(dst),
            FieldValue::FieldArray(v) => v.encode(dst),
            FieldValue::Timestamp(v) => codec::write_u64(dst, v.0, Endianness::Big),
            FieldValue::FieldTable(v) => v.encode(dst),
            FieldValue::ByteArray(v) => codec::write_long_str(dst, v),
            FieldValue::Void => {}
        }
    }

    /// Reads a tag octet and the value it announces
    pub fn decode(src: &mut impl Buf) -> Result<Self, Error> {
        let tag = codec::read_u8(src)?;
        let value = match tag {
            b't' => FieldValue::Boolean(codec::read_u8(src)? != 0),
            b'b' => FieldValue::ShortShortInt(codec::read_i8(src)?),
            b'B' => FieldValue::ShortShortUint(codec::read_u8(src)?),
            b's' => FieldValue::ShortInt(codec::read_i16(src, Endianness::Big)?),
            b'u' => FieldValue::ShortUint(codec::read_u16(src, Endianness::Big)?),
            b'I' => FieldValue::LongInt(codec::read_i32(src, Endianness::Big)?),
            b'i' => FieldValue::LongUint(codec::read_u32(src, Endianness::Big)?),
            b'l' => FieldValue::LongLongInt(codec::read_i64(src, Endianness::Big)?),
            b'f' => FieldValue::Float(codec::read_f32(src, Endianness::Big)?),
            b'd' => FieldValue::Double(codec::read_f64(src, Endianness::Big)?),
            b'D' => {
                let scale = codec::read_u8(src)?;
                let value = codec::read_i32(src, Endianness::Big)?;
                FieldValue::Decimal(Decimal { scale, value })
            }
            b'S' => FieldValue::LongString(LongString::decode(src)?),
            b'A' => FieldValue::FieldArray(FieldArray::decode(src)?),
            b'T' => FieldValue::Timestamp(Timestamp(codec::read_u64(src, Endianness::Big)?)),
            b'F' => FieldValue::FieldTable(FieldTable::decode(src)?),
            b'x' => FieldValue::ByteArray(codec::read_long_str(src)?),
            b'V' => FieldValue::Void,
            other => return Err(Error::UnknownFieldType(other)),
        };
        Ok(value)
    }
}

fn narrowest_int(value: i64) -> FieldValue {
    if let Ok(v) = i8::try_from(value) {
        FieldValue::ShortShortInt(v)
    } else if let Ok(v) = i16::try_from(value) {
        FieldValue::ShortInt(v)
    } else if let Ok(v) = i32::try_from(value) {
        FieldValue::LongInt(v)
    } else {
        FieldValue::LongLongInt(value)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Boolean(v)
    }
}

impl From<i8> for FieldValue {
    fn from(v: i8) -> Self {
        FieldValue::ShortShortInt(v)
    }
}

impl From<u8> for FieldValue {
    fn from(v: u8) -> Self {
        FieldValue::ShortShortUint(v)
    }
}

impl From<i16> for FieldValue {
    fn from(v: i16) -> Self {
        FieldValue::ShortInt(v)
    }
}

impl From<u16> for FieldValue {
    fn from(v: u16) -> Self {
        FieldValue::ShortUint(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::LongInt(v)
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        FieldValue::LongUint(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::LongLongInt(v)
    }
}

impl TryFrom<u64> for FieldValue {
    type Error = Error;

    /// The table grammar has no unsigned 64-bit tag; values above `i64::MAX`
    /// cannot round-trip and are rejected before anything is written
    fn try_from(v: u64) -> Result<Self, Self::Error> {
        i64::try_from(v)
            .map(FieldValue::LongLongInt)
            .map_err(|_| Error::U64OutOfRange(v))
    }
}

impl From<f32> for FieldValue {
    fn from(v: f32) -> Self {
        FieldValue::Float(v)
    }
}

impl From<f64> for FieldValue {
    /// Integral values that are exactly representable as a signed integer
    /// take the narrowest integer tag; everything else encodes as a double
    fn from(v: f64) -> Self {
        let exact_int_range = -(2f64.powi(63))..2f64.powi(63);
        if v.is_finite() && v.fract() == 0.0 && exact_int_range.contains(&v) {
            narrowest_int(v as i64)
        } else {
            FieldValue::Double(v)
        }
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::LongString(v.into())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::LongString(v.into())
    }
}

impl From<LongString> for FieldValue {
    fn from(v: LongString) -> Self {
        FieldValue::LongString(v)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(v: Vec<u8>) -> Self {
        FieldValue::ByteArray(v)
    }
}

impl From<Decimal> for FieldValue {
    fn from(v: Decimal) -> Self {
        FieldValue::Decimal(v)
    }
}

impl From<Timestamp> for FieldValue {
    fn from(v: Timestamp) -> Self {
        FieldValue::Timestamp(v)
    }
}

impl From<SystemTime> for FieldValue {
    fn from(v: SystemTime) -> Self {
        FieldValue::Timestamp(v.into())
    }
}

impl From<FieldTable> for FieldValue {
    fn from(v: FieldTable) -> Self {
        FieldValue::FieldTable(v)
    }
}

impl From<FieldArray> for FieldValue {
    fn from(v: FieldArray) -> Self {
        FieldValue::FieldArray(v)
    }
}

impl From<Vec<FieldValue>> for FieldValue {
    fn from(v: Vec<FieldValue>) -> Self {
        FieldValue::FieldArray(FieldArray(v))
    }
}

/// An ordered mapping of short-string keys to field values.
///
/// Keys are unique; inserting an existing key replaces its value in place.
/// Insertion order is preserved so that encoding is deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldTable(Vec<(ShortString, FieldValue)>);

impl FieldTable {
    /// An empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the table has no entries
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Inserts a value, replacing any existing entry with the same key
    pub fn insert(&mut self, key: ShortString, value: impl Into<FieldValue>) {
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.0.push((key, value)),
        }
    }

    /// Looks up a value by key
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0
            .iter()
            .find(|(k, _)| k.as_str() == key)
            .map(|(_, v)| v)
    }

    /// Removes an entry, returning its value if present
    pub fn remove(&mut self, key: &str) -> Option<FieldValue> {
        let index = self.0.iter().position(|(k, _)| k.as_str() == key)?;
        Some(self.0.remove(index).1)
    }

    /// Iterates over entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&ShortString, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k, v))
    }

    /// Number of bytes this table occupies on the wire, including its own
    /// 4-byte length prefix
    pub fn encoded_size(&self) -> usize {
        4 + self
            .0
            .iter()
            .map(|(k, v)| k.encoded_size() + v.encoded_size())
            .sum::<usize>()
    }

    /// Writes the byte-length prefix and entries
    pub fn encode(&self, dst: &mut impl BufMut) {
        dst.put_u32((self.encoded_size() - 4) as u32);
        for (key, value) in &self.0 {
            key.encode(dst);
            value.encode(dst);
        }
    }

    /// Reads a byte-length prefix and exactly that many bytes of entries
    pub fn decode(src: &mut impl Buf) -> Result<Self, Error> {
        let len = codec::read_u32(src, Endianness::Big)? as usize;
        if src.remaining() < len {
            return Err(Error::Incomplete);
        }
        let mut sub = src.copy_to_bytes(len);
        let mut entries = Vec::new();
        while sub.has_remaining() {
            let key = ShortString::decode(&mut sub)?;
            let value = FieldValue::decode(&mut sub)?;
            entries.push((key, value));
        }
        Ok(Self(entries))
    }
}

impl FromIterator<(ShortString, FieldValue)> for FieldTable {
    fn from_iter<T: IntoIterator<Item = (ShortString, FieldValue)>>(iter: T) -> Self {
        let mut table = Self::new();
        for (key, value) in iter {
            table.insert(key, value);
        }
        table
    }
}

/// An ordered list of field values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldArray(Vec<FieldValue>);

impl FieldArray {
    /// An empty array
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of values
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the array has no values
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Appends a value
    pub fn push(&mut self, value: impl Into<FieldValue>) {
        self.0.push(value.into());
    }

    /// Iterates over values in order
    pub fn iter(&self) -> impl Iterator<Item = &FieldValue> {
        self.0.iter()
    }

    /// Number of bytes this array occupies on the wire, including its own
    /// 4-byte length prefix
    pub fn encoded_size(&self) -> usize {
        4 + self.0.iter().map(FieldValue::encoded_size).sum::<usize>()
    }

    /// Writes the byte-length prefix and values
    pub fn encode(&self, dst: &mut impl BufMut) {
        dst.put_u32((self.encoded_size() - 4) as u32);
        for value in &self.0 {
            value.encode(dst);
        }
    }

    /// Reads a byte-length prefix and exactly that many bytes of values
    pub fn decode(src: &mut impl Buf) -> Result<Self, Error> {
        let len = codec::read_u32(src, Endianness::Big)? as usize;
        if src.remaining() < len {
            return Err(Error::Incomplete);
        }
        let mut sub = src.copy_to_bytes(len);
        let mut values = Vec::new();
        while sub.has_remaining() {
            values.push(FieldValue::decode(&mut sub)?);
        }
        Ok(Self(values))
    }
}

impl From<Vec<FieldValue>> for FieldArray {
    fn from(values: Vec<FieldValue>) -> Self {
        Self(values)
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;

    fn round_trip(value: FieldValue) {
        let mut buf = BytesMut::new();
        value.encode(&mut buf);
        assert_eq!(buf.len(), value.encoded_size());
        let mut src = buf.freeze();
        let decoded = FieldValue::decode(&mut src).unwrap();
        assert!(src.is_empty());
        assert_eq!(decoded, value);
    }

    #[test]
    fn every_tag_round_trips() {
        round_trip(FieldValue::Boolean(true));
        round_trip(FieldValue::ShortShortInt(-5));
        round_trip(FieldValue::ShortShortUint(200));
        round_trip(FieldValue::ShortInt(-1000));
        round_trip(FieldValue::ShortUint(50_000));
        round_trip(FieldValue::LongInt(-70_000));
        round_trip(FieldValue::LongUint(3_000_000_000));
        round_trip(FieldValue::LongLongInt(i64::MIN));
        round_trip(FieldValue::Float(1.5));
        round_trip(FieldValue::Double(-2.25));
        round_trip(FieldValue::Decimal(Decimal::new(2, 314)));
        round_trip(FieldValue::LongString("héllo".into()));
        round_trip(FieldValue::Timestamp(Timestamp(1_700_000_000)));
        round_trip(FieldValue::ByteArray(vec![0, 255, 1, 254]));
        round_trip(FieldValue::Void);
    }

    #[test]
    fn nested_containers_round_trip() {
        let mut inner = FieldTable::new();
        inner.insert("retries".try_into().unwrap(), 3i32);

        let mut array = FieldArray::new();
        array.push("first");
        array.push(false);

        let mut table = FieldTable::new();
        table.insert("nested".try_into().unwrap(), inner);
        table.insert("list".try_into().unwrap(), array);
        round_trip(FieldValue::FieldTable(table));
    }

    #[test]
    fn table_preserves_insertion_order_and_key_uniqueness() {
        let mut table = FieldTable::new();
        table.insert("b".try_into().unwrap(), 1i32);
        table.insert("a".try_into().unwrap(), 2i32);
        table.insert("b".try_into().unwrap(), 3i32);

        assert_eq!(table.len(), 2);
        let keys: Vec<&str> = table.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["b", "a"]);
        assert_eq!(table.get("b"), Some(&FieldValue::LongInt(3)));
    }

    #[test]
    fn f64_narrows_to_the_smallest_integer_tag() {
        assert_eq!(FieldValue::from(0.0f64), FieldValue::ShortShortInt(0));
        assert_eq!(FieldValue::from(-128.0f64), FieldValue::ShortShortInt(-128));
        assert_eq!(FieldValue::from(129.0f64), FieldValue::ShortInt(129));
        assert_eq!(FieldValue::from(70_000.0f64), FieldValue::LongInt(70_000));
        assert_eq!(
            FieldValue::from(5_000_000_000.0f64),
            FieldValue::LongLongInt(5_000_000_000)
        );
        assert_eq!(FieldValue::from(0.5f64), FieldValue::Double(0.5));
        assert_eq!(FieldValue::from(f64::NAN).tag(), b'd');
        assert_eq!(FieldValue::from(1e300f64), FieldValue::Double(1e300));
    }

    #[test]
    fn u64_above_signed_range_is_rejected() {
        assert_eq!(
            FieldValue::try_from(42u64),
            Ok(FieldValue::LongLongInt(42))
        );
        assert_eq!(
            FieldValue::try_from(u64::MAX),
            Err(Error::U64OutOfRange(u64::MAX))
        );
    }

    #[test]
    fn truncated_table_is_incomplete() {
        let mut table = FieldTable::new();
        table.insert("key".try_into().unwrap(), "value");
        let mut buf = BytesMut::new();
        table.encode(&mut buf);
        buf.truncate(buf.len() - 1);

        let mut src = buf.freeze();
        assert_eq!(FieldTable::decode(&mut src), Err(Error::Incomplete));
    }

    #[test]
    fn unknown_tag_is_an_error() {
        let mut src = &[b'Z', 0, 0][..];
        assert_eq!(
            FieldValue::decode(&mut src),
            Err(Error::UnknownFieldType(b'Z'))
        );
    }
}
