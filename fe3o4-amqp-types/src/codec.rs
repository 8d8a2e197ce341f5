//! Primitive read/write helpers over [`Buf`] / [`BufMut`]
//!
//! Every `read_*` helper checks `remaining()` before touching the buffer and
//! returns [`Error::Incomplete`] when the buffer is short, which is what lets
//! the frame decoder suspend on a partial frame and resume on the next chunk.
//!
//! All multi-byte integers take an explicit [`Endianness`] argument. AMQP
//! 0-9-1 is big-endian on the wire, so nearly every call site passes
//! [`Endianness::Big`]; the parameter exists because the field ordering of
//! the protocol is specified per field, not per stream.

use bytes::{Buf, BufMut};

use crate::error::Error;

/// Byte order for multi-byte integer reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
    /// Network byte order, used by every AMQP 0-9-1 field
    #[default]
    Big,
    /// Little-endian byte order
    Little,
}

#[inline]
fn ensure(src: &impl Buf, len: usize) -> Result<(), Error> {
    if src.remaining() < len {
        Err(Error::Incomplete)
    } else {
        Ok(())
    }
}

/// Reads a single octet
pub fn read_u8(src: &mut impl Buf) -> Result<u8, Error> {
    ensure(src, 1)?;
    Ok(src.get_u8())
}

/// Reads a single signed octet
pub fn read_i8(src: &mut impl Buf) -> Result<i8, Error> {
    ensure(src, 1)?;
    Ok(src.get_i8())
}

/// Reads an unsigned 16-bit integer
pub fn read_u16(src: &mut impl Buf, endianness: Endianness) -> Result<u16, Error> {
    ensure(src, 2)?;
    Ok(match endianness {
        Endianness::Big => src.get_u16(),
        Endianness::Little => src.get_u16_le(),
    })
}

/// Reads a signed 16-bit integer
pub fn read_i16(src: &mut impl Buf, endianness: Endianness) -> Result<i16, Error> {
    ensure(src, 2)?;
    Ok(match endianness {
        Endianness::Big => src.get_i16(),
        Endianness::Little => src.get_i16_le(),
    })
}

/// Reads an unsigned 32-bit integer
pub fn read_u32(src: &mut impl Buf, endianness: Endianness) -> Result<u32, Error> {
    ensure(src, 4)?;
    Ok(match endianness {
        Endianness::Big => src.get_u32(),
        Endianness::Little => src.get_u32_le(),
    })
}

/// Reads a signed 32-bit integer
pub fn read_i32(src: &mut impl Buf, endianness: Endianness) -> Result<i32, Error> {
    ensure(src, 4)?;
    Ok(match endianness {
        Endianness::Big => src.get_i32(),
        Endianness::Little => src.get_i32_le(),
    })
}

/// Reads an unsigned 64-bit integer
pub fn read_u64(src: &mut impl Buf, endianness: Endianness) -> Result<u64, Error> {
    ensure(src, 8)?;
    Ok(match endianness {
        Endianness::Big => src.get_u64(),
        Endianness::Little => src.get_u64_le(),
    })
}

/// Reads a signed 64-bit integer
pub fn read_i64(src: &mut impl Buf, endianness: Endianness) -> Result<i64, Error> {
    ensure(src, 8)?;
    Ok(match endianness {
        Endianness::Big => src.get_i64(),
        Endianness::Little => src.get_i64_le(),
    })
}

/// Reads an IEEE 754 single-precision float
pub fn read_f32(src: &mut impl Buf, endianness: Endianness) -> Result<f32, Error> {
    ensure(src, 4)?;
    Ok(match endianness {
        Endianness::Big => src.get_f32(),
        Endianness::Little => src.get_f32_le(),
    })
}

/// Reads an IEEE 754 double-precision float
pub fn read_f64(src: &mut impl Buf, endianness: Endianness) -> Result<f64, Error> {
    ensure(src, 8)?;
    Ok(match endianness {
        Endianness::Big => src.get_f64(),
        Endianness::Little => src.get_f64_le(),
    })
}

/// Reads exactly `len` bytes
pub fn read_bytes(src: &mut impl Buf, len: usize) -> Result<Vec<u8>, Error> {
    ensure(src, len)?;
    let mut buf = vec![0u8; len];
    src.copy_to_slice(&mut buf);
    Ok(buf)
}

/// Reads a short string: 1-byte length prefix followed by UTF-8 bytes
pub fn read_short_str(src: &mut impl Buf) -> Result<String, Error> {
    let len = read_u8(src)? as usize;
    let bytes = read_bytes(src, len)?;
    let s = std::str::from_utf8(&bytes)?;
    Ok(s.to_owned())
}

/// Reads a long string: 4-byte length prefix followed by opaque bytes
pub fn read_long_str(src: &mut impl Buf) -> Result<Vec<u8>, Error> {
    let len = read_u32(src, Endianness::Big)? as usize;
    read_bytes(src, len)
}

/// Writes a single octet
pub fn write_u8(dst: &mut impl BufMut, value: u8) {
    dst.put_u8(value);
}

/// Writes a single signed octet
pub fn write_i8(dst: &mut impl BufMut, value: i8) {
    dst.put_i8(value);
}

/// Writes an unsigned 16-bit integer
pub fn write_u16(dst: &mut impl BufMut, value: u16, endianness: Endianness) {
    match endianness {
        Endianness::Big => dst.put_u16(value),
        Endianness::Little => dst.put_u16_le(value),
    }
}

/// Writes a signed 16-bit integer
pub fn write_i16(dst: &mut impl BufMut, value: i16, endianness: Endianness) {
    match endianness {
        Endianness::Big => dst.put_i16(value),
        Endianness::Little => dst.put_i16_le(value),
    }
}

/// Writes an unsigned 32-bit integer
pub fn write_u32(dst: &mut impl BufMut, value: u32, endianness: Endianness) {
    match endianness {
        Endianness::Big => dst.put_u32(value),
        Endianness::Little => dst.put_u32_le(value),
    }
}

/// Writes a signed 32-bit integer
pub fn write_i32(dst: &mut impl BufMut, value: i32, endianness: Endianness) {
    match endianness {
        Endianness::Big => dst.put_i32(value),
        Endianness::Little => dst.put_i32_le(value),
    }
}

/// Writes an unsigned 64-bit integer
pub fn write_u64(dst: &mut impl BufMut, value: u64, endianness: Endianness) {
    match endianness {
        Endianness::Big => dst.put_u64(value),
        Endianness::Little => dst.put_u64_le(value),
    }
}

/// Writes a signed 64-bit integer
pub fn write_i64(dst: &mut impl BufMut, value: i64, endianness: Endianness) {
    match endianness {
        Endianness::Big => dst.put_i64(value),
        Endianness::Little => dst.put_i64_le(value),
    }
}

/// Writes an IEEE 754 single-precision float
pub fn write_f32(dst: &mut impl BufMut, value: f32, endianness: Endianness) {
    match endianness {
        Endianness::Big => dst.put_f32(value),
        Endianness::Little => dst.put_f32_le(value),
    }
}

/// Writes an IEEE 754 double-precision float
pub fn write_f64(dst: &mut impl BufMut, value: f64, endianness: Endianness) {
    match endianness {
        Endianness::Big => dst.put_f64(value),
        Endianness::Little => dst.put_f64_le(value),
    }
}

/// Writes a short string, failing if the string is longer than 255 bytes
pub fn write_short_str(dst: &mut impl BufMut, value: &str) -> Result<(), Error> {
    let len = value.len();
    if len > u8::MAX as usize {
        return Err(Error::ShortStringTooLong(len));
    }
    dst.put_u8(len as u8);
    dst.put_slice(value.as_bytes());
    Ok(())
}

/// Writes a long string
pub fn write_long_str(dst: &mut impl BufMut, value: &[u8]) {
    dst.put_u32(value.len() as u32);
    dst.put_slice(value);
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;

    #[test]
    fn integers_round_trip_in_both_byte_orders() {
        for endianness in [Endianness::Big, Endianness::Little] {
            let mut buf = BytesMut::new();
            write_u16(&mut buf, 0xBEEF, endianness);
            write_i32(&mut buf, -40_000, endianness);
            write_u64(&mut buf, u64::MAX - 1, endianness);
            write_f64(&mut buf, 2.5, endianness);

            let mut src = buf.freeze();
            assert_eq!(read_u16(&mut src, endianness).unwrap(), 0xBEEF);
            assert_eq!(read_i32(&mut src, endianness).unwrap(), -40_000);
            assert_eq!(read_u64(&mut src, endianness).unwrap(), u64::MAX - 1);
            assert_eq!(read_f64(&mut src, endianness).unwrap(), 2.5);
            assert!(src.is_empty());
        }
    }

    #[test]
    fn byte_orders_differ_on_the_wire() {
        let mut big = BytesMut::new();
        let mut little = BytesMut::new();
        write_u32(&mut big, 0x0102_0304, Endianness::Big);
        write_u32(&mut little, 0x0102_0304, Endianness::Little);
        assert_eq!(&big[..], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(&little[..], &[0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn short_string_round_trip() {
        let mut buf = BytesMut::new();
        write_short_str(&mut buf, "amq.topic").unwrap();
        let mut src = buf.freeze();
        assert_eq!(read_short_str(&mut src).unwrap(), "amq.topic");
    }

    #[test]
    fn short_string_over_255_bytes_is_rejected() {
        let long = "x".repeat(256);
        let mut buf = BytesMut::new();
        assert_eq!(
            write_short_str(&mut buf, &long),
            Err(Error::ShortStringTooLong(256))
        );
        // nothing was written
        assert!(buf.is_empty());
    }

    #[test]
    fn long_string_round_trip() {
        let payload = vec![0u8, 1, 2, 253, 254, 255];
        let mut buf = BytesMut::new();
        write_long_str(&mut buf, &payload);
        let mut src = buf.freeze();
        assert_eq!(read_long_str(&mut src).unwrap(), payload);
    }

    #[test]
    fn short_input_reports_incomplete() {
        let mut src = &[0x00u8, 0x01][..];
        assert_eq!(read_u32(&mut src, Endianness::Big), Err(Error::Incomplete));

        // length prefix larger than the remaining bytes
        let mut src = &[0x05u8, b'a', b'b'][..];
        assert_eq!(read_short_str(&mut src), Err(Error::Incomplete));
    }
}
