//! Low level framing: the wire frame model and its tokio codec
//!
//! Every AMQP 0-9-1 frame is `type(1) channel(2) size(4) payload size-end(1)`
//! with the end octet fixed at 0xCE. [`FrameCodec`] implements both
//! directions over a `BytesMut` so it can sit inside
//! `tokio_util::codec::Framed`; the decoder buffers partial input and the
//! encoder splits content bodies that exceed the negotiated frame max.
//! Method and header frames cannot be split and are refused when oversized.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use fe3o4_amqp_types::definitions::{
    FRAME_BODY, FRAME_END, FRAME_HEADER, FRAME_HEADER_SIZE, FRAME_HEARTBEAT, FRAME_METHOD,
    FRAME_OVERHEAD,
};
use fe3o4_amqp_types::methods::Method;
use fe3o4_amqp_types::ContentHeader;
use tokio_util::codec::{Decoder, Encoder};

mod error;
pub(crate) use error::FrameError;

/// A decoded frame together with the channel it arrived on
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Frame {
    /// A method frame
    Method { channel: u16, method: Method },
    /// A content header frame following a content-bearing method
    Header { channel: u16, header: ContentHeader },
    /// A slice of content body
    Body { channel: u16, payload: Bytes },
    /// A heartbeat; carries no payload and belongs to channel 0
    Heartbeat { channel: u16 },
}

impl Frame {
    pub fn channel(&self) -> u16 {
        match self {
            Frame::Method { channel, .. }
            | Frame::Header { channel, .. }
            | Frame::Body { channel, .. }
            | Frame::Heartbeat { channel } => *channel,
        }
    }
}

/// Stateless per-frame codec parameterized by the negotiated frame max
#[derive(Debug)]
pub(crate) struct FrameCodec {
    frame_max: usize,
}

impl FrameCodec {
    pub fn new(frame_max: usize) -> Self {
        Self { frame_max }
    }

    pub fn set_frame_max(&mut self, frame_max: usize) {
        self.frame_max = frame_max;
    }

    /// Largest content body payload that fits in one frame
    fn body_chunk_max(&self) -> usize {
        self.frame_max - FRAME_OVERHEAD
    }

    /// Methods and headers must fit in a single frame
    fn check_unsplittable(&self, payload_len: usize) -> Result<(), FrameError> {
        if payload_len + FRAME_OVERHEAD > self.frame_max {
            return Err(FrameError::FrameMaxExceeded {
                size: payload_len + FRAME_OVERHEAD,
                max: self.frame_max,
            });
        }
        Ok(())
    }

    fn put_frame(dst: &mut BytesMut, frame_type: u8, channel: u16, payload: &[u8]) {
        dst.reserve(FRAME_OVERHEAD + payload.len());
        dst.put_u8(frame_type);
        dst.put_u16(channel);
        dst.put_u32(payload.len() as u32);
        dst.put_slice(payload);
        dst.put_u8(FRAME_END);
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Frame::Method { channel, method } => {
                let mut payload = BytesMut::new();
                method.encode(&mut payload);
                self.check_unsplittable(payload.len())?;
                Self::put_frame(dst, FRAME_METHOD, channel, &payload);
            }
            Frame::Header { channel, header } => {
                let mut payload = BytesMut::with_capacity(header.encoded_size());
                header.encode(&mut payload);
                self.check_unsplittable(payload.len())?;
                Self::put_frame(dst, FRAME_HEADER, channel, &payload);
            }
            Frame::Body { channel, payload } => {
                // one wire frame per chunk, bounded by the negotiated max
                for chunk in payload.chunks(self.body_chunk_max()) {
                    Self::put_frame(dst, FRAME_BODY, channel, chunk);
                }
            }
            Frame::Heartbeat { channel } => {
                Self::put_frame(dst, FRAME_HEARTBEAT, channel, &[]);
            }
        }
        Ok(())
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        // A server that does not speak our protocol version echoes its own
        // 8-byte header back instead of a frame.
        if src.starts_with(b"AMQP") {
            if src.len() < 8 {
                return Ok(None);
            }
            let mut echo = [0u8; 8];
            echo.copy_from_slice(&src[..8]);
            return Err(FrameError::ProtocolHeaderMismatch(echo));
        }

        if src.len() < FRAME_HEADER_SIZE {
            src.reserve(FRAME_HEADER_SIZE - src.len());
            return Ok(None);
        }

        let frame_type = src[0];
        let channel = u16::from_be_bytes([src[1], src[2]]);
        let size = u32::from_be_bytes([src[3], src[4], src[5], src[6]]) as usize;
        if size + FRAME_OVERHEAD > self.frame_max {
            return Err(FrameError::FrameMaxExceeded {
                size: size + FRAME_OVERHEAD,
                max: self.frame_max,
            });
        }

        let total = FRAME_HEADER_SIZE + size + 1;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(total);
        frame.advance(FRAME_HEADER_SIZE);
        let mut payload = frame.split_to(size).freeze();
        let end = frame[0];
        if end != FRAME_END {
            return Err(FrameError::BadFrameEnd(end));
        }

        let frame = match frame_type {
            FRAME_METHOD => Frame::Method {
                channel,
                method: Method::decode(&mut payload)?,
            },
            FRAME_HEADER => Frame::Header {
                channel,
                header: ContentHeader::decode(&mut payload)?,
            },
            FRAME_BODY => Frame::Body { channel, payload },
            FRAME_HEARTBEAT => Frame::Heartbeat { channel },
            other => return Err(FrameError::UnknownFrameType(other)),
        };
        Ok(Some(frame))
    }
}

#[cfg(test)]
mod tests {
    use fe3o4_amqp_types::definitions::FRAME_MIN_SIZE;
    use fe3o4_amqp_types::methods::{BasicPublish, Method, QueueDeclare};
    use fe3o4_amqp_types::{BasicProperties, FieldTable};

    use super::*;

    fn codec() -> FrameCodec {
        FrameCodec::new(FRAME_MIN_SIZE as usize)
    }

    fn encode_all(frames: Vec<Frame>) -> BytesMut {
        let mut codec = codec();
        let mut buf = BytesMut::new();
        for frame in frames {
            codec.encode(frame, &mut buf).unwrap();
        }
        buf
    }

    fn decode_all(mut src: BytesMut) -> Vec<Frame> {
        let mut codec = codec();
        let mut out = Vec::new();
        while let Some(frame) = codec.decode(&mut src).unwrap() {
            out.push(frame);
        }
        assert!(src.is_empty());
        out
    }

    fn sample_frames() -> Vec<Frame> {
        vec![
            Frame::Method {
                channel: 1,
                method: Method::BasicPublish(BasicPublish {
                    exchange: "".try_into().unwrap(),
                    routing_key: "tasks".try_into().unwrap(),
                    mandatory: false,
                    immediate: false,
                }),
            },
            Frame::Header {
                channel: 1,
                header: ContentHeader::basic(5, BasicProperties::default()),
            },
            Frame::Body {
                channel: 1,
                payload: Bytes::from_static(b"hello"),
            },
            Frame::Heartbeat { channel: 0 },
        ]
    }

    #[test]
    fn round_trips_a_frame_sequence() {
        let frames = sample_frames();
        let wire = encode_all(frames.clone());
        assert_eq!(decode_all(wire), frames);
    }

    #[test]
    fn decoding_is_chunking_independent() {
        let wire = encode_all(sample_frames());
        let whole = decode_all(wire.clone());

        // feed the same bytes one at a time
        let mut codec = codec();
        let mut src = BytesMut::new();
        let mut dribbled = Vec::new();
        for byte in wire.iter() {
            src.put_u8(*byte);
            while let Some(frame) = codec.decode(&mut src).unwrap() {
                dribbled.push(frame);
            }
        }
        assert_eq!(dribbled, whole);
    }

    #[test]
    fn splits_bodies_at_the_frame_max() {
        let max_chunk = FRAME_MIN_SIZE as usize - FRAME_OVERHEAD;
        for size in [max_chunk - 1, max_chunk, max_chunk + 1, max_chunk * 3] {
            let payload = Bytes::from(vec![0x42u8; size]);
            let wire = encode_all(vec![Frame::Body {
                channel: 1,
                payload: payload.clone(),
            }]);
            let frames = decode_all(wire);
            let expected = size.div_ceil(max_chunk);
            assert_eq!(frames.len(), expected, "size {size}");
            let mut reassembled = Vec::new();
            for frame in frames {
                match frame {
                    Frame::Body { channel: 1, payload } => {
                        assert!(payload.len() <= max_chunk);
                        reassembled.extend_from_slice(&payload);
                    }
                    other => panic!("unexpected frame {other:?}"),
                }
            }
            assert_eq!(reassembled, payload);
        }
    }

    #[test]
    fn refuses_to_encode_methods_that_do_not_fit() {
        let mut arguments = FieldTable::new();
        arguments.insert(
            "x-filter".try_into().unwrap(),
            vec![0u8; FRAME_MIN_SIZE as usize],
        );
        let frame = Frame::Method {
            channel: 1,
            method: Method::QueueDeclare(QueueDeclare {
                queue: "tasks".try_into().unwrap(),
                passive: false,
                durable: false,
                exclusive: false,
                auto_delete: false,
                no_wait: false,
                arguments,
            }),
        };
        let mut codec = codec();
        let mut buf = BytesMut::new();
        assert!(matches!(
            codec.encode(frame, &mut buf),
            Err(FrameError::FrameMaxExceeded { .. })
        ));
        // nothing half-written
        assert!(buf.is_empty());
    }

    #[test]
    fn rejects_oversized_frames() {
        let mut src = BytesMut::new();
        src.put_u8(FRAME_METHOD);
        src.put_u16(1);
        src.put_u32(FRAME_MIN_SIZE);
        let err = codec().decode(&mut src).unwrap_err();
        assert!(matches!(err, FrameError::FrameMaxExceeded { .. }));
    }

    #[test]
    fn rejects_a_bad_end_marker() {
        let mut wire = encode_all(vec![Frame::Heartbeat { channel: 0 }]);
        let last = wire.len() - 1;
        wire[last] = 0x00;
        let err = codec().decode(&mut wire).unwrap_err();
        assert!(matches!(err, FrameError::BadFrameEnd(0x00)));
    }

    #[test]
    fn reports_a_protocol_header_echo() {
        let mut src = BytesMut::from(&b"AMQP"[..]);
        // short echo keeps buffering
        assert!(codec().decode(&mut src).unwrap().is_none());

        let mut src = BytesMut::from(&b"AMQP\x01\x01\x00\x0a"[..]);
        let err = codec().decode(&mut src).unwrap_err();
        assert!(matches!(
            err,
            FrameError::ProtocolHeaderMismatch([b'A', b'M', b'Q', b'P', 1, 1, 0, 10])
        ));
    }
}
