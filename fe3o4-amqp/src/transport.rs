//! The framed transport under a connection
//!
//! [`Transport`] wraps an `AsyncRead + AsyncWrite` stream in a
//! [`Framed`] with the frame codec, and carries the optional dead-peer
//! timer. The timer is reset on every incoming frame inside `poll_next`, so
//! any frame (heartbeat included) counts as proof of life.

use std::future::Future;
use std::task::Poll;
use std::time::Duration;

use futures_util::{Sink, Stream};
use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::Framed;

use fe3o4_amqp_types::definitions::PROTOCOL_HEADER;

use crate::frames::{Frame, FrameCodec, FrameError};
use crate::util::IdleTimeout;

pin_project! {
    pub(crate) struct Transport<Io> {
        #[pin]
        framed: Framed<Io, FrameCodec>,
        #[pin]
        idle_timeout: Option<IdleTimeout>,
    }
}

impl<Io> Transport<Io>
where
    Io: AsyncRead + AsyncWrite + Unpin,
{
    pub fn bind(io: Io, frame_max: usize, idle_timeout: Option<Duration>) -> Self {
        let framed = Framed::new(io, FrameCodec::new(frame_max));
        let idle_timeout = idle_timeout
            .filter(|duration| !duration.is_zero())
            .map(IdleTimeout::new);
        Self {
            framed,
            idle_timeout,
        }
    }

    /// Announces the protocol version. Must be the first bytes on the wire.
    pub async fn send_protocol_header(io: &mut Io) -> Result<(), FrameError> {
        io.write_all(&PROTOCOL_HEADER).await?;
        Ok(())
    }

    pub fn set_frame_max(&mut self, frame_max: usize) -> &mut Self {
        self.framed.codec_mut().set_frame_max(frame_max);
        self
    }

    pub fn set_idle_timeout(&mut self, duration: Duration) -> &mut Self {
        self.idle_timeout = match duration.is_zero() {
            true => None,
            false => Some(IdleTimeout::new(duration)),
        };
        self
    }
}

impl<Io> Sink<Frame> for Transport<Io>
where
    Io: AsyncWrite + Unpin,
{
    type Error = FrameError;

    fn poll_ready(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Result<(), Self::Error>> {
        self.project().framed.poll_ready(cx)
    }

    fn start_send(self: std::pin::Pin<&mut Self>, item: Frame) -> Result<(), Self::Error> {
        self.project().framed.start_send(item)
    }

    fn poll_flush(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Result<(), Self::Error>> {
        self.project().framed.poll_flush(cx)
    }

    fn poll_close(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Result<(), Self::Error>> {
        self.project().framed.poll_close(cx)
    }
}

impl<Io> Stream for Transport<Io>
where
    Io: AsyncRead + Unpin,
{
    type Item = Result<Frame, FrameError>;

    fn poll_next(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        let this = self.project();

        match this.framed.poll_next(cx) {
            Poll::Ready(next) => {
                if let Some(delay) = this.idle_timeout.as_pin_mut() {
                    delay.get_mut().reset();
                }
                Poll::Ready(next)
            }
            Poll::Pending => {
                if let Some(delay) = this.idle_timeout.as_pin_mut() {
                    if let Poll::Ready(()) = delay.poll(cx) {
                        return Poll::Ready(Some(Err(FrameError::IdleTimeout)));
                    }
                }
                Poll::Pending
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use fe3o4_amqp_types::definitions::FRAME_MIN_SIZE;
    use fe3o4_amqp_types::methods::Method;
    use futures_util::{SinkExt, StreamExt};
    use tokio_test::io::Builder;
    use tokio_util::codec::Encoder;

    use super::*;

    fn wire(frame: Frame) -> Vec<u8> {
        let mut codec = FrameCodec::new(FRAME_MIN_SIZE as usize);
        let mut buf = BytesMut::new();
        codec.encode(frame, &mut buf).unwrap();
        buf.to_vec()
    }

    #[tokio::test]
    async fn sends_the_protocol_header_first() {
        let mut mock = Builder::new().write(&PROTOCOL_HEADER).build();
        Transport::send_protocol_header(&mut mock).await.unwrap();
    }

    #[tokio::test]
    async fn frames_cross_the_transport() {
        let heartbeat = Frame::Heartbeat { channel: 0 };
        let close_ok = Frame::Method {
            channel: 0,
            method: Method::CloseOk,
        };
        let mock = Builder::new()
            .write(&wire(heartbeat.clone()))
            .read(&wire(close_ok.clone()))
            .build();

        let mut transport = Transport::bind(mock, FRAME_MIN_SIZE as usize, None);
        transport.send(heartbeat).await.unwrap();
        let received = transport.next().await.unwrap().unwrap();
        assert_eq!(received, close_ok);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_timeout_fires_on_silence() {
        let mock = Builder::new().wait(Duration::from_secs(60)).build();
        let mut transport = Transport::bind(mock, FRAME_MIN_SIZE as usize, Some(Duration::from_secs(10)));

        let outcome = transport.next().await.unwrap();
        assert!(matches!(outcome, Err(FrameError::IdleTimeout)));
    }
}
