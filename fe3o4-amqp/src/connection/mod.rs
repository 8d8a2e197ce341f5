//! Connection handle and lifecycle
//!
//! A [`Connection`] multiplexes independently failing [`Channel`]s over
//! one socket. Opening returns only after the negotiation handshake has
//! completed, so limits like frame-max and heartbeat are settled before
//! any channel exists.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::channel::{self, Channel};
use crate::control::{ChannelControl, ConnectionControl};
use crate::frames::Frame;

mod builder;
pub(crate) mod engine;
mod error;
pub(crate) mod heartbeat;

pub use builder::Builder;
pub use error::{Error, OpenError};

/// A handle onto an open connection.
///
/// Dropping the handle (together with every channel on it) closes the
/// connection on the wire.
#[derive(Debug)]
pub struct Connection {
    pub(crate) control: mpsc::Sender<ConnectionControl>,
    pub(crate) outgoing: mpsc::Sender<Frame>,
    pub(crate) handle: JoinHandle<()>,
    pub(crate) closed: Option<oneshot::Receiver<Result<(), Error>>>,
    pub(crate) blocked: watch::Receiver<Option<String>>,
    pub(crate) channels: Arc<Mutex<HashMap<u16, Channel>>>,
}

impl Connection {
    /// A builder with guest credentials, vhost `/` and RabbitMQ-compatible
    /// defaults
    pub fn builder() -> Builder {
        Builder::new()
    }

    /// Connects and opens with the default [`Builder`]; credentials and
    /// vhost come from the URL
    pub async fn open(url: &str) -> Result<Self, OpenError> {
        Builder::new().open(url).await
    }

    /// Opens a channel. `id` picks a specific channel number; `None` lets
    /// the connection pick the smallest free one.
    ///
    /// Asking for an id that is already open returns another handle onto
    /// the existing channel.
    pub async fn open_channel(&self, id: Option<u16>) -> Result<Channel, channel::Error> {
        if let Some(id) = id {
            let channels = self.channels.lock();
            if let Some(existing) = channels.get(&id) {
                if !existing.is_closed() {
                    return Ok(existing.clone());
                }
            }
        }

        let (incoming_tx, incoming_rx) = mpsc::channel(builder::DEFAULT_CONTROL_CHAN_BUF);
        let (responder, rx) = oneshot::channel();
        self.control
            .send(ConnectionControl::AllocateChannel {
                id,
                tx: incoming_tx,
                responder,
            })
            .await
            .map_err(|_| channel::Error::Connection(Error::Closed))?;
        let id = rx
            .await
            .map_err(|_| channel::Error::Connection(Error::Closed))?
            .map_err(channel::Error::Connection)?;

        let (control_tx, control_rx) = mpsc::channel::<ChannelControl>(
            builder::DEFAULT_CONTROL_CHAN_BUF,
        );
        let (returns_tx, returns_rx) = mpsc::unbounded_channel();
        let close_cause = Arc::new(Mutex::new(None));
        let engine = channel::engine::ChannelEngine::open(
            id,
            incoming_rx,
            control_rx,
            self.outgoing.clone(),
            self.control.clone(),
            close_cause.clone(),
            returns_tx,
        )
        .await?;
        let _ = engine.spawn();

        let channel = Channel {
            id,
            control: control_tx,
            close_cause,
            returns: Arc::new(Mutex::new(Some(returns_rx))),
        };
        let mut channels = self.channels.lock();
        channels.retain(|_, existing| !existing.is_closed());
        channels.insert(id, channel.clone());
        Ok(channel)
    }

    /// Another handle onto an already open channel, if it is still alive
    pub fn channel(&self, id: u16) -> Option<Channel> {
        self.channels
            .lock()
            .get(&id)
            .filter(|channel| !channel.is_closed())
            .cloned()
    }

    /// Whether the connection engine has stopped
    pub fn is_closed(&self) -> bool {
        self.handle.is_finished() || self.control.is_closed()
    }

    /// Why the broker has stopped accepting new work, if it has
    /// (`connection.blocked`)
    pub fn blocked_reason(&self) -> Option<String> {
        self.blocked.borrow().clone()
    }

    /// Closes the connection and every channel on it. Closing an already
    /// closed connection is a no-op.
    pub async fn close(self) -> Result<(), Error> {
        let (responder, rx) = oneshot::channel();
        if self
            .control
            .send(ConnectionControl::Close { responder })
            .await
            .is_err()
        {
            return Ok(());
        }
        rx.await.unwrap_or(Ok(()))
    }

    /// Waits until the connection ends and reports why: `Ok` after a
    /// locally requested close, the cause otherwise. Resolves `Ok`
    /// immediately when called twice.
    pub async fn on_close(&mut self) -> Result<(), Error> {
        match self.closed.take() {
            Some(rx) => rx.await.unwrap_or(Ok(())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use tokio_test::io::Builder as IoBuilder;
    use tokio_util::codec::Encoder;

    use fe3o4_amqp_types::definitions::{NOT_ALLOWED, PROTOCOL_HEADER, REPLY_SUCCESS};
    use fe3o4_amqp_types::methods::{
        Close, Method, Open, QueueDeclare, QueueDeclareOk, Start, StartOk, Tune, TuneOk,
    };
    use fe3o4_amqp_types::FieldTable;

    use crate::frames::FrameCodec;

    use super::*;

    fn wire(frame: Frame) -> Vec<u8> {
        let mut codec = FrameCodec::new(131_072);
        let mut buf = BytesMut::new();
        codec.encode(frame, &mut buf).unwrap();
        buf.to_vec()
    }

    fn method(channel: u16, method: Method) -> Vec<u8> {
        wire(Frame::Method { channel, method })
    }

    fn server_start() -> Method {
        Method::Start(Start {
            version_major: 0,
            version_minor: 9,
            server_properties: FieldTable::new(),
            mechanisms: "PLAIN AMQPLAIN".into(),
            locales: "en_US".into(),
        })
    }

    fn client_start_ok() -> Method {
        Method::StartOk(StartOk {
            client_properties: Builder::new().build_client_properties(),
            mechanism: "PLAIN".try_into().unwrap(),
            response: b"\0guest\0guest".to_vec().into(),
            locale: "en_US".try_into().unwrap(),
        })
    }

    fn goodbye() -> Method {
        Method::Close(Close {
            reply_code: REPLY_SUCCESS,
            reply_text: "Goodbye".try_into().unwrap(),
            class_id: 0,
            method_id: 0,
        })
    }

    /// Scripts the whole handshake with a 0 heartbeat so no timer
    /// interferes with the frames under test
    fn handshake(io: &mut IoBuilder) {
        io.write(&PROTOCOL_HEADER)
            .read(&method(0, server_start()))
            .write(&method(0, client_start_ok()))
            .read(&method(
                0,
                Method::Tune(Tune {
                    channel_max: 0,
                    frame_max: 65_536,
                    heartbeat: 0,
                }),
            ))
            .write(&method(
                0,
                Method::TuneOk(TuneOk {
                    channel_max: 2047,
                    frame_max: 65_536,
                    heartbeat: 0,
                }),
            ))
            .write(&method(
                0,
                Method::Open(Open {
                    vhost: "/".try_into().unwrap(),
                }),
            ))
            .read(&method(0, Method::OpenOk));
    }

    #[tokio::test]
    async fn handshake_negotiates_and_close_is_graceful() {
        let mut io = IoBuilder::new();
        handshake(&mut io);
        io.write(&method(0, goodbye()))
            .read(&method(0, Method::CloseOk));

        let connection = Builder::new().open_with_stream(io.build()).await.unwrap();
        connection.close().await.unwrap();
    }

    #[tokio::test]
    async fn broker_close_reports_the_cause() {
        let mut io = IoBuilder::new();
        handshake(&mut io);
        io.read(&method(
            0,
            Method::Close(Close {
                reply_code: 320,
                reply_text: "CONNECTION_FORCED".try_into().unwrap(),
                class_id: 0,
                method_id: 0,
            }),
        ))
        .write(&method(0, Method::CloseOk));

        let mut connection = Builder::new().open_with_stream(io.build()).await.unwrap();
        assert!(matches!(
            connection.on_close().await,
            Err(Error::ClosedByBroker { reply_code: 320, .. })
        ));
        assert!(connection.is_closed());
    }

    #[tokio::test]
    async fn refused_credentials_fail_the_open() {
        let io = IoBuilder::new()
            .write(&PROTOCOL_HEADER)
            .read(&method(0, server_start()))
            .write(&method(0, client_start_ok()))
            .read(&method(
                0,
                Method::Close(Close {
                    reply_code: NOT_ALLOWED,
                    reply_text: "ACCESS_REFUSED".try_into().unwrap(),
                    class_id: 10,
                    method_id: 11,
                }),
            ))
            .write(&method(0, Method::CloseOk))
            .build();

        let outcome = Builder::new().open_with_stream(io).await;
        assert!(matches!(
            outcome,
            Err(OpenError::Connection(Error::ClosedByBroker {
                reply_code: NOT_ALLOWED,
                ..
            }))
        ));
    }

    #[tokio::test]
    async fn unsupported_mechanisms_fail_the_open() {
        let io = IoBuilder::new()
            .write(&PROTOCOL_HEADER)
            .read(&method(
                0,
                Method::Start(Start {
                    version_major: 0,
                    version_minor: 9,
                    server_properties: FieldTable::new(),
                    mechanisms: "EXTERNAL".into(),
                    locales: "en_US".into(),
                }),
            ))
            .build();

        let outcome = Builder::new().open_with_stream(io).await;
        assert!(matches!(outcome, Err(OpenError::MechanismNotSupported(_))));
    }

    #[tokio::test]
    async fn channels_open_over_the_wire_and_share_ids() {
        let mut io = IoBuilder::new();
        handshake(&mut io);
        io.write(&method(5, Method::ChannelOpen))
            .read(&method(5, Method::ChannelOpenOk))
            .write(&method(
                5,
                Method::QueueDeclare(QueueDeclare {
                    queue: "tasks".try_into().unwrap(),
                    passive: false,
                    durable: false,
                    exclusive: false,
                    auto_delete: false,
                    no_wait: false,
                    arguments: FieldTable::new(),
                }),
            ))
            .read(&method(
                5,
                Method::QueueDeclareOk(QueueDeclareOk {
                    queue: "tasks".try_into().unwrap(),
                    message_count: 0,
                    consumer_count: 0,
                }),
            ))
            .write(&method(0, goodbye()))
            .read(&method(0, Method::CloseOk));

        let connection = Builder::new().open_with_stream(io.build()).await.unwrap();
        let channel = connection.open_channel(Some(5)).await.unwrap();
        assert_eq!(channel.id(), 5);

        // the same id hands out another handle, no second channel.open
        let again = connection.open_channel(Some(5)).await.unwrap();
        assert_eq!(again.id(), 5);
        assert!(connection.channel(5).is_some());

        let ok = channel
            .queue_declare("tasks", Default::default())
            .await
            .unwrap();
        assert_eq!(ok.queue.as_str(), "tasks");

        connection.close().await.unwrap();
        assert!(matches!(
            again.queue_purge("tasks").await,
            Err(channel::Error::Closed) | Err(channel::Error::Connection(_))
        ));
    }

    #[tokio::test]
    async fn opening_past_channel_max_fails_without_broker_traffic() {
        let io = IoBuilder::new()
            .write(&PROTOCOL_HEADER)
            .read(&method(0, server_start()))
            .write(&method(0, client_start_ok()))
            .read(&method(
                0,
                Method::Tune(Tune {
                    channel_max: 1,
                    frame_max: 65_536,
                    heartbeat: 0,
                }),
            ))
            .write(&method(
                0,
                Method::TuneOk(TuneOk {
                    channel_max: 1,
                    frame_max: 65_536,
                    heartbeat: 0,
                }),
            ))
            .write(&method(
                0,
                Method::Open(Open {
                    vhost: "/".try_into().unwrap(),
                }),
            ))
            .read(&method(0, Method::OpenOk))
            .write(&method(1, Method::ChannelOpen))
            .read(&method(1, Method::ChannelOpenOk))
            .write(&method(
                1,
                Method::QueueDeclare(QueueDeclare {
                    queue: "tasks".try_into().unwrap(),
                    passive: false,
                    durable: false,
                    exclusive: false,
                    auto_delete: false,
                    no_wait: false,
                    arguments: FieldTable::new(),
                }),
            ))
            .read(&method(
                1,
                Method::QueueDeclareOk(QueueDeclareOk {
                    queue: "tasks".try_into().unwrap(),
                    message_count: 0,
                    consumer_count: 0,
                }),
            ))
            .write(&method(0, goodbye()))
            .read(&method(0, Method::CloseOk))
            .build();

        let connection = Builder::new().open_with_stream(io).await.unwrap();
        let channel = connection.open_channel(None).await.unwrap();
        assert_eq!(channel.id(), 1);

        // refused locally; the script above has no second channel.open
        assert!(matches!(
            connection.open_channel(None).await,
            Err(channel::Error::Connection(Error::ChannelMaxReached(1)))
        ));

        // the open channel is unaffected
        let ok = channel
            .queue_declare("tasks", Default::default())
            .await
            .unwrap();
        assert_eq!(ok.queue.as_str(), "tasks");
        connection.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeats_tick_at_the_negotiated_period() {
        let io = IoBuilder::new()
            .write(&PROTOCOL_HEADER)
            .read(&method(0, server_start()))
            .write(&method(0, client_start_ok()))
            .read(&method(
                0,
                Method::Tune(Tune {
                    channel_max: 0,
                    frame_max: 65_536,
                    heartbeat: 30,
                }),
            ))
            .write(&method(
                0,
                Method::TuneOk(TuneOk {
                    channel_max: 2047,
                    frame_max: 65_536,
                    heartbeat: 30,
                }),
            ))
            .write(&method(
                0,
                Method::Open(Open {
                    vhost: "/".try_into().unwrap(),
                }),
            ))
            .read(&method(0, Method::OpenOk))
            .write(&wire(Frame::Heartbeat { channel: 0 }))
            .read(&method(
                0,
                Method::Close(Close {
                    reply_code: 320,
                    reply_text: "CONNECTION_FORCED".try_into().unwrap(),
                    class_id: 0,
                    method_id: 0,
                }),
            ))
            .write(&method(0, Method::CloseOk))
            .build();

        let mut connection = Builder::new().open_with_stream(io).await.unwrap();
        assert!(connection.on_close().await.is_err());
    }
}
