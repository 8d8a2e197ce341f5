//! The connection engine: handshake, frame routing and lifecycle
//!
//! The engine owns the transport. [`ConnectionEngine::open`] drives the
//! negotiation handshake to completion before the event loop is spawned,
//! so a [`Connection`](super::Connection) handle only ever exists for a
//! fully opened connection. The event loop multiplexes outgoing frames
//! from the channel engines onto the socket, routes incoming frames by
//! channel number and owns the channel id space.

use std::collections::HashMap;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use fe3o4_amqp_types::definitions::{COMMAND_INVALID, NOT_IMPLEMENTED, REPLY_SUCCESS};
use fe3o4_amqp_types::methods::{Close, Method, Open, StartOk, TuneOk};
use fe3o4_amqp_types::ShortString;

use crate::channel;
use crate::control::{ChannelIncomingItem, ConnectionControl};
use crate::frames::Frame;
use crate::transport::Transport;
use crate::util::Running;

use super::builder::Builder;
use super::heartbeat::HeartBeat;
use super::{Error, OpenError};

enum State {
    Open,
    CloseSent,
}

/// Both sides propose a limit; 0 yields to the other side, otherwise the
/// smaller one wins
fn negotiated_u16(client: u16, server: u16) -> u16 {
    match (client, server) {
        (0, server) => server,
        (client, 0) => client,
        (client, server) => client.min(server),
    }
}

fn negotiated_u32(client: u32, server: u32) -> u32 {
    match (client, server) {
        (0, server) => server,
        (client, 0) => client,
        (client, server) => client.min(server),
    }
}

/// The smallest unused channel id, treating a channel-max of 0 as no limit
fn find_free_id(
    channels: &HashMap<u16, mpsc::Sender<ChannelIncomingItem>>,
    channel_max: u16,
) -> Option<u16> {
    let max = match channel_max {
        0 => u16::MAX,
        max => max,
    };
    (1..=max).find(|id| !channels.contains_key(id))
}

/// Reply text for an outgoing `connection.close`, bounded to fit a short
/// string
fn close_reply_text(err: &Error) -> ShortString {
    let text: String = err.to_string().chars().take(120).collect();
    text.try_into().unwrap_or_default()
}

pub(crate) struct ConnectionEngine<Io> {
    transport: Transport<Io>,
    control: mpsc::Receiver<ConnectionControl>,
    outgoing: mpsc::Receiver<Frame>,
    heartbeat: HeartBeat,
    channels: HashMap<u16, mpsc::Sender<ChannelIncomingItem>>,
    channel_max: u16,
    state: State,
    close_responder: Option<oneshot::Sender<Result<(), Error>>>,
    pending_fault: Option<Error>,
    closed: Option<oneshot::Sender<Result<(), Error>>>,
    blocked: watch::Sender<Option<String>>,
}

async fn recv_method<Io>(transport: &mut Transport<Io>) -> Result<Method, OpenError>
where
    Io: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        match transport.next().await {
            Some(Ok(Frame::Method { channel: 0, method })) => return Ok(method),
            Some(Ok(Frame::Heartbeat { .. })) => continue,
            Some(Ok(frame)) => {
                return Err(OpenError::Connection(Error::protocol(
                    COMMAND_INVALID,
                    format!("unexpected frame during handshake: {frame:?}"),
                )))
            }
            Some(Err(err)) => return Err(err.into()),
            None => return Err(OpenError::Connection(Error::Closed)),
        }
    }
}

impl<Io> ConnectionEngine<Io>
where
    Io: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    /// Drives the negotiation handshake to completion: `start`/`start-ok`
    /// (SASL PLAIN only), `tune`/`tune-ok`, `open`/`open-ok`
    pub(crate) async fn open(
        mut transport: Transport<Io>,
        builder: &Builder,
        control: mpsc::Receiver<ConnectionControl>,
        outgoing: mpsc::Receiver<Frame>,
        closed: oneshot::Sender<Result<(), Error>>,
        blocked: watch::Sender<Option<String>>,
    ) -> Result<Self, OpenError> {
        let start = match recv_method(&mut transport).await? {
            Method::Start(start) => start,
            Method::Close(close) => {
                let _ = transport
                    .send(Frame::Method {
                        channel: 0,
                        method: Method::CloseOk,
                    })
                    .await;
                return Err(OpenError::Connection(Error::ClosedByBroker {
                    reply_code: close.reply_code,
                    reply_text: close.reply_text.to_string(),
                    class_id: close.class_id,
                    method_id: close.method_id,
                }));
            }
            other => {
                return Err(OpenError::Connection(Error::protocol(
                    COMMAND_INVALID,
                    format!("expected connection.start, got {}", other.name()),
                )))
            }
        };

        let mechanisms = String::from_utf8_lossy(start.mechanisms.as_bytes()).into_owned();
        if !mechanisms.split(' ').any(|mechanism| mechanism == "PLAIN") {
            return Err(OpenError::MechanismNotSupported(mechanisms));
        }

        let mut response = Vec::with_capacity(builder.username.len() + builder.password.len() + 2);
        response.push(0);
        response.extend_from_slice(builder.username.as_bytes());
        response.push(0);
        response.extend_from_slice(builder.password.as_bytes());
        let start_ok = StartOk {
            client_properties: builder.build_client_properties(),
            mechanism: "PLAIN".try_into().unwrap_or_default(),
            response: response.into(),
            locale: builder.locale.as_str().try_into().unwrap_or_default(),
        };
        transport
            .send(Frame::Method {
                channel: 0,
                method: Method::StartOk(start_ok),
            })
            .await?;

        let tune = match recv_method(&mut transport).await? {
            Method::Tune(tune) => tune,
            Method::Secure(_) => {
                // challenge-response mechanisms are out of scope; refuse
                // rather than hang the handshake
                let err = Error::protocol(
                    NOT_IMPLEMENTED,
                    "SASL challenge-response is not supported",
                );
                let close = Close {
                    reply_code: NOT_IMPLEMENTED,
                    reply_text: close_reply_text(&err),
                    class_id: 10,
                    method_id: 20,
                };
                let _ = transport
                    .send(Frame::Method {
                        channel: 0,
                        method: Method::Close(close),
                    })
                    .await;
                return Err(OpenError::Connection(err));
            }
            Method::Close(close) => {
                let _ = transport
                    .send(Frame::Method {
                        channel: 0,
                        method: Method::CloseOk,
                    })
                    .await;
                return Err(OpenError::Connection(Error::ClosedByBroker {
                    reply_code: close.reply_code,
                    reply_text: close.reply_text.to_string(),
                    class_id: close.class_id,
                    method_id: close.method_id,
                }));
            }
            other => {
                return Err(OpenError::Connection(Error::protocol(
                    COMMAND_INVALID,
                    format!("expected connection.tune, got {}", other.name()),
                )))
            }
        };

        let channel_max = negotiated_u16(builder.channel_max, tune.channel_max);
        let frame_max = negotiated_u32(builder.frame_max, tune.frame_max);
        let heartbeat = builder.heartbeat.min(tune.heartbeat);
        debug!(channel_max, frame_max, heartbeat, "negotiated connection limits");
        transport
            .send(Frame::Method {
                channel: 0,
                method: Method::TuneOk(TuneOk {
                    channel_max,
                    frame_max,
                    heartbeat,
                }),
            })
            .await?;

        transport.set_frame_max(frame_max as usize);
        let heartbeat = match heartbeat {
            0 => HeartBeat::never(),
            period => {
                let period = Duration::from_secs(period as u64);
                // a peer is dead after two silent heartbeat intervals
                transport.set_idle_timeout(period * 2);
                HeartBeat::new(period)
            }
        };

        transport
            .send(Frame::Method {
                channel: 0,
                method: Method::Open(Open {
                    vhost: builder.vhost.as_str().try_into().unwrap_or_default(),
                }),
            })
            .await?;
        match recv_method(&mut transport).await? {
            Method::OpenOk => {}
            Method::Close(close) => {
                let _ = transport
                    .send(Frame::Method {
                        channel: 0,
                        method: Method::CloseOk,
                    })
                    .await;
                return Err(OpenError::Connection(Error::ClosedByBroker {
                    reply_code: close.reply_code,
                    reply_text: close.reply_text.to_string(),
                    class_id: close.class_id,
                    method_id: close.method_id,
                }));
            }
            other => {
                return Err(OpenError::Connection(Error::protocol(
                    COMMAND_INVALID,
                    format!("expected connection.open-ok, got {}", other.name()),
                )))
            }
        }
        debug!(vhost = %builder.vhost, "connection opened");

        Ok(Self {
            transport,
            control,
            outgoing,
            heartbeat,
            channels: HashMap::new(),
            channel_max,
            state: State::Open,
            close_responder: None,
            pending_fault: None,
            closed: Some(closed),
            blocked,
        })
    }

    pub(crate) fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.event_loop())
    }

    async fn event_loop(mut self) {
        loop {
            let running = tokio::select! {
                Some(_) = self.heartbeat.next() => {
                    self.send_frame(Frame::Heartbeat { channel: 0 }).await
                }
                frame = self.transport.next() => match frame {
                    Some(Ok(frame)) => self.on_incoming(frame).await,
                    Some(Err(err)) => self.on_transport_error(err.into()).await,
                    None => {
                        self.teardown(Err(Error::Closed)).await;
                        Running::Stop
                    }
                },
                command = self.control.recv() => match command {
                    Some(command) => self.on_control(command).await,
                    None => self.close_on_drop().await,
                },
                frame = self.outgoing.recv() => match frame {
                    Some(frame) => self.send_frame(frame).await,
                    None => self.close_on_drop().await,
                },
            };
            if let Running::Stop = running {
                break;
            }
        }
        debug!("connection engine stopped");
    }

    async fn send_frame(&mut self, frame: Frame) -> Running {
        match self.transport.send(frame).await {
            Ok(()) => Running::Continue,
            Err(err) => {
                self.teardown(Err(err.into())).await;
                Running::Stop
            }
        }
    }

    /// Frame-level violations are reported with an outgoing
    /// `connection.close` before the teardown; a dead socket is not
    async fn on_transport_error(&mut self, err: Error) -> Running {
        match &err {
            Error::Io(_) | Error::HeartbeatTimeout => {}
            other => {
                let close = Close {
                    reply_code: other.reply_code(),
                    reply_text: close_reply_text(other),
                    class_id: 0,
                    method_id: 0,
                };
                let _ = self
                    .transport
                    .send(Frame::Method {
                        channel: 0,
                        method: Method::Close(close),
                    })
                    .await;
            }
        }
        self.teardown(Err(err)).await;
        Running::Stop
    }

    async fn on_incoming(&mut self, frame: Frame) -> Running {
        match frame.channel() {
            0 => self.on_connection_frame(frame).await,
            channel => {
                let removed = match self.channels.get(&channel) {
                    Some(tx) => tx.send(Ok(frame)).await.is_err(),
                    None => {
                        if let State::CloseSent = self.state {
                            // in-flight frames after our close are dropped
                            return Running::Continue;
                        }
                        return self
                            .fault(Error::protocol(
                                COMMAND_INVALID,
                                format!("frame on unknown channel {channel}"),
                            ))
                            .await;
                    }
                };
                if removed {
                    // the channel engine is gone but not yet deallocated
                    self.channels.remove(&channel);
                }
                Running::Continue
            }
        }
    }

    async fn on_connection_frame(&mut self, frame: Frame) -> Running {
        let method = match frame {
            Frame::Heartbeat { .. } => return Running::Continue,
            Frame::Method { method, .. } => method,
            frame => {
                return self
                    .fault(Error::protocol(
                        COMMAND_INVALID,
                        format!("content frame on channel 0: {frame:?}"),
                    ))
                    .await
            }
        };
        match method {
            Method::Close(close) => {
                let _ = self
                    .transport
                    .send(Frame::Method {
                        channel: 0,
                        method: Method::CloseOk,
                    })
                    .await;
                self.teardown(Err(Error::ClosedByBroker {
                    reply_code: close.reply_code,
                    reply_text: close.reply_text.to_string(),
                    class_id: close.class_id,
                    method_id: close.method_id,
                }))
                .await;
                Running::Stop
            }
            Method::CloseOk => {
                // a stashed fault overrides the graceful outcome
                self.teardown(Ok(())).await;
                Running::Stop
            }
            Method::Blocked(blocked) => {
                warn!(reason = %blocked.reason, "connection blocked by the broker");
                self.blocked.send_replace(Some(blocked.reason.to_string()));
                Running::Continue
            }
            Method::Unblocked => {
                debug!("connection unblocked by the broker");
                self.blocked.send_replace(None);
                Running::Continue
            }
            _ if matches!(self.state, State::CloseSent) => Running::Continue,
            other => {
                self.fault(Error::protocol(
                    COMMAND_INVALID,
                    format!("unexpected {} on channel 0", other.name()),
                ))
                .await
            }
        }
    }

    /// Reports a fatal violation on the wire and waits for the broker's
    /// `close-ok` before tearing down
    async fn fault(&mut self, err: Error) -> Running {
        if let State::CloseSent = self.state {
            if self.pending_fault.is_none() {
                self.pending_fault = Some(err);
            }
            return Running::Continue;
        }
        error!(%err, "connection fault");
        let close = Close {
            reply_code: err.reply_code(),
            reply_text: close_reply_text(&err),
            class_id: 0,
            method_id: 0,
        };
        self.state = State::CloseSent;
        self.pending_fault = Some(err);
        self.send_frame(Frame::Method {
            channel: 0,
            method: Method::Close(close),
        })
        .await
    }

    async fn on_control(&mut self, command: ConnectionControl) -> Running {
        match command {
            ConnectionControl::AllocateChannel { id, tx, responder } => {
                if !matches!(self.state, State::Open) {
                    let _ = responder.send(Err(Error::Closed));
                    return Running::Continue;
                }
                let outcome = self.allocate_channel(id, tx);
                let _ = responder.send(outcome);
                Running::Continue
            }
            ConnectionControl::DeallocateChannel(id) => {
                self.channels.remove(&id);
                Running::Continue
            }
            ConnectionControl::Close { responder } => match self.state {
                State::Open => {
                    self.state = State::CloseSent;
                    self.close_responder = Some(responder);
                    let close = Close {
                        reply_code: REPLY_SUCCESS,
                        reply_text: "Goodbye".try_into().unwrap_or_default(),
                        class_id: 0,
                        method_id: 0,
                    };
                    self.send_frame(Frame::Method {
                        channel: 0,
                        method: Method::Close(close),
                    })
                    .await
                }
                State::CloseSent => {
                    let _ = responder.send(Ok(()));
                    Running::Continue
                }
            },
            ConnectionControl::ProtocolError(err) => self.fault(err).await,
        }
    }

    fn allocate_channel(
        &mut self,
        id: Option<u16>,
        tx: mpsc::Sender<ChannelIncomingItem>,
    ) -> Result<u16, Error> {
        let id = match id {
            Some(0) => {
                return Err(Error::protocol(COMMAND_INVALID, "channel 0 is reserved"))
            }
            Some(id) if self.channel_max != 0 && id > self.channel_max => {
                return Err(Error::ChannelMaxReached(self.channel_max))
            }
            Some(id) if self.channels.contains_key(&id) => {
                return Err(Error::protocol(
                    COMMAND_INVALID,
                    format!("channel {id} is already open"),
                ))
            }
            Some(id) => id,
            None => find_free_id(&self.channels, self.channel_max)
                .ok_or(Error::ChannelMaxReached(self.channel_max))?,
        };
        self.channels.insert(id, tx);
        Ok(id)
    }

    /// Every handle and channel is gone; close on the wire and drain
    /// until the broker confirms
    async fn close_on_drop(&mut self) -> Running {
        if let State::Open = self.state {
            self.state = State::CloseSent;
            let close = Close {
                reply_code: REPLY_SUCCESS,
                reply_text: "Goodbye".try_into().unwrap_or_default(),
                class_id: 0,
                method_id: 0,
            };
            if let Err(err) = self
                .transport
                .send(Frame::Method {
                    channel: 0,
                    method: Method::Close(close),
                })
                .await
            {
                self.teardown(Err(err.into())).await;
                return Running::Stop;
            }
        }
        loop {
            match self.transport.next().await {
                Some(Ok(Frame::Method {
                    channel: 0,
                    method: Method::CloseOk,
                })) => break,
                Some(Ok(_)) => continue,
                Some(Err(_)) | None => break,
            }
        }
        self.teardown(Ok(())).await;
        Running::Stop
    }

    /// Settles every observer of the connection's end. A stashed fault
    /// takes precedence over whatever outcome the caller saw.
    async fn teardown(&mut self, outcome: Result<(), Error>) {
        let outcome = match self.pending_fault.take() {
            Some(err) => Err(err),
            None => outcome,
        };
        let item = match &outcome {
            Ok(()) => channel::Error::Closed,
            Err(cause) => channel::Error::Connection(cause.clone()),
        };
        for (_, tx) in self.channels.drain() {
            let _ = tx.send(Err(item.clone())).await;
        }
        if let Some(responder) = self.close_responder.take() {
            let _ = responder.send(outcome.clone());
        }
        if let Some(closed) = self.closed.take() {
            let _ = closed.send(outcome);
        }
        self.control.close();
        self.outgoing.close();
        let _ = self.transport.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_yields_to_the_other_side_in_negotiation() {
        assert_eq!(negotiated_u16(2047, 0), 2047);
        assert_eq!(negotiated_u16(0, 1024), 1024);
        assert_eq!(negotiated_u16(2047, 1024), 1024);
        assert_eq!(negotiated_u16(0, 0), 0);
        assert_eq!(negotiated_u32(131072, 65536), 65536);
        assert_eq!(negotiated_u32(0, 65536), 65536);
    }

    #[test]
    fn free_ids_start_at_one_and_skip_occupied_slots() {
        let mut channels = HashMap::new();
        assert_eq!(find_free_id(&channels, 3), Some(1));
        let (tx, _rx) = mpsc::channel(1);
        channels.insert(1, tx.clone());
        channels.insert(2, tx.clone());
        assert_eq!(find_free_id(&channels, 3), Some(3));
        channels.insert(3, tx.clone());
        assert_eq!(find_free_id(&channels, 3), None);
        channels.remove(&2);
        assert_eq!(find_free_id(&channels, 3), Some(2));
        // 0 means no limit
        channels.insert(2, tx);
        assert_eq!(find_free_id(&channels, 0), Some(4));
    }
}
