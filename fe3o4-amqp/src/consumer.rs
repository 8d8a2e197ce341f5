//! Consumer handle: delivery stream and shutdown observation

use std::time::Duration;

use fe3o4_amqp_types::methods::BasicCancel;
use fe3o4_amqp_types::ShortString;
use tokio::sync::{mpsc, oneshot};

use crate::channel;
use crate::control::ChannelControl;
use crate::message::Delivery;

/// Why waiting for a consumer to shut down failed
#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    /// The channel closed with an error and took the consumer with it
    #[error(transparent)]
    Channel(#[from] channel::Error),

    /// The deadline passed before the consumer shut down
    #[error("timed out waiting for the consumer to shut down")]
    Elapsed,
}

enum Shutdown {
    Pending(oneshot::Receiver<Result<(), channel::Error>>),
    Settled(Result<(), channel::Error>),
}

/// An active consumer on a channel.
///
/// Deliveries arrive on [`recv`](Consumer::recv) in broker order.
/// [`wait`](Consumer::wait) resolves once the consumer ends: `Ok` on
/// cancellation or a graceful close, the closing cause when the channel
/// failed.
pub struct Consumer {
    tag: ShortString,
    deliveries: mpsc::UnboundedReceiver<Delivery>,
    shutdown: Shutdown,
    control: mpsc::Sender<ChannelControl>,
}

impl std::fmt::Debug for Consumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer").field("tag", &self.tag).finish()
    }
}

impl Consumer {
    pub(crate) fn new(
        tag: ShortString,
        deliveries: mpsc::UnboundedReceiver<Delivery>,
        shutdown: oneshot::Receiver<Result<(), channel::Error>>,
        control: mpsc::Sender<ChannelControl>,
    ) -> Self {
        Self {
            tag,
            deliveries,
            shutdown: Shutdown::Pending(shutdown),
            control,
        }
    }

    /// The consumer's tag, unique within its channel
    pub fn tag(&self) -> &ShortString {
        &self.tag
    }

    /// Receives the next delivery. `None` once the consumer has ended and
    /// the buffered deliveries are drained.
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.deliveries.recv().await
    }

    /// Cancels the consumer with the broker. Buffered deliveries stay
    /// receivable; cancelling on a closed channel is a no-op.
    pub async fn cancel(&self) -> Result<(), channel::Error> {
        let cancel = BasicCancel {
            consumer_tag: self.tag.clone(),
            no_wait: false,
        };
        let (responder, rx) = oneshot::channel();
        if self
            .control
            .send(ChannelControl::Cancel { cancel, responder })
            .await
            .is_err()
        {
            return Ok(());
        }
        rx.await.unwrap_or(Ok(()))
    }

    /// Waits until the consumer ends. Resolves `Ok` on cancellation or a
    /// graceful close, the closing cause when the channel failed.
    ///
    /// Cancel safe; can be awaited again after a timed-out
    /// [`wait_timeout`](Consumer::wait_timeout).
    pub async fn wait(&mut self) -> Result<(), channel::Error> {
        match &mut self.shutdown {
            Shutdown::Pending(rx) => {
                // a dropped engine counts as a graceful end
                let outcome = rx.await.unwrap_or(Ok(()));
                self.shutdown = Shutdown::Settled(outcome.clone());
                outcome
            }
            Shutdown::Settled(outcome) => outcome.clone(),
        }
    }

    /// Like [`wait`](Consumer::wait) but gives up after `duration`. The
    /// timer is dropped as soon as the wait settles or expires.
    pub async fn wait_timeout(&mut self, duration: Duration) -> Result<(), WaitError> {
        match tokio::time::timeout(duration, self.wait()).await {
            Ok(outcome) => outcome.map_err(WaitError::Channel),
            Err(_) => Err(WaitError::Elapsed),
        }
    }
}
