#![cfg_attr(docsrs, doc(cfg(feature = "tokio")))]
//! Support for receiving notifications in async code running on Tokio.

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::playback::{EventHandler, Notification};

/// An event handler that forwards every notification into a channel.
///
/// Sending never blocks, so the engine's playback thread is never held up by the host.
pub struct ChannelHandler {
    tx: UnboundedSender<Notification>,
}

impl EventHandler for ChannelHandler {
    fn on_notification(&self, notification: Notification) {
        // The host may have stopped listening; the notification has nowhere to go.
        let _ = self.tx.send(notification);
    }
}

/// The receiving end of a [`ChannelHandler`].
pub struct NotificationStream {
    rx: UnboundedReceiver<Notification>,
}

impl NotificationStream {
    /// Completes with the next notification, or with `None` once the handler has been dropped.
    pub async fn recv(&mut self) -> Option<Notification> {
        self.rx.recv().await
    }

    /// Returns the next notification if one is already waiting.
    pub fn try_recv(&mut self) -> Option<Notification> {
        self.rx.try_recv().ok()
    }
}

/// Creates a handler to give to an [`Engine`](crate::engine::Engine), together with the stream
/// its notifications arrive on, in the order the engine raised them.
pub fn notification_channel() -> (ChannelHandler, NotificationStream) {
    let (tx, rx) = unbounded_channel();
    (
        ChannelHandler {
            tx,
        },
        NotificationStream {
            rx,
        },
    )
}
