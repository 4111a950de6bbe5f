use std::any::Any;
use std::sync::{Arc, Weak};

/// The synthesizer object of the host that owns the engine session.
pub type Synth = Arc<dyn Any + Send + Sync>;

/// A weak reference to the host's synthesizer. Notifications are only delivered while it can be
/// upgraded.
pub type SynthRef = Weak<dyn Any + Send + Sync>;

pub(crate) fn no_synth() -> SynthRef {
    Weak::<()>::new()
}

/// A change in the speech state the host should know about.
#[derive(Debug, Clone)]
pub enum Notification {
    /// Speech has reached the position marked with the given index.
    IndexReached {
        /// The synthesizer that is speaking.
        synth: Synth,
        /// The index passed to [`Engine::speak`](crate::engine::Engine::speak).
        index: usize,
    },
    /// The synthesizer has nothing more to say.
    DoneSpeaking {
        /// The synthesizer that stopped speaking.
        synth: Synth,
    },
}

impl Notification {
    /// The synthesizer this notification is about.
    pub fn synth(&self) -> &Synth {
        match self {
            Self::IndexReached {
                synth,
                ..
            } => synth,
            Self::DoneSpeaking {
                synth,
            } => synth,
        }
    }
}

/// The handler that receives notifications.
///
/// It is called on whichever thread raised the notification, which is usually a thread owned by
/// the engine. It must not block for long.
pub trait EventHandler: Send + Sync {
    /// Called for every notification, in the order the engine raised them.
    fn on_notification(&self, notification: Notification);
}

impl<F: Fn(Notification) + Send + Sync> EventHandler for F {
    fn on_notification(&self, notification: Notification) {
        self(notification)
    }
}
