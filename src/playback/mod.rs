//! Translation of the engine's playback events into host notifications.

use std::os::raw::{c_int, c_void};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use log::trace;
use strum::{Display, IntoStaticStr};

mod callback;
mod event;

pub(crate) use callback::{native_callback, route_to, unroute};
pub use callback::NativeCallback;
pub use event::{EventHandler, Notification, Synth, SynthRef};

/// The kinds of events the engine raises while playing.
#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    /// Playback reached the beginning of a unit of speech.
    UnitBoundary,
    /// Playback of the utterance has finished.
    UtteranceFinished,
}

impl EventKind {
    /// Maps the event code the engine passes to its callback.
    pub fn from_code(code: c_int) -> Option<Self> {
        match code {
            0 => Some(Self::UnitBoundary),
            1 => Some(Self::UtteranceFinished),
            _ => None,
        }
    }
}

/// One event raised by the engine.
#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy)]
pub struct CallbackEvent {
    /// What happened.
    pub kind: EventKind,
    /// The marker that was passed along with the speech, if any.
    pub marker: Option<usize>,
}

impl CallbackEvent {
    /// An event marking the start of a unit, optionally carrying an index.
    pub fn unit_boundary(marker: Option<usize>) -> Self {
        Self {
            kind: EventKind::UnitBoundary,
            marker,
        }
    }

    /// An event marking the end of the utterance.
    pub fn utterance_finished() -> Self {
        Self {
            kind: EventKind::UtteranceFinished,
            marker: None,
        }
    }

    fn from_native(code: c_int, marker: *mut c_void) -> Option<Self> {
        EventKind::from_code(code).map(|kind| Self {
            kind,
            marker: if marker.is_null() { None } else { Some(marker as usize) },
        })
    }
}

/// The speech state shared between the host and the engine's playback thread.
///
/// The engine raises its events on its own thread. The bridge keeps the state in atomics and only
/// locks briefly to read the synthesizer reference, so it never waits on the host.
pub struct PlaybackBridge {
    synth: RwLock<SynthRef>,
    last_index: AtomicUsize,
    playing: AtomicBool,
    handler: Box<dyn EventHandler>,
}

impl PlaybackBridge {
    /// Creates a bridge that publishes notifications to the given handler.
    pub fn new<E: EventHandler + 'static>(handler: E) -> Self {
        Self {
            synth: RwLock::new(event::no_synth()),
            last_index: AtomicUsize::new(0),
            playing: AtomicBool::new(false),
            handler: Box::new(handler),
        }
    }

    /// Attributes future notifications to the given synthesizer.
    pub fn set_synth(&self, synth: SynthRef) {
        *self.synth.write().unwrap_or_else(PoisonError::into_inner) = synth;
    }

    /// Checks whether the engine is currently speaking, as far as the host is concerned.
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    /// The index of the last unit boundary the engine reported, or 0 if it carried none.
    pub fn last_index(&self) -> usize {
        self.last_index.load(Ordering::SeqCst)
    }

    /// Handles one event raised by the engine.
    pub fn dispatch(&self, event: CallbackEvent) {
        trace!("Playback event: {}", event.kind);
        match event.kind {
            EventKind::UnitBoundary => match event.marker {
                Some(index) if index != 0 => {
                    self.last_index.store(index, Ordering::SeqCst);
                    self.publish(|synth| Notification::IndexReached {
                        synth,
                        index,
                    });
                }
                _ => self.last_index.store(0, Ordering::SeqCst),
            },
            EventKind::UtteranceFinished => {
                self.playing.store(false, Ordering::SeqCst);
                self.publish(|synth| Notification::DoneSpeaking {
                    synth,
                });
            }
        }
    }

    /// Marks the start of a new utterance.
    pub fn speech_started(&self) {
        self.playing.store(true, Ordering::SeqCst);
    }

    /// Marks the speech as cancelled and tells the host right away.
    pub fn speech_cancelled(&self) {
        self.playing.store(false, Ordering::SeqCst);
        self.publish(|synth| Notification::DoneSpeaking {
            synth,
        });
    }

    fn publish<F: FnOnce(Synth) -> Notification>(&self, notification: F) {
        let synth = self.synth.read().unwrap_or_else(PoisonError::into_inner).upgrade();
        match synth {
            Some(synth) => self.handler.on_notification(notification(synth)),
            None => trace!("Dropping notification for a synthesizer that no longer exists"),
        }
    }
}

impl std::fmt::Debug for PlaybackBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackBridge")
            .field("last_index", &self.last_index())
            .field("playing", &self.is_playing())
            .finish()
    }
}
