use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, warn};

use super::{AudioDucking, DuckingSession};

/// The handle of an open `waveOut` device.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub struct DeviceHandle(pub isize);

impl DeviceHandle {
    /// Checks whether this is the null handle.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Keeps one [`DuckingSession`] for every open device handle.
///
/// The engine may open and close devices from several threads, so the map is locked internally.
#[derive(Debug, Default)]
pub struct SessionTracker {
    sessions: Mutex<HashMap<DeviceHandle, DuckingSession>>,
}

impl SessionTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a ducking session for a device that has just been opened. A session still tracked
    /// under the same handle is replaced.
    pub fn device_opened(&self, handle: DeviceHandle, ducking: &dyn AudioDucking) {
        let mut session = DuckingSession::new(ducking.new_ducker());
        if !session.enable() {
            warn!("Ducking was refused for device {:#x}", handle.0);
        }
        debug!("Tracking ducking session for device {:#x}", handle.0);
        let replaced = self.lock().insert(handle, session);
        drop(replaced);
    }

    /// Ends the ducking session of a device that has just been closed. Returns `false` if the
    /// handle was not tracked.
    pub fn device_closed(&self, handle: DeviceHandle) -> bool {
        // Drop the session outside the lock; disabling may call into the host.
        let session = self.lock().remove(&handle);
        match session {
            Some(_) => {
                debug!("Released ducking session for device {:#x}", handle.0);
                true
            }
            None => false,
        }
    }

    /// Checks whether the given device has a session.
    pub fn contains(&self, handle: DeviceHandle) -> bool {
        self.lock().contains_key(&handle)
    }

    /// Returns the number of tracked sessions.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Checks whether no session is tracked.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Ends every tracked session.
    pub fn clear(&self) {
        let sessions = std::mem::take(&mut *self.lock());
        drop(sessions);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<DeviceHandle, DuckingSession>> {
        // Called from the engine's audio threads, which must not unwind.
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
