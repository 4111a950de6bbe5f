//! Interception of the `waveOut` device calls the engine makes.
//!
//! The engine plays its speech through `waveOutOpen`/`waveOutClose` imported from `WINMM.dll`.
//! [`WaveOutHooks`] redirects both imports of the engine module, once per process, to trampolines
//! that call the real functions and then let a [`WaveOutInterceptor`] start or end the ducking
//! session of the device.
//! The result the engine sees is always the one the real function returned.

use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use log::debug;

use crate::ducking::{AudioDucking, DeviceHandle, SessionTracker};
use crate::hook::{HookInstallError, ImportHook, ImportTable};

mod trampoline;

pub use trampoline::{WaveOutCloseFn, WaveOutOpenFn};

/// The module the engine imports the `waveOut` functions from.
pub const WINMM: &str = "WINMM.dll";
/// The name of the device-open import.
pub const WAVE_OUT_OPEN: &str = "waveOutOpen";
/// The name of the device-close import.
pub const WAVE_OUT_CLOSE: &str = "waveOutClose";

/// The result code of a successful multimedia call.
pub const MMSYSERR_NOERROR: u32 = 0;
/// The generic multimedia error result code.
pub const MMSYSERR_ERROR: u32 = 1;
/// The `waveOutOpen` flag that only queries format support without opening a device.
pub const WAVE_FORMAT_QUERY: u32 = 0x0001;

/// Pairs the devices the engine opens with ducking sessions.
pub struct WaveOutInterceptor {
    ducking: Arc<dyn AudioDucking>,
    sessions: SessionTracker,
}

impl WaveOutInterceptor {
    /// Creates an interceptor that requests ducking from the given service.
    pub fn new(ducking: Arc<dyn AudioDucking>) -> Self {
        Self {
            ducking,
            sessions: SessionTracker::new(),
        }
    }

    /// Handles the outcome of a real `waveOutOpen` call and returns the result to hand back to the
    /// caller, which is always `result`. A session is started only when the call succeeded and
    /// produced a non-null handle.
    pub fn device_opened(&self, result: u32, handle: Option<DeviceHandle>) -> u32 {
        match handle {
            Some(handle) if result == MMSYSERR_NOERROR && !handle.is_null() => {
                self.sessions.device_opened(handle, self.ducking.as_ref())
            }
            _ => debug!("waveOutOpen returned {} without a device to duck", result),
        }
        result
    }

    /// Handles the outcome of a real `waveOutClose` call and returns the result to hand back to
    /// the caller, which is always `result`. Closing an untracked device is not an error.
    pub fn device_closed(&self, result: u32, handle: DeviceHandle) -> u32 {
        if result == MMSYSERR_NOERROR && !handle.is_null() {
            self.sessions.device_closed(handle);
        }
        result
    }

    /// The sessions of the currently open devices.
    pub fn sessions(&self) -> &SessionTracker {
        &self.sessions
    }

    /// The ducking service sessions are requested from.
    pub fn ducking(&self) -> &dyn AudioDucking {
        self.ducking.as_ref()
    }
}

impl fmt::Debug for WaveOutInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaveOutInterceptor").field("sessions", &self.sessions).finish()
    }
}

// Both interceptions are installed at most once per process and shared by every owner of
// `WaveOutHooks`. The last owner to go away removes them.
static INSTALLED: Mutex<Option<Weak<Installation>>> = Mutex::new(None);

#[derive(Debug)]
struct Installation {
    open: ImportHook,
    close: ImportHook,
}

impl Installation {
    fn new(table: &dyn ImportTable, target_module: &Path) -> Result<Self, HookInstallError> {
        let open = ImportHook::install(
            table,
            target_module,
            WINMM,
            WAVE_OUT_OPEN,
            trampoline::open_entry_point(),
        )?;
        trampoline::set_real_open(open.original());
        // Dropping `open` on failure puts the original slot back.
        let close = ImportHook::install(
            table,
            target_module,
            WINMM,
            WAVE_OUT_CLOSE,
            trampoline::close_entry_point(),
        )?;
        trampoline::set_real_close(close.original());
        Ok(Self {
            open,
            close,
        })
    }
}

/// A share of the `waveOut` interceptions installed in this process.
///
/// The interceptions are installed by the first `WaveOutHooks` and removed when the last one is
/// dropped. Devices are reported to the interceptor of the most recently installed share that is
/// still alive.
#[derive(Debug)]
pub struct WaveOutHooks {
    installation: Arc<Installation>,
    interceptor: Arc<WaveOutInterceptor>,
}

impl WaveOutHooks {
    /// Routes the devices the engine opens to `interceptor`, installing both interceptions into
    /// `target_module` unless this process already has them. Either both are installed or neither
    /// is.
    pub fn install<P: AsRef<Path>>(
        table: &dyn ImportTable,
        target_module: P,
        interceptor: &Arc<WaveOutInterceptor>,
    ) -> Result<Self, HookInstallError> {
        let mut installed = INSTALLED.lock().unwrap_or_else(PoisonError::into_inner);
        let installation = match installed.as_ref().and_then(Weak::upgrade) {
            Some(installation) => {
                debug!(
                    "waveOut calls of {} are already intercepted",
                    installation.open.target_module().display()
                );
                installation
            }
            None => {
                let installation = Arc::new(Installation::new(table, target_module.as_ref())?);
                *installed = Some(Arc::downgrade(&installation));
                installation
            }
        };
        trampoline::activate(interceptor);
        Ok(Self {
            installation,
            interceptor: interceptor.clone(),
        })
    }

    /// Checks whether this process currently has the interceptions installed.
    pub fn installed_in_process() -> bool {
        INSTALLED
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(false, |installed| installed.strong_count() > 0)
    }

    /// Takes a share of the interceptions into `installed` unless it already holds one or the
    /// ducking service is not supported. Returns whether interceptions are in place afterwards.
    pub fn ensure<P: AsRef<Path>>(
        installed: &mut Option<Self>,
        table: &dyn ImportTable,
        target_module: P,
        interceptor: &Arc<WaveOutInterceptor>,
    ) -> Result<bool, HookInstallError> {
        if installed.is_none() && interceptor.ducking().is_supported() {
            *installed = Some(Self::install(table, target_module, interceptor)?);
        }
        Ok(installed.is_some())
    }

    /// The interception of `waveOutOpen`.
    pub fn open_hook(&self) -> &ImportHook {
        &self.installation.open
    }

    /// The interception of `waveOutClose`.
    pub fn close_hook(&self) -> &ImportHook {
        &self.installation.close
    }
}

impl Drop for WaveOutHooks {
    fn drop(&mut self) {
        trampoline::deactivate(&self.interceptor);
        // Shares are only handed out under this lock, so the count cannot grow behind our back.
        let mut installed = INSTALLED.lock().unwrap_or_else(PoisonError::into_inner);
        if Arc::strong_count(&self.installation) == 1 {
            *installed = None;
            if let Some(installation) = Arc::get_mut(&mut self.installation) {
                installation.open.release();
                installation.close.release();
            }
        }
    }
}
