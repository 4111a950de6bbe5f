//! Ducking of other system audio while the engine plays.
//!
//! The ducking service belongs to the host. This module only asks it for a [`Ducker`] whenever the
//! engine opens an output device, and keeps that ducker enabled until the device is closed.

mod tracker;

pub use tracker::{DeviceHandle, SessionTracker};

/// The host's audio-ducking service.
pub trait AudioDucking: Send + Sync {
    /// Checks whether ducking can work with the current platform configuration.
    fn is_supported(&self) -> bool;

    /// Creates a new, disabled ducker.
    fn new_ducker(&self) -> Box<dyn Ducker>;
}

/// One request to attenuate other audio. Other audio stays ducked while at least one ducker is
/// enabled.
pub trait Ducker: Send {
    /// Starts ducking. Returns `false` if the request was refused.
    fn enable(&mut self) -> bool;

    /// Stops ducking.
    fn disable(&mut self) -> bool;
}

/// A ducking service for platforms where ducking is not available.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unsupported;

impl AudioDucking for Unsupported {
    fn is_supported(&self) -> bool {
        false
    }

    fn new_ducker(&self) -> Box<dyn Ducker> {
        Box::new(Unsupported)
    }
}

impl Ducker for Unsupported {
    fn enable(&mut self) -> bool {
        false
    }

    fn disable(&mut self) -> bool {
        false
    }
}

/// A ducker bound to the lifetime of one open output device. Dropping an enabled session stops the
/// ducking.
pub struct DuckingSession {
    ducker: Box<dyn Ducker>,
    enabled: bool,
}

impl DuckingSession {
    /// Wraps the given ducker, which must be disabled.
    pub fn new(ducker: Box<dyn Ducker>) -> Self {
        Self {
            ducker,
            enabled: false,
        }
    }

    /// Starts ducking, if not started already.
    pub fn enable(&mut self) -> bool {
        if !self.enabled {
            self.enabled = self.ducker.enable();
        }
        self.enabled
    }

    /// Checks whether this session is currently ducking.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl Drop for DuckingSession {
    fn drop(&mut self) {
        if self.enabled {
            // Nobody is left to report a refusal to
            let _ = self.ducker.disable();
        }
    }
}

impl std::fmt::Debug for DuckingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckingSession").field("enabled", &self.enabled).finish()
    }
}
