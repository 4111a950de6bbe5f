use std::ffi::CStr;
use std::path::Path;
use std::sync::Arc;

use crate::playback::NativeCallback;
use crate::Result;

/// The entry points of a loaded engine library.
///
/// Every method maps to one native call. Methods returning `bool` report the native call's
/// success verbatim.
pub trait NativeEngine: Send + Sync {
    /// Prepares the engine to speak. May be called again to reset it.
    fn initialize(&self);

    /// Shuts the engine down.
    fn terminate(&self);

    /// Registers the function the engine raises its playback events through.
    fn register_callback(&self, callback: NativeCallback) -> bool;

    /// Sets an engine parameter.
    fn configure(&self, name: &CStr, value: &CStr) -> bool;

    /// Starts speaking the text. The marker is reported back with unit boundary events.
    fn speak(&self, text: &CStr, marker: usize) -> bool;

    /// Stops speaking.
    fn cancel(&self) -> bool;

    /// Pauses speech.
    fn pause(&self) -> bool;

    /// Resumes paused speech.
    fn resume(&self) -> bool;
}

/// Loads the engine library from a path.
pub trait EngineLoader: Send + Sync {
    /// Loads the library. Called at most once per [`Engine`](super::Engine).
    fn load(&self, path: &Path) -> Result<Arc<dyn NativeEngine>>;
}

impl<F: Fn(&Path) -> Result<Arc<dyn NativeEngine>> + Send + Sync> EngineLoader for F {
    fn load(&self, path: &Path) -> Result<Arc<dyn NativeEngine>> {
        self(path)
    }
}
