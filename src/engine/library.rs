use std::ffi::CStr;
use std::os::raw::{c_char, c_void};
use std::path::Path;
use std::sync::Arc;

use windows as Windows;
use Windows::Win32::Foundation::HINSTANCE;
use Windows::Win32::System::LibraryLoader::{GetProcAddress, LoadLibraryW};

use crate::native_util::fn_from_addr;
use crate::playback::NativeCallback;
use crate::{Error, Result};

use super::NativeEngine;

type VoidFn = unsafe extern "C" fn();
type StatusFn = unsafe extern "C" fn() -> bool;
type RegisterFn = unsafe extern "C" fn(NativeCallback) -> bool;
type ConfigureFn = unsafe extern "C" fn(*const c_char, *const c_char) -> bool;
type SpeakFn = unsafe extern "C" fn(*const c_char, *mut c_void) -> bool;

/// The AiSound engine library loaded into the current process.
///
/// The library is never unloaded; the engine's playback threads may outlive any Rust owner.
pub struct NativeLibrary {
    _module: HINSTANCE,
    initialize: VoidFn,
    terminate: VoidFn,
    register_callback: RegisterFn,
    configure: ConfigureFn,
    speak: SpeakFn,
    cancel: StatusFn,
    pause: StatusFn,
    resume: StatusFn,
}

impl NativeLibrary {
    /// Loads the library and resolves its entry points.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let module = unsafe { LoadLibraryW(path.as_os_str()) };
        if module.0 == 0 {
            return Err(Error::Load {
                path: path.to_path_buf(),
                reason: Windows::core::Error::from_win32().to_string(),
            });
        }

        let resolve = |name: &str| -> Result<usize> {
            unsafe { GetProcAddress(module, name) }.map(|f| f as usize).ok_or_else(|| Error::Load {
                path: path.to_path_buf(),
                reason: format!("{} is not exported", name),
            })
        };
        unsafe {
            Ok(Self {
                _module: module,
                initialize: fn_from_addr(resolve("aisound_initialize")?),
                terminate: fn_from_addr(resolve("aisound_terminate")?),
                register_callback: fn_from_addr(resolve("aisound_callback")?),
                configure: fn_from_addr(resolve("aisound_configure")?),
                speak: fn_from_addr(resolve("aisound_speak")?),
                cancel: fn_from_addr(resolve("aisound_cancel")?),
                pause: fn_from_addr(resolve("aisound_pause")?),
                resume: fn_from_addr(resolve("aisound_resume")?),
            })
        }
    }
}

impl NativeEngine for NativeLibrary {
    fn initialize(&self) {
        unsafe { (self.initialize)() }
    }

    fn terminate(&self) {
        unsafe { (self.terminate)() }
    }

    fn register_callback(&self, callback: NativeCallback) -> bool {
        unsafe { (self.register_callback)(callback) }
    }

    fn configure(&self, name: &CStr, value: &CStr) -> bool {
        unsafe { (self.configure)(name.as_ptr(), value.as_ptr()) }
    }

    fn speak(&self, text: &CStr, marker: usize) -> bool {
        unsafe { (self.speak)(text.as_ptr(), marker as *mut c_void) }
    }

    fn cancel(&self) -> bool {
        unsafe { (self.cancel)() }
    }

    fn pause(&self) -> bool {
        unsafe { (self.pause)() }
    }

    fn resume(&self) -> bool {
        unsafe { (self.resume)() }
    }
}

/// Loads the engine library at `path`. Can be passed to [`Engine::new`](super::Engine::new) as
/// the loader.
pub fn load_library(path: &Path) -> Result<Arc<dyn NativeEngine>> {
    Ok(Arc::new(NativeLibrary::load(path)?))
}
