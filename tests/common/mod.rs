#![allow(dead_code)]

use std::collections::HashMap;
use std::ffi::CStr;
use std::os::raw::{c_int, c_void};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicIsize, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use aisound_lite::ducking::{AudioDucking, Ducker};
use aisound_lite::hook::{EntryPoint, HookInstallError, ImageError, ImportTable, InstalledPatch};
use aisound_lite::engine::NativeEngine;
use aisound_lite::playback::{NativeCallback, Notification};
use aisound_lite::wave_out::{
    WaveOutCloseFn, WaveOutOpenFn, MMSYSERR_NOERROR, WAVE_OUT_CLOSE, WAVE_OUT_OPEN,
};

/// Serializes tests that install hooks or initialize engines; both touch process-wide state.
pub fn serial() -> MutexGuard<'static, ()> {
    static SERIAL: Mutex<()> = Mutex::new(());
    SERIAL.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What the stand-in `waveOutOpen` returns.
pub static OPEN_RESULT: AtomicU32 = AtomicU32::new(MMSYSERR_NOERROR);
/// What the stand-in `waveOutClose` returns.
pub static CLOSE_RESULT: AtomicU32 = AtomicU32::new(MMSYSERR_NOERROR);
static NEXT_HANDLE: AtomicIsize = AtomicIsize::new(100);

/// Stands in for the system `waveOutOpen`. Hands out a fresh handle even when failing.
unsafe extern "system" fn system_wave_out_open(
    handle_out: *mut isize,
    _device_id: u32,
    _format: *const c_void,
    _callback: usize,
    _instance: usize,
    _flags: u32,
) -> u32 {
    if !handle_out.is_null() {
        *handle_out = NEXT_HANDLE.fetch_add(1, Ordering::SeqCst);
    }
    OPEN_RESULT.load(Ordering::SeqCst)
}

unsafe extern "system" fn system_wave_out_close(_handle: isize) -> u32 {
    CLOSE_RESULT.load(Ordering::SeqCst)
}

/// An import table whose `waveOut` slots initially point at the stand-in system functions.
pub fn system_imports() -> FakeImports {
    OPEN_RESULT.store(MMSYSERR_NOERROR, Ordering::SeqCst);
    CLOSE_RESULT.store(MMSYSERR_NOERROR, Ordering::SeqCst);
    FakeImports::new()
        .with_original(WAVE_OUT_OPEN, system_wave_out_open as WaveOutOpenFn as usize)
        .with_original(WAVE_OUT_CLOSE, system_wave_out_close as WaveOutCloseFn as usize)
}

/// The trampoline currently patched over `waveOutOpen`.
pub fn patched_open(imports: &FakeImports) -> WaveOutOpenFn {
    unsafe { std::mem::transmute(imports.replacement(WAVE_OUT_OPEN).expect("waveOutOpen is not hooked")) }
}

/// The trampoline currently patched over `waveOutClose`.
pub fn patched_close(imports: &FakeImports) -> WaveOutCloseFn {
    unsafe { std::mem::transmute(imports.replacement(WAVE_OUT_CLOSE).expect("waveOutClose is not hooked")) }
}

pub struct FakeDucking {
    supported: bool,
    active: Arc<AtomicUsize>,
    created: AtomicUsize,
}

impl FakeDucking {
    pub fn supported() -> Arc<Self> {
        Arc::new(Self {
            supported: true,
            active: Arc::new(AtomicUsize::new(0)),
            created: AtomicUsize::new(0),
        })
    }

    pub fn unsupported() -> Arc<Self> {
        Arc::new(Self {
            supported: false,
            active: Arc::new(AtomicUsize::new(0)),
            created: AtomicUsize::new(0),
        })
    }

    /// Number of duckers currently enabled.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Number of duckers ever handed out.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl AudioDucking for FakeDucking {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn new_ducker(&self) -> Box<dyn Ducker> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Box::new(FakeDucker {
            active: self.active.clone(),
        })
    }
}

struct FakeDucker {
    active: Arc<AtomicUsize>,
}

impl Ducker for FakeDucker {
    fn enable(&mut self) -> bool {
        self.active.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn disable(&mut self) -> bool {
        self.active.fetch_sub(1, Ordering::SeqCst);
        true
    }
}

#[derive(Default)]
struct ImportState {
    originals: HashMap<String, usize>,
    patched: HashMap<String, usize>,
    installs: usize,
    fail_on: Option<String>,
    targets: Vec<PathBuf>,
}

/// An import table that records patches instead of writing to a module image.
#[derive(Clone, Default)]
pub struct FakeImports {
    state: Arc<Mutex<ImportState>>,
}

impl FakeImports {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_original(self, function: &str, entry: usize) -> Self {
        self.lock().originals.insert(function.to_string(), entry);
        self
    }

    pub fn failing_on(self, function: &str) -> Self {
        self.lock().fail_on = Some(function.to_string());
        self
    }

    /// Where calls to `function` currently go, if it is patched.
    pub fn replacement(&self, function: &str) -> Option<usize> {
        self.lock().patched.get(function).copied()
    }

    /// Number of patches currently in place.
    pub fn active(&self) -> usize {
        self.lock().patched.len()
    }

    /// Number of patches ever installed.
    pub fn installs(&self) -> usize {
        self.lock().installs
    }

    pub fn targets(&self) -> Vec<PathBuf> {
        self.lock().targets.clone()
    }

    fn lock(&self) -> MutexGuard<'_, ImportState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ImportTable for FakeImports {
    fn patch(
        &self,
        target_module: &Path,
        imported_module: &CStr,
        function: &CStr,
        replacement: EntryPoint,
    ) -> Result<Box<dyn InstalledPatch>, HookInstallError> {
        let name = function.to_string_lossy().into_owned();
        let mut state = self.lock();
        if state.fail_on.as_deref() == Some(name.as_str()) {
            return Err(HookInstallError::Image {
                path: target_module.to_path_buf(),
                function: name.clone(),
                source: ImageError::FunctionNotImported {
                    module: imported_module.to_string_lossy().into_owned(),
                    function: name,
                },
            });
        }
        assert!(!state.patched.contains_key(&name), "{} patched twice", name);
        state.patched.insert(name.clone(), replacement.addr());
        state.installs += 1;
        state.targets.push(target_module.to_path_buf());
        let original = state.originals.get(&name).copied().unwrap_or(0);
        Ok(Box::new(FakePatch {
            state: self.state.clone(),
            function: name,
            original,
        }))
    }
}

struct FakePatch {
    state: Arc<Mutex<ImportState>>,
    function: String,
    original: usize,
}

impl InstalledPatch for FakePatch {
    fn original(&self) -> EntryPoint {
        EntryPoint::new(self.original)
    }

    fn remove(&mut self) {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).patched.remove(&self.function);
    }
}

/// A native engine that records the calls it receives.
pub struct ScriptedEngine {
    calls: Mutex<Vec<String>>,
    callback: Mutex<Option<NativeCallback>>,
    succeed: AtomicBool,
}

impl ScriptedEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            callback: Mutex::new(None),
            succeed: AtomicBool::new(true),
        })
    }

    /// Makes every status-returning call report `succeed`.
    pub fn set_succeed(&self, succeed: bool) {
        self.succeed.store(succeed, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Raises a playback event the way the engine's thread would.
    pub fn raise(&self, kind: c_int, marker: usize) {
        let callback = self.callback.lock().unwrap().expect("no callback registered");
        unsafe { callback(kind, marker as *mut c_void) }
    }

    fn record<S: Into<String>>(&self, call: S) -> bool {
        self.calls.lock().unwrap().push(call.into());
        self.succeed.load(Ordering::SeqCst)
    }
}

impl NativeEngine for ScriptedEngine {
    fn initialize(&self) {
        self.record("initialize");
    }

    fn terminate(&self) {
        self.record("terminate");
    }

    fn register_callback(&self, callback: NativeCallback) -> bool {
        *self.callback.lock().unwrap() = Some(callback);
        self.record("register_callback")
    }

    fn configure(&self, name: &CStr, value: &CStr) -> bool {
        self.record(format!("configure {}={}", name.to_str().unwrap(), value.to_str().unwrap()))
    }

    fn speak(&self, text: &CStr, marker: usize) -> bool {
        self.record(format!("speak {} #{}", text.to_str().unwrap(), marker))
    }

    fn cancel(&self) -> bool {
        self.record("cancel")
    }

    fn pause(&self) -> bool {
        self.record("pause")
    }

    fn resume(&self) -> bool {
        self.record("resume")
    }
}

/// Collects notifications as `index N` / `done` strings.
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn handler(&self) -> impl Fn(Notification) + Send + Sync + 'static {
        let events = self.events.clone();
        move |notification: Notification| {
            let event = match notification {
                Notification::IndexReached {
                    index,
                    ..
                } => format!("index {}", index),
                Notification::DoneSpeaking {
                    ..
                } => "done".to_string(),
            };
            events.lock().unwrap().push(event);
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}
