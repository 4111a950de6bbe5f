//! The facade the host drives the engine through.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{error, warn};

use crate::ducking::AudioDucking;
use crate::hook::ImportTable;
use crate::native_util::to_native;
use crate::playback::{self, EventHandler, PlaybackBridge, SynthRef};
use crate::wave_out::{WaveOutHooks, WaveOutInterceptor};
use crate::{Error, Result};

#[cfg(windows)]
mod library;
mod native;

#[cfg(windows)]
#[cfg_attr(docsrs, doc(cfg(windows)))]
pub use library::{load_library, NativeLibrary};
pub use native::{EngineLoader, NativeEngine};

/// The file name of the engine library.
pub const LIBRARY_FILE_NAME: &str = "aisound.dll";

/// Specifies where the engine lives and whether it should duck other audio.
#[derive(Debug, Hash, PartialEq, Eq, Clone)]
pub struct EngineOptions {
    library_path: PathBuf,
    duck_audio: bool,
}

impl EngineOptions {
    /// Options for the engine library at the given path, with ducking enabled.
    pub fn new<P: Into<PathBuf>>(library_path: P) -> Self {
        Self {
            library_path: library_path.into(),
            duck_audio: true,
        }
    }

    /// Options for the engine library installed in the given directory.
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self::new(dir.as_ref().join(LIBRARY_FILE_NAME))
    }

    /// Enables or disables ducking of other audio while the engine speaks.
    pub fn duck_audio(mut self, enabled: bool) -> Self {
        self.duck_audio = enabled;
        self
    }

    /// The path of the engine library.
    pub fn library_path(&self) -> &Path {
        &self.library_path
    }

    /// Checks whether ducking was requested.
    pub fn ducks_audio(&self) -> bool {
        self.duck_audio
    }
}

/// The engine session of the process.
///
/// The engine library is loaded on the first [`initialize`](Self::initialize) and stays loaded.
/// Before loading it, the engine's `waveOut` imports are intercepted so the devices it opens are
/// ducked. The engine keeps a single callback registration, so only one `Engine` should be
/// initialized per process at any time.
pub struct Engine {
    options: EngineOptions,
    loader: Box<dyn EngineLoader>,
    imports: Box<dyn ImportTable>,
    interceptor: Arc<WaveOutInterceptor>,
    hooks: Option<WaveOutHooks>,
    bridge: Arc<PlaybackBridge>,
    library: Option<Arc<dyn NativeEngine>>,
}

impl Engine {
    /// Creates an engine session. Nothing is loaded until the session is initialized.
    pub fn new<L, T, E>(
        options: EngineOptions,
        loader: L,
        imports: T,
        ducking: Arc<dyn AudioDucking>,
        handler: E,
    ) -> Self
    where
        L: EngineLoader + 'static,
        T: ImportTable + 'static,
        E: EventHandler + 'static,
    {
        Self {
            options,
            loader: Box::new(loader),
            imports: Box::new(imports),
            interceptor: Arc::new(WaveOutInterceptor::new(ducking)),
            hooks: None,
            bridge: Arc::new(PlaybackBridge::new(handler)),
            library: None,
        }
    }

    /// Creates an engine session that loads the engine library into the current process and
    /// patches its import table in place.
    #[cfg(windows)]
    #[cfg_attr(docsrs, doc(cfg(windows)))]
    pub fn for_process<E: EventHandler + 'static>(
        options: EngineOptions,
        ducking: Arc<dyn AudioDucking>,
        handler: E,
    ) -> Self {
        Self::new(options, load_library, crate::hook::ProcessImports, ducking, handler)
    }

    /// Initializes the engine on behalf of the given synthesizer, loading it first if needed.
    ///
    /// Failing to set up ducking does not fail initialization; speech simply won't duck.
    pub fn initialize(&mut self, synth: SynthRef) -> Result<()> {
        self.bridge.set_synth(synth);
        self.ensure_ducking();

        let library = match &self.library {
            Some(library) => library.clone(),
            None => {
                let library = self.loader.load(self.options.library_path())?;
                self.library = Some(library.clone());
                library
            }
        };
        playback::route_to(&self.bridge);
        library.initialize();
        if !library.register_callback(playback::native_callback()) {
            warn!("The engine refused the playback callback");
        }
        Ok(())
    }

    /// Shuts the engine down. The library stays loaded and can be initialized again.
    pub fn terminate(&self) -> Result<()> {
        self.library.as_ref().map(|library| library.terminate()).ok_or(Error::NotInitialized)
    }

    /// Sets an engine parameter. Returns `false` if the engine rejects it or if either string
    /// cannot be passed to the engine.
    pub fn configure(&self, name: &str, value: &str) -> bool {
        let encoded = to_native(name).and_then(|name| Ok((name, to_native(value)?)));
        match encoded {
            Ok((name, value)) => self.call("configure", |library| library.configure(&name, &value)),
            Err(err) => {
                warn!("Could not configure {:?}: {}", name, err);
                false
            }
        }
    }

    /// Starts speaking the text. The index, if given, is reported back once speech reaches it.
    pub fn speak(&self, text: &str, index: Option<usize>) -> bool {
        let text = match to_native(text) {
            Ok(text) => text,
            Err(err) => {
                warn!("Could not speak: {}", err);
                return false;
            }
        };
        self.call("speak", |library| {
            self.bridge.speech_started();
            library.speak(&text, index.unwrap_or(0))
        })
    }

    /// Stops speaking. The host is told speech is done before the engine is asked to stop.
    pub fn cancel(&self) -> bool {
        self.bridge.speech_cancelled();
        self.call("cancel", |library| library.cancel())
    }

    /// Pauses speech.
    pub fn pause(&self) -> bool {
        self.call("pause", |library| library.pause())
    }

    /// Resumes paused speech.
    pub fn resume(&self) -> bool {
        self.call("resume", |library| library.resume())
    }

    /// Checks whether the engine is speaking, as far as the host is concerned.
    pub fn is_playing(&self) -> bool {
        self.bridge.is_playing()
    }

    /// The last index speech has reached.
    pub fn last_index(&self) -> usize {
        self.bridge.last_index()
    }

    /// Checks whether the engine's devices are being ducked.
    pub fn ducking_active(&self) -> bool {
        self.hooks.is_some()
    }

    /// The installed `waveOut` interceptions, if any.
    pub fn hooks(&self) -> Option<&WaveOutHooks> {
        self.hooks.as_ref()
    }

    /// The number of engine devices currently ducking other audio.
    pub fn ducking_sessions(&self) -> usize {
        self.interceptor.sessions().len()
    }

    /// The options this session was created with.
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    fn ensure_ducking(&mut self) {
        if !self.options.ducks_audio() {
            return;
        }
        let installed = WaveOutHooks::ensure(
            &mut self.hooks,
            self.imports.as_ref(),
            self.options.library_path(),
            &self.interceptor,
        );
        if let Err(err) = installed {
            error!("Audio ducking is disabled: {}", err);
        }
    }

    fn call<F: FnOnce(&dyn NativeEngine) -> bool>(&self, operation: &str, f: F) -> bool {
        match &self.library {
            Some(library) => f(library.as_ref()),
            None => {
                warn!("Cannot {} before the engine is initialized", operation);
                false
            }
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        playback::unroute(&self.bridge);
        self.hooks = None;
        self.interceptor.sessions().clear();
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("options", &self.options)
            .field("loaded", &self.library.is_some())
            .field("hooks", &self.hooks)
            .field("bridge", &self.bridge)
            .finish()
    }
}
