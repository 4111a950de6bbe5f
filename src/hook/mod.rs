//! Redirection of imported functions through a module's import table.
//!
//! A module calls the functions it imports from other modules through its import address table.
//! Replacing an entry in that table sends every such call to a different function, without
//! touching the code of either module. An [`ImportHook`] owns one such replacement and undoes it
//! when released or dropped.

use std::ffi::CStr;
use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, error};

use crate::native_util::ansi_name;
use crate::EncodingError;

pub use crate::native_util::ImageError;

#[cfg(windows)]
mod process;

#[cfg(windows)]
#[cfg_attr(docsrs, doc(cfg(windows)))]
pub use process::ProcessImports;

/// The address of a function that can be called through an import table slot.
#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy)]
pub struct EntryPoint(usize);

impl EntryPoint {
    /// Wraps the given function address.
    pub fn new(addr: usize) -> Self {
        Self(addr)
    }

    /// Returns the function address.
    pub fn addr(self) -> usize {
        self.0
    }

    /// Checks whether this entry point points nowhere.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// The error returned when an import cannot be redirected.
#[derive(Debug, thiserror::Error)]
pub enum HookInstallError {
    /// A module or function name cannot be written the way the import table stores names.
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    /// The target module could not be loaded.
    #[error("could not load {path}: {reason}")]
    ModuleLoad {
        /// The module that failed to load.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },
    /// The import table of the target module does not have the requested slot.
    #[error("could not hook {function} in {path}: {source}")]
    Image {
        /// The module whose import table was searched.
        path: PathBuf,
        /// The function that was looked up.
        function: String,
        /// Why the slot was not found.
        #[source]
        source: ImageError,
    },
    /// The slot was found but could not be overwritten.
    #[error("could not patch {function}: {reason}")]
    Patch {
        /// The function whose slot could not be written.
        function: String,
        /// What went wrong.
        reason: String,
    },
}

/// A replaced import table slot. Removing it puts the original entry point back.
pub trait InstalledPatch: Send + Sync {
    /// The entry point the slot held before it was patched.
    fn original(&self) -> EntryPoint;

    /// Restores the original entry point. Called at most once.
    fn remove(&mut self);
}

/// The primitive that patches import table slots of loaded modules.
pub trait ImportTable: Send + Sync {
    /// Replaces the slot through which `target_module` calls `function` from `imported_module`.
    fn patch(
        &self,
        target_module: &Path,
        imported_module: &CStr,
        function: &CStr,
        replacement: EntryPoint,
    ) -> Result<Box<dyn InstalledPatch>, HookInstallError>;
}

/// One installed redirection of an imported function.
pub struct ImportHook {
    target_module: PathBuf,
    imported_module: String,
    function: String,
    replacement: EntryPoint,
    original: EntryPoint,
    patch: Option<Box<dyn InstalledPatch>>,
}

impl ImportHook {
    /// Redirects the calls `target_module` makes to `function` from `imported_module` to
    /// `replacement`.
    pub fn install<P: AsRef<Path>>(
        table: &dyn ImportTable,
        target_module: P,
        imported_module: &str,
        function: &str,
        replacement: EntryPoint,
    ) -> Result<Self, HookInstallError> {
        let target_module = target_module.as_ref();
        let patch = ansi_name(imported_module)
            .and_then(|module| Ok((module, ansi_name(function)?)))
            .map_err(HookInstallError::from)
            .and_then(|(module, name)| table.patch(target_module, &module, &name, replacement));
        match patch {
            Ok(patch) => {
                debug!("Hooked {} in {}", function, target_module.display());
                Ok(Self {
                    target_module: target_module.to_path_buf(),
                    imported_module: imported_module.to_string(),
                    function: function.to_string(),
                    replacement,
                    original: patch.original(),
                    patch: Some(patch),
                })
            }
            Err(err) => {
                error!("Could not hook {}: {}", function, err);
                Err(err)
            }
        }
    }

    /// Removes the redirection. Does nothing if it was already removed.
    pub fn release(&mut self) {
        if let Some(mut patch) = self.patch.take() {
            patch.remove();
            debug!("Unhooked {} in {}", self.function, self.target_module.display());
        }
    }

    /// Checks whether the redirection is still in place.
    pub fn is_installed(&self) -> bool {
        self.patch.is_some()
    }

    /// The module whose import table was patched.
    pub fn target_module(&self) -> &Path {
        &self.target_module
    }

    /// The module the redirected function is imported from.
    pub fn imported_module(&self) -> &str {
        &self.imported_module
    }

    /// The name of the redirected function.
    pub fn function(&self) -> &str {
        &self.function
    }

    /// Where the calls are redirected to.
    pub fn replacement(&self) -> EntryPoint {
        self.replacement
    }

    /// Where the calls went before the redirection.
    pub fn original(&self) -> EntryPoint {
        self.original
    }
}

impl Drop for ImportHook {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for ImportHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportHook")
            .field("target_module", &self.target_module)
            .field("imported_module", &self.imported_module)
            .field("function", &self.function)
            .field("replacement", &self.replacement)
            .field("original", &self.original)
            .field("installed", &self.is_installed())
            .finish()
    }
}
