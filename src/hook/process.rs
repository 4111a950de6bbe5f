use std::ffi::CStr;
use std::mem::size_of;
use std::path::Path;

use windows as Windows;
use Windows::Win32::Foundation::HINSTANCE;
use Windows::Win32::System::LibraryLoader::{FreeLibrary, LoadLibraryW};
use Windows::Win32::System::Memory::{VirtualProtect, PAGE_PROTECTION_FLAGS};

use crate::native_util::{find_import_slot, write_slot};

use super::{EntryPoint, HookInstallError, ImportTable, InstalledPatch};

/// Patches the import tables of modules loaded into the current process.
///
/// The target module is loaded if needed, and stays loaded for as long as the patch is installed.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessImports;

impl ImportTable for ProcessImports {
    fn patch(
        &self,
        target_module: &Path,
        imported_module: &CStr,
        function: &CStr,
        replacement: EntryPoint,
    ) -> Result<Box<dyn InstalledPatch>, HookInstallError> {
        let module = unsafe { LoadLibraryW(target_module.as_os_str()) };
        if module.0 == 0 {
            return Err(HookInstallError::ModuleLoad {
                path: target_module.to_path_buf(),
                reason: Windows::core::Error::from_win32().to_string(),
            });
        }

        let slot = unsafe { find_import_slot(module.0 as *const u8, imported_module, function) }
            .map_err(|source| HookInstallError::Image {
                path: target_module.to_path_buf(),
                function: function.to_string_lossy().into_owned(),
                source,
            })
            .and_then(|slot| {
                unsafe { swap_slot(slot, replacement.addr()) }
                    .map(|original| (slot, original))
                    .map_err(|err| HookInstallError::Patch {
                        function: function.to_string_lossy().into_owned(),
                        reason: err.to_string(),
                    })
            });

        match slot {
            Ok((slot, original)) => Ok(Box::new(ModulePatch {
                module,
                slot,
                original,
                replacement: replacement.addr(),
            })),
            Err(err) => {
                unsafe { FreeLibrary(module) };
                Err(err)
            }
        }
    }
}

struct ModulePatch {
    module: HINSTANCE,
    slot: *mut usize,
    original: usize,
    replacement: usize,
}

// The slot lives in the image of `module`, which this patch keeps loaded.
unsafe impl Send for ModulePatch {}
unsafe impl Sync for ModulePatch {}

impl InstalledPatch for ModulePatch {
    fn original(&self) -> EntryPoint {
        EntryPoint::new(self.original)
    }

    fn remove(&mut self) {
        unsafe {
            // Someone else may have patched the slot after us; leave their entry in place.
            if self.slot.read_volatile() == self.replacement {
                if let Err(err) = swap_slot(self.slot, self.original) {
                    log::error!("Could not restore import table slot: {}", err);
                }
            }
            FreeLibrary(self.module);
        }
    }
}

unsafe fn swap_slot(slot: *mut usize, value: usize) -> Windows::core::Result<usize> {
    write_slot(slot, value, |slot, protection| -> Windows::core::Result<u32> {
        let mut previous = PAGE_PROTECTION_FLAGS(0);
        let protection = PAGE_PROTECTION_FLAGS(protection);
        VirtualProtect(slot as _, size_of::<usize>(), protection, &mut previous).ok()?;
        Ok(previous.0)
    })
}
